//! 대화형 REPL
//!
//! 한 줄에 명령어 하나, 공백으로 인자 구분. 명령 에러는 출력만 하고 루프는 계속됩니다.

use std::io::{BufRead, Write};

use console::style;
use tracing::{debug, info};

use super::{get_secret, list_secrets, print_error, remove_secret, set_secret};
use crate::error::{VscseError, VscseResult};
use crate::secrets::SecretStore;

const PROMPT: &str = "vscse> ";

/// (이름, 인자 설명)
const COMMANDS: &[(&str, &str)] = &[
    ("exit", ""),
    ("help", ""),
    ("ls", "(filter_extension_id)"),
    ("rm", "<extension_id> <key>"),
    ("get", "<extension_id> <key>"),
    ("set", "<extension_id> <key> <value>"),
];

enum Flow {
    Continue,
    Exit,
}

/// EOF 또는 `exit`까지 명령 처리
pub fn run_repl<R: BufRead, W: Write>(
    store: &SecretStore,
    mut input: R,
    mut output: W,
) -> VscseResult<()> {
    info!("entering repl");
    let mut line = String::new();

    loop {
        write!(output, "{}", style(PROMPT).dim())?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(());
        }

        let args: Vec<&str> = line.split_whitespace().collect();
        let Some((command, args)) = args.split_first() else {
            continue;
        };
        debug!(command, argc = args.len(), "repl command");

        match dispatch(store, command, args, &mut output) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Exit) => return Ok(()),
            // 출력 자체가 실패하면 더 진행할 수 없음
            Err(VscseError::Io(err)) => return Err(VscseError::Io(err)),
            Err(VscseError::InvalidOperation(msg)) => print_error(&mut output, msg)?,
            Err(err) => print_error(&mut output, err)?,
        }
    }
}

fn dispatch(
    store: &SecretStore,
    command: &str,
    args: &[&str],
    out: &mut dyn Write,
) -> VscseResult<Flow> {
    let arg = |i: usize| args.get(i).copied().unwrap_or_default();

    match command {
        "exit" => return Ok(Flow::Exit),
        "help" => print_help(out)?,
        "ls" => {
            list_secrets(store, args.first().copied(), out)?;
        }
        "get" => get_secret(store, arg(0), arg(1), out)?,
        "set" => set_secret(store, arg(0), arg(1), arg(2), out)?,
        "rm" => remove_secret(store, arg(0), arg(1), out)?,
        other => {
            return Err(VscseError::InvalidOperation(format!(
                "unknown command: {other}"
            )))
        }
    }
    Ok(Flow::Continue)
}

fn print_help(out: &mut dyn Write) -> VscseResult<()> {
    writeln!(out, "{}", style("available commands").blue())?;
    for (name, args) in COMMANDS {
        if args.is_empty() {
            writeln!(out, "  {name}")?;
        } else {
            writeln!(out, "  {name} {}", style(args).yellow())?;
        }
    }
    Ok(())
}
