//! vscse - VS Code Secret Storage Editor
//!
//! VS Code `state.vscdb`에 저장된 확장 시크릿을 복호화/재암호화하는 CLI 라이브러리.
//! OS 키 보호 기능(DPAPI / Secret Service)으로 raw key를 얻고 os_crypt 봉투를 다룹니다.

pub mod cli;
pub mod commands;
pub mod crypto;
pub mod db;
pub mod error;
pub mod models;
pub mod paths;
pub mod protect;
pub mod secrets;
pub mod utils;

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use console::style;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Options, RunType};
use crate::db::{Database, OpenMode};
use crate::error::{VscseError, VscseResult};
use crate::secrets::{KeyProvider, SecretStore};

fn find_upwards(start: PathBuf, filename: &str, max_hops: usize) -> Option<PathBuf> {
    let mut cur = start;
    for _ in 0..=max_hops {
        let candidate = cur.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        if !cur.pop() {
            break;
        }
    }
    None
}

/// `.env` 로드 (CWD부터 상위로 탐색, 없으면 무시)
/// 이미 설정된 환경 변수는 덮어쓰지 않습니다.
fn load_env() {
    let Ok(cwd) = std::env::current_dir() else {
        return;
    };
    if let Some(path) = find_upwards(cwd, ".env", 4) {
        let _ = dotenvy::from_path(&path);
    }
}

/// stderr로 로그 출력. RUST_LOG가 있으면 그쪽이 우선
fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// CLI 실행
pub fn run() -> ExitCode {
    load_env();
    let options = Options::parse();
    init_logging(options.log_filter());

    match execute(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = report_fatal(&mut std::io::stderr(), &err);
            ExitCode::FAILURE
        }
    }
}

/// `fatal [CODE]: message`. 세션 치명 에러면 시크릿을 건드리지 않았음을 덧붙임
fn report_fatal(out: &mut dyn std::io::Write, err: &VscseError) -> std::io::Result<()> {
    writeln!(out, "{} [{}]: {}", style("fatal").red().bold(), err.code(), err)?;
    if err.is_session_fatal() {
        writeln!(out, "{}", style("no secrets were read or modified").dim())?;
    }
    Ok(())
}

fn execute(options: &Options) -> VscseResult<()> {
    options.validate_paths()?;
    let run_type = options.run_type()?;
    debug!(?run_type, "options parsed");

    let paths = paths::discover(options.db.as_deref(), options.key.as_deref())?;
    let provider = KeyProvider::for_platform(paths.local_state.as_deref())?;

    let db = Database::open(&paths.vscdb, OpenMode::ReadWrite).map_err(|e| {
        VscseError::InvalidDatabase(format!(
            "database failed to mount rw: {e} (visual studio code shouldn't be open)"
        ))
    })?;

    // 키 유도 실패는 여기서 세션 전체를 중단
    let store = SecretStore::open(db, provider)?;
    info!(family = ?store.family(), vscdb = %paths.vscdb.display(), "secret store ready");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    dispatch(&store, run_type, &mut out)
}

fn dispatch(store: &SecretStore, run_type: RunType, out: &mut dyn std::io::Write) -> VscseResult<()> {
    match run_type {
        RunType::Repl => {
            let stdin = std::io::stdin();
            commands::run_repl(store, stdin.lock(), out)
        }
        RunType::List { filter } => {
            commands::list_secrets(store, filter.as_deref(), out).map(|_| ())
        }
        RunType::Get { extension_id, key } => {
            commands::get_secret(store, &extension_id, &key, out)
        }
        RunType::Set {
            extension_id,
            key,
            value,
        } => commands::set_secret(store, &extension_id, &key, &value, out),
        RunType::Remove { extension_id, key } => {
            commands::remove_secret(store, &extension_id, &key, out)
        }
        RunType::Import { path } => commands::import_secrets(store, &path, out).map(|_| ()),
        RunType::Export { path } => commands::export_secrets(store, &path, out).map(|_| ()),
    }
}
