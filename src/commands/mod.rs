//! Commands Module
//!
//! CLI / REPL에서 호출하는 시크릿 명령어 정의.
//! 출력은 모두 `Write`로 받아 테스트에서 버퍼로 검증할 수 있습니다.

pub mod export;
pub mod import;
pub mod list;
pub mod repl;
pub mod secret;

use std::fmt;
use std::io::Write;

use console::style;

use crate::error::VscseResult;
use crate::models::SecretStatus;

pub use export::export_secrets;
pub use import::import_secrets;
pub use list::list_secrets;
pub use repl::run_repl;
pub use secret::{get_secret, remove_secret, set_secret};

/// 일괄 작업 결과 (성공/실패 개수)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl BulkSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// "1 secret" / "2 secrets"
pub(crate) fn secrets_word(count: usize) -> String {
    format!("{count} secret{}", plural(count))
}

/// "1 broken secret" / "2 broken secrets"
pub(crate) fn broken_secrets_word(count: usize) -> String {
    format!("{count} broken secret{}", plural(count))
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// 값 색상: 내장 확장은 흐리게, Error는 빨강, 나머지는 초록
pub(crate) fn styled_value(value: &str, status: SecretStatus, builtin: bool) -> String {
    if builtin {
        style(value).dim().to_string()
    } else if status == SecretStatus::Error {
        style(value).red().to_string()
    } else {
        style(value).green().to_string()
    }
}

/// 요약 줄 출력 (실패 부분은 빨강)
pub(crate) fn print_summary(
    out: &mut dyn Write,
    success: impl fmt::Display,
    failure: Option<impl fmt::Display>,
) -> VscseResult<()> {
    match failure {
        Some(failure) => writeln!(out, "{}{}", style(success).blue(), style(failure).red())?,
        None => writeln!(out, "{}", style(success).blue())?,
    }
    Ok(())
}

/// 사용자 에러 출력 (REPL은 이어서 진행)
pub(crate) fn print_error(out: &mut dyn Write, message: impl fmt::Display) -> VscseResult<()> {
    writeln!(out, "{} {}", style("error:").red().bold(), message)?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_word() {
        assert_eq!(secrets_word(0), "0 secrets");
        assert_eq!(secrets_word(1), "1 secret");
        assert_eq!(secrets_word(5), "5 secrets");
        assert_eq!(broken_secrets_word(1), "1 broken secret");
        assert_eq!(broken_secrets_word(2), "2 broken secrets");
    }

    #[test]
    fn test_print_summary_with_failures() {
        let mut buf = Vec::new();
        print_summary(
            &mut buf,
            format!("imported {}", secrets_word(1)),
            Some(format!(" but failed to import {}", broken_secrets_word(3))),
        )
        .unwrap();
        assert_eq!(
            test_support::output(buf),
            "imported 1 secret but failed to import 3 broken secrets\n"
        );
    }

    #[test]
    fn test_print_summary_without_failures() {
        let mut buf = Vec::new();
        print_summary(&mut buf, "imported 2 secrets", None::<&str>).unwrap();
        assert_eq!(test_support::output(buf), "imported 2 secrets\n");
    }
}
