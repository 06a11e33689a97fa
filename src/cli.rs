//! Command-line options
//!
//! `clap` derive로 옵션을 받고, 액션은 최대 하나만 허용해 `RunType`으로 변환합니다.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::error::{VscseError, VscseResult};
use crate::utils::is_valid_file_path;

/// vscse - VS Code secret storage editor
#[derive(Parser, Debug, Default)]
#[command(name = "vscse", version, about)]
pub struct Options {
    /// force path to vscdb file
    #[arg(short = 'd', long = "db", env = "VSCSE_DB", value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// force path to local state file
    #[arg(short = 'k', long = "key", env = "VSCSE_LOCAL_STATE", value_name = "PATH")]
    pub key: Option<PathBuf>,

    /// list all secrets
    #[arg(short = 'l', long = "list", num_args = 0..=1, value_name = "FILTER_EXTENSION_ID")]
    pub list: Option<Option<String>>,

    /// remove a secret
    #[arg(short = 'r', long = "rm", num_args = 2, value_names = ["EXTENSION_ID", "KEY"])]
    pub rm: Option<Vec<String>>,

    /// fetch and decrypt a secret
    #[arg(short = 'g', long = "get", num_args = 2, value_names = ["EXTENSION_ID", "KEY"])]
    pub get: Option<Vec<String>>,

    /// store and encrypt a secret
    #[arg(short = 's', long = "set", num_args = 3, value_names = ["EXTENSION_ID", "KEY", "VALUE"])]
    pub set: Option<Vec<String>>,

    /// import secrets from file
    #[arg(short = 'i', long = "import", visible_alias = "input", value_name = "PATH")]
    pub import: Option<String>,

    /// export secrets to file
    #[arg(short = 'e', long = "export", value_name = "PATH")]
    pub export: Option<String>,

    /// more log output (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

/// 실행 모드
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunType {
    Repl,
    List {
        filter: Option<String>,
    },
    Remove {
        extension_id: String,
        key: String,
    },
    Get {
        extension_id: String,
        key: String,
    },
    Set {
        extension_id: String,
        key: String,
        value: String,
    },
    Import {
        path: PathBuf,
    },
    Export {
        path: PathBuf,
    },
}

impl Options {
    /// 강제 경로 검증 (존재해야 함)
    pub fn validate_paths(&self) -> VscseResult<()> {
        for (option, path) in [("--db", &self.db), ("--key", &self.key)] {
            if let Some(path) = path {
                let text = path.to_string_lossy();
                if !is_valid_file_path(&text, true) {
                    return Err(VscseError::InvalidPath(format!(
                        "expected path after option '{option}', got '{text}' (does it exist?)"
                    )));
                }
            }
        }
        Ok(())
    }

    /// 액션 옵션을 `RunType`으로 (둘 이상이면 에러, 없으면 REPL)
    pub fn run_type(&self) -> VscseResult<RunType> {
        let mut actions = Vec::new();

        if let Some(filter) = &self.list {
            actions.push(RunType::List {
                filter: filter.clone(),
            });
        }
        if let Some([extension_id, key]) = self.rm.as_deref() {
            actions.push(RunType::Remove {
                extension_id: extension_id.clone(),
                key: key.clone(),
            });
        }
        if let Some([extension_id, key]) = self.get.as_deref() {
            actions.push(RunType::Get {
                extension_id: extension_id.clone(),
                key: key.clone(),
            });
        }
        if let Some([extension_id, key, value]) = self.set.as_deref() {
            actions.push(RunType::Set {
                extension_id: extension_id.clone(),
                key: key.clone(),
                value: value.clone(),
            });
        }
        if let Some(path) = &self.import {
            if !is_valid_file_path(path, true) {
                return Err(VscseError::InvalidPath(format!(
                    "expected path after option '--import', got '{path}' (does it exist?)"
                )));
            }
            actions.push(RunType::Import {
                path: PathBuf::from(path),
            });
        }
        if let Some(path) = &self.export {
            if !is_valid_file_path(path, false) {
                return Err(VscseError::InvalidPath(format!(
                    "expected path after option '--export', got '{path}'"
                )));
            }
            actions.push(RunType::Export {
                path: PathBuf::from(path),
            });
        }

        match actions.len() {
            0 => Ok(RunType::Repl),
            1 => Ok(actions.remove(0)),
            _ => Err(VscseError::InvalidOperation(
                "ambiguous options; can't use more than one runtype".to_string(),
            )),
        }
    }

    /// `-v` 횟수에 따른 기본 로그 필터
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "vscse_lib=warn",
            1 => "vscse_lib=info",
            _ => "vscse_lib=debug",
        }
    }
}
