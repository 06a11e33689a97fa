//! Path Discovery
//!
//! VS Code 기본 설치 경로에서 vscdb / Local State 찾기.
//! 강제 경로(`--db`, `--key`)가 있으면 항상 그쪽이 우선입니다.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{VscseError, VscseResult};
use crate::utils::{validate_local_state, validate_vscdb};

/// `<config_dir>/Code/User/globalStorage/state.vscdb`
pub fn default_vscdb_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| vscdb_path_in(&dir))
}

/// `<config_dir>/Code/Local State` (Windows 전용, 키링 계열은 필요 없음)
pub fn default_local_state_path() -> Option<PathBuf> {
    if cfg!(windows) {
        dirs::config_dir().map(|dir| local_state_path_in(&dir))
    } else {
        None
    }
}

fn vscdb_path_in(config_dir: &Path) -> PathBuf {
    config_dir
        .join("Code")
        .join("User")
        .join("globalStorage")
        .join("state.vscdb")
}

fn local_state_path_in(config_dir: &Path) -> PathBuf {
    config_dir.join("Code").join("Local State")
}

/// 확정된 경로
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub vscdb: PathBuf,
    pub local_state: Option<PathBuf>,
}

/// 강제 경로 + 기본 경로를 합쳐 검증까지 마친 경로 반환
pub fn discover(
    forced_vscdb: Option<&Path>,
    forced_local_state: Option<&Path>,
) -> VscseResult<ResolvedPaths> {
    resolve(
        forced_vscdb,
        forced_local_state,
        default_vscdb_path(),
        default_local_state_path(),
    )
}

fn resolve(
    forced_vscdb: Option<&Path>,
    forced_local_state: Option<&Path>,
    default_vscdb: Option<PathBuf>,
    default_local_state: Option<PathBuf>,
) -> VscseResult<ResolvedPaths> {
    let vscdb = match forced_vscdb {
        Some(path) => {
            info!(path = %path.display(), "forcing vscdb file path");
            path.to_path_buf()
        }
        None => {
            let path = default_vscdb.ok_or_else(|| {
                VscseError::InvalidPath("platform doesn't have vscdb path set".to_string())
            })?;
            info!(path = %path.display(), "found vscdb file path");
            path
        }
    };
    validate_vscdb(&vscdb)?;

    let local_state = match forced_local_state {
        Some(path) => {
            info!(path = %path.display(), "forcing local state file path");
            Some(path.to_path_buf())
        }
        None => default_local_state,
    };
    if let Some(path) = &local_state {
        validate_local_state(path)?;
    }

    Ok(ResolvedPaths { vscdb, local_state })
}
