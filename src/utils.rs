use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::db::{Database, OpenMode};
use crate::error::{VscseError, VscseResult};

/// CLI 경로 인자 검증
/// - 빈 문자열, `-`로 시작하는 문자열(다음 옵션을 잘못 먹은 경우)은 거부
/// - `must_exist`면 파일 존재까지 확인
pub fn is_valid_file_path(path: &str, must_exist: bool) -> bool {
    if path.is_empty() || path.starts_with('-') {
        return false;
    }
    !must_exist || Path::new(path).exists()
}

/// vscdb 검증: 읽기 전용으로 열 수 있고 ItemTable(key, value)이 있어야 함
pub fn validate_vscdb(path: &Path) -> VscseResult<()> {
    if !path.is_file() {
        return Err(VscseError::InvalidDatabase(format!(
            "{} doesn't exist",
            path.display()
        )));
    }

    let db = Database::open(path, OpenMode::ReadOnly).map_err(|e| {
        VscseError::InvalidDatabase(format!("{} cannot be read: {e}", path.display()))
    })?;

    match db.has_item_table() {
        Ok(true) => Ok(()),
        Ok(false) => Err(VscseError::InvalidDatabase(format!(
            "{} has no ItemTable(key, value)",
            path.display()
        ))),
        // 헤더가 SQLite가 아니면 첫 쿼리에서 실패
        Err(e) => Err(VscseError::InvalidDatabase(format!(
            "{} is not a SQLite database: {e}",
            path.display()
        ))),
    }
}

/// Local State 검증: `os_crypt.encrypted_key`가 비어 있지 않은 base64여야 함
pub fn validate_local_state(path: &Path) -> VscseResult<()> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        VscseError::InvalidLocalState(format!("{} cannot be read: {e}", path.display()))
    })?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| VscseError::InvalidLocalState(format!("not valid JSON: {e}")))?;

    let os_crypt = json
        .get("os_crypt")
        .ok_or_else(|| VscseError::InvalidLocalState("no os_crypt key in json".to_string()))?;

    let encoded = os_crypt
        .get("encrypted_key")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            VscseError::InvalidLocalState(
                "no encrypted_key key in os_crypt object".to_string(),
            )
        })?;

    match BASE64.decode(encoded.trim()) {
        Ok(bytes) if !bytes.is_empty() => Ok(()),
        _ => Err(VscseError::InvalidLocalState(
            "encrypted_key is not valid base64".to_string(),
        )),
    }
}
