//! vscse Data Models
//!
//! vscdb 행 키/값과 CLI 입출력 문서에 매핑되는 Rust 데이터 모델

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 시크릿 행 키 접두사
pub const SECRET_PREFIX: &str = "secret://";

/// 시크릿 식별자 `{extensionId, key}`
///
/// 필드 순서는 VS Code가 만드는 행 키와 바이트 단위로 같아야 합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SecretIdentifier {
    #[serde(rename = "extensionId")]
    pub extension_id: String,
    pub key: String,
}

impl SecretIdentifier {
    pub fn new(extension_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            extension_id: extension_id.into(),
            key: key.into(),
        }
    }

    /// `secret://{...}` 행 키 파싱
    ///
    /// 접두사가 없거나, JSON이 아니거나, 필드가 비어 있으면 None.
    /// 애플리케이션 데이터가 아닌 행도 있으므로 에러로 취급하지 않습니다.
    pub fn parse(raw: &str) -> Option<Self> {
        let json = raw.strip_prefix(SECRET_PREFIX)?;
        let id: SecretIdentifier = serde_json::from_str(json).ok()?;
        if id.extension_id.is_empty() || id.key.is_empty() {
            return None;
        }
        Some(id)
    }

    /// ItemTable 행 키로 직렬화
    pub fn to_row_key(&self) -> String {
        // 두 필드 모두 String이라 직렬화는 실패하지 않음
        let json = serde_json::to_string(self).unwrap_or_default();
        format!("{SECRET_PREFIX}{json}")
    }

    /// 내장 확장(`vscode.*`) 여부
    pub fn is_builtin(&self) -> bool {
        self.extension_id.starts_with("vscode.")
    }
}

/// 레코드 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretStatus {
    Ok,
    Error,
}

/// 행 하나의 복호화 결과 (저장되지 않음)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRecord {
    pub identifier: SecretIdentifier,
    pub status: SecretStatus,
    /// Ok면 평문, Error면 진단 메시지
    pub value: String,
}

impl SecretRecord {
    pub fn ok(identifier: SecretIdentifier, value: String) -> Self {
        Self {
            identifier,
            status: SecretStatus::Ok,
            value,
        }
    }

    pub fn error(identifier: SecretIdentifier, message: impl std::fmt::Display) -> Self {
        Self {
            identifier,
            status: SecretStatus::Error,
            value: format!("[Decryption Error: {message}]"),
        }
    }
}

/// 확장 하나에 속한 항목
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretEntry {
    pub key: String,
    pub status: SecretStatus,
    pub value: String,
}

impl From<SecretRecord> for SecretEntry {
    fn from(record: SecretRecord) -> Self {
        Self {
            key: record.identifier.key,
            status: record.status,
            value: record.value,
        }
    }
}

/// 행 값 포맷 `{"type":"Buffer","data":[...]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferValue {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Vec<u8>,
}

impl BufferValue {
    pub const KIND: &'static str = "Buffer";

    pub fn new(data: Vec<u8>) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            data,
        }
    }
}

/// import/export 문서
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub vscse: bool,
    /// extensionId -> key -> value
    pub vscsemdb: BTreeMap<String, BTreeMap<String, String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identifier() {
        let id = SecretIdentifier::parse(r#"secret://{"extensionId":"acme.ext","key":"token"}"#)
            .unwrap();
        assert_eq!(id, SecretIdentifier::new("acme.ext", "token"));

        assert_eq!(SecretIdentifier::parse("secret://not-json"), None);
        assert_eq!(SecretIdentifier::parse(r#"secret://{"extensionId":"a"}"#), None);
        assert_eq!(
            SecretIdentifier::parse(r#"secret://{"extensionId":"","key":"k"}"#),
            None
        );
        assert_eq!(
            SecretIdentifier::parse(r#"other://{"extensionId":"a","key":"k"}"#),
            None
        );
    }

    #[test]
    fn test_row_key_field_order() {
        let id = SecretIdentifier::new("github.copilot", "session \"1\"");
        let row = id.to_row_key();
        assert_eq!(
            row,
            r#"secret://{"extensionId":"github.copilot","key":"session \"1\""}"#
        );
        assert_eq!(SecretIdentifier::parse(&row), Some(id));
    }

    #[test]
    fn test_buffer_value_json_shape() {
        let json = serde_json::to_string(&BufferValue::new(vec![118, 49, 48])).unwrap();
        assert_eq!(json, r#"{"type":"Buffer","data":[118,49,48]}"#);
    }

    #[test]
    fn test_error_record_message() {
        let rec = SecretRecord::error(SecretIdentifier::new("a", "b"), "Key not found");
        assert_eq!(rec.status, SecretStatus::Error);
        assert_eq!(rec.value, "[Decryption Error: Key not found]");
    }

    #[test]
    fn test_builtin_extension() {
        assert!(SecretIdentifier::new("vscode.github-authentication", "k").is_builtin());
        assert!(!SecretIdentifier::new("ms-python.python", "k").is_builtin());
    }
}
