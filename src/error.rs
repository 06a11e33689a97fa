//! vscse Error Types
//!
//! 애플리케이션 전역 에러 타입 정의.
//! 세션 치명 에러(키 보호/키 유도/DB)는 여기서 `VscseError`로 모이고,
//! 시크릿 단위 에러는 `SecretError`로 분리되어 레코드로 변환됩니다.

use thiserror::Error;

use crate::crypto::envelope::EnvelopeError;
use crate::crypto::kdf::KeyDerivationError;
use crate::protect::KeyProtectionError;

/// vscse 애플리케이션 에러
#[derive(Error, Debug)]
pub enum VscseError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Key protection unavailable: {0}")]
    KeyProtection(#[from] KeyProtectionError),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(KeyDerivationError),

    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid vscdb file: {0}")]
    InvalidDatabase(String),

    #[error("Invalid local state file: {0}")]
    InvalidLocalState(String),

    #[error("Invalid import file: {0}")]
    InvalidImport(String),

    #[error("Platform \"{0}\" is unsupported")]
    UnsupportedPlatform(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl VscseError {
    /// fatal 메시지에 함께 출력되는 고정 에러 코드
    pub fn code(&self) -> &'static str {
        match self {
            VscseError::Database(_) => "DB_ERROR",
            VscseError::Io(_) => "IO_ERROR",
            VscseError::Serialization(_) => "SERIALIZATION_ERROR",
            VscseError::KeyProtection(_) => "KEY_PROTECTION_UNAVAILABLE",
            VscseError::KeyDerivation(_) => "KEY_DERIVATION_FAILED",
            VscseError::Envelope(_) => "ENVELOPE_ERROR",
            VscseError::InvalidPath(_) => "INVALID_PATH",
            VscseError::InvalidDatabase(_) => "INVALID_DATABASE",
            VscseError::InvalidLocalState(_) => "INVALID_LOCAL_STATE",
            VscseError::InvalidImport(_) => "INVALID_IMPORT",
            VscseError::UnsupportedPlatform(_) => "UNSUPPORTED_PLATFORM",
            VscseError::InvalidOperation(_) => "INVALID_OPERATION",
        }
    }

    /// 세션 전체를 중단해야 하는 에러인지 여부
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            VscseError::KeyProtection(_)
                | VscseError::KeyDerivation(_)
                | VscseError::UnsupportedPlatform(_)
        )
    }
}

/// 네이티브 기능 실패는 키 보호 에러로, 나머지는 키 유도 에러로 분류
impl From<KeyDerivationError> for VscseError {
    fn from(err: KeyDerivationError) -> Self {
        match err {
            KeyDerivationError::Facility(inner) => VscseError::KeyProtection(inner),
            other => VscseError::KeyDerivation(other),
        }
    }
}

/// 시크릿 한 건에 국한된 에러
///
/// `SecretStore::read_secret`에서 잡혀 Error 상태 레코드로 바뀌며,
/// 일괄 처리(목록/내보내기)를 중단시키지 않습니다.
#[derive(Error, Debug)]
pub enum SecretError {
    #[error("Key not found")]
    NotFound,

    #[error("{0} is not a supported encoding type")]
    UnsupportedEncoding(String),

    #[error("Malformed row: {0}")]
    MalformedRow(String),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error("Decrypted value is not valid UTF-8")]
    InvalidUtf8,

    #[error("Raw key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type VscseResult<T> = Result<T, VscseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct_for_session_errors() {
        let protection = VscseError::KeyProtection(KeyProtectionError::Unavailable(
            "no dbus".to_string(),
        ));
        let derivation = VscseError::KeyDerivation(KeyDerivationError::MissingEncryptedKey);

        assert_eq!(protection.code(), "KEY_PROTECTION_UNAVAILABLE");
        assert_eq!(derivation.code(), "KEY_DERIVATION_FAILED");
        assert!(protection.is_session_fatal());
        assert!(derivation.is_session_fatal());
        assert!(!VscseError::InvalidPath("x".into()).is_session_fatal());
    }

    #[test]
    fn test_facility_failures_become_key_protection_errors() {
        let err: VscseError = KeyDerivationError::Facility(KeyProtectionError::CallFailed {
            call: "CryptUnprotectData",
            code: 13,
        })
        .into();
        assert_eq!(err.code(), "KEY_PROTECTION_UNAVAILABLE");

        let err: VscseError = KeyDerivationError::EmptyPassphrase.into();
        assert_eq!(err.code(), "KEY_DERIVATION_FAILED");
    }

    #[test]
    fn test_secret_error_messages() {
        assert_eq!(SecretError::NotFound.to_string(), "Key not found");
        assert_eq!(
            SecretError::UnsupportedEncoding("Text".into()).to_string(),
            "Text is not a supported encoding type"
        );
        let err: SecretError = EnvelopeError::AuthenticationFailed.into();
        assert_eq!(err.to_string(), EnvelopeError::AuthenticationFailed.to_string());
    }
}
