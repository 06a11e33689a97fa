//! Native Key-Protection Binding
//!
//! OS 키 보호 기능에 대한 얇은 호출 계층.
//!
//! - Windows: DPAPI (`CryptProtectData` / `CryptUnprotectData`)
//! - Linux: Secret Service (libsecret 스키마 + attribute 조회)
//!
//! 이 계층은 결과를 캐시하지 않습니다. 캐시는 `secrets::provider`의 몫입니다.
//! 호출은 모두 동기이며 OS 기능이 응답할 때까지 블록됩니다.

#[cfg(windows)]
mod dpapi;
#[cfg(target_os = "linux")]
mod libsecret;

#[cfg(windows)]
pub use dpapi::Dpapi;
#[cfg(target_os = "linux")]
pub use libsecret::SecretServiceLookup;

/// DPAPI 보호 범위
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtectionScope {
    /// 현재 사용자 자격 증명에 묶임 (기본값)
    #[default]
    CurrentUser,
    /// 머신 전체에 묶임
    LocalMachine,
}

/// 키 보호 기능 오류
///
/// 빈 데이터를 조용히 반환하는 대신 항상 이 에러로 실패합니다.
#[derive(Debug, thiserror::Error)]
pub enum KeyProtectionError {
    #[error("key protection facility unavailable: {0}")]
    Unavailable(String),

    #[error("{call} failed (os error {code})")]
    CallFailed { call: &'static str, code: u32 },

    #[error("no keyring entry for {attribute}={value} in schema {schema}")]
    NotFound {
        schema: String,
        attribute: String,
        value: String,
    },

    #[error("input of {0} bytes is too large for the facility")]
    InputTooLarge(usize),

    #[error("keyring backend error: {0}")]
    Backend(String),
}

/// protect/unprotect 계열 (DPAPI)
pub trait DataProtector {
    fn protect(
        &self,
        data: &[u8],
        entropy: Option<&[u8]>,
        scope: ProtectionScope,
    ) -> Result<Vec<u8>, KeyProtectionError>;

    fn unprotect(
        &self,
        data: &[u8],
        entropy: Option<&[u8]>,
        scope: ProtectionScope,
    ) -> Result<Vec<u8>, KeyProtectionError>;
}

/// 스키마 + attribute 조회 계열 (Secret Service)
pub trait SecretLookup {
    fn lookup_secret(
        &self,
        schema: &str,
        attribute: &str,
        value: &str,
    ) -> Result<String, KeyProtectionError>;
}
