//! Raw key 유도
//!
//! - DPAPI 계열: Local State JSON의 `os_crypt.encrypted_key`(base64)에서
//!   `DPAPI` 접두사 5바이트를 떼고 현재 사용자 범위로 unprotect. 결과 32바이트가 곧 키.
//! - 키링 계열: `chrome_libsecret_os_crypt_password_v2` 스키마에서 후보 앱 이름 순서대로
//!   패스프레이즈를 찾아 PBKDF2-HMAC-SHA1(salt `saltysalt`, 1회)로 16바이트 키 유도.
//!   반복 횟수 1은 호스트 앱과의 호환을 위해 그대로 유지해야 합니다.

use std::fmt;
use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use sha1::Sha1;
use tracing::{debug, instrument, warn};
use zeroize::Zeroizing;

use crate::protect::{DataProtector, KeyProtectionError, ProtectionScope, SecretLookup};

/// Local State의 encrypted_key 앞에 붙는 접두사
pub const DPAPI_PREFIX: &[u8; 5] = b"DPAPI";
/// DPAPI로 감싼 키 길이 (AES-256)
pub const DPAPI_KEY_LEN: usize = 32;

/// 키링 스키마 이름
pub const KEYRING_SCHEMA: &str = "chrome_libsecret_os_crypt_password_v2";
/// 키링 조회 attribute
pub const KEYRING_ATTRIBUTE: &str = "application";
/// 호스트 앱이 과거에 등록했던 application 이름 후보 (앞에서부터 시도)
pub const KEYRING_APPLICATIONS: &[&str] = &["Code", "chrome", "chromium", "vscode", "code"];

/// PBKDF2 salt
pub const KEYRING_SALT: &[u8] = b"saltysalt";
/// PBKDF2 반복 횟수
pub const KEYRING_ITERATIONS: u32 = 1;
/// 키링 계열 키 길이 (AES-128)
pub const KEYRING_KEY_LEN: usize = 16;

/// 키 유도 오류
#[derive(Debug, thiserror::Error)]
pub enum KeyDerivationError {
    #[error("cannot read local state: {0}")]
    LocalStateRead(#[from] std::io::Error),

    #[error("local state is not valid JSON: {0}")]
    LocalStateJson(#[from] serde_json::Error),

    #[error("local state has no os_crypt.encrypted_key")]
    MissingEncryptedKey,

    #[error("os_crypt.encrypted_key is not valid base64")]
    InvalidBase64,

    #[error("os_crypt.encrypted_key does not start with the DPAPI prefix")]
    MissingDpapiPrefix,

    /// 네이티브 키 보호 기능 자체의 실패 (DPAPI 호출 실패, Secret Service 없음)
    #[error("key protection facility failed: {0}")]
    Facility(#[source] KeyProtectionError),

    #[error("unwrapped key has {actual} bytes, expected {expected}")]
    UnexpectedKeyLength { expected: usize, actual: usize },

    #[error(
        "no keyring entry in schema {schema} for any known application ({}): {last_error}",
        .tried.join(", ")
    )]
    KeyringEntryNotFound {
        schema: &'static str,
        tried: Vec<String>,
        last_error: String,
    },

    #[error("keyring passphrase is empty")]
    EmptyPassphrase,

    #[error("key derivation already failed in this process: {0}")]
    PreviouslyFailed(String),
}

/// 애플리케이션 마스터 키
///
/// drop 시 zeroize되며 Debug 출력에는 길이만 나타납니다.
#[derive(Clone, PartialEq, Eq)]
pub struct RawKey(Zeroizing<Vec<u8>>);

impl RawKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for RawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawKey([redacted; {}])", self.0.len())
    }
}

#[derive(Deserialize)]
struct LocalState {
    os_crypt: Option<OsCrypt>,
}

#[derive(Deserialize)]
struct OsCrypt {
    encrypted_key: Option<String>,
}

/// Local State 문서에서 DPAPI blob 추출 (접두사 제거 후)
pub fn parse_local_state(json: &str) -> Result<Vec<u8>, KeyDerivationError> {
    let state: LocalState = serde_json::from_str(json)?;
    let encoded = state
        .os_crypt
        .and_then(|c| c.encrypted_key)
        .filter(|k| !k.is_empty())
        .ok_or(KeyDerivationError::MissingEncryptedKey)?;

    let decoded = BASE64
        .decode(encoded.trim())
        .map_err(|_| KeyDerivationError::InvalidBase64)?;

    match decoded.strip_prefix(DPAPI_PREFIX.as_slice()) {
        Some(blob) if !blob.is_empty() => Ok(blob.to_vec()),
        _ => Err(KeyDerivationError::MissingDpapiPrefix),
    }
}

/// Local State 파일을 읽어 DPAPI로 raw key 복원
#[instrument(skip(protector))]
pub fn unwrap_dpapi_key(
    protector: &dyn DataProtector,
    local_state: &Path,
) -> Result<RawKey, KeyDerivationError> {
    let json = fs::read_to_string(local_state)?;
    let blob = parse_local_state(&json)?;
    debug!(blob_len = blob.len(), "unwrapping local state key");

    let key = protector
        .unprotect(&blob, None, ProtectionScope::CurrentUser)
        .map_err(KeyDerivationError::Facility)?;
    let key = RawKey::new(key);

    if key.len() != DPAPI_KEY_LEN {
        return Err(KeyDerivationError::UnexpectedKeyLength {
            expected: DPAPI_KEY_LEN,
            actual: key.len(),
        });
    }

    Ok(key)
}

/// 패스프레이즈 -> 16바이트 키 (PBKDF2-HMAC-SHA1, 1회)
pub fn derive_keyring_key(passphrase: &str) -> Result<RawKey, KeyDerivationError> {
    if passphrase.is_empty() {
        return Err(KeyDerivationError::EmptyPassphrase);
    }

    let mut key = Zeroizing::new(vec![0u8; KEYRING_KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha1>(
        passphrase.as_bytes(),
        KEYRING_SALT,
        KEYRING_ITERATIONS,
        &mut key,
    );

    Ok(RawKey(key))
}

/// 후보 application 이름을 차례로 조회하여 첫 성공 값 반환
///
/// Secret Service 자체에 연결할 수 없으면 남은 후보를 시도하지 않고 바로 실패합니다.
pub fn lookup_keyring_passphrase(
    lookup: &dyn SecretLookup,
    applications: &[&str],
) -> Result<Zeroizing<String>, KeyDerivationError> {
    let mut last_error = String::from("no candidates");

    for application in applications {
        match lookup.lookup_secret(KEYRING_SCHEMA, KEYRING_ATTRIBUTE, application) {
            Ok(passphrase) => {
                debug!(application, "keyring entry found");
                return Ok(Zeroizing::new(passphrase));
            }
            Err(err @ KeyProtectionError::Unavailable(_)) => {
                warn!(application, error = %err, "keyring facility unavailable");
                return Err(KeyDerivationError::Facility(err));
            }
            Err(err) => {
                debug!(application, error = %err, "keyring candidate missed");
                last_error = err.to_string();
            }
        }
    }

    warn!(schema = KEYRING_SCHEMA, "keyring entry not found for any candidate");
    Err(KeyDerivationError::KeyringEntryNotFound {
        schema: KEYRING_SCHEMA,
        tried: applications.iter().map(|a| a.to_string()).collect(),
        last_error,
    })
}

/// 키링에서 패스프레이즈를 찾아 raw key 유도
#[instrument(skip(lookup))]
pub fn keyring_key(lookup: &dyn SecretLookup) -> Result<RawKey, KeyDerivationError> {
    let passphrase = lookup_keyring_passphrase(lookup, KEYRING_APPLICATIONS)?;
    derive_keyring_key(&passphrase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protect::fakes::{MapLookup, UnavailableLookup, XorProtector};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn local_state_for(blob: &[u8]) -> String {
        let mut prefixed = DPAPI_PREFIX.to_vec();
        prefixed.extend_from_slice(blob);
        format!(
            r#"{{"browser":{{}},"os_crypt":{{"encrypted_key":"{}"}}}}"#,
            BASE64.encode(prefixed)
        )
    }

    #[test]
    fn test_pbkdf2_reference_vectors() {
        let key = derive_keyring_key("hunter2").unwrap();
        assert_eq!(
            key.as_bytes(),
            &[
                0xb1, 0xaf, 0x25, 0x7c, 0x85, 0x80, 0x20, 0xdd, 0x21, 0x02, 0x1d, 0x9d, 0x70,
                0xe6, 0x18, 0x7c
            ]
        );

        let key = derive_keyring_key("peanuts").unwrap();
        assert_eq!(
            key.as_bytes(),
            &[
                0xfd, 0x62, 0x1f, 0xe5, 0xa2, 0xb4, 0x02, 0x53, 0x9d, 0xfa, 0x14, 0x7c, 0xa9,
                0x27, 0x27, 0x78
            ]
        );
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        assert!(matches!(
            derive_keyring_key(""),
            Err(KeyDerivationError::EmptyPassphrase)
        ));
    }

    #[test]
    fn test_parse_local_state_strips_prefix() {
        let blob = parse_local_state(&local_state_for(b"opaque-blob")).unwrap();
        assert_eq!(blob, b"opaque-blob");
    }

    #[test]
    fn test_parse_local_state_errors() {
        assert!(matches!(
            parse_local_state("not json"),
            Err(KeyDerivationError::LocalStateJson(_))
        ));
        assert!(matches!(
            parse_local_state(r#"{"os_crypt":{}}"#),
            Err(KeyDerivationError::MissingEncryptedKey)
        ));
        assert!(matches!(
            parse_local_state(r#"{"profile":{}}"#),
            Err(KeyDerivationError::MissingEncryptedKey)
        ));
        assert!(matches!(
            parse_local_state(r#"{"os_crypt":{"encrypted_key":"%%%"}}"#),
            Err(KeyDerivationError::InvalidBase64)
        ));
        let no_prefix = format!(
            r#"{{"os_crypt":{{"encrypted_key":"{}"}}}}"#,
            BASE64.encode(b"XXXXXblob")
        );
        assert!(matches!(
            parse_local_state(&no_prefix),
            Err(KeyDerivationError::MissingDpapiPrefix)
        ));
    }

    #[test]
    fn test_unwrap_dpapi_key_from_file() {
        let protector = XorProtector::new(0x5a);
        let raw: Vec<u8> = (0u8..32).collect();
        let wrapped: Vec<u8> = raw.iter().map(|b| b ^ 0x5a).collect();

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(local_state_for(&wrapped).as_bytes()).unwrap();

        let key = unwrap_dpapi_key(&protector, file.path()).unwrap();
        assert_eq!(key.as_bytes(), raw.as_slice());
        assert_eq!(protector.calls.get(), 1);
    }

    #[test]
    fn test_unwrap_dpapi_key_wrong_length() {
        let protector = XorProtector::new(0);
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(local_state_for(&[1u8; 16]).as_bytes()).unwrap();

        assert!(matches!(
            unwrap_dpapi_key(&protector, file.path()),
            Err(KeyDerivationError::UnexpectedKeyLength {
                expected: 32,
                actual: 16
            })
        ));
    }

    #[test]
    fn test_unwrap_dpapi_key_native_failure() {
        let protector = XorProtector::failing();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(local_state_for(&[1u8; 32]).as_bytes()).unwrap();

        assert!(matches!(
            unwrap_dpapi_key(&protector, file.path()),
            Err(KeyDerivationError::Facility(KeyProtectionError::CallFailed { .. }))
        ));
    }

    #[test]
    fn test_missing_local_state_file() {
        let protector = XorProtector::new(0);
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            unwrap_dpapi_key(&protector, &dir.path().join("Local State")),
            Err(KeyDerivationError::LocalStateRead(_))
        ));
    }

    #[test]
    fn test_keyring_candidates_first_success_wins() {
        let mut lookup = MapLookup::with(KEYRING_SCHEMA, "vscode", "hunter2");
        lookup.entries.insert(
            (KEYRING_SCHEMA.to_string(), "code".to_string()),
            "other".to_string(),
        );

        let key = keyring_key(&lookup).unwrap();
        assert_eq!(key, derive_keyring_key("hunter2").unwrap());
        // Code, chrome, chromium, vscode
        assert_eq!(lookup.calls.get(), 4);
    }

    #[test]
    fn test_keyring_not_found_names_candidates() {
        let lookup = MapLookup::with("some_other_schema", "Code", "hunter2");
        let err = keyring_key(&lookup).unwrap_err();

        match &err {
            KeyDerivationError::KeyringEntryNotFound { tried, .. } => {
                assert_eq!(tried.len(), KEYRING_APPLICATIONS.len());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let message = err.to_string();
        assert!(message.contains("Code, chrome, chromium, vscode, code"));
        assert_eq!(lookup.calls.get(), KEYRING_APPLICATIONS.len());
    }

    #[test]
    fn test_keyring_unavailable_stops_at_first_candidate() {
        let lookup = UnavailableLookup::default();
        let err = keyring_key(&lookup).unwrap_err();

        assert!(matches!(
            err,
            KeyDerivationError::Facility(KeyProtectionError::Unavailable(_))
        ));
        assert_eq!(lookup.calls.get(), 1);
    }

    #[test]
    fn test_raw_key_debug_is_redacted() {
        let key = RawKey::new(vec![0xaa; 16]);
        assert_eq!(format!("{key:?}"), "RawKey([redacted; 16])");
    }
}
