//! Key Provider - 플랫폼별 raw key 관리
//!
//! - 시작 시 플랫폼에 맞는 계열(DPAPI / 키링)을 한 번 선택
//! - raw key는 `ensure_key()` 첫 호출 때 1회 유도하여 프로세스 수명 동안 보관
//! - 유도 실패도 기록되며 같은 프로세스 안에서는 재시도하지 않음

use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::unsync::OnceCell;
use tracing::{info, instrument, warn};

use crate::crypto::envelope::{self, EnvelopeError, EnvelopeVersion};
use crate::crypto::kdf::{self, KeyDerivationError, RawKey};
use crate::error::{SecretError, VscseError};
use crate::protect::{DataProtector, SecretLookup};

/// 키 보호 계열
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    /// Local State + DPAPI, v10 봉투
    Dpapi,
    /// Secret Service 패스프레이즈 + PBKDF2, v11 봉투
    Keyring,
}

impl KeyFamily {
    /// 이 계열이 읽고 쓰는 봉투 버전
    pub fn envelope_version(self) -> EnvelopeVersion {
        match self {
            KeyFamily::Dpapi => EnvelopeVersion::V10,
            KeyFamily::Keyring => EnvelopeVersion::V11,
        }
    }
}

/// raw key의 출처
pub enum KeySource {
    Dpapi {
        protector: Box<dyn DataProtector>,
        local_state: PathBuf,
    },
    Keyring {
        lookup: Box<dyn SecretLookup>,
    },
}

impl KeySource {
    pub fn family(&self) -> KeyFamily {
        match self {
            KeySource::Dpapi { .. } => KeyFamily::Dpapi,
            KeySource::Keyring { .. } => KeyFamily::Keyring,
        }
    }

    fn derive(&self) -> Result<RawKey, KeyDerivationError> {
        match self {
            KeySource::Dpapi {
                protector,
                local_state,
            } => kdf::unwrap_dpapi_key(protector.as_ref(), local_state),
            KeySource::Keyring { lookup } => kdf::keyring_key(lookup.as_ref()),
        }
    }
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Dpapi { local_state, .. } => f
                .debug_struct("Dpapi")
                .field("local_state", local_state)
                .finish_non_exhaustive(),
            KeySource::Keyring { .. } => f.debug_struct("Keyring").finish_non_exhaustive(),
        }
    }
}

/// 프로세스당 하나의 raw key를 소유하는 provider
///
/// 단일 스레드 전제이므로 `unsync::OnceCell`로 충분합니다.
#[derive(Debug)]
pub struct KeyProvider {
    source: KeySource,
    /// 첫 유도 결과 (성공 키 또는 실패 메시지)
    state: OnceCell<Result<RawKey, String>>,
}

impl KeyProvider {
    pub fn new(source: KeySource) -> Self {
        Self {
            source,
            state: OnceCell::new(),
        }
    }

    /// 실행 중인 플랫폼의 provider 선택
    #[allow(unused_variables)]
    pub fn for_platform(local_state: Option<&Path>) -> Result<Self, VscseError> {
        #[cfg(windows)]
        {
            let local_state = local_state.ok_or_else(|| {
                VscseError::InvalidLocalState("no local state path available".to_string())
            })?;
            Ok(Self::new(KeySource::Dpapi {
                protector: Box::new(crate::protect::Dpapi),
                local_state: local_state.to_path_buf(),
            }))
        }

        #[cfg(target_os = "linux")]
        {
            Ok(Self::new(KeySource::Keyring {
                lookup: Box::new(crate::protect::SecretServiceLookup),
            }))
        }

        #[cfg(not(any(windows, target_os = "linux")))]
        {
            Err(VscseError::UnsupportedPlatform(
                std::env::consts::OS.to_string(),
            ))
        }
    }

    pub fn family(&self) -> KeyFamily {
        self.source.family()
    }

    /// raw key 확보 (idempotent)
    #[instrument(skip(self), fields(family = ?self.family()))]
    pub fn ensure_key(&self) -> Result<&RawKey, KeyDerivationError> {
        if let Some(state) = self.state.get() {
            return state
                .as_ref()
                .map_err(|msg| KeyDerivationError::PreviouslyFailed(msg.clone()));
        }

        let key = self.source.derive().map_err(|err| {
            warn!(error = %err, "raw key derivation failed");
            let _ = self.state.set(Err(err.to_string()));
            err
        })?;
        info!(key_len = key.len(), "raw key derived");

        self.state
            .get_or_init(|| Ok(key))
            .as_ref()
            .map_err(|msg| KeyDerivationError::PreviouslyFailed(msg.clone()))
    }

    /// 이 계열의 봉투 복호화
    pub fn decrypt(&self, envelope: &[u8]) -> Result<Vec<u8>, SecretError> {
        let expected = self.family().envelope_version();
        let version = envelope::peek_version(envelope)?;
        if version != expected {
            return Err(SecretError::Envelope(EnvelopeError::UnsupportedVersion(
                String::from_utf8_lossy(version.tag()).into_owned(),
            )));
        }

        let key = self
            .ensure_key()
            .map_err(|e| SecretError::KeyUnavailable(e.to_string()))?;
        Ok(envelope::decode(envelope, key.as_bytes())?)
    }

    /// 이 계열의 버전으로 봉투 암호화
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, VscseError> {
        let key = self.ensure_key()?;
        Ok(envelope::encode(
            plaintext,
            key.as_bytes(),
            self.family().envelope_version(),
        )?)
    }
}
