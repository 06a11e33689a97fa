//! os_crypt 봉투 암호화/복호화
//!
//! 포맷:
//! - `v10`: `"v10" || nonce(12) || ciphertext || tag(16)`: AES-256-GCM
//! - `v11`: `"v11" || ciphertext`: AES-128-CBC, IV = 0x20 * 16, PKCS#7 패딩
//!
//! I/O가 없는 순수 함수만 둡니다.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// 버전 태그 길이
pub const TAG_LEN: usize = 3;
/// GCM nonce 길이
pub const NONCE_LEN: usize = 12;
/// GCM 인증 태그 길이
pub const AUTH_TAG_LEN: usize = 16;
/// v11 고정 IV (공백 16개)
pub const CBC_IV: [u8; 16] = [0x20; 16];
/// AES 블록 크기
const BLOCK_LEN: usize = 16;

/// 봉투 버전
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeVersion {
    /// AES-256-GCM (DPAPI 계열)
    V10,
    /// AES-128-CBC (키링 계열)
    V11,
}

impl EnvelopeVersion {
    pub fn tag(self) -> &'static [u8; TAG_LEN] {
        match self {
            EnvelopeVersion::V10 => b"v10",
            EnvelopeVersion::V11 => b"v11",
        }
    }

    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"v10" => Some(EnvelopeVersion::V10),
            b"v11" => Some(EnvelopeVersion::V11),
            _ => None,
        }
    }

    /// 이 버전이 요구하는 raw key 길이
    pub fn key_len(self) -> usize {
        match self {
            EnvelopeVersion::V10 => 32,
            EnvelopeVersion::V11 => 16,
        }
    }
}

/// 봉투 오류
///
/// 포맷 오류, 인증 실패, 패딩 오류는 서로 구분됩니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("{0} is not a supported encryption version")]
    UnsupportedVersion(String),

    #[error("{version} envelope is truncated ({len} bytes)")]
    Truncated { version: &'static str, len: usize },

    #[error("{version} ciphertext length {len} is not a multiple of the block size")]
    Misaligned { version: &'static str, len: usize },

    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("authentication failed (tampered ciphertext or wrong key)")]
    AuthenticationFailed,

    #[error("invalid padding (corrupt ciphertext or wrong key)")]
    PaddingInvalid,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
}

fn version_name(version: EnvelopeVersion) -> &'static str {
    match version {
        EnvelopeVersion::V10 => "v10",
        EnvelopeVersion::V11 => "v11",
    }
}

fn check_key(version: EnvelopeVersion, key: &[u8]) -> Result<(), EnvelopeError> {
    if key.len() != version.key_len() {
        return Err(EnvelopeError::InvalidKeyLength {
            expected: version.key_len(),
            actual: key.len(),
        });
    }
    Ok(())
}

/// 봉투의 버전 태그만 읽기 (복호화 없음)
pub fn peek_version(envelope: &[u8]) -> Result<EnvelopeVersion, EnvelopeError> {
    let tag = envelope.get(..TAG_LEN).unwrap_or(envelope);
    EnvelopeVersion::from_tag(tag)
        .ok_or_else(|| EnvelopeError::UnsupportedVersion(String::from_utf8_lossy(tag).into_owned()))
}

/// 봉투 복호화
pub fn decode(envelope: &[u8], key: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    let version = peek_version(envelope)?;
    let payload = &envelope[TAG_LEN..];
    check_key(version, key)?;

    match version {
        EnvelopeVersion::V10 => decode_gcm(payload, key),
        EnvelopeVersion::V11 => decode_cbc(payload, key),
    }
}

/// 봉투 암호화
///
/// v10은 호출마다 OS CSPRNG에서 새 nonce를 뽑습니다.
pub fn encode(
    plaintext: &[u8],
    key: &[u8],
    version: EnvelopeVersion,
) -> Result<Vec<u8>, EnvelopeError> {
    check_key(version, key)?;

    let mut out = Vec::with_capacity(TAG_LEN + NONCE_LEN + plaintext.len() + AUTH_TAG_LEN);
    out.extend_from_slice(version.tag());

    match version {
        EnvelopeVersion::V10 => {
            let mut nonce = [0u8; NONCE_LEN];
            OsRng.fill_bytes(&mut nonce);

            let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EnvelopeError::InvalidKeyLength {
                expected: 32,
                actual: key.len(),
            })?;
            // aes-gcm 출력 = ciphertext || tag
            let sealed = cipher
                .encrypt(Nonce::from_slice(&nonce), plaintext)
                .map_err(|e| EnvelopeError::EncryptionFailed(e.to_string()))?;

            out.extend_from_slice(&nonce);
            out.extend_from_slice(&sealed);
        }
        EnvelopeVersion::V11 => {
            let cipher = Aes128CbcEnc::new_from_slices(key, &CBC_IV).map_err(|_| {
                EnvelopeError::InvalidKeyLength {
                    expected: 16,
                    actual: key.len(),
                }
            })?;
            out.extend_from_slice(&cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext));
        }
    }

    Ok(out)
}

fn decode_gcm(payload: &[u8], key: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    if payload.len() < NONCE_LEN + AUTH_TAG_LEN {
        return Err(EnvelopeError::Truncated {
            version: version_name(EnvelopeVersion::V10),
            len: payload.len() + TAG_LEN,
        });
    }

    let (nonce, sealed) = payload.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EnvelopeError::InvalidKeyLength {
        expected: 32,
        actual: key.len(),
    })?;

    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| EnvelopeError::AuthenticationFailed)
}

fn decode_cbc(ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    if ciphertext.is_empty() {
        return Err(EnvelopeError::Truncated {
            version: version_name(EnvelopeVersion::V11),
            len: TAG_LEN,
        });
    }
    if ciphertext.len() % BLOCK_LEN != 0 {
        return Err(EnvelopeError::Misaligned {
            version: version_name(EnvelopeVersion::V11),
            len: ciphertext.len(),
        });
    }

    let cipher = Aes128CbcDec::new_from_slices(key, &CBC_IV).map_err(|_| {
        EnvelopeError::InvalidKeyLength {
            expected: 16,
            actual: key.len(),
        }
    })?;

    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| EnvelopeError::PaddingInvalid)
}
