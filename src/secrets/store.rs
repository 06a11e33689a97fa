//! Secret Store - ItemTable 행과 시크릿 레코드 사이의 변환
//!
//! - 행 키: `secret://{"extensionId":..,"key":..}`
//! - 행 값: `{"type":"Buffer","data":[...]}` 안에 봉투 바이트
//! - 한 행의 복호화 실패는 Error 레코드가 되며 일괄 작업을 멈추지 않음

use tracing::{debug, info, instrument, warn};

use crate::db::Database;
use crate::error::{SecretError, VscseError};
use crate::models::{
    BufferValue, SecretEntry, SecretIdentifier, SecretRecord, SecretStatus, SECRET_PREFIX,
};
use crate::secrets::provider::{KeyFamily, KeyProvider};

/// 확장 하나의 시크릿 목록
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionSecrets {
    pub extension_id: String,
    pub entries: Vec<SecretEntry>,
}

/// `group_by_extension()` 결과
///
/// 확장 순서는 발견 순서, 항목 순서는 보장하지 않습니다 (정렬은 호출자 몫).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretListing {
    pub extensions: Vec<ExtensionSecrets>,
}

impl SecretListing {
    fn push(&mut self, record: SecretRecord) {
        let extension_id = record.identifier.extension_id.clone();
        let entry = SecretEntry::from(record);
        match self
            .extensions
            .iter_mut()
            .find(|ext| ext.extension_id == extension_id)
        {
            Some(ext) => ext.entries.push(entry),
            None => self.extensions.push(ExtensionSecrets {
                extension_id,
                entries: vec![entry],
            }),
        }
    }

    pub fn get(&self, extension_id: &str) -> Option<&ExtensionSecrets> {
        self.extensions
            .iter()
            .find(|ext| ext.extension_id == extension_id)
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// 성공 항목 (extensionId, entry)
    pub fn successes(&self) -> impl Iterator<Item = (&str, &SecretEntry)> {
        self.iter().filter(|(_, e)| e.status == SecretStatus::Ok)
    }

    /// 실패 항목 (extensionId, entry)
    pub fn failures(&self) -> impl Iterator<Item = (&str, &SecretEntry)> {
        self.iter().filter(|(_, e)| e.status == SecretStatus::Error)
    }

    pub fn succeeded(&self) -> usize {
        self.successes().count()
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &SecretEntry)> {
        self.extensions.iter().flat_map(|ext| {
            ext.entries
                .iter()
                .map(move |entry| (ext.extension_id.as_str(), entry))
        })
    }
}

/// vscdb 위의 시크릿 어댑터
///
/// DB 핸들과 키 provider를 수명 동안 독점합니다.
pub struct SecretStore {
    db: Database,
    provider: KeyProvider,
}

impl SecretStore {
    /// 키를 아직 유도하지 않은 상태로 생성
    pub fn new(db: Database, provider: KeyProvider) -> Self {
        Self { db, provider }
    }

    /// 생성 후 raw key를 즉시 유도
    ///
    /// 키 유도 실패는 세션 치명 에러이므로 시크릿을 하나도 건드리기 전에 실패합니다.
    pub fn open(db: Database, provider: KeyProvider) -> Result<Self, VscseError> {
        provider.ensure_key()?;
        Ok(Self::new(db, provider))
    }

    pub fn family(&self) -> KeyFamily {
        self.provider.family()
    }

    /// `secret://`로 시작하는 모든 행 키
    pub fn list_secret_identifiers(&self) -> Result<Vec<String>, VscseError> {
        self.db.keys_with_prefix(SECRET_PREFIX)
    }

    /// 파싱 가능한 식별자만 (형식이 다른 행은 건너뜀)
    pub fn identifiers(&self) -> Result<Vec<SecretIdentifier>, VscseError> {
        Ok(self
            .list_secret_identifiers()?
            .iter()
            .filter_map(|raw| {
                let id = SecretIdentifier::parse(raw);
                if id.is_none() {
                    debug!(row = %raw, "skipping unaddressable secret row");
                }
                id
            })
            .collect())
    }

    /// 시크릿 하나 읽기. 실패해도 에러 대신 Error 레코드를 반환합니다.
    pub fn read_secret(&self, identifier: &SecretIdentifier) -> SecretRecord {
        match self.try_read(identifier) {
            Ok(value) => SecretRecord::ok(identifier.clone(), value),
            Err(err) => {
                warn!(
                    extension_id = %identifier.extension_id,
                    key = %identifier.key,
                    error = %err,
                    "secret could not be decrypted"
                );
                SecretRecord::error(identifier.clone(), err)
            }
        }
    }

    /// 행의 봉투 바이트 (복호화 전)
    pub fn read_raw(&self, identifier: &SecretIdentifier) -> Result<Vec<u8>, SecretError> {
        let raw = self
            .db
            .get_value(&identifier.to_row_key())
            .map_err(|err| match err {
                VscseError::Database(e) => SecretError::Database(e),
                other => SecretError::MalformedRow(other.to_string()),
            })?
            .ok_or(SecretError::NotFound)?;
        parse_buffer(&raw)
    }

    fn try_read(&self, identifier: &SecretIdentifier) -> Result<String, SecretError> {
        let envelope = self.read_raw(identifier)?;
        let plaintext = self.provider.decrypt(&envelope)?;
        String::from_utf8(plaintext).map_err(|_| SecretError::InvalidUtf8)
    }

    /// 암호화 후 upsert (같은 식별자는 통째로 교체)
    pub fn write_secret(
        &self,
        identifier: &SecretIdentifier,
        plaintext: &str,
    ) -> Result<(), VscseError> {
        let envelope = self.provider.encrypt(plaintext.as_bytes())?;
        let value = serde_json::to_string(&BufferValue::new(envelope))?;
        self.db.put_value(&identifier.to_row_key(), &value)?;
        debug!(extension_id = %identifier.extension_id, key = %identifier.key, "secret written");
        Ok(())
    }

    /// 삭제된 행이 있으면 true
    pub fn delete_secret(&self, identifier: &SecretIdentifier) -> Result<bool, VscseError> {
        self.db.delete(&identifier.to_row_key())
    }

    pub fn has_secret(&self, identifier: &SecretIdentifier) -> Result<bool, VscseError> {
        self.db.contains(&identifier.to_row_key())
    }

    /// 모든 시크릿 행을 한 번 순회하며 확장별로 묶기
    #[instrument(skip(self))]
    pub fn group_by_extension(&self) -> Result<SecretListing, VscseError> {
        let mut listing = SecretListing::default();
        for identifier in self.identifiers()? {
            listing.push(self.read_secret(&identifier));
        }
        info!(
            extensions = listing.extensions.len(),
            ok = listing.succeeded(),
            failed = listing.failed(),
            "secrets grouped"
        );
        Ok(listing)
    }
}

/// `{"type":"Buffer","data":[...]}` 에서 바이트 추출
fn parse_buffer(raw: &[u8]) -> Result<Vec<u8>, SecretError> {
    let value: serde_json::Value =
        serde_json::from_slice(raw).map_err(|e| SecretError::MalformedRow(e.to_string()))?;

    match value.get("type").and_then(|t| t.as_str()) {
        Some(BufferValue::KIND) => {}
        Some(other) => return Err(SecretError::UnsupportedEncoding(other.to_string())),
        None => {
            return Err(SecretError::MalformedRow(
                "missing \"type\" field".to_string(),
            ))
        }
    }

    let buffer: BufferValue =
        serde_json::from_value(value).map_err(|e| SecretError::MalformedRow(e.to_string()))?;
    Ok(buffer.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protect::fakes::{MapLookup, UnavailableLookup, XorProtector};
    use crate::secrets::provider::test_support::{
        dpapi_provider, dpapi_provider_with, keyring_provider,
    };
    use crate::secrets::provider::KeySource;

    const V10_TOKEN: &str = "76313042424242424242424242424269f754aae4f3c0c129401d755b53d96aae6f3c7f3d9db06f2b480e";

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    fn buffer_json(bytes: &[u8]) -> String {
        serde_json::to_string(&BufferValue::new(bytes.to_vec())).unwrap()
    }

    fn keyring_store() -> SecretStore {
        SecretStore::open(Database::in_memory().unwrap(), keyring_provider()).unwrap()
    }

    #[test]
    fn test_open_fails_without_key() {
        let provider = KeyProvider::new(KeySource::Keyring {
            lookup: Box::new(MapLookup::default()),
        });
        let err = SecretStore::open(Database::in_memory().unwrap(), provider)
            .err()
            .unwrap();
        assert_eq!(err.code(), "KEY_DERIVATION_FAILED");
    }

    #[test]
    fn test_open_reports_missing_keyring_service() {
        let provider = KeyProvider::new(KeySource::Keyring {
            lookup: Box::new(UnavailableLookup::default()),
        });
        let err = SecretStore::open(Database::in_memory().unwrap(), provider)
            .err()
            .unwrap();
        assert_eq!(err.code(), "KEY_PROTECTION_UNAVAILABLE");
        assert!(err.to_string().contains("org.freedesktop.secrets"));
    }

    #[test]
    fn test_open_reports_dpapi_call_failure() {
        let dir = tempfile::tempdir().unwrap();
        let provider = dpapi_provider_with(&dir, &[9u8; 32], XorProtector::failing());
        let err = SecretStore::open(Database::in_memory().unwrap(), provider)
            .err()
            .unwrap();
        assert_eq!(err.code(), "KEY_PROTECTION_UNAVAILABLE");
        assert!(err.to_string().contains("CryptUnprotectData"));
    }

    #[test]
    fn test_write_then_read() {
        let store = keyring_store();
        let id = SecretIdentifier::new("acme.ext", "token");

        store.write_secret(&id, "s3cr3t").unwrap();
        assert!(store.has_secret(&id).unwrap());

        let rec = store.read_secret(&id);
        assert_eq!(rec.status, SecretStatus::Ok);
        assert_eq!(rec.value, "s3cr3t");
        assert_eq!(&store.read_raw(&id).unwrap()[..3], b"v11");
    }

    #[test]
    fn test_write_replaces_previous_value() {
        let store = keyring_store();
        let id = SecretIdentifier::new("acme.ext", "token");

        store.write_secret(&id, "first").unwrap();
        store.write_secret(&id, "second").unwrap();

        assert_eq!(store.list_secret_identifiers().unwrap().len(), 1);
        assert_eq!(store.read_secret(&id).value, "second");
    }

    #[test]
    fn test_delete_secret() {
        let store = keyring_store();
        let id = SecretIdentifier::new("acme.ext", "token");
        store.write_secret(&id, "x").unwrap();

        assert!(store.delete_secret(&id).unwrap());
        assert!(!store.has_secret(&id).unwrap());
        assert!(!store.delete_secret(&id).unwrap());
    }

    #[test]
    fn test_missing_row_is_error_record() {
        let store = keyring_store();
        let rec = store.read_secret(&SecretIdentifier::new("a", "b"));
        assert_eq!(rec.status, SecretStatus::Error);
        assert_eq!(rec.value, "[Decryption Error: Key not found]");
    }

    #[test]
    fn test_malformed_rows_are_error_records() {
        let store = keyring_store();
        let text = SecretIdentifier::new("a", "text");
        let junk = SecretIdentifier::new("a", "junk");
        let shape = SecretIdentifier::new("a", "shape");
        store.db.put_value(&text.to_row_key(), r#"{"type":"Text","data":[1]}"#).unwrap();
        store.db.put_value(&junk.to_row_key(), "not json").unwrap();
        store.db.put_value(&shape.to_row_key(), r#"{"type":"Buffer","data":"x"}"#).unwrap();

        let rec = store.read_secret(&text);
        assert_eq!(rec.value, "[Decryption Error: Text is not a supported encoding type]");
        assert_eq!(store.read_secret(&junk).status, SecretStatus::Error);
        assert_eq!(store.read_secret(&shape).status, SecretStatus::Error);
    }

    #[test]
    fn test_non_utf8_plaintext_is_error() {
        let store = keyring_store();
        let id = SecretIdentifier::new("a", "bin");
        let envelope = store.provider.encrypt(&[0xff, 0xfe]).unwrap();
        store.db.put_value(&id.to_row_key(), &buffer_json(&envelope)).unwrap();

        let rec = store.read_secret(&id);
        assert_eq!(rec.status, SecretStatus::Error);
        assert!(rec.value.contains("UTF-8"));
    }

    #[test]
    fn test_group_by_extension_survives_corrupt_row() {
        let dir = tempfile::tempdir().unwrap();
        let key: Vec<u8> = (0u8..32).collect();
        let store =
            SecretStore::open(Database::in_memory().unwrap(), dpapi_provider(&dir, &key)).unwrap();

        let good = SecretIdentifier::new("acme.ext", "token");
        let bad = SecretIdentifier::new("acme.ext", "broken");
        let envelope = hex(V10_TOKEN);
        let mut corrupted = envelope.clone();
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0x01;

        store.db.put_value(&good.to_row_key(), &buffer_json(&envelope)).unwrap();
        store.db.put_value(&bad.to_row_key(), &buffer_json(&corrupted)).unwrap();

        let listing = store.group_by_extension().unwrap();
        let ext = listing.get("acme.ext").unwrap();
        assert_eq!(ext.entries.len(), 2);

        let token = ext.entries.iter().find(|e| e.key == "token").unwrap();
        assert_eq!(token.status, SecretStatus::Ok);
        assert_eq!(token.value, "sk-live-123");

        let broken = ext.entries.iter().find(|e| e.key == "broken").unwrap();
        assert_eq!(broken.status, SecretStatus::Error);
        assert!(!broken.value.is_empty());

        assert_eq!(listing.succeeded(), 1);
        assert_eq!(listing.failed(), 1);
    }

    #[test]
    fn test_group_skips_unaddressable_rows() {
        let store = keyring_store();
        store.db.put_value("secret://not-json", "x").unwrap();
        store.db.put_value("workbench.panel", "x").unwrap();
        store
            .write_secret(&SecretIdentifier::new("b.ext", "k"), "v")
            .unwrap();
        store
            .write_secret(&SecretIdentifier::new("a.ext", "k"), "v")
            .unwrap();

        let listing = store.group_by_extension().unwrap();
        assert_eq!(listing.extensions.len(), 2);
        assert_eq!(listing.failed(), 0);
        assert!(listing.get("a.ext").is_some());
    }

    #[test]
    fn test_keyring_store_rejects_v10_rows() {
        let store = keyring_store();
        let id = SecretIdentifier::new("acme.ext", "token");
        store.db.put_value(&id.to_row_key(), &buffer_json(&hex(V10_TOKEN))).unwrap();

        let rec = store.read_secret(&id);
        assert_eq!(rec.status, SecretStatus::Error);
        assert!(rec.value.contains("v10"));
    }
}
