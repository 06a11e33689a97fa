//! Secret Service 바인딩
//!
//! libsecret이 저장한 항목은 `xdg:schema` attribute에 스키마 이름을 갖습니다.
//! 스키마 + 단일 attribute로 검색하고, 잠긴 항목은 unlock 후 읽습니다.

use std::collections::HashMap;

use secret_service::blocking::SecretService;
use secret_service::EncryptionType;
use tracing::debug;

use super::{KeyProtectionError, SecretLookup};

const SCHEMA_ATTRIBUTE: &str = "xdg:schema";

/// D-Bus Secret Service 조회기
#[derive(Debug, Default, Clone, Copy)]
pub struct SecretServiceLookup;

fn backend(err: secret_service::Error) -> KeyProtectionError {
    KeyProtectionError::Backend(err.to_string())
}

impl SecretLookup for SecretServiceLookup {
    fn lookup_secret(
        &self,
        schema: &str,
        attribute: &str,
        value: &str,
    ) -> Result<String, KeyProtectionError> {
        let service = SecretService::connect(EncryptionType::Dh)
            .map_err(|e| KeyProtectionError::Unavailable(e.to_string()))?;

        let attributes = HashMap::from([(SCHEMA_ATTRIBUTE, schema), (attribute, value)]);
        let found = service.search_items(attributes).map_err(backend)?;
        debug!(
            unlocked = found.unlocked.len(),
            locked = found.locked.len(),
            application = value,
            "secret service search"
        );

        let item = match (found.unlocked.first(), found.locked.first()) {
            (Some(item), _) => item,
            (None, Some(item)) => {
                item.unlock().map_err(backend)?;
                item
            }
            (None, None) => {
                return Err(KeyProtectionError::NotFound {
                    schema: schema.to_string(),
                    attribute: attribute.to_string(),
                    value: value.to_string(),
                })
            }
        };

        let secret = item.get_secret().map_err(backend)?;
        String::from_utf8(secret)
            .map_err(|_| KeyProtectionError::Backend("keyring secret is not valid UTF-8".into()))
    }
}
