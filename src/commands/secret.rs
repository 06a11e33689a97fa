//! 시크릿 단건 명령어 (get / set / rm)

use std::io::Write;

use console::style;
use tracing::info;

use super::styled_value;
use crate::error::{VscseError, VscseResult};
use crate::models::SecretIdentifier;
use crate::secrets::SecretStore;

fn require<'a>(value: &'a str, what: &str) -> VscseResult<&'a str> {
    if value.is_empty() {
        return Err(VscseError::InvalidOperation(format!("no {what} provided")));
    }
    Ok(value)
}

/// 시크릿 하나 복호화 후 출력
pub fn get_secret(
    store: &SecretStore,
    extension_id: &str,
    key: &str,
    out: &mut dyn Write,
) -> VscseResult<()> {
    let extension_id = require(extension_id, "extension id")?;
    let key = require(key, "key")?;

    let identifiers = store.identifiers()?;
    if !identifiers.iter().any(|id| id.extension_id == extension_id) {
        return Err(VscseError::InvalidOperation(
            "no keys from that extension".to_string(),
        ));
    }

    let identifier = SecretIdentifier::new(extension_id, key);
    if !identifiers.contains(&identifier) {
        return Err(VscseError::InvalidOperation(
            "no key from that extension".to_string(),
        ));
    }

    let record = store.read_secret(&identifier);
    writeln!(
        out,
        "{}",
        styled_value(&record.value, record.status, identifier.is_builtin())
    )?;
    Ok(())
}

/// 암호화 후 저장 (기존 값은 교체)
pub fn set_secret(
    store: &SecretStore,
    extension_id: &str,
    key: &str,
    value: &str,
    out: &mut dyn Write,
) -> VscseResult<()> {
    let identifier = SecretIdentifier::new(
        require(extension_id, "extension id")?,
        require(key, "key")?,
    );
    let value = require(value, "value")?;

    store.write_secret(&identifier, value)?;
    info!(extension_id, key, "secret set");
    writeln!(
        out,
        "{}",
        style(format!("set key {} successfully", identifier.to_row_key())).green()
    )?;
    Ok(())
}

/// 시크릿 행 삭제
pub fn remove_secret(
    store: &SecretStore,
    extension_id: &str,
    key: &str,
    out: &mut dyn Write,
) -> VscseResult<()> {
    let identifier = SecretIdentifier::new(
        require(extension_id, "extension id")?,
        require(key, "key")?,
    );

    if !store.delete_secret(&identifier)? {
        return Err(VscseError::InvalidOperation("key doesn't exist".to_string()));
    }

    info!(extension_id, key, "secret removed");
    writeln!(
        out,
        "{}",
        style(format!("deleted key {} successfully", identifier.to_row_key())).green()
    )?;
    Ok(())
}
