//! 시크릿 가져오기

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use tracing::{instrument, warn};

use super::{broken_secrets_word, print_error, print_summary, secrets_word, BulkSummary};
use crate::error::{VscseError, VscseResult};
use crate::models::SecretIdentifier;
use crate::secrets::SecretStore;

type ImportData = BTreeMap<String, BTreeMap<String, String>>;

/// 내보내기 문서 읽기 + 형식 검증
fn read_import(path: &Path) -> VscseResult<ImportData> {
    let text = std::fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Err(VscseError::InvalidImport("no data in import path".to_string()));
    }

    let json: serde_json::Value = serde_json::from_str(&text)?;
    if json.get("vscse").and_then(|v| v.as_bool()) != Some(true) {
        return Err(VscseError::InvalidImport(
            "invalid data in imported file (missing vscse or vscsemdb)".to_string(),
        ));
    }
    let db = json
        .get("vscsemdb")
        .ok_or_else(|| {
            VscseError::InvalidImport(
                "invalid data in imported file (missing vscse or vscsemdb)".to_string(),
            )
        })?
        .as_object()
        .ok_or_else(|| VscseError::InvalidImport("vscsemdb is not an object".to_string()))?;

    let mut data = ImportData::new();
    for (extension_id, pairs) in db {
        let pairs = pairs.as_object().ok_or_else(|| {
            VscseError::InvalidImport(format!(
                "extension '{extension_id}' does not contain valid key-value pairs"
            ))
        })?;

        let mut keys = BTreeMap::new();
        for (key, value) in pairs {
            let value = value.as_str().ok_or_else(|| {
                VscseError::InvalidImport(format!(
                    "extension '{extension_id}' key '{key}' is not a string"
                ))
            })?;
            keys.insert(key.clone(), value.to_string());
        }
        data.insert(extension_id.clone(), keys);
    }

    Ok(data)
}

/// 문서의 모든 key/value를 암호화해 저장. 개별 실패는 세고 계속 진행합니다.
#[instrument(skip(store, out), fields(path = %path.display()))]
pub fn import_secrets(
    store: &SecretStore,
    path: &Path,
    out: &mut dyn Write,
) -> VscseResult<BulkSummary> {
    let data = read_import(path)?;
    let mut summary = BulkSummary::default();

    for (extension_id, pairs) in &data {
        for (key, value) in pairs {
            let identifier = SecretIdentifier::new(extension_id.as_str(), key.as_str());
            let result = if extension_id.is_empty() || key.is_empty() {
                Err(VscseError::InvalidImport("empty extension id or key".to_string()))
            } else {
                store.write_secret(&identifier, value)
            };

            match result {
                Ok(()) => summary.succeeded += 1,
                Err(err) => {
                    summary.failed += 1;
                    warn!(extension_id = %extension_id, key = %key, error = %err, "import failed");
                    print_error(
                        out,
                        format!("failed to import {}: {err}", identifier.to_row_key()),
                    )?;
                }
            }
        }
    }

    print_summary(
        out,
        format!("imported {}", secrets_word(summary.succeeded)),
        summary
            .has_failures()
            .then(|| format!(" but failed to import {}", broken_secrets_word(summary.failed))),
    )?;
    Ok(summary)
}
