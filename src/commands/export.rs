//! 시크릿 내보내기 (`{"vscse":true,"vscsemdb":{...}}`)

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use tracing::{instrument, warn};

use super::{broken_secrets_word, print_error, print_summary, secrets_word, BulkSummary};
use crate::error::VscseResult;
use crate::models::{ExportDocument, SecretStatus};
use crate::secrets::SecretStore;

/// 복호화된 시크릿을 JSON 파일로 저장. Error 레코드는 건너뛰고 개수만 셉니다.
#[instrument(skip(store, out), fields(path = %path.display()))]
pub fn export_secrets(
    store: &SecretStore,
    path: &Path,
    out: &mut dyn Write,
) -> VscseResult<BulkSummary> {
    let listing = store.group_by_extension()?;

    let mut document = ExportDocument {
        vscse: true,
        ..Default::default()
    };
    let mut summary = BulkSummary::default();

    for ext in &listing.extensions {
        let mut keys = BTreeMap::new();
        for entry in &ext.entries {
            if entry.status == SecretStatus::Error {
                summary.failed += 1;
                warn!(extension_id = %ext.extension_id, key = %entry.key, "skipping broken secret");
                print_error(
                    out,
                    format!(
                        "failed to export {}/{}: {}",
                        ext.extension_id, entry.key, entry.value
                    ),
                )?;
                continue;
            }
            keys.insert(entry.key.clone(), entry.value.clone());
            summary.succeeded += 1;
        }
        // 성공한 항목이 하나도 없는 확장은 문서에 넣지 않음
        if !keys.is_empty() {
            document.vscsemdb.insert(ext.extension_id.clone(), keys);
        }
    }

    std::fs::write(path, serde_json::to_string_pretty(&document)?)?;

    print_summary(
        out,
        format!("exported {}", secrets_word(summary.succeeded)),
        summary
            .has_failures()
            .then(|| format!(" and skipped {}", broken_secrets_word(summary.failed))),
    )?;
    Ok(summary)
}
