//! 시크릿 목록 출력

use std::io::Write;

use console::style;
use tracing::instrument;

use super::{styled_value, BulkSummary};
use crate::error::VscseResult;
use crate::models::SecretStatus;
use crate::secrets::SecretStore;

/// 확장 id 순, 확장 안에서는 key 순으로 출력
#[instrument(skip(store, out))]
pub fn list_secrets(
    store: &SecretStore,
    filter: Option<&str>,
    out: &mut dyn Write,
) -> VscseResult<BulkSummary> {
    let mut listing = store.group_by_extension()?;
    if listing.is_empty() {
        writeln!(out, "{}", style("no secrets found").blue())?;
        return Ok(BulkSummary::default());
    }

    listing
        .extensions
        .sort_by(|a, b| a.extension_id.cmp(&b.extension_id));

    let mut summary = BulkSummary::default();
    for ext in listing
        .extensions
        .iter_mut()
        .filter(|ext| filter.map_or(true, |f| ext.extension_id == f))
    {
        let builtin = ext.extension_id.starts_with("vscode.");
        let header = if builtin {
            style(&ext.extension_id).dim()
        } else {
            style(&ext.extension_id).cyan()
        };
        writeln!(out, "{header}")?;

        ext.entries.sort_by(|a, b| a.key.cmp(&b.key));
        for entry in &ext.entries {
            match entry.status {
                SecretStatus::Ok => summary.succeeded += 1,
                SecretStatus::Error => summary.failed += 1,
            }
            writeln!(
                out,
                "  {}: {}",
                entry.key,
                styled_value(&entry.value, entry.status, builtin)
            )?;
        }
    }

    Ok(summary)
}
