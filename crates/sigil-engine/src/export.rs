//! Export: audit trails and lifecycle ledgers as JSON / JSONL files
//!
//! JSON exports carry a metadata summary block (counts, success rate,
//! per-category failure breakdown); JSONL exports are one record per
//! line for streaming tooling.

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use sigil_types::{BindingAttempt, LedgerEvent, SigilResult, SinkError};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Output format for exports
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    /// One document with a metadata block
    Json,
    /// One record per line, no metadata
    Jsonl,
}

/// Export the full audit trail as a JSON document with metadata
pub fn export_trail_json(trail: &[BindingAttempt], path: impl AsRef<Path>) -> SigilResult<()> {
    let document = json!({
        "metadata": trail_metadata(trail),
        "audit_trail": trail,
    });
    write_json(path, &document)
}

/// Export the full audit trail as JSONL
pub fn export_trail_jsonl(trail: &[BindingAttempt], path: impl AsRef<Path>) -> SigilResult<()> {
    write_jsonl(path, trail)
}

/// Export a subset of the trail filtered by success flag; returns the
/// number of records exported
pub fn export_trail_filtered(
    trail: &[BindingAttempt],
    path: impl AsRef<Path>,
    format: ExportFormat,
    success: Option<bool>,
) -> SigilResult<usize> {
    let filtered: Vec<&BindingAttempt> = trail
        .iter()
        .filter(|attempt| success.map(|wanted| attempt.success == wanted).unwrap_or(true))
        .collect();

    match format {
        ExportFormat::Json => {
            let owned: Vec<BindingAttempt> = filtered.iter().map(|a| (*a).clone()).collect();
            let document = json!({
                "metadata": trail_metadata(&owned),
                "audit_trail": owned,
            });
            write_json(path, &document)?;
        }
        ExportFormat::Jsonl => write_jsonl(path, &filtered)?,
    }
    Ok(filtered.len())
}

/// Export the lifecycle ledger as a JSON document with a transition
/// breakdown
pub fn export_ledger_json(ledger: &[LedgerEvent], path: impl AsRef<Path>) -> SigilResult<()> {
    let mut breakdown: BTreeMap<String, usize> = BTreeMap::new();
    for event in ledger {
        let from = event
            .from
            .map(|phase| phase.to_string())
            .unwrap_or_else(|| "created".to_string());
        *breakdown.entry(format!("{} -> {}", from, event.to)).or_insert(0) += 1;
    }

    let document = json!({
        "metadata": {
            "generated_at": Utc::now().to_rfc3339(),
            "engine_version": env!("CARGO_PKG_VERSION"),
            "total_transitions": ledger.len(),
            "transition_breakdown": breakdown,
        },
        "ledger": ledger,
    });
    write_json(path, &document)
}

/// Export the lifecycle ledger as JSONL
pub fn export_ledger_jsonl(ledger: &[LedgerEvent], path: impl AsRef<Path>) -> SigilResult<()> {
    write_jsonl(path, ledger)
}

fn trail_metadata(trail: &[BindingAttempt]) -> serde_json::Value {
    let total = trail.len();
    let successes = trail.iter().filter(|a| a.success).count();
    let failures = total - successes;

    let mut breakdown: BTreeMap<String, usize> = BTreeMap::new();
    for attempt in trail.iter().filter(|a| !a.success) {
        for reason in &attempt.failure_reasons {
            *breakdown.entry(reason.category().to_string()).or_insert(0) += 1;
        }
    }

    let success_rate = if total > 0 {
        successes as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    json!({
        "generated_at": Utc::now().to_rfc3339(),
        "engine_version": env!("CARGO_PKG_VERSION"),
        "total_attempts": total,
        "success_count": successes,
        "failure_count": failures,
        "success_rate": success_rate,
        "failure_breakdown": breakdown,
    })
}

fn write_json(path: impl AsRef<Path>, document: &serde_json::Value) -> SigilResult<()> {
    let path = path.as_ref();
    create_parent(path)?;
    let file = File::create(path).map_err(SinkError::Io)?;
    serde_json::to_writer_pretty(BufWriter::new(file), document).map_err(SinkError::Serialize)?;
    Ok(())
}

fn write_jsonl<T: Serialize>(path: impl AsRef<Path>, records: &[T]) -> SigilResult<()> {
    let path = path.as_ref();
    create_parent(path)?;
    let file = File::create(path).map_err(SinkError::Io)?;
    let mut writer = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut writer, record).map_err(SinkError::Serialize)?;
        writer.write_all(b"\n").map_err(SinkError::Io)?;
    }
    writer.flush().map_err(SinkError::Io)?;
    Ok(())
}

fn create_parent(path: &Path) -> SigilResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(SinkError::Io)?;
        }
    }
    Ok(())
}
