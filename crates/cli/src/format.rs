//! Result → human/json string formatting.
//!
//! Two modes:
//! - **Human** (default): aligned plain text
//! - **JSON** (`--json`): `serde_json::to_string_pretty`

use serde_json::json;
use shardvault_core::{Document, VaultError};
use shardvault_shard::{RebalanceReport, ShardStats};

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

fn pretty(value: serde_json::Value) -> String {
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// Format per-shard statistics.
pub fn format_stats(stats: &[ShardStats], mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => pretty(json!({
            "shards": stats.iter().map(|s| json!({
                "index": s.index,
                "documents": s.documents,
                "file_size": s.file_size,
                "resident": s.resident,
            })).collect::<Vec<_>>(),
        })),
        OutputMode::Human => {
            let mut lines = vec![format!("{:<8} {:>10} {:>12}  resident", "shard", "documents", "size")];
            for s in stats {
                let size = s.file_size.map(human_size).unwrap_or_else(|| "(missing)".to_string());
                lines.push(format!(
                    "{:<8} {:>10} {:>12}  {}",
                    s.index + 1,
                    s.documents,
                    size,
                    if s.resident { "yes" } else { "no" }
                ));
            }
            let total: usize = stats.iter().map(|s| s.documents).sum();
            lines.push(format!("{} shard(s), {} document(s)", stats.len(), total));
            lines.join("\n")
        }
    }
}

/// Format a rebalance outcome.
pub fn format_report(report: &RebalanceReport, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => pretty(json!({
            "from": report.from_count,
            "to": report.to_count,
            "moved": report.moved,
            "failed_moves": report.failed_moves,
        })),
        OutputMode::Human => {
            if report.is_noop() {
                return format!("Already at {} shard(s), nothing to do", report.to_count);
            }
            let mut out = format!(
                "Rebalanced {} -> {} shard(s), moved {} document(s)",
                report.from_count, report.to_count, report.moved
            );
            if report.failed_moves > 0 {
                out.push_str(&format!(
                    "\nwarning: {} document(s) could not be moved",
                    report.failed_moves
                ));
            }
            out
        }
    }
}

/// Format a document lookup.
pub fn format_document(doc: &Document, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => serde_json::to_string_pretty(doc).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e)),
        OutputMode::Human => {
            let m = &doc.metadata;
            let mut lines = vec![
                format!("id:        {}", doc.id),
                format!("path:      {}", m.path),
                format!("title:     {}", m.title),
            ];
            if !m.tags.is_empty() {
                lines.push(format!("tags:      {}", m.tags.join(", ")));
            }
            lines.push(format!("model:     {}", m.embedding_model));
            lines.push(format!("dimension: {}", doc.embedding.len()));
            lines.push(String::new());
            lines.push(doc.content.clone());
            lines.join("\n")
        }
    }
}

/// Format an error.
pub fn format_error(err: &VaultError, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => pretty(json!({ "error": err.to_string() })),
        OutputMode::Human => format!("(error) {}", err),
    }
}
