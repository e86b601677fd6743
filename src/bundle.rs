use anyhow::{anyhow, Context};
use rusqlite::Connection;
use serde_json::json;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const REPORTS_DIR: &str = "reports";
pub const BUNDLE_FORMAT_V1: &str = "reportcard-bundle-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub report_count: usize,
}

/// Zips every stored report of `class_id` for hand-off to rendering and
/// delivery: `manifest.json` plus `reports/{id}.json`.
pub fn export_class_reports(
    conn: &Connection,
    class_id: &str,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let mut stmt = conn
        .prepare("SELECT id, payload FROM report_cards WHERE class_id = ? ORDER BY id")
        .context("failed to query stored reports")?;
    let reports = stmt
        .query_map([class_id], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to read stored reports")?;
    if reports.is_empty() {
        return Err(anyhow!("no stored reports for class {}", class_id));
    }

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let exported_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": exported_at,
        "classId": class_id,
        "reportIds": reports.iter().map(|(id, _)| id.clone()).collect::<Vec<_>>(),
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    for (id, payload) in &reports {
        let entry = format!("{}/{}.json", REPORTS_DIR, id);
        zip.start_file(entry.as_str(), opts)
            .with_context(|| format!("failed to start entry {}", entry))?;
        zip.write_all(payload.as_bytes())
            .with_context(|| format!("failed to write entry {}", entry))?;
    }

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        report_count: reports.len(),
    })
}
