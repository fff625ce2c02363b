//! Report generation for carving runs
//!
//! Reports are built from a finished [`CarveReport`] and the sink results that
//! line up with it. They can be rendered as the plain console listing, as
//! JSON for machine consumption, or as a single self-contained HTML page.

use chrono::Local;
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::error::{RecoveryError, Result, SinkError};
use crate::sink::Receipt;
use crate::types::{CarveReport, ScanStats};

/// Report metadata
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Report generation timestamp
    pub timestamp: String,
    pub tool_name: String,
    pub version: String,
    pub image_path: String,
    pub image_size: u64,
    /// `None` for dry runs
    pub output_dir: Option<String>,
}

/// One carved file as it appears in a report
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub sequence: u64,
    pub file_name: String,
    pub format: String,
    pub start_offset: u64,
    pub end_offset: u64,
    pub start_offset_hex: String,
    pub end_offset_hex: String,
    pub size_bytes: u64,
    /// The declared size ran past the image and was cut short
    pub clamped: bool,
    pub digest_algorithm: Option<String>,
    pub digest_hex: Option<String>,
    pub path: Option<String>,
    pub error: Option<String>,
}

/// Full report of a carving run
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryReport {
    pub metadata: ReportMetadata,
    pub entries: Vec<ReportEntry>,
    pub stats: ScanStats,
    pub files_found: usize,
    pub files_recovered: usize,
    pub scan_time_sec: f64,
}

impl RecoveryReport {
    /// Combine the carve results with the sink outcome of each file
    pub fn build(
        metadata: ReportMetadata,
        carve: &CarveReport<'_>,
        outcomes: &[std::result::Result<Receipt, SinkError>],
    ) -> Self {
        let entries: Vec<ReportEntry> = carve
            .files
            .iter()
            .zip(outcomes.iter())
            .map(|(file, outcome)| {
                let (receipt, error) = match outcome {
                    Ok(receipt) => (Some(receipt), None),
                    Err(e) => (None, Some(e.to_string())),
                };

                ReportEntry {
                    sequence: file.sequence,
                    file_name: file.file_name(),
                    format: file.format_id().to_string(),
                    start_offset: file.start.as_u64(),
                    end_offset: file.end.as_u64(),
                    start_offset_hex: file.start.to_string(),
                    end_offset_hex: file.end.to_string(),
                    size_bytes: file.byte_length().as_u64(),
                    clamped: file.clamped,
                    digest_algorithm: receipt.map(|r| r.algorithm.label().to_string()),
                    digest_hex: receipt.map(|r| r.digest_hex.clone()),
                    path: receipt
                        .and_then(|r| r.path.as_ref())
                        .map(|p| p.display().to_string()),
                    error,
                }
            })
            .collect();

        let files_recovered = entries.iter().filter(|e| e.error.is_none()).count();

        Self {
            metadata,
            files_found: carve.files.len(),
            files_recovered,
            entries,
            stats: carve.stats.clone(),
            scan_time_sec: carve.duration_secs,
        }
    }

    /// Console listing, one block per file and a final count
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        for entry in &self.entries {
            let _ = writeln!(
                out,
                "{}, Start Offset: {}, End Offset: {}",
                entry.file_name, entry.start_offset_hex, entry.end_offset_hex
            );
            match (&entry.digest_algorithm, &entry.digest_hex, &entry.error) {
                (Some(alg), Some(hex), _) => {
                    let _ = writeln!(out, "{}: {}", alg, hex);
                }
                (_, _, Some(err)) => {
                    let _ = writeln!(out, "Digest unavailable: {}", err);
                }
                _ => {}
            }
            if entry.clamped {
                let _ = writeln!(out, "Warning: file truncated at the end of the image");
            }
            out.push('\n');
        }

        for format in &self.stats.failed_formats {
            let _ = writeln!(out, "Warning: {} scan aborted, format skipped", format);
        }

        let _ = writeln!(out, "Total number of files found: {}", self.files_found);
        if self.files_recovered != self.files_found {
            let _ = writeln!(out, "Files recovered: {}", self.files_recovered);
        }

        out
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?).map_err(RecoveryError::Io)
    }

    /// Self-contained HTML page with one table row per file
    pub fn render_html(&self) -> String {
        let esc = |s: &str| html_escape::encode_text(s).into_owned();
        let mut rows = String::new();

        for entry in &self.entries {
            let digest = match (&entry.digest_hex, &entry.error) {
                (Some(hex), _) => esc(hex),
                (None, Some(err)) => format!("<em>{}</em>", esc(err)),
                (None, None) => String::new(),
            };
            let _ = writeln!(
                rows,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td><code>{}</code></td></tr>",
                esc(&entry.file_name),
                esc(&entry.format),
                esc(&entry.start_offset_hex),
                esc(&entry.end_offset_hex),
                entry.size_bytes,
                if entry.clamped { "truncated" } else { "" },
                digest
            );
        }

        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Carving Report</title></head>
<body>
<h1>Carving Report</h1>
<p>Image: {} ({} bytes)</p>
<p>Generated: {} by {} {}</p>
<table>
<tr><th>File</th><th>Format</th><th>Start</th><th>End</th><th>Size</th><th>Notes</th><th>Digest</th></tr>
{}</table>
<p>Files found: {}</p>
<p>Files recovered: {}</p>
<p>Scan time: {:.3}s</p>
</body>
</html>
"#,
            esc(&self.metadata.image_path),
            self.metadata.image_size,
            esc(&self.metadata.timestamp),
            esc(&self.metadata.tool_name),
            esc(&self.metadata.version),
            rows,
            self.files_found,
            self.files_recovered,
            self.scan_time_sec
        )
    }

    pub fn write_html(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render_html()).map_err(RecoveryError::Io)
    }
}

/// Helper function to create metadata from scan parameters
pub fn create_report_metadata(
    image_path: &str,
    image_size: u64,
    output_dir: Option<&str>,
    version: &str,
) -> ReportMetadata {
    ReportMetadata {
        timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        tool_name: "Sector Carver".to_string(),
        version: version.to_string(),
        image_path: image_path.to_string(),
        image_size,
        output_dir: output_dir.map(str::to_string),
    }
}
