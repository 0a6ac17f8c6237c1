//! Batch masking of a CSV email export.

use std::path::Path;

use mailmask_core::{Error, Result};
use mailmask_pii::Masker;
use tracing::info;

const PROGRESS_EVERY: usize = 100;

/// Summary of a batch masking run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub rows: usize,
    pub entities: usize,
}

/// Mask the `email` column of every row in `input` and write `output`.
///
/// Output keeps all input columns in order and appends `masked_body` and
/// `entities` (a JSON array of entity records).
pub fn mask_csv(masker: &Masker, input: &Path, output: &Path) -> Result<BatchReport> {
    let mut reader = csv::Reader::from_path(input)?;
    let headers = reader.headers()?.clone();
    let email_idx = headers
        .iter()
        .position(|h| h == "email")
        .ok_or_else(|| Error::MissingColumn(format!("'email' not found in {}", input.display())))?;

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = csv::Writer::from_path(output)?;
    let mut out_headers = headers.clone();
    out_headers.push_field("masked_body");
    out_headers.push_field("entities");
    writer.write_record(&out_headers)?;

    let mut report = BatchReport { rows: 0, entities: 0 };
    for record in reader.records() {
        let mut record = record?;
        let body = record.get(email_idx).unwrap_or_default();
        let masked = masker.mask(body)?;
        let entities = serde_json::to_string(&masked.entities)?;

        report.entities += masked.entities.len();
        record.push_field(&masked.masked_text);
        record.push_field(&entities);
        writer.write_record(&record)?;

        report.rows += 1;
        if report.rows % PROGRESS_EVERY == 0 {
            info!("Masked {} emails", report.rows);
        }
    }
    writer.flush()?;

    info!(
        "Masked {} emails ({} entities) into {}",
        report.rows,
        report.entities,
        output.display()
    );
    Ok(report)
}
