use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use crewcert::services::csv_importer::{self, ImportReport};
use crewcert::services::image_assets::UploadPolicy;
use tracing::info;

pub fn write_template(output: &Path) -> Result<()> {
    fs::write(output, csv_importer::template_csv())
        .with_context(|| format!("Failed to write template to {}", output.display()))?;
    info!("Wrote CSV template to {}", output.display());
    println!("{}", output.display());
    Ok(())
}

/// Reads a participants CSV through the upload policy and parses it.
pub fn read_participants(csv: &Path) -> Result<ImportReport> {
    let bytes = UploadPolicy::csv()
        .read(csv)
        .with_context(|| format!("Failed to read {}", csv.display()))?;
    let raw = String::from_utf8(bytes)
        .with_context(|| format!("{} is not valid UTF-8", csv.display()))?;
    let report = csv_importer::parse_with_report(&raw, chrono::Utc::now().timestamp_millis())
        .with_context(|| format!("Failed to import {}", csv.display()))?;
    info!(
        "Imported {} participants from {} ({} skipped)",
        report.records.len(),
        csv.display(),
        report.skipped()
    );
    Ok(report)
}

pub fn run(csv: &Path, json: bool) -> Result<()> {
    let report = read_participants(csv)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report.records)?);
        return Ok(());
    }
    println!(
        "{} participants accepted, {} rows skipped",
        report.records.len(),
        report.skipped()
    );
    if !report.incomplete_rows.is_empty() {
        println!("Rows missing name or time: {:?}", report.incomplete_rows);
    }
    for record in &report.records {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            record.name, record.distance, record.time, record.date, record.place
        );
    }
    Ok(())
}
