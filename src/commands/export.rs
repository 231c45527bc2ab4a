use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use crewcert::models::ParticipantDraft;
use crewcert::services::config_loader::{CrewcertConfig, load_config};
use crewcert::services::distance::format_time_input;
use crewcert::services::exporter::{CertificateExporter, DirectorySink};
use crewcert::services::rasterizer::SvgRasterizer;
use crewcert::services::registry::ParticipantRegistry;
use crewcert::services::renderer::CertificateRenderer;
use tracing::{info, warn};

use super::import::read_participants;
use super::{AddArgs, ExportArgs};

fn build_exporter(
    config: &CrewcertConfig,
    output_dir: Option<PathBuf>,
) -> (CertificateExporter, PathBuf) {
    let output_dir = output_dir.unwrap_or_else(|| config.export.output_dir.clone());
    let exporter = CertificateExporter::new(
        CertificateRenderer::new(config.export.render_settings()),
        Arc::new(SvgRasterizer::new(&config.font_dirs())),
        Arc::new(DirectorySink::new(output_dir.clone())),
        config.export.export_settings(),
    );
    (exporter, output_dir)
}

pub async fn run_batch(args: ExportArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let template = config.build_template()?;

    let mut registry = ParticipantRegistry::new();
    registry.extend(read_participants(&args.csv)?.records);

    let ids: HashSet<String> = if args.names.is_empty() {
        registry.iter().map(|record| record.id.clone()).collect()
    } else {
        for name in &args.names {
            if !registry.iter().any(|record| &record.name == name) {
                warn!("No participant named {} in {}", name, args.csv.display());
            }
        }
        registry
            .iter()
            .filter(|record| args.names.contains(&record.name))
            .map(|record| record.id.clone())
            .collect()
    };
    let selected = registry.select(&ids);
    if selected.is_empty() {
        bail!("No participants selected for export");
    }

    let (exporter, output_dir) = build_exporter(&config, args.output_dir);
    let report = exporter
        .export_many(selected, &template)
        .await
        .context("Certificate export failed")?;
    println!(
        "Exported {} certificates to {}",
        report.len(),
        output_dir.display()
    );
    Ok(())
}

pub async fn run_single(args: AddArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let template = config.build_template()?;

    let defaults = ParticipantDraft::default();
    let draft = ParticipantDraft {
        name: args.name,
        time: format_time_input(&args.time),
        distance: args.distance.unwrap_or(defaults.distance),
        date: args.date.unwrap_or(defaults.date),
        place: args.place.unwrap_or(defaults.place),
    };

    let mut registry = ParticipantRegistry::new();
    let participant = registry.add_draft(draft)?.clone();
    info!("Exporting certificate for {}", participant.name);

    let (exporter, output_dir) = build_exporter(&config, args.output_dir);
    let artifact = exporter
        .export_one(&participant, &template)
        .await
        .with_context(|| format!("Certificate export failed for {}", participant.name))?;
    println!("{}", output_dir.join(&artifact.file_name).display());
    Ok(())
}
