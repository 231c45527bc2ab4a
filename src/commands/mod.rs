pub mod color;
pub mod export;
pub mod import;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "crewcert")]
#[command(version)]
#[command(about = "Generate finisher certificates for a running crew")]
pub struct Cli {
    /// Log filter, e.g. `debug` or `crewcert=trace` (overrides RUST_LOG)
    #[arg(long, global = true, value_name = "FILTER")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a sample participants CSV
    Template {
        #[arg(short, long, default_value = crewcert::services::csv_importer::TEMPLATE_FILE_NAME)]
        output: PathBuf,
    },
    /// Validate a participants CSV and list the accepted rows
    Import {
        csv: PathBuf,

        /// Print the accepted records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export certificates for participants from a CSV
    Export(ExportArgs),
    /// Export a certificate for a single manually entered participant
    Add(AddArgs),
    /// Print the dominant color of a logo image
    Color {
        #[arg(long)]
        logo: PathBuf,
    },
}

#[derive(Args)]
pub struct ExportArgs {
    #[arg(short, long, default_value = "crewcert.toml")]
    pub config: PathBuf,

    #[arg(long)]
    pub csv: PathBuf,

    /// Only export these participants (repeatable). Exports everyone when omitted.
    #[arg(short, long = "name", value_name = "NAME")]
    pub names: Vec<String>,

    /// Overrides `export.output_dir` from the config
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct AddArgs {
    #[arg(short, long, default_value = "crewcert.toml")]
    pub config: PathBuf,

    #[arg(long)]
    pub name: String,

    /// Finish time; bare digits are formatted as HH:MM:SS
    #[arg(long)]
    pub time: String,

    #[arg(long)]
    pub distance: Option<String>,

    #[arg(long)]
    pub date: Option<String>,

    #[arg(long)]
    pub place: Option<String>,

    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

pub async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Template { output } => import::write_template(&output),
        Command::Import { csv, json } => import::run(&csv, json),
        Command::Export(args) => export::run_batch(args).await,
        Command::Add(args) => export::run_single(args).await,
        Command::Color { logo } => color::run(&logo),
    }
}
