use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rostercraft_core::{PipelineConfig, run_badakan_export, run_full_pipeline};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rostercli")]
#[command(about = "Roster workbook pipeline tools", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML file overriding the built-in year/motif/structure tables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reshape a raw planning export and generate the lecture/interimaire views
    Pipeline {
        /// Path to the raw planning workbook (.xlsx)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output directory (defaults to the input's directory)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
    /// Derive the Badakan CSV from a workbook carrying the interimaire sheet
    Badakan {
        /// Path to the finished workbook (.xlsx)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output directory (defaults to the input's directory)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Command::Pipeline { file, out_dir } => {
            println!("Processing '{}'...", file.display());
            let (final_path, report) = run_full_pipeline(&file, out_dir.as_deref(), &config)
                .with_context(|| format!("Pipeline failed on '{}'", file.display()))?;

            println!("{} Workbook written: {}", "✓".green(), final_path.display());
            if report.total_skipped() > 0 {
                println!(
                    "{}",
                    format!(
                        "  skipped: {} noise rows, {} malformed blocks, {} unmatched replacement days, {} zero-duration cells",
                        report.dropped_rows,
                        report.skipped_blocks,
                        report.unmatched_replacement_days,
                        report.skipped_cells
                    )
                    .yellow()
                );
            }
        }
        Command::Badakan { file, out_dir } => {
            println!("Exporting from '{}'...", file.display());
            let csv_path = run_badakan_export(&file, out_dir.as_deref(), &config)
                .with_context(|| format!("Export failed on '{}'", file.display()))?;

            println!("{} Export written: {}", "✓".green(), csv_path.display());
        }
    }

    Ok(())
}
