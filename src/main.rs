use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use regmon::config::PipelineConfig;
use regmon::controls::SnapshotControlsLibrary;
use regmon::domain::Regulator;
use regmon::logging::init_logging;
use regmon::pipeline::chunk::Chunker;
use regmon::pipeline::extract::RuleBasedExtraction;
use regmon::pipeline::run::{PipelineRun, RunOutcome};
use regmon::sources::{JsonFileSource, RegulatorSource};
use regmon::store::InMemoryStore;

#[derive(Parser)]
#[command(name = "regmon")]
#[command(about = "UK regulatory obligation monitoring and impact scoring (FCA/PRA)")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: combine, chunk, extract, score
    Run {
        /// JSON file of FCA raw updates
        #[arg(long)]
        fca: Option<PathBuf>,
        /// JSON file of PRA raw updates
        #[arg(long)]
        pra: Option<PathBuf>,
        /// JSON snapshot of the controls library (required)
        #[arg(long)]
        controls: PathBuf,
        /// TOML pipeline configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Where to write the run report JSON
        #[arg(long)]
        output: Option<PathBuf>,
        /// Export Prometheus metrics
        #[arg(long)]
        metrics: bool,
    },
    /// Preview how one document's content would be chunked
    Chunk {
        /// JSON file containing a single combined update
        #[arg(long)]
        file: PathBuf,
        /// Maximum chunk length in characters
        #[arg(long)]
        max_chars: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_logging("regmon", "logs");

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            fca,
            pra,
            controls,
            config,
            output,
            metrics,
        } => {
            if metrics {
                if let Err(e) = regmon::observability::metrics::init() {
                    error!("Failed to install metrics recorder: {}", e);
                }
            }

            let config = match config {
                Some(path) => PipelineConfig::from_toml_file(&path)?,
                None => PipelineConfig::default(),
            };

            // Controls snapshot is loaded once and read-only for the run
            let library = SnapshotControlsLibrary::from_json_file(&controls)?;

            let mut streams = Vec::new();
            if let Some(path) = fca {
                let source = JsonFileSource::new(Regulator::Fca, path);
                streams.push((source.regulator(), source.fetch_updates().await?));
            }
            if let Some(path) = pra {
                let source = JsonFileSource::new(Regulator::Pra, path);
                streams.push((source.regulator(), source.fetch_updates().await?));
            }
            if streams.is_empty() {
                anyhow::bail!("at least one of --fca or --pra is required");
            }

            let run = PipelineRun::new(
                config,
                Arc::new(RuleBasedExtraction),
                Arc::new(library),
                Arc::new(InMemoryStore::new()),
            );
            let report = run.execute(streams).await?;

            println!("\n📊 Pipeline run summary:");
            println!("   Updates combined: {}", report.counts.updates);
            println!("   Chunks produced: {}", report.counts.chunks);
            println!("   Obligations extracted: {}", report.counts.obligations);
            println!("   Obligations scored: {}", report.counts.scored);
            println!("   Controls snapshot: {}", report.controls_snapshot);
            match report.outcome {
                RunOutcome::Success => println!("   Outcome: success"),
                RunOutcome::PartialSuccess => {
                    println!(
                        "   Outcome: partial success ({} chunk failures, {} rejects, {} warnings)",
                        report.chunk_failures.len(),
                        report.candidate_rejects.len(),
                        report.warnings.len()
                    );
                    for failure in &report.chunk_failures {
                        println!("   ⚠️  {}: {}", failure.chunk_id, failure.error);
                    }
                }
            }

            if let Some(path) = output {
                std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
                info!(path = %path.display(), "wrote run report");
                println!("   Report written to {}", path.display());
            }
        }
        Commands::Chunk { file, max_chars } => {
            let raw = std::fs::read_to_string(&file)?;
            let update: regmon::domain::CombinedUpdate = serde_json::from_str(&raw)?;

            let mut config = PipelineConfig::default();
            if let Some(max) = max_chars {
                config.chunker.max_chunk_chars = max;
            }
            config.validate()?;

            let chunks = Chunker::new(config.chunker).chunk(&update);
            println!(
                "📄 {} → {} chunk(s)",
                update.update.reference_number,
                chunks.len()
            );
            for chunk in &chunks {
                println!(
                    "   {} ({} chars): {}…",
                    chunk.chunk_id,
                    chunk.content.chars().count(),
                    chunk.content.chars().take(60).collect::<String>()
                );
            }
        }
    }

    Ok(())
}
