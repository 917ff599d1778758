//! CodeCritic CLI entry point.
//!
//! `codecritic analyze` runs the full two-phase pipeline on a
//! (prompt, code) pair and prints the analysis record; `show` re-reads a
//! stored record; `patterns` prints the taxonomy catalog.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use codecritic_analysis::{CriticConfig, Orchestrator};
use codecritic_core::{
    explainer::pattern_catalog, severity_label, AnalysisStatus, MemoryStore, RecordStore,
    SqliteStore,
};
use codecritic_sandbox::SandboxBackend;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "codecritic")]
#[command(about = "CodeCritic - defect analysis for LLM-generated code")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a (prompt, code) pair and print the record
    Analyze {
        /// The natural-language intent the code claims to satisfy
        #[arg(short = 'p', long)]
        prompt: String,

        /// The code to analyze, inline
        #[arg(short = 'c', long, conflicts_with = "code_file")]
        code: Option<String>,

        /// Read the code from a file instead
        #[arg(short = 'f', long)]
        code_file: Option<PathBuf>,

        /// Sandbox back-end for the dynamic layer
        #[arg(short = 'b', long, default_value = "subprocess", env = "CODECRITIC_SANDBOX")]
        backend: SandboxBackend,

        /// Persist records to this SQLite database instead of memory
        #[arg(short = 'd', long, env = "CODECRITIC_DB")]
        database: Option<PathBuf>,

        /// Return after the synchronous phase instead of waiting for the
        /// linguistic stage
        #[arg(long)]
        no_wait: bool,

        /// Emit the full record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a stored analysis record
    Show {
        /// Record id
        id: uuid::Uuid,

        /// SQLite database holding the record
        #[arg(short = 'd', long, env = "CODECRITIC_DB")]
        database: PathBuf,

        /// Emit the full record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the ten-pattern taxonomy catalog
    Patterns,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            prompt,
            code,
            code_file,
            backend,
            database,
            no_wait,
            json,
        } => {
            let code = match (code, code_file) {
                (Some(code), None) => code,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, None) => bail!("provide --code or --code-file"),
                (Some(_), Some(_)) => unreachable!("clap conflicts_with"),
            };

            let store: Arc<dyn RecordStore> = match database {
                Some(path) => Arc::new(SqliteStore::open(path)?),
                None => Arc::new(MemoryStore::new()),
            };
            let mut config = CriticConfig::from_env();
            config.sandbox.backend = backend;
            let orchestrator = Orchestrator::new(config, store);

            let mut record = orchestrator.analyze(&prompt, &code).await?;
            if !no_wait {
                // Poll like an external caller would until the linguistic
                // stage lands.
                for _ in 0..1200 {
                    match orchestrator.get(record.id).await? {
                        Some(current) if current.status == AnalysisStatus::Complete => {
                            record = current;
                            break;
                        }
                        _ => tokio::time::sleep(Duration::from_millis(100)).await,
                    }
                }
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_record(&record);
            }
        }

        Commands::Show { id, database, json } => {
            let store = SqliteStore::open(database)?;
            let Some(record) = store.get(id).await? else {
                bail!("no record with id {id}");
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_record(&record);
            }
        }

        Commands::Patterns => {
            for (pattern, description, fix_hint) in pattern_catalog() {
                println!("{:<28} {description}", pattern.tag());
                println!("{:<28}   fix: {fix_hint}", "");
            }
        }
    }
    Ok(())
}

fn print_record(record: &codecritic_core::AnalysisRecord) {
    println!("analysis {}", record.id);
    println!("status:   {}", record.status);
    println!(
        "verdict:  {} (overall severity {} - {})",
        if record.has_bugs { "issues found" } else { "clean" },
        record.overall_severity,
        severity_label(record.overall_severity),
    );
    println!("summary:  {}", record.summary);
    if let Some(score) = record.linguistic_extras.intent_match_score {
        println!("intent:   {score:.2}");
    }
    for finding in &record.findings {
        let location = finding.location.as_deref().unwrap_or("-");
        println!(
            "  [{}] {} ({}, severity {}, confidence {:.2})",
            finding.pattern,
            location,
            finding.detection_stage,
            finding.severity,
            finding.confidence,
        );
        println!("      {}", finding.description);
        if let Some(hint) = &finding.fix_hint {
            println!("      fix: {hint}");
        }
    }
    for log in &record.stage_logs {
        let status = if log.success { "ok" } else { "degraded" };
        let error = log.error.as_deref().unwrap_or("");
        println!(
            "  stage {:<11} {status:<9} {:.3}s {error}",
            log.stage, log.elapsed_seconds
        );
    }
}
