//! rolo: operator CLI for a rolodex database.
//!
//! Usage:
//!   rolo --owner user_1 ingest "Met Sarah Chen, PM at Stripe, loves rock climbing"
//!   rolo --owner user_1 review confirm <REVIEW_ID> --merge-into <CONTACT_ID>
//!   rolo --owner user_1 import contacts.csv --yes
//!   rolo --owner user_1 ask "Who works at Stripe?"

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use rolo_core::{Disposition, ExtractedFields, ReviewState};
use rolo_db::Database;
use rolo_inference::{LlmExtractor, OllamaBackend};
use rolo_pipeline::{PipelineConfig, Rolodex};

#[derive(Parser)]
#[command(name = "rolo")]
#[command(author, version, about = "Personal contact notes from voice memos and files")]
#[command(propagate_version = true)]
struct Cli {
    /// Owner whose contacts are read and written
    #[arg(long, env = "ROLO_OWNER")]
    owner: String,

    /// Run embedded migrations before the command
    #[cfg(feature = "migrations")]
    #[arg(long)]
    migrate: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage a pending review from a transcript
    Ingest {
        /// Transcript text (reads --file when omitted)
        transcript: Option<String>,

        /// Read the transcript from a file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Inspect or resolve a pending review
    Review {
        #[command(subcommand)]
        action: ReviewAction,
    },

    /// Extract contacts from a decoded text file (CSV, notes, ...)
    Import {
        /// Text file to extract from
        file: PathBuf,

        /// Create the extracted contacts instead of only previewing them
        #[arg(short, long)]
        yes: bool,
    },

    /// Run a natural-language query and list matching contacts
    Search {
        question: String,
    },

    /// Ask a question and get a short answer
    Ask {
        question: String,
    },

    /// Export all contacts as CSV
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print this week's digest
    Digest,
}

#[derive(Subcommand)]
enum ReviewAction {
    /// Show a pending review
    Show { id: Uuid },

    /// Confirm a review as a new contact or into an existing one
    Confirm {
        id: Uuid,

        /// Merge into this contact instead of creating a new one
        #[arg(long)]
        merge_into: Option<Uuid>,

        /// JSON file with corrected fields
        #[arg(long)]
        corrections: Option<PathBuf>,
    },

    /// Discard a pending review
    Discard { id: Uuid },
}

/// Tracing setup.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - standard env filter (default: "warn,rolo=info")
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warn,rolo=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log_file {
        let file_dir = Path::new(path).parent().unwrap_or(Path::new("."));
        let file_name = Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("rolo.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // stdout carries command output, logs go to stderr
        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();
    let cli = Cli::parse();

    let db = Database::from_env()
        .await
        .context("failed to connect to the database")?;
    #[cfg(feature = "migrations")]
    if cli.migrate {
        db.migrate().await.context("failed to run migrations")?;
    }

    let backend = OllamaBackend::from_env()?;
    info!(model = %rolo_core::GenerationBackend::model_name(&backend), "Using generation backend");
    let extractor = Arc::new(LlmExtractor::new(Arc::new(backend)));
    let rolodex = Rolodex::new(
        extractor,
        Arc::new(db.contacts.clone()),
        Arc::new(db.reviews.clone()),
        PipelineConfig::from_env(),
    );

    run(&rolodex, &cli.owner, cli.command).await
}

async fn run(rolodex: &Rolodex, owner: &str, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Ingest { transcript, file } => {
            let transcript = match (transcript, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, None) => bail!("provide a transcript or --file"),
            };
            let review = rolodex.ingest.ingest(owner, &transcript).await?;
            print_json(&review)?;
        }
        Commands::Review { action } => review(rolodex, owner, action).await?,
        Commands::Import { file, yes } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let people = rolodex.import.extract_from_text(&text).await?;
            if !yes {
                print_json(&people)?;
                eprintln!("{} contact(s) found; rerun with --yes to import", people.len());
                return Ok(());
            }
            let outcome = rolodex.import.import(owner, people).await?;
            print_json(&outcome.created)?;
            // Let summaries finish before the runtime shuts down.
            let summarized = outcome.summary_task.await.unwrap_or(0);
            eprintln!(
                "Imported {} contact(s), {} summarized",
                outcome.created.len(),
                summarized
            );
        }
        Commands::Search { question } => {
            let result = rolodex.query.execute(owner, &question).await?;
            eprintln!("{}", result.summary);
            print_json(&result.results)?;
        }
        Commands::Ask { question } => {
            println!("{}", rolodex.query.answer(owner, &question).await?);
        }
        Commands::Export { output } => {
            let csv = rolodex.export_csv(owner).await?;
            match output {
                Some(path) => std::fs::write(&path, csv)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => print!("{}", csv),
            }
        }
        Commands::Digest => {
            let digest = rolodex.digest.weekly_digest(owner, Utc::now()).await?;
            if digest.is_empty() {
                eprintln!("Nothing to report this week");
            } else {
                println!("{}", digest.render());
            }
        }
    }
    Ok(())
}

async fn review(rolodex: &Rolodex, owner: &str, action: ReviewAction) -> anyhow::Result<()> {
    match action {
        ReviewAction::Show { id } => match rolodex.reviews.open(owner, id).await? {
            ReviewState::Active(review) => print_json(&review)?,
            ReviewState::Expired { id, expired_at } => {
                println!("Review {} expired at {}", id, expired_at);
            }
        },
        ReviewAction::Confirm {
            id,
            merge_into,
            corrections,
        } => {
            let corrections = match corrections {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    Some(serde_json::from_str::<ExtractedFields>(&raw)?)
                }
                None => None,
            };
            let disposition = merge_into.map_or(Disposition::AsNew, Disposition::MergeInto);
            let confirmed = rolodex
                .reviews
                .confirm(owner, id, disposition, corrections)
                .await?;
            print_json(&confirmed.contact)?;
            let _ = confirmed.summary_task.await;
        }
        ReviewAction::Discard { id } => {
            if rolodex.reviews.discard(owner, id).await? {
                eprintln!("Review {} discarded", id);
            } else {
                bail!("review {} not found", id);
            }
        }
    }
    Ok(())
}
