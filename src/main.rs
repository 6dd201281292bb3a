mod cleaner;
mod config;
mod fetcher;
mod gemini;
mod output;
mod pipeline;
mod prompts;
mod retry;
mod source;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::warn;

use crate::config::PipelineConfig;
use crate::fetcher::Fetcher;
use crate::gemini::GeminiClient;
use crate::output::ResultWriter;
use crate::retry::Policy;

#[derive(Parser)]
#[command(
    name = "crawlsum",
    about = "Fetch web pages, extract their text, and summarize them with Gemini"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, clean and summarize every URL in a task list
    Run {
        /// Task list: JSON array of {url, title} objects, or one URL per line
        tasks: PathBuf,
        /// Max pages to process (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Max pages in flight at once
        #[arg(short, long)]
        concurrency: Option<usize>,
        /// Write JSON-lines results here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Gemini model name
        #[arg(long)]
        model: Option<String>,
    },
    /// Fetch and clean only, writing one text file per page
    Clean {
        tasks: PathBuf,
        /// Directory for the cleaned .txt files
        #[arg(short, long, default_value = "clean_text")]
        out_dir: PathBuf,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Fetch an index page and emit a task list of its same-host links
    Discover {
        index_url: String,
        /// Keep only links whose path starts with this prefix (e.g. /w/)
        #[arg(long)]
        prefix: Option<String>,
        /// Write the JSON task list here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Verify Gemini credentials with a minimal request
    Check {
        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            tasks,
            limit,
            concurrency,
            output,
            model,
        } => {
            let mut cfg = PipelineConfig::default();
            if let Some(concurrency) = concurrency {
                cfg.concurrency = concurrency.max(1);
            }
            if let Some(model) = model {
                cfg.model = model;
            }

            let mut tasks = source::load_tasks(&tasks)?;
            if let Some(limit) = limit {
                tasks.truncate(limit);
            }

            let fetcher = Fetcher::new(&cfg)?;
            let gemini = GeminiClient::new(gemini_api_key()?)
                .with_model(&cfg.model)
                .with_retry(Policy::exponential(cfg.api_retries, cfg.api_backoff));
            let mut writer = ResultWriter::create(output.as_deref())?;

            eprintln!("Summarizing {} pages with {}...", tasks.len(), cfg.model);
            let stats = pipeline::run(&cfg, fetcher, gemini, tasks, &mut writer).await?;
            eprintln!(
                "Done: {} pages ({} summarized, {} empty, {} failed).",
                stats.total, stats.ok, stats.skipped_empty, stats.failed
            );
            Ok(())
        }
        Commands::Clean {
            tasks,
            out_dir,
            limit,
        } => {
            let cfg = PipelineConfig::default();
            let mut tasks = source::load_tasks(&tasks)?;
            if let Some(limit) = limit {
                tasks.truncate(limit);
            }

            let fetcher = Fetcher::new(&cfg)?;
            let total = tasks.len();
            let mut ok = 0usize;
            let mut failed = 0usize;

            for (i, task) in tasks.iter().enumerate() {
                if i > 0 && !cfg.rate_limit.is_zero() {
                    tokio::time::sleep(cfg.rate_limit).await;
                }
                match clean_one(&fetcher, task, &out_dir).await {
                    Ok(path) => {
                        println!("[{}/{}] {} -> {}", i + 1, total, task.url, path.display());
                        ok += 1;
                    }
                    Err(e) => {
                        warn!("Failed {}: {:#}", task.url, e);
                        failed += 1;
                    }
                }
            }
            println!("Cleaned {} pages ({} ok, {} failed).", total, ok, failed);
            Ok(())
        }
        Commands::Discover {
            index_url,
            prefix,
            output,
        } => {
            let cfg = PipelineConfig::default();
            let fetcher = Fetcher::new(&cfg)?;
            let document = fetcher.fetch(&index_url).await?;
            let tasks =
                source::discover_tasks(&index_url, &document.raw_html, prefix.as_deref())?;
            if tasks.is_empty() {
                eprintln!("No matching links found on {index_url}.");
                return Ok(());
            }

            let json = serde_json::to_string_pretty(&tasks)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    eprintln!("Wrote {} tasks to {}", tasks.len(), path.display());
                }
                None => println!("{json}"),
            }
            Ok(())
        }
        Commands::Check { model } => {
            let mut client = GeminiClient::new(gemini_api_key()?);
            if let Some(model) = model {
                client = client.with_model(&model);
            }
            client.verify().await?;
            println!("OK: credentials valid for {}.", client.model());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn gemini_api_key() -> anyhow::Result<String> {
    std::env::var("GEMINI_API_KEY").context("GEMINI_API_KEY environment variable must be set")
}

async fn clean_one(
    fetcher: &Fetcher,
    task: &source::PageTask,
    out_dir: &std::path::Path,
) -> anyhow::Result<PathBuf> {
    let document = fetcher.fetch(&task.url).await?;
    let mut cleaned = cleaner::clean(&document.url, &document.raw_html)?;
    if task.title.is_some() {
        cleaned.title = task.title.clone();
    }
    output::write_clean_text(out_dir, &cleaned, document.fetched_at)
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
