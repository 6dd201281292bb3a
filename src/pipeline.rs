use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::cleaner::{self, CleanError};
use crate::config::PipelineConfig;
use crate::fetcher::{FetchError, Fetcher};
use crate::gemini::{GeminiClient, GeminiError, SummaryResult};
use crate::output::ResultWriter;
use crate::source::PageTask;

pub struct RunStats {
    pub total: usize,
    pub ok: usize,
    pub skipped_empty: usize,
    pub failed: usize,
}

#[derive(Debug, Error)]
enum TaskError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Clean(#[from] CleanError),
    #[error(transparent)]
    Api(#[from] GeminiError),
    #[error("deadline exceeded")]
    Deadline,
}

enum Outcome {
    Done(Box<SummaryResult>),
    /// Page had no extractable text; dropped without calling the API.
    Skipped { url: String },
    Failed { url: String, error: String },
    /// Auth-class API error; poisons the whole run.
    Fatal { url: String, error: GeminiError },
}

/// Fetch, clean and summarize every task with a bounded worker pool, writing
/// each result as it arrives. Per-URL failures are logged and counted; a
/// terminal API error aborts the run.
pub async fn run(
    cfg: &PipelineConfig,
    fetcher: Fetcher,
    gemini: GeminiClient,
    tasks: Vec<PageTask>,
    writer: &mut ResultWriter,
) -> Result<RunStats> {
    let total = tasks.len();
    let fetcher = Arc::new(fetcher);
    let gemini = Arc::new(gemini);
    let semaphore = Arc::new(Semaphore::new(cfg.concurrency));
    let aborted = Arc::new(AtomicBool::new(false));

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    // Channel: workers send outcomes, this task writes results as they land
    let (tx, mut rx) = tokio::sync::mpsc::channel::<Outcome>(cfg.concurrency * 2);

    let rate_limit = cfg.rate_limit;
    let deadline = cfg.url_deadline;

    for task in tasks {
        let fetcher = Arc::clone(&fetcher);
        let gemini = Arc::clone(&gemini);
        let sem = Arc::clone(&semaphore);
        let aborted = Arc::clone(&aborted);
        let tx = tx.clone();

        tokio::spawn(async move {
            let _permit = sem.acquire().await.unwrap();
            if aborted.load(Ordering::SeqCst) {
                return;
            }
            if !rate_limit.is_zero() {
                tokio::time::sleep(rate_limit).await;
            }

            let result = match tokio::time::timeout(
                deadline,
                summarize_task(&fetcher, &gemini, &task),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(TaskError::Deadline),
            };

            let outcome = classify(&task.url, result);
            if let Outcome::Fatal { .. } = outcome {
                aborted.store(true, Ordering::SeqCst);
            }
            let _ = tx.send(outcome).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut ok = 0usize;
    let mut skipped_empty = 0usize;
    let mut failed = 0usize;
    let mut fatal: Option<(String, GeminiError)> = None;

    while let Some(outcome) = rx.recv().await {
        match outcome {
            Outcome::Done(result) => {
                writer.write(&result)?;
                ok += 1;
            }
            Outcome::Skipped { url } => {
                warn!("Skipping {}: no extractable text", url);
                skipped_empty += 1;
            }
            Outcome::Failed { url, error } => {
                warn!("Failed {}: {}", url, error);
                failed += 1;
            }
            Outcome::Fatal { url, error } => {
                fatal = Some((url, error));
                break;
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    writer.finish()?;

    if let Some((url, error)) = fatal {
        return Err(anyhow!("aborting run at {url}: {error}"));
    }

    info!(
        "Summarized {} pages ({} ok, {} empty, {} failed)",
        total, ok, skipped_empty, failed
    );
    Ok(RunStats {
        total,
        ok,
        skipped_empty,
        failed,
    })
}

/// The per-URL chain: fetch → clean → summarize. The seed title, when
/// present, wins over the page <title>.
async fn summarize_task(
    fetcher: &Fetcher,
    gemini: &GeminiClient,
    task: &PageTask,
) -> Result<SummaryResult, TaskError> {
    let document = fetcher.fetch(&task.url).await?;
    let mut cleaned = cleaner::clean(&document.url, &document.raw_html)?;
    if task.title.is_some() {
        cleaned.title = task.title.clone();
    }
    Ok(gemini.summarize(&cleaned).await?)
}

fn classify(url: &str, result: Result<SummaryResult, TaskError>) -> Outcome {
    match result {
        Ok(summary) => Outcome::Done(Box::new(summary)),
        Err(TaskError::Clean(CleanError::EmptyDocument)) => Outcome::Skipped {
            url: url.to_string(),
        },
        Err(TaskError::Api(e)) if e.is_terminal() => Outcome::Fatal {
            url: url.to_string(),
            error: e,
        },
        Err(e) => Outcome::Failed {
            url: url.to_string(),
            error: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn summary() -> SummaryResult {
        SummaryResult {
            source_url: "https://example.com".into(),
            title: None,
            summary: "S".into(),
            model: "m".into(),
            latency_ms: 1,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_document_is_skipped_not_failed() {
        let outcome = classify(
            "https://example.com",
            Err(TaskError::Clean(CleanError::EmptyDocument)),
        );
        assert!(matches!(outcome, Outcome::Skipped { .. }));
    }

    #[test]
    fn terminal_api_error_is_fatal() {
        let err = GeminiError::Api {
            status: 401,
            message: "API key not valid".into(),
        };
        let outcome = classify("https://example.com", Err(TaskError::Api(err)));
        assert!(matches!(outcome, Outcome::Fatal { .. }));
    }

    #[test]
    fn retryable_api_error_that_exhausted_retries_is_a_plain_failure() {
        let err = GeminiError::Api {
            status: 503,
            message: "overloaded".into(),
        };
        let outcome = classify("https://example.com", Err(TaskError::Api(err)));
        assert!(matches!(outcome, Outcome::Failed { .. }));
    }

    #[test]
    fn fetch_error_is_a_plain_failure() {
        let outcome = classify(
            "https://example.com",
            Err(TaskError::Fetch(FetchError::Status(404))),
        );
        assert!(matches!(outcome, Outcome::Failed { .. }));
    }

    #[test]
    fn success_is_done() {
        let outcome = classify("https://example.com", Ok(summary()));
        assert!(matches!(outcome, Outcome::Done(_)));
    }
}
