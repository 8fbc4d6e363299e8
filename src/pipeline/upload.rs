//! Batched upload with retry: append a block sequence to a page in order.
//!
//! ## State machine
//!
//! The loop keeps a cursor into the block sequence and a batch size that
//! starts at `min(configured, 100)`. Each iteration sends
//! `blocks[cursor .. cursor + batch_size]` and reacts to the outcome:
//!
//! ```text
//!  success ───────────▶ cursor += len, reset retries, pause, next batch
//!  rate limited ──────▶ wait Retry-After (or 2^retries s, ≤ 30 s), same batch
//!  timeout ───────────▶ wait 2^retries s (≤ 30 s), same batch
//!  payload, len > 1 ──▶ batch_size = len / 2, same cursor
//!  payload, len = 1 ──▶ skip the block (if allowed) or abort
//!  anything else ─────▶ abort
//! ```
//!
//! Every retry branch goes through one [`RetryPolicy`]; they differ only in the
//! [`Backoff`] strategy they pass. The retry budget belongs to the batch
//! position: it resets whenever the cursor moves forward. The batch size does
//! not reset; once Notion has rejected a large batch, later ones stay small.
//!
//! ## Why check the budget before sleeping?
//!
//! An exhausted budget aborts anyway. Checking first means the final failure is
//! reported immediately instead of after a wait of up to 30 seconds.

use crate::client::BlockAppender;
use crate::config::UploadConfig;
use crate::error::{AppendError, ImportError};
use crate::output::{SkippedBlock, UploadReport};
use crate::pipeline::blocks::block_type;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// How long to wait before the next attempt at the same batch position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `2^retries` seconds, capped.
    Exponential,
    /// The server's hint when present, otherwise [`Backoff::Exponential`].
    RetryAfter(Option<u64>),
    /// Retry straight away (the request itself changes, e.g. a smaller batch).
    Immediate,
}

/// Retry budget for one batch position.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    max_backoff: Duration,
    retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            max_backoff,
            retries: 0,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.max_retries, Duration::from_secs(config.max_backoff_secs))
    }

    /// Retries taken at the current position.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Start a fresh budget (the cursor advanced).
    pub fn reset(&mut self) {
        self.retries = 0;
    }

    /// Count one more retry and return the wait before it.
    ///
    /// Returns `None` once the count exceeds `max_retries`.
    pub fn next_attempt(&mut self, backoff: Backoff) -> Option<Duration> {
        let wait = match backoff {
            Backoff::Immediate => Duration::ZERO,
            Backoff::RetryAfter(Some(secs)) => Duration::from_secs(secs),
            Backoff::RetryAfter(None) | Backoff::Exponential => self.exponential(),
        };
        self.retries += 1;
        (self.retries <= self.max_retries).then_some(wait)
    }

    fn exponential(&self) -> Duration {
        let secs = 2u64.checked_pow(self.retries).unwrap_or(u64::MAX);
        Duration::from_secs(secs).min(self.max_backoff)
    }
}

/// Upload `blocks[config.start_offset..]` as children of `page_id`.
///
/// # Errors
/// - [`ImportError::RetriesExhausted`] when rate limits, timeouts or batch
///   shrinking exceed `max_retries` at one position
/// - [`ImportError::BadBlock`] when a single block is rejected and
///   `skip_bad_blocks` is off
/// - [`ImportError::Api`] for any other failure, without retrying
pub async fn upload_blocks(
    appender: &dyn BlockAppender,
    page_id: &str,
    blocks: &[Value],
    config: &UploadConfig,
) -> Result<UploadReport, ImportError> {
    let started = Instant::now();
    let total = blocks.len();
    let start = config.start_offset.min(total);
    if config.start_offset > total {
        warn!(
            "Start offset {} is past the end of {} blocks; nothing to upload",
            config.start_offset, total
        );
    }

    let mut batch_size = config.effective_batch_size();
    let mut cursor = start;
    let mut policy = RetryPolicy::from_config(config);
    let mut report = UploadReport {
        total_blocks: total,
        start_offset: start,
        ..Default::default()
    };

    info!(
        "Uploading {} blocks to {} (start {}, batch size {})",
        total - start,
        page_id,
        start,
        batch_size
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_upload_start(total, start);
    }

    while cursor < total {
        let end = (cursor + batch_size).min(total);
        let batch = &blocks[cursor..end];
        report.requests += 1;

        let err = match appender.append_children(page_id, batch).await {
            Ok(()) => {
                cursor = end;
                report.appended += batch.len();
                policy.reset();
                info!("Appended {}/{} blocks", cursor, total);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_batch_complete(cursor, total, batch.len());
                }
                if cursor < total && config.pacing_delay_ms > 0 {
                    sleep(config.pacing_delay()).await;
                }
                continue;
            }
            Err(err) => err,
        };

        let (backoff, reason) = match &err {
            AppendError::RateLimited { retry_after_secs } => {
                (Backoff::RetryAfter(*retry_after_secs), "rate limited")
            }
            AppendError::Timeout { .. } => (Backoff::Exponential, "timed out"),
            AppendError::Payload { message, .. } if batch.len() == 1 => {
                let kind = block_type(&batch[0]).to_string();
                if !config.skip_bad_blocks {
                    return Err(ImportError::BadBlock {
                        index: cursor,
                        block_type: kind,
                        detail: message.clone(),
                    });
                }
                warn!("Skipping block {} ({}): {}", cursor, kind, message);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_block_skipped(cursor, &kind, message);
                }
                report.skipped.push(SkippedBlock {
                    index: cursor,
                    block_type: kind,
                    reason: message.clone(),
                });
                cursor += 1;
                policy.reset();
                continue;
            }
            AppendError::Payload { .. } => (Backoff::Immediate, "payload rejected"),
            AppendError::Api { .. } | AppendError::Transport(_) => {
                return Err(ImportError::Api {
                    offset: cursor,
                    source: err.clone(),
                });
            }
        };

        let wait = policy
            .next_attempt(backoff)
            .ok_or_else(|| ImportError::RetriesExhausted {
                offset: cursor,
                retries: config.max_retries,
                source: err.clone(),
            })?;
        report.retries += 1;

        if backoff == Backoff::Immediate {
            batch_size = (batch.len() / 2).max(1);
            warn!(
                "Batch at {} {} ({}); retrying with batch size {}",
                cursor, reason, err, batch_size
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_batch_shrunk(cursor, batch_size);
            }
        } else {
            warn!(
                "Batch at {} {}; retry {}/{} in {:?}",
                cursor,
                reason,
                policy.retries(),
                config.max_retries,
                wait
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_retry_wait(cursor, wait, reason);
            }
            sleep(wait).await;
        }
    }

    report.final_batch_size = batch_size;
    report.duration_ms = started.elapsed().as_millis() as u64;
    debug!(
        "Upload finished: {} requests, {} retries, {}ms",
        report.requests, report.retries, report.duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_upload_complete(report.appended, report.skipped.len());
    }
    Ok(report)
}
