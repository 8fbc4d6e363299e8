//! Progress-callback trait for per-batch upload events.
//!
//! Inject an [`Arc<dyn UploadProgressCallback>`] via
//! [`crate::config::UploadConfigBuilder::progress_callback`] to receive
//! events as the uploader works through the block sequence.
//!
//! # Example
//!
//! ```rust
//! use md2notion::{UploadConfig, UploadProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     appended: Arc<AtomicUsize>,
//! }
//!
//! impl UploadProgressCallback for CountingCallback {
//!     fn on_batch_complete(&self, appended: usize, total: usize, batch_len: usize) {
//!         self.appended.store(appended, Ordering::SeqCst);
//!         eprintln!("{appended}/{total} blocks (+{batch_len})");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     appended: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = UploadConfig::builder()
//!     .progress_callback(counter as Arc<dyn UploadProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;
use std::time::Duration;

/// Called by the uploader as it works through the block sequence.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. The upload loop is sequential, so events arrive in
/// order, but the trait is `Send + Sync` so it can live in a shared config.
pub trait UploadProgressCallback: Send + Sync {
    /// Called once before the first request.
    ///
    /// # Arguments
    /// * `total_blocks`: length of the whole block sequence
    /// * `start_offset`: index of the first block that will be uploaded
    fn on_upload_start(&self, total_blocks: usize, start_offset: usize) {
        let _ = (total_blocks, start_offset);
    }

    /// Called after each successful append request.
    ///
    /// # Arguments
    /// * `cursor`: index one past the last uploaded block
    /// * `total`: length of the whole block sequence
    /// * `batch_len`: number of blocks in the request that just succeeded
    fn on_batch_complete(&self, cursor: usize, total: usize, batch_len: usize) {
        let _ = (cursor, total, batch_len);
    }

    /// Called before sleeping on a rate-limit or timeout retry.
    fn on_retry_wait(&self, offset: usize, wait: Duration, reason: &str) {
        let _ = (offset, wait, reason);
    }

    /// Called when a payload error halves the batch size.
    fn on_batch_shrunk(&self, offset: usize, new_batch_size: usize) {
        let _ = (offset, new_batch_size);
    }

    /// Called when a single rejected block is skipped.
    fn on_block_skipped(&self, index: usize, block_type: &str, error: &str) {
        let _ = (index, block_type, error);
    }

    /// Called once after the cursor reaches the end of the sequence.
    fn on_upload_complete(&self, appended: usize, skipped: usize) {
        let _ = (appended, skipped);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl UploadProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::UploadConfig`].
pub type ProgressCallback = Arc<dyn UploadProgressCallback>;
