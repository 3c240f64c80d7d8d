use futures::StreamExt;
use pgsync_config::shared::TransferConfig;
use tracing::debug;

use crate::clients::base::{CopyInWriter, SyncSource, SyncTarget};
use crate::concurrency::stream::ChunkedStream;
use crate::error::SyncResult;
use crate::observer::SyncObserver;
use crate::schema::TableName;

const BYTES_PER_MEGABYTE: u64 = 1024 * 1024;

/// Counts the bytes copied for one table and tells when a progress observation is due.
#[derive(Debug, Clone)]
pub struct TransferProgress {
    threshold: u64,
    since_last: u64,
    total: u64,
}

impl TransferProgress {
    pub fn new(threshold: u64) -> Self {
        Self {
            threshold: threshold.max(1),
            since_last: 0,
            total: 0,
        }
    }

    /// Records `bytes` more copied bytes.
    ///
    /// Once at least `threshold` bytes were recorded since the last observation, the counter is
    /// reset and the total number of whole megabytes copied so far is returned.
    pub fn record(&mut self, bytes: u64) -> Option<u64> {
        self.total += bytes;
        self.since_last += bytes;

        if self.since_last < self.threshold {
            return None;
        }

        self.since_last = 0;
        Some(self.total / BYTES_PER_MEGABYTE)
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Totals of a committed copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub bytes: u64,
    pub rows: u64,
}

/// Copies every row of `table` from `source` into the table with the same name on `target`.
///
/// Bytes are relayed as they are in chunks of at most `chunk_size_bytes`, nothing is parsed. The
/// copy counts only once the target committed it. On any error the import is dropped unfinished,
/// which aborts it.
pub async fn transfer_table_data<S, T, O>(
    source: &S,
    target: &T,
    table: &TableName,
    config: &TransferConfig,
    observer: &O,
) -> SyncResult<TransferStats>
where
    S: SyncSource,
    T: SyncTarget,
    O: SyncObserver,
{
    let copy_out = source.copy_table_out(table).await?;
    let mut writer = target.copy_table_in(table).await?;

    debug!(table = %table, "started binary copy");

    let mut chunks = ChunkedStream::wrap(copy_out, config.chunk_size_bytes);
    let mut progress = TransferProgress::new(config.progress_threshold_bytes);
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        let chunk_len = chunk.len() as u64;

        writer.write(chunk).await?;

        if let Some(megabytes) = progress.record(chunk_len) {
            observer.transfer_progress(table, megabytes);
        }
    }

    let rows = writer.finish().await?;
    let stats = TransferStats {
        bytes: progress.total(),
        rows,
    };
    observer.transfer_completed(table, stats.bytes, stats.rows);

    Ok(stats)
}
