//! Partition runner.
//!
//! Glues a change feed, a batch handler and a checkpoint store together:
//! batches are pulled from the last committed offset and the checkpoint only
//! moves forward once a batch has been handled successfully.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{error, info, instrument};

use crate::checkpoint::CheckpointStore;
use crate::errors::SyncError;
use crate::reconciler::BatchHandler;
use metadata_sync_shared::ChangeRow;

/// Ordered source of change rows, per partition.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Up to `limit` rows of `partition` whose row id is greater than
    /// `after_offset`, in row order. An empty batch means the partition is
    /// drained.
    async fn next_batch(
        &self,
        partition: &str,
        after_offset: u64,
        limit: usize,
    ) -> Result<Vec<ChangeRow>, SyncError>;
}

/// Drives partitions from their checkpoint to the end of the feed.
pub struct PartitionRunner {
    feed: Arc<dyn ChangeFeed>,
    handler: Arc<dyn BatchHandler>,
    checkpoints: Arc<dyn CheckpointStore>,
    index: String,
    batch_limit: usize,
}

impl PartitionRunner {
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        handler: Arc<dyn BatchHandler>,
        checkpoints: Arc<dyn CheckpointStore>,
        index: impl Into<String>,
        batch_limit: usize,
    ) -> Self {
        Self {
            feed,
            handler,
            checkpoints,
            index: index.into(),
            batch_limit: batch_limit.max(1),
        }
    }

    /// Process `partition` until the feed is drained.
    ///
    /// Returns the offset the partition was left at. On error the checkpoint
    /// still points at the last batch that was fully committed.
    #[instrument(skip(self), fields(index = %self.index))]
    pub async fn run_partition(&self, partition: &str) -> Result<u64, SyncError> {
        let mut offset = self.checkpoints.load(partition)?;
        let start = offset;
        info!(offset, "Resuming partition");

        loop {
            let rows = self
                .feed
                .next_batch(partition, offset, self.batch_limit)
                .await?;
            let Some(last_row) = rows.iter().map(|row| row.row_id).max() else {
                break;
            };

            self.handler.handle(&rows).await?;

            offset = offset.max(last_row);
            self.checkpoints.save(partition, offset, &self.index)?;
        }

        info!(start, offset, "Partition drained");
        Ok(offset)
    }

    /// Process several partitions concurrently. Partitions are independent:
    /// a failure in one does not stop the others.
    pub async fn run_all(&self, partitions: &[String]) -> Vec<Result<u64, SyncError>> {
        let results = join_all(partitions.iter().map(|p| self.run_partition(p))).await;
        for (partition, result) in partitions.iter().zip(&results) {
            if let Err(e) = result {
                error!(partition = %partition, error = %e, "Partition run failed");
            }
        }
        results
    }
}
