//! # Reorg Handling
//!
//! Detection: the new block's parent hash differs from the stored hash of
//! the previous number. Recovery: walk back comparing stored hashes with the
//! canonical chain until one matches, then discard everything above it.

use super::ChainPoller;
use crate::domain::errors::PollerError;
use op_02_task_store::StoreError;
use operator_telemetry::{LAST_PROCESSED_BLOCK, REORGS_DETECTED, REORG_DEPTH};
use shared_types::BlockInfo;
use tracing::{info, warn};

impl ChainPoller {
    /// `Some((ancestor, abandoned))` when `block` does not extend what was
    /// stored and the rollback has been applied.
    pub(super) async fn check_reorg(
        &self,
        block: &BlockInfo,
    ) -> Result<Option<(u64, u64)>, PollerError> {
        let Some(previous) = block.number.checked_sub(1) else {
            return Ok(None);
        };
        let stored = match self.store.get_block(
            &self.config.avs_address,
            self.config.chain_id,
            previous,
        ) {
            Ok(stored) => stored,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if stored.hash == block.parent_hash {
            return Ok(None);
        }

        warn!(
            chain_id = %self.config.chain_id,
            block_number = block.number,
            expected_parent = %stored.hash,
            actual_parent = %block.parent_hash,
            "Reorg detected"
        );

        let ancestor = self.find_common_ancestor(previous).await?;
        let abandoned = previous - ancestor;
        self.roll_back(ancestor, previous)?;

        REORGS_DETECTED
            .with_label_values(&[self.chain_label.as_str()])
            .inc();
        REORG_DEPTH.observe(abandoned as f64);
        info!(
            chain_id = %self.config.chain_id,
            ancestor,
            abandoned,
            "Rolled back to common ancestor"
        );
        Ok(Some((ancestor, abandoned)))
    }

    /// Highest block at or below `from` whose stored hash is still canonical.
    async fn find_common_ancestor(&self, from: u64) -> Result<u64, PollerError> {
        for offset in 0..=self.config.max_reorg_depth {
            let Some(candidate) = from.checked_sub(offset) else {
                break;
            };
            let stored = match self.store.get_block(
                &self.config.avs_address,
                self.config.chain_id,
                candidate,
            ) {
                Ok(stored) => stored,
                // Pruned: its hash can no longer be compared.
                Err(e) if e.is_not_found() && self.is_pruned(candidate, from) => break,
                // Below the first block this poller ever committed: nothing
                // there was ingested, so it is a safe resume point.
                Err(e) if e.is_not_found() => return Ok(candidate),
                Err(e) => return Err(e.into()),
            };
            let canonical = self.client.block_by_number(candidate).await?;
            if canonical.hash == stored.hash {
                return Ok(candidate);
            }
        }

        Err(PollerError::ReorgTooDeep {
            chain_id: self.config.chain_id,
            block_number: from + 1,
            max_depth: self.config.max_reorg_depth,
        })
    }

    /// Committing `last` deletes everything at or below
    /// `last - block_history_size`.
    fn is_pruned(&self, number: u64, last: u64) -> bool {
        number + self.config.block_history_size <= last
    }

    /// Forget blocks `ancestor+1..=last` and every unfinished task they
    /// created, then move the checkpoint back.
    ///
    /// Steps are ordered so a crash at any point is repaired on restart:
    /// until the checkpoint moves, the stored blocks still expose the reorg
    /// and the rollback runs again; after it moves, resumption starts at the
    /// ancestor and stale block rows are overwritten.
    fn roll_back(&self, ancestor: u64, last: u64) -> Result<(), PollerError> {
        let avs = &self.config.avs_address;
        let chain_id = self.config.chain_id;

        for number in (ancestor + 1)..=last {
            self.contexts.cancel_block(number);
        }

        // Re-emission on the canonical fork must be ingested afresh.
        for task in self.store.list_pending_tasks_for_avs(avs)? {
            if task.chain_id == chain_id && task.source_block_number > ancestor {
                match self.store.delete_task(avs, &task.task_id) {
                    Ok(()) | Err(StoreError::NotFound { .. }) => {}
                    Err(e) => return Err(e.into()),
                }
                warn!(
                    task_id = %task.task_id,
                    block_number = task.source_block_number,
                    status = %task.status,
                    "Discarded task from abandoned block"
                );
            }
        }

        self.store.set_last_processed_block(avs, chain_id, ancestor)?;
        *self.last_observed.write() = Some(ancestor);
        LAST_PROCESSED_BLOCK
            .with_label_values(&[self.chain_label.as_str()])
            .set(ancestor as f64);

        for number in (ancestor + 1)..=last {
            self.store.delete_block(avs, chain_id, number)?;
        }
        Ok(())
    }
}
