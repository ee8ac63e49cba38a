//! # Block Context
//!
//! One unit-of-work scope per block. Done when cancelled (reorg, shutdown)
//! or when its absolute deadline passes, whichever comes first.

use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct BlockContext {
    block_number: u64,
    token: CancellationToken,
    /// Absolute deadline, unix seconds. `None` = cancel-only.
    deadline_unix_seconds: Option<u64>,
}

impl BlockContext {
    pub(crate) fn new(
        block_number: u64,
        token: CancellationToken,
        deadline_unix_seconds: Option<u64>,
    ) -> Self {
        Self {
            block_number,
            token,
            deadline_unix_seconds,
        }
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub fn deadline_unix_seconds(&self) -> Option<u64> {
        self.deadline_unix_seconds
    }

    /// Token for work that should stop when this block's context ends.
    /// Cancelling a child never cancels the block context.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }

    /// Non-blocking check of [`done`](Self::done).
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.is_expired()
    }

    /// Time left before the deadline. `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        let deadline = UNIX_EPOCH + Duration::from_secs(self.deadline_unix_seconds?);
        Some(
            deadline
                .duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO),
        )
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.remaining() {
            None => self.token.cancelled().await,
            Some(left) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep(left) => {}
                }
            }
        }
    }

    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::unix_now;

    #[test]
    fn test_no_deadline_is_cancel_only() {
        let ctx = BlockContext::new(1, CancellationToken::new(), None);
        assert!(ctx.remaining().is_none());
        assert!(!ctx.is_done());
        ctx.cancel();
        assert!(ctx.is_done());
    }

    #[test]
    fn test_past_deadline_is_done() {
        let ctx = BlockContext::new(1, CancellationToken::new(), Some(1));
        assert!(ctx.is_expired());
        assert!(ctx.is_done());
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_done_resolves_on_cancel() {
        let ctx = std::sync::Arc::new(BlockContext::new(
            7,
            CancellationToken::new(),
            Some(unix_now() + 3600),
        ));
        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.done().await })
        };
        ctx.cancel();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_done_resolves_on_expired_deadline() {
        let ctx = BlockContext::new(7, CancellationToken::new(), Some(1));
        tokio::time::timeout(Duration::from_secs(1), ctx.done())
            .await
            .unwrap();
    }

    #[test]
    fn test_child_token_follows_parent() {
        let ctx = BlockContext::new(3, CancellationToken::new(), None);
        let child = ctx.child_token();
        child.cancel();
        assert!(!ctx.is_cancelled());

        let child = ctx.child_token();
        ctx.cancel();
        assert!(child.is_cancelled());
    }
}
