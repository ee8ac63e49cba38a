//! # Test Utilities
//!
//! In-memory chain with forks, plus builders for task-creation logs.
//!
//! Requires feature: `test-utils` (always on for this crate's own tests).

use crate::domain::task_event::task_mailbox_metadata;
use crate::domain::errors::ChainClientError;
use crate::ports::ChainClient;
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use op_01_log_decoder::DynSolValue;
use parking_lot::RwLock;
use shared_types::{BlockInfo, ChainId, RawLog, Task, TaskId, TaskStatus};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const TEST_AVS: Address = Address::repeat_byte(0x01);
pub const TEST_MAILBOX: Address = Address::repeat_byte(0xaa);

/// Deterministic hash of block `number` on fork `fork`.
pub fn block_hash(number: u64, fork: u8) -> B256 {
    let mut word = [0u8; 32];
    word[0] = 0xb1;
    word[1] = fork;
    word[24..].copy_from_slice(&number.to_be_bytes());
    B256::from(word)
}

/// Block whose parent lies on the same fork.
pub fn block_info(chain_id: ChainId, number: u64, fork: u8) -> BlockInfo {
    BlockInfo {
        number,
        hash: block_hash(number, fork),
        parent_hash: block_hash(number.saturating_sub(1), fork),
        timestamp: 1_700_000_000 + number * 12,
        chain_id,
    }
}

pub fn sample_task(id: &str, deadline: Option<u64>) -> Task {
    Task {
        task_id: TaskId::new(id),
        avs_address: TEST_AVS,
        chain_id: ChainId(1),
        operator_set_id: 0,
        source_block_number: 1,
        block_hash: block_hash(1, 0),
        transaction_hash: B256::ZERO,
        payload: b"payload".to_vec(),
        deadline_unix_seconds: deadline,
        status: TaskStatus::Pending,
        created_at_unix_seconds: 0,
    }
}

/// ABI-encoded `TaskCreated` log emitted by `mailbox` in `block`.
#[allow(clippy::too_many_arguments)]
pub fn task_created_log(
    mailbox: Address,
    block: &BlockInfo,
    task_hash: B256,
    avs: Address,
    operator_set_id: u32,
    deadline: u64,
    payload: &[u8],
) -> RawLog {
    let selector = task_mailbox_metadata(mailbox)
        .ok()
        .and_then(|m| m.event_selector("TaskCreated"))
        .unwrap_or_default();
    let data = DynSolValue::Tuple(vec![
        DynSolValue::Uint(U256::from(operator_set_id), 32),
        DynSolValue::Uint(U256::from(deadline), 256),
        DynSolValue::Bytes(payload.to_vec()),
    ])
    .abi_encode_params();

    RawLog {
        address: mailbox,
        topics: vec![
            selector,
            Address::repeat_byte(0xcc).into_word(),
            task_hash,
            avs.into_word(),
        ],
        data,
        block_number: block.number,
        block_hash: block.hash,
        transaction_hash: task_hash,
        log_index: 0,
    }
}

#[derive(Default)]
struct ChainState {
    blocks: BTreeMap<u64, BlockInfo>,
    /// Logs per block number, in emission order.
    logs: BTreeMap<u64, Vec<RawLog>>,
    fork: u8,
    fail_logs: bool,
    fail_head: bool,
}

/// Scriptable chain node.
pub struct MockChainClient {
    chain_id: ChainId,
    state: RwLock<ChainState>,
    log_requests: AtomicUsize,
}

impl MockChainClient {
    /// Chain with blocks `0..=head` on fork 0.
    pub fn new(chain_id: ChainId, head: u64) -> Self {
        let client = Self {
            chain_id,
            state: RwLock::new(ChainState::default()),
            log_requests: AtomicUsize::new(0),
        };
        client.extend_to(head);
        client
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn head(&self) -> u64 {
        self.state
            .read()
            .blocks
            .keys()
            .next_back()
            .copied()
            .unwrap_or_default()
    }

    pub fn block(&self, number: u64) -> Option<BlockInfo> {
        self.state.read().blocks.get(&number).cloned()
    }

    /// Mine blocks on the current fork up to `head`.
    pub fn extend_to(&self, head: u64) {
        let mut state = self.state.write();
        let start = state.blocks.keys().next_back().map_or(0, |n| n + 1);
        for number in start..=head {
            let parent = number
                .checked_sub(1)
                .and_then(|p| state.blocks.get(&p))
                .map(|b| b.hash)
                .unwrap_or_default();
            let mut block = block_info(self.chain_id, number, state.fork);
            block.parent_hash = parent;
            state.blocks.insert(number, block);
        }
    }

    /// Replace every block from `from` up to the current head with a new
    /// fork. Logs of replaced blocks are dropped.
    pub fn reorg_from(&self, from: u64) {
        let head = self.head();
        {
            let mut state = self.state.write();
            state.fork = state.fork.wrapping_add(1);
            state.blocks.retain(|n, _| *n < from);
            state.logs.retain(|n, _| *n < from);
        }
        self.extend_to(head);
    }

    /// Attach a log to its block; hash and log index are filled in.
    pub fn add_log(&self, mut log: RawLog) {
        let mut state = self.state.write();
        if let Some(block) = state.blocks.get(&log.block_number) {
            log.block_hash = block.hash;
        }
        let entry = state.logs.entry(log.block_number).or_default();
        log.log_index = entry.len() as u64;
        entry.push(log);
    }

    pub fn set_fail_logs(&self, fail: bool) {
        self.state.write().fail_logs = fail;
    }

    pub fn set_fail_head(&self, fail: bool) {
        self.state.write().fail_head = fail;
    }

    pub fn log_requests(&self) -> usize {
        self.log_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn latest_block_number(&self) -> Result<u64, ChainClientError> {
        if self.state.read().fail_head {
            return Err(ChainClientError::Rpc("mock head failure".into()));
        }
        Ok(self.head())
    }

    async fn block_by_number(&self, number: u64) -> Result<BlockInfo, ChainClientError> {
        self.block(number)
            .ok_or(ChainClientError::BlockNotFound(number))
    }

    async fn get_logs(
        &self,
        address: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, ChainClientError> {
        self.log_requests.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read();
        if state.fail_logs {
            return Err(ChainClientError::Rpc("mock log failure".into()));
        }
        Ok(state
            .logs
            .range(from_block..=to_block)
            .flat_map(|(_, logs)| logs.iter())
            .filter(|log| log.address == address)
            .cloned()
            .collect())
    }
}
