//! Full operator pipeline over a mock chain: poller, queue, block contexts,
//! store and a BLS aggregation driver for operator set 0.

use alloy_primitives::B256;
use op_01_log_decoder::LogDecoder;
use op_02_task_store::{CurveType, InMemoryTaskStore, OperatorSetConfig, TaskStore};
use op_03_block_context::{BlockContextConfig, BlockContextManager, CancellationToken};
use op_04_chain_poller::test_utils::{task_created_log, MockChainClient, TEST_AVS, TEST_MAILBOX};
use op_04_chain_poller::{task_mailbox_metadata, task_queue, ChainPoller, PollerConfig, TaskReceiver};
use op_05_aggregation::test_utils::{
    snapshot, BlsTestOperator, RecordingSubmitter, REFERENCE_TIMESTAMP,
};
use op_05_aggregation::{
    Bls, BlsMaterial, BlsSignature, SigningContext, StaticOperatorSets, TaskAggregationDriver,
    TaskResult,
};
use shared_types::{ChainId, Task, TaskId, TaskStatus};
use std::sync::Arc;
use tokio::sync::mpsc;

pub const CHAIN: ChainId = ChainId(1);
pub const THRESHOLD_BIPS: u16 = 6667;

pub struct Pipeline {
    pub root: CancellationToken,
    pub client: Arc<MockChainClient>,
    pub store: Arc<dyn TaskStore>,
    pub contexts: Arc<BlockContextManager>,
    pub poller: ChainPoller,
    pub queue: TaskReceiver,
    /// Weight 6000.
    pub a: BlsTestOperator,
    /// Weight 4000.
    pub b: BlsTestOperator,
    pub submitter: Arc<RecordingSubmitter<BlsMaterial>>,
    pub driver: TaskAggregationDriver<Bls>,
}

impl Pipeline {
    pub fn new(head: u64) -> Self {
        Self::with(
            Arc::new(MockChainClient::new(CHAIN, head)),
            Arc::new(InMemoryTaskStore::new()),
            16,
        )
    }

    pub fn with(client: Arc<MockChainClient>, store: Arc<dyn TaskStore>, capacity: usize) -> Self {
        store
            .save_operator_set_config(
                &TEST_AVS,
                0,
                &OperatorSetConfig::new(CurveType::Bls12381, THRESHOLD_BIPS),
            )
            .unwrap();

        let root = CancellationToken::new();
        let contexts = BlockContextManager::new(&root, BlockContextConfig::default());
        let (tx, queue) = task_queue(capacity, store.clone());
        let decoder = LogDecoder::new(vec![task_mailbox_metadata(TEST_MAILBOX).unwrap()]);
        let poller = ChainPoller::new(
            PollerConfig::new(CHAIN, TEST_AVS, vec![TEST_MAILBOX]),
            client.clone(),
            store.clone(),
            decoder,
            contexts.clone(),
            tx,
        )
        .unwrap();

        let a = BlsTestOperator::new(0xa1, 6000);
        let b = BlsTestOperator::new(0xb2, 4000);
        let operators = StaticOperatorSets::new().with(
            TEST_AVS,
            snapshot(0, vec![a.operator.clone(), b.operator.clone()]),
        );
        let submitter = Arc::new(RecordingSubmitter::new());
        let driver = TaskAggregationDriver::new(
            store.clone(),
            contexts.clone(),
            Arc::new(operators),
            submitter.clone(),
        );

        Self {
            root,
            client,
            store,
            contexts,
            poller,
            queue,
            a,
            b,
            submitter,
            driver,
        }
    }

    /// Emit a `TaskCreated` log in `block`. Deadline 0 means none.
    pub fn emit_task(&self, block: u64, seed: u8, operator_set_id: u32, deadline: u64) -> TaskId {
        let info = self.client.block(block).unwrap();
        let task_hash = B256::repeat_byte(seed);
        self.client.add_log(task_created_log(
            TEST_MAILBOX,
            &info,
            task_hash,
            TEST_AVS,
            operator_set_id,
            deadline,
            b"what is 6 * 7",
        ));
        TaskId::from_hash(&task_hash)
    }

    pub fn status(&self, task_id: &TaskId) -> TaskStatus {
        self.store.get_task(&TEST_AVS, task_id).unwrap().status
    }

    /// Closed stream carrying results from `signers`, all answering `output`.
    pub fn results(
        &self,
        task: &Task,
        output: &[u8],
        signers: &[&BlsTestOperator],
    ) -> mpsc::Receiver<TaskResult<BlsSignature>> {
        let ctx = SigningContext::for_task(task, REFERENCE_TIMESTAMP);
        let (tx, rx) = mpsc::channel(signers.len().max(1));
        for signer in signers {
            tx.try_send(signer.result(&ctx, output)).unwrap();
        }
        rx
    }
}
