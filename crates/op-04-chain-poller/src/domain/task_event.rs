//! # Task-Creation Event
//!
//! Maps a decoded `TaskCreated` log onto a [`Task`].
//!
//! | Argument | Type | Task field |
//! |----------|------|------------|
//! | `taskHash` | `bytes32` indexed | `task_id` (`0x`-hex) |
//! | `avs` | `address` indexed | `avs_address` |
//! | `executorOperatorSetId` | `uint32` | `operator_set_id` |
//! | `taskDeadline` | `uint256` | `deadline_unix_seconds` (0 = none) |
//! | `payload` | `bytes` | `payload` |

use op_01_log_decoder::{ContractMetadata, DecodeError, DecodedLog};
use shared_types::{Address, BlockInfo, Task, TaskId, TaskStatus};

pub const TASK_CREATED_SIGNATURE: &str = "event TaskCreated(address indexed creator, bytes32 indexed taskHash, address indexed avs, uint32 executorOperatorSetId, uint256 taskDeadline, bytes payload)";

/// ABI of a task mailbox contract deployed at `address`.
pub fn task_mailbox_metadata(address: Address) -> Result<ContractMetadata, DecodeError> {
    ContractMetadata::from_event_signatures("TaskMailbox", address, &[TASK_CREATED_SIGNATURE])
}

/// Build a `Pending` task from a decoded creation event in `block`.
pub fn task_from_event(
    log: &DecodedLog,
    block: &BlockInfo,
    now_unix_seconds: u64,
) -> Result<Task, DecodeError> {
    let task_hash = log.fixed_bytes_arg("taskHash")?;
    let avs_address = log.address_arg("avs")?;

    let operator_set_id = u32::try_from(log.uint_arg("executorOperatorSetId")?).map_err(|_| {
        DecodeError::ArgumentType {
            name: "executorOperatorSetId".into(),
            expected: "uint32",
        }
    })?;

    let deadline = u64::try_from(log.uint_arg("taskDeadline")?).map_err(|_| {
        DecodeError::ArgumentType {
            name: "taskDeadline".into(),
            expected: "uint64 unix seconds",
        }
    })?;

    Ok(Task {
        task_id: TaskId::from_hash(&task_hash),
        avs_address,
        chain_id: block.chain_id,
        operator_set_id,
        source_block_number: block.number,
        block_hash: block.hash,
        transaction_hash: log.transaction_hash,
        payload: log.bytes_arg("payload")?,
        deadline_unix_seconds: (deadline != 0).then_some(deadline),
        status: TaskStatus::Pending,
        created_at_unix_seconds: now_unix_seconds,
    })
}
