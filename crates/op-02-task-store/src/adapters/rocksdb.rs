//! # RocksDB Store
//!
//! Durable backend with one column family per record kind.
//!
//! ## Column Families
//!
//! - `tasks` - bincode `Task`, keyed by AVS and task id
//! - `blocks` - bincode `BlockInfo`, keyed by AVS, chain and number
//! - `checkpoints` - big-endian `u64`, keyed by AVS and chain
//! - `operator_sets` - bincode `OperatorSetConfig`
//!
//! Reads take the shared side of the DB lock. Read-modify-write operations
//! hold `write_lock` for their whole duration, giving single-writer semantics
//! per task.

use crate::domain::entities::OperatorSetConfig;
use crate::domain::errors::StoreError;
use crate::domain::keys;
use crate::ports::TaskStore;
use parking_lot::{Mutex, RwLock};
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteOptions, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{Address, BlockInfo, ChainId, OperatorSetId, Task, TaskId, TaskStatus};
use std::path::PathBuf;
use tracing::{debug, info};

pub const CF_TASKS: &str = "tasks";
pub const CF_BLOCKS: &str = "blocks";
pub const CF_CHECKPOINTS: &str = "checkpoints";
pub const CF_OPERATOR_SETS: &str = "operator_sets";

pub const COLUMN_FAMILIES: &[&str] = &[CF_TASKS, CF_BLOCKS, CF_CHECKPOINTS, CF_OPERATOR_SETS];

#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    pub path: PathBuf,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 16MB)
    pub write_buffer_size: usize,
    /// fsync after each write (default: true)
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/task-store"),
            block_cache_size: 64 * 1024 * 1024,
            write_buffer_size: 16 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Small buffers, no fsync.
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 4 * 1024 * 1024,
            write_buffer_size: 1024 * 1024,
            sync_writes: false,
        }
    }
}

pub struct RocksDbTaskStore {
    /// `None` once closed.
    db: RwLock<Option<DB>>,
    write_lock: Mutex<()>,
    config: RocksDbConfig,
}

impl RocksDbTaskStore {
    pub fn open(config: RocksDbConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors)
            .map_err(|e| StoreError::Backend(format!("failed to open RocksDB: {e}")))?;

        info!(path = %config.path.display(), "Task store opened");

        Ok(Self {
            db: RwLock::new(Some(db)),
            write_lock: Mutex::new(()),
            config,
        })
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.config.sync_writes);
        opts
    }

    fn with_db<T>(&self, f: impl FnOnce(&DB) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StoreError::Closed)?;
        f(db)
    }

    fn get_raw(&self, db: &DB, cf: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let handle = cf_handle(db, cf)?;
        db.get_cf(handle, key)
            .map_err(|e| StoreError::Backend(format!("get from {cf} failed: {e}")))
    }

    fn put_raw(&self, db: &DB, cf: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let handle = cf_handle(db, cf)?;
        db.put_cf_opt(handle, key, value, &self.write_options())
            .map_err(|e| StoreError::Backend(format!("put into {cf} failed: {e}")))
    }

    fn delete_raw(&self, db: &DB, cf: &str, key: &[u8]) -> Result<(), StoreError> {
        let handle = cf_handle(db, cf)?;
        db.delete_cf_opt(handle, key, &self.write_options())
            .map_err(|e| StoreError::Backend(format!("delete from {cf} failed: {e}")))
    }

    fn get_value<T: DeserializeOwned>(
        &self,
        db: &DB,
        cf: &str,
        key: &[u8],
        what: impl FnOnce() -> String,
    ) -> Result<T, StoreError> {
        match self.get_raw(db, cf, key)? {
            Some(bytes) => decode(&bytes),
            None => Err(StoreError::not_found(what())),
        }
    }
}

fn cf_handle<'a>(db: &'a DB, name: &str) -> Result<&'a rocksdb::ColumnFamily, StoreError> {
    db.cf_handle(name)
        .ok_or_else(|| StoreError::Backend(format!("missing column family {name}")))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

impl TaskStore for RocksDbTaskStore {
    fn save_block(&self, avs: &Address, block: &BlockInfo) -> Result<(), StoreError> {
        let key = keys::block_key(avs, block.chain_id, block.number);
        let value = encode(block)?;
        self.with_db(|db| self.put_raw(db, CF_BLOCKS, &key, &value))
    }

    fn get_block(
        &self,
        avs: &Address,
        chain_id: ChainId,
        number: u64,
    ) -> Result<BlockInfo, StoreError> {
        let key = keys::block_key(avs, chain_id, number);
        self.with_db(|db| {
            self.get_value(db, CF_BLOCKS, &key, || {
                format!("block {number} on chain {chain_id}")
            })
        })
    }

    fn delete_block(
        &self,
        avs: &Address,
        chain_id: ChainId,
        number: u64,
    ) -> Result<(), StoreError> {
        let key = keys::block_key(avs, chain_id, number);
        self.with_db(|db| self.delete_raw(db, CF_BLOCKS, &key))
    }

    fn set_last_processed_block(
        &self,
        avs: &Address,
        chain_id: ChainId,
        number: u64,
    ) -> Result<(), StoreError> {
        let key = keys::checkpoint_key(avs, chain_id);
        self.with_db(|db| self.put_raw(db, CF_CHECKPOINTS, &key, &number.to_be_bytes()))
    }

    fn get_last_processed_block(
        &self,
        avs: &Address,
        chain_id: ChainId,
    ) -> Result<u64, StoreError> {
        let key = keys::checkpoint_key(avs, chain_id);
        self.with_db(|db| {
            let bytes = self
                .get_raw(db, CF_CHECKPOINTS, &key)?
                .ok_or_else(|| StoreError::not_found(format!("checkpoint for chain {chain_id}")))?;
            let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                StoreError::Serialization(format!("checkpoint has {} bytes", bytes.len()))
            })?;
            Ok(u64::from_be_bytes(raw))
        })
    }

    fn save_pending_task(&self, task: &Task) -> Result<bool, StoreError> {
        let key = keys::task_key(&task.avs_address, &task.task_id);
        let _writer = self.write_lock.lock();
        self.with_db(|db| {
            if self.get_raw(db, CF_TASKS, &key)?.is_some() {
                debug!(task_id = %task.task_id, "Task already stored");
                return Ok(false);
            }
            let value = encode(&task.clone().with_status(TaskStatus::Pending))?;
            self.put_raw(db, CF_TASKS, &key, &value)?;
            Ok(true)
        })
    }

    fn get_task(&self, avs: &Address, task_id: &TaskId) -> Result<Task, StoreError> {
        let key = keys::task_key(avs, task_id);
        self.with_db(|db| self.get_value(db, CF_TASKS, &key, || format!("task {task_id}")))
    }

    fn list_pending_tasks_for_avs(&self, avs: &Address) -> Result<Vec<Task>, StoreError> {
        let prefix = keys::task_prefix(avs);
        self.with_db(|db| {
            let handle = cf_handle(db, CF_TASKS)?;
            let mut tasks = Vec::new();
            for item in db.iterator_cf(handle, IteratorMode::From(prefix.as_slice(), Direction::Forward)) {
                let (key, value) = item
                    .map_err(|e| StoreError::Backend(format!("task scan failed: {e}")))?;
                if !key.starts_with(&prefix) {
                    break;
                }
                let task: Task = decode(&value)?;
                if task.status.is_recoverable() {
                    tasks.push(task);
                }
            }
            Ok(tasks)
        })
    }

    fn update_task_status(
        &self,
        avs: &Address,
        task_id: &TaskId,
        status: TaskStatus,
    ) -> Result<Task, StoreError> {
        let key = keys::task_key(avs, task_id);
        let _writer = self.write_lock.lock();
        self.with_db(|db| {
            let mut task: Task =
                self.get_value(db, CF_TASKS, &key, || format!("task {task_id}"))?;
            task.status = task
                .status
                .transition(status)
                .map_err(|e| StoreError::transition(task_id.as_str(), e))?;
            self.put_raw(db, CF_TASKS, &key, &encode(&task)?)?;
            Ok(task)
        })
    }

    fn delete_task(&self, avs: &Address, task_id: &TaskId) -> Result<(), StoreError> {
        let key = keys::task_key(avs, task_id);
        let _writer = self.write_lock.lock();
        self.with_db(|db| self.delete_raw(db, CF_TASKS, &key))
    }

    fn save_operator_set_config(
        &self,
        avs: &Address,
        operator_set_id: OperatorSetId,
        config: &OperatorSetConfig,
    ) -> Result<(), StoreError> {
        let key = keys::operator_set_key(avs, operator_set_id);
        let value = encode(config)?;
        self.with_db(|db| self.put_raw(db, CF_OPERATOR_SETS, &key, &value))
    }

    fn get_operator_set_config(
        &self,
        avs: &Address,
        operator_set_id: OperatorSetId,
    ) -> Result<OperatorSetConfig, StoreError> {
        let key = keys::operator_set_key(avs, operator_set_id);
        self.with_db(|db| {
            self.get_value(db, CF_OPERATOR_SETS, &key, || {
                format!("operator set {operator_set_id}")
            })
        })
    }

    fn close(&self) -> Result<(), StoreError> {
        let _writer = self.write_lock.lock();
        if let Some(db) = self.db.write().take() {
            db.flush()
                .map_err(|e| StoreError::Backend(format!("flush on close failed: {e}")))?;
            info!(path = %self.config.path.display(), "Task store closed");
        }
        Ok(())
    }
}
