//! Storage layer using RocksDB
//!
//! The persisted settlement document lives in one database with a column
//! family per append-only log plus a scalar head:
//!
//! - `meta` - Pool value, cursor and cumulative totals (single key)
//! - `exchanges` - Settlement records (key: sequence number)
//! - `burns` - Confirmed burn records (key: sequence number)
//! - `pool_changes` - Pool mutation audit trail (key: sequence number)
//! - `errors` - Unrecoverable-failure diagnostics (key: sequence number)
//! - `warnings` - Tolerated-anomaly diagnostics (key: sequence number)
//! - `scheduled` - Queued pool increases (key: target height || sequence)
//!
//! Every mutating operation is a single `WriteBatch` applied under the
//! store's writer mutex with a synchronous write, so a commit is durable
//! before the call returns and can never be observed half-applied. This is
//! the atomic `mutate` contract the block processor relies on.

use crate::{
    config::StoreConfig,
    error::{Error, Result},
    types::{
        BlockCommit, Burn, Exchange, ExchangeStatus, LedgerDocument, Meta, PoolChange,
        ProcessingError, ProcessingWarning, ScheduledPoolIncrease,
    },
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, WriteOptions, DB};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Column family names
const CF_META: &str = "meta";
const CF_EXCHANGES: &str = "exchanges";
const CF_BURNS: &str = "burns";
const CF_POOL_CHANGES: &str = "pool_changes";
const CF_ERRORS: &str = "errors";
const CF_WARNINGS: &str = "warnings";
const CF_SCHEDULED: &str = "scheduled";

/// Key of the scalar document head inside `meta`
const META_KEY: &[u8] = b"meta";

/// Cached mutable head of the document, guarded by the writer mutex
struct Inner {
    meta: Meta,
    next_exchange: u64,
    next_burn: u64,
    next_pool_change: u64,
    next_error: u64,
    next_warning: u64,
    next_scheduled: u64,
}

/// RocksDB-backed settlement ledger
///
/// All mutating operations are serialized behind one writer mutex and
/// applied as atomic batches; readers go straight to the database.
pub struct LedgerStore {
    db: Arc<DB>,
    inner: Mutex<Inner>,
    write_opts_sync: bool,
}

impl LedgerStore {
    /// Open or create the ledger database
    ///
    /// On first open the scalar head is seeded with the configured initial
    /// pool value and cursor.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let path = &config.data_dir;
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
            ColumnFamilyDescriptor::new(CF_EXCHANGES, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_BURNS, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_POOL_CHANGES, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_ERRORS, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_WARNINGS, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_SCHEDULED, Options::default()),
        ];

        let db = Arc::new(DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?);

        let meta = match db
            .get_cf(Self::handle(&db, CF_META)?, META_KEY)?
        {
            Some(bytes) => bincode::deserialize(&bytes)?,
            None => {
                let meta = Meta {
                    size_dollar_pool: config.initial_pool,
                    last_block_processed: config.initial_cursor,
                    tokens_burned: Decimal::ZERO,
                    total_usd_paid: Decimal::ZERO,
                };
                let mut opts = WriteOptions::default();
                opts.set_sync(config.sync_writes);
                let mut batch = WriteBatch::default();
                batch.put_cf(Self::handle(&db, CF_META)?, META_KEY, bincode::serialize(&meta)?);
                db.write_opt(batch, &opts)?;
                tracing::info!(
                    pool = %meta.size_dollar_pool,
                    cursor = meta.last_block_processed,
                    "Seeded new settlement ledger"
                );
                meta
            }
        };

        let inner = Inner {
            meta,
            next_exchange: Self::next_seq(&db, CF_EXCHANGES)?,
            next_burn: Self::next_seq(&db, CF_BURNS)?,
            next_pool_change: Self::next_seq(&db, CF_POOL_CHANGES)?,
            next_error: Self::next_seq(&db, CF_ERRORS)?,
            next_warning: Self::next_seq(&db, CF_WARNINGS)?,
            next_scheduled: Self::next_scheduled_seq(&db)?,
        };

        tracing::info!(
            path = %path.display(),
            exchanges = inner.next_exchange,
            burns = inner.next_burn,
            cursor = inner.meta.last_block_processed,
            "Opened settlement ledger"
        );

        Ok(Self {
            db,
            inner: Mutex::new(inner),
            write_opts_sync: config.sync_writes,
        })
    }

    fn cf_options_log() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn handle<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily> {
        db.cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        Self::handle(&self.db, name)
    }

    /// Next sequence number for a log CF keyed by big-endian u64
    fn next_seq(db: &DB, name: &str) -> Result<u64> {
        let cf = Self::handle(db, name)?;
        let mut iter = db.iterator_cf(cf, IteratorMode::End);
        match iter.next() {
            Some(item) => {
                let (key, _) = item?;
                let bytes: [u8; 8] = key
                    .as_ref()
                    .try_into()
                    .map_err(|_| Error::Storage(format!("Malformed key in {}", name)))?;
                Ok(u64::from_be_bytes(bytes) + 1)
            }
            None => Ok(0),
        }
    }

    /// Next disambiguating sequence for the scheduled CF (height || seq keys)
    fn next_scheduled_seq(db: &DB) -> Result<u64> {
        let cf = Self::handle(db, CF_SCHEDULED)?;
        let mut max_seq = 0u64;
        for item in db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item?;
            if key.len() == 16 {
                let bytes: [u8; 8] = key[8..16].try_into().expect("length checked");
                max_seq = max_seq.max(u64::from_be_bytes(bytes) + 1);
            }
        }
        Ok(max_seq)
    }

    fn write_opts(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.write_opts_sync);
        opts
    }

    fn put_record<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf_name: &str,
        seq: u64,
        record: &T,
    ) -> Result<()> {
        batch.put_cf(self.cf(cf_name)?, seq.to_be_bytes(), bincode::serialize(record)?);
        Ok(())
    }

    fn put_meta(&self, batch: &mut WriteBatch, meta: &Meta) -> Result<()> {
        batch.put_cf(self.cf(CF_META)?, META_KEY, bincode::serialize(meta)?);
        Ok(())
    }

    /// Current scalar head of the document
    pub fn meta(&self) -> Meta {
        self.inner.lock().meta.clone()
    }

    /// Highest block whose effects are committed
    pub fn last_block_processed(&self) -> u64 {
        self.inner.lock().meta.last_block_processed
    }

    /// Current USD value of the reserve pool
    pub fn pool(&self) -> Decimal {
        self.inner.lock().meta.size_dollar_pool
    }

    /// Fold every scheduled pool increase due at `block_height` into the
    /// pool, emitting one audit record per applied increase and removing the
    /// consumed entries. Returns the refreshed pool value.
    pub fn refresh(
        &self,
        block_height: u64,
        block_time: DateTime<Utc>,
        issuance: Decimal,
    ) -> Result<Decimal> {
        let mut inner = self.inner.lock();

        let due = self.due_increases(block_height)?;
        if due.is_empty() {
            return Ok(inner.meta.size_dollar_pool);
        }

        let mut batch = WriteBatch::default();
        let mut meta = inner.meta.clone();
        let mut next_pool_change = inner.next_pool_change;

        for (key, increase) in &due {
            meta.size_dollar_pool = meta
                .size_dollar_pool
                .checked_add(increase.amount)
                .ok_or_else(|| Error::ArithmeticOverflow("pool increase".to_string()))?;

            let price_after = meta
                .size_dollar_pool
                .checked_div(issuance)
                .ok_or_else(|| Error::InvariantViolation("issuance is zero".to_string()))?;

            let change = PoolChange {
                block_height,
                block_time,
                delta: increase.amount,
                issuance,
                pool_after: meta.size_dollar_pool,
                price_after,
                reason: format!("scheduled pool increase: {}", increase.reason),
            };
            self.put_record(&mut batch, CF_POOL_CHANGES, next_pool_change, &change)?;
            next_pool_change += 1;
            batch.delete_cf(self.cf(CF_SCHEDULED)?, key);

            tracing::info!(
                block_height,
                amount = %increase.amount,
                pool = %meta.size_dollar_pool,
                "Applied scheduled pool increase"
            );
        }

        self.put_meta(&mut batch, &meta)?;
        self.db.write_opt(batch, &self.write_opts())?;

        inner.meta = meta;
        inner.next_pool_change = next_pool_change;
        Ok(inner.meta.size_dollar_pool)
    }

    /// Scheduled increases with target height at or below `block_height`
    fn due_increases(&self, block_height: u64) -> Result<Vec<(Vec<u8>, ScheduledPoolIncrease)>> {
        let cf = self.cf(CF_SCHEDULED)?;
        let mut due = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            if key.len() != 16 {
                return Err(Error::Storage("Malformed key in scheduled".to_string()));
            }
            let height = u64::from_be_bytes(key[..8].try_into().expect("length checked"));
            if height > block_height {
                // Keys are ordered by target height
                break;
            }
            due.push((key.to_vec(), bincode::deserialize(&value)?));
        }
        Ok(due)
    }

    /// Commit one processed block: settlement records, pool decrement,
    /// cumulative burn total and cursor advance, atomically.
    ///
    /// The cursor must advance by exactly one; anything else is an ordering
    /// invariant violation.
    pub fn commit_block(&self, block_height: u64, commit: BlockCommit) -> Result<()> {
        let mut inner = self.inner.lock();

        if block_height != inner.meta.last_block_processed + 1 {
            return Err(Error::InvariantViolation(format!(
                "Commit for block {} but cursor is at {}",
                block_height, inner.meta.last_block_processed
            )));
        }
        if commit.sum_usd != Decimal::ZERO && commit.pool_change.is_none() {
            return Err(Error::InvariantViolation(
                "Non-zero settlement without pool-change audit record".to_string(),
            ));
        }

        let mut batch = WriteBatch::default();
        let mut meta = inner.meta.clone();
        let mut next_exchange = inner.next_exchange;
        let mut next_burn = inner.next_burn;
        let mut next_warning = inner.next_warning;
        let mut next_pool_change = inner.next_pool_change;

        for exchange in &commit.exchanges {
            self.put_record(&mut batch, CF_EXCHANGES, next_exchange, exchange)?;
            next_exchange += 1;
        }
        for burn in &commit.burns {
            self.put_record(&mut batch, CF_BURNS, next_burn, burn)?;
            next_burn += 1;
        }
        for warning in &commit.warnings {
            self.put_record(&mut batch, CF_WARNINGS, next_warning, warning)?;
            next_warning += 1;
        }
        if let Some(change) = &commit.pool_change {
            self.put_record(&mut batch, CF_POOL_CHANGES, next_pool_change, change)?;
            next_pool_change += 1;
        }

        meta.size_dollar_pool = meta
            .size_dollar_pool
            .checked_sub(commit.sum_usd)
            .ok_or_else(|| Error::ArithmeticOverflow("pool decrement".to_string()))?;
        meta.tokens_burned = meta
            .tokens_burned
            .checked_add(commit.tokens_burned)
            .ok_or_else(|| Error::ArithmeticOverflow("tokens burned".to_string()))?;
        meta.last_block_processed = block_height;
        self.put_meta(&mut batch, &meta)?;

        self.db.write_opt(batch, &self.write_opts())?;

        tracing::debug!(
            block_height,
            exchanges = commit.exchanges.len(),
            burns = commit.burns.len(),
            sum_usd = %commit.sum_usd,
            pool = %meta.size_dollar_pool,
            "Block committed"
        );

        inner.meta = meta;
        inner.next_exchange = next_exchange;
        inner.next_burn = next_burn;
        inner.next_warning = next_warning;
        inner.next_pool_change = next_pool_change;
        Ok(())
    }

    /// Append a tolerated-anomaly diagnostic
    pub fn record_warning(&self, block_height: u64, message: impl Into<String>) -> Result<()> {
        let mut inner = self.inner.lock();
        let warning = ProcessingWarning {
            block_height,
            recorded_at: Utc::now(),
            message: message.into(),
        };

        let mut batch = WriteBatch::default();
        self.put_record(&mut batch, CF_WARNINGS, inner.next_warning, &warning)?;
        self.db.write_opt(batch, &self.write_opts())?;

        inner.next_warning += 1;
        Ok(())
    }

    /// Append an unrecoverable-failure diagnostic without touching the cursor
    pub fn record_error(&self, block_height: u64, reason: impl Into<String>) -> Result<()> {
        let mut inner = self.inner.lock();
        let error = ProcessingError {
            block_height,
            recorded_at: Utc::now(),
            reason: reason.into(),
        };

        let mut batch = WriteBatch::default();
        self.put_record(&mut batch, CF_ERRORS, inner.next_error, &error)?;
        self.db.write_opt(batch, &self.write_opts())?;

        inner.next_error += 1;
        Ok(())
    }

    /// Critical-exit persistence: append an unrecoverable-failure diagnostic
    /// AND force the cursor to the faulting block, atomically and durably,
    /// so the block is never retried after restart.
    pub fn record_fatal(&self, block_height: u64, reason: impl Into<String>) -> Result<()> {
        let mut inner = self.inner.lock();
        let reason = reason.into();
        let error = ProcessingError {
            block_height,
            recorded_at: Utc::now(),
            reason: reason.clone(),
        };

        let mut batch = WriteBatch::default();
        self.put_record(&mut batch, CF_ERRORS, inner.next_error, &error)?;
        let mut meta = inner.meta.clone();
        meta.last_block_processed = block_height;
        self.put_meta(&mut batch, &meta)?;
        self.db.write_opt(batch, &self.write_opts())?;

        tracing::error!(block_height, reason = %reason, "Fatal block failure recorded");

        inner.next_error += 1;
        inner.meta = meta;
        Ok(())
    }

    /// Queue an administrative pool increase
    pub fn schedule_pool_increase(&self, increase: ScheduledPoolIncrease) -> Result<()> {
        let mut inner = self.inner.lock();

        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&increase.block_height.to_be_bytes());
        key[8..].copy_from_slice(&inner.next_scheduled.to_be_bytes());

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_SCHEDULED)?, key, bincode::serialize(&increase)?);
        self.db.write_opt(batch, &self.write_opts())?;

        tracing::info!(
            block_height = increase.block_height,
            amount = %increase.amount,
            "Scheduled pool increase"
        );

        inner.next_scheduled += 1;
        Ok(())
    }

    /// Administrative contract: flip a PENDING exchange to FINALIZED and add
    /// its USD amount to the cumulative paid-out total, atomically.
    pub fn set_exchange_status(&self, index: u64, status: ExchangeStatus) -> Result<Exchange> {
        let mut inner = self.inner.lock();

        let cf = self.cf(CF_EXCHANGES)?;
        let mut exchange: Exchange = match self.db.get_cf(cf, index.to_be_bytes())? {
            Some(bytes) => bincode::deserialize(&bytes)?,
            None => return Err(Error::ExchangeNotFound(index)),
        };

        if exchange.status == ExchangeStatus::Finalized {
            return Err(Error::InvalidStatusTransition(format!(
                "Exchange {} is already FINALIZED",
                index
            )));
        }
        if status != ExchangeStatus::Finalized {
            return Err(Error::InvalidStatusTransition(format!(
                "Exchange {} cannot move back to {}",
                index, status
            )));
        }

        exchange.status = ExchangeStatus::Finalized;

        let mut batch = WriteBatch::default();
        batch.put_cf(cf, index.to_be_bytes(), bincode::serialize(&exchange)?);
        let mut meta = inner.meta.clone();
        meta.total_usd_paid = meta
            .total_usd_paid
            .checked_add(exchange.amount_usd)
            .ok_or_else(|| Error::ArithmeticOverflow("total paid".to_string()))?;
        self.put_meta(&mut batch, &meta)?;
        self.db.write_opt(batch, &self.write_opts())?;

        tracing::info!(
            index,
            amount_usd = %exchange.amount_usd,
            total_usd_paid = %meta.total_usd_paid,
            "Exchange finalized"
        );

        inner.meta = meta;
        Ok(exchange)
    }

    fn read_log<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            records.push(bincode::deserialize(&value)?);
        }
        Ok(records)
    }

    /// All settlement records, in commit order
    pub fn exchanges(&self) -> Result<Vec<Exchange>> {
        self.read_log(CF_EXCHANGES)
    }

    /// All burn records, in commit order
    pub fn burns(&self) -> Result<Vec<Burn>> {
        self.read_log(CF_BURNS)
    }

    /// Full audit history of pool mutations
    pub fn pool_changes(&self) -> Result<Vec<PoolChange>> {
        self.read_log(CF_POOL_CHANGES)
    }

    /// All unrecoverable-failure diagnostics
    pub fn errors(&self) -> Result<Vec<ProcessingError>> {
        self.read_log(CF_ERRORS)
    }

    /// All tolerated-anomaly diagnostics
    pub fn warnings(&self) -> Result<Vec<ProcessingWarning>> {
        self.read_log(CF_WARNINGS)
    }

    /// Pending administrative pool increases, ordered by target height
    pub fn scheduled_increases(&self) -> Result<Vec<ScheduledPoolIncrease>> {
        self.read_log(CF_SCHEDULED)
    }

    /// Assemble the whole-document view
    pub fn load(&self) -> Result<LedgerDocument> {
        let meta = self.meta();
        Ok(LedgerDocument {
            exchanges: self.exchanges()?,
            burns: self.burns()?,
            errors: self.errors()?,
            warnings: self.warnings()?,
            pool_change_history: self.pool_changes()?,
            scheduled_pool_increases: self.scheduled_increases()?,
            size_dollar_pool: meta.size_dollar_pool,
            last_block_processed: meta.last_block_processed,
            tokens_burned: meta.tokens_burned,
            total_usd_paid: meta.total_usd_paid,
        })
    }
}

impl std::fmt::Debug for LedgerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccountId;
    use tempfile::TempDir;

    fn test_store() -> (LedgerStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig {
            data_dir: temp_dir.path().to_path_buf(),
            initial_pool: Decimal::new(50_000, 0),
            initial_cursor: 100,
            ..Default::default()
        };
        (LedgerStore::open(&config).unwrap(), temp_dir)
    }

    fn test_exchange(block_height: u64, amount_usd: Decimal) -> Exchange {
        Exchange {
            sender: AccountId::new("5Sender"),
            recipient: AccountId::new("5Reserve"),
            amount: Decimal::new(1000, 0),
            amount_usd,
            price: Decimal::new(5, 2),
            block_height,
            block_time: Utc::now(),
            logged_at: Utc::now(),
            status: ExchangeStatus::Pending,
        }
    }

    fn commit_with_usd(block_height: u64, sum_usd: Decimal, pool_after: Decimal) -> BlockCommit {
        BlockCommit {
            exchanges: vec![test_exchange(block_height, sum_usd)],
            pool_change: Some(PoolChange {
                block_height,
                block_time: Utc::now(),
                delta: -sum_usd,
                issuance: Decimal::new(1_000_000, 0),
                pool_after,
                price_after: Decimal::new(5, 2),
                reason: "exchanges settled".to_string(),
            }),
            sum_usd,
            ..Default::default()
        }
    }

    #[test]
    fn test_open_seeds_meta() {
        let (store, _temp) = test_store();
        let meta = store.meta();
        assert_eq!(meta.size_dollar_pool, Decimal::new(50_000, 0));
        assert_eq!(meta.last_block_processed, 100);
        assert_eq!(meta.tokens_burned, Decimal::ZERO);
        assert_eq!(meta.total_usd_paid, Decimal::ZERO);
    }

    #[test]
    fn test_commit_block_updates_pool_and_cursor() {
        let (store, _temp) = test_store();
        let sum = Decimal::new(50, 0);
        store
            .commit_block(101, commit_with_usd(101, sum, Decimal::new(49_950, 0)))
            .unwrap();

        let meta = store.meta();
        assert_eq!(meta.size_dollar_pool, Decimal::new(49_950, 0));
        assert_eq!(meta.last_block_processed, 101);
        assert_eq!(store.exchanges().unwrap().len(), 1);
        assert_eq!(store.pool_changes().unwrap().len(), 1);
    }

    #[test]
    fn test_commit_block_rejects_gap() {
        let (store, _temp) = test_store();
        let err = store
            .commit_block(105, commit_with_usd(105, Decimal::ONE, Decimal::new(49_999, 0)))
            .unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));

        // Nothing from the rejected commit is visible
        assert_eq!(store.last_block_processed(), 100);
        assert!(store.exchanges().unwrap().is_empty());
        assert!(store.pool_changes().unwrap().is_empty());
    }

    #[test]
    fn test_commit_block_rejects_duplicate_height() {
        let (store, _temp) = test_store();
        store
            .commit_block(101, commit_with_usd(101, Decimal::ONE, Decimal::new(49_999, 0)))
            .unwrap();
        let err = store
            .commit_block(101, commit_with_usd(101, Decimal::ONE, Decimal::new(49_998, 0)))
            .unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
        assert_eq!(store.pool(), Decimal::new(49_999, 0));
    }

    #[test]
    fn test_empty_block_advances_cursor_only() {
        let (store, _temp) = test_store();
        store.commit_block(101, BlockCommit::default()).unwrap();
        assert_eq!(store.last_block_processed(), 101);
        assert_eq!(store.pool(), Decimal::new(50_000, 0));
        assert!(store.pool_changes().unwrap().is_empty());
    }

    #[test]
    fn test_refresh_applies_due_increase_once() {
        let (store, _temp) = test_store();
        store
            .schedule_pool_increase(ScheduledPoolIncrease {
                block_height: 200,
                amount: Decimal::new(10_000, 0),
                reason: "replenish".to_string(),
            })
            .unwrap();

        // Not yet due
        let pool = store
            .refresh(150, Utc::now(), Decimal::new(1_000_000, 0))
            .unwrap();
        assert_eq!(pool, Decimal::new(50_000, 0));
        assert_eq!(store.scheduled_increases().unwrap().len(), 1);

        // Due at 200: applied, audited, removed
        let pool = store
            .refresh(200, Utc::now(), Decimal::new(1_000_000, 0))
            .unwrap();
        assert_eq!(pool, Decimal::new(60_000, 0));
        assert!(store.scheduled_increases().unwrap().is_empty());

        let changes = store.pool_changes().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].delta, Decimal::new(10_000, 0));
        assert!(changes[0].reason.contains("replenish"));

        // Second refresh at the same height is a no-op
        let pool = store
            .refresh(200, Utc::now(), Decimal::new(1_000_000, 0))
            .unwrap();
        assert_eq!(pool, Decimal::new(60_000, 0));
        assert_eq!(store.pool_changes().unwrap().len(), 1);
    }

    #[test]
    fn test_record_fatal_forces_cursor() {
        let (store, _temp) = test_store();
        store.record_fatal(107, "boom").unwrap();

        let meta = store.meta();
        assert_eq!(meta.last_block_processed, 107);
        let errors = store.errors().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].block_height, 107);
        assert_eq!(errors[0].reason, "boom");
    }

    #[test]
    fn test_set_exchange_status_finalizes_once() {
        let (store, _temp) = test_store();
        let sum = Decimal::new(50, 0);
        store
            .commit_block(101, commit_with_usd(101, sum, Decimal::new(49_950, 0)))
            .unwrap();

        let exchange = store.set_exchange_status(0, ExchangeStatus::Finalized).unwrap();
        assert_eq!(exchange.status, ExchangeStatus::Finalized);
        assert_eq!(store.meta().total_usd_paid, sum);

        // Already finalized
        let err = store.set_exchange_status(0, ExchangeStatus::Finalized).unwrap_err();
        assert!(matches!(err, Error::InvalidStatusTransition(_)));
        assert_eq!(store.meta().total_usd_paid, sum);

        // Unknown index
        let err = store.set_exchange_status(7, ExchangeStatus::Finalized).unwrap_err();
        assert!(matches!(err, Error::ExchangeNotFound(7)));
    }

    #[test]
    fn test_reopen_preserves_state() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig {
            data_dir: temp_dir.path().to_path_buf(),
            initial_pool: Decimal::new(50_000, 0),
            initial_cursor: 100,
            ..Default::default()
        };

        {
            let store = LedgerStore::open(&config).unwrap();
            store
                .commit_block(101, commit_with_usd(101, Decimal::new(50, 0), Decimal::new(49_950, 0)))
                .unwrap();
            store.record_warning(101, "ahead of finality").unwrap();
        }

        // Reopen: committed state survives, seeding does not re-run
        let store = LedgerStore::open(&config).unwrap();
        let meta = store.meta();
        assert_eq!(meta.size_dollar_pool, Decimal::new(49_950, 0));
        assert_eq!(meta.last_block_processed, 101);
        assert_eq!(store.exchanges().unwrap().len(), 1);
        assert_eq!(store.warnings().unwrap().len(), 1);

        // Appends continue from the persisted sequence
        store.commit_block(102, BlockCommit::default()).unwrap();
        assert_eq!(store.last_block_processed(), 102);
    }

    #[test]
    fn test_load_assembles_document() {
        let (store, _temp) = test_store();
        store
            .commit_block(101, commit_with_usd(101, Decimal::new(50, 0), Decimal::new(49_950, 0)))
            .unwrap();
        store.record_warning(101, "note").unwrap();

        let doc = store.load().unwrap();
        assert_eq!(doc.exchanges.len(), 1);
        assert_eq!(doc.warnings.len(), 1);
        assert_eq!(doc.size_dollar_pool, Decimal::new(49_950, 0));
        assert_eq!(doc.last_block_processed, 101);
    }
}
