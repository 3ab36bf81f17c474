use crate::domain::ids::{DriverId, PayoutId};
use crate::domain::payout::{CommissionPayout, PayoutStatus};
use crate::domain::ports::PayoutStore;
use crate::error::{CommissionError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Column family holding full payout records, keyed by payout uuid bytes.
pub const CF_PAYOUTS: &str = "payouts";
/// Column family indexing the single pending payout per driver: key is the
/// driver id, value the pending payout's uuid bytes.
pub const CF_PENDING: &str = "pending";

/// Persistent payout store on RocksDB.
///
/// The `pending` index is what makes the single-pending rule survive a
/// restart: `insert_pending` refuses to write while the driver's index row
/// exists, and `update` clears that row when its payout leaves
/// `pending_approval`. RocksDB has no unique constraints of its own, so the
/// read-check-write runs under an adapter-level mutex and commits through a
/// `WriteBatch`, keeping record and index in step.
///
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDbPayoutStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbPayoutStore {
    /// Opens or creates the database at `path` with both column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_payouts = ColumnFamilyDescriptor::new(CF_PAYOUTS, Options::default());
        let cf_pending = ColumnFamilyDescriptor::new(CF_PENDING, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_payouts, cf_pending])
            .map_err(backend)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn payouts_cf(&self) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(CF_PAYOUTS)
            .ok_or_else(|| CommissionError::Store("payouts column family missing".to_string()))
    }

    fn pending_cf(&self) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(CF_PENDING)
            .ok_or_else(|| CommissionError::Store("pending column family missing".to_string()))
    }

    fn fetch(&self, id: PayoutId) -> Result<Option<CommissionPayout>> {
        let cf = self.payouts_cf()?;
        match self.db.get_cf(cf, id.as_uuid().as_bytes()).map_err(backend)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn pending_id(&self, driver_id: &DriverId) -> Result<Option<PayoutId>> {
        let cf = self.pending_cf()?;
        match self.db.get_cf(cf, driver_id.as_str()).map_err(backend)? {
            Some(bytes) => Ok(Some(decode_id(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan(&self) -> Result<Vec<CommissionPayout>> {
        let cf = self.payouts_cf()?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item.map_err(backend)?;
            rows.push(decode(&value)?);
        }
        Ok(rows)
    }
}

#[async_trait]
impl PayoutStore for RocksDbPayoutStore {
    async fn insert_pending(&self, payout: CommissionPayout) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(existing) = self.pending_id(&payout.driver_id)? {
            return Err(CommissionError::AlreadyPending {
                driver_id: payout.driver_id.clone(),
                existing,
            });
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.payouts_cf()?,
            payout.id.as_uuid().as_bytes(),
            encode(&payout)?,
        );
        batch.put_cf(
            self.pending_cf()?,
            payout.driver_id.as_str(),
            payout.id.as_uuid().as_bytes(),
        );
        self.db.write(batch).map_err(backend)?;
        Ok(())
    }

    async fn update(&self, payout: CommissionPayout) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if self.fetch(payout.id)?.is_none() {
            return Err(CommissionError::PayoutNotFound(payout.id));
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.payouts_cf()?,
            payout.id.as_uuid().as_bytes(),
            encode(&payout)?,
        );
        if payout.status != PayoutStatus::PendingApproval {
            // drop the index row, but only if it still points at this payout
            if self.pending_id(&payout.driver_id)? == Some(payout.id) {
                batch.delete_cf(self.pending_cf()?, payout.driver_id.as_str());
            }
        }
        self.db.write(batch).map_err(backend)?;
        Ok(())
    }

    async fn get(&self, id: PayoutId) -> Result<Option<CommissionPayout>> {
        self.fetch(id)
    }

    async fn for_driver(&self, driver_id: &DriverId) -> Result<Vec<CommissionPayout>> {
        Ok(self
            .scan()?
            .into_iter()
            .filter(|p| &p.driver_id == driver_id)
            .collect())
    }

    async fn all(&self) -> Result<Vec<CommissionPayout>> {
        self.scan()
    }

    async fn pending_for_driver(&self, driver_id: &DriverId) -> Result<Option<CommissionPayout>> {
        match self.pending_id(driver_id)? {
            Some(id) => self.fetch(id),
            None => Ok(None),
        }
    }
}

fn backend(e: rocksdb::Error) -> CommissionError {
    CommissionError::Store(e.to_string())
}

fn encode(payout: &CommissionPayout) -> Result<Vec<u8>> {
    serde_json::to_vec(payout).map_err(|e| CommissionError::Store(format!("serialize payout: {e}")))
}

fn decode(bytes: &[u8]) -> Result<CommissionPayout> {
    serde_json::from_slice(bytes)
        .map_err(|e| CommissionError::Store(format!("corrupt payout row: {e}")))
}

fn decode_id(bytes: &[u8]) -> Result<PayoutId> {
    let uuid = Uuid::from_slice(bytes)
        .map_err(|e| CommissionError::Store(format!("corrupt pending index: {e}")))?;
    Ok(PayoutId::from(uuid))
}
