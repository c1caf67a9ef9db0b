//! The range table.
//!
//! Readers always see one immutable [`RangeSnapshot`]. A replace builds the
//! next snapshot off to the side and publishes it with a single pointer swap,
//! so a concurrent lookup observes either the whole old table or the whole
//! new one.

use crate::error::StoreError;
use crate::record::RangeRecord;
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// An immutable, indexed generation of the range table.
#[derive(Debug, Default)]
pub struct RangeSnapshot {
    version: u64,
    by_bin: HashMap<u32, Vec<RangeRecord>>,
    len: usize,
}

impl RangeSnapshot {
    /// Indexes records by BIN, keeping dataset order within each BIN.
    fn build(version: u64, records: Vec<RangeRecord>) -> Self {
        let len = records.len();
        let mut by_bin: HashMap<u32, Vec<RangeRecord>> = HashMap::new();
        for record in records {
            by_bin.entry(record.bin()).or_default().push(record);
        }

        RangeSnapshot {
            version,
            by_bin,
            len,
        }
    }

    /// Generation number; 0 means nothing has been loaded yet.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct BINs.
    pub fn bin_count(&self) -> usize {
        self.by_bin.len()
    }

    /// Records stored under `bin`, in dataset order.
    pub fn records_for(&self, bin: u32) -> &[RangeRecord] {
        self.by_bin.get(&bin).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Authoritative collection of BIN ranges.
///
/// Shared between one writer (the refresher) and any number of readers.
#[derive(Debug, Default)]
pub struct RangeStore {
    current: RwLock<Arc<RangeSnapshot>>,

    /// Serializes replaces; never taken by readers.
    writer: Mutex<()>,
}

impl RangeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `records`.
    pub fn with_records(records: Vec<RangeRecord>) -> Result<Self, StoreError> {
        let store = Self::new();
        store.replace_all(records)?;
        Ok(store)
    }

    /// Returns the currently published snapshot.
    ///
    /// The read lock is held only long enough to clone the `Arc`.
    pub fn snapshot(&self) -> Arc<RangeSnapshot> {
        self.current.read().clone()
    }

    /// Returns copies of every record stored under `bin`.
    pub fn lookup_by_bin(&self, bin: u32) -> Vec<RangeRecord> {
        let snapshot = self.snapshot();
        let records = snapshot.records_for(bin).to_vec();
        debug!(
            "BIN {}: {} candidate range(s) in version {}",
            bin,
            records.len(),
            snapshot.version()
        );
        records
    }

    /// Atomically replaces the entire table.
    ///
    /// An empty dataset is rejected before anything is touched, leaving the
    /// current table in place. Concurrent replaces run one after another.
    pub fn replace_all(&self, records: Vec<RangeRecord>) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Err(StoreError::EmptyDataset);
        }

        let _writer = self.writer.lock();

        let version = self.version() + 1;
        let next = Arc::new(RangeSnapshot::build(version, records));
        let (len, bins) = (next.len(), next.bin_count());

        let previous = std::mem::replace(&mut *self.current.write(), next);

        info!(
            "Range table replaced: version {} -> {}, {} ranges across {} BINs",
            previous.version(),
            version,
            len,
            bins
        );
        Ok(version)
    }

    /// Version of the published snapshot.
    pub fn version(&self) -> u64 {
        self.current.read().version()
    }

    /// Number of records in the published snapshot.
    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(bin: u32, bank: &str) -> RangeRecord {
        let min = u64::from(bin) * 10_000_000_000_000;
        RangeRecord::new(
            bin,
            min,
            min + 9_999_999_999_999,
            "US".to_string(),
            bank.to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = RangeStore::new();
        assert!(store.is_empty());
        assert_eq!(store.version(), 0);
        assert!(store.lookup_by_bin(411111).is_empty());
    }

    #[test]
    fn test_replace_and_lookup() {
        let store = RangeStore::new();
        let version = store
            .replace_all(vec![record(411111, "A"), record(522222, "B")])
            .unwrap();

        assert_eq!(version, 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.lookup_by_bin(411111)[0].bank_name(), "A");
        assert_eq!(store.lookup_by_bin(522222)[0].bank_name(), "B");
        assert!(store.lookup_by_bin(633333).is_empty());
    }

    #[test]
    fn test_records_sharing_a_bin_keep_dataset_order() {
        let store = RangeStore::with_records(vec![
            record(411111, "first"),
            record(522222, "other"),
            record(411111, "second"),
        ])
        .unwrap();

        let names: Vec<_> = store
            .lookup_by_bin(411111)
            .iter()
            .map(|r| r.bank_name().to_string())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_replace_drops_previous_records() {
        let store = RangeStore::with_records(vec![record(411111, "old")]).unwrap();
        store.replace_all(vec![record(522222, "new")]).unwrap();

        assert!(store.lookup_by_bin(411111).is_empty());
        assert_eq!(store.lookup_by_bin(522222).len(), 1);
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn test_empty_replace_keeps_existing_table() {
        let store = RangeStore::with_records(vec![record(411111, "kept")]).unwrap();

        assert_eq!(store.replace_all(Vec::new()), Err(StoreError::EmptyDataset));
        assert_eq!(store.version(), 1);
        assert_eq!(store.lookup_by_bin(411111)[0].bank_name(), "kept");
    }

    #[test]
    fn test_snapshot_outlives_replace() {
        let store = RangeStore::with_records(vec![record(411111, "old")]).unwrap();
        let held = store.snapshot();

        store.replace_all(vec![record(411111, "new")]).unwrap();

        assert_eq!(held.records_for(411111)[0].bank_name(), "old");
        assert_eq!(store.lookup_by_bin(411111)[0].bank_name(), "new");
    }
}
