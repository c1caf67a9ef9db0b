//! # BIN Resolver
//!
//! Resolves a payment card number to its issuing bank by matching the card's
//! BIN against a table of numeric ranges. The table is refreshed periodically
//! from a remote zip archive and swapped in atomically, so lookups always see
//! one complete dataset.
//!
//! ## Design Principles
//!
//! - **19-digit range space**: card numbers are normalized (masking `*` read as
//!   `0`, 16-digit numbers padded) before comparison
//! - **Snapshot swaps**: a replace publishes a new immutable snapshot; readers
//!   never see a partially loaded table
//! - **Stale over empty**: a failed refresh keeps the last good dataset
//! - **Single writer**: refresh cycles never overlap
//!
//! ## Example
//!
//! ```
//! use bin_resolver::{RangeRecord, RangeResolver, RangeStore};
//! use std::sync::Arc;
//!
//! let record = RangeRecord::new(
//!     411111,
//!     4111110000000000000,
//!     4111119999999999999,
//!     "US".to_string(),
//!     "Example Bank".to_string(),
//! )
//! .unwrap();
//! let store = Arc::new(RangeStore::with_records(vec![record]).unwrap());
//! let resolver = RangeResolver::new(store);
//!
//! let hit = resolver.resolve("4111111234567890").unwrap().unwrap();
//! assert_eq!(hit.bank_name, "Example Bank");
//! ```

pub mod archive;
pub mod batch;
pub mod card;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod record;
pub mod refresher;
pub mod resolver;
pub mod store;

pub use batch::{BatchValidator, CheckResult, CheckStatus};
pub use card::{normalize, NormalizedCard};
pub use config::RefreshConfig;
pub use error::{FetchError, RefreshError, Result, ServiceError, StoreError, ValidationError};
pub use fetcher::{DatasetFetcher, HttpArchiveFetcher, LocalDatasetFetcher};
pub use record::{BankMatch, RangeRecord, RawRangeRecord};
pub use refresher::{DatasetRefresher, RefreshHandle, RefreshOutcome, RefreshState, RefreshStatus};
pub use resolver::{MatchPolicy, RangeResolver};
pub use store::{RangeSnapshot, RangeStore};
