//! Card number to issuer resolution.

use crate::card::{self, NormalizedCard};
use crate::error::ValidationError;
use crate::record::{BankMatch, RangeRecord};
use crate::store::RangeStore;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How the candidates stored under one BIN are examined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Only the first candidate is range-checked. A BIN split into several
    /// sub-ranges can therefore miss cards that fall into a later one.
    #[default]
    FirstCandidate,

    /// Every candidate is range-checked; the first containing range wins.
    AnyCandidate,
}

/// Resolves card numbers against the current contents of a [`RangeStore`].
///
/// Cheap to clone; clones share the store.
#[derive(Debug, Clone)]
pub struct RangeResolver {
    store: Arc<RangeStore>,
    policy: MatchPolicy,
}

impl RangeResolver {
    pub fn new(store: Arc<RangeStore>) -> Self {
        Self::with_policy(store, MatchPolicy::default())
    }

    pub fn with_policy(store: Arc<RangeStore>, policy: MatchPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn store(&self) -> &Arc<RangeStore> {
        &self.store
    }

    /// Resolves a raw card number.
    ///
    /// Returns `Ok(None)` when the BIN is unknown or the card lies outside the
    /// examined range; malformed input is rejected with a [`ValidationError`].
    pub fn resolve(&self, raw_card_number: &str) -> Result<Option<BankMatch>, ValidationError> {
        let card = card::normalize(raw_card_number)?;
        Ok(self.resolve_normalized(&card))
    }

    /// Resolves an already normalized card.
    pub fn resolve_normalized(&self, card: &NormalizedCard) -> Option<BankMatch> {
        let candidates = self.store.lookup_by_bin(card.bin);
        let found = select(&candidates, card.full_value, self.policy).map(RangeRecord::to_match);

        match &found {
            Some(hit) => debug!("BIN {}: matched {}", card.bin, hit.bank_name),
            None if candidates.is_empty() => debug!("BIN {}: unknown", card.bin),
            None => debug!("BIN {}: card outside stored range", card.bin),
        }
        found
    }
}

fn select(candidates: &[RangeRecord], value: u64, policy: MatchPolicy) -> Option<&RangeRecord> {
    match policy {
        MatchPolicy::FirstCandidate => candidates.first().filter(|r| r.contains(value)),
        MatchPolicy::AnyCandidate => candidates.iter().find(|r| r.contains(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(bin: u32, min: u64, max: u64, bank: &str) -> RangeRecord {
        RangeRecord::new(bin, min, max, "US".to_string(), bank.to_string()).unwrap()
    }

    fn split_bin_store() -> Arc<RangeStore> {
        Arc::new(
            RangeStore::with_records(vec![
                record(
                    411111,
                    4_111_110_000_000_000_000,
                    4_111_114_999_999_999_999,
                    "Lower",
                ),
                record(
                    411111,
                    4_111_115_000_000_000_000,
                    4_111_119_999_999_999_999,
                    "Upper",
                ),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn test_first_candidate_policy_ignores_later_ranges() {
        let resolver = RangeResolver::new(split_bin_store());

        assert_eq!(
            resolver.resolve("4111111234567890").unwrap().unwrap().bank_name,
            "Lower"
        );
        assert_eq!(resolver.resolve("4111117234567890").unwrap(), None);
    }

    #[test]
    fn test_any_candidate_policy_checks_all_ranges() {
        let resolver = RangeResolver::with_policy(split_bin_store(), MatchPolicy::AnyCandidate);

        assert_eq!(
            resolver.resolve("4111111234567890").unwrap().unwrap().bank_name,
            "Lower"
        );
        assert_eq!(
            resolver.resolve("4111117234567890").unwrap().unwrap().bank_name,
            "Upper"
        );
    }

    #[test]
    fn test_validation_errors_propagate() {
        let resolver = RangeResolver::new(split_bin_store());
        assert_eq!(resolver.resolve(""), Err(ValidationError::EmptyInput));
        assert_eq!(
            resolver.resolve("41111"),
            Err(ValidationError::MalformedBin)
        );
    }

    #[test]
    fn test_empty_store_finds_nothing() {
        let resolver = RangeResolver::new(Arc::new(RangeStore::new()));
        assert_eq!(resolver.resolve("4111111234567890").unwrap(), None);
    }
}
