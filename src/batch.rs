//! CSV batch validation.
//!
//! Reads rows with a `card_number` column, resolves each one and writes a
//! result row per input. Bad rows are reported in the output and logged;
//! they never abort the batch.

use crate::card::mask_card;
use crate::error::Result;
use crate::record::BankMatch;
use crate::resolver::RangeResolver;
use csv::{ReaderBuilder, Trim};
use log::warn;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// One input row.
#[derive(Debug, Deserialize)]
pub struct CardRow {
    pub card_number: String,
}

/// Outcome class of a single lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Found,
    NotFound,
    Invalid,
}

/// One output row. The card number is always redacted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub card_number: String,
    pub status: CheckStatus,
    pub bin: Option<u32>,
    pub alpha_code: Option<String>,
    pub bank_name: Option<String>,
}

impl CheckResult {
    fn found(card_number: &str, hit: BankMatch) -> Self {
        CheckResult {
            card_number: mask_card(card_number),
            status: CheckStatus::Found,
            bin: Some(hit.bin),
            alpha_code: Some(hit.alpha_code),
            bank_name: Some(hit.bank_name),
        }
    }

    fn empty(card_number: &str, status: CheckStatus) -> Self {
        CheckResult {
            card_number: mask_card(card_number),
            status,
            bin: None,
            alpha_code: None,
            bank_name: None,
        }
    }
}

/// Resolves card numbers in bulk.
#[derive(Debug, Clone)]
pub struct BatchValidator {
    resolver: RangeResolver,
}

impl BatchValidator {
    pub fn new(resolver: RangeResolver) -> Self {
        Self { resolver }
    }

    /// Resolves a single card number into a result row.
    pub fn check(&self, card_number: &str) -> CheckResult {
        match self.resolver.resolve(card_number) {
            Ok(Some(hit)) => CheckResult::found(card_number, hit),
            Ok(None) => CheckResult::empty(card_number, CheckStatus::NotFound),
            Err(e) => {
                warn!("{}: {}", mask_card(card_number), e);
                CheckResult::empty(card_number, CheckStatus::Invalid)
            }
        }
    }

    /// Resolves every row of a CSV reader.
    ///
    /// Rows that cannot be deserialized are logged and skipped.
    pub fn process_csv<R: Read>(&self, reader: R) -> Result<Vec<CheckResult>> {
        let mut csv_reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut results = Vec::new();
        for (row_idx, row) in csv_reader.deserialize::<CardRow>().enumerate() {
            let row_num = row_idx + 2; // 1-indexed, accounting for header row

            match row {
                Ok(row) => results.push(self.check(&row.card_number)),
                Err(e) => warn!("Row {}: CSV parse error: {}", row_num, e),
            }
        }

        Ok(results)
    }

    /// Writes result rows as CSV with a header line.
    pub fn write_output<W: Write>(results: &[CheckResult], writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for result in results {
            csv_writer.serialize(result)?;
        }
        if results.is_empty() {
            csv_writer.write_record(["card_number", "status", "bin", "alpha_code", "bank_name"])?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}
