use crate::domain::order::DeliveredOrder;
use crate::error::{CommissionError, Result};
use std::io::Read;

/// Reads order rows from a CSV export of the external order system.
///
/// Wraps `csv::Reader` and yields `Result<DeliveredOrder>` lazily, so a
/// multi-month export seeds the ledger without being held in memory at
/// once. Rows of any shipment status come through; the ledger adapters do
/// the delivered-only filtering.
pub struct OrderReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OrderReader<R> {
    /// Creates a new `OrderReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes order rows.
    pub fn orders(self) -> impl Iterator<Item = Result<DeliveredOrder>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(CommissionError::from))
    }
}
