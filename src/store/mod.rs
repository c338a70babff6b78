//! Append-only observation storage with a hard row capacity.
//!
//! [`ObservationLog`] is the ordered row store (a sheet, a file, a table);
//! [`RetentionStore`] layers the fixed-window eviction policy on top of any
//! log so the policy is independent of the backend.

mod csv_sheet;
mod memory;
mod retention;

pub use csv_sheet::{CsvSheet, HEADER};
pub use memory::MemoryLog;
pub use retention::{AppendReport, RetentionStore};

use thiserror::Error;

use crate::model::LiveObservation;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read from row store: {0}")]
    Retrieval(String),
    #[error("failed to append to row store: {0}")]
    Append(String),
    #[error("failed to evict rows from row store: {0}")]
    Evict(String),
    #[error("malformed row {row} in row store: {reason}")]
    Malformed { row: usize, reason: String },
}

/// An ordered, append-only log of observations. Insertion order is the
/// eviction order; the header (if the backend has one) is not a row.
pub trait ObservationLog {
    /// Number of data rows currently stored.
    fn count(&self) -> Result<usize, StoreError>;

    /// Removes the `n` earliest-appended rows. `n` larger than the row count
    /// removes everything.
    fn evict_oldest(&mut self, n: usize) -> Result<(), StoreError>;

    /// Appends rows after all existing rows, preserving their order.
    fn append(&mut self, rows: &[LiveObservation]) -> Result<(), StoreError>;

    /// Every stored row, oldest first.
    fn read_all(&self) -> Result<Vec<LiveObservation>, StoreError>;
}
