use std::collections::VecDeque;

use super::{ObservationLog, StoreError};
use crate::model::LiveObservation;

/// In-process log, used for dry runs and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryLog {
    rows: VecDeque<LiveObservation>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: impl IntoIterator<Item = LiveObservation>) -> Self {
        Self {
            rows: rows.into_iter().collect(),
        }
    }
}

impl ObservationLog for MemoryLog {
    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.rows.len())
    }

    fn evict_oldest(&mut self, n: usize) -> Result<(), StoreError> {
        let n = n.min(self.rows.len());
        self.rows.drain(..n);
        Ok(())
    }

    fn append(&mut self, rows: &[LiveObservation]) -> Result<(), StoreError> {
        self.rows.extend(rows.iter().cloned());
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<LiveObservation>, StoreError> {
        Ok(self.rows.iter().cloned().collect())
    }
}
