use tracing::{info, warn};

use super::{ObservationLog, StoreError};
use crate::model::LiveObservation;

/// What a single [`RetentionStore::append`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppendReport {
    pub rows_before: usize,
    pub evicted: usize,
    pub appended: usize,
    /// Leading rows of an oversized batch that were never stored.
    pub dropped: usize,
}

/// Fixed-window retention over an [`ObservationLog`].
///
/// When an append would push the log past `capacity`, exactly as many of the
/// oldest rows are evicted as are being added (never more than are present),
/// so a full log stays at its size rather than dropping to just under it.
pub struct RetentionStore<L> {
    log: L,
    capacity: usize,
}

impl<L: ObservationLog> RetentionStore<L> {
    pub fn new(log: L, capacity: usize) -> Self {
        Self { log, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn into_inner(self) -> L {
        self.log
    }

    /// Reads the current row count, evicts if needed, then appends `rows`.
    ///
    /// A batch larger than the capacity keeps only its last `capacity` rows.
    /// Errors are returned as-is; nothing is retried here.
    #[tracing::instrument(skip_all, fields(rows = rows.len(), capacity = self.capacity))]
    pub fn append(&mut self, rows: &[LiveObservation]) -> Result<AppendReport, StoreError> {
        let rows_before = self.log.count()?;

        let dropped = rows.len().saturating_sub(self.capacity);
        if dropped > 0 {
            warn!(
                dropped,
                "Batch larger than store capacity, keeping only the newest rows"
            );
        }
        let rows = &rows[dropped..];

        let mut evicted = 0;
        if rows_before + rows.len() > self.capacity {
            evicted = rows.len().min(rows_before);
            if evicted == 0 {
                info!(rows_before, "Capacity exceeded but no rows to trim");
            } else {
                info!(
                    rows_before,
                    new_rows = rows.len(),
                    evicted,
                    "Store over capacity, evicting oldest rows"
                );
                self.log.evict_oldest(evicted)?;
            }
        }

        if !rows.is_empty() {
            self.log.append(rows)?;
        }
        info!(appended = rows.len(), "Rows appended to store");

        Ok(AppendReport {
            rows_before,
            evicted,
            appended: rows.len(),
            dropped,
        })
    }

    pub fn read_all(&self) -> Result<Vec<LiveObservation>, StoreError> {
        self.log.read_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLog;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn base_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap()
    }

    /// `n` rows whose footfall encodes a global sequence number.
    fn batch(start: usize, n: usize) -> Vec<LiveObservation> {
        (start..start + n)
            .map(|i| {
                LiveObservation::new(
                    format!("S{}", i % 3),
                    base_time() + Duration::minutes(i as i64),
                    i as f64,
                )
            })
            .collect()
    }

    fn sequence(store: &RetentionStore<MemoryLog>) -> Vec<usize> {
        store
            .read_all()
            .unwrap()
            .iter()
            .map(|o| o.live_footfall as usize)
            .collect()
    }

    #[test]
    fn test_append_under_capacity_keeps_everything() {
        let mut store = RetentionStore::new(MemoryLog::new(), 10);
        let report = store.append(&batch(0, 4)).unwrap();

        assert_eq!(report.evicted, 0);
        assert_eq!(report.appended, 4);
        assert_eq!(sequence(&store), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_evicts_exactly_batch_size() {
        let mut store = RetentionStore::new(MemoryLog::with_rows(batch(0, 8)), 10);

        // 8 + 3 > 10: evicts 3 even though 1 would suffice.
        let report = store.append(&batch(8, 3)).unwrap();

        assert_eq!(report.rows_before, 8);
        assert_eq!(report.evicted, 3);
        assert_eq!(sequence(&store), vec![3, 4, 5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_eviction_clamped_to_present_rows() {
        let mut store = RetentionStore::new(MemoryLog::with_rows(batch(0, 2)), 5);
        let report = store.append(&batch(2, 4)).unwrap();

        assert_eq!(report.evicted, 2);
        assert_eq!(sequence(&store), vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_empty_store_oversized_batch() {
        let mut store = RetentionStore::new(MemoryLog::new(), 3);
        let report = store.append(&batch(0, 5)).unwrap();

        assert_eq!(report.evicted, 0);
        assert_eq!(report.dropped, 2);
        assert_eq!(sequence(&store), vec![2, 3, 4]);
    }

    #[test]
    fn test_capacity_never_exceeded_and_suffix_retained() {
        let capacity = 7;
        let mut store = RetentionStore::new(MemoryLog::new(), capacity);
        let mut next = 0;

        for size in [3, 2, 4, 1, 5, 7, 2, 6, 3] {
            store.append(&batch(next, size)).unwrap();
            next += size;

            let seq = sequence(&store);
            assert!(seq.len() <= capacity);
            // Retained rows are the most recent ones, in append order.
            let expected: Vec<usize> = (next - seq.len()..next).collect();
            assert_eq!(seq, expected);
        }
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let mut store = RetentionStore::new(MemoryLog::with_rows(batch(0, 3)), 3);
        let report = store.append(&[]).unwrap();

        assert_eq!(report, AppendReport { rows_before: 3, ..Default::default() });
        assert_eq!(sequence(&store), vec![0, 1, 2]);
    }
}
