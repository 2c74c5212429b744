use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe per-run counters shared by every worker.
#[derive(Debug, Default)]
pub struct ScanMetrics {
    indexed: AtomicU64,
    property_errors: AtomicU64,
    index_errors: AtomicU64,
    total: AtomicU64,
}

impl ScanMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a file entering the pipeline.
    pub fn record_file(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Count documents the backend accepted.
    pub fn record_indexed(&self, documents: u64) {
        self.indexed.fetch_add(documents, Ordering::Relaxed);
    }

    /// Count a file whose handler could not be resolved or failed while reading.
    pub fn record_property_error(&self) {
        self.property_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count documents dropped with a failed batch.
    pub fn record_index_errors(&self, documents: u64) {
        self.index_errors.fetch_add(documents, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> ScanStatistics {
        ScanStatistics {
            indexed: self.indexed.load(Ordering::Relaxed),
            property_errors: self.property_errors.load(Ordering::Relaxed),
            index_errors: self.index_errors.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
        }
    }
}

/// Immutable outcome counts of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ScanStatistics {
    /// Documents accepted by the backend.
    pub indexed: u64,
    /// Files with no handler or a failed extraction.
    pub property_errors: u64,
    /// Documents dropped because their batch failed.
    pub index_errors: u64,
    /// Files submitted to the pipeline.
    pub total: u64,
}

impl ScanStatistics {
    /// Files whose outcome is not yet known, e.g. still waiting in a pool.
    pub fn unaccounted(&self) -> u64 {
        self.total
            .saturating_sub(self.indexed + self.property_errors + self.index_errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_outcomes() {
        let metrics = ScanMetrics::new();
        for _ in 0..4 {
            metrics.record_file();
        }
        metrics.record_indexed(2);
        metrics.record_property_error();
        metrics.record_index_errors(1);

        let snapshot = metrics.snapshot();
        assert_eq!(
            snapshot,
            ScanStatistics {
                indexed: 2,
                property_errors: 1,
                index_errors: 1,
                total: 4
            }
        );
        assert_eq!(snapshot.unaccounted(), 0);
    }

    #[test]
    fn pending_documents_are_unaccounted() {
        let metrics = ScanMetrics::new();
        metrics.record_file();
        metrics.record_file();
        metrics.record_indexed(1);
        assert_eq!(metrics.snapshot().unaccounted(), 1);
    }
}
