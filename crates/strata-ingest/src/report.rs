use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A file that could not be ingested after every attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestFailure {
    pub path: String,
    pub source: PathBuf,
    pub attempts: u32,
    pub error: String,
}

/// Totals of one ingestion run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub collections_created: u64,
    pub resources_created: u64,
    pub resources_updated: u64,
    pub resources_unchanged: u64,
    pub failures: Vec<IngestFailure>,
    pub elapsed: Duration,
}

impl IngestReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn resources_processed(&self) -> u64 {
        self.resources_created + self.resources_updated + self.resources_unchanged
    }

    pub(crate) fn absorb(&mut self, stats: WorkerStats) {
        self.resources_created += stats.created;
        self.resources_updated += stats.updated;
        self.resources_unchanged += stats.unchanged;
        self.failures.extend(stats.failures);
    }
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} collections created, {} resources created, {} updated, {} unchanged, {} failed in {:.2?}",
            self.collections_created,
            self.resources_created,
            self.resources_updated,
            self.resources_unchanged,
            self.failures.len(),
            self.elapsed
        )
    }
}

/// Per-worker counters, merged into the report after the pool drains.
#[derive(Debug, Default)]
pub(crate) struct WorkerStats {
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub failures: Vec<IngestFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorb_sums_workers() {
        let mut report = IngestReport::default();
        report.absorb(WorkerStats {
            created: 2,
            unchanged: 1,
            ..Default::default()
        });
        report.absorb(WorkerStats {
            updated: 3,
            failures: vec![IngestFailure {
                path: "/x".into(),
                source: "/src/x".into(),
                attempts: 4,
                error: "boom".into(),
            }],
            ..Default::default()
        });
        assert_eq!(report.resources_processed(), 6);
        assert!(!report.is_success());
        assert!(report.to_string().contains("1 failed"));
    }
}
