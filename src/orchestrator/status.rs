use dashmap::DashMap;

use crate::models::{JobId, JobState, JobStatusRecord, Phase};

/// Key-value store for job status records.
///
/// The orchestrator is the only writer for a given job id and issues its
/// writes in order; implementations only need per-key last-write-wins.
pub trait StatusStore: Send + Sync {
    fn put(&self, job_id: &JobId, record: JobStatusRecord);

    fn get(&self, job_id: &JobId) -> Option<JobStatusRecord>;
}

/// Process-local status table.
#[derive(Default)]
pub struct InMemoryStatusStore {
    records: DashMap<JobId, JobStatusRecord>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl StatusStore for InMemoryStatusStore {
    fn put(&self, job_id: &JobId, record: JobStatusRecord) {
        self.records.insert(job_id.clone(), record);
    }

    fn get(&self, job_id: &JobId) -> Option<JobStatusRecord> {
        self.records.get(job_id).map(|r| r.value().clone())
    }
}

/// Publishes the status of one run.
///
/// Progress is clamped so it never goes backwards within a run and only
/// `complete` may report 100.
pub(crate) struct StatusReporter<'a> {
    job_id: &'a JobId,
    store: &'a dyn StatusStore,
    progress: u8,
    phase: Phase,
}

impl<'a> StatusReporter<'a> {
    pub(crate) fn new(job_id: &'a JobId, store: &'a dyn StatusStore) -> Self {
        Self { job_id, store, progress: 0, phase: Phase::Initializing }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn running(&mut self, progress: u8, phase: Phase, message: impl Into<String>) {
        self.progress = self.progress.max(progress.min(99));
        self.phase = phase;
        let message = message.into();
        tracing::debug!(job_id = %self.job_id, progress = self.progress, phase = %phase, "{}", message);
        self.store.put(
            self.job_id,
            JobStatusRecord::new(JobState::Running, self.progress, phase, message),
        );
    }

    pub(crate) fn complete(&mut self, message: impl Into<String>) {
        self.progress = 100;
        self.phase = Phase::Completed;
        self.store.put(
            self.job_id,
            JobStatusRecord::new(JobState::Completed, 100, Phase::Completed, message),
        );
    }

    /// Mark the run failed, keeping the phase and progress reached so far.
    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.store.put(
            self.job_id,
            JobStatusRecord::new(JobState::Failed, self.progress, self.phase, message),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_overwrites_per_job() {
        let store = InMemoryStatusStore::new();
        let a = JobId::from("a");
        let b = JobId::from("b");
        assert!(store.get(&a).is_none());

        store.put(&a, JobStatusRecord::new(JobState::Running, 10, Phase::SubdomainEnum, "x"));
        store.put(&a, JobStatusRecord::new(JobState::Running, 40, Phase::PortScan, "y"));
        store.put(&b, JobStatusRecord::new(JobState::Pending, 0, Phase::Initializing, "z"));

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&a).unwrap().progress, 40);
        assert_eq!(store.get(&b).unwrap().status, JobState::Pending);
    }

    #[test]
    fn test_reporter_never_regresses() {
        let store = InMemoryStatusStore::new();
        let id = JobId::from(7u64);
        let mut reporter = StatusReporter::new(&id, &store);

        reporter.running(40, Phase::PortScan, "Scanning ports...");
        reporter.running(10, Phase::PortScan, "late update");
        assert_eq!(store.get(&id).unwrap().progress, 40);

        reporter.running(100, Phase::VulnScan, "almost");
        assert_eq!(store.get(&id).unwrap().progress, 99);
    }

    #[test]
    fn test_reporter_failure_keeps_progress() {
        let store = InMemoryStatusStore::new();
        let id = JobId::from("f");
        let mut reporter = StatusReporter::new(&id, &store);

        reporter.running(70, Phase::PortScan, "Scanned 3 targets");
        reporter.fail("Full scan failed: boom");

        let rec = store.get(&id).unwrap();
        assert_eq!(rec.status, JobState::Failed);
        assert_eq!(rec.progress, 70);
        assert_eq!(rec.phase, Phase::PortScan);
        assert_eq!(rec.message, "Full scan failed: boom");
    }
}
