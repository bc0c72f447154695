use std::collections::HashMap;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    InProgress,
    Success,
    Failure,
}

impl JobStatus {
    /// Terminal states admit no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failure)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "in queue"),
            JobStatus::InProgress => write!(f, "in progress"),
            JobStatus::Success => write!(f, "complete"),
            JobStatus::Failure => write!(f, "failed"),
        }
    }
}

/// A unit of work submitted by a client.
///
/// The submitted metadata and the produced result are distinct fields; a job
/// that fails before producing output keeps its original request intact.
#[derive(Debug, Clone)]
pub struct Job {
    pub job_id: u16,
    pub status: JobStatus,
    /// Set only while the job is in progress.
    pub worker_id: Option<u16>,
    pub retry_count: u32,
    pub metadata: String,
    pub result: Option<String>,
    pub time_start: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(job_id: u16, metadata: String) -> Self {
        Self {
            job_id,
            status: JobStatus::Queued,
            worker_id: None,
            retry_count: 0,
            metadata,
            result: None,
            time_start: None,
        }
    }
}

/// Owns every job for the process lifetime. Ids are assigned monotonically
/// and records are never removed.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: HashMap<u16, Job>,
    next_id: u16,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new queued job and return its id.
    ///
    /// Records are never removed, so the u16 id space is the hard cap on
    /// jobs per process lifetime; wrapping onto a live record is a bug.
    pub fn insert(&mut self, metadata: String) -> u16 {
        self.next_id = self.next_id.wrapping_add(1);
        let job_id = self.next_id;
        let previous = self.jobs.insert(job_id, Job::new(job_id, metadata));
        debug_assert!(previous.is_none(), "job id space wrapped onto a live record");
        job_id
    }

    pub fn get(&self, job_id: u16) -> Option<&Job> {
        self.jobs.get(&job_id)
    }

    pub fn get_mut(&mut self, job_id: u16) -> Option<&mut Job> {
        self.jobs.get_mut(&job_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let mut registry = JobRegistry::new();
        let a = registry.insert("echo one".to_string());
        let b = registry.insert("echo two".to_string());
        assert!(b > a);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn new_job_starts_queued_without_worker() {
        let job = Job::new(7, "wordcount a b".to_string());
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.worker_id.is_none());
        assert_eq!(job.retry_count, 0);
        assert!(job.result.is_none());
        assert!(job.time_start.is_none());
    }

    #[test]
    fn lookup_is_explicit() {
        let mut registry = JobRegistry::new();
        let id = registry.insert("echo hi".to_string());
        assert!(registry.get(id).is_some());
        assert!(registry.get(id + 1).is_none());
    }

    #[test]
    #[should_panic(expected = "wrapped onto a live record")]
    fn id_wrap_onto_live_job_is_detected() {
        let mut registry = JobRegistry::new();
        // One more insert than the id space holds.
        for _ in 0..=u32::from(u16::MAX) + 1 {
            registry.insert("echo x".to_string());
        }
    }

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Failure.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
    }
}
