use chrono::Utc;

use crate::registry::{JobRegistry, JobStatus, WorkerRegistry, WorkerStatus};
use crate::scheduler::queue::PendingQueue;
use crate::stats::Stats;
use crate::wire::{ClientRequest, ErrorCode};

/// A (worker, job) pairing produced by the scheduler. The caller is
/// responsible for pushing the assignment frame to the worker connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub worker_id: u16,
    pub job_id: u16,
    pub metadata: String,
}

/// Owns the job registry, worker registry, and pending queue, and applies
/// every state transition. All mutation funnels through these methods from
/// the one task that drives the event loop.
#[derive(Debug)]
pub struct Dispatcher {
    jobs: JobRegistry,
    workers: WorkerRegistry,
    queue: PendingQueue,
    max_retries: u32,
}

impl Dispatcher {
    pub fn new(max_retries: u32) -> Self {
        Self {
            jobs: JobRegistry::new(),
            workers: WorkerRegistry::new(),
            queue: PendingQueue::new(),
            max_retries,
        }
    }

    // -- client operations --------------------------------------------------

    /// Answer one client request with the reply text.
    pub fn handle_request(&mut self, request: &ClientRequest) -> String {
        match request {
            ClientRequest::Submit { metadata } => {
                let job_id = self.submit(metadata.clone());
                format!("Job submitted with ID: {}", job_id)
            }
            ClientRequest::Status { job_id } => self.status_text(*job_id),
            ClientRequest::Results { job_id } => self.results_text(*job_id),
        }
    }

    /// Register a new job and queue it for assignment.
    pub fn submit(&mut self, metadata: String) -> u16 {
        let job_id = self.jobs.insert(metadata);
        self.queue.push(job_id);
        tracing::info!(job_id, "Job submitted");
        job_id
    }

    pub fn status_text(&self, job_id: u16) -> String {
        match self.jobs.get(job_id) {
            Some(job) => format!("Job -{}- Status - {}", job_id, job.status),
            None => format!("Job {} not found", job_id),
        }
    }

    pub fn results_text(&self, job_id: u16) -> String {
        let Some(job) = self.jobs.get(job_id) else {
            return "Job not found.".to_string();
        };
        match (&job.result, job.status.is_terminal()) {
            (Some(result), true) => result.clone(),
            _ => format!(
                "Job {} incomplete - use './client status {}'",
                job_id, job_id
            ),
        }
    }

    // -- worker lifecycle ---------------------------------------------------

    /// Register a freshly accepted worker connection; returns its id.
    pub fn register_worker(&mut self) -> u16 {
        let worker_id = self.workers.insert();
        tracing::info!(worker_id, "Worker registered");
        worker_id
    }

    /// Record a worker status report. Job-level consequences are applied by
    /// the sweep, not here.
    pub fn record_status_report(&mut self, worker_id: u16, status: i16, error_code: ErrorCode) {
        let reported = match WorkerStatus::from_wire(status) {
            Some(s @ (WorkerStatus::Success | WorkerStatus::Failure)) => s,
            Some(_) => {
                tracing::debug!(worker_id, status, "Ignoring non-terminal status report");
                return;
            }
            None => {
                tracing::warn!(worker_id, status, "Ignoring unknown worker status code");
                return;
            }
        };
        let Some(worker) = self.workers.get_mut(worker_id) else {
            tracing::warn!(worker_id, "Status report from unregistered worker");
            return;
        };
        worker.status = reported;
        worker.error_code = error_code;
        tracing::debug!(worker_id, ?reported, ?error_code, "Worker status recorded");
    }

    /// Record a worker result report; success is implied by the frame.
    pub fn record_result(&mut self, worker_id: u16, text: String) {
        let Some(worker) = self.workers.get_mut(worker_id) else {
            tracing::warn!(worker_id, "Result report from unregistered worker");
            return;
        };
        worker.status = WorkerStatus::Success;
        worker.error_code = ErrorCode::Ok;
        worker.pending_result = Some(text);
        tracing::debug!(worker_id, "Worker result recorded");
    }

    /// Remove a worker whose connection closed. A job it was holding goes
    /// back through the retry path.
    pub fn worker_disconnected(&mut self, worker_id: u16) {
        let Some(worker) = self.workers.remove(worker_id) else {
            return;
        };
        tracing::info!(worker_id, "Worker disconnected");
        if let Some(job_id) = worker.cur_job_id {
            self.retry_or_fail(job_id, false);
        }
    }

    // -- loop phases --------------------------------------------------------

    /// Apply completion and retry logic for every worker that reported a
    /// result or failure, returning each to Ready.
    pub fn sweep_reported(&mut self) {
        for worker_id in self.workers.reported() {
            let Some(worker) = self.workers.get_mut(worker_id) else {
                continue;
            };
            let job_id = worker.cur_job_id.take();
            let reported = worker.status;
            let error_code = worker.error_code;
            let result = worker.pending_result.take();
            worker.status = WorkerStatus::Ready;
            worker.error_code = ErrorCode::Ok;

            let Some(job_id) = job_id else {
                tracing::warn!(worker_id, "Report from a worker holding no job");
                continue;
            };

            match reported {
                WorkerStatus::Success => {
                    self.complete_job(job_id, result.unwrap_or_default());
                    if let Some(worker) = self.workers.get_mut(worker_id) {
                        worker.jobs_completed += 1;
                    }
                }
                WorkerStatus::Failure => {
                    self.retry_or_fail(job_id, error_code == ErrorCode::InvalidJob);
                }
                // reported() only yields Success/Failure
                _ => {}
            }
        }
    }

    /// Match the queue head with the first Ready worker, FCFS on both sides.
    pub fn next_assignment(&mut self) -> Option<Assignment> {
        if self.queue.is_empty() {
            return None;
        }
        let worker_id = self.workers.first_ready()?;
        let job_id = self.queue.pop()?;

        let job = self
            .jobs
            .get_mut(job_id)
            .expect("queued job id must exist in the registry");
        job.status = JobStatus::InProgress;
        job.worker_id = Some(worker_id);
        job.time_start = Some(Utc::now());
        let metadata = job.metadata.clone();

        let worker = self
            .workers
            .get_mut(worker_id)
            .expect("ready worker id must exist in the registry");
        worker.status = WorkerStatus::Busy;
        worker.cur_job_id = Some(job_id);

        tracing::info!(job_id, worker_id, "Job assigned");
        Some(Assignment {
            worker_id,
            job_id,
            metadata,
        })
    }

    /// Derived counters, recomputed from the registries.
    pub fn stats(&self) -> Stats {
        let mut succeeded = 0;
        let mut failed = 0;
        let mut in_progress = 0;
        for job in self.jobs.iter() {
            match job.status {
                JobStatus::Success => succeeded += 1,
                JobStatus::Failure => failed += 1,
                JobStatus::InProgress => in_progress += 1,
                JobStatus::Queued => {}
            }
        }
        Stats {
            processed: succeeded + failed,
            succeeded,
            failed,
            in_queue: self.queue.len(),
            in_progress,
            workers: self.workers.len(),
        }
    }

    // -- transitions --------------------------------------------------------

    fn complete_job(&mut self, job_id: u16, result: String) {
        let Some(job) = self.jobs.get_mut(job_id) else {
            tracing::warn!(job_id, "Completion report for unknown job");
            return;
        };
        if job.status.is_terminal() {
            tracing::warn!(job_id, "Ignoring completion of a terminal job");
            return;
        }
        job.status = JobStatus::Success;
        job.worker_id = None;
        job.result = Some(result);
        tracing::info!(job_id, "Job complete");
    }

    /// Failure path for an in-progress job: re-queue while the retry budget
    /// lasts, otherwise fail permanently. `invalid` marks a malformed job,
    /// which is never retried.
    fn retry_or_fail(&mut self, job_id: u16, invalid: bool) {
        let max_retries = self.max_retries;
        let Some(job) = self.jobs.get_mut(job_id) else {
            tracing::warn!(job_id, "Failure report for unknown job");
            return;
        };
        if job.status.is_terminal() {
            return;
        }
        job.worker_id = None;

        if invalid {
            job.status = JobStatus::Failure;
            job.result = Some(format!("Job {} failed: invalid job type", job_id));
            tracing::warn!(job_id, "Job failed permanently: invalid job");
            return;
        }

        if job.retry_count < max_retries {
            job.retry_count += 1;
            job.status = JobStatus::Queued;
            job.time_start = None;
            let retry_count = job.retry_count;
            self.queue.push(job_id);
            tracing::info!(job_id, retry_count, "Job re-queued after failure");
        } else {
            job.status = JobStatus::Failure;
            job.result = Some(format!(
                "Job {} failed after {} attempts",
                job_id,
                max_retries + 1
            ));
            tracing::warn!(job_id, "Job failed permanently: retries exhausted");
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn job(&self, job_id: u16) -> Option<&crate::registry::Job> {
        self.jobs.get(job_id)
    }

    pub fn worker(&self, worker_id: u16) -> Option<&crate::registry::Worker> {
        self.workers.get(worker_id)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &crate::registry::Job> {
        self.jobs.iter()
    }

    pub fn workers(&self) -> impl Iterator<Item = &crate::registry::Worker> {
        self.workers.iter()
    }

    pub fn queued_ids(&self) -> Vec<u16> {
        self.queue.iter().collect()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}
