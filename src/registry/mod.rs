pub mod job;
pub mod worker;

pub use job::{Job, JobRegistry, JobStatus};
pub use worker::{Worker, WorkerRegistry, WorkerStatus};
