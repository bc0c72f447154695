//! Synchronous text-processing functions a worker runs against a job.
//!
//! The command format is `"<keyword> <data>"`; an unrecognized keyword is an
//! invalid job and is reported as such, never retried.

use crate::wire::ErrorCode;

/// Output of processing one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub text: String,
    pub code: ErrorCode,
}

impl JobOutcome {
    fn ok(text: String) -> Self {
        Self {
            text,
            code: ErrorCode::Ok,
        }
    }

    fn invalid() -> Self {
        Self {
            text: String::new(),
            code: ErrorCode::InvalidJob,
        }
    }
}

/// Run the job described by `command` and return its result text and error
/// code.
pub fn process_job(command: &str) -> JobOutcome {
    let trimmed = command.trim();
    let (keyword, data) = match trimmed.split_once(' ') {
        Some((k, d)) => (k, d),
        None => (trimmed, ""),
    };

    match keyword {
        "wordcount" => JobOutcome::ok(format!("word count: {}", data.split_whitespace().count())),
        "echo" => JobOutcome::ok(data.to_string()),
        "capitalize" => JobOutcome::ok(data.to_uppercase()),
        _ => JobOutcome::invalid(),
    }
}
