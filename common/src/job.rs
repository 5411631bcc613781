use std::fmt;
use std::fmt::Formatter;

use crate::config::CommitConfig;

/// State of a job, as observed by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Job not finished yet.
    Running,

    /// Job completed successfully.
    Succeeded,

    /// Job failed.
    Failed,

    /// Job killed by the operator.
    Killed,
}

/// A job context.
///
/// One commit protocol instance is constructed per job and shared across
/// all of the job's task attempts.
#[derive(Debug, Clone)]
pub struct Job {
    /// Identifier assigned by the scheduler, e.g. `job_20260826_0001`.
    id: String,

    /// The final output root, e.g. `s3://bucket/out` or `/data/out`.
    /// `None` for jobs that discard their output.
    output_path: Option<String>,

    /// Commit-related options for the job.
    config: CommitConfig,
}

impl Job {
    pub fn new(id: impl Into<String>, output_path: Option<String>, config: CommitConfig) -> Self {
        Self {
            id: id.into(),
            output_path,
            config,
        }
    }

    pub fn get_id(&self) -> &str {
        &self.id
    }

    pub fn get_output_path(&self) -> Option<&str> {
        self.output_path.as_deref()
    }

    pub fn get_config(&self) -> &CommitConfig {
        &self.config
    }
}

/// One execution instance of a task.
///
/// A task may have several attempts due to retries, or because the
/// scheduler runs duplicates of slow tasks speculatively. Multiple
/// attempts for the same task id may be alive at the same time, but at
/// most one of them ever successfully commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskAttempt {
    /// The logical task this attempt executes.
    task_id: u32,

    /// Attempt number, starting at 0.
    attempt: u32,
}

impl TaskAttempt {
    pub fn new(task_id: u32, attempt: u32) -> Self {
        Self { task_id, attempt }
    }

    pub fn get_task_id(&self) -> u32 {
        self.task_id
    }

    pub fn get_attempt(&self) -> u32 {
        self.attempt
    }
}

impl fmt::Display for TaskAttempt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "task {} attempt {}", self.task_id, self.attempt)
    }
}
