//! Output commit protocols for distributed batch-write jobs.
//!
//! A batch job fans out into parallel tasks, each task writes its share
//! of the output, and the scheduler may run several attempts of one task
//! (after a failure, or speculatively). The commit protocol decides
//! where every attempt writes and which attempt's files become visible
//! at the job's destination, so the destination ends up holding exactly
//! one complete copy of the output.
//!
//! Two strategies are provided:
//!
//! * [`RenameCommitProtocol`] stages each attempt in a `_temporary`
//!   directory inside the destination and promotes winners by rename,
//!   first task by task and finally into the destination. Safe under
//!   task retries and speculative execution on any backend with cheap
//!   renames.
//! * [`DirectCommitProtocol`] sends every attempt straight to the final
//!   path and turns both commit steps into no-ops. Meant for object
//!   stores, where a rename is a copy but each object write becomes
//!   visible atomically. Nothing is ever rolled back: a failed job
//!   leaves partial output at the destination, and speculative attempts
//!   race on the same files. Use it only when the scheduler runs one
//!   attempt per task.
//!
//! When a job commits, both strategies drop a zero-byte
//! [`SUCCESS_MARKER`](paths::SUCCESS_MARKER) file into the destination
//! unless the job's [`CommitConfig`](common::config::CommitConfig)
//! disables it.

use anyhow::Error;
use async_trait::async_trait;

use common::job::{JobState, TaskAttempt};
use common::storage::Storage;

pub mod direct;
pub mod paths;
pub mod rename;

pub use direct::DirectCommitProtocol;
pub use rename::RenameCommitProtocol;

/// Lifecycle hooks deciding how task output reaches a job's destination.
///
/// The driver calls [`setup_job`](CommitProtocol::setup_job) once before
/// launching tasks, points each attempt at its
/// [`work_path`](CommitProtocol::work_path), and resolves every attempt
/// with [`commit_task`](CommitProtocol::commit_task) (at most once per
/// task, for the winning attempt) or
/// [`abort_task`](CommitProtocol::abort_task). Once all tasks are
/// resolved it finishes the job with
/// [`commit_job`](CommitProtocol::commit_job) or
/// [`abort_job`](CommitProtocol::abort_job). That ordering is the
/// caller's responsibility. Implementations hold no mutable state and
/// may be shared across threads.
///
/// Storage failures propagate unchanged; retrying is up to the caller.
#[async_trait]
pub trait CommitProtocol: Send + Sync {
    /// Directory the attempt must write its output files into, or
    /// `None` when the job has no destination. A given attempt always
    /// resolves to the same path.
    fn work_path(&self, attempt: &TaskAttempt) -> Option<String>;

    /// One-time job preparation. An accidental second call must not
    /// disturb existing state.
    async fn setup_job(&self, storage: &dyn Storage) -> Result<(), Error>;

    /// Whether the attempt produced output that still needs
    /// [`commit_task`](CommitProtocol::commit_task) to become part of
    /// the job.
    async fn needs_task_commit(
        &self,
        storage: &dyn Storage,
        attempt: &TaskAttempt,
    ) -> Result<bool, Error>;

    /// Promotes the attempt's output to job-visible state.
    async fn commit_task(
        &self,
        storage: &dyn Storage,
        attempt: &TaskAttempt,
    ) -> Result<(), Error>;

    /// Discards whatever the attempt wrote. Never touches other
    /// attempts' output or the final destination, and succeeds when the
    /// attempt wrote nothing at all.
    async fn abort_task(
        &self,
        storage: &dyn Storage,
        attempt: &TaskAttempt,
    ) -> Result<(), Error>;

    /// Finalizes the job after every task was committed or aborted,
    /// making all committed output visible at the destination.
    async fn commit_job(&self, storage: &dyn Storage) -> Result<(), Error>;

    /// Cleans up after a job that failed or was killed. Output of
    /// already-committed tasks that was never published by
    /// [`commit_job`](CommitProtocol::commit_job) is discarded.
    async fn abort_job(&self, storage: &dyn Storage, state: JobState) -> Result<(), Error>;
}
