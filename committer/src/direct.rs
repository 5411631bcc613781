//! Direct-write commit strategy for destinations with atomic per-object
//! visibility.

use anyhow::Error;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use common::job::{Job, JobState, TaskAttempt};
use common::storage::Storage;

use crate::paths::write_success_marker;
use crate::CommitProtocol;

/// Commits nothing: every attempt writes straight to the destination.
///
/// On storage where each object write becomes visible atomically,
/// attempts can target their final files directly, so there is no
/// staging to promote and task commit, task abort and job abort all
/// collapse into no-ops. The only remaining work is writing the success
/// marker when the job commits.
///
/// The trade-off is that nothing can be rolled back. A failed job's
/// partial output stays visible at the destination, and with
/// speculative execution or append mode enabled, concurrent attempts
/// overwrite each other's files. Both conditions are surfaced as
/// warnings at construction, not errors.
pub struct DirectCommitProtocol {
    /// job this protocol instance commits for
    job: Job,

    /// destination root, qualified at construction
    output_path: Option<String>,
}

impl DirectCommitProtocol {
    /// Builds the protocol for one job, warning when the job's
    /// configuration undermines direct writes.
    pub fn new(storage: &dyn Storage, job: Job) -> Result<Self, Error> {
        let output_path = job
            .get_output_path()
            .map(|path| storage.make_qualified(path))
            .transpose()?;

        info!("using direct write support for job {}", job.get_id());
        let config = job.get_config();
        if config.speculative_execution {
            warn!("speculative execution is enabled, concurrent attempts will race on final paths");
        }
        if config.append_mode {
            warn!("append mode is enabled, a failed job cannot be rolled back");
        }

        Ok(Self { job, output_path })
    }
}

#[async_trait]
impl CommitProtocol for DirectCommitProtocol {
    fn work_path(&self, _attempt: &TaskAttempt) -> Option<String> {
        self.output_path.clone()
    }

    async fn setup_job(&self, _storage: &dyn Storage) -> Result<(), Error> {
        info!("no setup required, writes go straight to the target location");
        Ok(())
    }

    async fn needs_task_commit(
        &self,
        _storage: &dyn Storage,
        _attempt: &TaskAttempt,
    ) -> Result<bool, Error> {
        Ok(false)
    }

    async fn commit_task(
        &self,
        _storage: &dyn Storage,
        attempt: &TaskAttempt,
    ) -> Result<(), Error> {
        info!("nothing to commit for {attempt}, output was written in place");
        Ok(())
    }

    async fn abort_task(
        &self,
        _storage: &dyn Storage,
        attempt: &TaskAttempt,
    ) -> Result<(), Error> {
        info!("no cleanup needed for {attempt}, direct output stays in place");
        Ok(())
    }

    async fn commit_job(&self, storage: &dyn Storage) -> Result<(), Error> {
        let Some(out) = self.output_path.as_deref() else {
            warn!("no output path set in commit_job");
            return Ok(());
        };

        if write_success_marker(storage, out, self.job.get_config()).await? {
            debug!("wrote success marker to {out}");
        }
        info!("committed job {}", self.job.get_id());
        Ok(())
    }

    async fn abort_job(&self, _storage: &dyn Storage, state: JobState) -> Result<(), Error> {
        info!(
            "no cleanup required for job {} in state {:?}, direct output stays in place",
            self.job.get_id(),
            state
        );
        Ok(())
    }
}
