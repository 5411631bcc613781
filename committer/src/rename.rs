//! Rename-based commit strategy: stage under `_temporary`, promote by
//! rename.

use anyhow::Error;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use common::job::{Job, JobState, TaskAttempt};
use common::storage::Storage;

use crate::paths::{
    attempt_work_dir, committed_tasks_dir, job_temp_dir, pending_dir, task_committed_dir,
    write_success_marker,
};
use crate::CommitProtocol;

/// Commits job output through per-attempt staging directories and
/// renames.
///
/// Every attempt writes into its own directory under
/// `<out>/_temporary/<job_id>`, so concurrent attempts of one task
/// never see each other's files. [`commit_task`](Self::commit_task)
/// promotes one attempt into the task's committed directory, and
/// [`commit_job`](Self::commit_job) merges all committed task
/// directories into the destination, removes `_temporary` and writes
/// the success marker.
pub struct RenameCommitProtocol {
    /// job this protocol instance commits for
    job: Job,

    /// destination root, qualified at construction
    output_path: Option<String>,
}

impl RenameCommitProtocol {
    /// Builds the protocol for one job, qualifying its destination
    /// path. A job without a destination is accepted; every operation
    /// then degrades to a logged no-op.
    pub fn new(storage: &dyn Storage, job: Job) -> Result<Self, Error> {
        let output_path = job
            .get_output_path()
            .map(|path| storage.make_qualified(path))
            .transpose()?;

        if output_path.is_none() {
            warn!("job {} has no output path, commits will be no-ops", job.get_id());
        }

        Ok(Self { job, output_path })
    }
}

#[async_trait]
impl CommitProtocol for RenameCommitProtocol {
    fn work_path(&self, attempt: &TaskAttempt) -> Option<String> {
        let out = self.output_path.as_deref()?;
        Some(attempt_work_dir(out, self.job.get_id(), attempt))
    }

    async fn setup_job(&self, storage: &dyn Storage) -> Result<(), Error> {
        let Some(out) = self.output_path.as_deref() else {
            warn!("no output path set, skipping job setup");
            return Ok(());
        };

        let staging = job_temp_dir(out, self.job.get_id());
        storage.mkdirs(&staging).await?;
        debug!("prepared staging directory {staging}");
        Ok(())
    }

    async fn needs_task_commit(
        &self,
        storage: &dyn Storage,
        attempt: &TaskAttempt,
    ) -> Result<bool, Error> {
        let Some(work) = self.work_path(attempt) else {
            return Ok(false);
        };
        storage.exists(&work).await
    }

    async fn commit_task(
        &self,
        storage: &dyn Storage,
        attempt: &TaskAttempt,
    ) -> Result<(), Error> {
        let Some(out) = self.output_path.as_deref() else {
            warn!("no output path set, nothing to commit for {attempt}");
            return Ok(());
        };

        let work = attempt_work_dir(out, self.job.get_id(), attempt);
        if !storage.exists(&work).await? {
            warn!("no output found for {attempt}");
            return Ok(());
        }

        // a previously committed attempt of this task loses wholesale
        let committed = task_committed_dir(out, self.job.get_id(), attempt.get_task_id());
        if storage.exists(&committed).await? {
            debug!(
                "replacing previously committed output of task {}",
                attempt.get_task_id()
            );
            storage.delete(&committed, true).await?;
        }

        storage.rename(&work, &committed).await?;
        info!("committed {attempt}");
        Ok(())
    }

    async fn abort_task(
        &self,
        storage: &dyn Storage,
        attempt: &TaskAttempt,
    ) -> Result<(), Error> {
        let Some(work) = self.work_path(attempt) else {
            return Ok(());
        };

        storage.delete(&work, true).await?;
        debug!("aborted {attempt}");
        Ok(())
    }

    async fn commit_job(&self, storage: &dyn Storage) -> Result<(), Error> {
        let Some(out) = self.output_path.as_deref() else {
            warn!("no output path set, skipping job commit");
            return Ok(());
        };

        let tasks = committed_tasks_dir(out, self.job.get_id());
        for task_dir in storage.list(&tasks).await? {
            storage.rename(&task_dir, out).await?;
        }

        storage.delete(&pending_dir(out), true).await?;

        if write_success_marker(storage, out, self.job.get_config()).await? {
            debug!("wrote success marker to {out}");
        }
        info!("committed job {}", self.job.get_id());
        Ok(())
    }

    async fn abort_job(&self, storage: &dyn Storage, state: JobState) -> Result<(), Error> {
        let Some(out) = self.output_path.as_deref() else {
            warn!("no output path set, skipping job cleanup");
            return Ok(());
        };

        storage.delete(&pending_dir(out), true).await?;
        info!("aborted job {} in state {:?}", self.job.get_id(), state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use bytes::Bytes;
    use common::config::CommitConfig;
    use common::local::LocalFs;
    use tempfile::TempDir;

    use crate::paths::part_file_name;

    fn out_dir(dir: &TempDir) -> String {
        dir.path().join("out").to_str().unwrap().to_string()
    }

    fn job_at(dir: &TempDir) -> Job {
        Job::new("job-1", Some(out_dir(dir)), CommitConfig::default())
    }

    #[test]
    fn work_paths_are_unique_per_attempt() {
        let dir = TempDir::new().unwrap();
        let storage = LocalFs::new();
        let protocol = RenameCommitProtocol::new(&storage, job_at(&dir)).unwrap();

        let first = protocol.work_path(&TaskAttempt::new(4, 0)).unwrap();
        let second = protocol.work_path(&TaskAttempt::new(4, 1)).unwrap();
        let other_task = protocol.work_path(&TaskAttempt::new(5, 0)).unwrap();

        assert_ne!(first, second);
        assert_ne!(first, other_task);
        assert_eq!(first, protocol.work_path(&TaskAttempt::new(4, 0)).unwrap());
    }

    #[tokio::test]
    async fn needs_task_commit_tracks_written_output() {
        let dir = TempDir::new().unwrap();
        let storage = LocalFs::new();
        let protocol = RenameCommitProtocol::new(&storage, job_at(&dir)).unwrap();
        let attempt = TaskAttempt::new(0, 0);

        protocol.setup_job(&storage).await.unwrap();
        assert!(!protocol.needs_task_commit(&storage, &attempt).await.unwrap());

        let work = protocol.work_path(&attempt).unwrap();
        storage
            .put(&format!("{work}/{}", part_file_name(0)), Bytes::from_static(b"rows"))
            .await
            .unwrap();
        assert!(protocol.needs_task_commit(&storage, &attempt).await.unwrap());
    }

    #[tokio::test]
    async fn repeated_setup_leaves_staged_output_intact() {
        let dir = TempDir::new().unwrap();
        let storage = LocalFs::new();
        let protocol = RenameCommitProtocol::new(&storage, job_at(&dir)).unwrap();
        let attempt = TaskAttempt::new(0, 0);

        protocol.setup_job(&storage).await.unwrap();
        let work = protocol.work_path(&attempt).unwrap();
        storage
            .put(&format!("{work}/{}", part_file_name(0)), Bytes::from_static(b"rows"))
            .await
            .unwrap();

        // an accidental second setup must not disturb staged output
        protocol.setup_job(&storage).await.unwrap();
        assert!(protocol.needs_task_commit(&storage, &attempt).await.unwrap());

        protocol.commit_task(&storage, &attempt).await.unwrap();
        protocol.commit_job(&storage).await.unwrap();

        let published = storage
            .get(&format!("{}/{}", out_dir(&dir), part_file_name(0)))
            .await
            .unwrap();
        assert_eq!(published.as_ref(), b"rows");
    }

    #[tokio::test]
    async fn commit_task_without_output_succeeds() {
        let dir = TempDir::new().unwrap();
        let storage = LocalFs::new();
        let protocol = RenameCommitProtocol::new(&storage, job_at(&dir)).unwrap();

        protocol.setup_job(&storage).await.unwrap();
        protocol.commit_task(&storage, &TaskAttempt::new(1, 0)).await.unwrap();

        let committed = task_committed_dir(&out_dir(&dir), "job-1", 1);
        assert!(!storage.exists(&committed).await.unwrap());
    }

    #[tokio::test]
    async fn abort_task_without_output_is_error_free() {
        let dir = TempDir::new().unwrap();
        let storage = LocalFs::new();
        let protocol = RenameCommitProtocol::new(&storage, job_at(&dir)).unwrap();

        protocol.setup_job(&storage).await.unwrap();
        protocol.abort_task(&storage, &TaskAttempt::new(2, 7)).await.unwrap();
    }

    #[tokio::test]
    async fn later_attempt_replaces_previously_committed_task() {
        let dir = TempDir::new().unwrap();
        let storage = LocalFs::new();
        let protocol = RenameCommitProtocol::new(&storage, job_at(&dir)).unwrap();
        protocol.setup_job(&storage).await.unwrap();

        let first = TaskAttempt::new(0, 0);
        let first_work = protocol.work_path(&first).unwrap();
        storage
            .put(&format!("{first_work}/{}", part_file_name(0)), Bytes::from_static(b"first"))
            .await
            .unwrap();
        protocol.commit_task(&storage, &first).await.unwrap();

        let second = TaskAttempt::new(0, 1);
        let second_work = protocol.work_path(&second).unwrap();
        storage
            .put(&format!("{second_work}/{}", part_file_name(0)), Bytes::from_static(b"second"))
            .await
            .unwrap();
        protocol.commit_task(&storage, &second).await.unwrap();

        let committed = task_committed_dir(&out_dir(&dir), "job-1", 0);
        let data = storage
            .get(&format!("{committed}/{}", part_file_name(0)))
            .await
            .unwrap();
        assert_eq!(data.as_ref(), b"second");
    }

    #[tokio::test]
    async fn missing_destination_turns_operations_into_no_ops() {
        let storage = LocalFs::new();
        let job = Job::new("job-null", None, CommitConfig::default());
        let protocol = RenameCommitProtocol::new(&storage, job).unwrap();
        let attempt = TaskAttempt::new(0, 0);

        assert!(protocol.work_path(&attempt).is_none());
        assert!(!protocol.needs_task_commit(&storage, &attempt).await.unwrap());
        protocol.setup_job(&storage).await.unwrap();
        protocol.commit_task(&storage, &attempt).await.unwrap();
        protocol.abort_task(&storage, &attempt).await.unwrap();
        protocol.commit_job(&storage).await.unwrap();
        protocol.abort_job(&storage, JobState::Failed).await.unwrap();
    }
}
