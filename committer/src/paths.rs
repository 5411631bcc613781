//! Path layout shared by the commit strategies.
//!
//! Everything here is pure string composition over qualified paths,
//! except [`write_success_marker`] which creates the marker object.

use anyhow::Error;

use common::config::CommitConfig;
use common::job::TaskAttempt;
use common::storage::Storage;

/// Zero-byte marker dropped into the destination of a committed job.
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Name of the staging directory kept inside the destination.
pub const PENDING_DIR_NAME: &str = "_temporary";

/// `<out>/_temporary`. Everything the rename strategy stages lives
/// below this, so job-level cleanup is a single recursive delete.
pub fn pending_dir(output_path: &str) -> String {
    format!("{}/{}", output_path, PENDING_DIR_NAME)
}

/// `<out>/_temporary/<job_id>`, the staging root for one job.
pub fn job_temp_dir(output_path: &str, job_id: &str) -> String {
    format!("{}/{}", pending_dir(output_path), job_id)
}

/// Work directory for a single attempt, distinct for every
/// (task id, attempt number) pair of the job.
pub fn attempt_work_dir(output_path: &str, job_id: &str, attempt: &TaskAttempt) -> String {
    format!(
        "{}/attempts/task_{:05}_attempt_{}",
        job_temp_dir(output_path, job_id),
        attempt.get_task_id(),
        attempt.get_attempt(),
    )
}

/// Directory where a task's committed output waits until the job
/// commits.
pub fn task_committed_dir(output_path: &str, job_id: &str, task_id: u32) -> String {
    format!(
        "{}/tasks/task_{:05}",
        job_temp_dir(output_path, job_id),
        task_id
    )
}

/// Parent of all committed task directories of the job.
pub fn committed_tasks_dir(output_path: &str, job_id: &str) -> String {
    format!("{}/tasks", job_temp_dir(output_path, job_id))
}

/// Conventional `part-NNNNN` output file name for a task.
pub fn part_file_name(task_id: u32) -> String {
    format!("part-{:05}", task_id)
}

pub fn success_marker_path(output_path: &str) -> String {
    format!("{}/{}", output_path, SUCCESS_MARKER)
}

/// Creates the success marker unless the job's configuration disables
/// it. Returns whether the marker was written.
pub async fn write_success_marker(
    storage: &dyn Storage,
    output_path: &str,
    config: &CommitConfig,
) -> Result<bool, Error> {
    if !config.mark_successful_jobs {
        return Ok(false);
    }
    storage.create(&success_marker_path(output_path)).await?;
    Ok(true)
}
