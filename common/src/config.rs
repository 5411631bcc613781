use std::collections::HashMap;

/// Option controlling whether a `_SUCCESS` marker is written when a job
/// commits. Enabled by default.
pub const MARK_SUCCESSFUL_JOBS: &str = "mark.successful.jobs";

/// Option indicating that the scheduler may run duplicate attempts of
/// slow tasks concurrently. Must be off for the direct strategy to be
/// safe; the protocol does not enforce this.
pub const SPECULATIVE_EXECUTION: &str = "speculative.execution";

/// Option indicating that the job appends to existing output rather than
/// replacing it. Must be off for the direct strategy to be safe.
pub const APPEND_MODE: &str = "append.mode";

/// Commit-related job options, extracted from the job's configuration
/// map. Unrecognized keys are ignored; unparseable values fall back to
/// the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitConfig {
    /// Write a success marker at the destination when the job commits.
    pub mark_successful_jobs: bool,

    /// The scheduler runs speculative duplicate attempts.
    pub speculative_execution: bool,

    /// The job appends to pre-existing output.
    pub append_mode: bool,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            mark_successful_jobs: true,
            speculative_execution: false,
            append_mode: false,
        }
    }
}

impl CommitConfig {
    /// Extract the recognized options from a job configuration map.
    pub fn from_map(options: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        Self {
            mark_successful_jobs: parse_bool(
                options.get(MARK_SUCCESSFUL_JOBS),
                defaults.mark_successful_jobs,
            ),
            speculative_execution: parse_bool(
                options.get(SPECULATIVE_EXECUTION),
                defaults.speculative_execution,
            ),
            append_mode: parse_bool(options.get(APPEND_MODE), defaults.append_mode),
        }
    }
}

fn parse_bool(value: Option<&String>, default: bool) -> bool {
    match value {
        Some(v) if v.trim().eq_ignore_ascii_case("true") => true,
        Some(v) if v.trim().eq_ignore_ascii_case("false") => false,
        _ => default,
    }
}
