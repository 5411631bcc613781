//! Shared building blocks for the output commit protocol: job and task
//! attempt contexts, commit configuration, and the storage backends the
//! protocol drives. Job output lives either on an S3-compatible system
//! or on a local filesystem; both are reached through the
//! [`storage::Storage`] trait so the commit strategies never care which
//! one they are talking to.

pub mod config;
pub mod job;
pub mod local;
pub mod minio;
pub mod storage;
