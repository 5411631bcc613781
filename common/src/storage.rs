use anyhow::Error;
use async_trait::async_trait;
use bytes::Bytes;

/// A filesystem or object-store abstraction, consumed by the commit
/// protocol as a set of opaque primitives.
///
/// Paths are plain strings in whatever form the backend understands:
/// `/data/out` for [`LocalFs`], `s3://bucket/out` for the minio
/// [`Client`]. The consistency semantics behind these primitives are the
/// axis the protocol switches strategy on — a hierarchical filesystem
/// gives atomic [`rename`] but no concurrent-write safety, an object
/// store gives atomic per-object visibility but only emulated renames.
///
/// [`LocalFs`]: crate::local::LocalFs
/// [`Client`]: crate::minio::Client
/// [`rename`]: Storage::rename
#[async_trait]
pub trait Storage: Send + Sync {
    /// Normalize `path` into its canonical absolute form, e.g. resolving
    /// a relative filesystem path or stripping a trailing slash.
    fn make_qualified(&self, path: &str) -> Result<String, Error>;

    /// Create a zero-byte object at `path`, replacing any existing one.
    /// Missing parent directories are created.
    async fn create(&self, path: &str) -> Result<(), Error>;

    /// Write `data` to `path`, replacing any existing object. Missing
    /// parent directories are created.
    async fn put(&self, path: &str, data: Bytes) -> Result<(), Error>;

    /// Read the object at `path`.
    async fn get(&self, path: &str) -> Result<Bytes, Error>;

    /// Ensure the directory `path` exists. A no-op on stores where
    /// directories are implicit.
    async fn mkdirs(&self, path: &str) -> Result<(), Error>;

    /// Whether an object or a directory exists at `path`. On stores
    /// with implicit directories, a directory exists once any object
    /// lives under it.
    async fn exists(&self, path: &str) -> Result<bool, Error>;

    /// The immediate children of the directory at `path`, as full paths
    /// in the backend's own form. A missing directory yields an empty
    /// list.
    async fn list(&self, path: &str) -> Result<Vec<String>, Error>;

    /// Move `src` to `dst`. A file replaces an existing destination; a
    /// directory moved onto an existing directory has its contents
    /// merged into it, overwriting same-named entries. The destination's
    /// parent is created if missing.
    async fn rename(&self, src: &str, dst: &str) -> Result<(), Error>;

    /// Delete the object or directory at `path`. Deleting a missing path
    /// is not an error. A non-empty directory requires `recursive`.
    async fn delete(&self, path: &str, recursive: bool) -> Result<(), Error>;
}
