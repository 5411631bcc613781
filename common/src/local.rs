use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Error;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::storage::Storage;

/// Storage backend for local hierarchical filesystems.
///
/// Renames of a single directory entry are atomic, which is what the
/// rename-based commit strategy relies on. Concurrent writers to the
/// same path are not safe here, so attempts must be isolated by path.
#[derive(Debug, Clone, Default)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

/// Move `src` onto `dst`: contents of a directory are merged into an
/// existing destination directory, everything else replaces whatever is
/// in the way.
fn merge_move(src: &Path, dst: &Path) -> Result<(), Error> {
    let src_meta = fs::metadata(src)?;
    if src_meta.is_dir() && dst.is_dir() {
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            merge_move(&entry.path(), &dst.join(entry.file_name()))?;
        }
        fs::remove_dir(src)?;
    } else {
        remove_any(dst)?;
        fs::rename(src, dst)?;
    }
    Ok(())
}

fn remove_any(path: &Path) -> Result<(), Error> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path)?,
        Ok(_) => fs::remove_file(path)?,
        Err(_) => {}
    }
    Ok(())
}

#[async_trait]
impl Storage for LocalFs {
    fn make_qualified(&self, path: &str) -> Result<String, Error> {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed };
        let qualified = if Path::new(trimmed).is_absolute() {
            PathBuf::from(trimmed)
        } else {
            std::env::current_dir()?.join(trimmed)
        };
        Ok(qualified.to_string_lossy().into_owned())
    }

    async fn create(&self, path: &str) -> Result<(), Error> {
        self.put(path, Bytes::new()).await
    }

    async fn put(&self, path: &str, data: Bytes) -> Result<(), Error> {
        if let Some(parent) = Path::new(path).parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes, Error> {
        let data = tokio::fs::read(path).await?;
        Ok(Bytes::from(data))
    }

    async fn mkdirs(&self, path: &str) -> Result<(), Error> {
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, Error> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn list(&self, path: &str) -> Result<Vec<String>, Error> {
        let mut entries = match tokio::fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let mut children = vec![];
        while let Some(entry) = entries.next_entry().await? {
            children.push(entry.path().to_string_lossy().into_owned());
        }
        children.sort();
        Ok(children)
    }

    async fn rename(&self, src: &str, dst: &str) -> Result<(), Error> {
        let dst_path = Path::new(dst);
        if let Some(parent) = dst_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        merge_move(Path::new(src), dst_path)
    }

    async fn delete(&self, path: &str, recursive: bool) -> Result<(), Error> {
        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("nothing to delete at {path}");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if !meta.is_dir() {
            tokio::fs::remove_file(path).await?;
        } else if recursive {
            tokio::fs::remove_dir_all(path).await?;
        } else {
            tokio::fs::remove_dir(path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn sub(dir: &TempDir, rel: &str) -> String {
        format!("{}/{}", dir.path().display(), rel)
    }

    #[tokio::test]
    async fn rename_replaces_an_existing_file() {
        let dir = TempDir::new().unwrap();
        let store = LocalFs::new();

        store.put(&sub(&dir, "a"), Bytes::from("new")).await.unwrap();
        store.put(&sub(&dir, "b"), Bytes::from("old")).await.unwrap();

        store.rename(&sub(&dir, "a"), &sub(&dir, "b")).await.unwrap();

        assert!(!store.exists(&sub(&dir, "a")).await.unwrap());
        assert_eq!(store.get(&sub(&dir, "b")).await.unwrap(), Bytes::from("new"));
    }

    #[tokio::test]
    async fn rename_merges_into_an_existing_directory() {
        let dir = TempDir::new().unwrap();
        let store = LocalFs::new();

        store.put(&sub(&dir, "src/a"), Bytes::from("new a")).await.unwrap();
        store.put(&sub(&dir, "src/nested/b"), Bytes::from("b")).await.unwrap();
        store.put(&sub(&dir, "dst/a"), Bytes::from("old a")).await.unwrap();
        store.put(&sub(&dir, "dst/keep"), Bytes::from("keep")).await.unwrap();

        store.rename(&sub(&dir, "src"), &sub(&dir, "dst")).await.unwrap();

        assert!(!store.exists(&sub(&dir, "src")).await.unwrap());
        assert_eq!(store.get(&sub(&dir, "dst/a")).await.unwrap(), Bytes::from("new a"));
        assert_eq!(store.get(&sub(&dir, "dst/nested/b")).await.unwrap(), Bytes::from("b"));
        assert_eq!(store.get(&sub(&dir, "dst/keep")).await.unwrap(), Bytes::from("keep"));
    }

    #[tokio::test]
    async fn rename_moves_a_directory_when_destination_is_absent() {
        let dir = TempDir::new().unwrap();
        let store = LocalFs::new();

        store.put(&sub(&dir, "src/a"), Bytes::from("a")).await.unwrap();

        store
            .rename(&sub(&dir, "src"), &sub(&dir, "moved/here"))
            .await
            .unwrap();

        assert!(!store.exists(&sub(&dir, "src")).await.unwrap());
        assert_eq!(store.get(&sub(&dir, "moved/here/a")).await.unwrap(), Bytes::from("a"));
    }

    #[tokio::test]
    async fn delete_of_a_missing_path_is_ok() {
        let dir = TempDir::new().unwrap();
        let store = LocalFs::new();

        store.delete(&sub(&dir, "never/written"), true).await.unwrap();
    }

    #[tokio::test]
    async fn list_of_a_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = LocalFs::new();

        assert!(store.list(&sub(&dir, "missing")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_returns_immediate_children_sorted() {
        let dir = TempDir::new().unwrap();
        let store = LocalFs::new();

        store.put(&sub(&dir, "out/b"), Bytes::from("b")).await.unwrap();
        store.put(&sub(&dir, "out/a"), Bytes::from("a")).await.unwrap();
        store.put(&sub(&dir, "out/c/nested"), Bytes::from("c")).await.unwrap();

        let children = store.list(&sub(&dir, "out")).await.unwrap();
        assert_eq!(
            children,
            vec![sub(&dir, "out/a"), sub(&dir, "out/b"), sub(&dir, "out/c")]
        );
    }

    #[tokio::test]
    async fn create_writes_a_zero_byte_object() {
        let dir = TempDir::new().unwrap();
        let store = LocalFs::new();

        store.create(&sub(&dir, "marker")).await.unwrap();

        assert!(store.exists(&sub(&dir, "marker")).await.unwrap());
        assert!(store.get(&sub(&dir, "marker")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn make_qualified_strips_trailing_slashes() {
        let store = LocalFs::new();
        assert_eq!(store.make_qualified("/data/out/").unwrap(), "/data/out");
    }
}
