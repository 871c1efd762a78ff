use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use ulid::Ulid;

#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("file not found")]
    NotFound,

    #[error("file already exists")]
    AlreadyExists,

    #[error("invalid file key: {0:?}")]
    InvalidKey(String),

    #[error("invalid root directory: {0}")]
    InvalidRoot(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PutOptions {
    pub allow_overwrite: bool,
}

/// Key-scoped blob storage with create-if-not-exists semantics.
///
/// Keys are relative paths under a fixed root. The `allow_overwrite: false`
/// put is the pipeline's single idempotency primitive: it either publishes
/// the blob atomically or reports `AlreadyExists`, mirroring an object
/// store's conditional PUT.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8], opts: PutOptions) -> Result<(), FileStoreError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, FileStoreError>;
}

/// Filesystem-backed [`FileStore`] rooted at a directory.
///
/// Writes always go through a sibling temp file that is flushed and then
/// atomically renamed (overwrite) or hard-linked (no-overwrite) into place,
/// so readers never observe partial files and concurrent no-overwrite puts
/// race safely: exactly one wins, the rest see `AlreadyExists`.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root_dir: impl AsRef<Path>) -> Result<Self, FileStoreError> {
        let root_dir = root_dir.as_ref();
        if root_dir.as_os_str().is_empty() {
            return Err(FileStoreError::InvalidRoot(
                "root directory cannot be empty".to_string(),
            ));
        }
        let root = std::path::absolute(root_dir).map_err(|e| {
            FileStoreError::InvalidRoot(format!(
                "failed to resolve {}: {}",
                root_dir.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validates `key` and resolves it to an absolute path under the root.
    ///
    /// Only plain path segments are allowed; absolute paths and any `..`
    /// component are rejected, so a resolved path can never escape the root.
    fn resolve(&self, key: &str) -> Result<PathBuf, FileStoreError> {
        if key.is_empty() {
            return Err(FileStoreError::InvalidKey(key.to_string()));
        }
        let path = Path::new(key);
        if path.is_absolute() {
            return Err(FileStoreError::InvalidKey(key.to_string()));
        }

        let mut resolved = self.root.clone();
        let mut segments = 0;
        for component in path.components() {
            match component {
                Component::Normal(segment) => {
                    resolved.push(segment);
                    segments += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(FileStoreError::InvalidKey(key.to_string()));
                }
            }
        }
        if segments == 0 {
            return Err(FileStoreError::InvalidKey(key.to_string()));
        }
        Ok(resolved)
    }

    async fn write_temp(&self, dir: &Path, bytes: &[u8]) -> Result<PathBuf, FileStoreError> {
        tokio::fs::create_dir_all(dir).await?;
        let temp_path = dir.join(format!(".tmp-{}", Ulid::new()));

        let result = async {
            let mut file = tokio::fs::File::create(&temp_path).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            Ok::<(), io::Error>(())
        }
        .await;

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(temp_path)
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn put(&self, key: &str, bytes: &[u8], opts: PutOptions) -> Result<(), FileStoreError> {
        let final_path = self.resolve(key)?;
        let dir = final_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());

        let temp_path = self.write_temp(&dir, bytes).await?;

        if opts.allow_overwrite {
            // Atomic replace (POSIX rename).
            let renamed = tokio::fs::rename(&temp_path, &final_path).await;
            if renamed.is_err() {
                let _ = tokio::fs::remove_file(&temp_path).await;
            }
            renamed.map_err(FileStoreError::Io)
        } else {
            // Atomic publish-if-not-exists: link fails when the destination
            // already exists. The temp name is removed either way; on success
            // the final path still points at the same inode.
            let linked = tokio::fs::hard_link(&temp_path, &final_path).await;
            let _ = tokio::fs::remove_file(&temp_path).await;
            match linked {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    Err(FileStoreError::AlreadyExists)
                }
                Err(e) => Err(FileStoreError::Io(e)),
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, FileStoreError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(FileStoreError::NotFound),
            Err(e) => Err(FileStoreError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_store() -> (TempDir, LocalFileStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(temp_dir.path()).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_empty_root_rejected() {
        assert!(matches!(
            LocalFileStore::new(""),
            Err(FileStoreError::InvalidRoot(_))
        ));
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let (_dir, store) = make_store();

        store
            .put("a/b/c.json", b"{\"x\":1}", PutOptions::default())
            .await
            .unwrap();
        let bytes = store.get("a/b/c.json").await.unwrap();
        assert_eq!(bytes, b"{\"x\":1}");
    }

    #[tokio::test]
    async fn test_get_missing_key_is_not_found() {
        let (_dir, store) = make_store();
        assert!(matches!(
            store.get("missing.json").await,
            Err(FileStoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_no_overwrite_put_rejects_duplicate() {
        let (_dir, store) = make_store();
        let opts = PutOptions {
            allow_overwrite: false,
        };

        store.put("dup.json", b"first", opts).await.unwrap();
        assert!(matches!(
            store.put("dup.json", b"second", opts).await,
            Err(FileStoreError::AlreadyExists)
        ));

        // The original content survives.
        assert_eq!(store.get("dup.json").await.unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_overwrite_put_replaces() {
        let (_dir, store) = make_store();
        let opts = PutOptions {
            allow_overwrite: true,
        };

        store.put("agg.json", b"v1", opts).await.unwrap();
        store.put("agg.json", b"v2", opts).await.unwrap();
        assert_eq!(store.get("agg.json").await.unwrap(), b"v2");
    }

    #[tokio::test]
    async fn test_temp_files_cleaned_up() {
        let (dir, store) = make_store();

        store
            .put("x/y.json", b"data", PutOptions::default())
            .await
            .unwrap();
        store
            .put(
                "x/y.json",
                b"data2",
                PutOptions {
                    allow_overwrite: true,
                },
            )
            .await
            .unwrap();

        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir.path().join("x")).unwrap() {
            names.push(entry.unwrap().file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["y.json".to_string()]);
    }

    #[tokio::test]
    async fn test_traversal_keys_rejected() {
        let (dir, store) = make_store();

        for key in [
            "",
            ".",
            "..",
            "../outside.json",
            "a/../../outside.json",
            "/etc/passwd",
            "a/..",
        ] {
            let put = store.put(key, b"x", PutOptions::default()).await;
            assert!(
                matches!(put, Err(FileStoreError::InvalidKey(_))),
                "put {:?} should be rejected, got {:?}",
                key,
                put
            );
            let get = store.get(key).await;
            assert!(
                matches!(get, Err(FileStoreError::InvalidKey(_))),
                "get {:?} should be rejected, got {:?}",
                key,
                get
            );
        }

        // Nothing escaped the root.
        let parent = dir.path().parent().unwrap();
        assert!(!parent.join("outside.json").exists());
    }

    #[tokio::test]
    async fn test_dot_segments_are_normalized() {
        let (_dir, store) = make_store();

        store
            .put("./a/./b.json", b"ok", PutOptions::default())
            .await
            .unwrap();
        assert_eq!(store.get("a/b.json").await.unwrap(), b"ok");
    }

    #[tokio::test]
    async fn test_concurrent_no_overwrite_puts_single_winner() {
        let (_dir, store) = make_store();
        let store = std::sync::Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .put(
                        "contested.json",
                        format!("writer-{}", i).as_bytes(),
                        PutOptions {
                            allow_overwrite: false,
                        },
                    )
                    .await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
