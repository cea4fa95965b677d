//! Server-side file storage rooted at a single directory.
//!
//! Names are relative paths validated against the root before any I/O.
//! Writes go to a hidden temp file in the destination directory and are
//! renamed into place, so readers never observe a partially written file.

use std::io;
use std::path::{Component, Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use courier_protocol::MAX_FILE_SIZE;

/// Prefix of in-flight upload files. Names using it are reserved.
pub const TEMP_PREFIX: &str = ".courier-";

/// Errors produced by [`Storage`].
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("file too large to transfer: {name} is {size} bytes (max {max})")]
    TooLarge { name: String, size: u64, max: u64 },

    #[error("I/O error on {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// File storage under a fixed root directory.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the storage root if it does not exist.
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| StorageError::Io {
                name: self.root.display().to_string(),
                source,
            })
    }

    /// Writes `contents` under `name`, replacing any existing file.
    ///
    /// Returns the normalized name the file was stored under.
    pub async fn write(&self, name: &str, contents: &[u8]) -> Result<String, StorageError> {
        let relative = normalize_name(name)?;
        let final_path = self.root.join(&relative);
        let stored_name = display_name(&relative);
        let io_err = |source| StorageError::Io {
            name: stored_name.clone(),
            source,
        };

        let parent = final_path.parent().unwrap_or(&self.root).to_path_buf();
        tokio::fs::create_dir_all(&parent).await.map_err(io_err)?;

        if let Ok(meta) = tokio::fs::metadata(&final_path).await
            && meta.is_dir()
        {
            return Err(StorageError::InvalidName(format!(
                "a directory already exists at {stored_name}"
            )));
        }

        let temp_path = parent.join(format!("{TEMP_PREFIX}{}.part", uuid::Uuid::new_v4()));
        let result = async {
            let mut file = tokio::fs::File::create(&temp_path).await?;
            file.write_all(contents).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&temp_path, &final_path).await
        }
        .await;

        if let Err(source) = result {
            if let Err(e) = tokio::fs::remove_file(&temp_path).await
                && e.kind() != io::ErrorKind::NotFound
            {
                warn!(path = %temp_path.display(), error = %e, "failed to remove temp file");
            }
            return Err(io_err(source));
        }

        debug!(name = %stored_name, size = contents.len(), "file stored");
        Ok(stored_name)
    }

    /// Reads the full contents of `name`.
    ///
    /// Files larger than [`MAX_FILE_SIZE`] are refused without being read.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let (path, stored_name, size) = self.existing_file(name).await?;
        if size > MAX_FILE_SIZE as u64 {
            return Err(StorageError::TooLarge {
                name: stored_name,
                size,
                max: MAX_FILE_SIZE as u64,
            });
        }
        tokio::fs::read(&path).await.map_err(|source| {
            if is_missing(&source) {
                StorageError::NotFound(stored_name.clone())
            } else {
                StorageError::Io {
                    name: stored_name.clone(),
                    source,
                }
            }
        })
    }

    /// Removes `name`.
    pub async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let (path, stored_name, _) = self.existing_file(name).await?;
        tokio::fs::remove_file(&path).await.map_err(|source| {
            if is_missing(&source) {
                StorageError::NotFound(stored_name.clone())
            } else {
                StorageError::Io {
                    name: stored_name.clone(),
                    source,
                }
            }
        })?;
        debug!(name = %stored_name, "file deleted");
        Ok(())
    }

    /// Lists every stored file as a `/`-separated name relative to the
    /// root, sorted lexicographically.
    ///
    /// In-flight uploads are skipped. A missing root lists as empty.
    pub async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut files = Vec::new();
        let mut pending = vec![(self.root.clone(), String::new())];

        while let Some((dir, prefix)) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if is_missing(&e) => continue,
                Err(source) => {
                    return Err(StorageError::Io {
                        name: dir.display().to_string(),
                        source,
                    });
                }
            };

            let io_err = |source| StorageError::Io {
                name: dir.display().to_string(),
                source,
            };
            while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
                let file_name = entry.file_name().to_string_lossy().into_owned();
                if file_name.starts_with(TEMP_PREFIX) {
                    continue;
                }

                let name = if prefix.is_empty() {
                    file_name
                } else {
                    format!("{prefix}/{file_name}")
                };

                let file_type = entry.file_type().await.map_err(io_err)?;
                if file_type.is_dir() {
                    pending.push((entry.path(), name));
                } else if file_type.is_file() {
                    files.push(name);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Resolves `name` to an existing regular file and its size.
    async fn existing_file(&self, name: &str) -> Result<(PathBuf, String, u64), StorageError> {
        let relative = normalize_name(name)?;
        let path = self.root.join(&relative);
        let stored_name = display_name(&relative);

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok((path, stored_name, meta.len())),
            Ok(_) => Err(StorageError::NotFound(stored_name)),
            Err(e) if is_missing(&e) => Err(StorageError::NotFound(stored_name)),
            Err(source) => Err(StorageError::Io {
                name: stored_name,
                source,
            }),
        }
    }
}

/// Validates a client-supplied name and returns it as a clean relative path.
///
/// Rejects:
/// - Empty names, or names with no file component (`.`, `./`)
/// - Absolute paths, root and prefix components
/// - Parent directory traversal (`..`)
/// - Windows drive (`C:`) and UNC (`\\server`) prefixes
/// - Components using the reserved temp prefix
pub fn normalize_name(name: &str) -> Result<PathBuf, StorageError> {
    if name.is_empty() {
        return Err(StorageError::InvalidName("empty name".into()));
    }

    let bytes = name.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return Err(StorageError::InvalidName(format!(
            "Windows drive prefix not allowed: {name}"
        )));
    }
    if name.starts_with("\\\\") {
        return Err(StorageError::InvalidName(format!(
            "UNC path not allowed: {name}"
        )));
    }

    let path = Path::new(name);
    if path.is_absolute() {
        return Err(StorageError::InvalidName(format!(
            "absolute path not allowed: {name}"
        )));
    }

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => {
                if part.to_string_lossy().starts_with(TEMP_PREFIX) {
                    return Err(StorageError::InvalidName(format!(
                        "reserved name not allowed: {name}"
                    )));
                }
                normalized.push(part);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(StorageError::InvalidName(format!(
                    "parent traversal not allowed: {name}"
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(StorageError::InvalidName(format!(
                    "absolute path not allowed: {name}"
                )));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(StorageError::InvalidName(format!(
            "name has no file component: {name}"
        )));
    }

    Ok(normalized)
}

/// Renders a relative path with `/` separators.
fn display_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_missing(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> (tempfile::TempDir, Storage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("storedFiles"));
        (dir, storage)
    }

    #[test]
    fn normalize_rejects_empty() {
        assert!(normalize_name("").is_err());
        assert!(normalize_name(".").is_err());
        assert!(normalize_name("./").is_err());
    }

    #[test]
    fn normalize_rejects_absolute() {
        assert!(normalize_name("/etc/passwd").is_err());
    }

    #[test]
    fn normalize_rejects_parent_traversal() {
        assert!(normalize_name("../secret").is_err());
        assert!(normalize_name("a/../../etc").is_err());
        assert!(normalize_name("a/..").is_err());
    }

    #[test]
    fn normalize_rejects_windows_forms() {
        assert!(normalize_name("C:\\Windows").is_err());
        assert!(normalize_name("\\\\server\\share").is_err());
    }

    #[test]
    fn normalize_allows_colon_after_non_letter() {
        assert_eq!(normalize_name("1:2.txt").unwrap(), PathBuf::from("1:2.txt"));
        assert_eq!(normalize_name("_:x").unwrap(), PathBuf::from("_:x"));
        assert!(normalize_name("d:notes.txt").is_err());
    }

    #[test]
    fn normalize_rejects_reserved_prefix() {
        assert!(normalize_name(".courier-abc.part").is_err());
        assert!(normalize_name("dir/.courier-x").is_err());
    }

    #[test]
    fn normalize_cleans_redundant_components() {
        assert_eq!(normalize_name("./a//b").unwrap(), PathBuf::from("a/b"));
        assert_eq!(normalize_name("a.txt").unwrap(), PathBuf::from("a.txt"));
        assert_eq!(
            normalize_name(".config/settings.json").unwrap(),
            PathBuf::from(".config/settings.json")
        );
    }

    #[tokio::test]
    async fn write_then_read() {
        let (_dir, storage) = storage();
        let stored = storage.write("a.txt", b"hello").await.unwrap();
        assert_eq!(stored, "a.txt");
        assert_eq!(storage.read("a.txt").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn write_creates_parent_directories() {
        let (_dir, storage) = storage();
        let stored = storage.write("./docs//notes/a.txt", b"x").await.unwrap();
        assert_eq!(stored, "docs/notes/a.txt");
        assert!(storage.root().join("docs/notes/a.txt").is_file());
        assert_eq!(storage.read("docs/notes/a.txt").await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn write_overwrites() {
        let (_dir, storage) = storage();
        storage.write("a.txt", b"first version").await.unwrap();
        storage.write("a.txt", b"v2").await.unwrap();
        assert_eq!(storage.read("a.txt").await.unwrap(), b"v2");
    }

    #[tokio::test]
    async fn empty_file_roundtrip() {
        let (_dir, storage) = storage();
        storage.write("empty.bin", b"").await.unwrap();
        assert!(storage.read("empty.bin").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_leaves_no_temp_files() {
        let (_dir, storage) = storage();
        storage.write("a.txt", b"hello").await.unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(storage.root())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with(TEMP_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn traversal_writes_nothing_outside_root() {
        let (dir, storage) = storage();
        let result = storage.write("../escaped.txt", b"nope").await;
        assert!(matches!(result, Err(StorageError::InvalidName(_))));
        assert!(!dir.path().join("escaped.txt").exists());
    }

    #[tokio::test]
    async fn write_over_directory_is_rejected() {
        let (_dir, storage) = storage();
        storage.write("docs/a.txt", b"x").await.unwrap();
        let result = storage.write("docs", b"y").await;
        assert!(matches!(result, Err(StorageError::InvalidName(_))));
    }

    #[tokio::test]
    async fn write_through_file_is_io_error() {
        let (_dir, storage) = storage();
        storage.write("a.txt", b"x").await.unwrap();
        let result = storage.write("a.txt/b.txt", b"y").await;
        assert!(matches!(result, Err(StorageError::Io { .. })));
    }

    #[tokio::test]
    async fn read_missing_is_not_found() {
        let (_dir, storage) = storage();
        let result = storage.read("never.txt").await;
        assert!(matches!(result, Err(StorageError::NotFound(name)) if name == "never.txt"));
    }

    #[tokio::test]
    async fn read_directory_is_not_found() {
        let (_dir, storage) = storage();
        storage.write("docs/a.txt", b"x").await.unwrap();
        assert!(matches!(
            storage.read("docs").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn read_below_a_file_is_not_found() {
        let (_dir, storage) = storage();
        storage.write("a.txt", b"x").await.unwrap();
        assert!(matches!(
            storage.read("a.txt/inner").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn read_oversized_file_is_refused() {
        let (_dir, storage) = storage();
        storage.ensure_root().await.unwrap();
        let file = std::fs::File::create(storage.root().join("huge.bin")).unwrap();
        file.set_len(MAX_FILE_SIZE as u64 + 1).unwrap();

        match storage.read("huge.bin").await {
            Err(StorageError::TooLarge { name, size, max }) => {
                assert_eq!(name, "huge.bin");
                assert_eq!(size, MAX_FILE_SIZE as u64 + 1);
                assert_eq!(max, MAX_FILE_SIZE as u64);
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
        assert_eq!(storage.list().await.unwrap(), vec!["huge.bin"]);
        storage.delete("huge.bin").await.unwrap();
    }

    #[tokio::test]
    async fn delete_removes_file() {
        let (_dir, storage) = storage();
        storage.write("a.txt", b"x").await.unwrap();
        storage.delete("a.txt").await.unwrap();

        assert!(matches!(
            storage.read("a.txt").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.delete("a.txt").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_is_recursive_and_sorted() {
        let (_dir, storage) = storage();
        storage.write("zeta.txt", b"1").await.unwrap();
        storage.write("alpha.txt", b"2").await.unwrap();
        storage.write("docs/b.txt", b"3").await.unwrap();
        storage.write("docs/a.txt", b"4").await.unwrap();

        let files = storage.list().await.unwrap();
        assert_eq!(
            files,
            vec!["alpha.txt", "docs/a.txt", "docs/b.txt", "zeta.txt"]
        );
    }

    #[tokio::test]
    async fn list_skips_temp_files() {
        let (_dir, storage) = storage();
        storage.ensure_root().await.unwrap();
        std::fs::write(storage.root().join(".courier-123.part"), b"partial").unwrap();
        storage.write("a.txt", b"x").await.unwrap();

        assert_eq!(storage.list().await.unwrap(), vec!["a.txt"]);
    }

    #[tokio::test]
    async fn list_missing_root_is_empty() {
        let (_dir, storage) = storage();
        assert!(storage.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_writes_never_mix() {
        let (_dir, storage) = storage();
        storage.ensure_root().await.unwrap();

        let payloads: Vec<Vec<u8>> = (0u8..8).map(|i| vec![i; 256 * 1024]).collect();
        let mut handles = Vec::new();
        for payload in payloads.clone() {
            let storage = storage.clone();
            handles.push(tokio::spawn(async move {
                storage.write("shared.bin", &payload).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = storage.read("shared.bin").await.unwrap();
        assert!(payloads.contains(&stored), "stored bytes mix several writes");
        assert_eq!(storage.list().await.unwrap(), vec!["shared.bin"]);
    }
}
