use super::{check_segment, StorageBackend};

use async_trait::async_trait;
use keybroker::Error;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Filesystem-hierarchy backend: `(addr, typ, tag)` maps to
/// `root/addr/typ/tag`. Writes are published atomically by writing to a
/// temporary file in the target directory and renaming it into place.
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| Error::BackendUnavailable(format!("create {}: {e}", root.display())))?;
        Ok(Self { root })
    }

    fn resource_path(&self, addr: &str, typ: &str, tag: &str) -> Result<PathBuf, Error> {
        check_segment(addr)?;
        check_segment(typ)?;
        check_segment(tag)?;
        Ok(self.root.join(addr).join(typ).join(tag))
    }

    fn staged_blob(path: &Path, data: &[u8]) -> io::Result<NamedTempFile> {
        let dir = path.parent().expect("resource paths always have a parent");
        std::fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }

    fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
        let tmp = Self::staged_blob(path, data)?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn write_if_absent(path: &Path, data: &[u8]) -> io::Result<bool> {
        let tmp = Self::staged_blob(path, data)?;
        // hard_link publishes the full staged blob or fails if the key
        // exists; the staged file is cleaned up on drop either way
        match std::fs::hard_link(tmp.path(), path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn io_fault(op: &str, path: &Path, e: io::Error) -> Error {
        Error::BackendUnavailable(format!("{op} {}: {e}", path.display()))
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn set(&self, addr: &str, typ: &str, tag: &str, data: &[u8]) -> Result<(), Error> {
        let path = self.resource_path(addr, typ, tag)?;
        debug!(target: "keybroker::storage", path = %path.display(), "set");
        let data = data.to_vec();
        let write_path = path.clone();
        tokio::task::spawn_blocking(move || Self::write_atomic(&write_path, &data))
            .await
            .map_err(|e| Error::BackendUnavailable(format!("storage task: {e}")))?
            .map_err(|e| Self::io_fault("write", &path, e))
    }

    async fn set_if_absent(
        &self,
        addr: &str,
        typ: &str,
        tag: &str,
        data: &[u8],
    ) -> Result<bool, Error> {
        let path = self.resource_path(addr, typ, tag)?;
        let data = data.to_vec();
        let write_path = path.clone();
        tokio::task::spawn_blocking(move || Self::write_if_absent(&write_path, &data))
            .await
            .map_err(|e| Error::BackendUnavailable(format!("storage task: {e}")))?
            .map_err(|e| Self::io_fault("create", &path, e))
    }

    async fn get(&self, addr: &str, typ: &str, tag: &str) -> Result<Vec<u8>, Error> {
        let path = self.resource_path(addr, typ, tag)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound),
            Err(e) => Err(Self::io_fault("read", &path, e)),
        }
    }

    async fn delete(&self, addr: &str, typ: &str, tag: &str) -> Result<(), Error> {
        let path = self.resource_path(addr, typ, tag)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound),
            Err(e) => Err(Self::io_fault("delete", &path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> (tempfile::TempDir, FileBackend) {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let backend = FileBackend::new(dir.path()).unwrap();
        (dir, backend)
    }

    #[tokio::test]
    async fn set_get_delete_round_trip() {
        let (_dir, backend) = backend();
        backend.set("tenant", "blobs", "a", b"payload").await.unwrap();
        assert_eq!(backend.get("tenant", "blobs", "a").await.unwrap(), b"payload");

        backend.delete("tenant", "blobs", "a").await.unwrap();
        assert!(matches!(
            backend.get("tenant", "blobs", "a").await,
            Err(Error::NotFound)
        ));
    }

    #[tokio::test]
    async fn set_overwrites() {
        let (_dir, backend) = backend();
        backend.set("tenant", "blobs", "a", b"one").await.unwrap();
        backend.set("tenant", "blobs", "a", b"two").await.unwrap();
        assert_eq!(backend.get("tenant", "blobs", "a").await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn missing_blobs_are_not_found() {
        let (_dir, backend) = backend();
        assert!(matches!(
            backend.get("tenant", "blobs", "missing").await,
            Err(Error::NotFound)
        ));
        assert!(matches!(
            backend.delete("tenant", "blobs", "missing").await,
            Err(Error::NotFound)
        ));
    }

    #[tokio::test]
    async fn set_if_absent_keeps_first_writer() {
        let (_dir, backend) = backend();
        assert!(backend
            .set_if_absent("tenant", "ca", "cert.pem", b"first")
            .await
            .unwrap());
        assert!(!backend
            .set_if_absent("tenant", "ca", "cert.pem", b"second")
            .await
            .unwrap());
        assert_eq!(
            backend.get("tenant", "ca", "cert.pem").await.unwrap(),
            b"first"
        );
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let (_dir, backend) = backend();
        assert!(matches!(
            backend.get("..", "blobs", "a").await,
            Err(Error::InvalidTag(_))
        ));
        assert!(matches!(
            backend.set("tenant", "blobs", "../a", b"x").await,
            Err(Error::InvalidTag(_))
        ));
    }
}
