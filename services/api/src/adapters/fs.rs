//! services/api/src/adapters/fs.rs
//!
//! Filesystem implementation of the `ArtifactStore` port. Audio clips and proof
//! documents each get their own fixed directory.

use async_trait::async_trait;
use excuse_core::ports::{ArtifactKind, ArtifactStore, PortError, PortResult};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct FsArtifactStore {
    audio_dir: PathBuf,
    proof_dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(audio_dir: impl Into<PathBuf>, proof_dir: impl Into<PathBuf>) -> Self {
        Self {
            audio_dir: audio_dir.into(),
            proof_dir: proof_dir.into(),
        }
    }

    fn dir_for(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Audio => &self.audio_dir,
            ArtifactKind::Proof => &self.proof_dir,
        }
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn write(&self, kind: ArtifactKind, file_name: &str, bytes: &[u8]) -> PortResult<String> {
        // Names are generated internally; anything path-like is a bug upstream.
        if file_name.is_empty()
            || file_name.contains(['/', '\\'])
            || file_name.starts_with('.')
        {
            return Err(PortError::InvalidInput(format!(
                "invalid artifact file name '{}'",
                file_name
            )));
        }

        let dir = self.dir_for(kind);
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            PortError::Unexpected(format!("failed to create {}: {}", dir.display(), e))
        })?;

        let path = dir.join(file_name);
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            PortError::Unexpected(format!("failed to write {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), bytes = bytes.len(), "Artifact written");

        Ok(path.to_string_lossy().into_owned())
    }

    async fn remove(&self, path: &str) -> PortResult<()> {
        let path = Path::new(path);
        // Only files directly inside one of the artifact directories.
        let owned = path
            .parent()
            .is_some_and(|dir| dir == self.audio_dir || dir == self.proof_dir);
        if !owned {
            return Err(PortError::InvalidInput(format!(
                "{} is not an artifact path",
                path.display()
            )));
        }

        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Artifact removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Unexpected(format!(
                "failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_into_the_directory_for_each_kind() {
        let root = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(root.path().join("audio"), root.path().join("proofs"));

        let audio = store.write(ArtifactKind::Audio, "a.mp3", b"ID3").await.unwrap();
        let proof = store.write(ArtifactKind::Proof, "p.txt", b"hello").await.unwrap();

        assert_eq!(PathBuf::from(&audio), root.path().join("audio").join("a.mp3"));
        assert_eq!(std::fs::read(&audio).unwrap(), b"ID3");
        assert_eq!(std::fs::read_to_string(&proof).unwrap(), "hello");
    }

    #[tokio::test]
    async fn remove_deletes_written_files_only() {
        let root = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(root.path().join("audio"), root.path().join("proofs"));

        let proof = store.write(ArtifactKind::Proof, "p.txt", b"hello").await.unwrap();
        store.remove(&proof).await.unwrap();
        assert!(!Path::new(&proof).exists());
        // Already gone is fine.
        store.remove(&proof).await.unwrap();

        let outside = root.path().join("keep.txt");
        std::fs::write(&outside, b"keep").unwrap();
        assert!(matches!(
            store.remove(&outside.to_string_lossy()).await,
            Err(PortError::InvalidInput(_))
        ));
        assert!(outside.exists());
    }

    #[tokio::test]
    async fn path_like_names_are_rejected() {
        let root = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(root.path().join("audio"), root.path().join("proofs"));
        for name in ["../escape.mp3", "nested/a.mp3", ".hidden", ""] {
            assert!(matches!(
                store.write(ArtifactKind::Audio, name, b"x").await,
                Err(PortError::InvalidInput(_))
            ));
        }
    }
}
