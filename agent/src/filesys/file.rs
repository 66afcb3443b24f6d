//! File operations used for device artifacts (network config, firmware bundle,
//! authorized keys, os-release)

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::errors::AgentError;
use crate::filesys::dir::Dir;
use crate::utils::to_hex;

/// Read buffer used when hashing large files
const HASH_CHUNK_BYTES: usize = 64 * 1024;

/// A file wrapper with path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    path: PathBuf,
}

impl File {
    /// Create a new file reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing this file, if any
    pub fn parent(&self) -> Option<Dir> {
        self.path.parent().map(Dir::new)
    }

    /// Check if the file exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    /// Read file contents as string
    pub async fn read_string(&self) -> Result<String, AgentError> {
        Ok(fs::read_to_string(&self.path).await?)
    }

    /// Replace the file contents with `contents`.
    ///
    /// The parent directory is not created: a missing or read-only target
    /// directory is reported as an IO error.
    pub async fn write_string(&self, contents: &str) -> Result<(), AgentError> {
        self.write_bytes(contents.as_bytes()).await
    }

    /// Replace the file contents with raw bytes
    pub async fn write_bytes(&self, contents: &[u8]) -> Result<(), AgentError> {
        let mut file = fs::File::create(&self.path).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Append `line` followed by a newline, creating the file when absent
    pub async fn append_line(&self, line: &str) -> Result<(), AgentError> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Set file permissions to owner-read/write only (0o600) on Unix.
    ///
    /// A no-op on non-Unix platforms.
    pub async fn set_permissions_600(&self) -> Result<(), AgentError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600)).await?;
        }
        Ok(())
    }

    /// Size of the file in bytes
    pub async fn size(&self) -> Result<u64, AgentError> {
        Ok(fs::metadata(&self.path).await?.len())
    }

    /// Open the file for writing, truncating any previous contents
    pub async fn create_writer(&self) -> Result<fs::File, AgentError> {
        Ok(fs::File::create(&self.path).await?)
    }

    /// SHA-256 of the contents as lowercase hex, read in chunks
    pub async fn sha256_hex(&self) -> Result<String, AgentError> {
        let mut file = fs::File::open(&self.path).await?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; HASH_CHUNK_BYTES];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(to_hex(&hasher.finalize()))
    }

    /// Move the file to `target`, falling back to copy and delete when the
    /// two paths are on different filesystems
    pub async fn move_to(&self, target: &Path) -> Result<(), AgentError> {
        if fs::rename(&self.path, target).await.is_ok() {
            return Ok(());
        }
        fs::copy(&self.path, target).await?;
        fs::remove_file(&self.path).await?;
        Ok(())
    }

    /// Delete the file; a missing file is not an error
    pub async fn remove(&self) -> Result<(), AgentError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
