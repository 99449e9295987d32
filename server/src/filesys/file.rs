//! File operations

use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// A file wrapper with path
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    pub async fn read_string(&self) -> io::Result<String> {
        fs::read_to_string(&self.path).await
    }

    pub async fn read_bytes(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path).await
    }

    pub async fn read_json<T: DeserializeOwned>(&self) -> io::Result<T> {
        let contents = self.read_string().await?;
        serde_json::from_str(&contents).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Write string to file, creating parent directories
    pub async fn write_string(&self, contents: &str) -> io::Result<()> {
        self.write_bytes(contents.as_bytes()).await
    }

    /// Write bytes to file, creating parent directories
    pub async fn write_bytes(&self, contents: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&self.path).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        Ok(())
    }
}
