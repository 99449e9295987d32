//! Directory operations

use std::io;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use tokio::fs;

use crate::filesys::file::File;

/// A directory wrapper with path
#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    /// Create the directory (and parents)
    pub async fn create(&self) -> io::Result<()> {
        fs::create_dir_all(&self.path).await
    }

    pub fn file(&self, name: &str) -> File {
        File::new(self.path.join(name))
    }

    pub fn subdir(&self, name: &str) -> Dir {
        Dir::new(self.path.join(name))
    }

    /// Recursively copy this directory's contents into `dest`, creating it.
    /// Symlinks are skipped.
    pub async fn copy_to(&self, dest: &Dir) -> io::Result<()> {
        copy_tree(self.path.clone(), dest.path.clone()).await
    }

    /// Every regular file below this directory, as paths relative to it,
    /// sorted for a stable archive order
    pub async fn list_files_recursive(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        collect_files(self.path.clone(), PathBuf::new(), &mut files).await?;
        files.sort();
        Ok(files)
    }
}

fn copy_tree(src: PathBuf, dest: PathBuf) -> BoxFuture<'static, io::Result<()>> {
    Box::pin(async move {
        fs::create_dir_all(&dest).await?;
        let mut entries = fs::read_dir(&src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let target = dest.join(entry.file_name());
            if file_type.is_dir() {
                copy_tree(entry.path(), target).await?;
            } else if file_type.is_file() {
                fs::copy(entry.path(), target).await?;
            }
        }
        Ok(())
    })
}

fn collect_files<'a>(
    root: PathBuf,
    relative: PathBuf,
    files: &'a mut Vec<PathBuf>,
) -> BoxFuture<'a, io::Result<()>> {
    Box::pin(async move {
        let mut entries = fs::read_dir(root.join(&relative)).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let child = relative.join(entry.file_name());
            if file_type.is_dir() {
                collect_files(root.clone(), child, files).await?;
            } else if file_type.is_file() {
                files.push(child);
            }
        }
        Ok(())
    })
}
