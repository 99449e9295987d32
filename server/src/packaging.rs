//! Bundle archives
//!
//! Expands the uploaded bundle into a directory tree and assembles the
//! zip packages used by the zip publishing variant.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::errors::{BuildError, DeployError};
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Validate that `bytes` is a zip archive and extract it into `dest`.
///
/// Entries that would escape `dest` are rejected by the extractor.
pub async fn extract_bundle(bytes: Vec<u8>, dest: &Path) -> Result<(), DeployError> {
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| DeployError::InvalidArchive(e.to_string()))?;
        debug!(entries = archive.len(), dest = %dest.display(), "extracting bundle");
        std::fs::create_dir_all(&dest)?;
        archive
            .extract(&dest)
            .map_err(|e| DeployError::InvalidArchive(e.to_string()))
    })
    .await
    .map_err(|e| DeployError::Io(std::io::Error::other(e)))?
}

/// Zip the contents of several directories into one archive.
///
/// Paths are taken relative to each directory. When two directories hold
/// the same relative path the later one wins.
pub async fn zip_dirs(dirs: &[Dir]) -> Result<Vec<u8>, BuildError> {
    let mut entries: BTreeMap<String, PathBuf> = BTreeMap::new();
    for dir in dirs {
        for relative in dir.list_files_recursive().await? {
            entries.insert(archive_name(&relative), dir.path().join(relative));
        }
    }

    let mut contents = Vec::with_capacity(entries.len());
    for (name, source) in entries {
        contents.push((name, File::new(source).read_bytes().await?));
    }

    tokio::task::spawn_blocking(move || write_zip(contents))
        .await
        .map_err(|e| BuildError::Io(std::io::Error::other(e)))?
}

fn write_zip(entries: Vec<(String, Vec<u8>)>) -> Result<Vec<u8>, BuildError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);
    for (name, data) in entries {
        writer.start_file(name, options)?;
        writer.write_all(&data)?;
    }
    Ok(writer.finish()?.into_inner())
}

fn archive_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
