//! Source bundle
//!
//! The bundle is a zip of the given Python files, stored under their paths
//! relative to the project root so module paths resolve on the server.

use std::collections::BTreeSet;
use std::io::{Cursor, Write};
use std::path::{Component, Path, PathBuf};

use api_models::{validate, ServiceRegistry};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::errors::CliError;

pub const BUNDLE_FILE_NAME: &str = "pare_project_bundle.zip";

fn invalid(path: &Path, reason: &str) -> CliError {
    CliError::InvalidFile {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// `/`-joined archive name, or `None` when the path leaves the project root
fn archive_name(path: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            _ => return None,
        }
    }
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// A validated set of files to bundle, keyed by archive name
#[derive(Debug, Clone, Default)]
pub struct SourceFiles {
    files: Vec<(String, PathBuf)>,
}

impl SourceFiles {
    /// Check every path up front and report all problems at once.
    ///
    /// Files must exist, end in `.py` and stay inside the current directory.
    pub async fn collect(paths: &[PathBuf]) -> Result<Self, Vec<CliError>> {
        let mut seen = BTreeSet::new();
        let mut files = Vec::new();
        let mut errors = Vec::new();

        for path in paths {
            let Some(name) = archive_name(path) else {
                errors.push(invalid(path, "must be a relative path inside the project"));
                continue;
            };
            match tokio::fs::metadata(path).await {
                Err(_) => errors.push(invalid(path, "does not exist")),
                Ok(meta) if !meta.is_file() => errors.push(invalid(path, "is not a file")),
                Ok(_) if path.extension().and_then(|e| e.to_str()) != Some("py") => {
                    errors.push(invalid(path, "is not a python file"))
                }
                Ok(_) => {
                    if seen.insert(name.clone()) {
                        files.push((name, path.clone()));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(Self { files })
        } else {
            Err(errors)
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Every registered entrypoint must point at a bundled module
    pub fn check_entrypoints(&self, registry: &ServiceRegistry) -> Result<(), CliError> {
        let names: BTreeSet<&str> = self.names().collect();
        for registration in registry.registrations() {
            let (module, _) = validate::target_path(&registration.entrypoint)?;
            let base = module.replace('.', "/");
            let candidates = [format!("{}.py", base), format!("{}/__init__.py", base)];
            if !candidates.iter().any(|c| names.contains(c.as_str())) {
                return Err(CliError::InvalidFile {
                    path: candidates[0].clone(),
                    reason: format!(
                        "module '{}' of service '{}' is not part of the bundle",
                        module, registration.name
                    ),
                });
            }
        }
        Ok(())
    }

    /// Zip every file into an in-memory archive
    pub async fn bundle(&self) -> Result<Vec<u8>, CliError> {
        let mut contents = Vec::with_capacity(self.files.len());
        for (name, path) in &self.files {
            contents.push((name.clone(), tokio::fs::read(path).await?));
        }
        debug!(files = contents.len(), "bundling sources");

        tokio::task::spawn_blocking(move || write_zip(contents))
            .await
            .map_err(|e| CliError::Io(std::io::Error::other(e)))?
    }
}

fn write_zip(entries: Vec<(String, Vec<u8>)>) -> Result<Vec<u8>, CliError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in entries {
        writer.start_file(name, options)?;
        writer.write_all(&data)?;
    }
    Ok(writer.finish()?.into_inner())
}
