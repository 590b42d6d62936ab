//! Coursebridge file-system adapter.
//!
//! Implements the [`coursework::Archiver`] port by packing a repository
//! checkout into a zip file.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules.
//!
//! ## Determinism
//!
//! Archives of identical directory contents are byte-identical: entries are
//! written in path order, every entry carries the zip epoch
//! (1980-01-01 00:00:00) as its timestamp, permissions are fixed, and
//! version-control metadata directories are left out.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use coursework::{ArchiveError, Archiver};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Directory names never included in an archive.
pub const DEFAULT_EXCLUDES: [&str; 3] = [".git", ".hg", ".svn"];

pub const DEFAULT_EXTENSION: &str = "zip";

const FILE_MODE: u32 = 0o644;
const DIR_MODE: u32 = 0o755;

/// Writes deterministic zip archives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipArchiver {
    /// File or directory names skipped wherever they occur in the tree.
    exclude: Vec<String>,
    extension: String,
}

impl Default for ZipArchiver {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDES.iter().map(|s| s.to_string()))
    }
}

impl ZipArchiver {
    pub fn new(exclude: impl IntoIterator<Item = String>) -> Self {
        Self {
            exclude: exclude.into_iter().collect(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Names produced archives `*.<extension>` instead of `*.zip`.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    fn is_excluded(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.exclude.iter().any(|e| e == name))
    }

    fn write_archive(&self, source_dir: &Path, destination: &Path) -> Result<usize, ArchiveError> {
        if !source_dir.is_dir() {
            return Err(archive_error(source_dir, "not a directory"));
        }
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(|e| archive_error(parent, e))?;
        }

        let file = File::create(destination).map_err(|e| archive_error(destination, e))?;
        let mut zip = ZipWriter::new(BufWriter::new(file));
        let base = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());
        let file_options = base.unix_permissions(FILE_MODE);
        let dir_options = base.unix_permissions(DIR_MODE);

        let mut entries = 0;
        let walker = WalkDir::new(source_dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_excluded(e));
        for entry in walker {
            let entry = entry.map_err(|e| archive_error(source_dir, e))?;
            let path = entry.path();
            if entry.depth() == 0 || path == destination {
                continue;
            }
            let name = entry_name(source_dir, path)?;

            let file_type = entry.file_type();
            if file_type.is_dir() {
                zip.add_directory(name, dir_options)
                    .map_err(|e| archive_error(path, e))?;
            } else if file_type.is_file() {
                zip.start_file(name, file_options)
                    .map_err(|e| archive_error(path, e))?;
                let mut input = File::open(path).map_err(|e| archive_error(path, e))?;
                io::copy(&mut input, &mut zip).map_err(|e| archive_error(path, e))?;
            } else {
                debug!(path = %path.display(), "skipping non-regular file");
                continue;
            }
            entries += 1;
        }

        zip.finish()
            .map_err(|e| archive_error(destination, e))?
            .into_inner()
            .map_err(|e| archive_error(destination, e.into_error()))?
            .sync_all()
            .map_err(|e| archive_error(destination, e))?;
        Ok(entries)
    }
}

impl Archiver for ZipArchiver {
    fn extension(&self) -> &str {
        &self.extension
    }

    fn create_archive(&self, source_dir: &Path, destination: &Path) -> Result<(), ArchiveError> {
        let entries = self.write_archive(source_dir, destination)?;
        debug!(
            source = %source_dir.display(),
            archive = %destination.display(),
            entries,
            "archive written"
        );
        Ok(())
    }
}

/// Zip entry name of `path`: relative to `root`, `/`-separated.
fn entry_name(root: &Path, path: &Path) -> Result<String, ArchiveError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| archive_error(path, "outside the archived directory"))?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

fn archive_error(path: &Path, message: impl std::fmt::Display) -> ArchiveError {
    ArchiveError {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}
