use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use serde::Serialize;
use tar::{Archive, EntryType};

use crate::domain::FileId;
use crate::error::EsetError;

pub const MANIFEST_NAME: &str = "MANIFEST.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Empty,
    Missing,
    Unexpected,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileStatus::Ok => "OK",
            FileStatus::Empty => "empty",
            FileStatus::Missing => "missing",
            FileStatus::Unexpected => "unexpected",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub id: String,
    pub filename: String,
    pub size_mb: f64,
    pub status: FileStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadReport {
    pub records: Vec<FileRecord>,
}

impl DownloadReport {
    pub fn is_complete(&self) -> bool {
        self.records
            .iter()
            .all(|record| record.status == FileStatus::Ok)
    }

    pub fn status_of(&self, id: &str) -> Option<FileStatus> {
        self.records
            .iter()
            .find(|record| record.id == id)
            .map(|record| record.status)
    }

    pub fn count(&self, status: FileStatus) -> usize {
        self.records
            .iter()
            .filter(|record| record.status == status)
            .count()
    }
}

impl fmt::Display for DownloadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id_width = self
            .records
            .iter()
            .map(|record| record.id.len())
            .max()
            .unwrap_or(0)
            .max("UUID".len());
        writeln!(f, "Download Protocol:")?;
        writeln!(
            f,
            "{:<id_width$}  {:>10}  {:<10}  Filename",
            "UUID", "Size (MB)", "Status"
        )?;
        for record in &self.records {
            writeln!(
                f,
                "{:<id_width$}  {:>10.3}  {:<10}  {}",
                record.id,
                record.size_mb,
                record.status.to_string(),
                record.filename
            )?;
        }
        Ok(())
    }
}

fn open_archive(path: &Path) -> Result<Archive<GzDecoder<File>>, EsetError> {
    let file = File::open(path)
        .map_err(|err| EsetError::Archive(format!("open {}: {err}", path.display())))?;
    Ok(Archive::new(GzDecoder::new(file)))
}

pub fn check(ids: &[FileId], archive_path: &Path) -> Result<DownloadReport, EsetError> {
    let mut records: Vec<FileRecord> = Vec::new();

    if archive_path.exists() {
        let mut archive = open_archive(archive_path)?;
        let entries = archive
            .entries()
            .map_err(|err| EsetError::Archive(err.to_string()))?;
        for entry in entries {
            let Ok(entry) = entry else {
                continue;
            };
            if entry.header().entry_type() == EntryType::Directory {
                continue;
            }
            let path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            let Some((id, filename)) = path.split_once('/') else {
                continue;
            };
            if id.is_empty() || filename.is_empty() {
                continue;
            }
            let size = entry.size();
            records.retain(|record| record.id != id);
            records.push(FileRecord {
                id: id.to_string(),
                filename: filename.to_string(),
                size_mb: size as f64 / 1_000_000.0,
                status: if size == 0 {
                    FileStatus::Empty
                } else {
                    FileStatus::Ok
                },
            });
        }
    } else {
        tracing::warn!(
            archive = %archive_path.display(),
            "download archive does not exist, please check the download"
        );
    }

    let expected: HashSet<&str> = ids.iter().map(FileId::as_str).collect();
    for record in &mut records {
        if !expected.contains(record.id.as_str()) {
            record.status = FileStatus::Unexpected;
        }
    }

    for id in ids {
        if records.iter().any(|record| record.id == id.as_str()) {
            continue;
        }
        tracing::warn!(id = %id, "file is missing from the download");
        records.push(FileRecord {
            id: id.to_string(),
            filename: "unknown".to_string(),
            size_mb: 0.0,
            status: FileStatus::Missing,
        });
    }

    Ok(DownloadReport { records })
}

pub fn extraction_dir(archive_path: &Path) -> Result<PathBuf, EsetError> {
    let name = archive_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            EsetError::Archive(format!("invalid archive path {}", archive_path.display()))
        })?;
    let stem = name
        .strip_suffix(".tar.gz")
        .or_else(|| name.strip_suffix(".tgz"))
        .unwrap_or(name);
    let stem = if stem == name {
        format!("{name}.d")
    } else {
        stem.to_string()
    };
    Ok(archive_path.with_file_name(stem))
}

/// Flattens entries to their file names; the last of two same-named entries wins.
pub fn extract(archive_path: &Path) -> Result<PathBuf, EsetError> {
    let directory = extraction_dir(archive_path)?;
    if !directory.exists() {
        tracing::info!(directory = %directory.display(), "creating directory");
        fs::create_dir_all(&directory).map_err(|err| EsetError::Filesystem(err.to_string()))?;
    }

    let mut archive = open_archive(archive_path)?;
    let entries = archive
        .entries()
        .map_err(|err| EsetError::Archive(err.to_string()))?;
    let mut extracted = 0usize;
    for entry in entries {
        let mut entry = entry.map_err(|err| EsetError::Archive(err.to_string()))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry
            .path()
            .map_err(|err| EsetError::Archive(err.to_string()))?
            .into_owned();
        let Some(base) = path.file_name() else {
            continue;
        };
        if base == MANIFEST_NAME {
            continue;
        }
        let target = directory.join(base);
        entry
            .unpack(&target)
            .map_err(|err| EsetError::Archive(format!("unpack {}: {err}", path.display())))?;
        extracted += 1;
    }
    tracing::info!(files = extracted, directory = %directory.display(), "files extracted");

    tracing::info!(archive = %archive_path.display(), "removing archive");
    fs::remove_file(archive_path).map_err(|err| EsetError::Filesystem(err.to_string()))?;

    fs::canonicalize(&directory).map_err(|err| EsetError::Filesystem(err.to_string()))
}
