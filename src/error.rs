use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum EsetError {
    #[error("invalid project id: {0}")]
    InvalidProjectId(String),

    #[error("invalid data format: {0}")]
    InvalidFormat(String),

    #[error("invalid count pair: {0}")]
    InvalidCounts(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("no project configured (use --project or set \"project\" in maf-eset.json)")]
    MissingProject,

    #[error("GDC request failed: {0}")]
    GdcHttp(String),

    #[error("GDC returned status {status}: {message}")]
    GdcStatus { status: u16, message: String },

    #[error("unexpected GDC response: {0}")]
    GdcResponse(String),

    #[error("download response carries no filename: {0}")]
    MissingFilename(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("{file} is missing required columns: {}", .columns.join(", "))]
    #[diagnostic(help("check the column selection against the file header"))]
    MissingColumns { file: String, columns: Vec<String> },

    #[error("failed to parse table {file}: {message}")]
    TableParse { file: String, message: String },

    #[error("no MAF files found in {0}")]
    NoInputFiles(PathBuf),

    #[error("output tables are not aligned: {0}")]
    MisalignedTables(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
