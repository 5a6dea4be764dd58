//! Error types for ingestion, image fetching and archive assembly.

use std::path::PathBuf;

use thiserror::Error;

/// Reasons an uploaded table is rejected. Ingestion is all-or-nothing.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file is not valid UTF-8 text")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("could not read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV must contain a 'description' column.")]
    MissingDescription,

    #[error("CSV header repeats the column '{0}'")]
    DuplicateColumn(String),
}

/// Failures while looking up or downloading a single image.
///
/// Every variant is row-local: the row processor records it and moves on.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The search provider failed or answered with something unreadable.
    #[error("image search failed: {0}")]
    Search(String),

    #[error("invalid image URL '{0}'")]
    InvalidUrl(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error {status} fetching {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("could not write '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("refusing to write outside the output folder: '{}'", .0.display())]
    UnsafePath(PathBuf),
}

/// Failures while writing `updated.csv` or zipping the output folder.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive I/O failed on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("could not build zip: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("could not scan output folder: {0}")]
    Scan(#[from] walkdir::Error),
}

/// Failures that end a processing run without producing an archive.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("could not create output folder '{}': {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("archive task aborted: {0}")]
    Aborted(String),
}
