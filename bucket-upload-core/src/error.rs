//! Error taxonomy for a bucket-upload run.
//!
//! Every variant of [`Error`] is fatal: the entrypoint logs it once and exits
//! non-zero. The two tolerated conditions (a match vanished, or is a
//! directory) are not errors at all; see [`crate::upload::SkipReason`].

use std::path::PathBuf;

use thiserror::Error;

use crate::contract::StorageError;

/// Errors raised while evaluating include/exclude glob patterns.
#[derive(Error, Debug)]
pub enum GlobError {
    /// The pattern is not valid glob syntax.
    #[error("invalid glob pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// The filesystem walk failed, e.g. an unreadable directory below the pattern root.
    #[error("glob {pattern:?} failed while walking the filesystem: {source}")]
    Walk {
        pattern: String,
        #[source]
        source: walkdir::Error,
    },

    /// A path below the pattern root cannot be represented as UTF-8.
    #[error("glob {pattern:?} found a path that is not valid UTF-8: {}", .path.display())]
    NonUtf8 { pattern: String, path: PathBuf },
}

/// Fatal errors of a run.
#[derive(Error, Debug)]
pub enum Error {
    /// A required configuration value is missing or blank.
    #[error("configuration error: {0}")]
    Config(String),

    /// The access blob could not be parsed.
    #[error("unable to parse access: {0}")]
    Credential(String),

    /// The storage project could not be opened.
    #[error("unable to open project: {0}")]
    Session(String),

    /// The include or an exclude pattern failed to evaluate.
    #[error("unable to build matches file list: {0}")]
    Glob(#[from] GlobError),

    #[error("problem opening file {}: {source}", .path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to read file {}: {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to create upload for {bucket}/{key}: {source}")]
    UploadBegin {
        bucket: String,
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("unable to upload file to {bucket}/{key}: {source}")]
    UploadWrite {
        bucket: String,
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("unable to commit upload of {bucket}/{key}: {source}")]
    UploadCommit {
        bucket: String,
        key: String,
        #[source]
        source: StorageError,
    },
}
