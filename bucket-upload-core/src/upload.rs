//! Upload driver: streams resolved files into a [`StorageSession`].
//!
//! # Responsibilities
//! - Resolve the include/exclude patterns of an [`UploadConfig`] into a match list
//! - Upload every match in order, one at a time, under `target` joined with the match path
//! - Skip (without failing) matches that vanished or are directories
//! - Stop at the first fatal error; nothing after it is attempted
//!
//! # Chunking
//! Files are read in [`BUFFER_SIZE`] chunks into one reusable buffer and
//! every chunk is written with its actual length. Buffering into larger
//! storage parts is the session's concern.
//!
//! # Error Handling
//! Errors are returned, never turned into process exits here. An upload
//! stream that fails mid-way is aborted before its error is returned.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info};

use crate::config::UploadConfig;
use crate::contract::{GlobEvaluator, StorageSession, UploadHandle};
use crate::error::Error;
use crate::resolve::resolve;

/// Size of each read from a source file.
pub const BUFFER_SIZE: usize = 1024;

/// Why a match was passed over without uploading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// The path could not be stat'ed, e.g. it was removed after resolution.
    Missing,
    /// The path is a directory.
    Directory,
}

/// What happened to a single match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UploadOutcome {
    Uploaded { path: String, key: String, bytes: u64 },
    DryRun { path: String, key: String },
    Skipped { path: String, reason: SkipReason },
}

/// Per-match outcomes of a run, in match order.
#[derive(Debug, Default, Clone, Serialize)]
pub struct UploadReport {
    pub outcomes: Vec<UploadOutcome>,
}

impl UploadReport {
    pub fn uploaded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, UploadOutcome::Uploaded { .. }))
            .count()
    }

    pub fn dry_run(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, UploadOutcome::DryRun { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, UploadOutcome::Skipped { .. }))
            .count()
    }

    /// Total bytes written to storage.
    pub fn bytes(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|o| match o {
                UploadOutcome::Uploaded { bytes, .. } => *bytes,
                _ => 0,
            })
            .sum()
    }
}

/// Join `target` and `path` into an object key.
///
/// Behaves like a lexical path join followed by cleaning: empty and `.`
/// segments are dropped, `..` removes the previous segment, a leading root
/// is dropped and the result is `/`-separated.
pub fn object_key(target: &str, path: &str) -> String {
    let mut segments: Vec<String> = Vec::new();
    for component in Path::new(target).components().chain(Path::new(path).components()) {
        match component {
            Component::Normal(segment) => segments.push(segment.to_string_lossy().into_owned()),
            Component::ParentDir => {
                segments.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    segments.join("/")
}

/// Resolve the configured patterns and upload every match.
///
/// Matches are processed strictly in resolution order. The first fatal
/// error is returned immediately and later matches are never touched.
pub async fn upload_all<G, S>(
    config: &UploadConfig,
    glob: &G,
    session: &S,
) -> Result<UploadReport, Error>
where
    G: GlobEvaluator + ?Sized,
    S: StorageSession + ?Sized,
{
    let matches = resolve(glob, &config.source, &config.exclude).map_err(|e| {
        error!(error = %e, source = %config.source, "unable to build matches file list");
        Error::from(e)
    })?;
    info!(matches = matches.len(), source = %config.source, "Resolved files to upload");

    let mut report = UploadReport::default();
    for path in &matches {
        let outcome = upload_file(path, config, session).await?;
        debug!(?outcome, "Processed match");
        report.outcomes.push(outcome);
    }

    info!(
        uploaded = report.uploaded(),
        dry_run = report.dry_run(),
        skipped = report.skipped(),
        bytes = report.bytes(),
        "Upload run complete"
    );
    Ok(report)
}

/// Upload a single match.
///
/// Returns `Skipped` when the path cannot be stat'ed or is a directory. The
/// file is opened even in dry-run mode, so an unreadable file fails a dry run
/// the same way it would fail a real one.
pub async fn upload_file<S>(
    path: &str,
    config: &UploadConfig,
    session: &S,
) -> Result<UploadOutcome, Error>
where
    S: StorageSession + ?Sized,
{
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) => {
            debug!(file = path, error = %e, "Skipping match that cannot be stat'ed");
            return Ok(UploadOutcome::Skipped {
                path: path.to_string(),
                reason: SkipReason::Missing,
            });
        }
    };
    if metadata.is_dir() {
        debug!(file = path, "Skipping directory");
        return Ok(UploadOutcome::Skipped {
            path: path.to_string(),
            reason: SkipReason::Directory,
        });
    }

    let key = object_key(&config.target, path);
    info!(file = path, bucket = %config.bucket, key = %key, "uploading file");

    let mut file = File::open(path).await.map_err(|source| {
        error!(file = path, error = %source, "problem opening file");
        Error::FileOpen {
            path: PathBuf::from(path),
            source,
        }
    })?;

    if config.dry_run {
        info!(file = path, "skipping file upload... dry run enabled");
        return Ok(UploadOutcome::DryRun {
            path: path.to_string(),
            key,
        });
    }

    let mut upload = session
        .begin_upload(&config.bucket, &key)
        .await
        .map_err(|source| {
            error!(bucket = %config.bucket, key = %key, error = %source, "unable to create upload");
            Error::UploadBegin {
                bucket: config.bucket.clone(),
                key: key.clone(),
                source,
            }
        })?;

    let bytes = match copy_chunks(&mut file, upload.as_mut(), path, &config.bucket, &key).await {
        Ok(bytes) => bytes,
        Err(e) => {
            upload.abort().await;
            return Err(e);
        }
    };

    upload.commit().await.map_err(|source| {
        error!(bucket = %config.bucket, key = %key, error = %source, "unable to commit upload");
        Error::UploadCommit {
            bucket: config.bucket.clone(),
            key: key.clone(),
            source,
        }
    })?;

    info!(file = path, key = %key, bytes, "Uploaded file");
    Ok(UploadOutcome::Uploaded {
        path: path.to_string(),
        key,
        bytes,
    })
}

async fn copy_chunks(
    file: &mut File,
    upload: &mut dyn UploadHandle,
    path: &str,
    bucket: &str,
    key: &str,
) -> Result<u64, Error> {
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut total: u64 = 0;
    loop {
        let read = match file.read(&mut buffer).await {
            Ok(0) => return Ok(total),
            Ok(read) => read,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(source) => {
                error!(file = path, error = %source, "unable to read file");
                return Err(Error::FileRead {
                    path: PathBuf::from(path),
                    source,
                });
            }
        };

        let mut chunk = &buffer[..read];
        while !chunk.is_empty() {
            let written = upload.write(chunk).await.map_err(|source| {
                error!(bucket, key, error = %source, "unable to upload file");
                Error::UploadWrite {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    source,
                }
            })?;
            if written == 0 {
                error!(bucket, key, "upload stream accepted no bytes");
                return Err(Error::UploadWrite {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    source: "upload stream accepted no bytes".into(),
                });
            }
            chunk = &chunk[written.min(chunk.len())..];
        }
        total += read as u64;
    }
}
