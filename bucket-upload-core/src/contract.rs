//! # contract: the seams between upload logic and the outside world
//!
//! The core never touches a storage SDK or a glob library directly. It talks
//! to three small traits instead:
//!
//! - [`GlobEvaluator`]: turns a glob pattern into the list of paths it matches.
//! - [`StorageSession`]: an authenticated project handle that can start uploads.
//! - [`UploadHandle`]: one in-flight object upload, committed or aborted exactly once.
//!
//! ## Mocking & Testing
//! All traits are annotated for `mockall`; the generated `Mock*` types are
//! exported with the default `test-export-mocks` feature so integration tests
//! (and dependent crates) can drive the upload pipeline without a network.

use async_trait::async_trait;

use crate::error::GlobError;

/// Error returned across the storage seam. Implementors box whatever their
/// SDK produces.
pub type StorageError = Box<dyn std::error::Error + Send + Sync>;

/// Evaluates a glob pattern against a filesystem.
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
pub trait GlobEvaluator {
    /// Return every path matching `pattern`. The order is whatever the
    /// evaluator produces; callers must not re-sort it.
    fn glob(&self, pattern: &str) -> Result<Vec<String>, GlobError>;
}

/// An authenticated storage project, owned by the entrypoint for the
/// lifetime of a run.
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
#[async_trait]
pub trait StorageSession: Send + Sync {
    /// Start a new upload of `key` into `bucket`. No metadata is attached.
    async fn begin_upload(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Box<dyn UploadHandle>, StorageError>;

    /// Release the session. Called once, on every exit path of a run.
    async fn close(&self);
}

/// A single object upload stream.
///
/// Bytes passed to [`write`](UploadHandle::write) only become visible once
/// [`commit`](UploadHandle::commit) succeeds. [`abort`](UploadHandle::abort)
/// discards any partial state on the storage side.
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
#[async_trait]
pub trait UploadHandle: Send {
    /// Append `bytes` to the object, returning how many were accepted.
    async fn write(&mut self, bytes: &[u8]) -> Result<usize, StorageError>;

    /// Finish the upload and make the object visible.
    async fn commit(&mut self) -> Result<(), StorageError>;

    /// Discard the upload. Failures are logged by the implementor, not returned.
    async fn abort(&mut self);
}
