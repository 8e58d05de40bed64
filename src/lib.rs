//! `gitpool` - a distributed mutual-exclusion lock pool coordinated over a git branch.
//!
//! Clients ("jobs") claim named locks from a shared pool so that no two jobs hold the
//! same lock simultaneously. The authoritative state of the pool lives in the content of
//! a branch in a remote git repository; coordination between concurrent, geographically
//! distributed clients is achieved by turning git's atomic branch-update contract into a
//! compare-and-swap primitive.
//!
//! The crate is organized the way the core decomposes:
//! - [`backend`] mutates a local working copy and publishes it.
//! - [`retry`] wraps a Backend operation sequence in an optimistic-concurrency loop.
//! - [`orchestrator`] realises `acquire`/`add`/`release`/`remove` on top of the above.
//! - [`poller`] answers "what changed since version V" for a pool sub-path.

use std::path::PathBuf;

use thiserror::Error;

pub mod backend;
pub mod config;
pub mod orchestrator;
pub mod poller;
pub mod retry;

pub use backend::Backend;
pub use config::{Params, SourceConfig, Version};
pub use retry::retry;

/// Error types for pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Clone or committer-identity configuration failed. Terminal.
    #[error("failed to set up working copy: {0}")]
    SetupFailed(String),

    /// Fetch or hard-reset of the working copy failed. Retried as unexpected.
    #[error("failed to reset working copy: {0}")]
    ResetFailed(String),

    /// An operation referenced a lock that was not present where expected. Terminal.
    #[error("lock not found: {0}")]
    LockMissing(String),

    /// Publish-time compare-and-swap failure. Expected; silently retried.
    #[error("publish conflict, remote tip has moved")]
    Conflict,

    /// Any other publish failure (network, auth). Unexpected; logged and retried.
    #[error("failed to publish: {0}")]
    PublishFailed(String),

    /// `acquire` found no unclaimed locks. Terminal, not retried.
    #[error("no locks available in pool")]
    NoLocksAvailable,

    /// Malformed caller input (missing `source`/`params` fields, bad JSON, etc). Terminal.
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// I/O error underlying any of the above.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the underlying repository-object layer.
    #[error("git error: {0}")]
    Gix(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Convenience result alias.
pub type PoolResult<T> = Result<T, PoolError>;

impl From<gix::open::Error> for PoolError {
    fn from(e: gix::open::Error) -> Self {
        PoolError::Gix(Box::new(e))
    }
}

impl From<gix::discover::Error> for PoolError {
    fn from(e: gix::discover::Error) -> Self {
        PoolError::Gix(Box::new(e))
    }
}

impl From<gix::clone::Error> for PoolError {
    fn from(e: gix::clone::Error) -> Self {
        PoolError::SetupFailed(e.to_string())
    }
}

/// Strong-typed repository wrapper with cheap cloning.
///
/// Wraps a single `gix::Repository` instance. Cloning this handle creates a new
/// repository instance that shares underlying data structures (refs, objects) but has
/// independent thread-local buffers, making it `Send`-safe across `spawn_blocking` calls.
#[derive(Debug, Clone)]
pub struct RepoHandle {
    inner: gix::Repository,
}

impl RepoHandle {
    #[inline]
    pub fn new(inner: gix::Repository) -> Self {
        Self { inner }
    }

    #[inline]
    pub fn raw(&self) -> &gix::Repository {
        &self.inner
    }

    #[inline]
    pub fn clone_inner(&self) -> gix::Repository {
        self.inner.clone()
    }

    #[inline]
    pub fn workdir(&self) -> PoolResult<PathBuf> {
        self.inner
            .workdir()
            .map(PathBuf::from)
            .ok_or_else(|| PoolError::SetupFailed("working copy has no worktree".to_string()))
    }
}
