use std::path::PathBuf;

use thiserror::Error;

/// Error taxonomy for the engine. Every public function in this crate
/// returns `Result<T, GitError>`; the CLI is responsible for mapping these
/// to exit codes and human messages.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("not a repository (or any parent up to root)")]
    NotARepository,

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("corrupted object {0}")]
    Corrupted(String),

    #[error("invalid ref {0}")]
    InvalidRef(String),

    #[error("working tree has uncommitted changes: {0:?}")]
    DirtyWorkingTree(Vec<String>),

    #[error("merge conflict in: {0:?}")]
    MergeConflict(Vec<String>),

    #[error("refusing to merge unrelated histories")]
    UnrelatedHistories,

    #[error("branch already exists: {0}")]
    BranchAlreadyExists(String),

    #[error("branch is currently checked out: {0}")]
    BranchInUse(String),

    #[error("ancestry walk exceeded depth limit")]
    TooDeep,

    #[error("i/o error at {path:?}: {source}")]
    Io {
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },
}

impl GitError {
    pub fn io(source: std::io::Error) -> Self {
        GitError::Io { path: None, source }
    }

    pub fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GitError::Io {
            path: Some(path.into()),
            source,
        }
    }
}

impl From<std::io::Error> for GitError {
    fn from(source: std::io::Error) -> Self {
        GitError::io(source)
    }
}

pub type Result<T> = std::result::Result<T, GitError>;
