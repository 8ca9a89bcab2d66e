mod runtime_error;
mod snapshot_error;

pub use runtime_error::RuntimeError;
pub use snapshot_error::SnapshotError;

use miette::Diagnostic;
use thiserror::Error;

/// Unified error type wrapping all scriptable errors.
#[derive(Debug, Error, Diagnostic)]
pub enum ScriptableError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Snapshot(#[from] SnapshotError),
}
