use miette::Diagnostic;
use thiserror::Error;

/// Failures while exporting an object to a snapshot. Only plain data
/// properties with primitive values are portable.
#[derive(Debug, Error, Diagnostic)]
pub enum SnapshotError {
    #[error("property '{key}' holds a value that cannot be snapshotted")]
    UnsupportedValue { key: String },

    #[error("accessor property '{key}' cannot be snapshotted")]
    AccessorProperty { key: String },

    #[error("symbol-keyed properties cannot be snapshotted")]
    SymbolKey,
}
