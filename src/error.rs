use std::path::PathBuf;

use thiserror::Error;

/// Error taxonomy for the store.
///
/// `NotFound` is deliberately absent: a [`crate::value::Value::Foreign`]
/// lookup against a missing id is not an error, it resolves to `None`
/// (see `column.rs`).
#[derive(Error, Debug)]
pub enum Error {
    /// Declared schema is inconsistent: duplicate column name, a foreign
    /// target that never got registered, an index over a column that
    /// cannot be ordered. Fatal at `connect`/`register_table` time.
    #[error("schema error: {0}")]
    Schema(String),

    /// A bounded column (`Bytes(N)`/`String(N)`/`Pickle(N)`) was set with a
    /// payload larger than its declared capacity. No state is changed.
    #[error("value too large: capacity is {capacity} bytes, got {got}")]
    ValueTooLarge {
        /// Declared inline capacity.
        capacity: u32,
        /// Size of the rejected payload.
        got: u32,
    },

    /// A `Pickle`/`PickleBlob` column received a value that failed its
    /// declared type check.
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Human-readable description of what was expected.
        expected: &'static str,
        /// Human-readable description of what was supplied.
        got: &'static str,
    },

    /// A file or directory operation failed.
    #[error("io error at {path}: {source}")]
    Io {
        /// Path the operation was attempted against.
        path: PathBuf,
        /// Underlying cause.
        #[source]
        source: std::io::Error,
    },

    /// Migration (shadow-table construction or column copy) failed. Fatal
    /// at connect time.
    #[error("migration error: {0}")]
    Migration(String),
}

impl Error {
    /// Tag an [`std::io::Error`] with the path it happened against.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
