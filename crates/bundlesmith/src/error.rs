//! Typed errors for the contracts between the core and its collaborators

use std::path::PathBuf;

use thiserror::Error;

/// Misuse of the segment bookkeeping of a [`crate::writer::SegmentWriter`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WriterError {
    #[error("cannot start segment for '{requested}': segment for '{open}' is still open")]
    SegmentAlreadyOpen { open: String, requested: String },

    #[error("cannot end segment: no segment is open")]
    NoOpenSegment,
}

impl WriterError {
    /// Every writer error is an illegal-state violation of the segment protocol
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Self::SegmentAlreadyOpen { .. } | Self::NoOpenSegment)
    }
}

/// Failures reported by a [`crate::pool::ModulePool`]
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("resource not found: {name}")]
    NotFound { name: String },

    #[error("failed to read resource '{name}' from {}", .path.display())]
    Io {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PoolError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
