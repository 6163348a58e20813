//! Error taxonomy shared by the issuance and authorization pipelines.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to whoever drives issuance or a scanning session.
///
/// The authorization engine never produces these; they originate in the
/// collaborators around it (stores, sinks, frame sources, renderers).
#[derive(Debug, Error)]
pub enum Error {
    /// The caller supplied input that cannot be turned into a token.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// What was wrong with the input.
        reason: String,
    },

    /// A backing medium could not be read or written.
    #[error("{store} unavailable at {}: {source}", path.display())]
    StorageUnavailable {
        /// Which store failed (registry, attendance log, ...).
        store: &'static str,
        /// The path that was being accessed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// The frame source could not produce a frame.
    #[error("frame acquisition failed: {reason}")]
    FrameAcquisition {
        /// Source-specific description.
        reason: String,
    },

    /// The scannable code image could not be produced.
    #[error("artifact rendering failed: {reason}")]
    ArtifactRender {
        /// Renderer-specific description.
        reason: String,
    },

    /// Every generated id collided with one already in the registry.
    #[error("no unused id found after {attempts} attempts")]
    IdCollision {
        /// Number of ids drawn.
        attempts: u32,
    },

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn storage(store: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::StorageUnavailable {
            store,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn frame(reason: impl Into<String>) -> Self {
        Self::FrameAcquisition {
            reason: reason.into(),
        }
    }

    /// Whether the caller may reasonably retry the failed operation.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::FrameAcquisition { .. } | Self::IdCollision { .. })
    }
}
