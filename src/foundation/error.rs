use std::path::PathBuf;

/// Convenience result alias used throughout montage.
pub type MontageResult<T> = Result<T, MontageError>;

/// Error taxonomy shared by clips, fifos, mixers, writers and the renderer.
#[derive(thiserror::Error, Debug)]
pub enum MontageError {
    /// A reader could not open its source. The owning clip becomes permanently failed.
    #[error("media open error for '{}': {reason}", path.display())]
    MediaOpen {
        /// Source that failed to open.
        path: PathBuf,
        /// Human readable cause.
        reason: String,
    },

    /// A fifo push did not fit; nothing was written.
    #[error("fifo overflow: requested {requested} units, {free} free")]
    Overflow {
        /// Units the producer tried to push.
        requested: usize,
        /// Free units at the time of the push.
        free: usize,
    },

    /// A consumer asked for more than was buffered.
    #[error("fifo underrun: requested {requested} units, {available} available")]
    Underrun {
        /// Units the consumer asked for.
        requested: usize,
        /// Units that were actually buffered.
        available: usize,
    },

    /// The renderer was started without its required settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Disk or encoder failure while writing output.
    #[error("writer i/o error: {0}")]
    WriterIo(String),

    #[error("validation error: {0}")]
    /// Invalid argument or timeline edit.
    Validation(String),

    /// Inserting a clip would make a composition contain itself.
    #[error("composition cycle detected: {0}")]
    CycleDetected(String),

    /// Processor creation or state restore failed.
    #[error("plugin error: {0}")]
    Plugin(String),

    /// State (de)serialization failed.
    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    /// Anything else, with its source chain preserved.
    Other(#[from] anyhow::Error),
}

impl MontageError {
    /// Build a [`MontageError::MediaOpen`].
    pub fn media_open(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MediaOpen {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Build a [`MontageError::Configuration`].
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Build a [`MontageError::WriterIo`].
    pub fn writer_io(msg: impl Into<String>) -> Self {
        Self::WriterIo(msg.into())
    }

    /// Build a [`MontageError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`MontageError::CycleDetected`].
    pub fn cycle(msg: impl Into<String>) -> Self {
        Self::CycleDetected(msg.into())
    }

    /// Build a [`MontageError::Plugin`].
    pub fn plugin(msg: impl Into<String>) -> Self {
        Self::Plugin(msg.into())
    }

    /// Build a [`MontageError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// `true` for fifo back-pressure conditions, which callers log and recover from.
    pub fn is_fifo_condition(&self) -> bool {
        matches!(self, Self::Overflow { .. } | Self::Underrun { .. })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
