//! Error taxonomy of a bootstrap run.
//!
//! Fatal conditions are [`BootstrapError`] values, usually wrapped in an
//! [`anyhow::Error`] with added context; they can be recovered with
//! `anyhow::Error::downcast_ref`. Recoverable conditions (samples or
//! thresholds that cannot be satisfied) are not errors but
//! [`BootstrapWarning`](crate::data_structs::BootstrapWarning)s.

use std::path::PathBuf;

use thiserror::Error;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Malformed input table. Aborts before any resampling.
    #[error("schema error: {0}")]
    Schema(String),

    /// No rows for a requested genotype. Fatal for that arm only.
    #[error("no observations found for genotype '{genotype}'")]
    EmptyInput { genotype: String },

    /// Persisting one grouping variable's output failed after all retries.
    #[error("failed to write '{variable}' output to {}: {source}", path.display())]
    Write {
        variable: String,
        path:     PathBuf,
        #[source]
        source:   BoxedError,
    },

    /// Rejected configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The random draw could not be performed.
    #[error("sampling failed: {0}")]
    Sampling(String),
}

impl BootstrapError {
    pub fn schema<S: Into<String>>(message: S) -> Self {
        Self::Schema(message.into())
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }
}
