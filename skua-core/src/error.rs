//! Errors in the library.
use thiserror::Error;

/// Errors raised by the training core.
///
/// Configuration errors are raised before any environment interaction;
/// [`SkuaError::EmptyBuffer`] signals a caller ordering bug. Nothing in
/// this taxonomy is retried.
#[derive(Debug, Error)]
pub enum SkuaError {
    /// The environment declares an action space no trainer can drive.
    #[error("unsupported action space: {0}")]
    UnsupportedActionSpace(String),

    /// A batch was requested from a replay buffer before any transition
    /// was stored.
    #[error("replay buffer sampled before any transition was stored")]
    EmptyBuffer,

    /// A hyper-parameter is outside its valid range.
    #[error("invalid configuration: {name} = {value}")]
    InvalidConfig {
        /// Name of the offending parameter.
        name: &'static str,
        /// The rejected value, formatted for display.
        value: String,
    },
}

impl SkuaError {
    /// Shorthand for an [`SkuaError::InvalidConfig`] with a displayable value.
    pub fn invalid_config(name: &'static str, value: impl ToString) -> Self {
        Self::InvalidConfig {
            name,
            value: value.to_string(),
        }
    }
}
