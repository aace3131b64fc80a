use thiserror::Error;

/// Failures surfaced by attention construction and forward passes.
#[derive(Debug, Error)]
pub enum AttentionError {
    /// Rejected at construction time, before any tensor exists.
    #[error("invalid attention config: {reason}")]
    InvalidConfig { reason: String },

    /// An input tensor does not match the documented layout.
    #[error("invalid shape in {context}: {details}")]
    InvalidShape { context: String, details: String },

    /// Propagated from the tensor backend.
    #[error(transparent)]
    Tensor(#[from] candle_core::Error),
}

impl AttentionError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub fn invalid_shape(context: impl Into<String>, details: impl Into<String>) -> Self {
        Self::InvalidShape {
            context: context.into(),
            details: details.into(),
        }
    }
}
