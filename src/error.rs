use thiserror::Error;

/// Errors returned by the clustering engines and their input helpers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusterError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("model not fitted, call fit() first")]
    NotFitted,
}

pub type Result<T> = std::result::Result<T, ClusterError>;

impl ClusterError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ClusterError::InvalidParameter(msg.into())
    }
}
