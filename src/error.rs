use thiserror::Error;

pub type Result<T> = std::result::Result<T, QuiverError>;

#[derive(Debug, Error)]
pub enum QuiverError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("execution error: {0}")]
    Execution(String),
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(&'static str),
}

impl QuiverError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        QuiverError::InvalidQuery(msg.into())
    }

    pub(crate) fn execution(msg: impl Into<String>) -> Self {
        QuiverError::Execution(msg.into())
    }
}
