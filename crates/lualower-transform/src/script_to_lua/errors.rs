use lualower_core::Pos;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Scope stack underflow")]
    ScopeUnderflow,

    #[error("Missing symbol resolution for {0}")]
    MissingResolution(String),

    #[error("'super' referenced outside of a class body at {0}")]
    SuperOutsideClass(Pos),

    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("Invalid assignment target: {0}")]
    InvalidAssignmentTarget(String),

    #[error("Multiple errors occurred: {0:?}")]
    Multiple(Vec<TransformError>),
}

impl From<lualower_core::AstError> for TransformError {
    fn from(err: lualower_core::AstError) -> Self {
        TransformError::InvalidAssignmentTarget(err.to_string())
    }
}
