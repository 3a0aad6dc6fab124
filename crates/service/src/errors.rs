use common::InitError;
use models::errors::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    /// The shared resource handle could not be created.
    #[error("{0}")]
    Unavailable(#[from] InitError),
    #[error("{0}")]
    Db(String),
    #[error("{0}")]
    Storage(String),
}

impl From<ModelError> for ServiceError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Validation(msg) => Self::Validation(msg),
            ModelError::Db(msg) => Self::Db(msg),
        }
    }
}

impl From<object_store::Error> for ServiceError {
    fn from(e: object_store::Error) -> Self {
        Self::Storage(e.to_string())
    }
}
