use ordering::ReorderError;
use thiserror::Error;
use tonic::Status;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    PreconditionFailed(String),
    #[error("{0}")]
    Forbidden(String),
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
    #[error(transparent)]
    Pool(#[from] r2d2::Error),
}

impl ServiceError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ServiceError::BadRequest(message.into())
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        ServiceError::PreconditionFailed(message.into())
    }
}

impl From<ReorderError<String>> for ServiceError {
    fn from(err: ReorderError<String>) -> Self {
        match err {
            ReorderError::NotFound(_) => ServiceError::NotFound("Entity"),
            ReorderError::NegativePosition(position) => {
                ServiceError::BadRequest(format!("position {position} is negative"))
            }
            ReorderError::InvalidSequence => ServiceError::bad_request("invalid column ids"),
        }
    }
}

impl From<ServiceError> for Status {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(_) => Status::not_found(err.to_string()),
            ServiceError::BadRequest(message) => Status::invalid_argument(message),
            ServiceError::PreconditionFailed(message) => Status::failed_precondition(message),
            ServiceError::Forbidden(message) => Status::permission_denied(message),
            ServiceError::Database(diesel::result::Error::NotFound) => Status::not_found("Entity not found"),
            ServiceError::Database(err) => {
                error!(error = %err, "database error");
                Status::internal("Internal server error")
            }
            ServiceError::Pool(err) => {
                error!(error = %err, "connection pool error");
                Status::unavailable("Database is unavailable")
            }
        }
    }
}
