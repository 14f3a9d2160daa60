pub mod models;
pub mod notify;
pub mod payment;
pub mod report;
pub mod repository;
pub mod storage;

pub use models::{Artifacts, DownloadToken, Order, OrderStatus, Plan};
pub use repository::{OrderRepository, RepoError, StatusPatch};

/// Boxed error used at the leaf-service boundaries (generator, store,
/// notifier). Failures crossing these seams are opaque to the caller.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("dependency failure: {0}")]
    Dependency(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RepoError> for CoreError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(_) => CoreError::NotFound,
            RepoError::Conflict { expected, found } => {
                CoreError::Conflict(format!("expected status {expected}, found {found}"))
            }
            RepoError::InvalidState(msg) => CoreError::InvalidState(msg),
            RepoError::Storage(msg) => CoreError::Internal(msg),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
