use platform_db::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("employee {id} already exists")]
    AlreadyExists { id: String },
    #[error("employee {id} not found")]
    NotFound { id: String },
    #[error("employee {id} cannot be re-keyed to {requested}")]
    IdentityChange { id: String, requested: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DirectoryError {
    pub(crate) fn not_found(id: &str) -> Self {
        Self::NotFound { id: id.to_string() }
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;
