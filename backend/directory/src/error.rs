use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("{0} already exists")]
    Duplicate(String),
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Maps a unique-constraint violation onto [`DirectoryError::Duplicate`].
pub(crate) fn unique_violation(error: sqlx::Error, what: &str) -> DirectoryError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            DirectoryError::Duplicate(what.to_string())
        }
        _ => DirectoryError::Database(error),
    }
}
