use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl DatabaseError {
    /// Mirrors the Go `errors.NotFoundCode` check used by `ignoreNotFound`:
    /// a row genuinely absent from the table, as opposed to a connection or
    /// constraint failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DatabaseError::NotFound(_) | DatabaseError::Sqlx(sqlx::Error::RowNotFound)
        )
    }
}
