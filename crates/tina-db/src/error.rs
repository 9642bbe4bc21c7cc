use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("No {table} record with id {id}")]
    RecordNotFound { table: &'static str, id: String },

    #[error("Could not resolve data directory")]
    NoDataDir,
}

impl DbError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::RecordNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
