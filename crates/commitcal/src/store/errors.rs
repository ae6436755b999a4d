use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the commit cache.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Repository not found: {context}")]
    NotFound { context: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl StoreError {
    pub fn not_found_by_id(id: Uuid) -> Self {
        Self::NotFound {
            context: format!("id={}", id),
        }
    }

    pub fn not_found_by_key(user_id: &str, owner: &str, name: &str) -> Self {
        Self::NotFound {
            context: format!("{}:{}/{}", user_id, owner, name),
        }
    }

    /// Whether retrying the same statement may succeed (locks, busy, dropped connections).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(db_err) => is_retryable_db_error(db_err),
            _ => false,
        }
    }
}

pub(crate) fn is_retryable_db_error(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(_) | DbErr::Query(_) => {
            let err_str = err.to_string().to_lowercase();
            // SQLite: database is locked, busy
            // General: timeout, connection reset
            err_str.contains("locked")
                || err_str.contains("busy")
                || err_str.contains("timeout")
                || err_str.contains("connection")
                || err_str.contains("temporarily unavailable")
        }
        _ => false,
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
