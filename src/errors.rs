use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParishError {
    #[error("Upstream error: table '{table}' returned status {status}")]
    Upstream { table: String, status: u16 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
