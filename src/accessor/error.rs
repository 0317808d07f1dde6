use thiserror::Error;

#[derive(Error, Debug)]
pub enum AccessorError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Invalid context: {0}")]
    InvalidContext(String),

    #[error("Invalid email pattern: {0}")]
    Pattern(#[from] regex::Error),
}
