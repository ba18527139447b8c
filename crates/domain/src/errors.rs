use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid order record: {0}")]
    InvalidRecord(String),

    #[error("Unknown order field: {0}")]
    UnknownField(String),
}
