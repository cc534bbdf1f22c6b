//! Custom error handler for domain (core).

pub type Result<T> = std::result::Result<T, DomainError>;

/// Enum representing custom domain errors.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("id must be between 1 and 128 printable bytes")]
    InvalidIdFormat,
    #[error("principal is missing required field `{field}`")]
    InvalidPrincipal { field: &'static str },

    #[error("signing key is {length} bytes long while {minimum} are required")]
    WeakKey { length: usize, minimum: usize },
}
