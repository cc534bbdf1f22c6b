//! Application-level errors.

use crate::domain::error::DomainError;

pub type Result<T> = std::result::Result<T, ApplicationError>;

/// Errors that can occur in the application layer.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationError {
    #[error("signing key is {length} bytes long while {minimum} are required")]
    WeakKey { length: usize, minimum: usize },
    #[error("missing signing key")]
    MissingKey,
    #[error("`token.{field}` must be between 1 and {maximum} seconds")]
    InvalidLifetime { field: &'static str, maximum: i64 },

    #[error("principal data integrity fault on `{field}`")]
    InvalidPrincipal { field: &'static str },

    #[error("dependency unavailable")]
    DependencyUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid token")]
    InvalidToken,
    #[error("refresh denied")]
    RefreshDenied,

    #[error("internal server error")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl ApplicationError {
    pub fn internal<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal(Box::new(err))
    }

    pub fn unavailable<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::DependencyUnavailable(Box::new(err))
    }

    /// Whether the error should be reported to callers as an opaque
    /// rejection.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::InvalidToken | Self::RefreshDenied)
    }
}

impl From<DomainError> for ApplicationError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::WeakKey { length, minimum } => {
                Self::WeakKey { length, minimum }
            },
            DomainError::InvalidPrincipal { field } => {
                Self::InvalidPrincipal { field }
            },
            DomainError::InvalidIdFormat => {
                Self::InvalidPrincipal { field: "id" }
            },
        }
    }
}

/// Map errors into [`ApplicationError::Internal`].
pub trait ToInternal<T> {
    fn catch(self) -> Result<T>;
}

impl<T, E> ToInternal<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn catch(self) -> Result<T> {
        self.map_err(ApplicationError::internal)
    }
}

/// Map storage errors into [`ApplicationError::DependencyUnavailable`].
pub trait ToUnavailable<T> {
    fn unavailable(self) -> Result<T>;
}

impl<T, E> ToUnavailable<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn unavailable(self) -> Result<T> {
        self.map_err(ApplicationError::unavailable)
    }
}
