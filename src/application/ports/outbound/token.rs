//! Interface for access token signing and verification.

use chrono::{DateTime, Utc};

use crate::application::error::{ApplicationError, Result};
use crate::domain::claims::ClaimSet;

/// Claims recovered from a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    /// Principal identifier, as written in the token.
    pub subject: Option<String>,
    pub name: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of token verification.
///
/// The cause of an [`TokenValidation::Invalid`] outcome is deliberately not
/// carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValidation {
    Valid(VerifiedClaims),
    Invalid,
}

impl TokenValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn into_claims(self) -> Option<VerifiedClaims> {
        match self {
            Self::Valid(claims) => Some(claims),
            Self::Invalid => None,
        }
    }

    /// Claims of a valid token, [`ApplicationError::InvalidToken`]
    /// otherwise.
    pub fn require(self) -> Result<VerifiedClaims> {
        self.into_claims().ok_or(ApplicationError::InvalidToken)
    }
}

/// Port for access token signing.
pub trait TokenSigner: Send + Sync {
    /// Sign a claim set into a compact token.
    fn sign(
        &self,
        claims: &ClaimSet,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String>;
}

/// Port for access token verification.
pub trait TokenVerifier: Send + Sync {
    /// Check signature and algorithm, ignoring `exp`.
    ///
    /// Only meant to extract the identity of a refresh request.
    fn validate_ignoring_expiry(&self, token: &str) -> TokenValidation;

    /// Check signature, algorithm and that `now` is before `exp`.
    fn validate(&self, token: &str, now: DateTime<Utc>) -> TokenValidation;
}
