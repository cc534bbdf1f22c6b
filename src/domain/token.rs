//! Token pair and refresh record.

use chrono::{DateTime, Utc};

/// Artifacts handed back to the caller after a successful issuance.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    /// Signed access token (JWT).
    pub access_token: String,
    /// Opaque refresh token, base64 encoded.
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish_non_exhaustive()
    }
}

/// Refresh token currently stored for a principal.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshRecord {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl RefreshRecord {
    /// Whether the record is still usable at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

impl std::fmt::Debug for RefreshRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshRecord")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_record_expiry_is_strict() {
        let now = Utc::now();
        let record = RefreshRecord {
            token: "token".into(),
            expires_at: now,
        };

        assert!(!record.is_live(now));
        assert!(record.is_live(now - TimeDelta::seconds(1)));
    }

    #[test]
    fn test_debug_hides_tokens() {
        let record = RefreshRecord {
            token: "very-secret".into(),
            expires_at: Utc::now(),
        };
        assert!(!format!("{record:?}").contains("very-secret"));
    }
}
