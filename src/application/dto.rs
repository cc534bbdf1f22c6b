//! Data Transfer Objects for the application layer.

/// Request DTO for token refresh.
#[derive(Clone)]
pub struct RefreshRequestDto {
    /// Access token previously issued, possibly expired.
    pub access_token: String,
    /// Refresh token issued alongside it.
    pub refresh_token: String,
}

impl std::fmt::Debug for RefreshRequestDto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshRequestDto").finish_non_exhaustive()
    }
}
