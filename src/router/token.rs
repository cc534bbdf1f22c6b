//! Exchange an access token and its refresh token for a new pair.

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::AppState;
use crate::application::dto::RefreshRequestDto;
use crate::application::usecases::TOKEN_TYPE;
use crate::error::Result;
use crate::router::Valid;

fn validate_grant_type(grant_type: &str) -> std::result::Result<(), ValidationError> {
    // OAuth 2.0 refresh requests must carry `grant_type=refresh_token`.
    if grant_type != "refresh_token" {
        return Err(ValidationError::new("invalid_grant_type"));
    }

    Ok(())
}

#[derive(Validate, Deserialize)]
pub struct Body {
    #[validate(custom(
        function = "validate_grant_type",
        message = "\"grant_type\" must be \"refresh_token\"."
    ))]
    grant_type: String,
    #[validate(length(min = 1, message = "\"access_token\" is required."))]
    access_token: String,
    #[validate(length(min = 1, message = "\"refresh_token\" is required."))]
    refresh_token: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub token_type: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<Response>> {
    let pair = state
        .refresh
        .execute(RefreshRequestDto {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
        })
        .await?;

    Ok(Json(Response {
        token_type: TOKEN_TYPE.to_owned(),
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        expires_in: state.config.token.access_lifetime_secs,
        access_token_expires_at: pair.access_expires_at,
        refresh_token_expires_at: pair.refresh_expires_at,
    }))
}
