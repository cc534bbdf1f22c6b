//! Error handler for passage.

use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::application::error::ApplicationError;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Seconds clients should wait before retrying after a 503.
pub const RETRY_AFTER_SECS: u64 = 5;

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Axum(#[from] JsonRejection),

    #[error(transparent)]
    Application(#[from] ApplicationError),
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    r#type: Option<String>,
    title: String,
    status: u16,
    detail: String,
    errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code.as_u16();
        self
    }

    /// Update `title` field.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    /// Add detailed error.
    pub fn details(mut self, description: &str) -> Self {
        self.detail = description.into();
        self
    }

    /// Automatically add errors field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }

    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, axum::Json(self)).into_response()
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            r#type: None,
            title: "Internal server error.".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: String::default(),
            errors: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue
                    .message
                    .as_ref()
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| issue.code.to_string()),
            })
        })
        .collect()
}

/// Body shared by every refused grant.
fn invalid_grant() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        axum::Json(serde_json::json!({ "error": "invalid_grant" })),
    )
        .into_response()
}

fn service_unavailable() -> Response {
    let mut response = ResponseError::default()
        .title("A dependency is unavailable, retry later.")
        .status(StatusCode::SERVICE_UNAVAILABLE)
        .into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, RETRY_AFTER_SECS.into());
    response
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let response = ResponseError::default()
            .title("There were validation errors with your request.")
            .status(StatusCode::BAD_REQUEST);

        match self {
            ServerError::Validation(errors) => {
                response.errors(&errors).into_response()
            },
            ServerError::Axum(rejection) => {
                response.details(&rejection.body_text()).into_response()
            },
            ServerError::Application(err) if err.is_rejection() => {
                invalid_grant()
            },
            ServerError::Application(ApplicationError::DependencyUnavailable(
                source,
            )) => {
                tracing::warn!(error = %source, "dependency unavailable");
                service_unavailable()
            },
            ServerError::Application(err) => {
                tracing::error!(error = %err, "server returned 500 status");
                ResponseError::default().into_response()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_rejections_share_body() {
        let denied =
            ServerError::from(ApplicationError::RefreshDenied).into_response();
        let invalid =
            ServerError::from(ApplicationError::InvalidToken).into_response();

        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body(denied).await, body(invalid).await);
    }

    #[tokio::test]
    async fn test_unavailable_sets_retry_after() {
        let err = ApplicationError::unavailable(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "timed out",
        ));
        let response = ServerError::from(err).into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "5");
    }

    #[tokio::test]
    async fn test_integrity_fault_is_internal() {
        let err = ApplicationError::InvalidPrincipal { field: "username" };
        let response = ServerError::from(err).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body(response).await.contains("username"));
    }
}
