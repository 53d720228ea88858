use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::ErrorReport;
use crate::client::{ContentError, ErrorKind};

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const NOT_FOUND: &str = "not_found";
    pub const PROVIDER_UNAVAILABLE: &str = "provider_unavailable";
    pub const UPSTREAM_AUTH: &str = "upstream_auth";
    pub const UPSTREAM_UNAVAILABLE: &str = "upstream_unavailable";
    pub const UPSTREAM: &str = "upstream_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    /// Logged, never returned.
    detail: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            detail: None,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Webhook secret required",
            None,
        )
    }

    pub fn not_found(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, hint)
    }

    pub fn provider_unavailable(provider: &str) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::PROVIDER_UNAVAILABLE,
            "No client registered for provider",
            Some(provider.to_string()),
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl From<ContentError> for ApiError {
    fn from(err: ContentError) -> Self {
        let api = match err.kind {
            ErrorKind::NotFound => {
                ApiError::not_found("Content not found", Some(err.message.clone()))
            }
            ErrorKind::AuthFailed | ErrorKind::Forbidden => ApiError::new(
                StatusCode::BAD_GATEWAY,
                codes::UPSTREAM_AUTH,
                "Content backend rejected credentials",
                None,
            ),
            ErrorKind::ServerError => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::UPSTREAM_UNAVAILABLE,
                "Content backend unavailable",
                Some("Retry later".to_string()),
            ),
            ErrorKind::Unknown => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::UPSTREAM,
                "Content backend failure",
                None,
            ),
        };
        api.with_detail(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = self
            .detail
            .clone()
            .or_else(|| self.hint.clone())
            .unwrap_or_else(|| self.message.to_string());
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message(
            "infra::http",
            self.status,
            format!("{}: {detail}", self.code),
        )
        .attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProviderKind;

    fn content_error(kind: ErrorKind) -> ContentError {
        ContentError::new(kind, ProviderKind::Sanity, "boom")
    }

    #[test]
    fn taxonomy_maps_to_statuses() {
        let cases = [
            (ErrorKind::NotFound, StatusCode::NOT_FOUND),
            (ErrorKind::AuthFailed, StatusCode::BAD_GATEWAY),
            (ErrorKind::Forbidden, StatusCode::BAD_GATEWAY),
            (ErrorKind::ServerError, StatusCode::SERVICE_UNAVAILABLE),
            (ErrorKind::Unknown, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (kind, status) in cases {
            assert_eq!(ApiError::from(content_error(kind)).status(), status);
        }
    }

    #[test]
    fn backend_details_stay_in_the_report() {
        let response = ApiError::from(content_error(ErrorKind::Unknown)).into_response();
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert!(report.messages[0].contains("boom"));
    }
}
