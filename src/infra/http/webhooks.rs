//! Change notifications and manual revalidation.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use serde_json::Value;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::domain::ProviderKind;
use crate::revalidation::{RevalidationOutcome, RevalidationRequest};

use super::HttpState;
use super::error::ApiError;

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Compare the presented secret against the configured one in constant
/// time. No configured secret means the endpoint is open.
pub fn verify_secret(expected: Option<&str>, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let presented = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if expected.as_bytes().ct_eq(presented.as_bytes()).unwrap_u8() == 1 {
        Ok(())
    } else {
        Err(ApiError::unauthorized())
    }
}

fn outcome_response(outcome: RevalidationOutcome) -> (StatusCode, Json<RevalidationOutcome>) {
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(outcome))
}

/// `POST /api/webhooks/{provider}`: accepts the canonical payload or the
/// backend's native body.
pub async fn receive_webhook(
    State(state): State<HttpState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<RevalidationOutcome>), ApiError> {
    verify_secret(state.webhook_secret.as_deref(), &headers)?;

    let kind = provider
        .parse::<ProviderKind>()
        .map_err(|err| ApiError::not_found("Unknown provider", Some(err.to_string())))?;
    let client = state
        .revalidator
        .registry()
        .get_client(kind)
        .ok_or_else(|| ApiError::provider_unavailable(kind.as_str()))?;

    let event_header = client
        .webhook_event_header()
        .and_then(|name| headers.get(name))
        .and_then(|value| value.to_str().ok());
    let payload = client.parse_webhook(&body, event_header).ok_or_else(|| {
        warn!(provider = kind.as_str(), "Unrecognized webhook body");
        ApiError::bad_request(
            "Unrecognized webhook payload",
            Some(format!("expected a canonical or native {kind} webhook body")),
        )
    })?;
    payload
        .content_model()
        .map_err(|err| ApiError::bad_request("Unknown content model", Some(err.to_string())))?;

    info!(
        provider = kind.as_str(),
        event = payload.event.as_str(),
        model = %payload.model,
        "Webhook received"
    );
    Ok(outcome_response(
        state.revalidator.handle_webhook(&payload).await,
    ))
}

/// `POST /api/revalidate`: `{tags?, paths?, all?}`.
pub async fn revalidate(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Json(request): Json<RevalidationRequest>,
) -> Result<(StatusCode, Json<RevalidationOutcome>), ApiError> {
    verify_secret(state.webhook_secret.as_deref(), &headers)?;
    let empty = request.is_empty();
    let outcome = state.revalidator.revalidate(request).await;
    if empty {
        return Ok((StatusCode::BAD_REQUEST, Json(outcome)));
    }
    Ok(outcome_response(outcome))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(secret: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(secret) = secret {
            headers.insert(
                WEBHOOK_SECRET_HEADER,
                HeaderValue::from_str(secret).expect("header"),
            );
        }
        headers
    }

    #[test]
    fn open_when_no_secret_is_configured() {
        assert!(verify_secret(None, &headers(None)).is_ok());
    }

    #[test]
    fn matching_secret_is_accepted() {
        assert!(verify_secret(Some("s3cret"), &headers(Some("s3cret"))).is_ok());
    }

    #[test]
    fn missing_or_wrong_secret_is_unauthorized() {
        for presented in [None, Some("wrong"), Some("s3cret-but-longer")] {
            let err = verify_secret(Some("s3cret"), &headers(presented)).expect_err("rejected");
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        }
    }
}
