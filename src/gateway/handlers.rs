//! Route handlers: health probe, token issuance, HL7 acceptance, and the
//! proxy fallback

use crate::auth::TokenRequest;
use crate::gateway::service::GatewayService;
use crate::gateway::types::GatewayError;
use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Liveness probe: always healthy, no dependency checks
pub async fn health_handler() -> Response {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response()
}

/// `POST /oauth/token` - the client-credentials grant
pub async fn token_handler(
    State(service): State<Arc<GatewayService>>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return GatewayError::Validation {
                field: "body".to_string(),
                message: rejection.body_text(),
            }
            .into_response()
        }
    };

    match service.issuer().issue(&request).await {
        Ok(grant) => (StatusCode::OK, Json(grant)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Body of a legacy fire-and-forget HL7 submission
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hl7Submission {
    #[serde(default)]
    pub message_type: String,
    #[serde(default)]
    pub content: String,
    pub message_id: Option<String>,
}

/// `POST /hl7/message` - accepts an HL7 message for later processing.
///
/// Acceptance only: a 202 makes no processing guarantee.
pub async fn hl7_message_handler(
    payload: Result<Json<Hl7Submission>, JsonRejection>,
) -> Response {
    let Json(submission) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return GatewayError::Validation {
                field: "body".to_string(),
                message: rejection.body_text(),
            }
            .into_response()
        }
    };

    for (field, value) in [
        ("messageType", &submission.message_type),
        ("content", &submission.content),
    ] {
        if value.trim().is_empty() {
            return GatewayError::Validation {
                field: field.to_string(),
                message: format!("{field} is required"),
            }
            .into_response();
        }
    }

    let message_id = submission
        .message_id
        .unwrap_or_else(|| Uuid::now_v7().to_string());

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "message": "HL7 message accepted for processing",
            "messageId": message_id,
        })),
    )
        .into_response()
}

/// Fallback handler: resolve the route table and dispatch to the upstream
pub async fn proxy_handler(
    State(service): State<Arc<GatewayService>>,
    request: Request,
) -> Response {
    let path = request.uri().path().to_string();
    let Some(route) = service.routes().resolve(&path) else {
        return GatewayError::NotFound.into_response();
    };

    match service.dispatcher().dispatch(request, route).await {
        Ok(response) => response.into_response(),
        Err(err) => err.into_response(),
    }
}
