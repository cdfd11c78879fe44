//! Error responses.
//!
//! # Responsibilities
//! - Map each gateway error to an HTTP status
//! - Render errors as `{"error": "..."}`
//!
//! # Design Decisions
//! - Upstream network failures are 502, a commit timeout is 504
//! - An exhausted retry budget takes its status from the last cause
//! - Server-side failures are logged at error level, client errors at debug

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::fabric::types::GatewayError;

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Authentication(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Registration(_) => StatusCode::CONFLICT,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::CommitTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::RetriesExhausted { last, .. } => match last.as_ref() {
                GatewayError::CommitTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::BAD_GATEWAY,
            },
            GatewayError::Proposal(_)
            | GatewayError::Broadcast(_)
            | GatewayError::EventHub(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Initialization(_) | GatewayError::Query(_) | GatewayError::Channel(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fabric::types::TransactionId;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GatewayError::Authentication("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::Registration("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            GatewayError::CommitTimeout {
                tx_id: TransactionId::from("t"),
                timeout_ms: 50
            }
            .status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        let exhausted = GatewayError::RetriesExhausted {
            attempts: 3,
            last: Box::new(GatewayError::Proposal("x".into())),
        };
        assert_eq!(exhausted.status_code(), StatusCode::BAD_GATEWAY);
        let timed_out = GatewayError::RetriesExhausted {
            attempts: 3,
            last: Box::new(GatewayError::CommitTimeout {
                tx_id: TransactionId::from("t"),
                timeout_ms: 50,
            }),
        };
        assert_eq!(timed_out.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            GatewayError::Query("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_error_body() {
        let response = GatewayError::NotFound("block 9".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "not found: block 9");
    }
}
