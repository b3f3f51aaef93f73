//! Gateway error taxonomy and its HTTP status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors surfaced by the front door and the render pipeline.
///
/// Security rejections and render failures both map to 500: the response
/// status deliberately does not distinguish a blocked private address
/// from an engine failure.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Missing or mismatched shared secret, or no secret configured.
    #[error("unauthorized")]
    Auth,

    /// Malformed or non-http(s) target URL.
    #[error("invalid target: {0}")]
    Validation(String),

    /// Host rejected by the allow-list.
    #[error("host not allowed: {0}")]
    Policy(String),

    /// Target resolved to a private, loopback or link-local address.
    #[error("{0}")]
    Security(String),

    /// Navigation exceeded the render timeout.
    #[error("{0}")]
    Timeout(String),

    /// Any other failure inside the pipeline or the engine.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Policy(_) => StatusCode::FORBIDDEN,
            Self::Security(_) | Self::Timeout(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        // Error text reaches the client verbatim; the shared-secret
        // perimeter is the trust boundary.
        (self.status(), self.to_string()).into_response()
    }
}
