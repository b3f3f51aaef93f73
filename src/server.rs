//! HTTP front door.
//!
//! Routes, authentication, target extraction and outcome mapping — a
//! thin layer over the render pipeline.

use crate::error::GatewayError;
use crate::pipeline::RenderPipeline;
use crate::target::RenderTarget;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use percent_encoding::percent_decode_str;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Header carrying the shared secret.
pub const SECRET_HEADER: &str = "x-render-secret";

pub struct AppState {
    pub pipeline: Arc<RenderPipeline>,
    /// Shared secret. Empty rejects every render request.
    pub secret: String,
    /// Advertised freshness for successful responses.
    pub cache_ttl_secs: u64,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/render", get(render))
        .route("/render/*target", get(render))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn start(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("rendergate listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Pull the target out of the request. The `url` query parameter wins;
/// otherwise everything after `/render/` is taken percent-decoded, or
/// raw when decoding fails.
pub fn extract_target(uri: &Uri) -> Option<String> {
    if let Some(query) = uri.query() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if key == "url" {
                return Some(value.into_owned());
            }
        }
    }

    let rest = uri.path().strip_prefix("/render/")?;
    if rest.is_empty() {
        return None;
    }
    match percent_decode_str(rest).decode_utf8() {
        Ok(decoded) => Some(decoded.into_owned()),
        Err(_) => Some(rest.to_string()),
    }
}

fn authorize(headers: &HeaderMap, secret: &str) -> Result<(), GatewayError> {
    // An unset secret rejects everything rather than disabling auth.
    if secret.is_empty() {
        return Err(GatewayError::Auth);
    }
    match headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok()) {
        Some(presented) if presented == secret => Ok(()),
        _ => Err(GatewayError::Auth),
    }
}

async fn render(State(state): State<Arc<AppState>>, headers: HeaderMap, uri: Uri) -> Response {
    match handle_render(&state, &headers, &uri).await {
        Ok(html) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/html".to_string()),
                (
                    header::CACHE_CONTROL,
                    format!("public, max-age={}", state.cache_ttl_secs),
                ),
            ],
            html,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle_render(
    state: &AppState,
    headers: &HeaderMap,
    uri: &Uri,
) -> Result<String, GatewayError> {
    authorize(headers, &state.secret)?;

    let raw = extract_target(uri)
        .ok_or_else(|| GatewayError::Validation("missing target URL".to_string()))?;
    let target = RenderTarget::parse(&raw)?;

    if !state.pipeline.policy().allowed(target.host()) {
        return Err(GatewayError::Policy(target.host().to_string()));
    }

    // Detached from the connection: a client disconnect must not abort
    // the render mid-flight, and the snapshot still lands in the cache
    // for the next caller.
    let pipeline = Arc::clone(&state.pipeline);
    match tokio::spawn(async move { pipeline.render(&target).await }).await {
        Ok(outcome) => outcome,
        Err(e) => Err(GatewayError::Internal(anyhow::anyhow!(
            "render task panicked: {e}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn query_parameter_wins() {
        assert_eq!(
            extract_target(&uri("/render?url=https://a.com/p")),
            Some("https://a.com/p".to_string())
        );
        assert_eq!(
            extract_target(&uri("/render/ignored?url=https://a.com/p")),
            Some("https://a.com/p".to_string())
        );
    }

    #[test]
    fn path_remainder_is_percent_decoded() {
        assert_eq!(
            extract_target(&uri("/render/https%3A%2F%2Fa.com%2Fp")),
            Some("https://a.com/p".to_string())
        );
        // Both accepted forms name the same target.
        assert_eq!(
            extract_target(&uri("/render?url=https://a.com/p")),
            extract_target(&uri("/render/https%3A%2F%2Fa.com%2Fp"))
        );
    }

    #[test]
    fn undecodable_remainder_falls_back_to_raw() {
        // %FF%FE is not valid UTF-8 once decoded.
        assert_eq!(
            extract_target(&uri("/render/https://a.com/%FF%FE")),
            Some("https://a.com/%FF%FE".to_string())
        );
    }

    #[test]
    fn missing_target_is_none() {
        assert_eq!(extract_target(&uri("/render")), None);
        assert_eq!(extract_target(&uri("/render?other=x")), None);
    }

    #[test]
    fn auth_matrix() {
        let mut headers = HeaderMap::new();
        headers.insert(SECRET_HEADER, "s1".parse().unwrap());
        assert!(authorize(&headers, "s1").is_ok());
        assert!(matches!(authorize(&headers, "s2"), Err(GatewayError::Auth)));

        let empty = HeaderMap::new();
        assert!(matches!(authorize(&empty, "s1"), Err(GatewayError::Auth)));
    }

    #[test]
    fn unset_secret_rejects_even_a_matching_empty_header() {
        let mut headers = HeaderMap::new();
        headers.insert(SECRET_HEADER, "".parse().unwrap());
        assert!(matches!(authorize(&headers, ""), Err(GatewayError::Auth)));
    }
}
