//! Render target — the URL a snapshot was requested for.

use crate::error::GatewayError;
use url::Url;

/// An absolute http(s) URL extracted from a render request.
///
/// The raw request string is kept verbatim: the cache is keyed on it and
/// the browser navigates to it as received. Parsing only derives the
/// hostname and origin, so two spellings of the same URL stay distinct
/// targets.
#[derive(Debug, Clone)]
pub struct RenderTarget {
    raw: String,
    parsed: Url,
}

impl RenderTarget {
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        let parsed =
            Url::parse(raw).map_err(|e| GatewayError::Validation(format!("{raw}: {e}")))?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(GatewayError::Validation(format!(
                    "unsupported scheme: {other}"
                )))
            }
        }
        if parsed.host_str().is_none() {
            return Err(GatewayError::Validation(format!("{raw}: missing host")));
        }
        Ok(Self {
            raw: raw.to_string(),
            parsed,
        })
    }

    /// The raw string as received — cache key and navigation URL.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn host(&self) -> &str {
        self.parsed.host_str().unwrap_or_default()
    }

    /// `scheme://host[:port]/` with the trailing slash enforced.
    pub fn origin(&self) -> String {
        format!("{}/", self.parsed.origin().ascii_serialization())
    }
}
