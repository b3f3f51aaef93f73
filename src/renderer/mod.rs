//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide).

pub mod chromium;
pub mod intercept;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Sub-resource categories that can be blocked before navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Image,
    Media,
    EventSource,
    WebSocket,
    Manifest,
    Stylesheet,
    Font,
    Script,
    Xhr,
    Fetch,
    Prefetch,
    Ping,
}

impl ResourceKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "image" | "images" => Some(Self::Image),
            "media" => Some(Self::Media),
            "eventsource" | "event-stream" => Some(Self::EventSource),
            "websocket" => Some(Self::WebSocket),
            "manifest" => Some(Self::Manifest),
            "stylesheet" | "css" => Some(Self::Stylesheet),
            "font" => Some(Self::Font),
            "script" => Some(Self::Script),
            "xhr" => Some(Self::Xhr),
            "fetch" => Some(Self::Fetch),
            "prefetch" => Some(Self::Prefetch),
            "ping" => Some(Self::Ping),
            _ => None,
        }
    }

    /// Parse configured category names; unknown names are logged and
    /// skipped rather than rejected.
    pub fn parse_set(names: &[String]) -> HashSet<Self> {
        let mut set = HashSet::new();
        for name in names {
            match Self::parse(name) {
                Some(kind) => {
                    set.insert(kind);
                }
                None => tracing::warn!("unknown blocked resource category: {name}"),
            }
        }
        set
    }
}

/// Marker error for navigation deadline overruns; the pipeline downcasts
/// to it to tell a timeout from an engine failure.
#[derive(Debug, thiserror::Error)]
#[error("navigation timed out after {0:?}")]
pub struct NavigationTimeout(pub Duration);

/// A browser engine that can create rendering contexts.
///
/// There is deliberately no shutdown operation: the engine lives for the
/// whole process.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new isolated browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab) for rendering one page.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL, bounded by a timeout. A deadline overrun fails
    /// with [`NavigationTimeout`].
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;
    /// Override the user agent for requests from this context.
    async fn set_user_agent(&self, user_agent: &str) -> Result<()>;
    /// Abort sub-resource loads in the given categories. Must be called
    /// before navigation so early resources cannot race past the filter.
    async fn block_resource_kinds(&self, kinds: &HashSet<ResourceKind>) -> Result<()>;
    /// Evaluate a script in the page and return its JSON result.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;
    /// Serialize the live DOM to an HTML string.
    async fn get_html(&self) -> Result<String>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}
