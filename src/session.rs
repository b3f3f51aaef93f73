//! Shared browser session — one engine per process, launched on first use.

use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::Renderer;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Owns the single engine handle shared by every render for the
/// process's lifetime. Overlapping first callers converge on one
/// in-flight launch; there is no shutdown during normal operation.
pub struct SessionManager {
    engine: OnceCell<Arc<dyn Renderer>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            engine: OnceCell::new(),
        }
    }

    /// Pre-seed with an already-built engine. Used by tests and by
    /// deployments that prefer launch errors at startup over the first
    /// request.
    pub fn with_renderer(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            engine: OnceCell::new_with(Some(renderer)),
        }
    }

    /// Get the shared engine, launching it on the first call. A failed
    /// launch is not cached; the next caller retries.
    pub async fn acquire(&self) -> Result<Arc<dyn Renderer>> {
        let engine = self
            .engine
            .get_or_try_init(|| async {
                tracing::info!("launching shared browser engine");
                let renderer = ChromiumRenderer::launch().await?;
                Ok::<_, anyhow::Error>(Arc::new(renderer) as Arc<dyn Renderer>)
            })
            .await?;
        Ok(Arc::clone(engine))
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
