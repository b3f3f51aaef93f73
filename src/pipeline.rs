//! Render pipeline — the orchestration around a single snapshot.
//!
//! cache check → public-address check → render slot → session acquire →
//! page context → interception → navigation → readiness wait →
//! normalization → capture → cache store. The page context is closed on
//! every exit path, including failures.

use crate::cache::RenderCache;
use crate::config::Config;
use crate::error::GatewayError;
use crate::normalize;
use crate::policy::HostPolicy;
use crate::readiness;
use crate::renderer::{NavigationTimeout, RenderContext, ResourceKind};
use crate::session::SessionManager;
use crate::target::RenderTarget;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct RenderPipeline {
    policy: HostPolicy,
    cache: Mutex<RenderCache>,
    sessions: SessionManager,
    blocked_kinds: HashSet<ResourceKind>,
    user_agent: Option<String>,
    render_timeout: Duration,
    /// Upper bound on simultaneous page contexts.
    render_slots: Semaphore,
}

impl RenderPipeline {
    pub fn new(config: &Config, sessions: SessionManager) -> anyhow::Result<Self> {
        let policy = HostPolicy::new(&config.allowed_hosts, config.deny_private_ips)?;
        Ok(Self {
            policy,
            cache: Mutex::new(RenderCache::new(config.cache_ttl, config.cache_max_items)),
            sessions,
            blocked_kinds: ResourceKind::parse_set(&config.blocked_resources),
            user_agent: config.user_agent.clone(),
            render_timeout: config.render_timeout,
            render_slots: Semaphore::new(config.max_concurrent_renders.max(1)),
        })
    }

    pub fn policy(&self) -> &HostPolicy {
        &self.policy
    }

    /// Render a target, serving from cache when possible.
    pub async fn render(&self, target: &RenderTarget) -> Result<String, GatewayError> {
        if let Some(html) = self.cache.lock().await.get(target.as_str()) {
            debug!(target = target.as_str(), "cache hit");
            return Ok(html);
        }

        self.policy.validate_public(target.host()).await?;

        // No single-flight: concurrent misses for the same target each
        // render independently and the last writer wins.
        let _slot = self
            .render_slots
            .acquire()
            .await
            .map_err(|_| GatewayError::Internal(anyhow::anyhow!("render slots closed")))?;

        let engine = self.sessions.acquire().await.map_err(GatewayError::Internal)?;
        let mut ctx = engine
            .new_context()
            .await
            .map_err(GatewayError::Internal)?;
        debug!(
            target = target.as_str(),
            active = engine.active_contexts(),
            "page context created"
        );

        let cancel = CancellationToken::new();
        let outcome = self.render_in_context(ctx.as_mut(), target, &cancel).await;
        cancel.cancel();

        // Cleanup is unconditional; its own failure is not the request's
        // problem.
        if let Err(e) = ctx.close().await {
            debug!("page context close failed: {e:#}");
        }

        let html = outcome?;
        self.cache
            .lock()
            .await
            .put(target.as_str(), html.clone());
        info!(
            target = target.as_str(),
            bytes = html.len(),
            "snapshot rendered"
        );
        Ok(html)
    }

    async fn render_in_context(
        &self,
        ctx: &mut dyn RenderContext,
        target: &RenderTarget,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        if let Some(ua) = &self.user_agent {
            ctx.set_user_agent(ua).await.map_err(GatewayError::Internal)?;
        }

        // Interception must be live before the first navigation byte.
        ctx.block_resource_kinds(&self.blocked_kinds)
            .await
            .map_err(GatewayError::Internal)?;

        ctx.navigate(target.as_str(), self.render_timeout)
            .await
            .map_err(|e| {
                if e.downcast_ref::<NavigationTimeout>().is_some() {
                    GatewayError::Timeout(e.to_string())
                } else {
                    GatewayError::Internal(e)
                }
            })?;

        readiness::wait_until_ready(&*ctx, cancel).await;

        normalize::normalize(&*ctx, target)
            .await
            .map_err(GatewayError::Internal)?;

        ctx.get_html().await.map_err(GatewayError::Internal)
    }

    /// Drop expired snapshots. Called from the background sweep.
    pub async fn sweep_cache(&self) {
        let mut cache = self.cache.lock().await;
        let before = cache.len();
        cache.cleanup_expired();
        let swept = before - cache.len();
        if swept > 0 {
            debug!(swept, "cache sweep removed expired snapshots");
        }
    }

    pub async fn cached_snapshots(&self) -> usize {
        self.cache.lock().await.len()
    }
}
