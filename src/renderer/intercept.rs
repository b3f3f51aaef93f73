//! Per-context request interception.
//!
//! Sub-resources in the configured block-set are aborted at the CDP
//! Fetch layer before the engine issues them, cutting render latency
//! and the gateway's outbound surface.

use super::ResourceKind;
use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::fetch::{
    self, ContinueRequestParams, EventRequestPaused, FailRequestParams, RequestPattern,
    RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::collections::HashSet;

/// Map a CDP resource type onto a blockable category.
fn kind_of(resource_type: &ResourceType) -> Option<ResourceKind> {
    match resource_type {
        ResourceType::Image => Some(ResourceKind::Image),
        ResourceType::Media => Some(ResourceKind::Media),
        ResourceType::EventSource => Some(ResourceKind::EventSource),
        ResourceType::WebSocket => Some(ResourceKind::WebSocket),
        ResourceType::Manifest => Some(ResourceKind::Manifest),
        ResourceType::Stylesheet => Some(ResourceKind::Stylesheet),
        ResourceType::Font => Some(ResourceKind::Font),
        ResourceType::Script => Some(ResourceKind::Script),
        ResourceType::Xhr => Some(ResourceKind::Xhr),
        ResourceType::Fetch => Some(ResourceKind::Fetch),
        ResourceType::Prefetch => Some(ResourceKind::Prefetch),
        ResourceType::Ping => Some(ResourceKind::Ping),
        _ => None,
    }
}

/// Enable Fetch interception on the page and spawn the filter task.
///
/// The listener is subscribed before interception is enabled so no
/// paused request can slip through unobserved. Must run before the
/// page navigates.
pub async fn install(page: &Page, blocked: HashSet<ResourceKind>) -> Result<()> {
    if blocked.is_empty() {
        return Ok(());
    }

    let mut paused = page
        .event_listener::<EventRequestPaused>()
        .await
        .context("failed to subscribe to requestPaused events")?;

    page.execute(fetch::EnableParams {
        patterns: Some(vec![RequestPattern {
            url_pattern: Some("*".to_string()),
            resource_type: None,
            request_stage: Some(RequestStage::Request),
        }]),
        handle_auth_requests: Some(false),
    })
    .await
    .context("failed to enable fetch interception")?;

    let page = page.clone();
    tokio::spawn(async move {
        while let Some(event) = paused.next().await {
            let blocked_kind = kind_of(&event.resource_type).filter(|kind| blocked.contains(kind));
            let outcome = match blocked_kind {
                Some(kind) => {
                    tracing::trace!(url = %event.request.url, ?kind, "aborting blocked resource");
                    page.execute(FailRequestParams {
                        request_id: event.request_id.clone(),
                        error_reason: ErrorReason::BlockedByClient,
                    })
                    .await
                    .map(|_| ())
                }
                None => page
                    .execute(ContinueRequestParams::new(event.request_id.clone()))
                    .await
                    .map(|_| ()),
            };
            if outcome.is_err() {
                // The page is gone; the filter dies with it.
                break;
            }
        }
    });

    Ok(())
}
