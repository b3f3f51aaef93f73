//! Render-readiness detection.
//!
//! Arbitrary third-party pages give no reliable "the app finished
//! rendering" signal. The detector polls a composite heuristic from the
//! host side until it reports true or the deadline passes; either way
//! the pipeline proceeds to capture whatever exists.

use crate::renderer::RenderContext;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

/// Selector treated as the framework root marker.
const ROOT_MARKER_SELECTOR: &str = "#root, #app, [data-ssr], main";

/// Selector for the content-container clause of the readiness predicate.
const CONTENT_SELECTOR: &str = "#root > *, #app > *, main, article";

/// Minimum visible text length for the text-length clause.
const MIN_TEXT_LENGTH: usize = 100;

const MARKER_TIMEOUT: Duration = Duration::from_secs(3);
const READY_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(250);
const SCROLL_PAUSE: Duration = Duration::from_millis(150);
const SETTLE_DELAY: Duration = Duration::from_millis(500);

const SCROLL_DOWN: &str = "(() => { window.scrollBy(0, window.innerHeight); return true; })()";
const SCROLL_UP: &str = "(() => { window.scrollTo(0, 0); return true; })()";

fn marker_script() -> String {
    format!("document.querySelector('{ROOT_MARKER_SELECTOR}') !== null")
}

/// The composite "done enough to snapshot" predicate. Any clause
/// suffices: an application-set ready flag, a non-empty title, a meta
/// description, a populated content container, or enough visible text.
fn readiness_script() -> String {
    format!(
        r#"(() => {{
  if (window.renderReady === true) return true;
  if (document.title && document.title.trim().length > 0) return true;
  if (document.querySelector('meta[name="description"]')) return true;
  if (document.querySelector('{CONTENT_SELECTOR}')) return true;
  const text = document.body ? (document.body.innerText || '') : '';
  return text.trim().length > {MIN_TEXT_LENGTH};
}})()"#
    )
}

/// Poll `script` until it evaluates to true, the deadline passes, or the
/// token is cancelled. Evaluation errors count as "not yet".
async fn poll_until(
    ctx: &dyn RenderContext,
    script: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        match ctx.evaluate(script).await {
            Ok(value) if value.as_bool() == Some(true) => return true,
            Ok(_) => {}
            Err(e) => tracing::debug!("readiness probe failed: {e:#}"),
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        let wait = POLL_INTERVAL.min(deadline - now);
        tokio::select! {
            _ = sleep(wait) => {}
            _ = cancel.cancelled() => return false,
        }
    }
}

/// Wait for the page to look done enough to snapshot. Never fails the
/// render: marker and readiness overruns degrade the capture silently.
pub async fn wait_until_ready(ctx: &dyn RenderContext, cancel: &CancellationToken) {
    if !poll_until(ctx, &marker_script(), MARKER_TIMEOUT, cancel).await {
        tracing::debug!("framework root marker never appeared");
    }

    // Nudge lazy-loading observers, then give them a beat to fire.
    if let Err(e) = ctx.evaluate(SCROLL_DOWN).await {
        tracing::debug!("scroll nudge failed: {e:#}");
    }
    sleep(SCROLL_PAUSE).await;
    let _ = ctx.evaluate(SCROLL_UP).await;

    if poll_until(ctx, &readiness_script(), READY_TIMEOUT, cancel).await {
        tracing::debug!("page reported ready");
    } else {
        tracing::debug!("readiness heuristic timed out; capturing as-is");
    }

    // Let any just-triggered async work flush before capture.
    sleep(SETTLE_DELAY).await;
}
