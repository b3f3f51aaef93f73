//! Snapshot normalization before serialization.
//!
//! The captured document must neither re-execute scripts nor re-fetch
//! relative assets through the gateway host: an explicit base URL is
//! planted and scripts and preload hints are stripped from the live DOM
//! before capture.

use crate::renderer::RenderContext;
use crate::target::RenderTarget;
use anyhow::{Context, Result};

/// Build the one-shot DOM mutation for a snapshot.
///
/// Ensures a `<base>` exists as the first head child with its href set
/// to `origin` (a pre-existing base is repointed), then removes every
/// script element and every preload/modulepreload/prefetch link. Returns
/// removal counts for logging.
fn normalize_script(origin: &str) -> String {
    let origin_json =
        serde_json::to_string(origin).unwrap_or_else(|_| String::from("\"\""));
    format!(
        r#"(() => {{
  const head = document.head || document.getElementsByTagName('head')[0];
  let base = head ? head.querySelector('base') : null;
  if (!base && head) {{
    base = document.createElement('base');
    head.insertBefore(base, head.firstChild);
  }}
  if (base) base.setAttribute('href', {origin_json});
  let scripts = 0, hints = 0;
  document.querySelectorAll('script').forEach((el) => {{ el.remove(); scripts++; }});
  document
    .querySelectorAll('link[rel="preload"], link[rel="modulepreload"], link[rel="prefetch"]')
    .forEach((el) => {{ el.remove(); hints++; }});
  return {{ scripts: scripts, hints: hints }};
}})()"#
    )
}

/// Rewrite the live document into a static, non-executing snapshot.
pub async fn normalize(ctx: &dyn RenderContext, target: &RenderTarget) -> Result<()> {
    let origin = target.origin();
    let removed = ctx
        .evaluate(&normalize_script(&origin))
        .await
        .context("snapshot normalization failed")?;
    tracing::debug!(origin = %origin, %removed, "normalized snapshot");
    Ok(())
}
