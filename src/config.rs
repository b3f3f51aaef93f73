//! Environment-driven configuration.
//!
//! All operator settings come from `RENDERGATE_*` environment variables,
//! read once at startup. Unparseable values fall back to their defaults
//! with a warning rather than aborting.

use std::time::Duration;

/// Sub-resource categories aborted during rendering unless overridden.
const DEFAULT_BLOCKED_RESOURCES: &[&str] =
    &["image", "media", "eventsource", "websocket", "manifest"];

#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port.
    pub port: u16,
    /// Navigation timeout for a render attempt.
    pub render_timeout: Duration,
    /// How long a cached snapshot stays fresh.
    pub cache_ttl: Duration,
    /// Cache capacity before LRU eviction.
    pub cache_max_items: usize,
    /// Shared secret. Empty rejects every render request.
    pub secret: String,
    /// Allow-list patterns; empty allows every host.
    pub allowed_hosts: Vec<String>,
    /// Reject targets resolving to private/loopback/link-local addresses.
    pub deny_private_ips: bool,
    /// Sub-resource category names to abort during rendering.
    pub blocked_resources: Vec<String>,
    /// Optional user-agent override for page contexts.
    pub user_agent: Option<String>,
    /// Upper bound on simultaneous page contexts.
    pub max_concurrent_renders: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            render_timeout: Duration::from_millis(20_000),
            cache_ttl: Duration::from_secs(300),
            cache_max_items: 100,
            secret: String::new(),
            allowed_hosts: Vec::new(),
            deny_private_ips: true,
            blocked_resources: DEFAULT_BLOCKED_RESOURCES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            user_agent: None,
            max_concurrent_renders: 4,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_parse("RENDERGATE_PORT", defaults.port),
            render_timeout: Duration::from_millis(env_parse(
                "RENDERGATE_RENDER_TIMEOUT_MS",
                defaults.render_timeout.as_millis() as u64,
            )),
            cache_ttl: Duration::from_secs(env_parse(
                "RENDERGATE_CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )),
            cache_max_items: env_parse("RENDERGATE_CACHE_MAX_ITEMS", defaults.cache_max_items),
            secret: std::env::var("RENDERGATE_SECRET").unwrap_or_default(),
            allowed_hosts: env_csv("RENDERGATE_ALLOWED_HOSTS").unwrap_or_default(),
            deny_private_ips: env_bool("RENDERGATE_DENY_PRIVATE_IPS", true),
            blocked_resources: env_csv("RENDERGATE_BLOCKED_RESOURCES")
                .unwrap_or(defaults.blocked_resources),
            user_agent: std::env::var("RENDERGATE_USER_AGENT")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            max_concurrent_renders: env_parse(
                "RENDERGATE_MAX_CONCURRENT_RENDERS",
                defaults.max_concurrent_renders,
            ),
        }
    }
}

fn env_parse<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("ignoring unparseable {name}={raw}");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

fn env_csv(name: &str) -> Option<Vec<String>> {
    let raw = std::env::var(name).ok()?;
    let items: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.render_timeout, Duration::from_secs(20));
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.cache_max_items, 100);
        assert!(config.secret.is_empty());
        assert!(config.allowed_hosts.is_empty());
        assert!(config.deny_private_ips);
        assert_eq!(
            config.blocked_resources,
            vec!["image", "media", "eventsource", "websocket", "manifest"]
        );
        assert!(config.user_agent.is_none());
        assert_eq!(config.max_concurrent_renders, 4);
    }

    #[test]
    fn env_parse_falls_back_on_garbage() {
        std::env::set_var("RENDERGATE_TEST_PARSE", "not-a-number");
        assert_eq!(env_parse("RENDERGATE_TEST_PARSE", 7u16), 7);
        std::env::set_var("RENDERGATE_TEST_PARSE_OK", "42");
        assert_eq!(env_parse("RENDERGATE_TEST_PARSE_OK", 7u16), 42);
    }

    #[test]
    fn env_bool_variants() {
        std::env::set_var("RENDERGATE_TEST_BOOL_ON", "TRUE");
        std::env::set_var("RENDERGATE_TEST_BOOL_OFF", "false");
        assert!(env_bool("RENDERGATE_TEST_BOOL_ON", false));
        assert!(!env_bool("RENDERGATE_TEST_BOOL_OFF", true));
        assert!(env_bool("RENDERGATE_TEST_BOOL_UNSET", true));
    }

    #[test]
    fn env_csv_trims_and_skips_empty() {
        std::env::set_var("RENDERGATE_TEST_CSV", " a.com , *.b.com ,, ");
        assert_eq!(
            env_csv("RENDERGATE_TEST_CSV"),
            Some(vec!["a.com".to_string(), "*.b.com".to_string()])
        );
        assert_eq!(env_csv("RENDERGATE_TEST_CSV_UNSET"), None);
    }
}
