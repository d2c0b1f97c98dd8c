//! Environment configuration for payload delivery.
//!
//! All settings are read once at initialization; nothing re-reads the
//! environment afterwards.

use std::time::Duration;

/// Enables direct-to-intake delivery (no local proxy agent).
pub const ENV_AGENTLESS_ENABLED: &str = "VIGIL_AGENTLESS_ENABLED";
/// Overrides the intake base URL in agentless mode.
pub const ENV_INTAKE_URL: &str = "VIGIL_INTAKE_URL";
/// API key for agentless intake.
pub const ENV_API_KEY: &str = "VIGIL_API_KEY";
/// Backend site selector, e.g. `vigil.dev`.
pub const ENV_SITE: &str = "VIGIL_SITE";
/// Base URL of the local proxy agent.
pub const ENV_AGENT_URL: &str = "VIGIL_AGENT_URL";
/// Service name override.
pub const ENV_SERVICE: &str = "VIGIL_SERVICE";
/// Container identifier forwarded to the intake, when known.
pub const ENV_CONTAINER_ID: &str = "VIGIL_CONTAINER_ID";

const DEFAULT_SITE: &str = "vigil.dev";
const DEFAULT_AGENT_URL: &str = "http://localhost:8126";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SEND_RETRIES: u32 = 4;
const DEFAULT_RETRY_DELAY_MS: u64 = 10;
const DEFAULT_CONCURRENT_SENDS: usize = 8;

/// Delivery configuration.
#[derive(Debug, Clone)]
pub struct WireConfig {
    /// Direct-to-intake mode; when false, payloads go through the local
    /// proxy agent with a subdomain-selector header.
    pub agentless: bool,

    /// Custom intake base URL (agentless mode only).
    pub intake_url: Option<String>,

    /// API key for agentless intake.
    pub api_key: Option<String>,

    /// Backend site, used to build the intake URL when no custom URL is set.
    pub site: String,

    /// Local proxy agent base URL.
    pub agent_url: String,

    /// Service name override; when unset the tracer derives one.
    pub service: Option<String>,

    /// Container identifier forwarded as a request header.
    pub container_id: Option<String>,

    /// Per-request HTTP timeout.
    pub timeout: Duration,

    /// Retry attempts after the first failed send of a batch.
    pub send_retries: u32,

    /// Fixed delay between send attempts.
    pub retry_delay: Duration,

    /// Maximum simultaneous outgoing requests.
    pub concurrent_sends: usize,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            agentless: false,
            intake_url: None,
            api_key: None,
            site: DEFAULT_SITE.to_string(),
            agent_url: DEFAULT_AGENT_URL.to_string(),
            service: None,
            container_id: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            send_retries: DEFAULT_SEND_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            concurrent_sends: DEFAULT_CONCURRENT_SENDS,
        }
    }
}

impl WireConfig {
    /// Build a config from the environment, falling back to defaults for
    /// anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.agentless = bool_env(ENV_AGENTLESS_ENABLED);
        config.intake_url = non_empty_env(ENV_INTAKE_URL);
        config.api_key = non_empty_env(ENV_API_KEY);
        config.service = non_empty_env(ENV_SERVICE);
        config.container_id = non_empty_env(ENV_CONTAINER_ID);
        if let Some(site) = non_empty_env(ENV_SITE) {
            config.site = site;
        }
        if let Some(agent_url) = non_empty_env(ENV_AGENT_URL) {
            config.agent_url = agent_url;
        }
        config
    }

    /// Enable or disable agentless delivery.
    pub fn with_agentless(mut self, enabled: bool) -> Self {
        self.agentless = enabled;
        self
    }

    /// Set the agentless API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set a custom intake base URL.
    pub fn with_intake_url(mut self, url: impl Into<String>) -> Self {
        self.intake_url = Some(url.into());
        self
    }

    /// Set the backend site.
    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = site.into();
        self
    }

    /// Set the service name.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry count for failed sends.
    pub fn with_send_retries(mut self, retries: u32) -> Self {
        self.send_retries = retries;
        self
    }

    /// Set the delay between send attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the outgoing-request concurrency limit.
    pub fn with_concurrent_sends(mut self, limit: usize) -> Self {
        self.concurrent_sends = limit.max(1);
        self
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn bool_env(key: &str) -> bool {
    matches!(
        std::env::var(key).unwrap_or_default().to_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = WireConfig::default();
        assert!(!config.agentless);
        assert_eq!(config.site, "vigil.dev");
        assert_eq!(config.agent_url, "http://localhost:8126");
        assert_eq!(config.send_retries, 4);
        assert_eq!(config.concurrent_sends, 8);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        unsafe {
            std::env::set_var(ENV_AGENTLESS_ENABLED, "true");
            std::env::set_var(ENV_API_KEY, "secret");
            std::env::set_var(ENV_SITE, "staging.vigil.dev");
        }

        let config = WireConfig::from_env();
        assert!(config.agentless);
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.site, "staging.vigil.dev");

        unsafe {
            std::env::remove_var(ENV_AGENTLESS_ENABLED);
            std::env::remove_var(ENV_API_KEY);
            std::env::remove_var(ENV_SITE);
        }
    }

    #[test]
    #[serial]
    fn test_empty_env_values_ignored() {
        unsafe {
            std::env::set_var(ENV_INTAKE_URL, "");
        }
        let config = WireConfig::from_env();
        assert!(config.intake_url.is_none());
        unsafe {
            std::env::remove_var(ENV_INTAKE_URL);
        }
    }

    #[test]
    fn test_builder_methods() {
        let config = WireConfig::default()
            .with_agentless(true)
            .with_api_key("k")
            .with_send_retries(1)
            .with_retry_delay(Duration::from_millis(1))
            .with_concurrent_sends(0);
        assert!(config.agentless);
        assert_eq!(config.send_retries, 1);
        // the limit is clamped to at least one permit
        assert_eq!(config.concurrent_sends, 1);
    }
}
