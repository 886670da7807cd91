//! Configuration parsing and validation for the relay.
//!
//! All values come from the command line or the environment via clap. The
//! upstream credential is read exactly once here; after startup it lives in
//! [`crate::relay::Upstream`] and is never re-read per request.
use std::time::Duration;

use anyhow::anyhow;
use clap::Parser;
use url::Url;

use crate::client::PoolSettings;

#[derive(Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// The port on which the relay will listen.
    #[arg(short = 'p', long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Bearer credential for the upstream provider. The relay refuses to
    /// start without one.
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Base URL of the upstream provider. The trailing slash matters:
    /// endpoint paths are joined onto it.
    #[arg(
        long,
        env = "GROQ_BASE_URL",
        default_value = "https://api.groq.com/openai/v1/"
    )]
    pub upstream_url: Url,

    /// Maximum number of idle connections kept alive to the provider.
    #[arg(long, default_value_t = 32)]
    pub pool_max_idle_per_host: usize,

    /// How long (in seconds) idle provider connections are kept alive.
    #[arg(long, default_value_t = 90)]
    pub pool_idle_timeout_secs: u64,
}

impl Config {
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            idle_timeout: Duration::from_secs(self.pool_idle_timeout_secs),
            max_idle_per_host: self.pool_max_idle_per_host,
        }
    }

    pub fn validate(self) -> Result<Self, anyhow::Error> {
        if self.api_key.trim().is_empty() {
            return Err(anyhow!("GROQ_API_KEY must not be empty"));
        }
        if self.upstream_url.cannot_be_a_base() {
            return Err(anyhow!(
                "upstream URL '{}' cannot be used as a base",
                self.upstream_url
            ));
        }
        Ok(self)
    }
}

// Manual Debug so the credential never lands in logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("api_key", &"<redacted>")
            .field("upstream_url", &self.upstream_url.as_str())
            .field("pool_max_idle_per_host", &self.pool_max_idle_per_host)
            .field("pool_idle_timeout_secs", &self.pool_idle_timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_and_defaults() {
        let config = Config::try_parse_from(["groq-relay", "--api-key", "gsk-test"]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.api_key, "gsk-test");
        assert_eq!(
            config.upstream_url.as_str(),
            "https://api.groq.com/openai/v1/"
        );
    }

    #[test]
    fn empty_credential_fails_validation() {
        let config = Config::try_parse_from(["groq-relay", "--api-key", "   "]).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn pool_flags_feed_the_client_settings() {
        let config = Config::try_parse_from([
            "groq-relay",
            "--api-key",
            "gsk-test",
            "--pool-max-idle-per-host",
            "8",
            "--pool-idle-timeout-secs",
            "10",
        ])
        .unwrap();

        let pool = config.pool_settings();
        assert_eq!(pool.max_idle_per_host, 8);
        assert_eq!(pool.idle_timeout, Duration::from_secs(10));
    }

    #[test]
    fn port_flag_overrides_default() {
        let config =
            Config::try_parse_from(["groq-relay", "--api-key", "gsk-test", "-p", "8080"]).unwrap();
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn debug_output_redacts_credential() {
        let config =
            Config::try_parse_from(["groq-relay", "--api-key", "gsk-secret-value"]).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("gsk-secret-value"));
        assert!(rendered.contains("<redacted>"));
    }
}
