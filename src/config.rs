use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{FrontError, Result};

/// Front configuration
///
/// All knobs have working defaults; `from_env` overrides them from
/// environment variables in the same shape the rest of the deployment uses.
#[derive(Debug, Clone)]
pub struct FrontConfig {
    /// Consecutive failures tolerated before the breaker blocks admission
    pub continuous_fail_limit: u32,
    /// How long the breaker blocks admission after the last failure
    pub block_window: Duration,
    /// Horizon of the RTT sliding window
    pub rtt_window: Duration,
    /// Horizon of the traffic sliding window
    pub traffic_window: Duration,
    /// Tick interval of the background sweeper
    pub sweep_interval: Duration,
    /// Initial score given to freshly rotated-in IPs
    pub default_ip_score: i32,
    /// Path of the trusted CA bundle file (rewritten on rotation)
    pub ca_bundle_path: PathBuf,
    /// Optional path where proxy configuration is persisted as JSON
    pub proxy_config_path: Option<PathBuf>,
}

impl Default for FrontConfig {
    fn default() -> Self {
        Self {
            continuous_fail_limit: 3,
            block_window: Duration::from_secs(60),
            rtt_window: Duration::from_secs(5),
            traffic_window: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(1),
            default_ip_score: 100,
            ca_bundle_path: PathBuf::from("relay_front_ca.crt"),
            proxy_config_path: None,
        }
    }
}

impl FrontConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(FrontConfig {
            continuous_fail_limit: parse_env_or(
                "FRONT_CONTINUE_FAIL_LIMIT",
                defaults.continuous_fail_limit,
            )?,
            block_window: Duration::from_secs(parse_env_or(
                "FRONT_CONTINUE_FAIL_BLOCK_SECS",
                defaults.block_window.as_secs(),
            )?),
            rtt_window: Duration::from_secs(parse_env_or(
                "FRONT_RTT_WINDOW_SECS",
                defaults.rtt_window.as_secs(),
            )?),
            traffic_window: Duration::from_secs(parse_env_or(
                "FRONT_TRAFFIC_WINDOW_SECS",
                defaults.traffic_window.as_secs(),
            )?),
            sweep_interval: Duration::from_secs(
                parse_env_or("FRONT_SWEEP_INTERVAL_SECS", defaults.sweep_interval.as_secs())?
                    .max(1),
            ),
            default_ip_score: parse_env_or("FRONT_DEFAULT_IP_SCORE", defaults.default_ip_score)?,
            ca_bundle_path: PathBuf::from(get_env_or(
                "FRONT_CA_BUNDLE_PATH",
                &defaults.ca_bundle_path.to_string_lossy(),
            )),
            proxy_config_path: env::var("FRONT_PROXY_CONFIG_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse environment variable with a typed default; set-but-invalid values
/// are a configuration error rather than a silent fallback
fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| FrontError::InvalidConfig(format!("{} must be a valid number", key))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const CONFIG_ENV_KEYS: &[&str] = &[
        "FRONT_CONTINUE_FAIL_LIMIT",
        "FRONT_CONTINUE_FAIL_BLOCK_SECS",
        "FRONT_RTT_WINDOW_SECS",
        "FRONT_TRAFFIC_WINDOW_SECS",
        "FRONT_SWEEP_INTERVAL_SECS",
        "FRONT_DEFAULT_IP_SCORE",
        "FRONT_CA_BUNDLE_PATH",
        "FRONT_PROXY_CONFIG_PATH",
    ];

    struct EnvGuard {
        saved: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(keys: &[&str]) -> Self {
            let saved = keys
                .iter()
                .map(|&key| {
                    let old = env::var(key).ok();
                    env::remove_var(key);
                    (key.to_string(), old)
                })
                .collect();

            Self { saved }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.saved.drain(..) {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }

    #[test]
    fn test_config_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        let config = FrontConfig::from_env().unwrap();

        assert_eq!(config.continuous_fail_limit, 3);
        assert_eq!(config.block_window, Duration::from_secs(60));
        assert_eq!(config.rtt_window, Duration::from_secs(5));
        assert_eq!(config.traffic_window, Duration::from_secs(60));
        assert_eq!(config.sweep_interval, Duration::from_secs(1));
        assert_eq!(config.default_ip_score, 100);
        assert!(config.proxy_config_path.is_none());
    }

    #[test]
    fn test_config_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("FRONT_CONTINUE_FAIL_LIMIT", "10");
        env::set_var("FRONT_CONTINUE_FAIL_BLOCK_SECS", "120");
        env::set_var("FRONT_CA_BUNDLE_PATH", "/tmp/bundle.crt");
        env::set_var("FRONT_PROXY_CONFIG_PATH", "/tmp/proxy.json");

        let config = FrontConfig::from_env().unwrap();

        assert_eq!(config.continuous_fail_limit, 10);
        assert_eq!(config.block_window, Duration::from_secs(120));
        assert_eq!(config.ca_bundle_path, PathBuf::from("/tmp/bundle.crt"));
        assert_eq!(
            config.proxy_config_path,
            Some(PathBuf::from("/tmp/proxy.json"))
        );
    }

    #[test]
    fn test_config_invalid_numeric() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("FRONT_CONTINUE_FAIL_LIMIT", "not-a-number");
        let err = FrontConfig::from_env().unwrap_err();
        assert!(matches!(err, FrontError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_sweep_interval_floor() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("FRONT_SWEEP_INTERVAL_SECS", "0");
        let config = FrontConfig::from_env().unwrap();
        assert_eq!(config.sweep_interval, Duration::from_secs(1));
    }
}
