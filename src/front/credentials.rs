//! Mutable credentials and proxy configuration
//!
//! Both records are read on every outgoing request, so reads take an atomic
//! snapshot (clone the `Arc`, use the copy) instead of holding a lock while
//! the request is built. Writers swap the whole record.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;

use crate::error::Result;
use crate::models::{Credentials, ProxyConfig};

/// Copy-on-read store for account credentials and proxy settings
pub struct CredentialStore {
    credentials: ArcSwap<Credentials>,
    proxy: ArcSwap<ProxyConfig>,
    /// Where proxy settings persist as JSON; `None` disables persistence
    proxy_config_path: Option<PathBuf>,
}

impl CredentialStore {
    pub fn new(proxy_config_path: Option<PathBuf>) -> Self {
        Self {
            credentials: ArcSwap::from_pointee(Credentials::default()),
            proxy: ArcSwap::from_pointee(ProxyConfig::default()),
            proxy_config_path,
        }
    }

    /// Overwrite the account credentials
    ///
    /// Effective for subsequent requests; in-flight requests keep the
    /// snapshot they already took.
    pub fn set_account(&self, account: String, password: String) {
        self.credentials
            .store(Arc::new(Credentials { account, password }));
    }

    /// Snapshot of the current credentials
    pub fn credentials(&self) -> Arc<Credentials> {
        self.credentials.load_full()
    }

    /// Overwrite the proxy configuration and persist it when a path is
    /// configured
    pub async fn set_proxy(&self, config: ProxyConfig) -> Result<()> {
        info!(
            enabled = config.enabled,
            protocol = %config.protocol,
            host = %config.host,
            port = config.port,
            "set_proxy"
        );

        if let Some(path) = &self.proxy_config_path {
            persist_proxy_config(path, &config).await?;
        }
        self.proxy.store(Arc::new(config));
        Ok(())
    }

    /// Snapshot of the current proxy configuration
    pub fn proxy(&self) -> Arc<ProxyConfig> {
        self.proxy.load_full()
    }

    /// Load previously persisted proxy settings, if any
    pub async fn load_persisted_proxy(&self) -> Result<()> {
        let Some(path) = &self.proxy_config_path else {
            return Ok(());
        };
        if !path.is_file() {
            return Ok(());
        }

        let raw = tokio::fs::read(path).await?;
        let config: ProxyConfig = serde_json::from_slice(&raw)?;
        self.proxy.store(Arc::new(config));
        Ok(())
    }
}

/// Write the config to a sibling temp file, then rename over the target so
/// readers never observe a partial file
async fn persist_proxy_config(path: &Path, config: &ProxyConfig) -> Result<()> {
    let json = serde_json::to_vec_pretty(config)?;
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, &json).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProxyProtocol;

    #[test]
    fn test_set_account_snapshot_isolation() {
        let store = CredentialStore::new(None);

        let before = store.credentials();
        store.set_account("acct".to_string(), "secret".to_string());
        let after = store.credentials();

        // A snapshot taken before the write is unaffected by it.
        assert_eq!(before.account, "");
        assert_eq!(after.account, "acct");
        assert_eq!(after.password, "secret");
    }

    #[tokio::test]
    async fn test_set_proxy_without_persistence() {
        let store = CredentialStore::new(None);
        let config = ProxyConfig {
            enabled: true,
            protocol: ProxyProtocol::Socks5,
            host: "proxy.example".to_string(),
            port: 1080,
            username: None,
            password: None,
        };

        store.set_proxy(config.clone()).await.unwrap();
        assert_eq!(*store.proxy(), config);
    }

    #[tokio::test]
    async fn test_set_proxy_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxy.json");

        let store = CredentialStore::new(Some(path.clone()));
        let config = ProxyConfig {
            enabled: true,
            protocol: ProxyProtocol::Http,
            host: "proxy.example".to_string(),
            port: 3128,
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
        };
        store.set_proxy(config.clone()).await.unwrap();
        assert!(path.is_file());

        // A fresh store reads the persisted settings back.
        let reloaded = CredentialStore::new(Some(path));
        reloaded.load_persisted_proxy().await.unwrap();
        assert_eq!(*reloaded.proxy(), config);
    }

    #[tokio::test]
    async fn test_persist_failure_leaves_previous_config() {
        let store = CredentialStore::new(Some(PathBuf::from(
            "/nonexistent-dir/relay-front/proxy.json",
        )));

        let err = store
            .set_proxy(ProxyConfig {
                enabled: true,
                ..ProxyConfig::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::FrontError::Io(_)));

        // The in-memory config was not swapped.
        assert!(!store.proxy().enabled);
    }

    #[tokio::test]
    async fn test_load_persisted_proxy_missing_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(Some(dir.path().join("absent.json")));
        store.load_persisted_proxy().await.unwrap();
        assert_eq!(*store.proxy(), ProxyConfig::default());
    }
}
