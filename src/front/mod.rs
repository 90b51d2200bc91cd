//! Front facade
//!
//! Composes health monitoring, admission control, credential/endpoint
//! rotation, and request dispatch for one tunnel transport variant. Actual
//! I/O happens behind the collaborator traits in [`crate::collaborators`].

pub mod breaker;
pub mod credentials;
pub mod rotation;
pub mod stats;
pub mod sweeper;

pub use breaker::BreakerSnapshot;
pub use stats::TrafficSnapshot;

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::HeaderName;
use http::{HeaderMap, HeaderValue, Method};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::collaborators::{
    ConnectManager, ConnectionCreator, Dispatcher, HostMetadata, IpPool, TlsTrustContext,
};
use crate::config::FrontConfig;
use crate::error::Result;
use crate::models::{FrontResponse, HostEntry, ProxyConfig, ResponseMeta};

use breaker::FailureBreaker;
use credentials::CredentialStore;
use rotation::EndpointRotator;
use stats::StatsTracker;
use sweeper::{Sweeper, SweeperHandle};

/// Synthetic status for "no usable connection yielded a response in time";
/// never appears on the wire
pub const DISPATCH_TIMEOUT_STATUS: u16 = 602;

/// Header carrying the account credential on every outgoing request
pub const ACCOUNT_HEADER: HeaderName = HeaderName::from_static("xx-account");

/// Statuses that count as a healthy round trip. 405 means the tunnel
/// itself worked even though the method was rejected.
const HEALTHY_STATUSES: [u16; 2] = [200, 405];

/// Collaborator handles the front consumes
///
/// All I/O-bearing layers are injected; the front owns only bookkeeping.
pub struct FrontCollaborators {
    pub dispatcher: Arc<dyn Dispatcher>,
    pub connect_manager: Arc<dyn ConnectManager>,
    pub connection_creator: Arc<dyn ConnectionCreator>,
    pub ip_pool: Arc<dyn IpPool>,
    pub host_metadata: Arc<dyn HostMetadata>,
    pub tls_trust: Arc<dyn TlsTrustContext>,
}

/// The front controller for one tunnel transport
pub struct Front {
    stats: Arc<StatsTracker>,
    breaker: FailureBreaker,
    store: CredentialStore,
    rotator: EndpointRotator,
    dispatcher: Arc<dyn Dispatcher>,
    connect_manager: Arc<dyn ConnectManager>,
    connection_creator: Arc<dyn ConnectionCreator>,
    ip_pool: Arc<dyn IpPool>,
    sweeper_handle: SweeperHandle,
    sweeper_task: Mutex<Option<JoinHandle<()>>>,
}

impl Front {
    /// Construct the front and start its background sweeper
    ///
    /// Must be called within a tokio runtime; the sweeper task is spawned
    /// here and joined by [`Front::stop`].
    pub fn new(config: FrontConfig, collaborators: FrontCollaborators) -> Self {
        let stats = Arc::new(StatsTracker::new(config.rtt_window, config.traffic_window));

        let (sweeper_handle, shutdown_rx) = SweeperHandle::new();
        let sweeper = Sweeper::new(stats.clone(), config.sweep_interval);
        let sweeper_task = tokio::spawn(async move {
            sweeper.run(shutdown_rx).await;
        });

        Self {
            breaker: FailureBreaker::new(config.continuous_fail_limit, config.block_window),
            store: CredentialStore::new(config.proxy_config_path.clone()),
            rotator: EndpointRotator::new(
                collaborators.ip_pool.clone(),
                collaborators.host_metadata,
                collaborators.tls_trust,
                config.ca_bundle_path,
                config.default_ip_score,
            ),
            stats,
            dispatcher: collaborators.dispatcher,
            connect_manager: collaborators.connect_manager,
            connection_creator: collaborators.connection_creator,
            ip_pool: collaborators.ip_pool,
            sweeper_handle,
            sweeper_task: Mutex::new(Some(sweeper_task)),
        }
    }

    /// Overwrite the account credentials used for subsequent requests
    pub fn set_account(&self, account: String, password: String) {
        self.store.set_account(account, password);
    }

    /// Perform one request through the tunnel
    ///
    /// Injects the account header, dispatches with the caller timeout, and
    /// records the outcome. A dispatch timeout returns the synthetic 602
    /// status with empty content and updates neither the breaker nor the
    /// stats windows: no round trip completed, so the result is
    /// inconclusive. The breaker is not consulted here; callers gate on
    /// [`Front::get_score`] before choosing this front.
    pub async fn request(
        &self,
        method: Method,
        host: &str,
        path: &str,
        headers: HeaderMap,
        body: Bytes,
        timeout: Duration,
    ) -> FrontResponse {
        let mut headers = headers;
        let credentials = self.store.credentials();
        match HeaderValue::from_str(&credentials.account) {
            Ok(value) => {
                headers.insert(ACCOUNT_HEADER, value);
            }
            Err(_) => warn!("account credential is not a valid header value; header omitted"),
        }

        let sent = body.len() as u64;
        let started = Instant::now();

        let Some(mut response) = self
            .dispatcher
            .perform_request(method.clone(), host, path, headers, body, timeout)
            .await
        else {
            warn!("req {} get response timeout", path);
            return FrontResponse {
                content: Bytes::new(),
                status: DISPATCH_TIMEOUT_STATUS,
                meta: None,
            };
        };

        let status = response.status;
        if HEALTHY_STATUSES.contains(&status) {
            self.breaker.on_success();
        } else {
            self.breaker.on_failure();
        }

        let content = match response.read_all().await {
            Ok(content) => content,
            Err(e) => {
                warn!("{} {}{} body drain failed: {}", method, host, path, e);
                Bytes::new()
            }
        };

        let rtt = started.elapsed();
        let received = content.len() as u64;
        self.stats.record_sample(rtt, sent, received);

        if status == 200 {
            debug!(
                "{} {}{} status:{} rtt:{}ms",
                method,
                host,
                path,
                status,
                rtt.as_millis()
            );
        } else {
            warn!(
                "{} {}{} status:{} rtt:{}ms",
                method,
                host,
                path,
                status,
                rtt.as_millis()
            );
        }

        FrontResponse {
            content,
            status,
            meta: Some(ResponseMeta {
                rtt,
                sent,
                received,
            }),
        }
    }

    /// Current health score, or `None` when this front should not be used
    ///
    /// `None` means the breaker is inside its block window or no worker is
    /// obtainable without waiting. Otherwise the selected worker's opaque
    /// score is passed through unmodified.
    pub async fn get_score(&self) -> Option<f64> {
        if !self.breaker.admit() {
            return None;
        }

        let worker = self.dispatcher.select_worker(true).await?;
        Some(worker.score())
    }

    /// Apply a new candidate endpoint set
    pub async fn set_endpoints(&self, candidates: HashMap<IpAddr, HostEntry>) -> Result<()> {
        self.rotator.set_endpoints(candidates).await
    }

    /// Overwrite proxy settings; new connections pick them up, pooled
    /// connections are not recycled
    pub async fn set_proxy(&self, config: ProxyConfig) -> Result<()> {
        self.store.set_proxy(config).await?;
        self.connection_creator.refresh_config();
        Ok(())
    }

    /// Restore proxy settings persisted by an earlier run
    ///
    /// Call once after construction; a missing or unconfigured file is a
    /// no-op. New connections pick the restored settings up via the
    /// connection creator, as with [`Front::set_proxy`].
    pub async fn load_persisted_proxy(&self) -> Result<()> {
        self.store.load_persisted_proxy().await?;
        self.connection_creator.refresh_config();
        Ok(())
    }

    /// Current proxy settings snapshot
    pub fn proxy_config(&self) -> Arc<ProxyConfig> {
        self.store.proxy()
    }

    /// Maximum in-window round-trip time
    pub fn current_rtt(&self) -> Duration {
        self.stats.current_rtt()
    }

    /// Traffic accumulator snapshot
    pub fn traffic_snapshot(&self) -> TrafficSnapshot {
        self.stats.traffic_snapshot()
    }

    /// Breaker counter snapshot
    pub fn breaker_snapshot(&self) -> BreakerSnapshot {
        self.breaker.snapshot()
    }

    /// Number of workers currently pooled by the dispatcher
    pub fn worker_count(&self) -> usize {
        self.dispatcher.worker_count()
    }

    /// Shut down the front
    ///
    /// Clears the SSL-created hook, stops the dispatcher, connect manager,
    /// and IP pool, and joins the sweeper. Best-effort: in-flight requests
    /// are not aborted.
    pub async fn stop(&self) {
        info!("terminate");
        self.connect_manager.set_ssl_created_hook(None);
        self.dispatcher.stop();
        self.connect_manager.stop();
        self.ip_pool.stop();

        self.sweeper_handle.shutdown();
        let task = self.sweeper_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}
