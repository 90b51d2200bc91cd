//! External collaborator contracts
//!
//! The front consumes these interfaces but never implements the transport
//! behind them: connection establishment, certificate validation, IP
//! discovery, and HTTP framing all live on the other side of these traits.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::StreamExt;
use http::{HeaderMap, Method};

use crate::error::Result;
use crate::models::HostEntry;

/// Callback invoked by the connect layer whenever a TLS session is
/// established; cleared at shutdown
pub type SslCreatedHook = Arc<dyn Fn() + Send + Sync>;

/// An opaque handle to a pooled, ready-to-use relay connection
pub trait Worker: Send + Sync {
    /// Opaque ranking value used by upstream multi-front selection;
    /// passed through unmodified
    fn score(&self) -> f64;
}

/// Response produced by the dispatcher for one relay round trip
pub struct RelayResponse {
    pub status: u16,
    pub body: BoxStream<'static, std::io::Result<Bytes>>,
}

impl RelayResponse {
    pub fn new(status: u16, body: BoxStream<'static, std::io::Result<Bytes>>) -> Self {
        Self { status, body }
    }

    /// Build a response from an in-memory body (tests, stubs)
    pub fn from_bytes(status: u16, body: Bytes) -> Self {
        Self {
            status,
            body: futures::stream::once(async move { Ok(body) }).boxed(),
        }
    }

    /// Drain the full body into a single buffer
    pub async fn read_all(&mut self) -> std::io::Result<Bytes> {
        let mut content = BytesMut::new();
        while let Some(chunk) = self.body.next().await {
            content.extend_from_slice(&chunk?);
        }
        Ok(content.freeze())
    }
}

impl std::fmt::Debug for RelayResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Worker selection and request execution over the pooled connections
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Select the best current worker
    ///
    /// With `no_wait` set, returns `None` immediately when no worker is
    /// ready instead of blocking until one frees up.
    async fn select_worker(&self, no_wait: bool) -> Option<Arc<dyn Worker>>;

    /// Perform one request/response cycle
    ///
    /// Returns `None` when no usable connection yields a response within
    /// `timeout`.
    #[allow(clippy::too_many_arguments)]
    async fn perform_request(
        &self,
        method: Method,
        host: &str,
        path: &str,
        headers: HeaderMap,
        body: Bytes,
        timeout: Duration,
    ) -> Option<RelayResponse>;

    /// Number of workers currently in the pool
    fn worker_count(&self) -> usize;

    /// Stop accepting work and wind down the pool
    fn stop(&self);
}

/// Lifecycle hooks of the connection-establishment layer
pub trait ConnectManager: Send + Sync {
    fn set_ssl_created_hook(&self, hook: Option<SslCreatedHook>);
    fn stop(&self);
}

/// Candidate IP pool maintained by the discovery/scoring layer
pub trait IpPool: Send + Sync {
    /// Register a candidate IP with an initial score; a positive score
    /// makes it immediately eligible for selection
    fn add_candidate(&self, ip: IpAddr, initial_score: i32);

    /// Persist the candidate list to durable storage
    fn persist(&self, force: bool);

    fn stop(&self);
}

/// Per-IP routing metadata (SNI, CA certificate) consumed by the connect
/// layer when dialing
pub trait HostMetadata: Send + Sync {
    fn set_hosts(&self, hosts: HashMap<IpAddr, HostEntry>);
}

/// TLS trust anchors shared by all new connections
pub trait TlsTrustContext: Send + Sync {
    /// Reload trusted CAs from the bundle file at `path`
    fn set_trusted_ca_bundle(&self, path: &Path) -> Result<()>;
}

/// Factory for outbound connections; re-reads proxy settings on refresh
pub trait ConnectionCreator: Send + Sync {
    fn refresh_config(&self);
}
