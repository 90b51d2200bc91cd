//! Endpoint rotation
//!
//! Merges a new candidate set into the IP pool, updates per-IP routing
//! metadata, and rewrites the trusted CA bundle. The bundle write is atomic
//! (temp file + rename) so concurrent readers never see a torn file; pool
//! and metadata updates applied before a failed write are not rolled back.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::collaborators::{HostMetadata, IpPool, TlsTrustContext};
use crate::error::Result;
use crate::models::HostEntry;

/// Applies candidate endpoint sets to the IP pool, host metadata, and the
/// trusted CA bundle
pub struct EndpointRotator {
    ip_pool: Arc<dyn IpPool>,
    host_metadata: Arc<dyn HostMetadata>,
    tls_trust: Arc<dyn TlsTrustContext>,
    ca_bundle_path: PathBuf,
    default_ip_score: i32,
    /// At most one rotation in flight; requests are not blocked
    rotate_lock: Mutex<()>,
}

impl EndpointRotator {
    pub fn new(
        ip_pool: Arc<dyn IpPool>,
        host_metadata: Arc<dyn HostMetadata>,
        tls_trust: Arc<dyn TlsTrustContext>,
        ca_bundle_path: PathBuf,
        default_ip_score: i32,
    ) -> Self {
        Self {
            ip_pool,
            host_metadata,
            tls_trust,
            ca_bundle_path,
            default_ip_score,
            rotate_lock: Mutex::new(()),
        }
    }

    /// Merge a candidate endpoint set into the active state
    ///
    /// Registers each IP with a default positive score, records its
    /// SNI/CA metadata, rewrites the CA bundle with the distinct CA blocks
    /// (blank-line separated, first-seen order), and reloads the TLS trust
    /// context from the new bundle. An empty candidate set is a no-op.
    pub async fn set_endpoints(&self, candidates: HashMap<IpAddr, HostEntry>) -> Result<()> {
        if candidates.is_empty() {
            return Ok(());
        }

        let _guard = self.rotate_lock.lock().await;

        let mut host_info = HashMap::with_capacity(candidates.len());
        let mut ca_certs: Vec<&str> = Vec::new();
        let mut applied_ips = Vec::with_capacity(candidates.len());

        for (ip, entry) in &candidates {
            self.ip_pool.add_candidate(*ip, self.default_ip_score);
            host_info.insert(*ip, entry.clone());
            if !ca_certs.contains(&entry.ca_cert.as_str()) {
                ca_certs.push(entry.ca_cert.as_str());
            }
            applied_ips.push(ip.to_string());
        }

        self.ip_pool.persist(true);
        self.host_metadata.set_hosts(host_info);

        let bundle = ca_certs.join("\n\n");
        if let Err(e) = self.write_ca_bundle(&bundle).await {
            // Pool and metadata updates stay applied; the previous bundle
            // remains in effect.
            warn!("CA bundle write failed: {}", e);
            return Err(e);
        }

        self.tls_trust.set_trusted_ca_bundle(&self.ca_bundle_path)?;

        info!("set_endpoints applied: {}", applied_ips.join(","));
        Ok(())
    }

    /// Write the bundle to a sibling temp file, then rename it over the
    /// bundle path
    async fn write_ca_bundle(&self, bundle: &str) -> Result<()> {
        let tmp_path = self.ca_bundle_path.with_extension("tmp");
        tokio::fs::write(&tmp_path, bundle).await?;
        tokio::fs::rename(&tmp_path, &self.ca_bundle_path).await?;
        Ok(())
    }
}
