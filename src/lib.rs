//! Relay Front - Tunnel Front Controller
//!
//! Client-side front controller for a TLS-tunneled relay transport.
//!
//! ## Features
//!
//! - Sliding-window RTT and traffic accounting with background eviction
//! - Continuous-failure circuit breaker with time-based self-healing
//! - Atomic credential and proxy configuration rotation
//! - Endpoint rotation with deduplicated, atomically written CA bundles
//! - Uniform request API over an injected dispatcher/connection layer

pub mod collaborators;
pub mod config;
pub mod error;
pub mod front;
pub mod models;

pub use config::FrontConfig;
pub use error::{FrontError, Result};
pub use front::{
    BreakerSnapshot, Front, FrontCollaborators, TrafficSnapshot, ACCOUNT_HEADER,
    DISPATCH_TIMEOUT_STATUS,
};
pub use models::{Credentials, FrontResponse, HostEntry, ProxyConfig, ProxyProtocol, ResponseMeta};
