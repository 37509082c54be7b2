//! Host fingerprinters.
//!
//! This module provides the [`Fingerprinter`] trait and the protocol
//! fingerprinters built into the agent. Each one probes a single host (or
//! reads what the port scan already saw) and reports the services and OS
//! details it can positively identify.
//!
//! # Available Fingerprinters
//!
//! | Fingerprinter | Probe | Reports OS |
//! |---------------|-------|------------|
//! | [`SshFingerprinter`] | Port-scan banners (passive) | Yes |
//! | [`HttpFingerprinter`] | `HEAD` over HTTPS, then HTTP | No |
//! | [`MssqlFingerprinter`] | SQL Server Browser, UDP 1434 | No |
//!
//! # Example
//!
//! ```no_run
//! use lateral_recon::fingerprinter::{all_fingerprinters, PortScanMap};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let host = "192.168.56.10".parse().unwrap();
//!     let ports = PortScanMap::new();
//!
//!     for fingerprinter in all_fingerprinters(Duration::from_millis(1500)) {
//!         let data = fingerprinter
//!             .get_host_fingerprint(host, None, &ports, &serde_json::Value::Null)
//!             .await;
//!         println!("{}: {} services", fingerprinter.name(), data.services().len());
//!     }
//! }
//! ```

mod http;
mod mssql;
mod ssh;

pub use http::{HttpFingerprinter, DEFAULT_HTTP_PORTS};
pub use mssql::{
    parse_browser_response, MssqlFingerprinter, SqlBrowserTransport, UdpSqlBrowser,
    SQL_BROWSER_DEFAULT_PORT,
};
pub use ssh::SshFingerprinter;

use crate::model::{FingerprintData, NetworkPort, PingScanData, PortScanData};
use crate::plugin::{instantiation_error, AgentPluginType, PluginRegistry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

/// Port-scan results for one host, keyed by port.
pub type PortScanMap = HashMap<NetworkPort, PortScanData>;

/// Trait for identifying the services and OS of a remote host.
///
/// Network failures never surface as errors: a probe that times out, is
/// refused, or gets a garbled reply contributes an empty or partial
/// [`FingerprintData`].
#[async_trait]
pub trait Fingerprinter: Send + Sync {
    /// Returns the plugin name this fingerprinter is registered under.
    fn name(&self) -> &'static str;

    /// Probes `host` and returns what could be identified.
    ///
    /// `options` is the free-form option table configured for this plugin
    /// (`Value::Null` when none is set).
    async fn get_host_fingerprint(
        &self,
        host: IpAddr,
        ping_scan_data: Option<&PingScanData>,
        port_scan_data: &PortScanMap,
        options: &serde_json::Value,
    ) -> FingerprintData;
}

/// Returns every fingerprinter built into the agent, in default order.
pub fn all_fingerprinters(probe_timeout: Duration) -> Vec<Box<dyn Fingerprinter>> {
    vec![
        Box::new(SshFingerprinter),
        Box::new(HttpFingerprinter::new(probe_timeout)),
        Box::new(MssqlFingerprinter::new(probe_timeout)),
    ]
}

/// Returns the fingerprinter registered under `name`, if any.
pub fn get_fingerprinter(name: &str, probe_timeout: Duration) -> Option<Box<dyn Fingerprinter>> {
    all_fingerprinters(probe_timeout)
        .into_iter()
        .find(|f| f.name() == name)
}

/// Registry of the fingerprinters compiled into this agent.
pub fn builtin_fingerprinters(probe_timeout: Duration) -> PluginRegistry<dyn Fingerprinter> {
    let mut registry: PluginRegistry<dyn Fingerprinter> =
        PluginRegistry::new(AgentPluginType::Fingerprinter);

    for fingerprinter in all_fingerprinters(probe_timeout) {
        let name = fingerprinter.name();
        registry = registry.register(name, move |_| {
            get_fingerprinter(name, probe_timeout)
                .ok_or_else(|| instantiation_error(name, "not built in"))
        });
    }

    registry
}
