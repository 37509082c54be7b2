use super::{Fingerprinter, PortScanMap};
use crate::model::{DiscoveredService, FingerprintData, NetworkPort, NetworkService, PingScanData};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_HTTP_PORTS: [NetworkPort; 8] = [80, 8080, 443, 8008, 7001, 9200, 8983, 9600];

#[derive(Debug, Deserialize)]
struct HttpOptions {
    #[serde(default = "default_http_ports")]
    http_ports: Vec<NetworkPort>,
}

fn default_http_ports() -> Vec<NetworkPort> {
    DEFAULT_HTTP_PORTS.to_vec()
}

impl HttpOptions {
    /// Unparseable options fall back to the defaults.
    fn from_value(options: &serde_json::Value) -> Self {
        serde_json::from_value(options.clone()).unwrap_or_else(|_| Self {
            http_ports: default_http_ports(),
        })
    }
}

/// Detects web servers on ports the port scan found open.
///
/// Each candidate port gets a `HEAD /` over HTTPS first and over plain HTTP
/// if that fails. Certificates are not validated. Ports are probed one at a
/// time and connections are not pooled, so a run holds at most one socket.
pub struct HttpFingerprinter {
    timeout: Duration,
}

impl HttpFingerprinter {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn probe(client: &Client, host: IpAddr, port: NetworkPort) -> Option<DiscoveredService> {
        let addr = SocketAddr::new(host, port);
        for (scheme, service) in [("https", NetworkService::Https), ("http", NetworkService::Http)] {
            let url = format!("{}://{}/", scheme, addr);
            match client.head(&url).send().await {
                Ok(response) => {
                    debug!(%url, status = response.status().as_u16(), "Web server responded");
                    return Some(DiscoveredService::tcp(port, service));
                }
                Err(e) => debug!(%url, error = %e, "HEAD request failed"),
            }
        }
        None
    }
}

#[async_trait]
impl Fingerprinter for HttpFingerprinter {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn get_host_fingerprint(
        &self,
        host: IpAddr,
        _ping_scan_data: Option<&PingScanData>,
        port_scan_data: &PortScanMap,
        options: &serde_json::Value,
    ) -> FingerprintData {
        let options = HttpOptions::from_value(options);
        let candidates: Vec<NetworkPort> = options
            .http_ports
            .into_iter()
            .filter(|port| port_scan_data.get(port).is_some_and(|data| data.is_open()))
            .collect();

        if candidates.is_empty() {
            return FingerprintData::empty();
        }

        let client = match Client::builder()
            .danger_accept_invalid_certs(true)
            .pool_max_idle_per_host(0)
            .timeout(self.timeout)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                debug!(error = %e, "Failed to build HTTP client");
                return FingerprintData::empty();
            }
        };

        let mut services = Vec::with_capacity(candidates.len());
        for port in candidates {
            if let Some(service) = Self::probe(&client, host, port).await {
                services.push(service);
            }
        }

        FingerprintData::from_services(services)
    }
}
