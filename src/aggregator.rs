//! Runs the configured fingerprinters against hosts and merges their findings.

use crate::error::PluginError;
use crate::fingerprinter::PortScanMap;
use crate::model::{FingerprintData, HostFingerprint, PingScanData};
use crate::plugin::{FingerprinterPluginFactory, PluginFactory};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::collections::HashMap;
use std::net::IpAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

pub const DEFAULT_OPERATION_DEADLINE: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_CONCURRENT_PROBES: usize = 64;
pub const DEFAULT_MAX_CONCURRENT_HOSTS: usize = 8;

/// One host to fingerprint, with what earlier scans learned about it.
#[derive(Debug, Clone)]
pub struct HostTarget {
    pub host: IpAddr,
    pub ping_scan_data: Option<PingScanData>,
    pub port_scan_data: PortScanMap,
}

impl HostTarget {
    pub fn new(host: IpAddr, port_scan_data: PortScanMap) -> Self {
        Self {
            host,
            ping_scan_data: None,
            port_scan_data,
        }
    }
}

/// Fans a host out to every configured fingerprinter.
///
/// Plugins run concurrently, but results are merged in configured order:
/// the first plugin to report an OS type or version decides it. A plugin
/// that panics or overruns the deadline contributes nothing and does not
/// affect the others. Dropping an aggregation before it completes cancels
/// its probes and releases their permits.
pub struct FingerprintAggregator {
    factory: FingerprinterPluginFactory,
    fingerprinters: Vec<String>,
    options: HashMap<String, serde_json::Value>,
    deadline: Duration,
    probe_permits: Arc<Semaphore>,
    max_concurrent_hosts: usize,
}

impl FingerprintAggregator {
    pub fn new<I, S>(factory: FingerprinterPluginFactory, fingerprinters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            factory,
            fingerprinters: fingerprinters.into_iter().map(Into::into).collect(),
            options: HashMap::new(),
            deadline: DEFAULT_OPERATION_DEADLINE,
            probe_permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_PROBES)),
            max_concurrent_hosts: DEFAULT_MAX_CONCURRENT_HOSTS,
        }
    }

    /// Per-plugin option tables, keyed by plugin name.
    pub fn with_options(mut self, options: HashMap<String, serde_json::Value>) -> Self {
        self.options = options;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_max_concurrent_probes(mut self, max: usize) -> Self {
        self.probe_permits = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    pub fn with_max_concurrent_hosts(mut self, max: usize) -> Self {
        self.max_concurrent_hosts = max.max(1);
        self
    }

    pub fn fingerprinters(&self) -> &[String] {
        &self.fingerprinters
    }

    /// Fingerprints one host.
    ///
    /// # Errors
    ///
    /// Fails before any probe is sent if a configured fingerprinter cannot
    /// be created. Network trouble never makes this fail.
    pub async fn fingerprint_host(
        &self,
        host: IpAddr,
        ping_scan_data: Option<&PingScanData>,
        port_scan_data: &PortScanMap,
    ) -> Result<FingerprintData, PluginError> {
        let plugins = self
            .fingerprinters
            .iter()
            .map(|name| self.factory.create(name))
            .collect::<Result<Vec<_>, _>>()?;

        let ping_scan_data = ping_scan_data.copied();
        let port_scan_data = Arc::new(port_scan_data.clone());
        let count = plugins.len();

        // Dropping the set aborts every probe still in flight.
        let mut probes = JoinSet::new();
        for (index, plugin) in plugins.into_iter().enumerate() {
            let name = plugin.name().to_string();
            let options = self
                .options
                .get(&name)
                .cloned()
                .unwrap_or(serde_json::Value::Null);
            let permits = Arc::clone(&self.probe_permits);
            let port_scan_data = Arc::clone(&port_scan_data);
            let deadline = self.deadline;

            probes.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let run = plugin.run(host, ping_scan_data.as_ref(), &port_scan_data, &options);
                let outcome = AssertUnwindSafe(tokio::time::timeout(deadline, run))
                    .catch_unwind()
                    .await;
                (index, name, outcome)
            });
        }

        let mut findings: Vec<Option<FingerprintData>> = (0..count).map(|_| None).collect();
        while let Some(joined) = probes.join_next().await {
            let (index, name, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    warn!(%host, error = %e, "Fingerprinter task lost");
                    continue;
                }
            };

            match outcome {
                Ok(Ok(data)) => {
                    debug!(%host, fingerprinter = %name, services = data.services().len(), "Fingerprinter finished");
                    findings[index] = Some(data);
                }
                Ok(Err(_)) => {
                    warn!(%host, fingerprinter = %name, deadline_ms = self.deadline.as_millis() as u64, "Fingerprinter timed out");
                }
                Err(_) => {
                    warn!(%host, fingerprinter = %name, "Fingerprinter panicked");
                }
            }
        }

        let mut merged = FingerprintData::empty();
        for data in findings.into_iter().flatten() {
            merged.merge(data);
        }

        Ok(merged)
    }

    /// Fingerprints many hosts, at most `max_concurrent_hosts` at a time.
    ///
    /// Results come back in input order. `on_complete` is called for each
    /// host as its result is yielded.
    pub async fn fingerprint_hosts<F>(
        &self,
        targets: &[HostTarget],
        on_complete: F,
    ) -> Result<Vec<HostFingerprint>, PluginError>
    where
        F: Fn(&HostFingerprint),
    {
        let mut results = stream::iter(targets)
            .map(|target| async move {
                let fingerprint = self
                    .fingerprint_host(
                        target.host,
                        target.ping_scan_data.as_ref(),
                        &target.port_scan_data,
                    )
                    .await?;
                Ok::<_, PluginError>(HostFingerprint {
                    host: target.host,
                    fingerprint,
                })
            })
            .buffered(self.max_concurrent_hosts);

        let mut fingerprints = Vec::with_capacity(targets.len());
        while let Some(result) = results.next().await {
            let fingerprint = result?;
            on_complete(&fingerprint);
            fingerprints.push(fingerprint);
        }

        Ok(fingerprints)
    }
}
