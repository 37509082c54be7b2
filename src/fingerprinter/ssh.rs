use super::{Fingerprinter, PortScanMap};
use crate::model::{
    DiscoveredService, FingerprintData, NetworkService, OperatingSystem, PingScanData,
};
use async_trait::async_trait;
use std::net::IpAddr;

/// Distributions whose SSH banners give away the OS.
const LINUX_DIST_SSH: [&str; 2] = ["ubuntu", "debian"];

/// Identifies SSH servers from banners the port scan already collected.
///
/// Sends no traffic of its own.
pub struct SshFingerprinter;

impl SshFingerprinter {
    fn os_from_banner(banner: &str) -> Option<(OperatingSystem, String)> {
        let lowered = banner.to_lowercase();
        if !LINUX_DIST_SSH.iter().any(|dist| lowered.contains(dist)) {
            return None;
        }

        let version = banner.split_whitespace().last()?;
        Some((OperatingSystem::Linux, version.to_string()))
    }
}

#[async_trait]
impl Fingerprinter for SshFingerprinter {
    fn name(&self) -> &'static str {
        "ssh"
    }

    async fn get_host_fingerprint(
        &self,
        _host: IpAddr,
        _ping_scan_data: Option<&PingScanData>,
        port_scan_data: &PortScanMap,
        _options: &serde_json::Value,
    ) -> FingerprintData {
        let mut ssh_ports: Vec<_> = port_scan_data
            .values()
            .filter(|data| data.is_open() && data.service == NetworkService::Ssh)
            .collect();
        ssh_ports.sort_by_key(|data| data.port);

        let mut fingerprint = FingerprintData::empty();
        for data in ssh_ports {
            let (os_type, os_version) = match Self::os_from_banner(&data.banner) {
                Some((os, version)) => (Some(os), Some(version)),
                None => (None, None),
            };
            fingerprint.merge(FingerprintData::new(
                os_type,
                os_version,
                [DiscoveredService::tcp(data.port, NetworkService::Ssh)],
            ));
        }

        fingerprint
    }
}
