use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;

/// A TCP or UDP port number.
pub type NetworkPort = u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkProtocol {
    Tcp,
    Udp,
}

impl NetworkProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkProtocol::Tcp => "tcp",
            NetworkProtocol::Udp => "udp",
        }
    }
}

impl std::fmt::Display for NetworkProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortStatus {
    Open,
    Closed,
    Filtered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkService {
    Ftp,
    Ssh,
    Telnet,
    Http,
    Https,
    Smb,
    Mssql,
    MssqlBrowser,
    Mysql,
    Postgresql,
    Rdp,
    Redis,
    Mongodb,
    Unknown,
}

impl NetworkService {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkService::Ftp => "ftp",
            NetworkService::Ssh => "ssh",
            NetworkService::Telnet => "telnet",
            NetworkService::Http => "http",
            NetworkService::Https => "https",
            NetworkService::Smb => "smb",
            NetworkService::Mssql => "mssql",
            NetworkService::MssqlBrowser => "mssql-browser",
            NetworkService::Mysql => "mysql",
            NetworkService::Postgresql => "postgresql",
            NetworkService::Rdp => "rdp",
            NetworkService::Redis => "redis",
            NetworkService::Mongodb => "mongodb",
            NetworkService::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for NetworkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingSystem {
    Linux,
    Windows,
}

impl std::fmt::Display for OperatingSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperatingSystem::Linux => write!(f, "linux"),
            OperatingSystem::Windows => write!(f, "windows"),
        }
    }
}

/// Result of the ICMP sweep that precedes fingerprinting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PingScanData {
    pub response_received: bool,
    #[serde(default)]
    pub os: Option<OperatingSystem>,
}

/// Raw per-port observation produced by the port scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortScanData {
    pub port: NetworkPort,
    pub status: PortStatus,
    #[serde(default)]
    pub banner: String,
    #[serde(default = "unknown_service")]
    pub service: NetworkService,
}

fn unknown_service() -> NetworkService {
    NetworkService::Unknown
}

impl PortScanData {
    pub fn open(port: NetworkPort, service: NetworkService) -> Self {
        Self {
            port,
            status: PortStatus::Open,
            banner: String::new(),
            service,
        }
    }

    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = banner.into();
        self
    }

    pub fn is_open(&self) -> bool {
        self.status == PortStatus::Open
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiscoveredService {
    pub protocol: NetworkProtocol,
    pub port: NetworkPort,
    pub service: NetworkService,
}

impl DiscoveredService {
    pub fn new(protocol: NetworkProtocol, port: NetworkPort, service: NetworkService) -> Self {
        Self {
            protocol,
            port,
            service,
        }
    }

    pub fn tcp(port: NetworkPort, service: NetworkService) -> Self {
        Self::new(NetworkProtocol::Tcp, port, service)
    }

    pub fn udp(port: NetworkPort, service: NetworkService) -> Self {
        Self::new(NetworkProtocol::Udp, port, service)
    }
}

/// Inferred OS identity and exposed services of one host.
///
/// `services` never holds two equal [`DiscoveredService`] values; all
/// constructors and [`FingerprintData::merge`] collapse duplicates while
/// keeping first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintData {
    pub os_type: Option<OperatingSystem>,
    pub os_version: Option<String>,
    #[serde(deserialize_with = "deserialize_services")]
    services: Vec<DiscoveredService>,
}

impl FingerprintData {
    pub fn new(
        os_type: Option<OperatingSystem>,
        os_version: Option<String>,
        services: impl IntoIterator<Item = DiscoveredService>,
    ) -> Self {
        Self {
            os_type,
            os_version,
            services: dedup_services(services),
        }
    }

    /// A fingerprint with no OS data and no services.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_services(services: impl IntoIterator<Item = DiscoveredService>) -> Self {
        Self::new(None, None, services)
    }

    pub fn services(&self) -> &[DiscoveredService] {
        &self.services
    }

    pub fn is_empty(&self) -> bool {
        self.os_type.is_none() && self.os_version.is_none() && self.services.is_empty()
    }

    /// Folds `other` into `self`.
    ///
    /// OS fields already set on `self` are kept (first observation wins);
    /// services are unioned.
    pub fn merge(&mut self, other: FingerprintData) {
        if self.os_type.is_none() {
            self.os_type = other.os_type;
        }
        if self.os_version.is_none() {
            self.os_version = other.os_version;
        }
        for service in other.services {
            if !self.services.contains(&service) {
                self.services.push(service);
            }
        }
    }
}

/// Fingerprint of one probed host, as reported to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFingerprint {
    pub host: IpAddr,
    #[serde(flatten)]
    pub fingerprint: FingerprintData,
}

fn dedup_services(services: impl IntoIterator<Item = DiscoveredService>) -> Vec<DiscoveredService> {
    let mut seen = HashSet::new();
    services
        .into_iter()
        .filter(|service| seen.insert(*service))
        .collect()
}

fn deserialize_services<'de, D>(deserializer: D) -> Result<Vec<DiscoveredService>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let services = Vec::<DiscoveredService>::deserialize(deserializer)?;
    Ok(dedup_services(services))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_collapses_duplicate_services() {
        let data = FingerprintData::from_services([
            DiscoveredService::tcp(1433, NetworkService::Mssql),
            DiscoveredService::udp(1434, NetworkService::MssqlBrowser),
            DiscoveredService::tcp(1433, NetworkService::Mssql),
        ]);

        assert_eq!(data.services().len(), 2);
        assert_eq!(data.services()[0], DiscoveredService::tcp(1433, NetworkService::Mssql));
    }

    #[test]
    fn test_same_port_different_protocol_is_distinct() {
        let data = FingerprintData::from_services([
            DiscoveredService::tcp(53, NetworkService::Unknown),
            DiscoveredService::udp(53, NetworkService::Unknown),
        ]);

        assert_eq!(data.services().len(), 2);
    }

    #[test]
    fn test_merge_keeps_first_os_observation() {
        let mut data = FingerprintData::new(Some(OperatingSystem::Linux), None, []);
        data.merge(FingerprintData::new(
            Some(OperatingSystem::Windows),
            Some("10.0".to_string()),
            [DiscoveredService::tcp(22, NetworkService::Ssh)],
        ));

        assert_eq!(data.os_type, Some(OperatingSystem::Linux));
        assert_eq!(data.os_version.as_deref(), Some("10.0"));
        assert_eq!(data.services().len(), 1);
    }

    #[test]
    fn test_deserialize_dedups_services() {
        let json = r#"{
            "os_type": null,
            "os_version": null,
            "services": [
                {"protocol": "udp", "port": 1434, "service": "mssql-browser"},
                {"protocol": "udp", "port": 1434, "service": "mssql-browser"}
            ]
        }"#;

        let data: FingerprintData = serde_json::from_str(json).unwrap();
        assert_eq!(
            data.services(),
            &[DiscoveredService::udp(1434, NetworkService::MssqlBrowser)]
        );
    }

    #[test]
    fn test_port_scan_data_defaults() {
        let json = r#"{"port": 22, "status": "open"}"#;
        let data: PortScanData = serde_json::from_str(json).unwrap();

        assert!(data.is_open());
        assert_eq!(data.service, NetworkService::Unknown);
        assert!(data.banner.is_empty());
    }
}
