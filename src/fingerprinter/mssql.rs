//! SQL Server Browser fingerprinter.
//!
//! Sends a `CLNT_UCAST_EX` request to the browser service and reads the
//! instance list from its `SVR_RESP` reply:
//!
//! ```text
//! 0x05 | len (u16 LE) | ServerName;X;InstanceName;Y;IsClustered;No;Version;Z;tcp;1433;;...
//! ```

use crate::model::{DiscoveredService, FingerprintData, NetworkPort, NetworkService, PingScanData};
use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::debug;

use super::{Fingerprinter, PortScanMap};

pub const SQL_BROWSER_DEFAULT_PORT: NetworkPort = 1434;

const CLNT_UCAST_EX: u8 = 0x03;
const SVR_RESP: u8 = 0x05;
const SVR_RESP_HEADER_LEN: usize = 3;
const MAX_RESPONSE_LEN: usize = SVR_RESP_HEADER_LEN + u16::MAX as usize;
const INSTANCE_TERMINATOR: &str = ";;";

/// How the fingerprinter reaches a SQL Server Browser.
#[async_trait]
pub trait SqlBrowserTransport: Send + Sync {
    /// Sends one instance-enumeration request and returns the raw reply.
    async fn query(&self, host: IpAddr) -> io::Result<Vec<u8>>;
}

/// Queries the browser over a single UDP datagram exchange.
pub struct UdpSqlBrowser {
    port: NetworkPort,
    timeout: Duration,
}

impl UdpSqlBrowser {
    pub fn new(timeout: Duration) -> Self {
        Self::with_port(SQL_BROWSER_DEFAULT_PORT, timeout)
    }

    pub fn with_port(port: NetworkPort, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

#[async_trait]
impl SqlBrowserTransport for UdpSqlBrowser {
    async fn query(&self, host: IpAddr) -> io::Result<Vec<u8>> {
        let local: SocketAddr = match host {
            IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).await?;
        socket.send_to(&[CLNT_UCAST_EX], (host, self.port)).await?;

        let mut buf = vec![0u8; MAX_RESPONSE_LEN];
        let (len, _) = tokio::time::timeout(self.timeout, socket.recv_from(&mut buf))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "SQL Server Browser did not reply"))??;

        buf.truncate(len);
        Ok(buf)
    }
}

/// Extracts the announced TCP ports from a browser reply.
///
/// Returns `None` when the reply lacks the `SVR_RESP` header or announces no
/// TCP endpoint. Bytes that are not valid UTF-8 are replaced, not rejected.
///
/// Only the body length announced in the header is read. An instance that
/// is not closed by `;;` was cut off in transit and is ignored.
pub fn parse_browser_response(response: &[u8]) -> Option<Vec<NetworkPort>> {
    if response.len() < SVR_RESP_HEADER_LEN || response[0] != SVR_RESP {
        return None;
    }

    let announced = usize::from(u16::from_le_bytes([response[1], response[2]]));
    let received = &response[SVR_RESP_HEADER_LEN..];
    if announced > received.len() {
        debug!(announced, received = received.len(), "Truncated SQL Server Browser reply");
    }
    let body = String::from_utf8_lossy(&received[..announced.min(received.len())]);

    let terminated = match body.rfind(INSTANCE_TERMINATOR) {
        Some(end) => &body[..end],
        None => "",
    };
    let ports: Vec<NetworkPort> = terminated
        .split(INSTANCE_TERMINATOR)
        .filter(|instance| !instance.is_empty())
        .filter_map(|instance| {
            let fields: Vec<&str> = instance.split(';').collect();
            fields
                .chunks(2)
                .find(|pair| pair.len() == 2 && pair[0].eq_ignore_ascii_case("tcp"))
                .and_then(|pair| pair[1].trim().parse().ok())
        })
        .collect();

    if ports.is_empty() {
        None
    } else {
        Some(ports)
    }
}

pub struct MssqlFingerprinter {
    transport: Box<dyn SqlBrowserTransport>,
}

impl MssqlFingerprinter {
    pub fn new(timeout: Duration) -> Self {
        Self::with_transport(Box::new(UdpSqlBrowser::new(timeout)))
    }

    pub fn with_transport(transport: Box<dyn SqlBrowserTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Fingerprinter for MssqlFingerprinter {
    fn name(&self) -> &'static str {
        "mssql"
    }

    async fn get_host_fingerprint(
        &self,
        host: IpAddr,
        _ping_scan_data: Option<&PingScanData>,
        _port_scan_data: &PortScanMap,
        _options: &serde_json::Value,
    ) -> FingerprintData {
        let response = match self.transport.query(host).await {
            Ok(response) => response,
            Err(e) => {
                debug!(%host, error = %e, "SQL Server Browser query failed");
                return FingerprintData::empty();
            }
        };

        match parse_browser_response(&response) {
            Some(ports) => {
                debug!(%host, ports = ?ports, "SQL Server instances found");
                let instances = ports
                    .into_iter()
                    .map(|port| DiscoveredService::tcp(port, NetworkService::Mssql));
                let browser =
                    DiscoveredService::udp(SQL_BROWSER_DEFAULT_PORT, NetworkService::MssqlBrowser);
                FingerprintData::from_services(instances.chain(std::iter::once(browser)))
            }
            None => {
                debug!(%host, len = response.len(), "Unrecognized SQL Server Browser reply");
                FingerprintData::from_services([DiscoveredService::udp(
                    SQL_BROWSER_DEFAULT_PORT,
                    NetworkService::Unknown,
                )])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NetworkProtocol, PortScanData};

    const SUCCESSFUL_RESPONSE: &[u8] = b"\x05y\x00ServerName;BogusVogus;InstanceName;GhostServer;\
IsClustered;No;Version;11.1.1111.111;tcp;1433;np;blah_blah;;";

    const MANGLED_RESPONSE: &[u8] = b"Lorem ipsum dolor sit amet, consectetur adipiscing elit. \
Pellentesque ultrices ornare libero, ;;";

    struct Canned(io::Result<Vec<u8>>);

    #[async_trait]
    impl SqlBrowserTransport for Canned {
        async fn query(&self, _host: IpAddr) -> io::Result<Vec<u8>> {
            match &self.0 {
                Ok(bytes) => Ok(bytes.clone()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            }
        }
    }

    fn bogus_port_scan() -> PortScanMap {
        PortScanMap::from([
            (80, PortScanData::open(80, NetworkService::Http)),
            (8080, PortScanData::open(8080, NetworkService::Https)),
        ])
    }

    async fn fingerprint(transport: impl SqlBrowserTransport + 'static) -> FingerprintData {
        MssqlFingerprinter::with_transport(Box::new(transport))
            .get_host_fingerprint(
                "127.0.0.1".parse().unwrap(),
                None,
                &bogus_port_scan(),
                &serde_json::Value::Null,
            )
            .await
    }

    #[tokio::test]
    async fn test_mssql_fingerprint_successful() {
        let data = fingerprint(Canned(Ok(SUCCESSFUL_RESPONSE.to_vec()))).await;

        assert_eq!(data.os_type, None);
        assert_eq!(data.os_version, None);
        assert_eq!(
            data.services(),
            &[
                DiscoveredService::tcp(1433, NetworkService::Mssql),
                DiscoveredService::udp(SQL_BROWSER_DEFAULT_PORT, NetworkService::MssqlBrowser),
            ]
        );
    }

    #[tokio::test]
    async fn test_mssql_no_response_from_server() {
        for kind in [
            io::ErrorKind::TimedOut,
            io::ErrorKind::ConnectionRefused,
            io::ErrorKind::Other,
        ] {
            let data = fingerprint(Canned(Err(io::Error::new(kind, "probe failed")))).await;
            assert!(data.is_empty());
        }
    }

    #[tokio::test]
    async fn test_mssql_wrong_response_from_server() {
        let data = fingerprint(Canned(Ok(MANGLED_RESPONSE.to_vec()))).await;

        assert_eq!(data.os_type, None);
        assert_eq!(data.os_version, None);
        assert_eq!(data.services().len(), 1);

        let service = data.services()[0];
        assert_eq!(service.service, NetworkService::Unknown);
        assert_eq!(service.port, SQL_BROWSER_DEFAULT_PORT);
        assert_eq!(service.protocol, NetworkProtocol::Udp);
    }

    fn browser_reply(body: &[u8]) -> Vec<u8> {
        let len = u16::try_from(body.len()).unwrap();
        let mut reply = vec![SVR_RESP];
        reply.extend_from_slice(&len.to_le_bytes());
        reply.extend_from_slice(body);
        reply
    }

    fn many_instances(count: u16) -> (Vec<u8>, Vec<NetworkPort>) {
        let ports: Vec<NetworkPort> = (0..count).map(|i| 40000 + i).collect();
        let body: String = ports
            .iter()
            .map(|port| {
                format!(
                    "ServerName;DBHOST;InstanceName;INST{port};IsClustered;No;\
Version;15.0.2000.5;tcp;{port};np;\\\\DBHOST\\pipe\\MSSQL$INST{port}\\sql\\query;;"
                )
            })
            .collect();
        (browser_reply(body.as_bytes()), ports)
    }

    #[test]
    fn test_parse_multiple_instances() {
        let reply = browser_reply(
            b"ServerName;A;InstanceName;ONE;tcp;1433;;ServerName;A;InstanceName;TWO;tcp;50123;;",
        );

        assert_eq!(parse_browser_response(&reply), Some(vec![1433, 50123]));
    }

    #[test]
    fn test_parse_tolerates_invalid_utf8() {
        let reply = browser_reply(b"ServerName;\xff\xfe;tcp;1433;;");
        assert_eq!(parse_browser_response(&reply), Some(vec![1433]));
    }

    #[test]
    fn test_parse_rejects_missing_tcp_key() {
        let reply = browser_reply(b"ServerName;A;InstanceName;B;np;\\\\A\\pipe\\sql;;");
        assert_eq!(parse_browser_response(&reply), None);
        assert_eq!(parse_browser_response(b"\x05"), None);
        assert_eq!(parse_browser_response(b""), None);
    }

    #[test]
    fn test_parse_ignores_cut_off_instance() {
        let mut reply = browser_reply(
            b"ServerName;A;InstanceName;ONE;tcp;1433;;ServerName;A;InstanceName;TWO;tcp;14330;;",
        );
        // The datagram ends inside the second instance's port number.
        reply.truncate(reply.len() - 4);

        assert_eq!(parse_browser_response(&reply), Some(vec![1433]));
    }

    #[test]
    fn test_parse_reads_only_announced_length() {
        let mut reply = browser_reply(b"ServerName;A;InstanceName;ONE;tcp;1433;;");
        reply.extend_from_slice(b"ServerName;A;InstanceName;TWO;tcp;1434;;");

        assert_eq!(parse_browser_response(&reply), Some(vec![1433]));
    }

    #[test]
    fn test_parse_reply_larger_than_one_page() {
        let (reply, ports) = many_instances(80);
        assert!(reply.len() > 4096);

        assert_eq!(parse_browser_response(&reply), Some(ports));
    }

    #[tokio::test]
    async fn test_udp_transport_against_loopback_browser() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();

        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 16];
            let (len, peer) = server.recv_from(&mut buf).await.unwrap();
            assert_eq!(&buf[..len], &[CLNT_UCAST_EX]);
            server.send_to(SUCCESSFUL_RESPONSE, peer).await.unwrap();
        });

        let data = fingerprint(UdpSqlBrowser::with_port(port, Duration::from_secs(2))).await;
        responder.await.unwrap();

        assert_eq!(data.services().len(), 2);
        assert!(data
            .services()
            .contains(&DiscoveredService::tcp(1433, NetworkService::Mssql)));
    }

    #[tokio::test]
    async fn test_udp_transport_reads_large_reply_whole() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        let (reply, ports) = many_instances(80);

        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 16];
            let (_, peer) = server.recv_from(&mut buf).await.unwrap();
            server.send_to(&reply, peer).await.unwrap();
        });

        let data = fingerprint(UdpSqlBrowser::with_port(port, Duration::from_secs(2))).await;
        responder.await.unwrap();

        let mut expected: Vec<DiscoveredService> = ports
            .into_iter()
            .map(|port| DiscoveredService::tcp(port, NetworkService::Mssql))
            .collect();
        expected.push(DiscoveredService::udp(SQL_BROWSER_DEFAULT_PORT, NetworkService::MssqlBrowser));
        assert_eq!(data.services(), expected.as_slice());
    }

    #[tokio::test]
    async fn test_udp_transport_timeout_yields_nothing() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = silent.local_addr().unwrap().port();

        let data = fingerprint(UdpSqlBrowser::with_port(port, Duration::from_millis(100))).await;

        assert!(data.is_empty());
        drop(silent);
    }
}
