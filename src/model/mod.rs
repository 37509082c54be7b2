//! Finding types shared by fingerprinters and credential collectors.
//!
//! - [`DiscoveredService`] - A `(protocol, port, service)` finding
//! - [`FingerprintData`] - OS identity and services of one host
//! - [`PortScanData`] / [`PingScanData`] - Earlier scan observations fed to fingerprinters
//! - [`Credentials`] - An `(identity, secret)` pair
//!
//! All of these are plain values: created fresh per scan or collection and
//! never mutated after they are handed out.
//!
//! # Example
//!
//! ```
//! use lateral_recon::model::{DiscoveredService, FingerprintData, NetworkService};
//!
//! let data = FingerprintData::from_services([
//!     DiscoveredService::tcp(1433, NetworkService::Mssql),
//!     DiscoveredService::tcp(1433, NetworkService::Mssql),
//! ]);
//!
//! assert_eq!(data.services().len(), 1);
//! ```

mod credentials;
mod network;

pub use credentials::*;
pub use network::*;
