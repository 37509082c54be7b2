pub mod aggregator;
pub mod analyzer;
pub mod collector;
pub mod config;
pub mod error;
pub mod events;
pub mod fingerprinter;
pub mod model;
pub mod output;
pub mod plugin;

pub use aggregator::{FingerprintAggregator, HostTarget};
pub use analyzer::{analyze_stolen_credentials, CredentialsAnalysis};
pub use collector::CredentialsCollector;
pub use config::Config;
pub use error::{CredentialsError, PluginError};
pub use fingerprinter::Fingerprinter;
pub use model::{Credentials, DiscoveredService, FingerprintData, HostFingerprint};
