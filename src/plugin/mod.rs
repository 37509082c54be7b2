//! Plugin catalog, registry and factories.
//!
//! Plugins are compiled into the agent and registered explicitly in a
//! [`PluginRegistry`]. The [`AgentPluginRepositoryIndex`] decides which
//! release of a plugin is current and whether the catalog matches the
//! running agent. Factories hand out [`SingleUsePlugin`] instances that are
//! consumed by a single run.
//!
//! # Example
//!
//! ```no_run
//! use lateral_recon::collector::CredentialsCollector;
//! use lateral_recon::events::{AgentEventQueue, AgentId};
//! use lateral_recon::plugin::{CredentialsCollectorPluginFactory, PluginFactory, PluginRegistry};
//! use std::sync::Arc;
//!
//! # async fn demo(registry: PluginRegistry<dyn CredentialsCollector>) -> anyhow::Result<()> {
//! let factory = CredentialsCollectorPluginFactory::new(
//!     AgentId::new_v4(),
//!     Arc::new(AgentEventQueue::new()),
//!     Arc::new(registry),
//! );
//!
//! let plugin = factory.create("mimikatz")?;
//! let credentials = plugin.run().await;
//! println!("Collected {} credentials", credentials.len());
//! # Ok(())
//! # }
//! ```

mod factory;
mod registry;
mod repository_index;
pub mod version;

pub use factory::{
    AgentPluginFactory, CredentialsCollectorPluginFactory, FingerprinterPluginFactory,
    PluginFactory,
};
pub use registry::{CreatePlugin, PluginConstructor, PluginRegistry};
pub use repository_index::{AgentPluginMetadata, AgentPluginRepositoryIndex, PluginCatalog};
pub use version::CompatibilityVersion;

use crate::collector::CredentialsCollector;
use crate::error::PluginError;
use crate::events::{AgentEventPublisher, AgentId};
use crate::fingerprinter::{Fingerprinter, PortScanMap};
use crate::model::{Credentials, FingerprintData, PingScanData};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentPluginType {
    Exploiter,
    CredentialsCollector,
    Fingerprinter,
    Payload,
}

impl AgentPluginType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentPluginType::Exploiter => "Exploiter",
            AgentPluginType::CredentialsCollector => "CredentialsCollector",
            AgentPluginType::Fingerprinter => "Fingerprinter",
            AgentPluginType::Payload => "Payload",
        }
    }
}

impl std::fmt::Display for AgentPluginType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgentPluginType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "exploiter" => Ok(AgentPluginType::Exploiter),
            "credentialscollector" => Ok(AgentPluginType::CredentialsCollector),
            "fingerprinter" => Ok(AgentPluginType::Fingerprinter),
            "payload" => Ok(AgentPluginType::Payload),
            _ => Err(format!(
                "Unknown plugin type: {}. Use 'exploiter', 'credentials-collector', 'fingerprinter', or 'payload'",
                s
            )),
        }
    }
}

/// What every plugin constructor is given.
#[derive(Clone)]
pub struct PluginArguments {
    pub plugin_name: String,
    pub agent_id: AgentId,
    pub agent_event_publisher: Arc<dyn AgentEventPublisher>,
}

/// A plugin instance good for exactly one run.
///
/// `run` takes `self` by value, so an instance cannot be executed twice.
pub struct SingleUsePlugin<T: ?Sized> {
    name: String,
    version: Option<Version>,
    plugin: Box<T>,
}

impl<T: ?Sized> SingleUsePlugin<T> {
    pub fn new(name: impl Into<String>, version: Option<Version>, plugin: Box<T>) -> Self {
        Self {
            name: name.into(),
            version,
            plugin,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Release the instance was resolved to, if a repository index was consulted.
    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }
}

impl SingleUsePlugin<dyn CredentialsCollector> {
    pub async fn run(self) -> Vec<Credentials> {
        self.plugin.collect_credentials().await
    }
}

impl SingleUsePlugin<dyn Fingerprinter> {
    pub async fn run(
        self,
        host: IpAddr,
        ping_scan_data: Option<&PingScanData>,
        port_scan_data: &PortScanMap,
        options: &serde_json::Value,
    ) -> FingerprintData {
        self.plugin
            .get_host_fingerprint(host, ping_scan_data, port_scan_data, options)
            .await
    }
}

impl<T: ?Sized> std::fmt::Debug for SingleUsePlugin<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleUsePlugin")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

pub(crate) fn instantiation_error(name: &str, reason: impl std::fmt::Display) -> PluginError {
    PluginError::Instantiation {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
