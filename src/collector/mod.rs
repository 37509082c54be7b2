//! Credential collectors.
//!
//! This module provides the [`CredentialsCollector`] trait and the
//! collectors built into the agent. A collector runs an external dump
//! mechanism, turns its raw records into [`Credentials`], and publishes
//! them as a single "credentials stolen" event.
//!
//! # Available Collectors
//!
//! | Collector | Source |
//! |-----------|--------|
//! | [`MimikatzCredentialCollector`] | pypykatz LSA dump |

mod mimikatz;
mod pypykatz;
mod windows_credentials;

pub use mimikatz::{MimikatzCredentialCollector, MIMIKATZ_COLLECTOR_TAG, MIMIKATZ_EVENT_TAGS};
pub use pypykatz::{parse_pypykatz_output, PypykatzDump, WindowsCredentialsSource};
pub use windows_credentials::{to_credentials, WindowsCredentials};

use crate::model::Credentials;
use crate::plugin::{instantiation_error, AgentPluginType, PluginRegistry, SingleUsePlugin};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Trait for harvesting credentials from one source on the local host.
///
/// Collection never fails outright: an unavailable source yields an empty
/// result. Implementations publish what they found themselves.
#[async_trait]
pub trait CredentialsCollector: Send + Sync {
    /// Returns the plugin name this collector is registered under.
    fn name(&self) -> &'static str;

    /// Runs the collection and returns every credential found, in dump order.
    async fn collect_credentials(&self) -> Vec<Credentials>;
}

/// Registry of the collectors compiled into this agent.
///
/// `mimikatz` reads the pypykatz dump at `dump_path`; creating it without a
/// path is an instantiation error.
pub fn builtin_collectors(dump_path: Option<PathBuf>) -> PluginRegistry<dyn CredentialsCollector> {
    PluginRegistry::new(AgentPluginType::CredentialsCollector).register(
        "mimikatz",
        move |args| {
            let path = dump_path
                .clone()
                .ok_or_else(|| instantiation_error(&args.plugin_name, "no LSA dump configured"))?;

            let collector: Box<dyn CredentialsCollector> = Box::new(MimikatzCredentialCollector::new(
                args.agent_id,
                Arc::clone(&args.agent_event_publisher),
                Box::new(PypykatzDump::new(path)),
            ));
            Ok(collector)
        },
    )
}

/// Runs a collector, discarding its result if it overruns `deadline`.
pub async fn collect_with_deadline(
    plugin: SingleUsePlugin<dyn CredentialsCollector>,
    deadline: Duration,
) -> Vec<Credentials> {
    let name = plugin.name().to_string();
    match tokio::time::timeout(deadline, plugin.run()).await {
        Ok(credentials) => credentials,
        Err(_) => {
            warn!(collector = %name, deadline_ms = deadline.as_millis() as u64, "Collection cancelled");
            Vec::new()
        }
    }
}
