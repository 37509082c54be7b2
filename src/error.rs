//! Typed errors for the library surface.
//!
//! Network noise never shows up here: fingerprinters swallow it and return
//! partial results. These errors describe configuration and deployment
//! defects that callers must see.

use crate::plugin::AgentPluginType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("no {plugin_type} plugin named '{name}' in the repository index")]
    UnknownPlugin {
        plugin_type: AgentPluginType,
        name: String,
    },

    #[error("{plugin_type} plugin '{name}' has no release {version}")]
    VersionNotFound {
        plugin_type: AgentPluginType,
        name: String,
        version: semver::Version,
    },

    #[error("repository index targets agent version {index_version}, running agent is {agent_version}")]
    IncompatibleIndex {
        index_version: String,
        agent_version: semver::Version,
    },

    #[error("{plugin_type} plugin '{name}' is not built into this agent")]
    NotRegistered {
        plugin_type: AgentPluginType,
        name: String,
    },

    #[error("failed to instantiate plugin '{name}': {reason}")]
    Instantiation { name: String, reason: String },

    #[error("repository index timestamp must be finite, got {0}")]
    InvalidTimestamp(f64),

    #[error("invalid version '{input}': {source}")]
    InvalidVersion {
        input: String,
        #[source]
        source: semver::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialsError {
    #[error("credentials must carry an identity, a secret, or both")]
    Empty,

    #[error("'{value}' is not a valid {kind} hash")]
    InvalidHash { kind: &'static str, value: String },
}
