//! Domain events published by the agent for the island to consume.
//!
//! Only the publish/subscribe contract lives here. [`AgentEventQueue`] is a
//! synchronous in-process implementation; shipping events off the host is a
//! transport concern and happens elsewhere.

mod queue;
pub mod tags;

pub use queue::AgentEventQueue;

use crate::model::Credentials;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::IpAddr;

pub type AgentId = uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    pub source: AgentId,
    #[serde(default)]
    pub target: Option<IpAddr>,
    pub timestamp: DateTime<Utc>,
    pub tags: BTreeSet<String>,
    #[serde(flatten)]
    pub payload: AgentEventPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentEventPayload {
    CredentialsStolen { stolen_credentials: Vec<Credentials> },
}

impl AgentEvent {
    pub fn credentials_stolen<'a>(
        source: AgentId,
        tags: impl IntoIterator<Item = &'a str>,
        stolen_credentials: Vec<Credentials>,
    ) -> Self {
        Self {
            source,
            target: None,
            timestamp: Utc::now(),
            tags: tags.into_iter().map(str::to_string).collect(),
            payload: AgentEventPayload::CredentialsStolen { stolen_credentials },
        }
    }

    pub fn with_target(mut self, target: IpAddr) -> Self {
        self.target = Some(target);
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn stolen_credentials(&self) -> Option<&[Credentials]> {
        match &self.payload {
            AgentEventPayload::CredentialsStolen { stolen_credentials } => Some(stolen_credentials),
        }
    }
}

/// Accepts events from plugins. Delivery is best effort.
pub trait AgentEventPublisher: Send + Sync {
    fn publish(&self, event: AgentEvent);
}
