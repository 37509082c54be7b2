use super::{CreatePlugin, PluginArguments, SingleUsePlugin};
use crate::collector::CredentialsCollector;
use crate::error::PluginError;
use crate::events::{AgentEventPublisher, AgentId};
use crate::fingerprinter::Fingerprinter;
use std::sync::Arc;
use tracing::warn;

/// Creates plugin instances by name.
pub trait PluginFactory {
    type Plugin: ?Sized;

    /// Returns a fresh instance of `plugin_name`.
    ///
    /// # Errors
    ///
    /// Fails if the plugin is unknown, its catalog is incompatible with the
    /// running agent, or its constructor fails. Nothing is retried.
    fn create(&self, plugin_name: &str) -> Result<SingleUsePlugin<Self::Plugin>, PluginError>;
}

/// Factory for one plugin family.
///
/// Closes over the agent identifier and event publisher that every plugin
/// of the family receives, and holds no per-instance state.
pub struct AgentPluginFactory<T: ?Sized> {
    agent_id: AgentId,
    agent_event_publisher: Arc<dyn AgentEventPublisher>,
    create_plugin: Arc<dyn CreatePlugin<T>>,
}

pub type CredentialsCollectorPluginFactory = AgentPluginFactory<dyn CredentialsCollector>;
pub type FingerprinterPluginFactory = AgentPluginFactory<dyn Fingerprinter>;

impl<T: ?Sized> AgentPluginFactory<T> {
    pub fn new(
        agent_id: AgentId,
        agent_event_publisher: Arc<dyn AgentEventPublisher>,
        create_plugin: Arc<dyn CreatePlugin<T>>,
    ) -> Self {
        Self {
            agent_id,
            agent_event_publisher,
            create_plugin,
        }
    }

    pub fn agent_id(&self) -> AgentId {
        self.agent_id
    }
}

impl<T: ?Sized> PluginFactory for AgentPluginFactory<T> {
    type Plugin = T;

    fn create(&self, plugin_name: &str) -> Result<SingleUsePlugin<T>, PluginError> {
        let arguments = PluginArguments {
            plugin_name: plugin_name.to_string(),
            agent_id: self.agent_id,
            agent_event_publisher: Arc::clone(&self.agent_event_publisher),
        };

        self.create_plugin.create_plugin(arguments).map_err(|e| {
            warn!(plugin = plugin_name, error = %e, "Failed to create plugin");
            e
        })
    }
}

impl<T: ?Sized> Clone for AgentPluginFactory<T> {
    fn clone(&self) -> Self {
        Self {
            agent_id: self.agent_id,
            agent_event_publisher: Arc::clone(&self.agent_event_publisher),
            create_plugin: Arc::clone(&self.create_plugin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::AgentEventQueue;
    use crate::model::{Credentials, Identity};
    use crate::plugin::{
        AgentPluginMetadata, AgentPluginRepositoryIndex, AgentPluginType, CompatibilityVersion,
        PluginRegistry,
    };
    use async_trait::async_trait;
    use semver::Version;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct AgentIdCollector {
        agent_id: AgentId,
    }

    #[async_trait]
    impl CredentialsCollector for AgentIdCollector {
        fn name(&self) -> &'static str {
            "agent_id"
        }

        async fn collect_credentials(&self) -> Vec<Credentials> {
            Credentials::new(Some(Identity::username(self.agent_id.to_string())), None)
                .into_iter()
                .collect()
        }
    }

    fn release(version: &str) -> AgentPluginMetadata {
        AgentPluginMetadata {
            name: "agent_id".to_string(),
            plugin_type: AgentPluginType::CredentialsCollector,
            resource_path: PathBuf::from("/plugins/agent_id.tar"),
            sha256: "00".repeat(32),
            description: "reports the agent id".to_string(),
            version: Version::parse(version).unwrap(),
            safe: true,
        }
    }

    fn index(compatible: CompatibilityVersion) -> Arc<AgentPluginRepositoryIndex> {
        let mut by_name = BTreeMap::new();
        by_name.insert("agent_id".to_string(), vec![release("1.2.0"), release("1.0.0")]);
        let mut catalog = BTreeMap::new();
        catalog.insert(AgentPluginType::CredentialsCollector, by_name);
        Arc::new(AgentPluginRepositoryIndex::new(1.0, compatible, catalog).unwrap())
    }

    fn registry(built: Arc<AtomicUsize>) -> PluginRegistry<dyn CredentialsCollector> {
        PluginRegistry::new(AgentPluginType::CredentialsCollector).register(
            "agent_id",
            move |args| {
                built.fetch_add(1, Ordering::SeqCst);
                let collector: Box<dyn CredentialsCollector> = Box::new(AgentIdCollector {
                    agent_id: args.agent_id,
                });
                Ok(collector)
            },
        )
    }

    fn factory(registry: PluginRegistry<dyn CredentialsCollector>) -> CredentialsCollectorPluginFactory {
        CredentialsCollectorPluginFactory::new(
            AgentId::from_u128(42),
            Arc::new(AgentEventQueue::new()),
            Arc::new(registry),
        )
    }

    #[tokio::test]
    async fn test_factory_injects_agent_id() {
        let factory = factory(registry(Arc::new(AtomicUsize::new(0))));

        let plugin = factory.create("agent_id").unwrap();
        let collected = plugin.run().await;

        assert_eq!(
            collected[0].identity(),
            Some(&Identity::username(AgentId::from_u128(42).to_string()))
        );
    }

    #[test]
    fn test_each_create_builds_a_new_instance() {
        let built = Arc::new(AtomicUsize::new(0));
        let factory = factory(registry(Arc::clone(&built)));

        factory.create("agent_id").unwrap();
        factory.create("agent_id").unwrap();

        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unregistered_plugin_is_hard_error() {
        let factory = factory(registry(Arc::new(AtomicUsize::new(0))));

        assert!(matches!(
            factory.create("missing"),
            Err(PluginError::NotRegistered { .. })
        ));
    }

    #[test]
    fn test_resolves_latest_release_from_index() {
        let registry = registry(Arc::new(AtomicUsize::new(0)))
            .with_repository_index(index(CompatibilityVersion::Development), Version::new(2, 0, 0));
        let factory = factory(registry);

        let plugin = factory.create("agent_id").unwrap();
        assert_eq!(plugin.version(), Some(&Version::new(1, 2, 0)));
    }

    #[test]
    fn test_pinned_release() {
        let registry = registry(Arc::new(AtomicUsize::new(0)))
            .with_repository_index(index(CompatibilityVersion::Development), Version::new(2, 0, 0))
            .pin_version("agent_id", Version::new(1, 0, 0));
        let factory = factory(registry);

        let plugin = factory.create("agent_id").unwrap();
        assert_eq!(plugin.version(), Some(&Version::new(1, 0, 0)));
    }

    #[test]
    fn test_incompatible_index_is_hard_error() {
        let built = Arc::new(AtomicUsize::new(0));
        let registry = registry(Arc::clone(&built)).with_repository_index(
            index(CompatibilityVersion::Concrete(Version::new(1, 0, 0))),
            Version::new(2, 0, 0),
        );
        let factory = factory(registry);

        assert!(matches!(
            factory.create("agent_id"),
            Err(PluginError::IncompatibleIndex { .. })
        ));
        assert_eq!(built.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_registered_but_not_in_index() {
        let registry = PluginRegistry::<dyn CredentialsCollector>::new(
            AgentPluginType::CredentialsCollector,
        )
        .register("unlisted", |_| -> Result<Box<dyn CredentialsCollector>, PluginError> {
            Ok(Box::new(AgentIdCollector {
                agent_id: AgentId::nil(),
            }))
        })
        .with_repository_index(index(CompatibilityVersion::Development), Version::new(2, 0, 0));

        assert!(matches!(
            factory(registry).create("unlisted"),
            Err(PluginError::UnknownPlugin { .. })
        ));
    }

    #[test]
    fn test_factory_passes_plugin_name_and_publisher() {
        struct Recording(Mutex<Vec<String>>);

        impl CreatePlugin<dyn CredentialsCollector> for Recording {
            fn create_plugin(
                &self,
                arguments: PluginArguments,
            ) -> Result<SingleUsePlugin<dyn CredentialsCollector>, PluginError> {
                self.0.lock().unwrap().push(arguments.plugin_name.clone());
                let collector: Box<dyn CredentialsCollector> = Box::new(AgentIdCollector {
                    agent_id: arguments.agent_id,
                });
                Ok(SingleUsePlugin::new(arguments.plugin_name, None, collector))
            }
        }

        let recording = Arc::new(Recording(Mutex::new(Vec::new())));
        let factory = CredentialsCollectorPluginFactory::new(
            AgentId::nil(),
            Arc::new(AgentEventQueue::new()),
            recording.clone(),
        );

        factory.create("first").unwrap();
        factory.create("second").unwrap();

        assert_eq!(*recording.0.lock().unwrap(), ["first", "second"]);
    }
}
