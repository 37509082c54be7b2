use super::{AgentPluginRepositoryIndex, AgentPluginType, PluginArguments, SingleUsePlugin};
use crate::error::PluginError;
use semver::Version;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Builds one plugin instance from the arguments its factory supplies.
pub type PluginConstructor<T> =
    Box<dyn Fn(&PluginArguments) -> Result<Box<T>, PluginError> + Send + Sync>;

/// The single-use instantiation primitive factories delegate to.
pub trait CreatePlugin<T: ?Sized>: Send + Sync {
    fn create_plugin(&self, arguments: PluginArguments) -> Result<SingleUsePlugin<T>, PluginError>;
}

/// Static table of the plugins of one family built into this agent.
///
/// Without a repository index, any registered plugin can be created. With
/// one, the index must be compatible with the running agent and must list
/// the plugin; the resolved release is recorded on the instance.
pub struct PluginRegistry<T: ?Sized> {
    plugin_type: AgentPluginType,
    constructors: BTreeMap<String, PluginConstructor<T>>,
    repository: Option<(Arc<AgentPluginRepositoryIndex>, Version)>,
    pinned: HashMap<String, Version>,
}

impl<T: ?Sized> PluginRegistry<T> {
    pub fn new(plugin_type: AgentPluginType) -> Self {
        Self {
            plugin_type,
            constructors: BTreeMap::new(),
            repository: None,
            pinned: HashMap::new(),
        }
    }

    pub fn register<F>(mut self, name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&PluginArguments) -> Result<Box<T>, PluginError> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
        self
    }

    pub fn with_repository_index(
        mut self,
        index: Arc<AgentPluginRepositoryIndex>,
        agent_version: Version,
    ) -> Self {
        self.repository = Some((index, agent_version));
        self
    }

    /// Resolve `name` to `version` instead of the latest release.
    pub fn pin_version(mut self, name: impl Into<String>, version: Version) -> Self {
        self.pinned.insert(name.into(), version);
        self
    }

    pub fn plugin_type(&self) -> AgentPluginType {
        self.plugin_type
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    fn resolve_release(&self, name: &str) -> Result<Option<Version>, PluginError> {
        let Some((index, agent_version)) = &self.repository else {
            return Ok(None);
        };

        index.check_compatibility(agent_version)?;
        let release = index.resolve(self.plugin_type, name, self.pinned.get(name))?;
        Ok(Some(release.version.clone()))
    }
}

impl<T: ?Sized> CreatePlugin<T> for PluginRegistry<T> {
    fn create_plugin(&self, arguments: PluginArguments) -> Result<SingleUsePlugin<T>, PluginError> {
        let name = arguments.plugin_name.as_str();
        let version = self.resolve_release(name)?;

        let constructor =
            self.constructors
                .get(name)
                .ok_or_else(|| PluginError::NotRegistered {
                    plugin_type: self.plugin_type,
                    name: name.to_string(),
                })?;

        let plugin = constructor(&arguments)?;
        debug!(
            plugin = name,
            plugin_type = %self.plugin_type,
            version = ?version,
            "Instantiated plugin"
        );

        Ok(SingleUsePlugin::new(name, version, plugin))
    }
}
