//! Versioned catalog of available plugin releases.

use super::version::{cmp_precedence, CompatibilityVersion};
use super::AgentPluginType;
use crate::error::PluginError;
use anyhow::{Context, Result};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Description of one plugin release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPluginMetadata {
    pub name: String,
    #[serde(rename = "type_")]
    pub plugin_type: AgentPluginType,
    pub resource_path: PathBuf,
    pub sha256: String,
    pub description: String,
    pub version: Version,
    pub safe: bool,
}

pub type PluginCatalog = BTreeMap<AgentPluginType, BTreeMap<String, Vec<AgentPluginMetadata>>>;

/// Catalog mapping plugin type and name to releases, oldest first.
///
/// Read-only once built, so it can be shared between factories behind an
/// `Arc` without locking.
///
/// # Example
///
/// ```
/// use lateral_recon::plugin::{AgentPluginRepositoryIndex, CompatibilityVersion};
/// use std::collections::BTreeMap;
///
/// let index = AgentPluginRepositoryIndex::new(123.0, CompatibilityVersion::Development, BTreeMap::new())?;
/// let json = serde_json::to_string(&index).unwrap();
/// let restored: AgentPluginRepositoryIndex = serde_json::from_str(&json).unwrap();
/// assert_eq!(restored, index);
/// # Ok::<(), lateral_recon::PluginError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RepositoryIndexRecord")]
pub struct AgentPluginRepositoryIndex {
    timestamp: f64,
    compatible_infection_monkey_version: CompatibilityVersion,
    plugins: PluginCatalog,
}

#[derive(Deserialize)]
struct RepositoryIndexRecord {
    #[serde(default)]
    timestamp: f64,
    compatible_infection_monkey_version: CompatibilityVersion,
    #[serde(default)]
    plugins: PluginCatalog,
}

impl TryFrom<RepositoryIndexRecord> for AgentPluginRepositoryIndex {
    type Error = PluginError;

    fn try_from(record: RepositoryIndexRecord) -> Result<Self, PluginError> {
        Self::new(
            record.timestamp,
            record.compatible_infection_monkey_version,
            record.plugins,
        )
    }
}

impl AgentPluginRepositoryIndex {
    /// Builds an index, sorting every release list by version precedence.
    ///
    /// The timestamp must be finite: JSON has no encoding for NaN or the
    /// infinities.
    pub fn new(
        timestamp: f64,
        compatible_version: impl Into<CompatibilityVersion>,
        mut plugins: PluginCatalog,
    ) -> Result<Self, PluginError> {
        if !timestamp.is_finite() {
            return Err(PluginError::InvalidTimestamp(timestamp));
        }

        for releases in plugins.values_mut().flat_map(|by_name| by_name.values_mut()) {
            releases.sort_by(|a, b| cmp_precedence(&a.version, &b.version));
        }

        Ok(Self {
            timestamp,
            compatible_infection_monkey_version: compatible_version.into(),
            plugins,
        })
    }

    /// Loads an index from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read repository index: {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse repository index: {:?}", path))
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn compatible_version(&self) -> &CompatibilityVersion {
        &self.compatible_infection_monkey_version
    }

    pub fn plugins(&self) -> &PluginCatalog {
        &self.plugins
    }

    pub fn plugin_names(&self, plugin_type: AgentPluginType) -> impl Iterator<Item = &str> {
        self.plugins
            .get(&plugin_type)
            .into_iter()
            .flat_map(|by_name| by_name.keys().map(String::as_str))
    }

    /// Releases of one plugin, oldest first. Empty if the plugin is unknown.
    pub fn releases(&self, plugin_type: AgentPluginType, name: &str) -> &[AgentPluginMetadata] {
        self.plugins
            .get(&plugin_type)
            .and_then(|by_name| by_name.get(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Fails unless this index was built for `agent_version`.
    pub fn check_compatibility(&self, agent_version: &Version) -> Result<(), PluginError> {
        if self.compatible_infection_monkey_version.accepts(agent_version) {
            Ok(())
        } else {
            Err(PluginError::IncompatibleIndex {
                index_version: self.compatible_infection_monkey_version.to_string(),
                agent_version: agent_version.clone(),
            })
        }
    }

    /// Newest release of a plugin.
    pub fn latest(
        &self,
        plugin_type: AgentPluginType,
        name: &str,
    ) -> Result<&AgentPluginMetadata, PluginError> {
        self.releases(plugin_type, name)
            .last()
            .ok_or_else(|| PluginError::UnknownPlugin {
                plugin_type,
                name: name.to_string(),
            })
    }

    /// The release of a plugin whose version has the same precedence as `version`.
    pub fn get(
        &self,
        plugin_type: AgentPluginType,
        name: &str,
        version: &Version,
    ) -> Result<&AgentPluginMetadata, PluginError> {
        let releases = self.releases(plugin_type, name);
        if releases.is_empty() {
            return Err(PluginError::UnknownPlugin {
                plugin_type,
                name: name.to_string(),
            });
        }

        releases
            .iter()
            .find(|release| cmp_precedence(&release.version, version) == Ordering::Equal)
            .ok_or_else(|| PluginError::VersionNotFound {
                plugin_type,
                name: name.to_string(),
                version: version.clone(),
            })
    }

    /// Picks a release: the requested version if given, otherwise the latest.
    pub fn resolve(
        &self,
        plugin_type: AgentPluginType,
        name: &str,
        version: Option<&Version>,
    ) -> Result<&AgentPluginMetadata, PluginError> {
        match version {
            Some(version) => self.get(plugin_type, name, version),
            None => self.latest(plugin_type, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PAYLOAD_PLUGIN_NAME: &str = "awesome_payload";
    const SHA256: &str = "7ac0f5c62a9bcb81af3e9d67a764d7bbd3cce9af7cd26c211f136400ebe703c4";

    fn release(version: &str) -> AgentPluginMetadata {
        AgentPluginMetadata {
            name: PAYLOAD_PLUGIN_NAME.to_string(),
            plugin_type: AgentPluginType::Payload,
            resource_path: PathBuf::from("/tmp"),
            sha256: SHA256.to_string(),
            description: "an awesome payload plugin".to_string(),
            version: Version::parse(version).unwrap(),
            safe: true,
        }
    }

    fn sorted_releases() -> Vec<AgentPluginMetadata> {
        ["1.0.0", "1.0.1", "1.2.0", "1.2.3", "2.0.0", "3.0.1"]
            .into_iter()
            .map(release)
            .collect()
    }

    fn single_release_catalog() -> PluginCatalog {
        let mut by_name = BTreeMap::new();
        by_name.insert(PAYLOAD_PLUGIN_NAME.to_string(), vec![release("3.0.1")]);
        let mut catalog = BTreeMap::new();
        catalog.insert(AgentPluginType::Payload, by_name);
        catalog
    }

    fn serialized_index(version: &str) -> serde_json::Value {
        json!({
            "timestamp": 123.0,
            "compatible_infection_monkey_version": version,
            "plugins": {
                "Payload": {
                    PAYLOAD_PLUGIN_NAME: [{
                        "name": PAYLOAD_PLUGIN_NAME,
                        "type_": "Payload",
                        "resource_path": "/tmp",
                        "sha256": SHA256,
                        "description": "an awesome payload plugin",
                        "version": "3.0.1",
                        "safe": true
                    }]
                }
            }
        })
    }

    fn indices_with_expected_serialization() -> Vec<(AgentPluginRepositoryIndex, serde_json::Value)> {
        vec![
            (
                AgentPluginRepositoryIndex::new(
                    123.0,
                    CompatibilityVersion::Development,
                    single_release_catalog(),
                )
                .unwrap(),
                serialized_index("development"),
            ),
            (
                AgentPluginRepositoryIndex::new(
                    123.0,
                    CompatibilityVersion::try_from("7.8.9").unwrap(),
                    single_release_catalog(),
                )
                .unwrap(),
                serialized_index("7.8.9"),
            ),
            (
                AgentPluginRepositoryIndex::new(
                    123.0,
                    Version::new(7, 8, 9),
                    single_release_catalog(),
                )
                .unwrap(),
                serialized_index("7.8.9"),
            ),
        ]
    }

    #[test]
    fn test_repository_index_serialization() {
        for (index, expected) in indices_with_expected_serialization() {
            assert_eq!(serde_json::to_value(&index).unwrap(), expected);
        }
    }

    #[test]
    fn test_repository_index_deserialization() {
        for (expected, serialized) in indices_with_expected_serialization() {
            let index: AgentPluginRepositoryIndex = serde_json::from_value(serialized).unwrap();
            assert_eq!(index, expected);
        }
    }

    #[test]
    fn test_repository_index_round_trip() {
        for (index, _) in indices_with_expected_serialization() {
            let json = serde_json::to_string(&index).unwrap();
            let restored: AgentPluginRepositoryIndex = serde_json::from_str(&json).unwrap();
            assert_eq!(restored, index);
        }
    }

    #[test]
    fn test_concrete_and_string_versions_are_equal() {
        let from_object =
            AgentPluginRepositoryIndex::new(123.0, Version::new(7, 8, 9), single_release_catalog())
                .unwrap();
        let from_string = AgentPluginRepositoryIndex::new(
            123.0,
            "7.8.9".parse::<CompatibilityVersion>().unwrap(),
            single_release_catalog(),
        )
        .unwrap();
        assert_eq!(from_object, from_string);
    }

    #[test]
    fn test_plugins_sorted_by_version() {
        // Fixed permutation; any order must come out sorted.
        let mut unsorted = sorted_releases();
        unsorted.swap(0, 5);
        unsorted.swap(1, 3);
        unsorted.swap(2, 4);
        assert_ne!(unsorted, sorted_releases());

        let mut payloads = BTreeMap::new();
        payloads.insert(PAYLOAD_PLUGIN_NAME.to_string(), unsorted);
        let mut collectors = BTreeMap::new();
        collectors.insert(PAYLOAD_PLUGIN_NAME.to_string(), vec![release("1.0.0")]);

        let mut catalog = BTreeMap::new();
        catalog.insert(AgentPluginType::Payload, payloads);
        catalog.insert(AgentPluginType::Exploiter, BTreeMap::new());
        catalog.insert(AgentPluginType::CredentialsCollector, collectors);

        let index =
            AgentPluginRepositoryIndex::new(0.0, CompatibilityVersion::Development, catalog).unwrap();

        assert_eq!(
            index.releases(AgentPluginType::Payload, PAYLOAD_PLUGIN_NAME),
            sorted_releases().as_slice()
        );
        assert!(index.plugins()[&AgentPluginType::Exploiter].is_empty());
        assert_eq!(
            index.releases(AgentPluginType::CredentialsCollector, PAYLOAD_PLUGIN_NAME),
            &[release("1.0.0")]
        );
    }

    #[test]
    fn test_deserialization_sorts_releases() {
        let json = json!({
            "timestamp": 1.0,
            "compatible_infection_monkey_version": "development",
            "plugins": {
                "Payload": {
                    PAYLOAD_PLUGIN_NAME: [
                        serde_json::to_value(release("2.0.0")).unwrap(),
                        serde_json::to_value(release("1.0.0-rc.1")).unwrap(),
                        serde_json::to_value(release("1.0.0")).unwrap()
                    ]
                }
            }
        });

        let index: AgentPluginRepositoryIndex = serde_json::from_value(json).unwrap();
        let versions: Vec<String> = index
            .releases(AgentPluginType::Payload, PAYLOAD_PLUGIN_NAME)
            .iter()
            .map(|r| r.version.to_string())
            .collect();
        assert_eq!(versions, ["1.0.0-rc.1", "1.0.0", "2.0.0"]);
    }

    #[test]
    fn test_resolve_latest_and_exact() {
        let mut by_name = BTreeMap::new();
        by_name.insert(PAYLOAD_PLUGIN_NAME.to_string(), sorted_releases());
        let mut catalog = BTreeMap::new();
        catalog.insert(AgentPluginType::Payload, by_name);
        let index =
            AgentPluginRepositoryIndex::new(0.0, CompatibilityVersion::Development, catalog).unwrap();

        let latest = index.latest(AgentPluginType::Payload, PAYLOAD_PLUGIN_NAME).unwrap();
        assert_eq!(latest.version, Version::new(3, 0, 1));

        let pinned = index
            .resolve(
                AgentPluginType::Payload,
                PAYLOAD_PLUGIN_NAME,
                Some(&Version::new(1, 2, 0)),
            )
            .unwrap();
        assert_eq!(pinned.version, Version::new(1, 2, 0));

        assert!(matches!(
            index.get(AgentPluginType::Payload, PAYLOAD_PLUGIN_NAME, &Version::new(9, 9, 9)),
            Err(PluginError::VersionNotFound { .. })
        ));
        assert!(matches!(
            index.latest(AgentPluginType::Exploiter, PAYLOAD_PLUGIN_NAME),
            Err(PluginError::UnknownPlugin { .. })
        ));
    }

    #[test]
    fn test_check_compatibility() {
        let index =
            AgentPluginRepositoryIndex::new(0.0, Version::new(2, 3, 0), single_release_catalog())
                .unwrap();

        assert!(index.check_compatibility(&Version::new(2, 3, 0)).is_ok());
        assert!(matches!(
            index.check_compatibility(&Version::new(2, 4, 0)),
            Err(PluginError::IncompatibleIndex { .. })
        ));
    }

    #[test]
    fn test_non_finite_timestamp_rejected() {
        for timestamp in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let result = AgentPluginRepositoryIndex::new(
                timestamp,
                CompatibilityVersion::Development,
                single_release_catalog(),
            );
            assert!(matches!(result, Err(PluginError::InvalidTimestamp(_))));
        }
    }

    #[test]
    fn test_null_timestamp_fails_to_deserialize() {
        let mut json = serialized_index("development");
        json["timestamp"] = serde_json::Value::Null;

        assert!(serde_json::from_value::<AgentPluginRepositoryIndex>(json).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        fs::write(&path, serialized_index("development").to_string()).unwrap();

        let index = AgentPluginRepositoryIndex::load(&path).unwrap();
        assert_eq!(
            index.plugin_names(AgentPluginType::Payload).collect::<Vec<_>>(),
            [PAYLOAD_PLUGIN_NAME]
        );
    }
}
