use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelEntry {
    /// Portal identifier, sent as the `kanal` query parameter
    pub id: String,
}

/// Channel name -> portal identifier
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ChannelRegistry(BTreeMap<String, ChannelEntry>);

impl ChannelRegistry {
    /// Reads a registry of the shape `{"<name>": {"id": "<kanal id>"}}`
    ///
    /// # Errors
    /// Errors when the file can't be read or isn't a valid registry
    #[instrument]
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Reading channel registry {}", path.display()))?;

        let registry = Self::from_json(&raw)
            .with_context(|| format!("Parsing channel registry {}", path.display()))?;
        debug!("Loaded {} channels", registry.len());

        Ok(registry)
    }

    /// # Errors
    /// Errors on malformed JSON
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChannelEntry)> {
        self.0.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_registry_and_ignores_extra_fields() {
        let registry = ChannelRegistry::from_json(
            r#"{
                "Das Erste": {"id": "208", "video_urls": []},
                "ONE": {"id": "673348"}
            }"#,
        )
        .unwrap();

        assert_eq!(registry.len(), 2);
        let names: Vec<_> = registry.iter().map(|(n, e)| (n, e.id.as_str())).collect();
        assert_eq!(names, vec![("Das Erste", "208"), ("ONE", "673348")]);
    }

    #[test]
    fn empty_registry_is_valid() {
        assert!(ChannelRegistry::from_json("{}").unwrap().is_empty());
    }

    #[test]
    fn rejects_entry_without_id() {
        assert!(ChannelRegistry::from_json(r#"{"ONE": {}}"#).is_err());
    }

    #[tokio::test]
    async fn load_reports_missing_file() {
        let err = ChannelRegistry::load(Path::new("/nonexistent/channels.json"))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("Reading channel registry"));
    }
}
