//! `datasource` section: structured data extracted alongside the build output.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `datasource` section.
///
/// # Example
/// ```json
/// "datasource": {
///   "enabled": true,
///   "collectAttribute": "data-datasource",
///   "datasets": [
///     { "name": "people", "folder": "people", "output": "people.json" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DatasourceConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Directory under the output root receiving the JSON files.
    #[serde(default = "defaults::datasource::output_dir")]
    #[educe(Default = defaults::datasource::output_dir())]
    pub output_dir: String,

    #[serde(default = "defaults::datasource::images_file_name")]
    #[educe(Default = defaults::datasource::images_file_name())]
    pub images_file_name: String,

    /// Elements carrying this attribute are collected, grouped by its value.
    #[serde(default = "defaults::datasource::collect_attribute")]
    #[educe(Default = defaults::datasource::collect_attribute())]
    pub collect_attribute: String,

    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
}

/// One named entity dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DatasetConfig {
    pub name: String,

    /// Folder (relative to the site root) whose content files become entities.
    #[serde(default)]
    pub folder: Option<String>,

    /// Output file relative to the datasource directory.
    pub output: String,

    /// Metadata key listing dataset names a post/page belongs to.
    #[serde(default)]
    pub metadata_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datasource_defaults() {
        let config = DatasourceConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.output_dir, "datasource");
        assert_eq!(config.images_file_name, "images.json");
        assert_eq!(config.collect_attribute, "data-datasource");
        assert!(config.datasets.is_empty());
    }

    #[test]
    fn test_dataset_parsing() {
        let config: DatasourceConfig = serde_json::from_str(
            r#"{"enabled": true, "datasets": [{"name": "people", "folder": "people", "output": "people.json", "metadataKey": "collections"}]}"#,
        )
        .unwrap();

        assert!(config.enabled);
        let dataset = &config.datasets[0];
        assert_eq!(dataset.name, "people");
        assert_eq!(dataset.folder.as_deref(), Some("people"));
        assert_eq!(dataset.metadata_key.as_deref(), Some("collections"));
    }

    #[test]
    fn test_dataset_requires_output() {
        let result: Result<DatasetConfig, _> = serde_json::from_str(r#"{"name": "people"}"#);
        assert!(result.is_err());
    }
}
