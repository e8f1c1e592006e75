//! Site configuration management for `config.json`.
//!
//! # Sections
//!
//! | Section      | Purpose                                         |
//! |--------------|-------------------------------------------------|
//! | root         | Site metadata (siteName, baseUrl, description)  |
//! | `theme`      | Templates, asset roots, output directory        |
//! | `paths`      | Posts and pages directories                     |
//! | `html`       | HTML post-processing                            |
//! | `rss`        | Feed generation                                 |
//! | `datasource` | Structured data bundle                          |
//! | `debug`      | Render trace comments in dev mode               |
//! | `devServer`  | Development server (port, interface, watch)     |
//!
//! # Example
//!
//! ```json
//! {
//!   "siteName": "My Blog",
//!   "baseUrl": "https://example.com",
//!   "description": "A personal blog",
//!   "author": "Jane",
//!   "theme": { "output": "build" },
//!   "rss": { "maxItems": 10 }
//! }
//! ```

mod datasource;
pub mod defaults;
mod error;
mod handle;
mod layout;
mod output;
mod serve;
mod theme;

pub use datasource::{DatasetConfig, DatasourceConfig};
pub use error::ConfigError;
pub use handle::ConfigHandle;
pub use layout::SiteLayout;
pub use output::{DebugConfig, HtmlConfig, HtmlFormat, RssConfig};
pub use serve::ServeConfig;
pub use theme::{PathsConfig, ThemeConfig};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing `config.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute site root (set after loading)
    #[serde(skip)]
    pub root: PathBuf,

    /// Config file name relative to the root (set after loading)
    #[serde(skip)]
    pub config_file: String,

    pub site_name: String,
    pub base_url: String,
    pub description: String,
    pub author: String,

    #[serde(default)]
    pub theme: ThemeConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub html: HtmlConfig,

    #[serde(default)]
    pub rss: RssConfig,

    #[serde(default)]
    pub datasource: DatasourceConfig,

    #[serde(default)]
    pub debug: DebugConfig,

    #[serde(default, rename = "devServer")]
    pub serve: ServeConfig,
}

impl SiteConfig {
    /// Parse configuration, choosing the format from the file name.
    pub fn from_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let is_toml = path.extension().is_some_and(|ext| ext == "toml");
        if is_toml {
            toml::from_str(content).map_err(|err| ConfigError::Toml(path.to_path_buf(), err))
        } else {
            serde_json::from_str(content).map_err(|err| ConfigError::Json(path.to_path_buf(), err))
        }
    }

    /// Load `<root>/<file_name>`, resolve the root and validate.
    pub fn load(root: &Path, file_name: &str) -> Result<Self> {
        let root = normalize_path(root);
        let path = root.join(file_name);

        if !path.is_file() {
            return Err(ConfigError::Missing {
                path,
                example: Self::example(),
            }
            .into());
        }

        let content = fs::read_to_string(&path).map_err(|err| ConfigError::Io(path.clone(), err))?;
        let mut config = Self::from_str(&content, &path)?;
        config.root = root;
        config.config_file = file_name.to_owned();
        config.validate()?;
        Ok(config)
    }

    /// Minimal valid config shown when the file is missing.
    pub fn example() -> String {
        let example = serde_json::json!({
            "siteName": "My Site",
            "baseUrl": "https://example.com",
            "description": "What this site is about",
            "author": "Your Name",
            "theme": { "templates": "templates", "assets": ["static"], "output": "build" },
            "paths": { "posts": "posts", "pages": ["pages"] }
        });
        serde_json::to_string_pretty(&example).unwrap_or_default()
    }

    /// Resolved absolute directory layout.
    pub fn layout(&self) -> SiteLayout {
        SiteLayout::from_config(self)
    }

    /// Canonical URL for a document output path.
    pub fn url_for(&self, output_path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = output_path.trim_matches('/');
        if path.is_empty() {
            format!("{base}/")
        } else {
            format!("{base}/{path}/")
        }
    }

    /// Point `baseUrl` at the dev server.
    pub fn use_dev_server_url(&mut self) {
        self.base_url = format!("http://{}:{}", self.serve.interface, self.serve.port);
    }

    /// Record the port the dev server actually bound and point `baseUrl` at it.
    pub fn use_bound_port(&mut self, port: u16) {
        self.serve.port = port;
        self.use_dev_server_url();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site_name.trim().is_empty() {
            return Err(ConfigError::Validation("`siteName` must not be empty".into()));
        }
        if !self.base_url.starts_with("http") {
            return Err(ConfigError::Validation(
                "`baseUrl` must start with http:// or https://".into(),
            ));
        }
        if self.theme.output.trim().is_empty() {
            return Err(ConfigError::Validation("`theme.output` must not be empty".into()));
        }
        if self.datasource.enabled
            && let Some(dataset) = self.datasource.datasets.iter().find(|d| d.name.is_empty())
        {
            return Err(ConfigError::Validation(format!(
                "dataset writing `{}` has an empty name",
                dataset.output
            )));
        }
        Ok(())
    }
}

/// Normalize a path to absolute, using canonicalize if the path exists
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL: &str =
        r#"{"siteName": "Test", "baseUrl": "https://example.com", "description": "d", "author": "a"}"#;

    #[test]
    fn test_load_json() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.json"), MINIMAL).unwrap();

        let config = SiteConfig::load(dir.path(), "config.json").unwrap();
        assert_eq!(config.site_name, "Test");
        assert_eq!(config.config_file, "config.json");
        assert!(config.root.is_absolute());
    }

    #[test]
    fn test_load_toml() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("site.toml"),
            r#"
siteName = "Toml"
baseUrl = "https://example.com"
description = "d"
author = "a"

[rss]
maxItems = 3
"#,
        )
        .unwrap();

        let config = SiteConfig::load(dir.path(), "site.toml").unwrap();
        assert_eq!(config.site_name, "Toml");
        assert_eq!(config.rss.max_items, 3);
    }

    #[test]
    fn test_missing_config_shows_example() {
        let dir = TempDir::new().unwrap();
        let err = SiteConfig::load(dir.path(), "config.json").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("missing config file"));
        assert!(message.contains("siteName"));
    }

    #[test]
    fn test_unparseable_config() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.json"), "{ not json").unwrap();
        let err = SiteConfig::load(dir.path(), "config.json").unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn test_missing_required_field() {
        let result = SiteConfig::from_str(r#"{"siteName": "x"}"#, Path::new("config.json"));
        assert!(matches!(result, Err(ConfigError::Json(..))));
    }

    #[test]
    fn test_validate_base_url() {
        let mut config = SiteConfig::from_str(MINIMAL, Path::new("config.json")).unwrap();
        assert!(config.validate().is_ok());

        config.base_url = "example.com".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_url_for() {
        let mut config = SiteConfig::from_str(MINIMAL, Path::new("config.json")).unwrap();
        config.base_url = "https://example.com/".into();

        assert_eq!(config.url_for(""), "https://example.com/");
        assert_eq!(config.url_for("hello"), "https://example.com/hello/");
        assert_eq!(config.url_for("/docs/intro/"), "https://example.com/docs/intro/");
    }

    #[test]
    fn test_dev_server_url() {
        let mut config = SiteConfig::from_str(MINIMAL, Path::new("config.json")).unwrap();
        config.serve.port = 4000;
        config.use_dev_server_url();
        assert_eq!(config.base_url, "http://127.0.0.1:4000");

        config.use_bound_port(4003);
        assert_eq!(config.serve.port, 4003);
        assert_eq!(config.base_url, "http://127.0.0.1:4003");
    }

    #[test]
    fn test_example_is_valid() {
        let config = SiteConfig::from_str(&SiteConfig::example(), Path::new("config.json")).unwrap();
        assert!(config.validate().is_ok());
    }
}
