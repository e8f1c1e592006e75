//! Content documents: discovery, parsing and the cached store.
//!
//! ```text
//! posts/, pages/ ──► discover ──► parse ──► ContentDocument ──► ContentStore
//!                    (walkdir)    (front matter + markdown)      (two tiers)
//! ```

mod discover;
mod meta;
mod parse;
mod store;

pub use discover::{DiscoveredFile, discover, document_id, is_content_file};
pub use meta::{parse_date, strip_tags, truncate_chars};
pub use parse::{ParsedContent, parse, parse_source, render_markdown};
pub use store::ContentStore;

use crate::config::SiteConfig;
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use thiserror::Error;

/// Characters kept by the derived summary.
const SUMMARY_LEN: usize = 160;

/// Content-level failures for a single file.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("unsupported content extension: `{0}`")]
    UnsupportedExtension(PathBuf),

    #[error("failed to read `{0}`")]
    Io(PathBuf, #[source] std::io::Error),
}

/// The two cache tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Post,
    Page,
}

impl ContentKind {
    /// Conventional template name for this kind.
    pub const fn template_name(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Page => "page",
        }
    }

    /// Key the document is bound to in render data.
    pub const fn data_key(self) -> &'static str {
        self.template_name()
    }
}

/// One parsed post or page.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentDocument {
    pub kind: ContentKind,
    /// Relative source path without extension, `/`-separated.
    pub id: String,
    pub title: String,
    /// HTML, or raw template source when `is_template_source`.
    pub body: String,
    pub metadata: Map<String, Value>,
    /// URL-relative output path; "" is the site root.
    pub output_path: String,
    pub is_template_source: bool,
    pub source: PathBuf,
    /// Posts only.
    pub date: Option<NaiveDateTime>,
    /// Pages only.
    pub nav_order: Option<i64>,
}

impl ContentDocument {
    /// String value of a metadata key, scalars stringified.
    pub fn meta_str(&self, key: &str) -> Option<String> {
        meta::value_as_string(self.metadata.get(key)?)
    }

    /// `tags` metadata as a list or comma-separated string.
    pub fn tags(&self) -> Vec<String> {
        self.metadata.get("tags").map(meta::string_list).unwrap_or_default()
    }

    /// Metadata `summary`, else the start of the tag-stripped body.
    pub fn summary(&self) -> String {
        self.meta_str("summary")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.excerpt())
    }

    /// Metadata `description`, else the summary.
    pub fn description(&self) -> String {
        self.meta_str("description")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.summary())
    }

    fn excerpt(&self) -> String {
        if self.is_template_source {
            return String::new();
        }
        truncate_chars(&strip_tags(&self.body), SUMMARY_LEN)
    }

    /// Root-relative URL, always with a trailing slash.
    pub fn url(&self) -> String {
        let path = self.output_path.trim_matches('/');
        if path.is_empty() { "/".into() } else { format!("/{path}/") }
    }

    /// Serializable view handed to templates.
    pub fn view(&self, config: &SiteConfig) -> Value {
        let view = DocumentView {
            id: &self.id,
            title: &self.title,
            content: &self.body,
            metadata: &self.metadata,
            path: &self.output_path,
            url: self.url(),
            permalink: config.url_for(&self.output_path),
            date: self.date.map(|d| d.format("%Y-%m-%dT%H:%M:%S").to_string()),
            nav_order: self.nav_order,
            tags: self.tags(),
            summary: self.summary(),
            description: self.description(),
            is_template: self.is_template_source,
        };
        serde_json::to_value(view).unwrap_or(Value::Null)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentView<'a> {
    id: &'a str,
    title: &'a str,
    content: &'a str,
    metadata: &'a Map<String, Value>,
    path: &'a str,
    url: String,
    permalink: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nav_order: Option<i64>,
    tags: Vec<String>,
    summary: String,
    description: String,
    is_template: bool,
}

#[cfg(test)]
pub(crate) fn test_document(kind: ContentKind, id: &str, title: &str, body: &str) -> ContentDocument {
    ContentDocument {
        kind,
        id: id.into(),
        title: title.into(),
        body: body.into(),
        metadata: Map::new(),
        output_path: id.into(),
        is_template_source: false,
        source: PathBuf::from(format!("{id}.md")),
        date: None,
        nav_order: None,
    }
}
