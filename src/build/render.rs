//! Template data for each kind of output page.
//!
//! | Page          | Keys                                                    |
//! |---------------|---------------------------------------------------------|
//! | post          | `post`, `title`, `description`, `layout` + site keys    |
//! | page          | `page`, `title`, `description`, `layout` + site keys    |
//! | home          | `posts`, `featuredPage`, `description` + site keys      |
//! | posts listing | `posts`, `total`, `title`, `description` + site keys    |
//!
//! Site keys: `baseUrl` (no trailing slash), `siteName`, `pages`, `datasource`.

use crate::{
    config::SiteConfig,
    content::{ContentDocument, ContentKind},
    template::DEFAULT_LAYOUT,
};
use serde_json::{Map, Value, json};

pub const POSTS_TITLE: &str = "All Posts";
pub const POSTS_DESCRIPTION: &str = "Browse all blog posts";

/// Views shared by every page of one build.
#[derive(Debug, Clone)]
pub struct SiteData {
    site: Map<String, Value>,
    description: String,
    posts: Vec<Value>,
    featured_page: Value,
}

impl SiteData {
    pub fn new(config: &SiteConfig, posts: &[ContentDocument], pages: &[ContentDocument], datasource: Value) -> Self {
        let page_views: Vec<Value> = pages.iter().map(|p| p.view(config)).collect();
        let featured_page = pages
            .iter()
            .position(|p| !p.output_path.is_empty())
            .map_or(Value::Null, |idx| page_views[idx].clone());

        let mut site = Map::new();
        site.insert("baseUrl".into(), json!(config.base_url.trim_end_matches('/')));
        site.insert("siteName".into(), json!(config.site_name));
        site.insert("pages".into(), Value::Array(page_views));
        site.insert("datasource".into(), datasource);

        Self {
            site,
            description: config.description.clone(),
            posts: posts.iter().map(|p| p.view(config)).collect(),
            featured_page,
        }
    }

    /// Data for a post or page, by the document's kind.
    pub fn document(&self, config: &SiteConfig, doc: &ContentDocument) -> Value {
        let overridden = doc.meta_str("description").filter(|d| !d.is_empty());
        let description = match (doc.kind, doc.is_template_source) {
            (ContentKind::Post, true) => overridden.unwrap_or_else(|| doc.title.clone()),
            (ContentKind::Post, false) => doc.description(),
            (ContentKind::Page, _) => overridden.unwrap_or_else(|| self.description.clone()),
        };
        let layout = doc.meta_str("layout").filter(|l| !l.is_empty()).unwrap_or_else(|| DEFAULT_LAYOUT.into());

        self.with_site([
            (doc.kind.data_key(), doc.view(config)),
            ("title", json!(doc.title)),
            ("description", json!(description)),
            ("layout", json!(layout)),
        ])
    }

    pub fn home(&self) -> Value {
        self.with_site([
            ("posts", Value::Array(self.posts.clone())),
            ("featuredPage", self.featured_page.clone()),
            ("description", json!(self.description)),
            ("layout", json!(DEFAULT_LAYOUT)),
        ])
    }

    pub fn posts_listing(&self) -> Value {
        self.with_site([
            ("posts", Value::Array(self.posts.clone())),
            ("total", json!(self.posts.len())),
            ("title", json!(POSTS_TITLE)),
            ("description", json!(POSTS_DESCRIPTION)),
            ("layout", json!(DEFAULT_LAYOUT)),
        ])
    }

    fn with_site<const N: usize>(&self, entries: [(&str, Value); N]) -> Value {
        let mut map = self.site.clone();
        for (key, value) in entries {
            map.insert(key.to_owned(), value);
        }
        Value::Object(map)
    }
}
