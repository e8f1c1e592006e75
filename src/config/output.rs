//! `html`, `rss` and `debug` sections: how generated output is shaped.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// HTML post-processing mode applied to every composed page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HtmlFormat {
    /// Leave output untouched.
    #[default]
    Default,
    /// Collapse whitespace and drop comments.
    Minify,
    /// Re-indent the document.
    Beautify,
}

/// `html` section.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HtmlConfig {
    #[serde(default)]
    pub format: HtmlFormat,

    /// Indent width used by `beautify`.
    #[serde(default = "defaults::html::indent_size")]
    #[educe(Default = defaults::html::indent_size())]
    pub indent_size: usize,
}

/// `rss` section.
///
/// # Example
/// ```json
/// "rss": { "enabled": true, "fileName": "feed.xml", "maxItems": 10 }
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RssConfig {
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub enabled: bool,

    /// Feed path relative to the output root.
    #[serde(default = "defaults::rss::file_name")]
    #[educe(Default = defaults::rss::file_name())]
    pub file_name: String,

    /// Overrides `siteName` as channel title.
    #[serde(default)]
    pub title: Option<String>,

    /// Overrides the site description as channel description.
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default = "defaults::rss::language")]
    #[educe(Default = defaults::rss::language())]
    pub language: String,

    #[serde(default = "defaults::rss::max_items")]
    #[educe(Default = defaults::rss::max_items())]
    pub max_items: usize,

    /// Embed the full post body as `content:encoded`.
    #[serde(default)]
    pub include_full_content: bool,
}

/// `debug` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DebugConfig {
    /// Append a render trace comment to every page (dev server only).
    #[serde(default)]
    pub enabled: bool,
}
