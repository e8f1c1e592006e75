//! `theme` and `paths` sections: where sources live and where output goes.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Deserializer, Serialize};

/// `theme` section - templates, assets and output directories.
///
/// # Example
/// ```json
/// "theme": {
///   "templates": "templates",
///   "assets": ["static", "images"],
///   "output": "build",
///   "flatten": ["static", "public"]
/// }
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ThemeConfig {
    #[serde(default = "defaults::theme::templates")]
    #[educe(Default = defaults::theme::templates())]
    pub templates: String,

    /// Asset roots copied verbatim into the output tree.
    #[serde(default = "defaults::theme::assets", deserialize_with = "one_or_many")]
    #[educe(Default = defaults::theme::assets())]
    pub assets: Vec<String>,

    #[serde(default = "defaults::theme::output")]
    #[educe(Default = defaults::theme::output())]
    pub output: String,

    /// Asset roots whose contents land directly under the output root
    /// instead of a subdirectory named after the root.
    #[serde(default = "defaults::theme::flatten")]
    #[educe(Default = defaults::theme::flatten())]
    pub flatten: Vec<String>,
}

/// `paths` section - content directories.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PathsConfig {
    #[serde(default = "defaults::paths::posts")]
    #[educe(Default = defaults::paths::posts())]
    pub posts: String,

    #[serde(default = "defaults::paths::pages", deserialize_with = "one_or_many")]
    #[educe(Default = defaults::paths::pages())]
    pub pages: Vec<String>,
}

/// Accept either `"pages"` or `["pages", "docs"]`.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(one) => vec![one],
        OneOrMany::Many(many) => many,
    })
}
