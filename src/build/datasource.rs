//! Datasource bundle: structured data extracted from rendered content.
//!
//! ```text
//! build/datasource/
//!   images.json        every <img src> in posts and pages
//!   <type>.json        elements carrying `collectAttribute="<type>"`
//!   <dataset.output>   entities from a folder and/or tagged documents
//! ```

use super::output::write_output;
use crate::{
    config::{DatasetConfig, DatasourceConfig},
    content::{ContentDocument, ContentKind, document_id, parse},
    debug, log,
};
use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::LazyLock,
};
use walkdir::WalkDir;

/// Extensions picked up by folder scans. `markdown` is not parseable and
/// gets reported and skipped.
const ENTITY_EXTENSIONS: &[&str] = &["md", "markdown", "html", "hbs"];

static NON_SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9_-]").unwrap());
static DASHES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-+").unwrap());

// ============================================================================
// Bundle Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub path: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageItem {
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub source: ItemSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectableItem {
    pub source: ItemSource,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityItem {
    pub dataset: String,
    pub id: String,
    pub title: String,
    pub content: String,
    pub metadata: BTreeMap<String, String>,
    pub source: ItemSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dataset {
    pub name: String,
    #[serde(skip)]
    pub output: String,
    pub items: Vec<EntityItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasourceBundle {
    pub images: Vec<ImageItem>,
    /// Collect-attribute value → elements, in first-seen order of values.
    pub collectables: Vec<(String, Vec<CollectableItem>)>,
    pub datasets: Vec<Dataset>,
}

impl DatasourceBundle {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
            && self.collectables.iter().all(|(_, items)| items.is_empty())
            && self.datasets.iter().all(|d| d.items.is_empty())
    }

    /// Template-facing view: `{ images, collectables: {type: [..]}, datasets: {name: [..]} }`.
    pub fn to_value(&self) -> Value {
        let collectables: Map<String, Value> = self
            .collectables
            .iter()
            .map(|(kind, items)| (kind.clone(), serde_json::to_value(items).unwrap_or_default()))
            .collect();
        let datasets: Map<String, Value> = self
            .datasets
            .iter()
            .map(|d| (d.name.clone(), serde_json::to_value(&d.items).unwrap_or_default()))
            .collect();

        serde_json::json!({
            "images": self.images,
            "collectables": collectables,
            "datasets": datasets,
        })
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builds and writes the datasource bundle for one site.
#[derive(Debug, Clone)]
pub struct DatasourceBuilder {
    root: PathBuf,
    output: PathBuf,
    config: DatasourceConfig,
}

impl DatasourceBuilder {
    pub fn new(root: &Path, output: &Path, config: &DatasourceConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            output: output.to_path_buf(),
            config: config.clone(),
        }
    }

    /// Empty when disabled.
    pub fn build_bundle(&self, posts: &[ContentDocument], pages: &[ContentDocument]) -> DatasourceBundle {
        if !self.config.enabled {
            return DatasourceBundle::default();
        }

        let documents: Vec<&ContentDocument> = posts
            .iter()
            .chain(pages)
            .filter(|doc| !doc.is_template_source)
            .collect();

        let mut images = Vec::new();
        let mut collectables: Vec<(String, Vec<CollectableItem>)> = Vec::new();
        let attribute = self.config.collect_attribute.trim();

        for doc in &documents {
            let source = source_of(doc);
            let Ok(dom) = tl::parse(&doc.body, tl::ParserOptions::default()) else {
                debug!("datasource"; "unparseable html in {}", doc.id);
                continue;
            };
            let parser = dom.parser();

            for tag in dom.nodes().iter().filter_map(tl::Node::as_tag) {
                if tag.name().as_utf8_str().eq_ignore_ascii_case("img")
                    && let Some(src) = attr(tag, "src").filter(|s| !s.is_empty())
                {
                    images.push(ImageItem {
                        src,
                        alt: attr(tag, "alt").filter(|s| !s.is_empty()),
                        title: attr(tag, "title").filter(|s| !s.is_empty()),
                        source: source.clone(),
                    });
                }

                if attribute.is_empty() {
                    continue;
                }
                let Some(kind) = attr(tag, attribute).filter(|s| !s.is_empty()) else {
                    continue;
                };

                let attributes = tag
                    .attributes()
                    .iter()
                    .filter(|(key, _)| *key != attribute && key.starts_with("data-"))
                    .map(|(key, value)| (key.into_owned(), value.map(|v| v.into_owned()).unwrap_or_default()))
                    .collect();
                let text = tag.inner_text(parser).trim().to_owned();

                let item = CollectableItem {
                    source: source.clone(),
                    html: tag.outer_html(parser),
                    text: Some(text).filter(|t| !t.is_empty()),
                    attributes,
                };
                match collectables.iter_mut().find(|(k, _)| *k == kind) {
                    Some((_, items)) => items.push(item),
                    None => collectables.push((kind, vec![item])),
                }
            }
        }

        let datasets = self
            .config
            .datasets
            .iter()
            .map(|dataset| {
                let mut items = self.entities_from_folder(dataset);
                items.extend(entities_from_metadata(dataset, &documents));
                Dataset {
                    name: dataset.name.clone(),
                    output: dataset.output.clone(),
                    items,
                }
            })
            .collect();

        DatasourceBundle {
            images,
            collectables,
            datasets,
        }
    }

    /// Write non-empty parts of `bundle` under `<output>/<outputDir>`.
    pub fn write_bundle(&self, bundle: &DatasourceBundle) -> Result<usize> {
        if !self.config.enabled || bundle.is_empty() {
            return Ok(0);
        }

        let dir = self.output.join(&self.config.output_dir);
        let mut written = 0;

        if !bundle.images.is_empty() {
            write_json(&dir.join(&self.config.images_file_name), &bundle.images)?;
            written += 1;
        }
        for (kind, items) in bundle.collectables.iter().filter(|(_, items)| !items.is_empty()) {
            write_json(&dir.join(format!("{}.json", sanitize_type(kind))), items)?;
            written += 1;
        }
        for dataset in bundle.datasets.iter().filter(|d| !d.items.is_empty()) {
            write_json(&dir.join(&dataset.output), &dataset.items)?;
            written += 1;
        }

        debug!("datasource"; "wrote {written} files");
        Ok(written)
    }

    /// Content files under `dataset.folder`, skipping `index` files.
    ///
    /// Files that fail to parse are logged and skipped.
    fn entities_from_folder(&self, dataset: &DatasetConfig) -> Vec<EntityItem> {
        let Some(folder) = dataset.folder.as_deref() else {
            return Vec::new();
        };
        let dir = self.root.join(folder);
        if !dir.is_dir() {
            return Vec::new();
        }
        let prefix = folder.replace('\\', "/").trim_matches('/').to_owned();

        let files: Vec<PathBuf> = WalkDir::new(&dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| ENTITY_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            })
            .filter(|path| path.file_stem().is_none_or(|stem| !stem.eq_ignore_ascii_case("index")))
            .collect();

        let mut items = Vec::new();
        for path in files {
            let parsed = match parse(&path) {
                Ok(parsed) => parsed,
                Err(err) => {
                    log!("warn"; "skipping entity file: {err}");
                    continue;
                }
            };

            let slug = [prefix.as_str(), &document_id(&dir, &path)]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("/");
            let metadata = string_map(&parsed.metadata);
            let id = metadata
                .get("id")
                .filter(|id| !id.is_empty())
                .cloned()
                .unwrap_or_else(|| slug.replace('/', "-"));
            let title = metadata
                .get("title")
                .filter(|t| !t.is_empty())
                .cloned()
                .unwrap_or_else(|| id.clone());

            items.push(EntityItem {
                dataset: dataset.name.clone(),
                source: ItemSource {
                    kind: dataset.name.clone(),
                    id: id.clone(),
                    path: url_path(&slug),
                    title: title.clone(),
                },
                id,
                title,
                content: parsed.body,
                metadata,
            });
        }
        items
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Documents whose `metadataKey` names this dataset (string, list, or `true`).
fn entities_from_metadata(dataset: &DatasetConfig, documents: &[&ContentDocument]) -> Vec<EntityItem> {
    let Some(key) = dataset.metadata_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) else {
        return Vec::new();
    };

    documents
        .iter()
        .filter(|doc| match doc.metadata.get(key) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(name)) => name == &dataset.name,
            Some(Value::Array(names)) => names.iter().any(|n| n.as_str() == Some(dataset.name.as_str())),
            _ => false,
        })
        .map(|doc| {
            let metadata = string_map(&doc.metadata);
            EntityItem {
                dataset: dataset.name.clone(),
                id: metadata
                    .get("id")
                    .filter(|id| !id.is_empty())
                    .cloned()
                    .unwrap_or_else(|| doc.id.clone()),
                title: doc.title.clone(),
                content: doc.body.clone(),
                metadata,
                source: source_of(doc),
            }
        })
        .collect()
}

fn source_of(doc: &ContentDocument) -> ItemSource {
    ItemSource {
        kind: match doc.kind {
            ContentKind::Post => "post",
            ContentKind::Page => "page",
        }
        .to_owned(),
        id: doc.id.clone(),
        path: doc.url(),
        title: doc.title.clone(),
    }
}

fn attr(tag: &tl::HTMLTag<'_>, name: &str) -> Option<String> {
    tag.attributes()
        .get(name)
        .flatten()
        .map(|value| value.as_utf8_str().trim().to_owned())
}

/// Scalars stringified; arrays joined with `, `; objects as JSON.
fn string_map(metadata: &Map<String, Value>) -> BTreeMap<String, String> {
    metadata
        .iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                Value::Array(items) => items
                    .iter()
                    .map(|item| item.as_str().map_or_else(|| item.to_string(), str::to_owned))
                    .collect::<Vec<_>>()
                    .join(", "),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}

fn url_path(slug: &str) -> String {
    let slug = slug.trim_matches('/');
    if slug.is_empty() { "/".into() } else { format!("/{slug}/") }
}

/// `Team Member` → `team-member`; empty results become `collectable`.
fn sanitize_type(kind: &str) -> String {
    let lower = kind.to_lowercase();
    let dashed = NON_SLUG_RE.replace_all(&lower, "-");
    let collapsed = DASHES_RE.replace_all(&dashed, "-");
    let trimmed = collapsed.trim_matches('-');
    if trimmed.is_empty() { "collectable".into() } else { trimmed.to_owned() }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    write_output(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::test_document;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn config() -> DatasourceConfig {
        DatasourceConfig {
            enabled: true,
            ..DatasourceConfig::default()
        }
    }

    fn builder(dir: &TempDir, config: DatasourceConfig) -> DatasourceBuilder {
        DatasourceBuilder::new(dir.path(), &dir.path().join("build"), &config)
    }

    #[test]
    fn test_disabled_is_empty() {
        let dir = TempDir::new().unwrap();
        let doc = test_document(ContentKind::Post, "a", "A", r#"<img src="x.png">"#);
        let builder = builder(&dir, DatasourceConfig::default());

        let bundle = builder.build_bundle(&[doc], &[]);
        assert!(bundle.is_empty());
        assert_eq!(builder.write_bundle(&bundle).unwrap(), 0);
    }

    #[test]
    fn test_collect_images() {
        let dir = TempDir::new().unwrap();
        let post = test_document(
            ContentKind::Post,
            "hello",
            "Hello",
            r#"<p><img src="/a.png" alt="A"><img src=""><img src="/b.png" title="B"></p>"#,
        );
        let mut template = test_document(ContentKind::Page, "tpl", "Tpl", r#"<img src="/c.png">"#);
        template.is_template_source = true;

        let bundle = builder(&dir, config()).build_bundle(&[post], &[template]);
        assert_eq!(bundle.images.len(), 2);
        assert_eq!(bundle.images[0].src, "/a.png");
        assert_eq!(bundle.images[0].alt.as_deref(), Some("A"));
        assert_eq!(bundle.images[1].title.as_deref(), Some("B"));
        assert_eq!(bundle.images[0].source.kind, "post");
        assert_eq!(bundle.images[0].source.path, "/hello/");
    }

    #[test]
    fn test_collectables_grouped_by_type() {
        let dir = TempDir::new().unwrap();
        let page = test_document(
            ContentKind::Page,
            "about",
            "About",
            r#"<div data-datasource="Team Member" data-role="lead" class="x">Ann</div><span data-datasource="quote">Hi</span><div data-datasource="Team Member">Bob</div>"#,
        );

        let bundle = builder(&dir, config()).build_bundle(&[], &[page]);
        assert_eq!(bundle.collectables.len(), 2);

        let (kind, members) = &bundle.collectables[0];
        assert_eq!(kind, "Team Member");
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].text.as_deref(), Some("Ann"));
        assert_eq!(members[0].attributes.get("data-role").map(String::as_str), Some("lead"));
        assert!(!members[0].attributes.contains_key("data-datasource"));
        assert!(!members[0].attributes.contains_key("class"));
        assert!(members[0].html.starts_with("<div"));
    }

    #[test]
    fn test_datasets_from_folder_and_metadata() {
        let dir = TempDir::new().unwrap();
        let people = dir.path().join("people");
        fs::create_dir_all(people.join("team")).unwrap();
        fs::write(people.join("ann.md"), "---\ntitle: Ann\n---\nHi").unwrap();
        fs::write(people.join("team/bob.html"), "<p>Bob</p>").unwrap();
        fs::write(people.join("index.md"), "skip").unwrap();
        fs::write(people.join("legacy.markdown"), "unsupported").unwrap();

        let mut config = config();
        config.datasets.push(DatasetConfig {
            name: "people".into(),
            folder: Some("people".into()),
            output: "people.json".into(),
            metadata_key: Some("datasets".into()),
        });

        let mut post = test_document(ContentKind::Post, "carol", "Carol", "<p>c</p>");
        post.metadata.insert("datasets".into(), json!(["people", "other"]));
        let unrelated = test_document(ContentKind::Post, "dave", "Dave", "<p>d</p>");

        let bundle = builder(&dir, config).build_bundle(&[post, unrelated], &[]);
        let items = &bundle.datasets[0].items;
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();

        assert_eq!(ids, vec!["people-ann", "people-team-bob", "carol"]);
        assert_eq!(items[0].title, "Ann");
        assert_eq!(items[0].source.path, "/people/ann/");
        assert_eq!(items[1].title, "people-team-bob");
        assert_eq!(items[2].source.kind, "post");
    }

    #[test]
    fn test_write_bundle() {
        let dir = TempDir::new().unwrap();
        let page = test_document(
            ContentKind::Page,
            "about",
            "About",
            r#"<img src="/a.png"><b data-datasource="Fun Fact!">x</b>"#,
        );
        let builder = builder(&dir, config());
        let bundle = builder.build_bundle(&[], &[page]);

        assert_eq!(builder.write_bundle(&bundle).unwrap(), 2);
        let root = dir.path().join("build/datasource");
        let images: Value = serde_json::from_str(&fs::read_to_string(root.join("images.json")).unwrap()).unwrap();
        assert_eq!(images[0]["src"], "/a.png");
        assert_eq!(images[0]["source"]["type"], "page");
        assert!(root.join("fun-fact.json").is_file());
    }

    #[test]
    fn test_sanitize_type() {
        assert_eq!(sanitize_type("Team Member"), "team-member");
        assert_eq!(sanitize_type("--a__b--"), "a__b");
        assert_eq!(sanitize_type("!!!"), "collectable");
    }

    #[test]
    fn test_bundle_value() {
        let dir = TempDir::new().unwrap();
        let page = test_document(ContentKind::Page, "p", "P", r#"<img src="/a.png">"#);
        let value = builder(&dir, config()).build_bundle(&[], &[page]).to_value();
        assert_eq!(value["images"][0]["src"], "/a.png");
        assert!(value["collectables"].is_object());
        assert!(value["datasets"].is_object());
    }
}
