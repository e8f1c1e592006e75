//! Template composition: content template → layout, with block overrides.
//!
//! ```text
//! resolve template          resolve layout
//!  metadata `template`       metadata `layout` (default "default")
//!  └─► <kind>.hbs            └─► layouts/<name>.hbs
//!      └─► built-in              └─► layouts/default.hbs
//!                                    └─► built-in default
//!
//! RenderPass ─► render content (collects {{#content}} overrides)
//!            ─► render layout  ({{#block}} reads overrides, {{{content}}} slot)
//!            ─► html::process ─► debug trace
//! ```

mod blocks;
mod fallback;
mod helpers;
pub mod html;
mod resolve;

pub use blocks::{BlockRegistry, RenderPass};

use crate::{
    config::{HtmlConfig, SiteConfig, SiteLayout},
    content::{ContentDocument, ContentKind},
    debug, log,
};
use anyhow::{Context, Result};
use chrono::Local;
use handlebars::Handlebars;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use walkdir::WalkDir;

pub const DEFAULT_LAYOUT: &str = "default";

/// Metadata `layout` values that disable wrapping.
const NO_LAYOUT: &[&str] = &["none", "false"];

/// A template body plus a label used in errors and debug traces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSource {
    pub name: String,
    pub source: Arc<str>,
}

impl TemplateSource {
    fn builtin(name: &str, source: &'static str) -> Self {
        Self {
            name: format!("builtin:{name}"),
            source: Arc::from(source),
        }
    }

    /// A document whose body is itself the template.
    pub fn inline(name: &str, source: &str) -> Self {
        Self {
            name: name.to_owned(),
            source: Arc::from(source),
        }
    }
}

/// Resolves and renders templates for one site.
pub struct TemplateComposer {
    base: Handlebars<'static>,
    templates: PathBuf,
    layouts: PathBuf,
    partials: PathBuf,
    sources: RwLock<FxHashMap<PathBuf, Option<Arc<str>>>>,
    html: HtmlConfig,
    debug_trace: bool,
}

impl TemplateComposer {
    /// `debug_trace` appends a render trace comment to every page.
    pub fn new(layout: &SiteLayout, config: &SiteConfig, debug_trace: bool) -> Self {
        let mut composer = Self {
            base: Handlebars::new(),
            templates: layout.templates.clone(),
            layouts: layout.layouts_dir(),
            partials: layout.partials_dir(),
            sources: RwLock::default(),
            html: config.html.clone(),
            debug_trace,
        };
        composer.reload();
        composer
    }

    /// Forget cached sources and re-register helpers and partials.
    pub fn reload(&mut self) {
        self.sources.write().clear();

        let mut base = Handlebars::new();
        helpers::register(&mut base, &self.templates);
        register_partials(&mut base, &self.partials);
        self.base = base;
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Metadata override → `<name>.hbs` → built-in.
    pub fn resolve_template(&self, name: &str, override_ref: Option<&str>) -> TemplateSource {
        if let Some(reference) = override_ref.filter(|r| !r.is_empty()) {
            match resolve::sandboxed(&self.templates, reference) {
                Some(path) => match self.read_cached(&path) {
                    Some(source) => return self.file_source(&path, source),
                    None => log!("warn"; "template `{reference}` not found, using `{name}`"),
                },
                None => log!("warn"; "template `{reference}` is outside the templates directory, using `{name}`"),
            }
        }

        let conventional = self.templates.join(format!("{name}.{}", resolve::TEMPLATE_EXTENSION));
        if let Some(source) = self.read_cached(&conventional) {
            return self.file_source(&conventional, source);
        }

        debug!("template"; "{name}.hbs not found, using built-in fallback");
        TemplateSource::builtin(name, fallback::template(name))
    }

    /// `layouts/<name>.hbs` → `layouts/default.hbs` → built-in default.
    pub fn resolve_layout(&self, name: &str) -> TemplateSource {
        if let Some(found) = self.layout_file(name) {
            return found;
        }

        if name != DEFAULT_LAYOUT {
            log!("warn"; "layout `{name}` not found, falling back to `{DEFAULT_LAYOUT}`");
            if let Some(found) = self.layout_file(DEFAULT_LAYOUT) {
                return found;
            }
        }

        debug!("template"; "using built-in default layout");
        TemplateSource::builtin("layouts/default", fallback::DEFAULT_LAYOUT)
    }

    fn layout_file(&self, name: &str) -> Option<TemplateSource> {
        let path = resolve::sandboxed(&self.layouts, name)?;
        let source = self.read_cached(&path)?;
        Some(self.file_source(&path, source))
    }

    fn read_cached(&self, path: &Path) -> Option<Arc<str>> {
        if let Some(cached) = self.sources.read().get(path) {
            return cached.clone();
        }

        let source = fs::read_to_string(path).ok().map(Arc::from);
        self.sources.write().insert(path.to_path_buf(), source.clone());
        source
    }

    fn file_source(&self, path: &Path, source: Arc<str>) -> TemplateSource {
        TemplateSource {
            name: path
                .strip_prefix(&self.templates)
                .unwrap_or(path)
                .display()
                .to_string(),
            source,
        }
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Render `template`, then wrap it in `layout` when given.
    pub fn render_with_layout(
        &self,
        template: &TemplateSource,
        layout: Option<&TemplateSource>,
        mut data: Value,
    ) -> Result<String> {
        let pass = RenderPass::new(&self.base);

        let content = pass
            .render(&template.source, &data)
            .with_context(|| format!("failed to render template `{}`", template.name))?;

        let composed = match layout {
            None => content,
            Some(layout) => {
                if let Value::Object(map) = &mut data {
                    map.insert("content".into(), Value::String(content));
                }
                pass.render(&layout.source, &data)
                    .with_context(|| format!("failed to render layout `{}`", layout.name))?
            }
        };
        drop(pass);

        let processed = html::process(&composed, &self.html);
        if !self.debug_trace {
            return Ok(processed);
        }

        let trace = trace_comment(&template.name, layout.map(|l| l.name.as_str()), &data);
        Ok(html::inject_before_body_end(&processed, &trace))
    }

    /// Render a post or page with its resolved template and layout.
    pub fn render_document(&self, doc: &ContentDocument, data: Value) -> Result<String> {
        let template = if doc.is_template_source {
            TemplateSource::inline(&doc.id, &doc.body)
        } else {
            self.resolve_template(doc.kind.template_name(), doc.meta_str("template").as_deref())
        };
        let layout = self.layout_for(doc);
        self.render_with_layout(&template, layout.as_ref(), data)
            .with_context(|| format!("failed to render {} `{}`", kind_label(doc.kind), doc.id))
    }

    /// Render a listing page (`home`, `posts`) with the default layout.
    pub fn render_named(&self, name: &str, data: Value) -> Result<String> {
        let template = self.resolve_template(name, None);
        let layout = self.resolve_layout(DEFAULT_LAYOUT);
        self.render_with_layout(&template, Some(&layout), data)
    }

    /// Metadata `layout` name, or `None` when wrapping is disabled.
    pub fn layout_for(&self, doc: &ContentDocument) -> Option<TemplateSource> {
        match doc.metadata.get("layout") {
            Some(Value::Bool(false)) => None,
            Some(Value::String(name)) if NO_LAYOUT.contains(&name.as_str()) => None,
            Some(Value::String(name)) if !name.is_empty() => Some(self.resolve_layout(name)),
            _ => Some(self.resolve_layout(DEFAULT_LAYOUT)),
        }
    }
}

const fn kind_label(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Post => "post",
        ContentKind::Page => "page",
    }
}

/// Register `partials/**/*.hbs` by path without extension (`nav`, `cards/post`).
fn register_partials(registry: &mut Handlebars<'static>, dir: &Path) {
    if !dir.is_dir() {
        return;
    }

    for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().is_none_or(|ext| ext != resolve::TEMPLATE_EXTENSION)
        {
            continue;
        }

        let name = crate::content::document_id(dir, path);
        let registered = fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|source| registry.register_partial(&name, source).map_err(anyhow::Error::from));
        if let Err(err) = registered {
            log!("warn"; "skipping partial `{name}`: {err}");
        }
    }
}

// ============================================================================
// Debug Trace
// ============================================================================

fn trace_comment(template: &str, layout: Option<&str>, data: &Value) -> String {
    let mut out = String::from("  statik render trace\n");
    let _ = writeln!(out, "  generated: {}", Local::now().format("%Y-%m-%dT%H:%M:%S"));
    let _ = writeln!(out, "  template: {template}");
    let _ = writeln!(out, "  layout: {}", layout.unwrap_or("none"));

    let document = ["post", "page"]
        .iter()
        .find_map(|key| data.get(*key).and_then(|d| d.get("id")).and_then(Value::as_str));
    if let Some(id) = document {
        let _ = writeln!(out, "  document: {id}");
    }

    if let Value::Object(map) = data {
        out.push_str("  context:\n");
        for (key, value) in map {
            let summary = match key.as_str() {
                "content" | "datasource" => "[omitted]".to_owned(),
                _ => summarize(value),
            };
            let _ = writeln!(out, "    {key}: {summary}");
        }
    }
    format!("<!--\n{}-->", helpers::comment_safe(&out))
}

fn summarize(value: &Value) -> String {
    match value {
        Value::String(s) if s.chars().count() > 50 => {
            format!("\"{}...\"", crate::content::truncate_chars(s, 50))
        }
        Value::String(s) => format!("\"{s}\""),
        Value::Array(items) => format!("[{} items]", items.len()),
        Value::Object(map) => format!("{{{} entries}}", map.len()),
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::test_document;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, SiteLayout, SiteConfig) {
        let dir = TempDir::new().unwrap();
        let layout = SiteLayout {
            root: dir.path().to_path_buf(),
            config_file: "config.json".into(),
            posts: dir.path().join("posts"),
            pages: vec![dir.path().join("pages")],
            templates: dir.path().join("templates"),
            assets: vec![],
            output: dir.path().join("build"),
        };
        fs::create_dir_all(layout.layouts_dir()).unwrap();
        (dir, layout, SiteConfig::default())
    }

    fn write(layout: &SiteLayout, rel: &str, content: &str) {
        let path = layout.templates.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_block_override_precedence() {
        let (_dir, layout, config) = setup();
        write(&layout, "layouts/default.hbs", r#"<head>{{#block "head"}}<meta a>{{/block}}</head>"#);
        let composer = TemplateComposer::new(&layout, &config, false);

        let template = TemplateSource::inline("t", r#"{{#content "head"}}<title>X</title>{{/content}}"#);
        let layout_src = composer.resolve_layout(DEFAULT_LAYOUT);
        let html = composer.render_with_layout(&template, Some(&layout_src), json!({})).unwrap();

        assert_eq!(html, "<head><title>X</title></head>");
        assert_eq!(html.matches("<title>X</title>").count(), 1);
        assert!(!html.contains("<meta a>"));
    }

    #[test]
    fn test_empty_override_suppresses_default() {
        let (_dir, layout, config) = setup();
        write(&layout, "layouts/default.hbs", r#"<body>{{{content}}}{{#block "footer"}}<footer>f</footer>{{/block}}</body>"#);
        let composer = TemplateComposer::new(&layout, &config, false);

        let template = TemplateSource::inline("t", r#"<p>x</p>{{#content "footer"}}{{/content}}"#);
        let layout_src = composer.resolve_layout(DEFAULT_LAYOUT);
        let html = composer.render_with_layout(&template, Some(&layout_src), json!({})).unwrap();

        assert_eq!(html, "<body><p>x</p></body>");
    }

    #[test]
    fn test_consecutive_renders_do_not_leak_blocks() {
        let (_dir, layout, config) = setup();
        write(&layout, "layouts/default.hbs", r#"{{#block "head"}}default{{/block}}|{{{content}}}"#);
        let composer = TemplateComposer::new(&layout, &config, false);
        let layout_src = composer.resolve_layout(DEFAULT_LAYOUT);

        let overriding = TemplateSource::inline("a", r#"{{#content "head"}}custom{{/content}}a"#);
        let plain = TemplateSource::inline("b", "b");

        let first = composer.render_with_layout(&overriding, Some(&layout_src), json!({})).unwrap();
        let second = composer.render_with_layout(&plain, Some(&layout_src), json!({})).unwrap();
        assert_eq!(first, "custom|a");
        assert_eq!(second, "default|b");
    }

    #[test]
    fn test_template_sandbox() {
        let (dir, layout, config) = setup();
        fs::write(dir.path().join("secrets.hbs"), "SECRET").unwrap();
        write(&layout, "post.hbs", "conventional");
        let composer = TemplateComposer::new(&layout, &config, false);

        let resolved = composer.resolve_template("post", Some("../../secrets"));
        assert_eq!(&*resolved.source, "conventional");

        let resolved = composer.resolve_template("post", Some("../secrets"));
        assert_eq!(&*resolved.source, "conventional");
    }

    #[test]
    fn test_template_resolution_order() {
        let (_dir, layout, config) = setup();
        write(&layout, "custom.hbs", "custom");
        write(&layout, "post.hbs", "conventional");
        let composer = TemplateComposer::new(&layout, &config, false);

        assert_eq!(&*composer.resolve_template("post", Some("custom")).source, "custom");
        assert_eq!(&*composer.resolve_template("post", Some("missing")).source, "conventional");
        assert_eq!(&*composer.resolve_template("post", None).source, "conventional");
        assert!(composer.resolve_template("page", None).name.starts_with("builtin:"));
    }

    #[test]
    fn test_layout_resolution_order() {
        let (_dir, layout, config) = setup();
        let composer = TemplateComposer::new(&layout, &config, false);
        assert_eq!(composer.resolve_layout("wide").name, "builtin:layouts/default");

        write(&layout, "layouts/default.hbs", "user default");
        write(&layout, "layouts/wide.hbs", "wide");
        let mut composer = composer;
        composer.reload();

        assert_eq!(&*composer.resolve_layout("wide").source, "wide");
        assert_eq!(&*composer.resolve_layout("missing").source, "user default");
    }

    #[test]
    fn test_unwrapped_without_layout() {
        let (_dir, layout, config) = setup();
        let composer = TemplateComposer::new(&layout, &config, false);

        let mut doc = test_document(ContentKind::Page, "raw", "Raw", "");
        doc.is_template_source = true;
        doc.body = "<p>{{page.title}}</p>".into();
        doc.metadata.insert("layout".into(), json!("none"));

        let html = composer.render_document(&doc, json!({"page": {"title": "Raw"}})).unwrap();
        assert_eq!(html, "<p>Raw</p>");
    }

    #[test]
    fn test_render_document_with_layout() {
        let (_dir, layout, config) = setup();
        write(&layout, "layouts/default.hbs", "<main>{{{content}}}</main>");
        write(&layout, "post.hbs", "<article>{{post.title}}</article>");
        let composer = TemplateComposer::new(&layout, &config, false);

        let doc = test_document(ContentKind::Post, "hello", "Hello", "<p>World</p>");
        let html = composer.render_document(&doc, json!({"post": {"title": "Hello"}})).unwrap();
        assert_eq!(html, "<main><article>Hello</article></main>");
    }

    #[test]
    fn test_partials_registered() {
        let (_dir, layout, config) = setup();
        write(&layout, "partials/nav.hbs", "<nav>{{siteName}}</nav>");
        let composer = TemplateComposer::new(&layout, &config, false);

        let template = TemplateSource::inline("t", "{{> nav}}");
        let html = composer.render_with_layout(&template, None, json!({"siteName": "S"})).unwrap();
        assert_eq!(html, "<nav>S</nav>");
    }

    #[test]
    fn test_source_cache_cleared_on_reload() {
        let (_dir, layout, config) = setup();
        write(&layout, "post.hbs", "v1");
        let mut composer = TemplateComposer::new(&layout, &config, false);
        assert_eq!(&*composer.resolve_template("post", None).source, "v1");

        write(&layout, "post.hbs", "v2");
        assert_eq!(&*composer.resolve_template("post", None).source, "v1");

        composer.reload();
        assert_eq!(&*composer.resolve_template("post", None).source, "v2");
    }

    #[test]
    fn test_debug_trace() {
        let (_dir, layout, config) = setup();
        let composer = TemplateComposer::new(&layout, &config, true);

        let template = TemplateSource::inline("hello", "<body>hi</body>");
        let html = composer
            .render_with_layout(&template, None, json!({"post": {"id": "hello"}, "title": "Hi"}))
            .unwrap();

        assert!(html.starts_with("<body>hi<!--"));
        assert!(html.contains("template: hello"));
        assert!(html.contains("layout: none"));
        assert!(html.contains("document: hello"));
        assert!(html.contains("title: \"Hi\""));
        assert!(html.ends_with("-->\n</body>"));
    }

    #[test]
    fn test_debug_trace_never_closes_comment_early() {
        let long = format!("a -- b{}", "x".repeat(60));
        let data = json!({"post": {"id": "x--y"}, "long": long, "short": "c -- d", "odd--key": 1});
        let trace = trace_comment("t--pl", Some("wide"), &data);

        let inner = trace.strip_prefix("<!--").unwrap().strip_suffix("-->").unwrap();
        assert!(!inner.contains("--"), "{trace}");
        assert!(trace.contains("long: \"a - - b"));
        assert!(trace.contains("short: \"c - - d\""));
        assert!(trace.contains("odd- -key: 1"));
        assert!(trace.contains("document: x- -y"));
    }

    #[test]
    fn test_render_error_names_template() {
        let (_dir, layout, config) = setup();
        let composer = TemplateComposer::new(&layout, &config, false);

        let template = TemplateSource::inline("broken", "{{#if}}");
        let err = composer.render_with_layout(&template, None, json!({})).unwrap_err();
        assert!(format!("{err:#}").contains("broken"));
    }
}
