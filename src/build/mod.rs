//! Site building orchestration.
//!
//! ```text
//! build_full()
//!     ├── load posts + pages (cache-aware)
//!     ├── build datasource bundle
//!     ├── render home, posts listing, every post, every page (rayon)
//!     ├── generate feed
//!     ├── copy assets
//!     └── write datasource bundle
//!
//! build_incremental(paths)
//!     └── ChangeBatch::classify
//!           ├── config changed  → reload config, clear cache, build_full
//!           ├── templates       → build_full
//!           └── otherwise       → per post / page / asset
//! ```

mod assets;
mod classify;
mod datasource;
mod feed;
mod output;
mod render;

pub use classify::ChangeBatch;

use crate::{
    config::{ConfigHandle, SiteConfig, SiteLayout},
    content::{ContentDocument, ContentKind, ContentStore, document_id},
    debug, log,
    template::{TemplateComposer, html::inject_before_body_end},
};
use anyhow::{Context, Result};
use assets::AssetCopier;
use datasource::{DatasourceBuilder, DatasourceBundle};
use output::{page_path, write_output};
use rayon::prelude::*;
use render::SiteData;
use std::{
    fmt,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

pub const LIVE_RELOAD_SCRIPT: &str = r#"<script src="/__statik__/livereload.js"></script>"#;

const POSTS_LISTING: &str = "posts";

/// How the orchestrator was started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Dev server mode: `baseUrl` points at the server, debug trace allowed.
    pub dev_server: bool,
    /// Inject the live reload client into every page.
    pub live_reload: bool,
}

/// Counts of what a build produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub full: bool,
    pub posts: usize,
    pub pages: usize,
    pub listings: usize,
    pub assets: usize,
    pub feed: bool,
    pub datasource_files: usize,
    /// Ids referenced by a change but no longer on disk.
    pub skipped: usize,
    pub failed: usize,
}

impl BuildReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether anything was written to the output directory.
    pub fn wrote_output(&self) -> bool {
        self.feed || self.posts + self.pages + self.listings + self.assets + self.datasource_files > 0
    }

    fn count(&mut self, kind: ContentKind) {
        match kind {
            ContentKind::Post => self.posts += 1,
            ContentKind::Page => self.pages += 1,
        }
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} posts, {} pages, {} listings, {} assets",
            self.posts, self.pages, self.listings, self.assets
        )?;
        if self.feed {
            write!(f, ", feed")?;
        }
        if self.datasource_files > 0 {
            write!(f, ", {} datasource files", self.datasource_files)?;
        }
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        Ok(())
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Owns every build collaborator; all builds go through `&mut self`.
pub struct BuildOrchestrator {
    config: ConfigHandle,
    options: BuildOptions,
    layout: SiteLayout,
    store: ContentStore,
    composer: TemplateComposer,
    assets: AssetCopier,
    datasource: DatasourceBuilder,
}

impl BuildOrchestrator {
    pub fn new(config: ConfigHandle, options: BuildOptions) -> Self {
        let current = config.load();
        let layout = current.layout();
        Self {
            store: ContentStore::new(layout.clone()),
            composer: composer_for(&layout, &current, options),
            assets: AssetCopier::new(&layout, &current.theme.flatten),
            datasource: DatasourceBuilder::new(&layout.root, &layout.output, &current.datasource),
            layout,
            config,
            options,
        }
    }

    pub fn layout(&self) -> &SiteLayout {
        &self.layout
    }

    /// Render and write the whole site.
    pub fn build_full(&mut self) -> Result<BuildReport> {
        let started = Instant::now();
        let config = self.config.load();
        fs::create_dir_all(&self.layout.output)
            .with_context(|| format!("failed to create output directory {}", self.layout.output.display()))?;

        // Template edits must be visible to every page of this build.
        self.composer.reload();

        let posts = self.store.load_all(ContentKind::Post, true);
        let pages = self.store.load_all(ContentKind::Page, true);
        let bundle = self.datasource.build_bundle(&posts, &pages);
        let site = SiteData::new(&config, &posts, &pages, bundle.to_value());

        let mut report = BuildReport {
            full: true,
            ..BuildReport::default()
        };

        for (name, data, rel) in [
            ("home", site.home(), ""),
            (POSTS_LISTING, site.posts_listing(), POSTS_LISTING),
        ] {
            match self.write_named(name, data, rel) {
                Ok(()) => report.listings += 1,
                Err(err) => {
                    log!("error"; "{err:#}");
                    report.failed += 1;
                }
            }
        }

        let documents: Vec<&ContentDocument> = posts.iter().chain(pages.iter()).collect();
        let results: Vec<(ContentKind, bool)> = documents
            .par_iter()
            .map(|doc| match self.write_document(&config, &site, doc) {
                Ok(()) => (doc.kind, true),
                Err(err) => {
                    log!("error"; "{err:#}");
                    (doc.kind, false)
                }
            })
            .collect();
        for (kind, ok) in results {
            if ok {
                report.count(kind);
            } else {
                report.failed += 1;
            }
        }

        report.feed = self.write_feed(&config, &posts, &mut report);
        report.assets = self.assets.copy_all();
        report.datasource_files = self.write_datasource(&bundle, &mut report);

        log!("build"; "{report} in {:.2?}", started.elapsed());
        Ok(report)
    }

    /// Rebuild only what `paths` affect.
    pub fn build_incremental(&mut self, paths: &[PathBuf]) -> Result<BuildReport> {
        let batch = ChangeBatch::classify(paths, &self.layout);
        if batch.is_empty() {
            debug!("build"; "no relevant changes");
            return Ok(BuildReport::default());
        }

        if batch.config_changed {
            log!("build"; "config changed, rebuilding site");
            self.reload_config();
            self.store.clear_cache();
            return self.build_full();
        }
        if let Some(first) = batch.template_files.first() {
            log!("build"; "{} changed, rebuilding site", self.rel(first));
            return self.build_full();
        }

        let started = Instant::now();
        let config = self.config.load();
        let mut report = BuildReport::default();

        for path in &batch.post_files {
            let id = document_id(&self.layout.posts, path);
            self.rebuild_document(&config, ContentKind::Post, &id, &mut report);
        }

        for path in &batch.page_files {
            let Some(root) = self.layout.pages.iter().find(|dir| path.starts_with(dir)) else {
                continue;
            };
            let id = document_id(root, path);
            self.rebuild_document(&config, ContentKind::Page, &id, &mut report);
        }

        for path in &batch.asset_files {
            match self.assets.copy_one(path) {
                Ok(true) => {
                    log!("assets"; "{}", self.rel(path));
                    report.assets += 1;
                }
                Ok(false) => {}
                Err(err) => {
                    log!("error"; "{err:#}");
                    report.failed += 1;
                }
            }
        }

        debug!("build"; "incremental: {report} in {:.2?}", started.elapsed());
        Ok(report)
    }

    /// Re-render one post or page plus what depends on it.
    ///
    /// Posts also refresh the home page and feed; both kinds rewrite the
    /// datasource bundle.
    fn rebuild_document(&mut self, config: &SiteConfig, kind: ContentKind, id: &str, report: &mut BuildReport) {
        let changed = self.store.invalidate(kind, id);
        let posts = self.store.load_all(ContentKind::Post, true);
        let pages = self.store.load_all(ContentKind::Page, true);
        let bundle = self.datasource.build_bundle(&posts, &pages);
        let site = SiteData::new(config, &posts, &pages, bundle.to_value());

        match changed {
            Some(doc) => match self.write_document(config, &site, &doc) {
                Ok(()) => {
                    log!(kind.data_key(); "{id}");
                    report.count(kind);
                }
                Err(err) => {
                    log!("error"; "{err:#}");
                    report.failed += 1;
                }
            },
            None => {
                log!("warn"; "{} `{id}` not found, skipping", kind.data_key());
                report.skipped += 1;
            }
        }

        if kind == ContentKind::Post {
            match self.write_named("home", site.home(), "") {
                Ok(()) => report.listings += 1,
                Err(err) => {
                    log!("error"; "{err:#}");
                    report.failed += 1;
                }
            }
            report.feed = self.write_feed(config, &posts, report);
        }

        let written = self.write_datasource(&bundle, report);
        report.datasource_files += written;
    }

    /// Swap in a freshly loaded config; on failure keep the current one.
    fn reload_config(&mut self) {
        let dev_server = self.options.dev_server;
        // The server is already bound; keep its address.
        let bound = self.config.load().serve.clone();
        let fresh = self.config.reload(|config| {
            if dev_server {
                config.serve.interface = bound.interface;
                config.serve.port = bound.port;
                config.use_dev_server_url();
            }
        });

        match fresh {
            Ok(config) => self.apply_config(&config),
            Err(err) => log!("warn"; "keeping previous config: {err:#}"),
        }
    }

    fn apply_config(&mut self, config: &Arc<SiteConfig>) {
        let layout = config.layout();
        self.store.set_layout(layout.clone());
        self.composer = composer_for(&layout, config, self.options);
        self.assets = AssetCopier::new(&layout, &config.theme.flatten);
        self.datasource = DatasourceBuilder::new(&layout.root, &layout.output, &config.datasource);
        self.layout = layout;
    }

    // ========================================================================
    // Output
    // ========================================================================

    fn write_document(&self, config: &SiteConfig, site: &SiteData, doc: &ContentDocument) -> Result<()> {
        let html = self.composer.render_document(doc, site.document(config, doc))?;
        write_output(&page_path(&self.layout.output, &doc.output_path), self.finish(html))?;
        debug!("build"; "{} -> {}", doc.id, doc.url());
        Ok(())
    }

    fn write_named(&self, name: &str, data: serde_json::Value, rel: &str) -> Result<()> {
        let html = self
            .composer
            .render_named(name, data)
            .with_context(|| format!("failed to render {name} page"))?;
        write_output(&page_path(&self.layout.output, rel), self.finish(html))
    }

    fn write_feed(&self, config: &SiteConfig, posts: &[ContentDocument], report: &mut BuildReport) -> bool {
        match feed::generate_feed(config, &self.layout.output, posts) {
            Ok(written) => written,
            Err(err) => {
                log!("error"; "feed: {err:#}");
                report.failed += 1;
                false
            }
        }
    }

    fn write_datasource(&self, bundle: &DatasourceBundle, report: &mut BuildReport) -> usize {
        match self.datasource.write_bundle(bundle) {
            Ok(written) => written,
            Err(err) => {
                log!("error"; "datasource: {err:#}");
                report.failed += 1;
                0
            }
        }
    }

    fn finish(&self, html: String) -> String {
        if self.options.live_reload {
            inject_before_body_end(&html, LIVE_RELOAD_SCRIPT)
        } else {
            html
        }
    }

    fn rel(&self, path: &Path) -> String {
        path.strip_prefix(&self.layout.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

fn composer_for(layout: &SiteLayout, config: &SiteConfig, options: BuildOptions) -> TemplateComposer {
    TemplateComposer::new(layout, config, options.dev_server && config.debug.enabled)
}

// ============================================================================
// Tests
// ============================================================================
