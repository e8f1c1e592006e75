//! Two-tier content cache.
//!
//! Each tier (posts, pages) is either absent or a complete, sorted list.
//! Invalidating one id drops the whole tier: a reload has to rescan the
//! directory anyway to keep the sort order, so per-entry patching is left
//! for later.

use super::{ContentDocument, ContentKind, DiscoveredFile, discover, meta, parse};
use crate::{config::SiteLayout, debug, log};
use chrono::{DateTime, Local, NaiveDateTime};
use rayon::prelude::*;
use std::{cmp::Ordering, fs, path::Path, sync::Arc};

/// Shared, immutable snapshot of one tier.
pub type Documents = Arc<Vec<ContentDocument>>;

/// Cached posts and pages of a site.
#[derive(Debug, Default)]
pub struct ContentStore {
    layout: SiteLayout,
    posts: Option<Documents>,
    pages: Option<Documents>,
}

impl ContentStore {
    pub fn new(layout: SiteLayout) -> Self {
        Self {
            layout,
            posts: None,
            pages: None,
        }
    }

    /// Swap directory layout (config reload); drops both tiers.
    pub fn set_layout(&mut self, layout: SiteLayout) {
        self.layout = layout;
        self.clear_cache();
    }

    /// Whole tier, from cache when allowed and populated.
    pub fn load_all(&mut self, kind: ContentKind, use_cache: bool) -> Documents {
        if use_cache && let Some(cached) = self.tier(kind) {
            return Arc::clone(cached);
        }

        debug!("content"; "loading all {kind:?} documents");
        let documents = Arc::new(load_tier(kind, &self.layout));
        *self.tier_mut(kind) = Some(Arc::clone(&documents));
        documents
    }

    /// Lookup by id; a miss forces a full reload of the tier.
    pub fn load_by_id(&mut self, kind: ContentKind, id: &str, use_cache: bool) -> Option<ContentDocument> {
        if use_cache
            && let Some(doc) = self.tier(kind).and_then(|docs| docs.iter().find(|d| d.id == id))
        {
            return Some(doc.clone());
        }

        self.load_all(kind, false).iter().find(|d| d.id == id).cloned()
    }

    /// Drop the tier holding `id`, then reload it from disk.
    pub fn invalidate(&mut self, kind: ContentKind, id: &str) -> Option<ContentDocument> {
        debug!("content"; "invalidating {kind:?} tier for `{id}`");
        *self.tier_mut(kind) = None;
        self.load_by_id(kind, id, false)
    }

    /// Drop both tiers.
    pub fn clear_cache(&mut self) {
        self.posts = None;
        self.pages = None;
    }

    pub fn is_cached(&self, kind: ContentKind) -> bool {
        self.tier(kind).is_some()
    }

    fn tier(&self, kind: ContentKind) -> Option<&Documents> {
        match kind {
            ContentKind::Post => self.posts.as_ref(),
            ContentKind::Page => self.pages.as_ref(),
        }
    }

    fn tier_mut(&mut self, kind: ContentKind) -> &mut Option<Documents> {
        match kind {
            ContentKind::Post => &mut self.posts,
            ContentKind::Page => &mut self.pages,
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

fn load_tier(kind: ContentKind, layout: &SiteLayout) -> Vec<ContentDocument> {
    let files = discover(kind, layout);

    let mut documents: Vec<_> = files
        .par_iter()
        .filter_map(|file| match load_document(kind, file) {
            Ok(doc) => Some(doc),
            Err(err) => {
                log!("warn"; "skipping {}: {err}", file.path.display());
                None
            }
        })
        .collect();

    match kind {
        ContentKind::Post => documents.sort_by(compare_posts),
        ContentKind::Page => documents.sort_by(compare_pages),
    }
    documents
}

fn load_document(kind: ContentKind, file: &DiscoveredFile) -> Result<ContentDocument, super::ContentError> {
    let parsed = parse(&file.path)?;

    let stem = file
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let title = parsed
        .metadata
        .get("title")
        .and_then(meta::value_as_string)
        .filter(|t| !t.is_empty())
        .unwrap_or(stem);

    let (date, nav_order) = match kind {
        ContentKind::Post => (Some(post_date(&parsed.metadata, &file.path)), None),
        ContentKind::Page => {
            let order = ["nav_order", "navOrder"]
                .iter()
                .find_map(|key| parsed.metadata.get(*key).and_then(meta::as_i64));
            (None, order)
        }
    };

    Ok(ContentDocument {
        kind,
        id: super::document_id(&file.root, &file.path),
        title,
        body: parsed.body,
        metadata: parsed.metadata,
        output_path: file.output_path.clone(),
        is_template_source: parsed.is_template_source,
        source: file.path.clone(),
        date,
        nav_order,
    })
}

/// `published`, then `date`, then file mtime.
fn post_date(metadata: &serde_json::Map<String, serde_json::Value>, path: &Path) -> NaiveDateTime {
    ["published", "date"]
        .iter()
        .filter_map(|key| metadata.get(*key).and_then(meta::value_as_string))
        .find_map(|raw| meta::parse_date(&raw))
        .unwrap_or_else(|| modified_time(path))
}

fn modified_time(path: &Path) -> NaiveDateTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|t| DateTime::<Local>::from(t).naive_local())
        .unwrap_or_default()
}

/// Newest first.
fn compare_posts(a: &ContentDocument, b: &ContentDocument) -> Ordering {
    b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id))
}

/// `nav_order` ascending with unordered pages last, then title.
fn compare_pages(a: &ContentDocument, b: &ContentDocument) -> Ordering {
    let order = |d: &ContentDocument| d.nav_order.unwrap_or(i64::MAX);
    order(a)
        .cmp(&order(b))
        .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
}

// ============================================================================
// Tests
// ============================================================================
