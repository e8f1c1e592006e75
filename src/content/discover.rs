//! Content file discovery.

use super::ContentKind;
use crate::config::SiteLayout;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions the parser understands.
pub(super) const CONTENT_EXTENSIONS: &[&str] = &["md", "html", "hbs"];

/// File stems skipped when discovering posts.
const POST_EXCLUDED_STEMS: &[&str] = &["index"];

/// A content source and where it renders to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    /// Directory the file was found under.
    pub root: PathBuf,
    /// URL-relative output path; "" is the site root.
    pub output_path: String,
}

/// Extension ∈ {md, html, hbs}.
pub fn is_content_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| CONTENT_EXTENSIONS.contains(&ext))
}

/// Relative path without extension, `/`-separated.
///
/// `posts/2024/hello.md` under `posts/` → `2024/hello`
pub fn document_id(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path).with_extension("");
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Every eligible file of `kind`, sorted by path.
pub fn discover(kind: ContentKind, layout: &SiteLayout) -> Vec<DiscoveredFile> {
    let roots: Vec<&Path> = match kind {
        ContentKind::Post => vec![layout.posts.as_path()],
        ContentKind::Page => layout.pages.iter().map(PathBuf::as_path).collect(),
    };

    roots
        .into_iter()
        .filter(|root| root.is_dir())
        .flat_map(|root| walk_root(kind, root))
        .collect()
}

fn walk_root(kind: ContentKind, root: &Path) -> Vec<DiscoveredFile> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| is_content_file(path))
        .filter(|path| kind != ContentKind::Post || !is_excluded_post(path))
        .map(|path| {
            let id = document_id(root, &path);
            let output_path = match kind {
                ContentKind::Post => id,
                ContentKind::Page => strip_index(&id).to_owned(),
            };
            DiscoveredFile {
                path,
                root: root.to_path_buf(),
                output_path,
            }
        })
        .collect()
}

fn is_excluded_post(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|stem| POST_EXCLUDED_STEMS.contains(&stem))
}

/// `index` → "", `docs/index` → `docs`
fn strip_index(id: &str) -> &str {
    if id == "index" {
        ""
    } else {
        id.strip_suffix("/index").unwrap_or(id)
    }
}
