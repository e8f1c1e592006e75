//! Change classification for incremental builds.
//!
//! | Priority | Match                          | Bucket            |
//! |----------|--------------------------------|-------------------|
//! | 1        | file name == config file name  | `config_changed`  |
//! | 2        | under templates                | `template_files`  |
//! | 3        | under posts + content ext      | `post_files`      |
//! | 4        | under any pages + content ext  | `page_files`      |
//! | 5        | under any asset root           | `asset_files`     |
//! | 6        | anything else                  | dropped           |

use crate::{config::SiteLayout, content::is_content_file, debug};
use std::path::{Path, PathBuf};

/// Changed paths sorted by the rebuild they require.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    pub config_changed: bool,
    pub template_files: Vec<PathBuf>,
    pub post_files: Vec<PathBuf>,
    pub page_files: Vec<PathBuf>,
    pub asset_files: Vec<PathBuf>,
}

impl ChangeBatch {
    /// Classify each path by the first rule it matches.
    pub fn classify<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>, layout: &SiteLayout) -> Self {
        let mut batch = Self::default();
        for path in paths {
            let path = path.as_ref();
            match Category::of(path, layout) {
                Category::Config => batch.config_changed = true,
                Category::Template => batch.template_files.push(path.to_path_buf()),
                Category::Post => batch.post_files.push(path.to_path_buf()),
                Category::Page => batch.page_files.push(path.to_path_buf()),
                Category::Asset => batch.asset_files.push(path.to_path_buf()),
                Category::Unknown => debug!("watch"; "ignoring {}", path.display()),
            }
        }
        batch
    }

    pub fn is_empty(&self) -> bool {
        !self.config_changed && self.len() == 0
    }

    /// Number of classified files (the config flag not counted).
    pub fn len(&self) -> usize {
        self.template_files.len() + self.post_files.len() + self.page_files.len() + self.asset_files.len()
    }

    /// Whether this batch needs a full rebuild.
    pub fn needs_full_build(&self) -> bool {
        self.config_changed || !self.template_files.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Config,
    Template,
    Post,
    Page,
    Asset,
    Unknown,
}

impl Category {
    fn of(path: &Path, layout: &SiteLayout) -> Self {
        if layout.is_output(path) {
            Self::Unknown
        } else if path.file_name().is_some_and(|name| *name == *layout.config_file) {
            Self::Config
        } else if path.starts_with(&layout.templates) {
            Self::Template
        } else if path.starts_with(&layout.posts) && is_content_file(path) {
            Self::Post
        } else if layout.pages.iter().any(|dir| path.starts_with(dir)) && is_content_file(path) {
            Self::Page
        } else if layout.assets.iter().any(|dir| path.starts_with(dir)) {
            Self::Asset
        } else {
            Self::Unknown
        }
    }
}
