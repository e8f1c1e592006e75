//! Resolved absolute directory layout of a site.
//!
//! ```text
//! SiteConfig
//!     │
//!     └── layout() → SiteLayout
//!                       ├── posts        → /abs/site/posts
//!                       ├── pages[..]    → /abs/site/pages, /abs/site/docs
//!                       ├── templates    → /abs/site/templates
//!                       ├── assets[..]   → /abs/site/static
//!                       └── output       → /abs/site/build
//! ```

use super::SiteConfig;
use std::path::{Path, PathBuf};

/// Absolute paths for every configured directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteLayout {
    pub root: PathBuf,
    /// Config file name (not a path).
    pub config_file: String,
    pub posts: PathBuf,
    pub pages: Vec<PathBuf>,
    pub templates: PathBuf,
    pub assets: Vec<PathBuf>,
    pub output: PathBuf,
}

impl SiteLayout {
    pub fn from_config(config: &SiteConfig) -> Self {
        let root = config.root.clone();
        let join = |rel: &str| root.join(rel);

        Self {
            config_file: config.config_file.clone(),
            posts: join(&config.paths.posts),
            pages: config.paths.pages.iter().map(|p| join(p)).collect(),
            templates: join(&config.theme.templates),
            assets: config.theme.assets.iter().map(|a| join(a)).collect(),
            output: join(&config.theme.output),
            root,
        }
    }

    /// `templates/layouts`
    pub fn layouts_dir(&self) -> PathBuf {
        self.templates.join("layouts")
    }

    /// `templates/partials`
    pub fn partials_dir(&self) -> PathBuf {
        self.templates.join("partials")
    }

    /// The site root's config file.
    pub fn config_path(&self) -> PathBuf {
        self.root.join(&self.config_file)
    }

    #[inline]
    pub fn is_output(&self, path: &Path) -> bool {
        path.starts_with(&self.output)
    }

    /// Every directory whose subtree is a build input.
    pub fn source_dirs(&self) -> Vec<&Path> {
        let mut dirs = vec![self.posts.as_path(), self.templates.as_path()];
        dirs.extend(self.pages.iter().map(PathBuf::as_path));
        dirs.extend(self.assets.iter().map(PathBuf::as_path));
        dirs
    }
}
