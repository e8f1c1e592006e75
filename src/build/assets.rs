//! Static asset copying.
//!
//! ```text
//! flatten = ["static"]
//!   static/css/site.css  → build/css/site.css
//!   images/logo.png      → build/images/logo.png
//! ```

use super::output::write_parent_dirs;
use crate::{config::SiteLayout, debug, log};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Copies files from the asset roots into the output tree.
#[derive(Debug, Clone)]
pub struct AssetCopier {
    roots: Vec<PathBuf>,
    output: PathBuf,
    flatten: Vec<String>,
}

impl AssetCopier {
    pub fn new(layout: &SiteLayout, flatten: &[String]) -> Self {
        Self {
            roots: layout.assets.clone(),
            output: layout.output.clone(),
            flatten: flatten.to_vec(),
        }
    }

    /// Output location of `path`, or `None` when it is not under an asset root.
    pub fn destination(&self, path: &Path) -> Option<PathBuf> {
        let root = self.roots.iter().find(|root| path.starts_with(root))?;
        let rel = path.strip_prefix(root).ok()?;

        let flattened = root
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.flatten.iter().any(|f| f == name));

        Some(match (flattened, root.file_name()) {
            (false, Some(name)) => self.output.join(name).join(rel),
            _ => self.output.join(rel),
        })
    }

    /// Copy every file of every asset root. Returns the number copied.
    pub fn copy_all(&self) -> usize {
        let files: Vec<PathBuf> = self
            .roots
            .iter()
            .filter(|root| root.is_dir())
            .flat_map(|root| {
                WalkDir::new(root)
                    .into_iter()
                    .filter_map(Result::ok)
                    .filter(|entry| entry.file_type().is_file())
                    .map(walkdir::DirEntry::into_path)
            })
            .collect();

        files
            .par_iter()
            .filter(|path| match self.copy_one(path) {
                Ok(copied) => copied,
                Err(err) => {
                    log!("error"; "{err:#}");
                    false
                }
            })
            .count()
    }

    /// Copy one file to its mirrored location.
    ///
    /// Returns `false` for files that vanished or sit outside every asset root.
    pub fn copy_one(&self, path: &Path) -> Result<bool> {
        if !path.is_file() {
            debug!("assets"; "skipping {}, no longer exists", path.display());
            return Ok(false);
        }
        let Some(dest) = self.destination(path) else {
            debug!("assets"; "skipping {}, not under an asset root", path.display());
            return Ok(false);
        };

        write_parent_dirs(&dest)?;
        fs::copy(path, &dest)
            .with_context(|| format!("failed to copy {} to {}", path.display(), dest.display()))?;
        debug!("assets"; "{}", dest.strip_prefix(&self.output).unwrap_or(&dest).display());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{thread, time::Duration};
    use tempfile::TempDir;

    fn setup() -> (TempDir, AssetCopier) {
        let dir = TempDir::new().unwrap();
        let layout = SiteLayout {
            root: dir.path().to_path_buf(),
            assets: vec![dir.path().join("static"), dir.path().join("images")],
            output: dir.path().join("build"),
            ..SiteLayout::default()
        };
        let copier = AssetCopier::new(&layout, &["static".to_owned(), "public".to_owned()]);
        (dir, copier)
    }

    fn write(dir: &TempDir, rel: &str, content: &str) -> PathBuf {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_destination_flatten_rule() {
        let (dir, copier) = setup();
        let out = dir.path().join("build");

        assert_eq!(
            copier.destination(&dir.path().join("static/css/site.css")),
            Some(out.join("css/site.css"))
        );
        assert_eq!(
            copier.destination(&dir.path().join("images/logo.png")),
            Some(out.join("images/logo.png"))
        );
        assert_eq!(copier.destination(&dir.path().join("posts/a.md")), None);
    }

    #[test]
    fn test_copy_all() {
        let (dir, copier) = setup();
        write(&dir, "static/robots.txt", "r");
        write(&dir, "images/a/b.png", "b");

        assert_eq!(copier.copy_all(), 2);
        assert_eq!(fs::read_to_string(dir.path().join("build/robots.txt")).unwrap(), "r");
        assert_eq!(fs::read_to_string(dir.path().join("build/images/a/b.png")).unwrap(), "b");
    }

    #[test]
    fn test_copy_one_leaves_siblings_untouched() {
        let (dir, copier) = setup();
        let changed = write(&dir, "static/a.css", "a1");
        write(&dir, "static/b.css", "b1");
        copier.copy_all();

        let sibling = dir.path().join("build/b.css");
        let sibling_mtime = fs::metadata(&sibling).unwrap().modified().unwrap();

        thread::sleep(Duration::from_millis(20));
        fs::write(&changed, "a2").unwrap();
        fs::write(dir.path().join("static/b.css"), "b2").unwrap();
        assert!(copier.copy_one(&changed).unwrap());

        assert_eq!(fs::read_to_string(dir.path().join("build/a.css")).unwrap(), "a2");
        assert_eq!(fs::read_to_string(&sibling).unwrap(), "b1");
        assert_eq!(fs::metadata(&sibling).unwrap().modified().unwrap(), sibling_mtime);
    }

    #[test]
    fn test_copy_one_missing_file() {
        let (dir, copier) = setup();
        assert!(!copier.copy_one(&dir.path().join("static/gone.css")).unwrap());
    }
}
