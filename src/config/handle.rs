//! Shared config with atomic reload support.
//!
//! Uses `arc-swap` for lock-free reads and atomic config replacement.
//! This enables hot-reloading of `config.json` during watch mode.
//!
//! ```text
//!   dev server requests ──► handle.load()   (lock-free)
//!   rayon renders ────────► handle.load()   (lock-free)
//!   rebuild worker ───────► handle.reload() (atomic replace)
//! ```

use super::SiteConfig;
use anyhow::Result;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// Cloneable handle to the active site config.
///
/// Every clone observes the same config; a reload is visible to all of them.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    inner: Arc<ArcSwap<SiteConfig>>,
}

impl ConfigHandle {
    pub fn new(config: SiteConfig) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Current config as `Arc<SiteConfig>`.
    ///
    /// Wait-free; the old config stays alive for readers that loaded it before a reload.
    #[inline]
    pub fn load(&self) -> Arc<SiteConfig> {
        self.inner.load_full()
    }

    /// Replace the active config.
    pub fn store(&self, config: SiteConfig) {
        self.inner.store(Arc::new(config));
    }

    /// Re-read the config file from the current root.
    ///
    /// `adjust` re-applies startup overrides (dev server URL) to the fresh config.
    /// On failure the active config is left untouched and the error returned.
    pub fn reload(&self, adjust: impl FnOnce(&mut SiteConfig)) -> Result<Arc<SiteConfig>> {
        let current = self.load();
        let mut fresh = SiteConfig::load(&current.root, &current.config_file)?;
        adjust(&mut fresh);
        let fresh = Arc::new(fresh);
        self.inner.store(Arc::clone(&fresh));
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, name: &str) {
        let json = format!(
            r#"{{"siteName": "{name}", "baseUrl": "https://example.com", "description": "d", "author": "a"}}"#
        );
        fs::write(dir.path().join("config.json"), json).unwrap();
    }

    #[test]
    fn test_reload_visible_to_clones() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "Before");
        let handle = ConfigHandle::new(SiteConfig::load(dir.path(), "config.json").unwrap());
        let reader = handle.clone();

        write_config(&dir, "After");
        handle.reload(|_| {}).unwrap();

        assert_eq!(reader.load().site_name, "After");
    }

    #[test]
    fn test_reload_applies_adjustment() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "Site");
        let handle = ConfigHandle::new(SiteConfig::load(dir.path(), "config.json").unwrap());

        let fresh = handle.reload(|c| c.use_dev_server_url()).unwrap();
        assert_eq!(fresh.base_url, "http://127.0.0.1:8080");
    }

    #[test]
    fn test_failed_reload_keeps_previous() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "Good");
        let handle = ConfigHandle::new(SiteConfig::load(dir.path(), "config.json").unwrap());

        fs::write(dir.path().join("config.json"), "{ broken").unwrap();
        assert!(handle.reload(|_| {}).is_err());
        assert_eq!(handle.load().site_name, "Good");
    }
}
