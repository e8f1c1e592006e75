//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

/// Default config file name, looked up at the site root.
pub const CONFIG_FILE: &str = "config.json";

// ============================================================================
// "theme" Section Defaults
// ============================================================================

pub mod theme {
    pub fn templates() -> String {
        "templates".into()
    }

    pub fn assets() -> Vec<String> {
        vec!["static".into()]
    }

    pub fn output() -> String {
        "build".into()
    }

    pub fn flatten() -> Vec<String> {
        vec!["static".into(), "public".into()]
    }
}

// ============================================================================
// "paths" Section Defaults
// ============================================================================

pub mod paths {
    pub fn posts() -> String {
        "posts".into()
    }

    pub fn pages() -> Vec<String> {
        vec!["pages".into()]
    }
}

// ============================================================================
// "html" Section Defaults
// ============================================================================

pub mod html {
    pub fn indent_size() -> usize {
        2
    }
}

// ============================================================================
// "rss" Section Defaults
// ============================================================================

pub mod rss {
    pub fn file_name() -> String {
        "feed.xml".into()
    }

    pub fn language() -> String {
        "en-us".into()
    }

    pub fn max_items() -> usize {
        20
    }
}

// ============================================================================
// "datasource" Section Defaults
// ============================================================================

pub mod datasource {
    pub fn output_dir() -> String {
        "datasource".into()
    }

    pub fn images_file_name() -> String {
        "images.json".into()
    }

    pub fn collect_attribute() -> String {
        "data-datasource".into()
    }
}

// ============================================================================
// "devServer" Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        8080
    }
}
