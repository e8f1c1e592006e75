//! Built-in templates used when a site does not provide its own.

pub const HOME: &str = include_str!("../embed/templates/home.hbs");
pub const POSTS: &str = include_str!("../embed/templates/posts.hbs");
pub const POST: &str = include_str!("../embed/templates/post.hbs");
pub const PAGE: &str = include_str!("../embed/templates/page.hbs");
pub const DEFAULT_LAYOUT: &str = include_str!("../embed/templates/layouts/default.hbs");

/// Fallback for a conventional template name; unknown names get the page template.
pub fn template(name: &str) -> &'static str {
    match name {
        "home" => HOME,
        "posts" => POSTS,
        "post" => POST,
        _ => PAGE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallbacks_embedded() {
        assert!(template("post").contains("post.title"));
        assert!(template("page").contains("page.title"));
        assert!(template("unknown").contains("page.content"));
        assert!(DEFAULT_LAYOUT.contains("{{{content}}}"));
        assert!(DEFAULT_LAYOUT.contains(r#"{{#block "head"}}"#));
    }
}
