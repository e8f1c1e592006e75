//! HTML post-processing of composed pages.

use crate::config::{HtmlConfig, HtmlFormat};
use regex::Regex;
use std::sync::LazyLock;

static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Elements whose contents are copied verbatim by `beautify`.
const RAW_TEXT_TAGS: &[&str] = &["pre", "script", "style", "textarea"];

/// Elements that start their own line when beautified.
const BLOCK_TAGS: &[&str] = &[
    "html", "head", "body", "title", "meta", "link", "base", "header", "footer", "main", "nav",
    "section", "article", "aside", "div", "p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol",
    "li", "dl", "dt", "dd", "table", "thead", "tbody", "tfoot", "tr", "td", "th", "form",
    "fieldset", "figure", "figcaption", "blockquote", "hr", "details", "summary", "noscript",
];

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Apply the configured post-processing mode.
pub fn process(html: &str, config: &HtmlConfig) -> String {
    match config.format {
        HtmlFormat::Default => html.to_owned(),
        HtmlFormat::Minify => minify(html),
        HtmlFormat::Beautify => beautify(html, config.indent_size),
    }
}

/// Insert `snippet` before the last `</body>`, or append it.
pub fn inject_before_body_end(html: &str, snippet: &str) -> String {
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(idx) => {
            let mut out = String::with_capacity(html.len() + snippet.len() + 1);
            out.push_str(&html[..idx]);
            out.push_str(snippet);
            out.push('\n');
            out.push_str(&html[idx..]);
            out
        }
        None => format!("{html}{snippet}"),
    }
}

// ============================================================================
// Minify
// ============================================================================

fn minify(html: &str) -> String {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    cfg.remove_bangs = true;
    cfg.remove_processing_instructions = true;
    let bytes = minify_html::minify(html.as_bytes(), &cfg);
    String::from_utf8_lossy(&bytes).into_owned()
}

// ============================================================================
// Beautify
// ============================================================================

/// Re-indent block elements; inline markup and text stay on their line.
fn beautify(html: &str, indent_size: usize) -> String {
    let mut out = Beautifier {
        out: String::with_capacity(html.len() + html.len() / 4),
        line: String::new(),
        depth: 0,
        indent: indent_size,
    };

    let mut rest = html;
    while let Some(start) = rest.find('<') {
        out.text(&rest[..start]);
        rest = &rest[start..];

        if rest.starts_with("<!--") {
            let end = rest.find("-->").map_or(rest.len(), |i| i + 3);
            out.standalone(&rest[..end]);
            rest = &rest[end..];
            continue;
        }

        let Some(close) = rest.find('>') else {
            break;
        };
        let tag = &rest[..=close];
        let name = tag_name(tag);
        let is_closing = tag.starts_with("</");

        if !is_closing && RAW_TEXT_TAGS.contains(&name.as_str()) {
            let end = raw_element_end(rest, &name);
            out.standalone(&rest[..end]);
            rest = &rest[end..];
            continue;
        }

        rest = &rest[close + 1..];

        if tag.starts_with("<!") {
            out.standalone(tag);
        } else if BLOCK_TAGS.contains(&name.as_str()) {
            if is_closing {
                out.close(tag);
            } else if VOID_TAGS.contains(&name.as_str()) || tag.ends_with("/>") {
                out.standalone(tag);
            } else {
                out.open(tag);
            }
        } else {
            out.line.push_str(tag);
        }
    }
    out.text(rest);
    out.flush();
    out.out
}

struct Beautifier {
    out: String,
    line: String,
    depth: usize,
    indent: usize,
}

impl Beautifier {
    fn text(&mut self, text: &str) {
        self.line.push_str(&SPACE_RE.replace_all(text, " "));
    }

    fn emit(&mut self, content: &str) {
        self.out.push_str(&" ".repeat(self.depth * self.indent));
        self.out.push_str(content);
        self.out.push('\n');
    }

    fn flush(&mut self) {
        let line = std::mem::take(&mut self.line);
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            self.emit(trimmed);
        }
    }

    fn standalone(&mut self, content: &str) {
        self.flush();
        self.emit(content);
    }

    fn open(&mut self, tag: &str) {
        self.standalone(tag);
        self.depth += 1;
    }

    fn close(&mut self, tag: &str) {
        self.flush();
        self.depth = self.depth.saturating_sub(1);
        self.emit(tag);
    }
}

/// Lowercased element name of `<name ...>` or `</name>`.
fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('<')
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Byte offset just past `</name>` (or the end of input).
fn raw_element_end(html: &str, name: &str) -> usize {
    let lower = html.to_ascii_lowercase();
    let closing = format!("</{name}");
    lower
        .find(&closing)
        .and_then(|start| lower[start..].find('>').map(|end| start + end + 1))
        .unwrap_or(html.len())
}
