//! Front matter and body parsing.
//!
//! | Extension | Body                          |
//! |-----------|-------------------------------|
//! | `.md`     | markdown rendered to HTML     |
//! | `.html`   | kept as is                    |
//! | `.hbs`    | raw template source           |

use super::{ContentError, discover::CONTENT_EXTENSIONS, meta};
use pulldown_cmark::{Options, Parser, html};
use regex::Regex;
use serde_json::{Map, Value};
use std::{fs, path::Path, sync::LazyLock};

static FRONT_MATTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^---[ \t]*\r?\n(?:(.*?)\r?\n)?---[ \t]*(?:\r?\n|$)(.*)$").unwrap()
});

/// Body plus front matter of one source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedContent {
    pub body: String,
    pub metadata: Map<String, Value>,
    pub is_template_source: bool,
}

/// Read and parse a content file.
pub fn parse(path: &Path) -> Result<ParsedContent, ContentError> {
    let ext = extension(path)?;
    let source = fs::read_to_string(path).map_err(|err| ContentError::Io(path.to_path_buf(), err))?;
    parse_source(&source, ext).ok_or_else(|| ContentError::UnsupportedExtension(path.to_path_buf()))
}

/// Parse already-loaded source; `None` for an unknown extension.
pub fn parse_source(source: &str, ext: &str) -> Option<ParsedContent> {
    let (metadata, body) = split_front_matter(source);
    let (body, is_template_source) = match ext {
        "md" => (render_markdown(body), false),
        "html" => (body.to_owned(), false),
        "hbs" => (body.to_owned(), true),
        _ => return None,
    };
    Some(ParsedContent {
        body,
        metadata,
        is_template_source,
    })
}

fn extension(path: &Path) -> Result<&str, ContentError> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| CONTENT_EXTENSIONS.contains(ext))
        .ok_or_else(|| ContentError::UnsupportedExtension(path.to_path_buf()))
}

/// Split `---` delimited YAML from the body.
///
/// Malformed YAML yields empty metadata; the body is kept either way.
fn split_front_matter(source: &str) -> (Map<String, Value>, &str) {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let Some(caps) = FRONT_MATTER_RE.captures(source) else {
        return (Map::new(), source);
    };

    let yaml = caps.get(1).map_or("", |m| m.as_str());
    let body = caps.get(2).map_or("", |m| m.as_str());

    let metadata = match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Object(map)) => match meta::normalize(Value::Object(map)) {
            Value::Object(map) => map,
            _ => Map::new(),
        },
        _ => Map::new(),
    };
    (metadata, body)
}

pub fn render_markdown(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(source, options);
    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}
