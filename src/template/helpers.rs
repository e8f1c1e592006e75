//! Extra template helpers.
//!
//! | Helper       | Output                                                   |
//! |--------------|----------------------------------------------------------|
//! | `formatDate` | `{{formatDate date format="%Y"}}`                        |
//! | `limit`      | first N items of a list                                  |
//! | `excerpt`    | first N words of the plain text                          |
//! | `json`       | value serialized as JSON                                 |
//! | `substring`  | `{{substring title 0 10}}`, char based, clamped          |
//! | `sortBy`     | list sorted by a numeric metadata key                    |
//! | `groupBy`    | `[{name, items}]` grouped by a metadata key              |
//! | `include`    | another template from the templates root, unescaped      |
//! | `md`         | inline markdown, unescaped                               |
//! | `safe`       | string written unescaped                                 |
//! | `debug`      | `<pre>` dump of the render data                          |
//!
//! `eq`, `ne`, `and`, `or` and friends are handlebars built-ins.

use super::resolve;
use crate::{
    content::{parse_date, render_markdown, strip_tags, truncate_chars},
    log,
};
use chrono::format::{Item, StrftimeItems};
use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext, handlebars_helper, html_escape,
};
use regex::Regex;
use serde_json::{Map, Value, json};
use std::{
    cell::Cell,
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

const DEFAULT_DATE_FORMAT: &str = "%B %d, %Y";

/// Nesting shown by `debug` before it stops descending.
const DEBUG_MAX_DEPTH: usize = 3;

/// Nested `include`s allowed before giving up on a cycle.
const MAX_INCLUDE_DEPTH: usize = 16;

thread_local! {
    static INCLUDE_DEPTH: Cell<usize> = const { Cell::new(0) };
}

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<h[1-6][^>]*>(.*?)</h[1-6]>").unwrap());

handlebars_helper!(format_date: |value: Json, {format: str = "%B %d, %Y"}| format_date_value(value, format));
handlebars_helper!(limit: |list: Json, count: i64| limit_value(list, count));
handlebars_helper!(excerpt: |value: Json, {words: u64 = 30}| excerpt_text(value, words as usize));
handlebars_helper!(json: |value: Json| serde_json::to_string(value).unwrap_or_default());
handlebars_helper!(substring: |*args| substring_value(&args));
handlebars_helper!(sort_by: |list: Json, key: str| sort_by_value(list, key));
handlebars_helper!(group_by: |list: Json, key: str| group_by_value(list, key));

/// Register every helper; `include` resolves against `templates`.
pub fn register(registry: &mut Handlebars<'static>, templates: &Path) {
    registry.register_helper("formatDate", Box::new(format_date));
    registry.register_helper("limit", Box::new(limit));
    registry.register_helper("excerpt", Box::new(excerpt));
    registry.register_helper("json", Box::new(json));
    registry.register_helper("substring", Box::new(substring));
    registry.register_helper("sortBy", Box::new(sort_by));
    registry.register_helper("groupBy", Box::new(group_by));
    registry.register_helper(
        "include",
        Box::new(IncludeHelper {
            templates: templates.to_path_buf(),
        }),
    );
    registry.register_helper("md", Box::new(MarkdownHelper));
    registry.register_helper("safe", Box::new(SafeHelper));
    registry.register_helper("debug", Box::new(DebugHelper));
}

// ============================================================================
// Value Helpers
// ============================================================================

/// `2024-01-15` → `January 15, 2024`; unparseable input renders as is.
fn format_date_value(value: &Value, format: &str) -> String {
    let Some(raw) = value.as_str() else {
        return String::new();
    };
    let Some(date) = parse_date(raw) else {
        return raw.to_owned();
    };

    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    let items = if items.iter().any(|item| matches!(item, Item::Error)) {
        StrftimeItems::new(DEFAULT_DATE_FORMAT).collect()
    } else {
        items
    };
    date.format_with_items(items.into_iter()).to_string()
}

/// First `count` items of an array (or object values); negative yields none.
fn limit_value(list: &Value, count: i64) -> Value {
    let take = usize::try_from(count).unwrap_or(0);
    match list {
        Value::Array(items) => Value::Array(items.iter().take(take).cloned().collect()),
        Value::Object(map) => Value::Array(map.values().take(take).cloned().collect()),
        other => other.clone(),
    }
}

/// First `words` words of the plain text, with `...` when cut.
fn excerpt_text(value: &Value, words: usize) -> String {
    let Some(html) = value.as_str() else {
        return String::new();
    };
    let text = strip_tags(&HEADING_RE.replace_all(html, "$1 "));
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut out = tokens.iter().take(words).copied().collect::<Vec<_>>().join(" ");
    if tokens.len() > words {
        out.push_str("...");
    }
    out
}

/// `substring value start [end]` over chars; bounds clamp to the string.
fn substring_value(args: &[&Value]) -> String {
    let Some(text) = args.first().and_then(|v| v.as_str()) else {
        return String::new();
    };
    let len = text.chars().count();
    let bound = |idx: usize, default: usize| {
        args.get(idx)
            .and_then(|v| v.as_i64())
            .map_or(default, |n| usize::try_from(n).unwrap_or(0).min(len))
    };

    let (start, end) = (bound(1, 0), bound(2, len));
    if start >= end {
        return String::new();
    }
    text.chars().skip(start).take(end - start).collect()
}

/// `metadata.<key>` of a document view, falling back to a top-level field.
fn field<'a>(item: &'a Value, key: &str) -> Option<&'a Value> {
    item.get("metadata")
        .and_then(|meta| meta.get(key))
        .or_else(|| item.get(key))
}

fn sort_key(item: &Value, key: &str) -> i64 {
    match field(item, key) {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Stable ascending sort by a numeric key; missing or non-numeric keys sort as 0.
fn sort_by_value(list: &Value, key: &str) -> Value {
    let mut items = match list {
        Value::Array(items) => items.clone(),
        Value::Object(map) => map.values().cloned().collect(),
        other => return other.clone(),
    };
    items.sort_by_key(|item| sort_key(item, key));
    Value::Array(items)
}

/// Groups in first-seen order; items without the key land in the `""` group.
fn group_by_value(list: &Value, key: &str) -> Value {
    let Value::Array(items) = list else {
        return Value::Array(Vec::new());
    };

    let mut groups: Vec<(String, Vec<Value>)> = Vec::new();
    for item in items {
        let name = field(item, key).and_then(Value::as_str).unwrap_or_default();
        match groups.iter_mut().find(|(group, _)| group == name) {
            Some((_, members)) => members.push(item.clone()),
            None => groups.push((name.to_owned(), vec![item.clone()])),
        }
    }

    groups
        .into_iter()
        .map(|(name, items)| json!({ "name": name, "items": items }))
        .collect()
}

/// Markdown rendered inline: a lone paragraph loses its `<p>` wrapper.
fn markdown_inline(text: &str) -> String {
    let html = render_markdown(text);
    let trimmed = html.trim();
    match trimmed.strip_prefix("<p>").and_then(|rest| rest.strip_suffix("</p>")) {
        Some(inner) if !inner.contains("<p>") && !inner.contains("</p>") => inner.trim().to_owned(),
        _ => trimmed.to_owned(),
    }
}

/// Text of a helper argument; `null` and missing become empty.
fn param_text(h: &Helper<'_>) -> String {
    match h.param(0).map(|p| p.value()) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

// ============================================================================
// Raw Output Helpers
// ============================================================================

/// `{{include "partials/nav.hbs"}}` renders a file with the current data.
struct IncludeHelper {
    templates: PathBuf,
}

impl IncludeHelper {
    fn include(&self, name: &str, registry: &Handlebars<'_>, ctx: &Context) -> String {
        let Some(path) = resolve::sandboxed(&self.templates, name) else {
            log!("warn"; "include `{name}` is outside the templates directory");
            return format!("<!-- File not found: {} -->", comment_safe(name));
        };
        let Ok(source) = fs::read_to_string(&path) else {
            return format!("<!-- File not found: {} -->", comment_safe(name));
        };

        let depth = INCLUDE_DEPTH.get();
        if depth >= MAX_INCLUDE_DEPTH {
            log!("warn"; "include `{name}` nested more than {MAX_INCLUDE_DEPTH} levels");
            return format!("<!-- Error including file: {} nested too deep -->", comment_safe(name));
        }

        INCLUDE_DEPTH.set(depth + 1);
        let rendered = registry.render_template_with_context(&source, ctx);
        INCLUDE_DEPTH.set(depth);

        rendered.unwrap_or_else(|err| format!("<!-- Error including file: {} -->", comment_safe(&err.to_string())))
    }
}

impl HelperDef for IncludeHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let name = h.param(0).and_then(|p| p.value().as_str()).unwrap_or_default();
        out.write(&self.include(name, r, ctx))?;
        Ok(())
    }
}

/// `{{md summary}}`
struct MarkdownHelper;

impl HelperDef for MarkdownHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let text = param_text(h);
        let text = text.trim();
        if !text.is_empty() {
            out.write(&markdown_inline(text))?;
        }
        Ok(())
    }
}

/// `{{safe html}}` is `{{{html}}}` spelled as a helper.
struct SafeHelper;

impl HelperDef for SafeHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        out.write(&param_text(h))?;
        Ok(())
    }
}

/// `{{debug}}` dumps the render data a few levels deep.
struct DebugHelper;

impl HelperDef for DebugHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        _: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        out.write(&debug_dump(ctx.data()))?;
        Ok(())
    }
}

fn debug_dump(data: &Value) -> String {
    let rule = "═".repeat(60);
    let mut lines = vec![
        r#"<pre style="background: #f4f4f4; padding: 1em; border: 1px solid #ddd; overflow: auto; max-height: 600px;">"#
            .to_owned(),
        "<strong>Debug: Template Variables</strong>".to_owned(),
        rule.clone(),
    ];
    match data {
        Value::Object(map) => dump_map(map, 0, &mut lines),
        _ => lines.push("No context available".to_owned()),
    }
    lines.push(rule);
    lines.push("</pre>".to_owned());
    lines.join("\n")
}

fn dump_map(map: &Map<String, Value>, level: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(level);
    if level > DEBUG_MAX_DEPTH {
        lines.push(format!("{indent}... (max depth reached)"));
        return;
    }

    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    for key in keys {
        let key_html = html_escape(key);
        match &map[key] {
            Value::Array(items) => {
                lines.push(format!("{indent}{key_html}: [{} items]", items.len()));
                if level >= DEBUG_MAX_DEPTH {
                    continue;
                }
                for (idx, item) in items.iter().take(3).enumerate() {
                    match item {
                        Value::Object(inner) => {
                            lines.push(format!("{indent}  [{idx}]:"));
                            dump_map(inner, level + 2, lines);
                        }
                        other => lines.push(format!("{indent}  [{idx}]: {}", summarize(other))),
                    }
                }
                if items.len() > 3 {
                    lines.push(format!("{indent}  ... ({} more items)", items.len() - 3));
                }
            }
            Value::Object(inner) => {
                lines.push(format!("{indent}{key_html}: {{{} properties}}", inner.len()));
                if level < DEBUG_MAX_DEPTH {
                    dump_map(inner, level + 1, lines);
                }
            }
            Value::String(s) if s.chars().count() > 100 => lines.push(format!(
                "{indent}{key_html}: \"{}... ({} chars)\"",
                html_escape(&truncate_chars(s, 100)),
                s.chars().count()
            )),
            Value::String(s) => lines.push(format!("{indent}{key_html}: \"{}\"", html_escape(s))),
            other => lines.push(format!("{indent}{key_html}: {other}")),
        }
    }
}

fn summarize(value: &Value) -> String {
    match value {
        Value::String(s) if s.chars().count() > 50 => format!("\"{}...\"", html_escape(&truncate_chars(s, 50))),
        Value::String(s) => format!("\"{}\"", html_escape(s)),
        Value::Array(items) => format!("[{} items]", items.len()),
        Value::Object(map) => format!("{{{} entries}}", map.len()),
        other => other.to_string(),
    }
}

/// `--` would end the surrounding HTML comment.
pub(super) fn comment_safe(text: &str) -> String {
    let mut out = text.to_owned();
    while out.contains("--") {
        out = out.replace("--", "- -");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        register(&mut hbs, Path::new("/nonexistent/templates"));
        hbs
    }

    #[test]
    fn test_format_date() {
        let hbs = registry();
        let data = json!({"date": "2024-01-05T10:00:00"});
        assert_eq!(hbs.render_template("{{formatDate date}}", &data).unwrap(), "January 05, 2024");
        assert_eq!(
            hbs.render_template(r#"{{formatDate date format="%Y/%m/%d"}}"#, &data).unwrap(),
            "2024/01/05"
        );
    }

    #[test]
    fn test_format_date_invalid_inputs() {
        assert_eq!(format_date_value(&json!("soon"), DEFAULT_DATE_FORMAT), "soon");
        assert_eq!(format_date_value(&json!(null), DEFAULT_DATE_FORMAT), "");
        assert_eq!(format_date_value(&json!("2024-01-05"), "%Q"), "January 05, 2024");
    }

    #[test]
    fn test_limit() {
        let hbs = registry();
        let data = json!({"posts": [{"t": "a"}, {"t": "b"}, {"t": "c"}]});
        let html = hbs.render_template("{{#each (limit posts 2)}}{{t}}{{/each}}", &data).unwrap();
        assert_eq!(html, "ab");

        assert_eq!(limit_value(&json!([1, 2]), -1), json!([]));
        assert_eq!(limit_value(&json!({"a": 1, "b": 2}), 1), json!([1]));
        assert_eq!(limit_value(&json!("x"), 1), json!("x"));
    }

    #[test]
    fn test_excerpt() {
        let html = "<h2>Intro</h2><p>one two three four</p>";
        assert_eq!(excerpt_text(&json!(html), 3), "Intro one two...");
        assert_eq!(excerpt_text(&json!(html), 10), "Intro one two three four");

        let hbs = registry();
        let out = hbs.render_template("{{excerpt body words=2}}", &json!({"body": "<p>a b c</p>"})).unwrap();
        assert_eq!(out, "a b...");
    }

    #[test]
    fn test_json() {
        let hbs = registry();
        let out = hbs.render_template("{{{json data}}}", &json!({"data": {"k": [1]}})).unwrap();
        assert_eq!(out, r#"{"k":[1]}"#);
    }

    #[test]
    fn test_substring() {
        let hbs = registry();
        let data = json!({"t": "Hello, wörld"});
        assert_eq!(hbs.render_template("{{substring t 0 5}}", &data).unwrap(), "Hello");
        assert_eq!(hbs.render_template("{{substring t 7}}", &data).unwrap(), "wörld");
        assert_eq!(hbs.render_template("{{substring t 3 99}}", &data).unwrap(), "lo, wörld");
        assert_eq!(hbs.render_template("{{substring t 5 2}}", &data).unwrap(), "");
        assert_eq!(hbs.render_template("{{substring missing 0 2}}", &data).unwrap(), "");
    }

    #[test]
    fn test_sort_by() {
        let hbs = registry();
        let data = json!({"pages": [
            {"title": "c", "metadata": {"order": "3"}},
            {"title": "a", "metadata": {"order": 1}},
            {"title": "none", "metadata": {}},
            {"title": "b", "navOrder": 2},
        ]});
        let html = hbs
            .render_template(r#"{{#each (sortBy pages "order")}}{{title}} {{/each}}"#, &data)
            .unwrap();
        assert_eq!(html, "none b a c ");

        let by_nav = sort_by_value(&data["pages"], "navOrder");
        assert_eq!(by_nav[3]["title"], "b");
        assert_eq!(sort_by_value(&json!("x"), "k"), json!("x"));
    }

    #[test]
    fn test_group_by() {
        let hbs = registry();
        let data = json!({"posts": [
            {"title": "a", "metadata": {"category": "rust"}},
            {"title": "b", "metadata": {"category": "life"}},
            {"title": "c", "metadata": {"category": "rust"}},
            {"title": "d", "metadata": {}},
        ]});
        let html = hbs
            .render_template(
                r#"{{#each (groupBy posts "category")}}[{{name}}:{{#each items}}{{title}}{{/each}}]{{/each}}"#,
                &data,
            )
            .unwrap();
        assert_eq!(html, "[rust:ac][life:b][:d]");
        assert_eq!(group_by_value(&json!({"a": 1}), "k"), json!([]));
    }

    #[test]
    fn test_include() {
        let dir = TempDir::new().unwrap();
        let templates = dir.path().join("templates");
        fs::create_dir_all(templates.join("partials")).unwrap();
        fs::write(templates.join("partials/nav.hbs"), "<nav>{{siteName}}</nav>").unwrap();
        fs::write(templates.join("broken.hbs"), "{{#if}}").unwrap();
        fs::write(dir.path().join("secret.hbs"), "secret").unwrap();

        let mut hbs = Handlebars::new();
        register(&mut hbs, &templates);
        let data = json!({"siteName": "S & Co"});
        let render = |source: &str| hbs.render_template(source, &data).unwrap();

        assert_eq!(render(r#"{{include "partials/nav.hbs"}}"#), "<nav>S &amp; Co</nav>");
        assert_eq!(render(r#"{{include "partials/nav"}}"#), "<nav>S &amp; Co</nav>");
        assert_eq!(render(r#"{{include "missing.hbs"}}"#), "<!-- File not found: missing.hbs -->");
        assert_eq!(render(r#"{{include "../secret.hbs"}}"#), "<!-- File not found: ../secret.hbs -->");
        assert!(render(r#"{{include "broken.hbs"}}"#).starts_with("<!-- Error including file:"));
    }

    #[test]
    fn test_include_cycle_stops() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("loop.hbs"), "x{{include \"loop.hbs\"}}").unwrap();

        let mut hbs = Handlebars::new();
        register(&mut hbs, dir.path());
        let html = hbs.render_template(r#"{{include "loop.hbs"}}"#, &json!({})).unwrap();

        assert_eq!(html.matches('x').count(), MAX_INCLUDE_DEPTH);
        assert!(html.ends_with("<!-- Error including file: loop.hbs nested too deep -->"));
        assert_eq!(INCLUDE_DEPTH.get(), 0);
    }

    #[test]
    fn test_md() {
        let hbs = registry();
        let render = |body: &str| hbs.render_template("{{md body}}", &json!({"body": body})).unwrap();

        assert_eq!(render("Some *emphasis* and ~~old~~"), "Some <em>emphasis</em> and <del>old</del>");
        assert_eq!(render("one\n\ntwo"), "<p>one</p>\n<p>two</p>");
        assert_eq!(render("   "), "");
        assert_eq!(hbs.render_template("{{md missing}}", &json!({})).unwrap(), "");
    }

    #[test]
    fn test_safe() {
        let hbs = registry();
        let data = json!({"html": "<b>bold</b>"});
        assert_eq!(hbs.render_template("{{safe html}}", &data).unwrap(), "<b>bold</b>");
        assert_eq!(hbs.render_template("{{html}}", &data).unwrap(), "&lt;b&gt;bold&lt;/b&gt;");
        assert_eq!(hbs.render_template("{{safe missing}}", &data).unwrap(), "");
    }

    #[test]
    fn test_debug() {
        let hbs = registry();
        let long = "x".repeat(120);
        let data = json!({
            "title": "<T>",
            "long": long,
            "posts": [{"title": "a"}, 2, 3, 4],
            "site": {"name": "S"},
        });
        let html = hbs.render_template("{{debug}}", &data).unwrap();

        assert!(html.starts_with("<pre"));
        assert!(html.ends_with("</pre>"));
        assert!(html.contains("title: \"&lt;T&gt;\""));
        assert!(html.contains("(120 chars)"));
        assert!(html.contains("posts: [4 items]"));
        assert!(html.contains("  [0]:"));
        assert!(html.contains("  ... (1 more items)"));
        assert!(html.contains("site: {1 properties}"));
        // Keys are listed alphabetically.
        assert!(html.find("long:").unwrap() < html.find("posts:").unwrap());
    }
}
