//! `content` / `block` helpers and the render pass that owns their registry.
//!
//! ```text
//! content template:  {{#content "head"}}<title>X</title>{{/content}}   → registry["head"] += ...
//! layout template:   {{#block "head"}}<meta a>{{/block}}               → registry["head"] or default
//! ```
//!
//! Every [`RenderPass`] clones the base registry and binds both helpers to
//! its own [`BlockRegistry`], so passes never observe each other's overrides.

use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext, RenderError,
    RenderErrorReason, Renderable,
};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;

/// Block name → fragments in declaration order.
#[derive(Debug, Default)]
pub struct BlockRegistry {
    blocks: FxHashMap<String, Vec<String>>,
}

impl BlockRegistry {
    pub fn push(&mut self, name: &str, fragment: String) {
        self.blocks.entry(name.to_owned()).or_default().push(fragment);
    }

    /// Concatenated override; `Some("")` for an explicit empty override.
    pub fn get(&self, name: &str) -> Option<String> {
        self.blocks.get(name).map(|fragments| fragments.concat())
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }
}

type SharedBlocks = Arc<Mutex<BlockRegistry>>;

// ============================================================================
// Render Pass
// ============================================================================

/// One content + layout composition.
pub struct RenderPass {
    registry: Handlebars<'static>,
    blocks: SharedBlocks,
}

impl RenderPass {
    pub fn new(base: &Handlebars<'static>) -> Self {
        let blocks = SharedBlocks::default();
        let mut registry = base.clone();
        registry.register_helper(
            "content",
            Box::new(ContentHelper {
                blocks: Arc::clone(&blocks),
            }),
        );
        registry.register_helper(
            "block",
            Box::new(BlockHelper {
                blocks: Arc::clone(&blocks),
            }),
        );
        Self { registry, blocks }
    }

    pub fn render(&self, source: &str, data: &Value) -> Result<String, RenderError> {
        self.registry.render_template(source, data)
    }

    /// Number of distinct overridden blocks collected so far.
    pub fn block_count(&self) -> usize {
        self.blocks.lock().len()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Writes into a string instead of the page.
#[derive(Default)]
struct Capture(String);

impl Output for Capture {
    fn write(&mut self, seg: &str) -> Result<(), std::io::Error> {
        self.0.push_str(seg);
        Ok(())
    }
}

/// `{{#content "name"}}..{{/content}}` records an override and renders nothing.
/// `{{{content}}}` emits the composed content bound in the layout data.
struct ContentHelper {
    blocks: SharedBlocks,
}

impl HelperDef for ContentHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let param = h.param(0).map(|p| p.value());

        if let Some(Value::String(name)) = param
            && h.is_block()
        {
            let mut capture = Capture::default();
            if let Some(template) = h.template() {
                template.render(r, ctx, rc, &mut capture)?;
            }
            // Lock after rendering: the body may declare nested overrides.
            self.blocks.lock().push(name, capture.0);
            return Ok(());
        }

        let value = match param {
            None => ctx.data().get("content"),
            Some(Value::Object(map)) => map.get("content").or(param),
            Some(other) => Some(other),
        };

        match value {
            Some(Value::String(html)) => out.write(html)?,
            Some(Value::Null) | None => {}
            Some(other) => out.write(&other.to_string())?,
        }
        Ok(())
    }
}

/// `{{#block "name"}}default{{/block}}` emits the override if one was recorded.
struct BlockHelper {
    blocks: SharedBlocks,
}

impl HelperDef for BlockHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let name = h
            .param(0)
            .and_then(|p| p.value().as_str())
            .ok_or_else(|| RenderErrorReason::Other("`block` expects a string name".into()))?;

        let overridden = self.blocks.lock().get(name);
        match overridden {
            Some(html) => out.write(&html)?,
            None => {
                if let Some(template) = h.template() {
                    template.render(r, ctx, rc, out)?;
                }
            }
        }
        Ok(())
    }
}
