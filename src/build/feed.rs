//! RSS feed generation.

use super::output::write_output;
use crate::{config::SiteConfig, content::ContentDocument, log};
use anyhow::{Result, anyhow};
use chrono::NaiveDateTime;
use rss::{ChannelBuilder, GuidBuilder, ItemBuilder, validation::Validate};
use std::path::Path;

// ============================================================================
// Public API
// ============================================================================

/// Write `<output>/<rss.fileName>` if feeds are enabled.
///
/// Returns whether a feed was written.
pub fn generate_feed(config: &SiteConfig, output: &Path, posts: &[ContentDocument]) -> Result<bool> {
    if !config.rss.enabled {
        return Ok(false);
    }

    let xml = feed_xml(config, posts)?;
    write_output(&output.join(&config.rss.file_name), xml)?;
    log!("rss"; "{}", config.rss.file_name);
    Ok(true)
}

/// Render the channel for the newest `rss.maxItems` posts.
pub fn feed_xml(config: &SiteConfig, posts: &[ContentDocument]) -> Result<String> {
    let mut posts: Vec<&ContentDocument> = posts.iter().filter(|p| !p.is_template_source).collect();
    posts.sort_by(|a, b| b.date.cmp(&a.date));
    posts.truncate(config.rss.max_items);

    let base_url = config.base_url.trim_end_matches('/');
    let items: Vec<_> = posts.iter().map(|post| post_to_item(post, config)).collect();

    let channel = ChannelBuilder::default()
        .title(config.rss.title.clone().unwrap_or_else(|| config.site_name.clone()))
        .link(format!("{base_url}/"))
        .description(
            config
                .rss
                .description
                .clone()
                .unwrap_or_else(|| config.description.clone()),
        )
        .language(Some(config.rss.language.clone()))
        .last_build_date(posts.first().and_then(|p| p.date).map(rfc2822))
        .generator(Some(format!("statik {}", env!("CARGO_PKG_VERSION"))))
        .items(items)
        .build();

    channel
        .validate()
        .map_err(|e| anyhow!("rss validation failed: {e}"))?;
    Ok(channel.to_string())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn post_to_item(post: &ContentDocument, config: &SiteConfig) -> rss::Item {
    let link = config.url_for(&post.output_path);
    let author = Some(config.author.clone()).filter(|a| !a.is_empty());
    let content = config.rss.include_full_content.then(|| post.body.clone());

    ItemBuilder::default()
        .title(Some(post.title.clone()))
        .link(Some(link.clone()))
        .guid(Some(GuidBuilder::default().permalink(true).value(link).build()))
        .description(Some(post.description()))
        .pub_date(post.date.map(rfc2822))
        .author(author)
        .categories(
            post.tags()
                .into_iter()
                .map(|tag| rss::CategoryBuilder::default().name(tag).build())
                .collect::<Vec<_>>(),
        )
        .content(content)
        .build()
}

/// Naive dates are taken as UTC.
fn rfc2822(date: NaiveDateTime) -> String {
    date.and_utc().to_rfc2822()
}
