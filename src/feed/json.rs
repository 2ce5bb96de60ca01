use serde::Serialize;

use super::model::Feed;
use super::RenderError;

pub const JSON_FEED_VERSION: &str = "https://jsonfeed.org/version/1";

#[derive(Serialize)]
struct JsonFeed<'a> {
    version: &'static str,
    title: &'a str,
    home_page_url: &'a str,
    feed_url: &'a str,
    items: Vec<JsonFeedItem<'a>>,
}

#[derive(Serialize)]
struct JsonFeedItem<'a> {
    id: &'a str,
    url: &'a str,
    title: &'a str,
    content_text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_published: Option<&'a str>,
}

/// Renders a JSON Feed v1 document.
///
/// `url` falls back to the feed's home page like the Atom link does;
/// `date_published` is omitted for entries without a timestamp.
pub fn render_json(feed: &Feed) -> Result<String, RenderError> {
    let meta = &feed.metadata;
    let document = JsonFeed {
        version: JSON_FEED_VERSION,
        title: &meta.title,
        home_page_url: &meta.link,
        feed_url: &meta.id,
        items: feed
            .entries
            .iter()
            .map(|entry| JsonFeedItem {
                id: &entry.id,
                url: entry.link.as_deref().unwrap_or(&meta.link),
                title: &entry.title,
                content_text: &entry.summary,
                date_published: entry.updated.as_deref(),
            })
            .collect(),
    };

    Ok(serde_json::to_string_pretty(&document)?)
}
