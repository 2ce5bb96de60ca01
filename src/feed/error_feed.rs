use quick_xml::escape::escape;
use std::error::Error;

use super::model::{Feed, FeedEntry, FeedFormat, FeedMetadata};
use super::{render, JSON_FEED_VERSION};
use crate::util::strip_xml_invalid_chars;

/// Display text of an error followed by its `source()` chain.
pub fn describe_error(error: &(dyn Error + 'static)) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str("\n\nCaused by: ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// One-entry feed reporting a failed pipeline run.
///
/// The entry carries the upstream URL that was attempted, the error chain and
/// the response text being parsed (if any), so a feed reader shows enough to
/// diagnose the failure without server logs.
pub fn error_feed(
    metadata: FeedMetadata,
    data_url: &str,
    error: &(dyn Error + 'static),
    response_text: Option<&str>,
) -> Feed {
    let mut entry = FeedEntry::new(format!("{}#error", metadata.id), "Error");
    entry.summary = format!(
        "Error generating feed from {}\n\n{}\n\n{}",
        data_url,
        describe_error(error),
        response_text.unwrap_or("")
    )
    .trim_end()
    .to_string();

    Feed {
        metadata,
        entries: vec![entry],
    }
}

/// Renders `feed`, falling back to a minimal hand-built document if the
/// renderer fails. Never fails itself.
pub fn render_or_fallback(feed: &Feed, format: FeedFormat) -> String {
    match render(feed, format) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, format = %format, "Feed render failed, using fallback document");
            fallback_document(&feed.metadata, format, &e.to_string())
        }
    }
}

fn fallback_document(meta: &FeedMetadata, format: FeedFormat, message: &str) -> String {
    match format {
        FeedFormat::Json => serde_json::json!({
            "version": JSON_FEED_VERSION,
            "title": meta.title,
            "home_page_url": meta.link,
            "items": [{
                "id": format!("{}#error", meta.id),
                "url": meta.link,
                "title": "Error",
                "content_text": message,
            }],
        })
        .to_string(),
        FeedFormat::Atom => {
            let x = |s: &str| escape(strip_xml_invalid_chars(s).as_ref()).into_owned();
            format!(
                concat!(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
                    "<feed xmlns=\"http://www.w3.org/2005/Atom\">",
                    "<author><name>{author}</name></author>",
                    "<title>{title}</title><link href=\"{link}\"/>",
                    "<updated>{updated}</updated><id>{id}</id>",
                    "<entry><id>{id}#error</id><title>Error</title>",
                    "<updated>{updated}</updated><link href=\"{link}\"/>",
                    "<summary>{message}</summary></entry></feed>\n"
                ),
                author = x(&meta.author),
                title = x(&meta.title),
                link = x(&meta.link),
                updated = x(&meta.updated),
                id = x(&meta.id),
                message = x(message),
            )
        }
    }
}
