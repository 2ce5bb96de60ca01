//! Feed model, assembly and rendering.
//!
//! Everything downstream of record normalization lives here:
//!
//! - [`model`] - [`FeedEntry`], [`FeedMetadata`], [`Feed`] and [`FeedFormat`]
//! - [`assemble`] - drops skipped records, orders by recency, rejects
//!   duplicate ids
//! - [`render`] - Atom (`quick-xml`) and JSON Feed (`serde_json`) output
//! - [`error_feed`] - the synthetic one-entry feed used when any earlier
//!   stage fails
//!
//! # Example
//!
//! ```ignore
//! let feed = assemble(metadata, outcomes.into_iter().map(Outcome::into_entry))?;
//! let body = render(&feed, FeedFormat::Atom)?;
//! ```

mod assemble;
mod atom;
mod error_feed;
mod json;
mod model;

use thiserror::Error;

pub use assemble::{assemble, DuplicateEntryIds};
pub use atom::render_atom;
pub use error_feed::{describe_error, error_feed, render_or_fallback};
pub use json::{render_json, JSON_FEED_VERSION};
pub use model::{Feed, FeedEntry, FeedFormat, FeedMetadata};

/// Serialization failures. Practically unreachable since both renderers
/// write to memory, but surfaced rather than unwrapped.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("XML write error: {0}")]
    Xml(String),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Renders `feed` in the requested format.
pub fn render(feed: &Feed, format: FeedFormat) -> Result<String, RenderError> {
    match format {
        FeedFormat::Atom => render_atom(feed),
        FeedFormat::Json => render_json(feed),
    }
}
