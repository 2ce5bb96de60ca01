use chrono::Utc;
use std::fmt;
use std::str::FromStr;

use crate::util::format_iso;

/// One normalized advisory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// Unique within one feed and stable across refetches.
    pub id: String,
    pub title: String,
    pub link: Option<String>,
    /// ISO-8601 UTC (`YYYY-MM-DDTHH:MM:SS.sssZ`), only when upstream had a usable date.
    pub updated: Option<String>,
    /// Empty when upstream provided nothing beyond the title.
    pub summary: String,
}

impl FeedEntry {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            link: None,
            updated: None,
            summary: String::new(),
        }
    }

    /// Sort key for recency ordering; a missing timestamp sorts as `""`.
    pub fn updated_key(&self) -> &str {
        self.updated.as_deref().unwrap_or("")
    }
}

/// Feed-level constants for one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedMetadata {
    pub title: String,
    /// Upstream home page.
    pub link: String,
    /// Refresh timestamp, defaults to render time.
    pub updated: String,
    /// The feed's own canonical URL.
    pub id: String,
    pub author: String,
}

impl FeedMetadata {
    pub const DEFAULT_AUTHOR: &'static str = "Generated";

    pub fn new(title: impl Into<String>, link: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            updated: format_iso(&Utc::now()),
            id: id.into(),
            author: Self::DEFAULT_AUTHOR.to_string(),
        }
    }

    pub fn with_updated(mut self, updated: impl Into<String>) -> Self {
        self.updated = updated.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }
}

/// Metadata plus entries, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub metadata: FeedMetadata,
    pub entries: Vec<FeedEntry>,
}

/// Output syndication format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    #[default]
    Atom,
    Json,
}

impl FeedFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            FeedFormat::Atom => "application/atom+xml; charset=utf-8",
            FeedFormat::Json => "application/json; charset=utf-8",
        }
    }
}

impl FromStr for FeedFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "atom" | "xml" => Ok(FeedFormat::Atom),
            "json" | "jsonfeed" => Ok(FeedFormat::Json),
            other => Err(format!("Unsupported feed format: {other} (expected atom or json)")),
        }
    }
}

impl fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FeedFormat::Atom => "atom",
            FeedFormat::Json => "json",
        })
    }
}
