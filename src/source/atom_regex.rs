//! Any Atom feed, filtered to the entries whose raw XML matches a regex.
//!
//! The regex runs against each `<entry>` element exactly as it appears in
//! the upstream document, markup included, so a pattern can target a
//! category term or an attribute as easily as title text.

use feed_rs::model::{Entry, FeedType};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::{Regex, RegexBuilder};
use sha2::{Digest, Sha256};

use super::{Harvest, Plan, PipelineError, Recipe, RequestError, SourceKind};
use crate::config::SourceSettings;
use crate::feed::FeedEntry;
use crate::util::{format_iso, strip_tags, validate_upstream_url};

const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// A compiled entry filter plus the text it was built from.
#[derive(Debug, Clone)]
pub struct EntryFilter {
    pattern: String,
    flags: String,
    regex: Regex,
}

impl EntryFilter {
    /// Compiles `pattern` with single-letter `flags`: `i` case-insensitive,
    /// `m` multi-line, `s` dot matches newline, `x` verbose.
    pub fn new(pattern: &str, flags: &str) -> Result<Self, RequestError> {
        let mut builder = RegexBuilder::new(pattern);
        builder.size_limit(REGEX_SIZE_LIMIT);
        for flag in flags.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                other => {
                    return Err(RequestError::InvalidParameter {
                        name: "flags",
                        reason: format!("unsupported flag '{other}' (expected any of i, m, s, x)"),
                    })
                }
            };
        }
        let regex = builder.build().map_err(|e| RequestError::InvalidParameter {
            name: "regex",
            reason: e.to_string(),
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            flags: flags.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, entry_xml: &str) -> bool {
        self.regex.is_match(entry_xml)
    }

    /// `/pattern/flags Filtered Feed: <upstream title>`
    pub fn feed_title(&self, upstream_title: &str) -> String {
        format!(
            "/{}/{} Filtered Feed: {}",
            self.pattern, self.flags, upstream_title
        )
    }
}

pub(super) fn plan(
    url: &str,
    pattern: &str,
    flags: &str,
    settings: &SourceSettings,
) -> Result<Plan, RequestError> {
    let upstream = validate_upstream_url(url, settings.allow_private)?;
    let filter = EntryFilter::new(pattern, flags)?;
    let title = filter.feed_title(upstream.as_str());
    Ok(Plan::new(
        SourceKind::AtomRegex,
        Recipe::AtomRegex(filter),
        upstream.as_str(),
        title,
        upstream.as_str(),
    ))
}

pub(super) fn harvest(body: &str, filter: &EntryFilter) -> Result<Harvest, PipelineError> {
    let feed = feed_rs::parser::parse(body.as_bytes())
        .map_err(|e| PipelineError::Xml(e.to_string()))?;
    if feed.feed_type != FeedType::Atom {
        return Err(PipelineError::Structure(format!(
            "expected an Atom feed, got {:?}",
            feed.feed_type
        )));
    }

    let raw_entries = raw_entry_slices(body)?;
    if raw_entries.len() != feed.entries.len() {
        return Err(PipelineError::Structure(format!(
            "found {} <entry> elements but parsed {} entries",
            raw_entries.len(),
            feed.entries.len()
        )));
    }

    let upstream_title = feed.title.as_ref().map(|t| t.content.trim()).unwrap_or("");
    let total = feed.entries.len();
    let entries: Vec<Option<FeedEntry>> = feed
        .entries
        .into_iter()
        .zip(raw_entries)
        .map(|(entry, raw)| filter.is_match(raw).then(|| convert(entry)))
        .collect();

    tracing::debug!(
        pattern = %filter.pattern,
        total = total,
        kept = entries.iter().flatten().count(),
        "Filtered upstream entries"
    );

    Ok(Harvest {
        entries,
        title: Some(filter.feed_title(upstream_title)),
    })
}

/// Byte slices of every top-level `<entry>` element, in document order.
fn raw_entry_slices(xml: &str) -> Result<Vec<&str>, PipelineError> {
    let mut reader = Reader::from_str(xml);
    let mut slices = Vec::new();
    let mut depth = 0usize;
    let mut entry_start: Option<usize> = None;

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .map_err(|e| PipelineError::Xml(e.to_string()))?;
        match event {
            Event::Start(e) => {
                if depth == 1 && e.local_name().as_ref() == b"entry" {
                    entry_start = Some(before);
                }
                depth += 1;
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 1 {
                    if let Some(start) = entry_start.take() {
                        slices.push(&xml[start..reader.buffer_position() as usize]);
                    }
                }
            }
            Event::Empty(e) => {
                if depth == 1 && e.local_name().as_ref() == b"entry" {
                    slices.push(&xml[before..reader.buffer_position() as usize]);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(slices)
}

fn convert(entry: Entry) -> FeedEntry {
    let link = entry
        .links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| entry.links.first())
        .map(|l| l.href.clone());
    let title = entry
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());
    let updated = entry.updated.or(entry.published);
    let summary = entry
        .summary
        .map(|s| s.content)
        .or_else(|| entry.content.and_then(|c| c.body))
        .map(|text| strip_tags(&text).trim().to_string())
        .unwrap_or_default();

    let id = match entry.id.trim() {
        "" => fallback_id(link.as_deref(), &title, updated.map(|d| d.timestamp())),
        id => id.to_string(),
    };

    FeedEntry {
        id,
        title,
        link,
        updated: updated.map(|d| format_iso(&d)),
        summary,
    }
}

/// Stable id for entries that arrive without one.
fn fallback_id(link: Option<&str>, title: &str, updated: Option<i64>) -> String {
    let input = format!(
        "{}|{}|{}",
        link.unwrap_or(""),
        title,
        updated.map(|p| p.to_string()).unwrap_or_default()
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RELEASES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xml:lang="en-US">
  <id>tag:github.com,2008:https://github.com/cli/cli/releases</id>
  <link type="text/html" rel="alternate" href="https://github.com/cli/cli/releases"/>
  <title>Release notes from cli</title>
  <updated>2024-05-01T00:00:00Z</updated>
  <entry>
    <id>tag:github.com,2008:Repository/212613049/v2.49.0</id>
    <updated>2024-04-30T12:00:00Z</updated>
    <link rel="alternate" type="text/html" href="https://github.com/cli/cli/releases/tag/v2.49.0"/>
    <title>GitHub CLI 2.49.0</title>
    <content type="html">&lt;p&gt;Fix a &lt;b&gt;security&lt;/b&gt; issue&lt;/p&gt;</content>
  </entry>
  <entry>
    <id>tag:github.com,2008:Repository/212613049/v2.48.0</id>
    <updated>2024-04-20T12:00:00Z</updated>
    <link rel="alternate" type="text/html" href="https://github.com/cli/cli/releases/tag/v2.48.0"/>
    <title>GitHub CLI 2.48.0</title>
    <content type="html">&lt;p&gt;New features&lt;/p&gt;</content>
  </entry>
</feed>"#;

    fn filter(pattern: &str, flags: &str) -> EntryFilter {
        EntryFilter::new(pattern, flags).unwrap()
    }

    #[test]
    fn test_filter_keeps_matching_entries() {
        let harvest = harvest(RELEASES, &filter("SECURITY", "i")).unwrap();
        let kept: Vec<FeedEntry> = harvest.entries.into_iter().flatten().collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "tag:github.com,2008:Repository/212613049/v2.49.0");
        assert_eq!(kept[0].title, "GitHub CLI 2.49.0");
        assert_eq!(
            kept[0].link.as_deref(),
            Some("https://github.com/cli/cli/releases/tag/v2.49.0")
        );
        assert_eq!(kept[0].updated.as_deref(), Some("2024-04-30T12:00:00.000Z"));
        assert_eq!(kept[0].summary, "Fix a security issue");
        assert_eq!(
            harvest.title.as_deref(),
            Some("/SECURITY/i Filtered Feed: Release notes from cli")
        );
    }

    #[test]
    fn test_case_sensitive_by_default() {
        let harvest = harvest(RELEASES, &filter("SECURITY", "")).unwrap();
        assert!(harvest.entries.iter().all(Option::is_none));
        assert_eq!(harvest.entries.len(), 2);
    }

    #[test]
    fn test_regex_sees_raw_markup() {
        let harvest = harvest(RELEASES, &filter(r#"href="[^"]+v2\.48"#, "")).unwrap();
        let kept: Vec<FeedEntry> = harvest.entries.into_iter().flatten().collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "GitHub CLI 2.48.0");
    }

    #[test]
    fn test_raw_slices_cover_whole_entries() {
        let slices = raw_entry_slices(RELEASES).unwrap();
        assert_eq!(slices.len(), 2);
        assert!(slices[0].starts_with("<entry>"));
        assert!(slices[0].ends_with("</entry>"));
        assert!(slices[1].contains("v2.48.0"));
    }

    #[test]
    fn test_entry_without_id_gets_hash() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>T</title>
            <entry><title>No id</title><link href="https://example.com/a"/></entry></feed>"#;
        let first = harvest(xml, &filter(".", "")).unwrap().entries.remove(0).unwrap();
        let second = harvest(xml, &filter(".", "")).unwrap().entries.remove(0).unwrap();
        assert!(!first.id.is_empty());
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_invalid_flags_and_regex() {
        assert!(matches!(
            EntryFilter::new("a", "g"),
            Err(RequestError::InvalidParameter { name: "flags", .. })
        ));
        assert!(matches!(
            EntryFilter::new("(unclosed", "i"),
            Err(RequestError::InvalidParameter { name: "regex", .. })
        ));
    }

    #[test]
    fn test_plan_rejects_private_urls() {
        let err = plan("http://127.0.0.1/feed.atom", "x", "", &SourceSettings::default()).unwrap_err();
        assert!(matches!(err, RequestError::InvalidParameter { name: "url", .. }));

        let allowed = SourceSettings {
            allow_private: true,
            ..SourceSettings::default()
        };
        let plan = plan("http://127.0.0.1/feed.atom", "x", "", &allowed).unwrap();
        assert_eq!(plan.data_url, "http://127.0.0.1/feed.atom");
    }

    #[test]
    fn test_malformed_xml() {
        assert!(matches!(
            harvest("this is not a feed", &filter("x", "")),
            Err(PipelineError::Xml(_))
        ));
    }

    #[test]
    fn test_rss_rejected() {
        let rss = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>R</title></channel></rss>"#;
        assert!(matches!(
            harvest(rss, &filter("x", "")),
            Err(PipelineError::Structure(_))
        ));
    }
}
