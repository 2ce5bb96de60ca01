use std::collections::HashSet;
use thiserror::Error;

use super::model::{Feed, FeedEntry, FeedMetadata};

/// Two or more entries normalized to the same id.
///
/// Never deduplicated silently: a collision means a source mapped distinct
/// advisories onto one identity and entries would otherwise vanish.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Duplicate entry IDs found: {}", .0.join(", "))]
pub struct DuplicateEntryIds(pub Vec<String>);

/// Builds a [`Feed`] from per-record normalization results.
///
/// `None` candidates are skipped records and are dropped. Entries are sorted
/// newest first with a stable sort, so entries sharing a timestamp keep their
/// upstream order and entries without one go last.
///
/// # Errors
///
/// [`DuplicateEntryIds`] listing each colliding id once, in the order the
/// collisions were found.
pub fn assemble<I>(metadata: FeedMetadata, candidates: I) -> Result<Feed, DuplicateEntryIds>
where
    I: IntoIterator<Item = Option<FeedEntry>>,
{
    let mut entries: Vec<FeedEntry> = candidates.into_iter().flatten().collect();
    entries.sort_by(|a, b| b.updated_key().cmp(a.updated_key()));

    let mut seen = HashSet::with_capacity(entries.len());
    let mut duplicates: Vec<String> = Vec::new();
    for entry in &entries {
        if !seen.insert(entry.id.as_str()) && !duplicates.contains(&entry.id) {
            duplicates.push(entry.id.clone());
        }
    }
    if !duplicates.is_empty() {
        return Err(DuplicateEntryIds(duplicates));
    }

    Ok(Feed { metadata, entries })
}
