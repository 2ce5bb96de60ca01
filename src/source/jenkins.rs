//! Commits mentioning "security" across the jenkinsci organization, via the
//! GitHub commit search API.

use serde_json::Value;

use super::{records, upstream, Plan, PipelineError, Recipe, SourceKind};
use crate::config::SourceSettings;
use crate::feed::FeedEntry;
use crate::fetch::FetchOptions;
use crate::normalize::{EntryIdentity, Normalizer, RecordProfile, SummaryField};
use crate::record::{FieldSet, RawRecord};

const DEFAULT_UPSTREAM: &str = "https://api.github.com";
const SEARCH: &str = "search/commits?sort=committer-date&order=desc&q=org%3Ajenkinsci+security";
const HOME: &str =
    "https://github.com/search?o=desc&q=org%3Ajenkinsci+security&s=committer-date&type=commits";

const PROFILE: RecordProfile = RecordProfile {
    identity_field: "html_url",
    sentinels: &[],
    summary_fields: &[
        SummaryField::text("repository.full_name", "Repository"),
        SummaryField::text("sha", "Commit"),
        SummaryField::text("commit.author.name", "Author"),
        SummaryField::text("commit.committer.date", "Committed"),
        SummaryField::paragraph("commit.message"),
    ],
    date_fields: &["commit.committer.date", "commit.author.date"],
    fields: FieldSet::new(&[
        "url",
        "sha",
        "node_id",
        "html_url",
        "comments_url",
        "commit",
        "author",
        "committer",
        "parents",
        "repository",
        "score",
    ]),
};

pub(super) fn plan(settings: &SourceSettings) -> Plan {
    Plan::new(
        SourceKind::Jenkins,
        Recipe::Jenkins,
        format!("{}/{SEARCH}", upstream(settings, DEFAULT_UPSTREAM)),
        "Jenkins Security Commit Search",
        HOME,
    )
    .with_options(FetchOptions::default().header("Accept", "application/vnd.github+json"))
}

fn identify(record: &RawRecord<'_>, html_url: &str, _updated: Option<&str>) -> EntryIdentity {
    let repository = record
        .scalar("repository.full_name")
        .unwrap_or_else(|| "jenkinsci".into());
    let headline = record
        .text("commit.message")
        .and_then(|message| message.lines().next())
        .unwrap_or("")
        .trim();
    EntryIdentity {
        id: html_url.to_string(),
        title: format!("{repository}: {headline}"),
        link: Some(html_url.to_string()),
    }
}

pub(super) fn harvest(body: &str, threshold: f64) -> Result<Vec<Option<FeedEntry>>, PipelineError> {
    let document: Value = serde_json::from_str(body)?;
    let normalizer = Normalizer::new(&PROFILE, identify);
    Ok(normalizer.normalize_all(records(&document, Some("items"))?, threshold)?)
}
