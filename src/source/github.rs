//! GitHub repository security advisories (REST API).

use serde_json::Value;

use super::{records, upstream, Plan, PipelineError, Recipe, RequestError, SourceKind};
use crate::config::SourceSettings;
use crate::feed::FeedEntry;
use crate::fetch::FetchOptions;
use crate::normalize::{EntryIdentity, Normalizer, RecordProfile, SummaryField};
use crate::record::{FieldSet, RawRecord};

const DEFAULT_UPSTREAM: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";

const PROFILE: RecordProfile = RecordProfile {
    identity_field: "ghsa_id",
    sentinels: &[],
    summary_fields: &[
        SummaryField::text("summary", "Summary"),
        SummaryField::text("description", "Description"),
        SummaryField::text("severity", "Severity"),
        SummaryField::nested("cvss", "score", "CVSS Score"),
        SummaryField::nested("cvss", "vector_string", "CVSS Vector"),
        SummaryField::text("cve_id", "CVE"),
        SummaryField::comma_list("cwe_ids", "CWEs"),
        SummaryField::text("state", "State"),
    ],
    date_fields: &["updated_at", "published_at", "created_at"],
    fields: FieldSet::new(&[
        "ghsa_id",
        "cve_id",
        "url",
        "html_url",
        "summary",
        "description",
        "severity",
        "author",
        "publisher",
        "identifiers",
        "state",
        "created_at",
        "updated_at",
        "published_at",
        "closed_at",
        "withdrawn_at",
        "vulnerabilities",
        "cvss_severities",
        "cwes",
        "cwe_ids",
        "credits",
        "credits_detailed",
    ])
    .with_optional(&[
        "submission",
        "collaborating_users",
        "collaborating_teams",
        "private_fork",
        "cvss",
        "epss",
    ]),
};

/// GitHub owner and repository names: ASCII alphanumerics, `-`, `_`, `.`.
fn check_name(name: &'static str, value: &str) -> Result<(), RequestError> {
    let valid = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && value != "."
        && value != "..";
    if valid {
        Ok(())
    } else {
        Err(RequestError::InvalidParameter {
            name,
            reason: format!("'{value}' is not a valid GitHub {name} name"),
        })
    }
}

pub(super) fn plan(owner: &str, repo: &str, settings: &SourceSettings) -> Result<Plan, RequestError> {
    check_name("owner", owner)?;
    check_name("repo", repo)?;

    let options = FetchOptions::default()
        .header("Accept", "application/vnd.github+json")
        .header("X-GitHub-Api-Version", API_VERSION);
    Ok(Plan::new(
        SourceKind::GitHub,
        Recipe::GitHub {
            owner: owner.to_string(),
            repo: repo.to_string(),
        },
        format!(
            "{}/repos/{owner}/{repo}/security-advisories",
            upstream(settings, DEFAULT_UPSTREAM)
        ),
        format!("Security Advisories for {owner}/{repo}"),
        format!("https://github.com/{owner}/{repo}/security/advisories"),
    )
    .with_options(options))
}

pub(super) fn harvest(
    body: &str,
    owner: &str,
    repo: &str,
    threshold: f64,
) -> Result<Vec<Option<FeedEntry>>, PipelineError> {
    let document: Value = serde_json::from_str(body)?;

    let normalizer = Normalizer::new(
        &PROFILE,
        |record: &RawRecord<'_>, ghsa: &str, _updated: Option<&str>| {
            let title = match record.text("summary") {
                Some(summary) => format!("{owner}/{repo} {ghsa}: {summary}"),
                None => format!("{owner}/{repo} {ghsa}"),
            };
            EntryIdentity {
                id: format!("https://github.com/{owner}/{repo}/security/advisories/{ghsa}"),
                title,
                link: record.text("html_url").map(str::to_string),
            }
        },
    );
    Ok(normalizer.normalize_all(records(&document, None)?, threshold)?)
}
