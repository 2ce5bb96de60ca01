//! Mattermost security updates.

use serde_json::Value;
use url::form_urlencoded::byte_serialize;

use super::{records, upstream, Plan, PipelineError, Recipe, SourceKind};
use crate::config::SourceSettings;
use crate::feed::FeedEntry;
use crate::normalize::{EntryIdentity, Normalizer, RecordProfile, SummaryField};
use crate::record::{FieldSet, RawRecord};

const DATA_URL: &str = "https://securityupdates.mattermost.com/security_updates.json";
const HOME: &str = "https://mattermost.com/security-updates/";

/// The upstream sheet export repeats its header row as a record.
const HEADER_ROW: &str = "Issue Identifier";

const PROFILE: RecordProfile = RecordProfile {
    identity_field: "issue_id",
    sentinels: &[HEADER_ROW],
    summary_fields: &[
        SummaryField::text("cve_id", "CVE"),
        SummaryField::text("severity", "Severity"),
        SummaryField::comma_list("affected_versions", "Affected versions"),
        SummaryField::comma_list("fix_versions", "Fix versions"),
        SummaryField::text("fix_release_date", "Fix released"),
        SummaryField::paragraph("details"),
        SummaryField::text("platform", "Platform"),
    ],
    date_fields: &["fix_release_date"],
    fields: FieldSet::new(&[
        "issue_id",
        "cve_id",
        "severity",
        "affected_versions",
        "fix_release_date",
        "fix_versions",
        "details",
        "platform",
    ]),
};

pub(super) fn plan(settings: &SourceSettings) -> Plan {
    Plan::new(
        SourceKind::Mattermost,
        Recipe::Mattermost,
        upstream(settings, DATA_URL),
        "Mattermost Security Updates",
        HOME,
    )
}

pub(super) fn harvest(
    body: &str,
    feed_base: &str,
    threshold: f64,
) -> Result<Vec<Option<FeedEntry>>, PipelineError> {
    let document: Value = serde_json::from_str(body)?;

    // The same issue is republished when a fix is re-released, so the
    // release date is part of the id.
    let normalizer = Normalizer::new(
        &PROFILE,
        |record: &RawRecord<'_>, issue: &str, updated: Option<&str>| {
            let key: String =
                byte_serialize(format!("{issue}_{}", updated.unwrap_or("")).as_bytes()).collect();
            let title = match record.scalar("cve_id") {
                Some(cve) => format!("{issue} ({cve})"),
                None => issue.to_string(),
            };
            EntryIdentity {
                id: format!("{feed_base}#{key}"),
                title,
                link: Some(HOME.to_string()),
            }
        },
    );
    Ok(normalizer.normalize_all(records(&document, None)?, threshold)?)
}
