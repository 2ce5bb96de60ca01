//! NVIDIA product security bulletins.

use serde_json::Value;

use super::{records, upstream, Plan, PipelineError, Recipe, SourceKind};
use crate::config::SourceSettings;
use crate::feed::FeedEntry;
use crate::normalize::{EntryIdentity, Normalizer, RecordProfile, SummaryField};
use crate::record::{FieldSet, RawRecord};
use crate::util::{first_href, slug, strip_tags};

const DATA_URL: &str =
    "https://www.nvidia.com/content/dam/en-zz/Solutions/product-security/product-security.json";
const HOME: &str = "https://www.nvidia.com/en-us/product-security/";

const PROFILE: RecordProfile = RecordProfile {
    // HTML anchor wrapping the bulletin name.
    identity_field: "title",
    sentinels: &[],
    summary_fields: &[
        SummaryField::text("bulletin id", "Bulletin ID"),
        SummaryField::text("severity", "Severity"),
        SummaryField::comma_list("cve identifier(s)", "CVE Identifier(s)"),
        SummaryField::text("publish date", "Published"),
        SummaryField::text("last updated", "Last Updated"),
    ],
    date_fields: &["last updated", "publish date"],
    fields: FieldSet::new(&[
        "title",
        "bulletin id",
        "severity",
        "cve identifier(s)",
        "publish date",
        "last updated",
    ]),
};

pub(super) fn plan(settings: &SourceSettings) -> Plan {
    Plan::new(
        SourceKind::Nvidia,
        Recipe::Nvidia,
        upstream(settings, DATA_URL),
        "NVIDIA Security Bulletins",
        HOME,
    )
}

pub(super) fn harvest(
    body: &str,
    feed_base: &str,
    threshold: f64,
) -> Result<Vec<Option<FeedEntry>>, PipelineError> {
    let document: Value = serde_json::from_str(body)?;

    let normalizer = Normalizer::new(
        &PROFILE,
        |record: &RawRecord<'_>, title_html: &str, _updated: Option<&str>| {
            let title = strip_tags(title_html).trim().to_string();
            let id = match record.scalar("bulletin id") {
                Some(bulletin) => format!("{feed_base}#bulletin-{bulletin}"),
                None => format!("{feed_base}#{}", slug(&title)),
            };
            EntryIdentity {
                id,
                title,
                link: first_href(title_html).map(str::to_string),
            }
        },
    );
    Ok(normalizer.normalize_all(records(&document, Some("data"))?, threshold)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BASE: &str = "https://feeds.test/feeds/nvidia";

    #[test]
    fn test_bulletin_entry() {
        let body = r#"{"data": [{
            "title": "<a href='https://nvidia.custhelp.com/app/answers/detail/a_id/5586'>Security Bulletin: NVIDIA GPU Display Driver - October 2024</a>",
            "bulletin id": "5586",
            "severity": "High",
            "cve identifier(s)": "CVE-2024-0117, CVE-2024-0118",
            "publish date": "22 Oct 2024",
            "last updated": "24 Oct 2024"
        }]}"#;
        let entry = harvest(body, BASE, 0.5).unwrap().remove(0).unwrap();
        assert_eq!(entry.id, "https://feeds.test/feeds/nvidia#bulletin-5586");
        assert_eq!(
            entry.title,
            "Security Bulletin: NVIDIA GPU Display Driver - October 2024"
        );
        assert_eq!(
            entry.link.as_deref(),
            Some("https://nvidia.custhelp.com/app/answers/detail/a_id/5586")
        );
        assert_eq!(entry.updated.as_deref(), Some("2024-10-24T00:00:00.000Z"));
        assert_eq!(
            entry.summary,
            "Bulletin ID: 5586\n\
             Severity: High\n\
             CVE Identifier(s): CVE-2024-0117, CVE-2024-0118\n\
             Published: 22 Oct 2024\n\
             Last Updated: 24 Oct 2024"
        );
    }

    #[test]
    fn test_without_bulletin_id_uses_slug() {
        let body = r#"{"data": [{"title": "Notice: Apache Log4j", "publish date": "10 Dec 2021"}]}"#;
        let entry = harvest(body, BASE, 1.0).unwrap().remove(0).unwrap();
        assert_eq!(entry.id, "https://feeds.test/feeds/nvidia#Notice-Apache-Log4j");
        assert_eq!(entry.link, None);
        assert_eq!(entry.updated.as_deref(), Some("2021-12-10T00:00:00.000Z"));
        assert!(entry.summary.contains("Missing fields: bulletin id, severity"));
    }

    #[test]
    fn test_renamed_title_field_is_schema_break() {
        let body = r#"{"data": [{"name": "A"}, {"name": "B"}, {"title": "C"}]}"#;
        match harvest(body, BASE, 0.5) {
            Err(PipelineError::SchemaBreak(e)) => {
                assert_eq!(e.field, "title");
                assert_eq!(e.missing, 2);
            }
            other => panic!("expected schema break, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_data_key() {
        let err = harvest(r#"{"bulletins": []}"#, BASE, 0.5).unwrap_err();
        assert!(matches!(err, PipelineError::Structure(_)));
    }
}
