//! Red Hat Security Data API, CVEs for one package.

use serde_json::Value;
use url::form_urlencoded::byte_serialize;

use super::{records, upstream, Plan, PipelineError, Recipe, SourceKind};
use crate::config::SourceSettings;
use crate::feed::FeedEntry;
use crate::normalize::{EntryIdentity, Normalizer, RecordProfile, SummaryField};
use crate::record::{FieldSet, RawRecord};

const DEFAULT_UPSTREAM: &str = "https://access.redhat.com/hydra/rest/securitydata";
const HOME: &str = "https://access.redhat.com/security/security-updates/cve";
const CVE_PAGE: &str = "https://access.redhat.com/security/cve";

const PROFILE: RecordProfile = RecordProfile {
    identity_field: "CVE",
    sentinels: &[],
    summary_fields: &[
        SummaryField::text("severity", "Severity"),
        SummaryField::text("bugzilla_description", "Description"),
        SummaryField::text("cvss3_score", "CVSS3 Score"),
        SummaryField::text("cvss3_scoring_vector", "CVSS3 Vector"),
        SummaryField::text("cvss_score", "CVSS Score"),
        SummaryField::text("cvss_scoring_vector", "CVSS Vector"),
        SummaryField::text("CWE", "CWE"),
        SummaryField::comma_list("advisories", "Advisories"),
        SummaryField::bullets("affected_packages", "Affected packages"),
        SummaryField::text("bugzilla", "Bugzilla"),
        SummaryField::text("resource_url", "Resource"),
    ],
    date_fields: &["public_date"],
    fields: FieldSet::new(&[
        "CVE",
        "severity",
        "public_date",
        "advisories",
        "bugzilla",
        "bugzilla_description",
        "cvss_score",
        "cvss_scoring_vector",
        "CWE",
        "affected_packages",
        "package_state",
        "resource_url",
    ])
    // CVSS v3 data is missing from older CVEs
    .with_optional(&["cvss3_scoring_vector", "cvss3_score"]),
};

pub(super) fn plan(package: &str, settings: &SourceSettings) -> Plan {
    let package_query: String = byte_serialize(package.as_bytes()).collect();
    Plan::new(
        SourceKind::RedHat,
        Recipe::RedHat,
        format!(
            "{}/cve.json?package={}",
            upstream(settings, DEFAULT_UPSTREAM),
            package_query
        ),
        format!("RedHat {package} CVEs"),
        HOME,
    )
}

fn identify(record: &RawRecord<'_>, cve: &str, _updated: Option<&str>) -> EntryIdentity {
    let description = record
        .text("bugzilla_description")
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or("No description available");
    EntryIdentity {
        id: cve.to_string(),
        title: format!("{cve}: {description}"),
        link: Some(format!("{CVE_PAGE}/{cve}")),
    }
}

pub(super) fn harvest(body: &str, threshold: f64) -> Result<Vec<Option<FeedEntry>>, PipelineError> {
    let document: Value = serde_json::from_str(body)?;
    let normalizer = Normalizer::new(&PROFILE, identify);
    Ok(normalizer.normalize_all(records(&document, None)?, threshold)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plan_encodes_package() {
        let plan = plan("python-requests & co", &SourceSettings::default());
        assert_eq!(
            plan.data_url,
            "https://access.redhat.com/hydra/rest/securitydata/cve.json?package=python-requests+%26+co"
        );
        assert_eq!(plan.title, "RedHat python-requests & co CVEs");
    }

    #[test]
    fn test_plan_respects_upstream_override() {
        let settings = SourceSettings {
            upstream: Some("http://127.0.0.1:9999/securitydata/".into()),
            ..SourceSettings::default()
        };
        assert_eq!(
            plan("curl", &settings).data_url,
            "http://127.0.0.1:9999/securitydata/cve.json?package=curl"
        );
    }

    #[test]
    fn test_single_cve() {
        let body = r#"[{"CVE":"CVE-2021-1","bugzilla_description":"desc","public_date":"2021-01-01"}]"#;
        let entries: Vec<FeedEntry> = harvest(body, 0.5).unwrap().into_iter().flatten().collect();

        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.id, "CVE-2021-1");
        assert_eq!(entry.title, "CVE-2021-1: desc");
        assert_eq!(
            entry.link.as_deref(),
            Some("https://access.redhat.com/security/cve/CVE-2021-1")
        );
        assert_eq!(entry.updated.as_deref(), Some("2021-01-01T00:00:00.000Z"));
        assert!(entry.summary.starts_with("Description: desc\n\nSchema changes detected:"));
    }

    #[test]
    fn test_full_record_has_no_drift_note() {
        let body = r#"[{
            "CVE": "CVE-2023-32681",
            "severity": "moderate",
            "public_date": "2023-05-22T00:00:00Z",
            "advisories": ["RHSA-2023:4520", "RHSA-2023:4350"],
            "bugzilla": "2209469",
            "bugzilla_description": "python-requests: Unintended leak of Proxy-Authorization header",
            "cvss_score": null,
            "cvss_scoring_vector": null,
            "CWE": "CWE-200",
            "affected_packages": ["python-requests-0:2.25.1-7.el9"],
            "package_state": null,
            "resource_url": "https://access.redhat.com/hydra/rest/securitydata/cve/CVE-2023-32681.json",
            "cvss3_scoring_vector": "CVSS:3.1/AV:N/AC:H/PR:N/UI:R/S:C/C:H/I:N/A:N",
            "cvss3_score": "6.1"
        }]"#;
        let entry = harvest(body, 0.5).unwrap().remove(0).unwrap();
        assert_eq!(
            entry.summary,
            "Severity: moderate\n\
             Description: python-requests: Unintended leak of Proxy-Authorization header\n\
             CVSS3 Score: 6.1\n\
             CVSS3 Vector: CVSS:3.1/AV:N/AC:H/PR:N/UI:R/S:C/C:H/I:N/A:N\n\
             CWE: CWE-200\n\
             Advisories: RHSA-2023:4520, RHSA-2023:4350\n\
             Affected packages:\n\
             - python-requests-0:2.25.1-7.el9\n\
             Bugzilla: 2209469\n\
             Resource: https://access.redhat.com/hydra/rest/securitydata/cve/CVE-2023-32681.json"
        );
        assert_eq!(entry.updated.as_deref(), Some("2023-05-22T00:00:00.000Z"));
    }

    #[test]
    fn test_pre_cvss3_record_has_no_drift_note() {
        let body = r#"[{
            "CVE": "CVE-2014-0160",
            "severity": "important",
            "public_date": "2014-04-07T00:00:00Z",
            "advisories": ["RHSA-2014:0376"],
            "bugzilla": "1084875",
            "bugzilla_description": "openssl: information disclosure in handling of TLS heartbeat extension packets",
            "cvss_score": 5.0,
            "cvss_scoring_vector": "AV:N/AC:L/Au:N/C:P/I:N/A:N",
            "CWE": "CWE-119",
            "affected_packages": [],
            "package_state": null,
            "resource_url": "https://access.redhat.com/hydra/rest/securitydata/cve/CVE-2014-0160.json"
        }]"#;
        let entry = harvest(body, 0.5).unwrap().remove(0).unwrap();
        assert!(!entry.summary.contains("Schema changes"));
        assert!(entry.summary.contains("CVSS Score: 5.0
CVSS Vector: AV:N/AC:L/Au:N/C:P/I:N/A:N
"));
    }

    #[test]
    fn test_missing_description_title() {
        let entry = harvest(r#"[{"CVE":"CVE-2022-9"}]"#, 0.5).unwrap().remove(0).unwrap();
        assert_eq!(entry.title, "CVE-2022-9: No description available");
        assert_eq!(entry.updated, None);
    }

    #[test]
    fn test_empty_package_response() {
        assert!(harvest("[]", 0.5).unwrap().is_empty());
    }

    #[test]
    fn test_object_response_is_structure_error() {
        let err = harvest(r#"{"message":"Not found"}"#, 0.5).unwrap_err();
        assert!(matches!(err, PipelineError::Structure(_)));
    }
}
