//! NIST National Vulnerability Database, CVEs matching one CPE string.

use serde_json::Value;
use url::form_urlencoded;

use super::{records, upstream, Params, Plan, PipelineError, Recipe, SourceKind};
use crate::config::SourceSettings;
use crate::feed::FeedEntry;
use crate::normalize::{EntryIdentity, Normalizer, RecordProfile, SummaryField};
use crate::record::{FieldSet, RawRecord};

const DEFAULT_UPSTREAM: &str = "https://services.nvd.nist.gov/rest/json/cves/1.0";
const HOME: &str = "https://nvd.nist.gov/vuln/search";
const DETAIL_PAGE: &str = "https://nvd.nist.gov/vuln/detail";

const DESCRIPTION: &str = "cve.description.description_data.0.value";

const PROFILE: RecordProfile = RecordProfile {
    identity_field: "cve.CVE_data_meta.ID",
    sentinels: &[],
    summary_fields: &[
        SummaryField::text(DESCRIPTION, "Description"),
        SummaryField::text("impact.baseMetricV3.cvssV3.baseSeverity", "Severity"),
        SummaryField::text("impact.baseMetricV3.cvssV3.baseScore", "CVSS3 Score"),
        SummaryField::text("impact.baseMetricV3.cvssV3.vectorString", "CVSS3 Vector"),
        SummaryField::text("impact.baseMetricV2.cvssV2.baseScore", "CVSS2 Score"),
        SummaryField::text("cve.problemtype.problemtype_data.0.description.0.value", "CWE"),
        SummaryField::text("publishedDate", "Published"),
    ],
    date_fields: &["lastModifiedDate", "publishedDate"],
    fields: FieldSet::new(&["cve", "configurations", "impact", "publishedDate", "lastModifiedDate"]),
};

/// Parameters that select the output feed rather than the NVD query.
const LOCAL_PARAMS: &[&str] = &["cpeMatchString", "format", "feed"];

/// `cpeMatchString` first, then every other request parameter (`resultsPerPage`,
/// `modStartDate`, ...) in key order.
pub(super) fn plan(cpe_match: &str, params: &Params, settings: &SourceSettings) -> Plan {
    let mut extra: Vec<(&String, &String)> = params
        .iter()
        .filter(|(name, _)| !LOCAL_PARAMS.contains(&name.as_str()))
        .collect();
    extra.sort();
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("cpeMatchString", cpe_match)
        .extend_pairs(extra)
        .finish();
    Plan::new(
        SourceKind::Nvd,
        Recipe::Nvd,
        format!("{}?{query}", upstream(settings, DEFAULT_UPSTREAM)),
        format!("NVD {cpe_match} CVEs"),
        HOME,
    )
}

fn identify(record: &RawRecord<'_>, cve: &str, _updated: Option<&str>) -> EntryIdentity {
    let title = match record.text(DESCRIPTION).map(str::trim) {
        Some(description) if !description.is_empty() => format!("{cve}: {description}"),
        _ => cve.to_string(),
    };
    EntryIdentity {
        id: cve.to_string(),
        title,
        link: Some(format!("{DETAIL_PAGE}/{cve}")),
    }
}

pub(super) fn harvest(body: &str, threshold: f64) -> Result<Vec<Option<FeedEntry>>, PipelineError> {
    let document: Value = serde_json::from_str(body)?;
    let result = document
        .get("result")
        .ok_or_else(|| PipelineError::Structure("no 'result' field in response".into()))?;
    let normalizer = Normalizer::new(&PROFILE, identify);
    Ok(normalizer.normalize_all(records(result, Some("CVE_Items"))?, threshold)?)
}
