//! Record → [`FeedEntry`] normalization shared by every JSON source.
//!
//! A source describes its upstream schema once as a [`RecordProfile`]
//! (identity field, summary fields, date candidates, known field set) and
//! supplies a small closure that turns the identity into an id, title and
//! link. [`Normalizer`] runs the same algorithm for all of them:
//!
//! 1. identity lookup, skipping records without one or holding a sentinel
//! 2. summary assembly from the ordered field list
//! 3. first parseable date becomes `updated`
//! 4. schema drift appended to the summary
//! 5. entry built from the source's identity closure

use serde_json::Value;
use thiserror::Error;

use crate::feed::FeedEntry;
use crate::record::{detect_drift, FieldSet, RawRecord};
use crate::util::{collapse_tab_breaks, normalize_date, truncate_bytes};

/// Default share of records allowed to lack their identity before the
/// response is treated as a schema break.
pub const DEFAULT_MISSING_IDENTITY_THRESHOLD: f64 = 0.5;

const SAMPLE_RECORD_BYTES: usize = 500;

/// How a summary field is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRender {
    /// `Label: value`, value a string or number.
    Text,
    /// `Label: a, b, c`; a plain scalar is accepted as-is.
    CommaList,
    /// `Label:` followed by one `- item` line per element.
    BulletList,
    /// `Label: value` where value is a scalar under the given key of a nested object.
    Nested(&'static str),
    /// Unlabeled block of text with tab-indented line breaks joined.
    Paragraph,
}

/// One entry in a source's ordered summary field list.
#[derive(Debug, Clone, Copy)]
pub struct SummaryField {
    pub key: &'static str,
    pub label: &'static str,
    pub render: FieldRender,
}

impl SummaryField {
    pub const fn text(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            render: FieldRender::Text,
        }
    }

    pub const fn comma_list(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            render: FieldRender::CommaList,
        }
    }

    pub const fn bullets(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            render: FieldRender::BulletList,
        }
    }

    pub const fn nested(key: &'static str, sub_key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            render: FieldRender::Nested(sub_key),
        }
    }

    pub const fn paragraph(key: &'static str) -> Self {
        Self {
            key,
            label: "",
            render: FieldRender::Paragraph,
        }
    }

    /// Rendered line(s) for this field, or `None` when the record lacks it.
    fn render(&self, record: &RawRecord<'_>) -> Option<String> {
        match self.render {
            FieldRender::Text => record
                .scalar(self.key)
                .map(|v| format!("{}: {}\n", self.label, v)),
            FieldRender::CommaList => {
                let joined = match record.list(self.key) {
                    Some(items) => items.join(", "),
                    None => record.scalar(self.key)?.into_owned(),
                };
                Some(format!("{}: {}\n", self.label, joined))
            }
            FieldRender::BulletList => {
                let items = record
                    .list(self.key)
                    .or_else(|| record.scalar(self.key).map(|v| vec![v]))?;
                let mut text = format!("{}:\n", self.label);
                for item in items {
                    text.push_str(&format!("- {item}\n"));
                }
                Some(text)
            }
            FieldRender::Nested(sub_key) => record
                .object(self.key)?
                .scalar(sub_key)
                .map(|v| format!("{}: {}\n", self.label, v)),
            FieldRender::Paragraph => {
                let text = record.text(self.key)?;
                let text = collapse_tab_breaks(text.trim());
                if text.is_empty() {
                    None
                } else {
                    Some(format!("{text}\n"))
                }
            }
        }
    }
}

/// Static description of one upstream record schema.
#[derive(Debug, Clone, Copy)]
pub struct RecordProfile {
    /// Field whose value identifies the record. Required.
    pub identity_field: &'static str,
    /// Identity values that mark placeholder rows rather than real records.
    pub sentinels: &'static [&'static str],
    /// Summary content, in output order.
    pub summary_fields: &'static [SummaryField],
    /// Date candidates, first parseable one wins. Dotted paths allowed.
    pub date_fields: &'static [&'static str],
    /// Known top-level fields, for drift detection.
    pub fields: FieldSet,
}

/// Id, title and link derived by a source from a record's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryIdentity {
    pub id: String,
    pub title: String,
    pub link: Option<String>,
}

/// Why a record produced no entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Identity field absent, empty, mistyped, or the record is not an object.
    MissingIdentity,
    /// Identity holds a known placeholder value.
    Sentinel,
}

/// Result of normalizing one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Entry(FeedEntry),
    Skipped(SkipReason),
}

impl Outcome {
    pub fn into_entry(self) -> Option<FeedEntry> {
        match self {
            Outcome::Entry(entry) => Some(entry),
            Outcome::Skipped(_) => None,
        }
    }
}

/// Too many records lacked their identity field for this to be a few bad
/// rows; the upstream schema most likely changed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "{missing} of {total} records lack required field '{field}' (threshold {threshold}); \
     upstream schema likely changed. First such record: {sample}"
)]
pub struct SchemaBreak {
    pub field: &'static str,
    pub missing: usize,
    pub total: usize,
    pub threshold: f64,
    pub sample: String,
}

/// Applies a [`RecordProfile`] plus a source-specific identity builder.
///
/// The builder receives the record, its identity value and the normalized
/// `updated` timestamp (some sources fold the date into the id).
pub struct Normalizer<'p, F> {
    profile: &'p RecordProfile,
    identify: F,
}

impl<'p, F> Normalizer<'p, F>
where
    F: Fn(&RawRecord<'_>, &str, Option<&str>) -> EntryIdentity,
{
    pub fn new(profile: &'p RecordProfile, identify: F) -> Self {
        Self { profile, identify }
    }

    /// Normalizes a single record. Never fails.
    pub fn normalize(&self, value: &Value) -> Outcome {
        let Some(record) = RawRecord::from_value(value) else {
            return Outcome::Skipped(SkipReason::MissingIdentity);
        };
        let Some(identity) = record.scalar(self.profile.identity_field) else {
            return Outcome::Skipped(SkipReason::MissingIdentity);
        };
        if self.profile.sentinels.contains(&identity.as_ref()) {
            return Outcome::Skipped(SkipReason::Sentinel);
        }

        let mut summary = String::new();
        for field in self.profile.summary_fields {
            if let Some(text) = field.render(&record) {
                summary.push_str(&text);
            }
        }

        let updated = self
            .profile
            .date_fields
            .iter()
            .filter_map(|field| record.scalar(field))
            .find_map(|raw| normalize_date(&raw));

        if let Some(annotation) = detect_drift(&record, &self.profile.fields).annotation() {
            summary.push('\n');
            summary.push_str(&annotation);
        }

        let EntryIdentity { id, title, link } = (self.identify)(&record, &identity, updated.as_deref());
        Outcome::Entry(FeedEntry {
            id,
            title,
            link,
            updated,
            summary: summary.trim().to_string(),
        })
    }

    /// Normalizes every record in a response.
    ///
    /// Records missing their identity are skipped, unless more than
    /// `threshold` of all records are missing it, which aborts with
    /// [`SchemaBreak`]. A threshold of `1.0` or more never aborts.
    pub fn normalize_all(
        &self,
        values: &[Value],
        threshold: f64,
    ) -> Result<Vec<Option<FeedEntry>>, SchemaBreak> {
        let mut missing = 0usize;
        let mut first_missing: Option<&Value> = None;
        let mut results = Vec::with_capacity(values.len());

        for value in values {
            let outcome = self.normalize(value);
            match &outcome {
                Outcome::Skipped(SkipReason::MissingIdentity) => {
                    missing += 1;
                    first_missing.get_or_insert(value);
                    tracing::debug!(
                        field = self.profile.identity_field,
                        "Skipping record without identity"
                    );
                }
                Outcome::Skipped(SkipReason::Sentinel) => {
                    tracing::debug!(
                        field = self.profile.identity_field,
                        "Skipping placeholder record"
                    );
                }
                Outcome::Entry(_) => {}
            }
            results.push(outcome.into_entry());
        }

        let total = values.len();
        if total > 0 && (missing as f64) / (total as f64) > threshold {
            let sample = first_missing.map(Value::to_string).unwrap_or_default();
            return Err(SchemaBreak {
                field: self.profile.identity_field,
                missing,
                total,
                threshold,
                sample: truncate_bytes(&sample, SAMPLE_RECORD_BYTES).to_string(),
            });
        }
        if missing > 0 {
            tracing::warn!(
                field = self.profile.identity_field,
                missing = missing,
                total = total,
                "Records without identity skipped"
            );
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const PROFILE: RecordProfile = RecordProfile {
        identity_field: "id",
        sentinels: &["Identifier"],
        summary_fields: &[
            SummaryField::text("severity", "Severity"),
            SummaryField::comma_list("versions", "Versions"),
            SummaryField::bullets("packages", "Packages"),
            SummaryField::nested("cvss", "score", "CVSS Score"),
            SummaryField::paragraph("details"),
        ],
        date_fields: &["updated_at", "published_at"],
        fields: FieldSet::new(&[
            "id",
            "severity",
            "versions",
            "packages",
            "cvss",
            "details",
            "updated_at",
            "published_at",
        ]),
    };

    fn identify(_: &RawRecord<'_>, identity: &str, _: Option<&str>) -> EntryIdentity {
        EntryIdentity {
            id: format!("urn:{identity}"),
            title: identity.to_string(),
            link: None,
        }
    }

    fn normalizer() -> Normalizer<'static, fn(&RawRecord<'_>, &str, Option<&str>) -> EntryIdentity> {
        Normalizer::new(&PROFILE, identify)
    }

    fn entry_of(value: serde_json::Value) -> FeedEntry {
        match normalizer().normalize(&value) {
            Outcome::Entry(entry) => entry,
            other => panic!("expected entry, got {other:?}"),
        }
    }

    #[test]
    fn test_full_record() {
        let entry = entry_of(json!({
            "id": "A-1",
            "severity": "High",
            "versions": ["1.0", "1.1"],
            "packages": ["pkg-a", "pkg-b"],
            "cvss": {"score": 9.1, "vector": "AV:N"},
            "details": "Line one\n\t\tcontinues",
            "updated_at": "not a date",
            "published_at": "2024-02-03T04:05:06Z"
        }));
        assert_eq!(entry.id, "urn:A-1");
        assert_eq!(entry.updated.as_deref(), Some("2024-02-03T04:05:06.000Z"));
        assert_eq!(
            entry.summary,
            "Severity: High\nVersions: 1.0, 1.1\nPackages:\n- pkg-a\n- pkg-b\nCVSS Score: 9.1\nLine one continues"
        );
    }

    #[test]
    fn test_mistyped_fields_are_omitted() {
        let entry = entry_of(json!({
            "id": 42,
            "severity": {"level": "high"},
            "versions": "2.0",
            "packages": [],
            "cvss": "9.8",
            "details": ["not", "text"],
            "updated_at": null,
            "published_at": "2024-01-01"
        }));
        assert_eq!(entry.id, "urn:42");
        assert_eq!(entry.summary, "Versions: 2.0");
        assert_eq!(entry.updated.as_deref(), Some("2024-01-01T00:00:00.000Z"));
    }

    #[test]
    fn test_malformed_date_leaves_updated_absent() {
        let entry = entry_of(json!({"id": "A", "updated_at": "2024-99-99", "published_at": "soon"}));
        assert_eq!(entry.updated, None);
    }

    #[test]
    fn test_drift_appended() {
        let entry = entry_of(json!({"id": "A", "severity": "Low", "brand_new": 1}));
        assert!(entry.summary.starts_with("Severity: Low\n\nSchema changes detected:\n"));
        assert!(entry.summary.contains("Unexpected fields: brand_new"));
        assert!(entry.summary.ends_with(
            "Missing fields: versions, packages, cvss, details, updated_at, published_at"
        ));
    }

    #[test]
    fn test_skips() {
        let n = normalizer();
        assert_eq!(
            n.normalize(&json!({"severity": "x"})),
            Outcome::Skipped(SkipReason::MissingIdentity)
        );
        assert_eq!(
            n.normalize(&json!({"id": ""})),
            Outcome::Skipped(SkipReason::MissingIdentity)
        );
        assert_eq!(
            n.normalize(&json!("string record")),
            Outcome::Skipped(SkipReason::MissingIdentity)
        );
        assert_eq!(
            n.normalize(&json!({"id": "Identifier"})),
            Outcome::Skipped(SkipReason::Sentinel)
        );
    }

    #[test]
    fn test_threshold_tolerates_a_few_missing() {
        let values = vec![json!({"id": "a"}), json!({"id": "b"}), json!({"nope": 1})];
        let results = normalizer().normalize_all(&values, 0.5).unwrap();
        assert_eq!(results.iter().flatten().count(), 2);
    }

    #[test]
    fn test_threshold_exceeded_is_schema_break() {
        let values = vec![json!({"id": "a"}), json!({"ID": "b"}), json!({"ID": "c"})];
        let err = normalizer().normalize_all(&values, 0.5).unwrap_err();
        assert_eq!(err.missing, 2);
        assert_eq!(err.total, 3);
        assert_eq!(err.sample, r#"{"ID":"b"}"#);
        assert!(err.to_string().contains("lack required field 'id'"));
    }

    #[test]
    fn test_threshold_one_never_aborts() {
        let values = vec![json!({"ID": "a"}), json!({"ID": "b"})];
        let results = normalizer().normalize_all(&values, 1.0).unwrap();
        assert!(results.iter().all(Option::is_none));
    }

    #[test]
    fn test_sentinels_do_not_count_as_missing() {
        let values = vec![json!({"id": "Identifier"}), json!({"id": "Identifier"}), json!({"id": "x"})];
        let results = normalizer().normalize_all(&values, 0.0).unwrap();
        assert_eq!(results.iter().flatten().count(), 1);
    }

    #[test]
    fn test_empty_response_is_fine() {
        assert!(normalizer().normalize_all(&[], 0.0).unwrap().is_empty());
    }
}
