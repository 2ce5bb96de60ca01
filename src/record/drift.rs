use super::RawRecord;

/// Fields a source knows about.
///
/// `expected` fields are reported when absent. `optional` fields are
/// recognized but never reported, whether present or not (Red Hat only
/// ships CVSS v3 data for newer CVEs, for example).
#[derive(Debug, Clone, Copy)]
pub struct FieldSet {
    pub expected: &'static [&'static str],
    pub optional: &'static [&'static str],
}

impl FieldSet {
    pub const fn new(expected: &'static [&'static str]) -> Self {
        Self {
            expected,
            optional: &[],
        }
    }

    pub const fn with_optional(self, optional: &'static [&'static str]) -> Self {
        Self {
            expected: self.expected,
            optional,
        }
    }

    fn knows(&self, name: &str) -> bool {
        self.expected.contains(&name) || self.optional.contains(&name)
    }
}

/// Difference between a record's fields and its source's [`FieldSet`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDrift {
    /// Present in the record but unknown to the source, in record order.
    pub unexpected: Vec<String>,
    /// Expected by the source but absent from the record, in declaration order.
    pub missing: Vec<String>,
}

impl SchemaDrift {
    pub fn is_empty(&self) -> bool {
        self.unexpected.is_empty() && self.missing.is_empty()
    }

    /// Human-readable block appended to entry summaries, `None` when the
    /// record matches its schema.
    pub fn annotation(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let mut text = String::from("Schema changes detected:\n");
        if !self.unexpected.is_empty() {
            text.push_str(&format!("Unexpected fields: {}\n", self.unexpected.join(", ")));
        }
        if !self.missing.is_empty() {
            text.push_str(&format!("Missing fields: {}\n", self.missing.join(", ")));
        }
        Some(text)
    }
}

/// Compares the record's field names against `fields`.
///
/// A field holding `null` counts as present. A renamed upstream field shows
/// up once in each list.
pub fn detect_drift(record: &RawRecord<'_>, fields: &FieldSet) -> SchemaDrift {
    let unexpected = record
        .field_names()
        .filter(|name| !fields.knows(name))
        .map(str::to_owned)
        .collect();
    let missing = fields
        .expected
        .iter()
        .filter(|name| !record.has_field(name))
        .map(|name| (*name).to_owned())
        .collect();

    SchemaDrift {
        unexpected,
        missing,
    }
}
