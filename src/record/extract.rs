use serde_json::{Map, Value};
use std::borrow::Cow;

/// Declared type of a field, checked by [`RawRecord::extract`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A non-empty JSON string.
    Text,
    /// A non-empty string or a number, rendered as text.
    Scalar,
    /// A non-empty array; scalar items are kept, anything else is dropped.
    List,
    /// A nested JSON object.
    Object,
}

/// A field value that passed its kind check.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Text(Cow<'a, str>),
    List(Vec<Cow<'a, str>>),
    Object(RawRecord<'a>),
}

/// Borrowed view over one upstream JSON object.
///
/// Lookups accept either an exact key or a dotted path into nested objects
/// (`commit.committer.date`). A numeric segment indexes into an array
/// (`description_data.0.value`). The exact key wins, so upstream keys that
/// contain dots still resolve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawRecord<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> RawRecord<'a> {
    pub fn new(fields: &'a Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Returns `None` for anything that is not a JSON object.
    pub fn from_value(value: &'a Value) -> Option<Self> {
        value.as_object().map(Self::new)
    }

    /// Field names in upstream order.
    pub fn field_names(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.fields.keys().map(String::as_str)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Raw JSON value at `path`, or `None` when any segment is missing.
    pub fn lookup(&self, path: &str) -> Option<&'a Value> {
        if let Some(value) = self.fields.get(path) {
            return Some(value);
        }
        if !path.contains('.') {
            return None;
        }

        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.fields.get(first)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Extracts `path` if it holds a value of the declared `kind`.
    ///
    /// Never fails: absent fields, `null`, empty strings, empty arrays and
    /// type mismatches all yield `None`.
    pub fn extract(&self, path: &str, kind: FieldKind) -> Option<FieldValue<'a>> {
        let value = self.lookup(path)?;
        match kind {
            FieldKind::Text => match value {
                Value::String(s) if !s.is_empty() => Some(FieldValue::Text(Cow::Borrowed(s))),
                _ => None,
            },
            FieldKind::Scalar => scalar_text(value).map(FieldValue::Text),
            FieldKind::List => {
                let items: Vec<_> = value.as_array()?.iter().filter_map(scalar_text).collect();
                if items.is_empty() {
                    None
                } else {
                    Some(FieldValue::List(items))
                }
            }
            FieldKind::Object => value.as_object().map(|o| FieldValue::Object(Self::new(o))),
        }
    }

    pub fn text(&self, path: &str) -> Option<&'a str> {
        match self.lookup(path)? {
            Value::String(s) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn scalar(&self, path: &str) -> Option<Cow<'a, str>> {
        match self.extract(path, FieldKind::Scalar)? {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn list(&self, path: &str) -> Option<Vec<Cow<'a, str>>> {
        match self.extract(path, FieldKind::List)? {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn object(&self, path: &str) -> Option<RawRecord<'a>> {
        match self.extract(path, FieldKind::Object)? {
            FieldValue::Object(record) => Some(record),
            _ => None,
        }
    }
}

fn scalar_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) if !s.is_empty() => Some(Cow::Borrowed(s.as_str())),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        _ => None,
    }
}
