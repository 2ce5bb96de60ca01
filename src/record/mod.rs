//! Loosely typed upstream records.
//!
//! Every advisory source hands the pipeline JSON whose shape it does not
//! control. This module is the only place that touches those values:
//!
//! - [`RawRecord`] wraps one decoded JSON object and exposes type-checked
//!   field accessors. Absent, null, empty or mistyped fields come back as
//!   `None` instead of failing.
//! - [`detect_drift`] compares the fields a record carries against the
//!   fields a source expects, producing a [`SchemaDrift`] report that ends up
//!   in the entry summary.

mod drift;
mod extract;

pub use drift::{detect_drift, FieldSet, SchemaDrift};
pub use extract::{FieldKind, FieldValue, RawRecord};
