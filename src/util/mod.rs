//! Small helpers shared by the sources and renderers.
//!
//! - **Dates**: tolerant parsing of upstream timestamps and the canonical
//!   ISO-8601 form used for entry ordering
//! - **Text**: HTML tag stripping, link extraction, slugs, and XML-safe
//!   character filtering
//! - **URL validation**: refuses internal addresses supplied by clients

mod date;
mod text;
mod url_validator;

pub use date::{format_iso, normalize_date, parse_date};
pub use text::{
    collapse_tab_breaks, first_href, slug, strip_tags, strip_xml_invalid_chars, truncate_bytes,
};
pub use url_validator::{validate_upstream_url, UrlValidationError};
