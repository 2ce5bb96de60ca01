use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

static TAG_RE: OnceLock<Regex> = OnceLock::new();
static HREF_RE: OnceLock<Regex> = OnceLock::new();
static TAB_BREAK_RE: OnceLock<Regex> = OnceLock::new();
static NON_ALNUM_RE: OnceLock<Regex> = OnceLock::new();

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    // Patterns are compile-time constants; a failure here is a programming error
    // caught by the unit tests below.
    cell.get_or_init(|| Regex::new(pattern).expect("static regex must compile"))
}

/// Removes HTML tags, leaving their text content.
pub fn strip_tags(html: &str) -> Cow<'_, str> {
    regex(&TAG_RE, r"<[^>]+>").replace_all(html, "")
}

/// First `href` attribute value in an HTML fragment (single or double quoted).
pub fn first_href(html: &str) -> Option<&str> {
    regex(&HREF_RE, r#"href=(?:'([^']+)'|"([^"]+)")"#)
        .captures(html)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str())
}

/// Joins hard-wrapped paragraphs: a newline followed by tabs becomes one space.
pub fn collapse_tab_breaks(text: &str) -> Cow<'_, str> {
    regex(&TAB_BREAK_RE, r"\n\t+").replace_all(text, " ")
}

/// Replaces every run of non-alphanumeric ASCII characters with `-`.
pub fn slug(text: &str) -> String {
    regex(&NON_ALNUM_RE, r"[^a-zA-Z0-9]+")
        .replace_all(text, "-")
        .into_owned()
}

/// Truncates to at most `max_bytes`, backing off to a char boundary.
pub fn truncate_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Returns true for characters XML 1.0 can carry.
fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\u{9}' | '\u{A}' | '\u{D}'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

/// Drops characters that cannot appear in an XML 1.0 document, even escaped.
///
/// Upstream bodies are echoed into error entries verbatim, so a stray NUL or
/// form feed would otherwise make the whole Atom document unparseable.
/// Returns `Cow::Borrowed` when nothing needs removing.
pub fn strip_xml_invalid_chars(s: &str) -> Cow<'_, str> {
    if s.chars().all(is_xml_char) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|c| is_xml_char(*c)).collect())
}
