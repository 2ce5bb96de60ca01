use quick_xml::escape::escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

use super::model::Feed;
use super::RenderError;
use crate::util::strip_xml_invalid_chars;

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Renders an Atom 1.0 document.
///
/// Entries without a timestamp or link inherit the feed-level `updated` and
/// `link`, since Atom requires both. `<summary>` is left out for entries
/// with an empty summary. All text and attribute values are escaped for
/// `< > & ' "`, and characters XML 1.0 cannot carry are dropped.
pub fn render_atom(feed: &Feed) -> Result<String, RenderError> {
    let meta = &feed.metadata;
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    write(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;

    let mut root = BytesStart::new("feed");
    root.push_attribute(("xmlns", ATOM_NS));
    write(&mut writer, Event::Start(root))?;

    write(&mut writer, Event::Start(BytesStart::new("author")))?;
    write_text_element(&mut writer, "name", &meta.author)?;
    write(&mut writer, Event::End(BytesEnd::new("author")))?;

    write_text_element(&mut writer, "title", &meta.title)?;
    write_link(&mut writer, Some("self"), Some("application/atom+xml"), &meta.id)?;
    write_link(&mut writer, Some("alternate"), Some("text/html"), &meta.link)?;
    write_text_element(&mut writer, "updated", &meta.updated)?;
    write_text_element(&mut writer, "id", &meta.id)?;

    for entry in &feed.entries {
        write(&mut writer, Event::Start(BytesStart::new("entry")))?;
        write_text_element(&mut writer, "id", &entry.id)?;
        write_text_element(&mut writer, "title", &entry.title)?;
        write_text_element(
            &mut writer,
            "updated",
            entry.updated.as_deref().unwrap_or(&meta.updated),
        )?;
        write_link(
            &mut writer,
            None,
            None,
            entry.link.as_deref().unwrap_or(&meta.link),
        )?;
        if !entry.summary.is_empty() {
            write_text_element(&mut writer, "summary", &entry.summary)?;
        }
        write(&mut writer, Event::End(BytesEnd::new("entry")))?;
    }

    write(&mut writer, Event::End(BytesEnd::new("feed")))?;

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| RenderError::Xml(e.to_string()))
}

fn write(writer: &mut XmlWriter, event: Event<'_>) -> Result<(), RenderError> {
    writer
        .write_event(event)
        .map_err(|e| RenderError::Xml(e.to_string()))
}

fn write_text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<(), RenderError> {
    let clean = strip_xml_invalid_chars(text);
    write(writer, Event::Start(BytesStart::new(name)))?;
    // BytesText::new only escapes `<`, `>` and `&`; quotes are escaped too so
    // every value is treated the same whether it lands in text or attributes.
    write(writer, Event::Text(BytesText::from_escaped(escape(clean.as_ref()))))?;
    write(writer, Event::End(BytesEnd::new(name)))
}

fn write_link(
    writer: &mut XmlWriter,
    rel: Option<&str>,
    media_type: Option<&str>,
    href: &str,
) -> Result<(), RenderError> {
    let href = strip_xml_invalid_chars(href);
    let mut link = BytesStart::new("link");
    if let Some(rel) = rel {
        link.push_attribute(("rel", rel));
    }
    if let Some(media_type) = media_type {
        link.push_attribute(("type", media_type));
    }
    link.push_attribute(("href", href.as_ref()));
    write(writer, Event::Empty(link))
}
