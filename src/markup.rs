//! XHTML loader for the element tree.

use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::dom::{Document, ElementId};
use crate::error::{Error, Result};

pub fn load(path: impl AsRef<Path>) -> Result<Document> {
    let source = std::fs::read_to_string(path)?;
    parse(&source)
}

/// Parses well-formed XHTML into a [`Document`]. Whitespace-only text between
/// tags is dropped; comments, processing instructions and the doctype are
/// ignored.
pub fn parse(source: &str) -> Result<Document> {
    let mut reader = Reader::from_str(source);

    let mut doc = Document::new();
    let mut stack: Vec<ElementId> = Vec::new();
    // Text and references arrive as separate events; a run is only complete at
    // the next tag.
    let mut run = String::new();

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(err) => {
                return Err(Error::Markup {
                    position: reader.error_position() as u64,
                    message: err.to_string(),
                });
            }
        };
        let position = reader.buffer_position() as u64;
        match event {
            Event::Start(ref tag) => {
                flush_run(&mut doc, stack.last().copied(), &mut run);
                let id = open_element(&mut doc, stack.last().copied(), tag, position)?;
                stack.push(id);
            }
            Event::Empty(ref tag) => {
                flush_run(&mut doc, stack.last().copied(), &mut run);
                open_element(&mut doc, stack.last().copied(), tag, position)?;
            }
            Event::End(_) => {
                flush_run(&mut doc, stack.last().copied(), &mut run);
                if stack.pop().is_none() {
                    return Err(markup_error(position, "closing tag without an open element"));
                }
            }
            Event::Text(ref text) => run.push_str(&utf8(text, position)?),
            Event::CData(ref data) => run.push_str(&utf8(data, position)?),
            Event::GeneralRef(ref reference) => {
                let name = utf8(reference, position)?;
                let resolved = resolve_entity(&name).ok_or_else(|| {
                    markup_error(position, format!("unknown entity `&{name};`"))
                })?;
                run.push(resolved);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(&open) = stack.last() {
        return Err(markup_error(
            reader.buffer_position() as u64,
            format!("unclosed element {}", doc.describe(open)),
        ));
    }
    if doc.is_empty() {
        return Err(markup_error(0, "no root element found"));
    }
    Ok(doc)
}

fn flush_run(doc: &mut Document, parent: Option<ElementId>, run: &mut String) {
    // `&nbsp;` alone still counts as content.
    let blank = run.bytes().all(|b| b.is_ascii_whitespace());
    match parent {
        Some(parent) if !blank => doc.append_text(parent, run),
        _ => {}
    }
    run.clear();
}

fn open_element(
    doc: &mut Document,
    parent: Option<ElementId>,
    tag: &BytesStart<'_>,
    position: u64,
) -> Result<ElementId> {
    let name = utf8(tag.name().as_ref(), position)?;
    let id = doc.create_element(&name, parent);
    for attr in tag.attributes() {
        let attr = attr.map_err(|err| markup_error(position, err.to_string()))?;
        let key = utf8(attr.key.as_ref(), position)?;
        let raw = utf8(&attr.value, position)?;
        let value = quick_xml::escape::unescape(&raw)
            .map_err(|err| markup_error(position, err.to_string()))?;
        doc.set_attribute(id, &key, &value);
    }
    Ok(id)
}

fn utf8(bytes: &[u8], position: u64) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| markup_error(position, "invalid UTF-8"))
}

fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}

fn markup_error(position: u64, message: impl Into<String>) -> Error {
    Error::Markup {
        position,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_tree_with_classes_and_data_attributes() {
        let doc = parse(
            r#"<!DOCTYPE html>
<html>
  <body class="loading">
    <div class="details">
      <div class="details__item" data-direction="btt"><div class="details__inner">Hi</div></div>
      <img class="slide__img" data-src="img/1.jpg"/>
    </div>
  </body>
</html>"#,
        )
        .unwrap();

        let body = doc.body().unwrap();
        assert_eq!(doc.element(body).tag(), "body");
        assert!(doc.has_class(body, "loading"));
        let item = doc.query(body, "details__item").unwrap();
        assert_eq!(doc.element(item).data("direction"), Some("btt"));
        let inner = doc.require(item, "details__inner").unwrap();
        assert_eq!(doc.text(inner), "Hi");
        let img = doc.query(body, "slide__img").unwrap();
        assert_eq!(doc.element(img).attribute("data-src"), Some("img/1.jpg"));
        assert!(doc.element(img).children().is_empty());
    }

    #[test]
    fn resolves_entities_in_text_and_attributes() {
        let doc = parse(r#"<p title="a &amp; b">Salt &amp; Pepper &#x2014; 1&#48;</p>"#).unwrap();
        let root = doc.root().unwrap();
        assert_eq!(doc.element(root).attribute("title"), Some("a & b"));
        assert_eq!(doc.text(root), "Salt & Pepper \u{2014} 10");
    }

    #[test]
    fn keeps_spaces_around_entities_and_drops_indentation() {
        let doc = parse(
            r#"<div>
  <h3 class="slide__title">Salt &amp; Pepper</h3>
  <span class="pair">&lt; &gt;</span>
</div>"#,
        )
        .unwrap();
        let root = doc.root().unwrap();
        assert_eq!(doc.text(root), "");
        let title = doc.require(root, "slide__title").unwrap();
        assert_eq!(doc.text(title), "Salt & Pepper");
        let pair = doc.require(root, "pair").unwrap();
        assert_eq!(doc.text(pair), "< >");
    }

    #[test]
    fn rejects_mismatched_tags() {
        let err = parse("<div><span></div>").unwrap_err();
        assert!(matches!(err, Error::Markup { .. }), "{err}");
    }

    #[test]
    fn rejects_unclosed_elements() {
        assert!(parse("<div><span></span>").is_err());
    }

    #[test]
    fn rejects_empty_input() {
        assert!(parse("   ").is_err());
    }
}
