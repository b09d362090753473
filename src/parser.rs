//! Positional XML parser.
//!
//! Drives a `quick_xml::Reader` over the decoded text and converts the
//! event stream into the arena tree, recording a source range for every
//! node plus separate tag-name, start-tag, and end-tag ranges for
//! elements. Ranges are computed from `buffer_position()` deltas: with
//! text trimming disabled the event stream covers every byte, so each
//! event's extent is exactly the span between consecutive reader
//! positions.
//!
//! One fatal well-formedness error aborts the whole build; the parser
//! never returns a partial tree.

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::Event;

use crate::error::ParseError;
use crate::model::{Attribute, Document, Node, NodeId, NodeKind};
use crate::source::SourceFile;

/// Parse a source file into a position-annotated document.
pub fn parse(source: SourceFile) -> Result<Document, ParseError> {
    // The reader needs its own copy of the text: `source` moves into the
    // document while the event loop is still running.
    let text = source.text().to_string();
    let mut doc = Document::new(source);
    let mut reader = Reader::from_str(&text);
    reader.config_mut().check_end_names = true;

    let mut stack: Vec<NodeId> = vec![doc.root()];
    let mut pos = 0usize;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                let offset = reader.error_position() as usize;
                return Err(ParseError::new(
                    doc.source().position_at(offset),
                    e.to_string(),
                ));
            }
        };
        let end = reader.buffer_position() as usize;

        match event {
            Event::Decl(_) => {
                // <?xml version="1.0" encoding="..."?>
                let attributes = scan_attributes(&doc, &text, pos + 5, end - 2)?;
                let range = doc.source().range(pos, end);
                let node = doc.alloc(Node::new(NodeKind::Prolog { attributes }, range));
                let parent = *stack.last().unwrap_or(&NodeId::NONE);
                doc.append(parent, node);
            }
            Event::Start(e) => {
                let node = build_element(&mut doc, &text, &e, pos, end, false)?;
                push_element(&mut doc, &stack, node, pos)?;
                stack.push(node);
            }
            Event::Empty(e) => {
                let node = build_element(&mut doc, &text, &e, pos, end, true)?;
                push_element(&mut doc, &stack, node, pos)?;
            }
            Event::End(_) => {
                // Name mismatches were already rejected by the reader.
                if stack.len() <= 1 {
                    return Err(ParseError::new(
                        doc.source().position_at(pos),
                        "unexpected closing tag",
                    ));
                }
                let id = stack.pop().unwrap_or(NodeId::NONE);
                let end_range = doc.source().range(pos, end);
                let node = doc.node_mut(id);
                node.range.end = end_range.end;
                if let NodeKind::Element { end_tag_range, .. } = &mut node.kind {
                    *end_tag_range = Some(end_range);
                }
            }
            Event::Text(e) => {
                // Entity references arrive as separate GeneralRef events,
                // so text content needs no decoding.
                let content = String::from_utf8_lossy(e.as_ref()).into_owned();
                append_leaf(&mut doc, &stack, NodeKind::Text(content), pos, end);
            }
            Event::CData(e) => {
                let content = String::from_utf8_lossy(e.as_ref()).into_owned();
                append_leaf(&mut doc, &stack, NodeKind::CData(content), pos, end);
            }
            Event::Comment(e) => {
                let content = String::from_utf8_lossy(e.as_ref()).into_owned();
                append_leaf(&mut doc, &stack, NodeKind::Comment(content), pos, end);
            }
            Event::DocType(e) => {
                let content = String::from_utf8_lossy(e.as_ref()).trim().to_string();
                append_leaf(&mut doc, &stack, NodeKind::DocType(content), pos, end);
            }
            Event::GeneralRef(e) => {
                let name = String::from_utf8_lossy(e.as_ref()).into_owned();
                let resolved = resolve_entity(&name).ok_or_else(|| {
                    ParseError::new(
                        doc.source().position_at(pos),
                        format!("undefined entity reference \"&{name};\""),
                    )
                })?;
                append_leaf(
                    &mut doc,
                    &stack,
                    NodeKind::EntityRef { name, resolved },
                    pos,
                    end,
                );
            }
            // Processing instructions carry no analysis value here.
            Event::PI(_) => {}
            Event::Eof => {
                if stack.len() > 1 {
                    let unclosed = stack
                        .last()
                        .and_then(|&id| doc.element_name(id))
                        .unwrap_or("?")
                        .to_string();
                    return Err(ParseError::new(
                        doc.source().position_at(end),
                        format!("unexpected end of file, element <{unclosed}> is not closed"),
                    ));
                }
                if doc.root_element().is_none() {
                    return Err(ParseError::new(
                        doc.source().position_at(end),
                        "no root element found",
                    ));
                }
                break;
            }
        }

        pos = end;
    }

    Ok(doc)
}

/// Build an element node from a start or empty tag event.
fn build_element(
    doc: &mut Document,
    text: &str,
    event: &quick_xml::events::BytesStart<'_>,
    pos: usize,
    end: usize,
    self_closing: bool,
) -> Result<NodeId, ParseError> {
    let name = String::from_utf8_lossy(event.name().as_ref()).into_owned();
    let name_start = pos + 1;
    let name_range = doc.source().range(name_start, name_start + name.len());

    let attrs_end = if self_closing { end - 2 } else { end - 1 };
    let attributes = scan_attributes(doc, text, name_start + name.len(), attrs_end)?;

    for attr in &attributes {
        if attr.name == "xmlns" {
            doc.register_namespace(String::new(), attr.value.clone());
        } else if let Some(prefix) = attr.name.strip_prefix("xmlns:") {
            doc.register_namespace(prefix.to_string(), attr.value.clone());
        }
    }

    let range = doc.source().range(pos, end);
    let node = doc.alloc(Node::new(
        NodeKind::Element {
            name,
            name_range,
            start_tag_range: range,
            end_tag_range: None,
            attributes,
        },
        range,
    ));

    // The id index points at elements by their id/xml:id attribute.
    let id_value = doc
        .attribute(node, "id")
        .or_else(|| doc.attribute(node, "xml:id"))
        .map(|attr| attr.value.clone());
    if let Some(value) = id_value {
        doc.register_id(value, node);
    }

    Ok(node)
}

/// Attach an element under the current open element, rejecting a second
/// top-level element.
fn push_element(
    doc: &mut Document,
    stack: &[NodeId],
    node: NodeId,
    pos: usize,
) -> Result<(), ParseError> {
    let parent = *stack.last().unwrap_or(&NodeId::NONE);
    if stack.len() == 1 && doc.root_element().is_some() {
        return Err(ParseError::new(
            doc.source().position_at(pos),
            "only one root element is allowed",
        ));
    }
    doc.append(parent, node);
    Ok(())
}

fn append_leaf(doc: &mut Document, stack: &[NodeId], kind: NodeKind, pos: usize, end: usize) {
    let range = doc.source().range(pos, end);
    let node = doc.alloc(Node::new(kind, range));
    let parent = *stack.last().unwrap_or(&NodeId::NONE);
    doc.append(parent, node);
}

/// Scan `name="value"` pairs in the raw tag slice `text[start..end]`.
///
/// The reader does not expose per-attribute offsets, so ranges are
/// recovered here; values are entity-decoded but the recorded ranges span
/// the undecoded source (quotes included).
fn scan_attributes(
    doc: &Document,
    text: &str,
    start: usize,
    end: usize,
) -> Result<Vec<Attribute>, ParseError> {
    let bytes = text.as_bytes();
    let mut attrs = Vec::new();
    let mut i = start;

    while i < end {
        while i < end && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= end {
            break;
        }

        let name_start = i;
        while i < end && !bytes[i].is_ascii_whitespace() && bytes[i] != b'=' {
            i += 1;
        }
        if i == name_start {
            return Err(ParseError::new(
                doc.source().position_at(i),
                "malformed attribute name",
            ));
        }
        let name_end = i;

        while i < end && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= end || bytes[i] != b'=' {
            return Err(ParseError::new(
                doc.source().position_at(name_start),
                format!("expected '=' after attribute \"{}\"", &text[name_start..name_end]),
            ));
        }
        i += 1;
        while i < end && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= end || (bytes[i] != b'"' && bytes[i] != b'\'') {
            return Err(ParseError::new(
                doc.source().position_at(i.min(end)),
                "attribute value must be quoted",
            ));
        }

        let quote = bytes[i];
        let value_start = i;
        i += 1;
        let inner_start = i;
        while i < end && bytes[i] != quote {
            i += 1;
        }
        if i >= end {
            return Err(ParseError::new(
                doc.source().position_at(value_start),
                "unterminated attribute value",
            ));
        }
        let inner_end = i;
        i += 1;

        let raw_value = &text[inner_start..inner_end];
        let value = unescape(raw_value)
            .map_err(|e| {
                ParseError::new(
                    doc.source().position_at(inner_start),
                    format!("invalid reference in attribute value: {e}"),
                )
            })?
            .into_owned();

        attrs.push(Attribute {
            name: text[name_start..name_end].to_string(),
            value,
            name_range: doc.source().range(name_start, name_end),
            value_range: doc.source().range(value_start, i),
        });
    }

    Ok(attrs)
}

/// Resolve an XML entity or character reference name to its replacement
/// text (e.g. `amp` -> `&`, `#x41` -> `A`).
pub(crate) fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    if let Some(hex) = entity.strip_prefix("#x") {
        if let Ok(code) = u32::from_str_radix(hex, 16)
            && let Some(c) = char::from_u32(code)
        {
            return Some(c.to_string());
        }
    } else if let Some(dec) = entity.strip_prefix('#')
        && let Ok(code) = dec.parse::<u32>()
        && let Some(c) = char::from_u32(code)
    {
        return Some(c.to_string());
    }

    None
}
