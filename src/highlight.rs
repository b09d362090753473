//! Syntax highlighting spans derived from the document tree.
//!
//! Composite tokens are split so that spans never overlap: a start tag
//! contributes a `<name` span, one span per attribute name and value, and
//! a closing delimiter span; the XML declaration is split the same way.
//! Plain text is left unannotated.

use crate::error::HighlightError;
use crate::model::{Document, NodeKind, TextRange};

/// Syntax category of a highlighted range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightKind {
    Prolog,
    DocType,
    Comment,
    CData,
    Tag,
    AttributeName,
    AttributeValue,
    Entity,
}

/// A highlighted range. Spans returned by [`highlight`] are ordered by
/// start offset and never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightSpan {
    pub range: TextRange,
    pub kind: HighlightKind,
}

impl HighlightSpan {
    fn new(range: TextRange, kind: HighlightKind) -> Self {
        Self { range, kind }
    }
}

/// Compute highlighting spans for a parsed document.
pub fn highlight(doc: &Document) -> Result<Vec<HighlightSpan>, HighlightError> {
    let mut spans = Vec::new();

    for id in doc.descendants() {
        let Some(node) = doc.get(id) else { continue };
        match &node.kind {
            NodeKind::Prolog { attributes } => {
                let range = node.range;
                // "<?xml" and "?>" around the attribute spans
                spans.push(HighlightSpan::new(
                    doc.source().range(range.start.offset, range.start.offset + 5),
                    HighlightKind::Prolog,
                ));
                for attr in attributes {
                    spans.push(HighlightSpan::new(attr.name_range, HighlightKind::AttributeName));
                    spans.push(HighlightSpan::new(attr.value_range, HighlightKind::AttributeValue));
                }
                spans.push(HighlightSpan::new(
                    doc.source().range(range.end.offset - 2, range.end.offset),
                    HighlightKind::Prolog,
                ));
            }
            NodeKind::Element {
                name_range,
                start_tag_range,
                end_tag_range,
                attributes,
                ..
            } => {
                // "<name"
                spans.push(HighlightSpan::new(
                    doc.source()
                        .range(start_tag_range.start.offset, name_range.end.offset),
                    HighlightKind::Tag,
                ));
                for attr in attributes {
                    spans.push(HighlightSpan::new(attr.name_range, HighlightKind::AttributeName));
                    spans.push(HighlightSpan::new(attr.value_range, HighlightKind::AttributeValue));
                }
                // ">" or "/>"
                let close_len = if end_tag_range.is_none() { 2 } else { 1 };
                spans.push(HighlightSpan::new(
                    doc.source()
                        .range(start_tag_range.end.offset - close_len, start_tag_range.end.offset),
                    HighlightKind::Tag,
                ));
                if let Some(end_tag) = end_tag_range {
                    spans.push(HighlightSpan::new(*end_tag, HighlightKind::Tag));
                }
            }
            NodeKind::Comment(_) => {
                spans.push(HighlightSpan::new(node.range, HighlightKind::Comment));
            }
            NodeKind::CData(_) => {
                spans.push(HighlightSpan::new(node.range, HighlightKind::CData));
            }
            NodeKind::DocType(_) => {
                spans.push(HighlightSpan::new(node.range, HighlightKind::DocType));
            }
            NodeKind::EntityRef { .. } => {
                spans.push(HighlightSpan::new(node.range, HighlightKind::Entity));
            }
            NodeKind::Text(_) | NodeKind::Document => {}
        }
    }

    spans.sort_by_key(|s| s.range.start.offset);

    // Overlap would mean categories fighting over bytes; that is a bug
    // in span construction, surfaced as the per-file recoverable error.
    for pair in spans.windows(2) {
        if pair[0].range.end.offset > pair[1].range.start.offset {
            return Err(HighlightError::new(format!(
                "overlapping highlight spans at {} and {}",
                pair[0].range, pair[1].range
            )));
        }
    }

    Ok(spans)
}
