//! Position-annotated document model.
//!
//! The tree is arena-allocated: all nodes live in one contiguous vector and
//! parent/child/sibling links are indices into it. This keeps upward
//! traversal O(1) without ownership cycles. A [`Document`] is built once by
//! the parser and is read-only afterwards; checks may share it freely
//! across threads.

use std::collections::HashMap;
use std::fmt;

use crate::source::SourceFile;

/// A position in the original source text.
///
/// Lines are 1-based, columns are 0-based byte offsets within the line,
/// `offset` is the absolute byte offset into the normalized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPosition {
    pub line: u32,
    pub column: u32,
    pub offset: usize,
}

impl TextPosition {
    pub fn new(line: u32, column: u32, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl PartialOrd for TextPosition {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TextPosition {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.offset.cmp(&other.offset)
    }
}

impl fmt::Display for TextPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A start/end position pair locating a construct in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    pub start: TextPosition,
    pub end: TextPosition,
}

impl TextRange {
    /// Create a range. `start` must not come after `end`.
    pub fn new(start: TextPosition, end: TextPosition) -> Self {
        debug_assert!(start <= end, "range start {start} after end {end}");
        Self { start, end }
    }

    /// Whether `other` lies entirely within this range.
    pub fn contains(&self, other: &TextRange) -> bool {
        self.start.offset <= other.start.offset && other.end.offset <= self.end.offset
    }

    pub fn len(&self) -> usize {
        self.end.offset - self.start.offset
    }

    pub fn is_empty(&self) -> bool {
        self.start.offset == self.end.offset
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Sentinel value for no node.
    pub const NONE: NodeId = NodeId(u32::MAX);

    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// An attribute of an element or prolog.
///
/// `value` is entity-decoded; the ranges describe the undecoded source
/// text. `value_range` includes the surrounding quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Qualified name, prefix included (e.g. `xsi:type`).
    pub name: String,
    pub value: String,
    pub name_range: TextRange,
    pub value_range: TextRange,
}

impl Attribute {
    /// Namespace prefix, if the name is qualified.
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(p, _)| p)
    }

    /// Name with any namespace prefix removed.
    pub fn local_name(&self) -> &str {
        self.name.rsplit_once(':').map(|(_, l)| l).unwrap_or(&self.name)
    }
}

/// Node payload in the document tree.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Synthetic arena root; owns the prolog, DOCTYPE, top-level comments,
    /// and the root element.
    Document,
    Element {
        /// Qualified tag name.
        name: String,
        /// Range of the name inside the start tag.
        name_range: TextRange,
        /// `<name ...>` or `<name .../>`, delimiters included.
        start_tag_range: TextRange,
        /// `</name>`; `None` for self-closing elements.
        end_tag_range: Option<TextRange>,
        attributes: Vec<Attribute>,
    },
    Text(String),
    Comment(String),
    CData(String),
    Prolog {
        attributes: Vec<Attribute>,
    },
    DocType(String),
    EntityRef {
        /// Reference name without `&`/`;` (e.g. `amp`, `#x41`).
        name: String,
        /// The decoded replacement text.
        resolved: String,
    },
}

/// A node in the document tree.
#[derive(Debug)]
pub struct Node {
    pub kind: NodeKind,
    /// Full extent of the node, descendants included.
    pub range: TextRange,
    pub parent: NodeId,
    pub first_child: NodeId,
    pub last_child: NodeId,
    pub prev_sibling: NodeId,
    pub next_sibling: NodeId,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, range: TextRange) -> Self {
        Self {
            kind,
            range,
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Element { .. })
    }
}

/// The parsed, position-annotated tree for one XML file.
///
/// Immutable after construction: the parser is the only writer, checks and
/// the highlighter only read.
#[derive(Debug)]
pub struct Document {
    source: SourceFile,
    nodes: Vec<Node>,
    root: NodeId,
    /// Namespace prefix -> URI, collected from `xmlns`/`xmlns:*`
    /// declarations in document order (flat, not scope-aware; the empty
    /// string keys the default namespace).
    namespaces: HashMap<String, String>,
    /// `id`/`xml:id` attribute value -> element, first occurrence wins.
    id_map: HashMap<String, NodeId>,
}

impl Document {
    pub(crate) fn new(source: SourceFile) -> Self {
        let mut doc = Self {
            source,
            nodes: Vec::new(),
            root: NodeId::NONE,
            namespaces: HashMap::new(),
            id_map: HashMap::new(),
        };
        let full = doc.source.range(0, doc.source.text().len());
        doc.root = doc.alloc(Node::new(NodeKind::Document, full));
        doc
    }

    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Append a child to a parent node, maintaining sibling links.
    pub(crate) fn append(&mut self, parent: NodeId, child: NodeId) {
        let last_child = self.nodes[parent.0 as usize].last_child;

        {
            let child_node = &mut self.nodes[child.0 as usize];
            child_node.parent = parent;
            child_node.prev_sibling = last_child;
        }

        if last_child.is_some() {
            self.nodes[last_child.0 as usize].next_sibling = child;
        }

        let parent_node = &mut self.nodes[parent.0 as usize];
        if parent_node.first_child.is_none() {
            parent_node.first_child = child;
        }
        parent_node.last_child = child;
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub(crate) fn register_namespace(&mut self, prefix: String, uri: String) {
        self.namespaces.insert(prefix, uri);
    }

    pub(crate) fn register_id(&mut self, id: String, node: NodeId) {
        self.id_map.entry(id).or_insert(node);
    }

    /// The source this document was parsed from.
    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    /// The synthetic document root.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.0 as usize)
    }

    /// The root element of the document, if any.
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .find(|&id| self.get(id).is_some_and(Node::is_element))
    }

    /// The prolog node (`<?xml ... ?>`), if present.
    pub fn prolog(&self) -> Option<NodeId> {
        self.children(self.root)
            .find(|&id| matches!(self.get(id), Some(n) if matches!(n.kind, NodeKind::Prolog { .. })))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Iterate over the children of a node in document order.
    pub fn children(&self, parent: NodeId) -> Children<'_> {
        let first = self
            .get(parent)
            .map(|n| n.first_child)
            .unwrap_or(NodeId::NONE);
        Children {
            doc: self,
            current: first,
        }
    }

    /// Iterate over all nodes in document order (depth-first), the
    /// synthetic root excluded.
    pub fn descendants(&self) -> Descendants<'_> {
        let mut stack: Vec<_> = self.children(self.root).collect();
        stack.reverse();
        Descendants { doc: self, stack }
    }

    /// Find the first node matching a predicate (depth-first).
    pub fn find<F>(&self, predicate: F) -> Option<NodeId>
    where
        F: Fn(&Node) -> bool,
    {
        self.descendants()
            .find(|&id| self.get(id).is_some_and(&predicate))
    }

    /// Find the first element with the given local tag name.
    pub fn find_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.find(|node| match &node.kind {
            NodeKind::Element { name, .. } => local_name(name) == tag,
            _ => false,
        })
    }

    /// Look up an element by its `id`/`xml:id` attribute.
    pub fn get_by_id(&self, id: &str) -> Option<NodeId> {
        self.id_map.get(id).copied()
    }

    /// Namespace prefix -> URI map.
    pub fn namespaces(&self) -> &HashMap<String, String> {
        &self.namespaces
    }

    /// Qualified name of an element.
    pub fn element_name(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.kind {
            NodeKind::Element { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }

    /// Range of an element's tag name, for name-located issues.
    pub fn name_range(&self, id: NodeId) -> Option<TextRange> {
        self.get(id).and_then(|n| match &n.kind {
            NodeKind::Element { name_range, .. } => Some(*name_range),
            _ => None,
        })
    }

    /// Value of an attribute on an element, by qualified name.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&Attribute> {
        self.get(id).and_then(|n| match &n.kind {
            NodeKind::Element { attributes, .. } => attributes.iter().find(|a| a.name == name),
            _ => None,
        })
    }

    /// Concatenated text content of an element's direct text and entity
    /// children.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            match self.get(child).map(|n| &n.kind) {
                Some(NodeKind::Text(t)) => out.push_str(t),
                Some(NodeKind::CData(t)) => out.push_str(t),
                Some(NodeKind::EntityRef { resolved, .. }) => out.push_str(resolved),
                _ => {}
            }
        }
        out
    }
}

/// Name with any namespace prefix removed (e.g. `dc:title` -> `title`).
pub fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, l)| l).unwrap_or(name)
}

/// Iterator over children of a node.
pub struct Children<'a> {
    doc: &'a Document,
    current: NodeId,
}

impl<'a> Iterator for Children<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_none() {
            return None;
        }
        let id = self.current;
        self.current = self
            .doc
            .get(id)
            .map(|n| n.next_sibling)
            .unwrap_or(NodeId::NONE);
        Some(id)
    }
}

/// Depth-first iterator over all nodes below the synthetic root.
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let mut children: Vec<_> = self.doc.children(id).collect();
        children.reverse();
        self.stack.extend(children);
        Some(id)
    }
}
