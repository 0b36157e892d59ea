//! A mutable XML element tree for MPD manifests.
//!
//! Elements live in an arena owned by [`Document`] and are addressed by [`NodeId`] handles,
//! so rewriting a subtree (e.g. expanding a `SegmentTimeline`) never invalidates handles
//! obtained earlier in the same pass.

use quick_xml::{
    events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Reader, Writer,
};

use crate::error::{ProxyError, ProxyResult};

pub const MPD_NAMESPACE: &str = "urn:mpeg:dash:schema:mpd:2011";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Attributes of an element, kept in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_string<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Unsigned attribute value. Absent or malformed values yield `default`.
    pub fn get_uint(&self, key: &str, default: u64) -> u64 {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: ToString,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut attributes = Attributes::new();
        for (key, value) in iter {
            attributes.set(key, value);
        }
        attributes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    CData,
    Comment,
}

/// A node of the tree. Text, CDATA and comments are leaf nodes kept among the element
/// children, so they are written back at their original position.
#[derive(Debug, Clone)]
pub struct Element {
    kind: NodeKind,
    name: String,
    pub attributes: Attributes,
    children: Vec<NodeId>,
    content: String,
}

impl Element {
    fn element(name: String, attributes: Attributes) -> Self {
        Self {
            kind: NodeKind::Element,
            name,
            attributes,
            children: Vec::new(),
            content: String::new(),
        }
    }

    fn leaf(kind: NodeKind, content: String) -> Self {
        Self {
            kind,
            name: String::new(),
            attributes: Attributes::new(),
            children: Vec::new(),
            content,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Tag name, empty for non-element nodes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tag name without namespace prefix.
    pub fn local_name(&self) -> &str {
        self.name
            .rsplit_once(':')
            .map(|(_, local)| local)
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Element>,
    root: NodeId,
}

impl Document {
    /// Parse `xml` into a tree. The XML declaration and anything outside the root element
    /// (prolog comments, processing instructions, doctype) are not kept.
    pub fn parse(xml: &str) -> ProxyResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut nodes: Vec<Element> = Vec::new();
        let mut root = None;
        let mut stack: Vec<NodeId> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let id = Self::open_element(&mut nodes, &mut root, &stack, &e)?;
                    stack.push(id);
                }
                Event::Empty(e) => {
                    Self::open_element(&mut nodes, &mut root, &stack, &e)?;
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Text(e) => {
                    let text = e.unescape()?.into_owned();
                    Self::push_leaf(&mut nodes, &stack, NodeKind::Text, text);
                }
                Event::CData(e) => {
                    let text = String::from_utf8(e.into_inner().into_owned())?;
                    Self::push_leaf(&mut nodes, &stack, NodeKind::CData, text);
                }
                Event::Comment(e) => {
                    let text = String::from_utf8(e.into_inner().into_owned())?;
                    Self::push_leaf(&mut nodes, &stack, NodeKind::Comment, text);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let root = root.ok_or_else(|| ProxyError::MpdParsing("empty document".to_string()))?;
        Ok(Self { nodes, root })
    }

    fn open_element(
        nodes: &mut Vec<Element>,
        root: &mut Option<NodeId>,
        stack: &[NodeId],
        start: &BytesStart<'_>,
    ) -> ProxyResult<NodeId> {
        let name = String::from_utf8(start.name().as_ref().to_vec())?;
        let mut attributes = Attributes::new();
        for attr in start.attributes() {
            let attr = attr?;
            let key = String::from_utf8(attr.key.as_ref().to_vec())?;
            let value = attr.unescape_value()?;
            attributes.set(key, value);
        }

        let id = NodeId(nodes.len());
        nodes.push(Element::element(name, attributes));

        match stack.last() {
            Some(parent) => nodes[parent.0].children.push(id),
            None if root.is_none() => *root = Some(id),
            None => {
                return Err(ProxyError::MpdParsing(
                    "multiple root elements".to_string(),
                ))
            }
        }
        Ok(id)
    }

    fn push_leaf(nodes: &mut Vec<Element>, stack: &[NodeId], kind: NodeKind, content: String) {
        // outside of the root element
        let Some(parent) = stack.last() else {
            return;
        };
        let id = NodeId(nodes.len());
        nodes.push(Element::leaf(kind, content));
        nodes[parent.0].children.push(id);
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn element(&self, id: NodeId) -> &Element {
        &self.nodes[id.0]
    }

    pub fn attributes(&self, id: NodeId) -> &Attributes {
        &self.nodes[id.0].attributes
    }

    pub fn attributes_mut(&mut self, id: NodeId) -> &mut Attributes {
        &mut self.nodes[id.0].attributes
    }

    /// First text or CDATA content directly inside `id`.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.children(id).iter().find_map(|child| {
            let node = self.element(*child);
            matches!(node.kind, NodeKind::Text | NodeKind::CData).then_some(node.content.as_str())
        })
    }

    /// Every child node, including text and comments.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// First child element with the given local name.
    pub fn find(&self, parent: NodeId, tag: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|child| self.is_element(*child, tag))
    }

    /// All child elements with the given local name, in document order.
    pub fn find_all(&self, parent: NodeId, tag: &str) -> Vec<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .filter(|child| self.is_element(*child, tag))
            .collect()
    }

    fn is_element(&self, id: NodeId, tag: &str) -> bool {
        let node = self.element(id);
        node.kind == NodeKind::Element && node.local_name() == tag
    }

    /// Allocate a detached element. It becomes part of the tree once attached to a parent.
    pub fn create_element(&mut self, name: impl Into<String>, attributes: Attributes) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Element::element(name.into(), attributes));
        id
    }

    /// Replace the child list of `parent`.
    pub fn set_children(&mut self, parent: NodeId, children: Vec<NodeId>) {
        self.nodes[parent.0].children = children;
    }

    /// Serialize the tree as UTF-8 XML. A default MPD namespace is declared on the root
    /// element if it does not carry one.
    pub fn to_xml(&self) -> ProxyResult<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        self.write_node(&mut writer, self.root, true)?;
        Ok(writer.into_inner())
    }

    fn write_node(&self, writer: &mut Writer<Vec<u8>>, id: NodeId, is_root: bool) -> ProxyResult<()> {
        let node = self.element(id);
        match node.kind {
            NodeKind::Text => writer.write_event(Event::Text(BytesText::new(&node.content)))?,
            NodeKind::CData => writer.write_event(Event::CData(BytesCData::new(node.content.as_str())))?,
            NodeKind::Comment => {
                writer.write_event(Event::Comment(BytesText::from_escaped(node.content.as_str())))?
            }
            NodeKind::Element => self.write_element(writer, node, is_root)?,
        }
        Ok(())
    }

    fn write_element(
        &self,
        writer: &mut Writer<Vec<u8>>,
        element: &Element,
        is_root: bool,
    ) -> ProxyResult<()> {
        let mut start = BytesStart::new(element.name.as_str());
        if is_root && !element.attributes.contains("xmlns") {
            start.push_attribute(("xmlns", MPD_NAMESPACE));
        }
        for (key, value) in element.attributes.iter() {
            start.push_attribute((key, value));
        }

        if element.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        for child in element.children.iter() {
            self.write_node(writer, *child, false)?;
        }
        writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
        Ok(())
    }
}
