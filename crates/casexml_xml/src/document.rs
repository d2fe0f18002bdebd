use crate::node::{Attributes, Node, NodeData, NodeId};
use casexml_shared::errors::Error;
use casexml_shared::types::Result;
use std::collections::HashMap;

/// Attribute filter used by the query functions: every pair must be present on the element
pub type AttrFilter<'a> = &'a [(&'a str, &'a str)];

/// An XML document. All nodes live in an arena and refer to each other by [`NodeId`]. The
/// arena always holds a synthetic document node ([`NodeId::DOCUMENT`]) whose single element
/// child is the root element.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Current nodes stored as <id, node>
    nodes: HashMap<NodeId, Node>,
    /// Next node ID to use
    next_id: usize,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates an empty document that only holds the document node
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            NodeId::DOCUMENT,
            Node::new(NodeId::DOCUMENT, None, NodeData::Document),
        );

        Self { nodes, next_id: 1 }
    }

    /// Creates a document with a root element
    #[must_use]
    pub fn with_root(name: &str, attrs: AttrFilter) -> Self {
        let mut doc = Self::new();
        doc.append_node(NodeId::DOCUMENT, element_data(name, attrs));
        doc
    }

    /// Registers a node and attaches it as last child of `parent`. No structural checks are
    /// done, callers are expected to only pass existing parents.
    pub(crate) fn append_node(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId::from(self.next_id);
        self.next_id += 1;

        self.nodes.insert(id, Node::new(id, Some(parent), data));
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.push(id);
        }

        id
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Gets the node with the given id
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    fn element(&self, id: NodeId) -> Result<&Node> {
        match self.nodes.get(&id) {
            Some(node) if node.is_element() => Ok(node),
            Some(_) => Err(Error::Query(format!("node {id} is not an element"))),
            None => Err(Error::Query(format!("node {id} does not exist"))),
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        match self.nodes.get_mut(&id) {
            Some(node) if node.is_element() => Ok(node),
            Some(_) => Err(Error::Query(format!("node {id} is not an element"))),
            None => Err(Error::Query(format!("node {id} does not exist"))),
        }
    }

    /// Returns the root element of the document
    pub fn root(&self) -> Option<NodeId> {
        self.child_nodes(NodeId::DOCUMENT)
            .iter()
            .copied()
            .find(|id| self.nodes.get(id).is_some_and(Node::is_element))
    }

    /// Returns the root element or an error when the document is empty
    pub fn root_element(&self) -> Result<NodeId> {
        self.root()
            .ok_or_else(|| Error::Query("document has no root element".into()))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    /// All direct children (elements, text and comments) of the node
    pub fn child_nodes(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id).and_then(Node::name)
    }

    /// Returns the value of the given attribute
    pub fn get(&self, id: NodeId, key: &str) -> Option<&str> {
        self.nodes.get(&id).and_then(|node| node.attribute(key))
    }

    pub fn has(&self, id: NodeId, key: &str) -> bool {
        self.get(id, key).is_some()
    }

    pub fn attributes(&self, id: NodeId) -> Option<&Attributes> {
        match self.nodes.get(&id).map(|node| &node.data) {
            Some(NodeData::Element { attributes, .. }) => Some(attributes),
            _ => None,
        }
    }

    /// Sets an attribute. Existing attributes keep their position, new ones are appended.
    pub fn set(&mut self, id: NodeId, key: &str, value: &str) -> Result<()> {
        let node = self.element_mut(id)?;
        if let NodeData::Element { attributes, .. } = &mut node.data {
            match attributes.iter_mut().find(|(k, _)| k == key) {
                Some((_, v)) => *v = value.to_string(),
                None => attributes.push((key.to_string(), value.to_string())),
            }
        }

        Ok(())
    }

    /// Concatenated text of the direct text children of the node. Returns `None` when the
    /// node has no text at all.
    pub fn text(&self, id: NodeId) -> Option<String> {
        let mut text: Option<String> = None;
        for child in self.child_nodes(id) {
            if let Some(Node {
                data: NodeData::Text(t),
                ..
            }) = self.nodes.get(child)
            {
                text.get_or_insert_with(String::new).push_str(t);
            }
        }

        text
    }

    /// Replaces all text children of the element with a single text node
    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<()> {
        let text_children: Vec<NodeId> = self
            .element(id)?
            .children
            .iter()
            .copied()
            .filter(|c| matches!(self.nodes.get(c).map(|n| &n.data), Some(NodeData::Text(_))))
            .collect();

        for child in text_children {
            self.remove_child(id, child)?;
        }

        if !text.is_empty() {
            self.append_node(id, NodeData::Text(text.to_string()));
        }

        Ok(())
    }

    /// Direct element children of `parent` matching the name (when given) and attributes
    pub fn children(&self, parent: NodeId, name: Option<&str>, attrs: AttrFilter) -> Vec<NodeId> {
        self.child_nodes(parent)
            .iter()
            .copied()
            .filter(|id| self.nodes.get(id).is_some_and(|n| n.matches(name, attrs)))
            .collect()
    }

    /// Returns the single direct child matching the filter. Zero or multiple matches are
    /// errors.
    pub fn get_child(&self, parent: NodeId, name: Option<&str>, attrs: AttrFilter) -> Result<NodeId> {
        self.get_optional_child(parent, name, attrs)?.ok_or_else(|| {
            Error::Query(format!(
                "no child {} {} found below node {parent}",
                name.unwrap_or("*"),
                describe(attrs)
            ))
        })
    }

    /// Returns the direct child matching the filter if there is one. Multiple matches are an
    /// error.
    pub fn get_optional_child(
        &self,
        parent: NodeId,
        name: Option<&str>,
        attrs: AttrFilter,
    ) -> Result<Option<NodeId>> {
        single(self.children(parent, name, attrs), name, attrs)
    }

    /// All descendants of `root` (not `root` itself) matching the filter, in document order
    pub fn scan_children(&self, root: NodeId, name: Option<&str>, attrs: AttrFilter) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.child_nodes(root).iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };

            if node.matches(name, attrs) {
                found.push(id);
            }
            stack.extend(node.children.iter().rev().copied());
        }

        found
    }

    pub fn scan_child(&self, root: NodeId, name: Option<&str>, attrs: AttrFilter) -> Result<NodeId> {
        self.scan_optional_child(root, name, attrs)?.ok_or_else(|| {
            Error::Query(format!(
                "no descendant {} {} found below node {root}",
                name.unwrap_or("*"),
                describe(attrs)
            ))
        })
    }

    pub fn scan_optional_child(
        &self,
        root: NodeId,
        name: Option<&str>,
        attrs: AttrFilter,
    ) -> Result<Option<NodeId>> {
        single(self.scan_children(root, name, attrs), name, attrs)
    }

    fn check_parent(&self, parent: NodeId) -> Result<()> {
        if parent.is_document() {
            if self.root().is_some() {
                return Err(Error::Query("document already has a root element".into()));
            }
            return Ok(());
        }

        self.element(parent).map(|_| ())
    }

    /// Creates a new element below `parent`, optionally with text content
    pub fn make_child(
        &mut self,
        parent: NodeId,
        name: &str,
        attrs: AttrFilter,
        text: Option<&str>,
    ) -> Result<NodeId> {
        self.check_parent(parent)?;

        let id = self.append_node(parent, element_data(name, attrs));
        if let Some(text) = text.filter(|t| !t.is_empty()) {
            self.append_node(id, NodeData::Text(text.to_string()));
        }

        Ok(id)
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> Result<NodeId> {
        self.element(parent)?;
        Ok(self.append_node(parent, NodeData::Text(text.to_string())))
    }

    pub fn append_comment(&mut self, parent: NodeId, comment: &str) -> Result<NodeId> {
        if !parent.is_document() {
            self.element(parent)?;
        }
        Ok(self.append_node(parent, NodeData::Comment(comment.to_string())))
    }

    /// Detaches `child` from `parent` and drops the whole subtree from the arena
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_node = self
            .nodes
            .get_mut(&parent)
            .ok_or_else(|| Error::Query(format!("node {parent} does not exist")))?;

        let Some(pos) = parent_node.children.iter().position(|c| *c == child) else {
            return Err(Error::Query(format!("node {child} is not a child of {parent}")));
        };
        parent_node.children.remove(pos);

        let mut stack = vec![child];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.remove(&id) {
                stack.extend(node.children);
            }
        }

        Ok(())
    }

    /// Deep copies `node` (and everything below it) from `other` and appends it as last child
    /// of `parent`. Returns the id of the copy in this document.
    pub fn import(&mut self, parent: NodeId, other: &Document, node: NodeId) -> Result<NodeId> {
        let source = other
            .node(node)
            .ok_or_else(|| Error::Query(format!("node {node} does not exist in source document")))?;
        if matches!(source.data, NodeData::Document) {
            return Err(Error::Query("cannot import a document node".into()));
        }
        if source.is_element() {
            self.check_parent(parent)?;
        } else if !parent.is_document() {
            self.element(parent)?;
        }

        let new_root = self.append_node(parent, source.data.clone());

        let mut stack: Vec<(NodeId, NodeId)> = vec![(node, new_root)];
        while let Some((src_id, dst_id)) = stack.pop() {
            for child in other.child_nodes(src_id) {
                if let Some(child_node) = other.node(*child) {
                    let copy = self.append_node(dst_id, child_node.data.clone());
                    stack.push((*child, copy));
                }
            }
        }

        Ok(new_root)
    }
}

fn element_data(name: &str, attrs: AttrFilter) -> NodeData {
    NodeData::Element {
        name: name.to_string(),
        attributes: attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

fn describe(attrs: AttrFilter) -> String {
    let parts: Vec<String> = attrs.iter().map(|(k, v)| format!("{k}='{v}'")).collect();
    format!("[{}]", parts.join(", "))
}

fn single(found: Vec<NodeId>, name: Option<&str>, attrs: AttrFilter) -> Result<Option<NodeId>> {
    match found.as_slice() {
        [] => Ok(None),
        [id] => Ok(Some(*id)),
        _ => Err(Error::Query(format!(
            "multiple matches for {} {}",
            name.unwrap_or("*"),
            describe(attrs)
        ))),
    }
}
