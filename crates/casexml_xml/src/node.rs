use derive_more::Display;

/// A `NodeId` is a unique identifier for a node in a document.
#[derive(Clone, Copy, Debug, Default, Display, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct NodeId(usize);

impl From<NodeId> for usize {
    /// Converts a `NodeId` into a usize
    fn from(value: NodeId) -> Self {
        value.0
    }
}

impl From<usize> for NodeId {
    /// Converts a usize into a `NodeId`
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl NodeId {
    /// Id of the synthetic document node every document starts with
    pub const DOCUMENT: Self = Self(0);

    pub fn is_document(&self) -> bool {
        self.0 == 0
    }
}

/// Attribute list of an element. Order is kept so documents round-trip as they were written.
pub type Attributes = Vec<(String, String)>;

#[derive(Clone, Debug, PartialEq)]
pub enum NodeData {
    /// Top node of every document. Holds the root element and any prolog comments.
    Document,
    Element { name: String, attributes: Attributes },
    Text(String),
    Comment(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub data: NodeData,
}

impl Node {
    pub(crate) fn new(id: NodeId, parent: Option<NodeId>, data: NodeData) -> Self {
        Self {
            id,
            parent,
            children: Vec::new(),
            data,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element { .. })
    }

    /// Element name, or `None` for non-element nodes
    pub fn name(&self) -> Option<&str> {
        match &self.data {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        match &self.data {
            NodeData::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Returns true when the node is an element with the given name (if any) and all given
    /// attributes are present with the exact values.
    pub fn matches(&self, name: Option<&str>, attrs: &[(&str, &str)]) -> bool {
        let Some(node_name) = self.name() else {
            return false;
        };

        if name.is_some_and(|n| n != node_name) {
            return false;
        }

        attrs
            .iter()
            .all(|(key, value)| self.attribute(key) == Some(*value))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn element(name: &str, attrs: &[(&str, &str)]) -> Node {
        Node::new(
            NodeId::from(1),
            None,
            NodeData::Element {
                name: name.into(),
                attributes: attrs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            },
        )
    }

    #[test]
    fn matches_name_and_attributes() {
        let node = element("entry", &[("id", "CASE"), ("value", "foo")]);

        assert!(node.matches(None, &[]));
        assert!(node.matches(Some("entry"), &[]));
        assert!(node.matches(Some("entry"), &[("id", "CASE")]));
        assert!(!node.matches(Some("group"), &[("id", "CASE")]));
        assert!(!node.matches(Some("entry"), &[("id", "OTHER")]));
        assert!(!node.matches(Some("entry"), &[("missing", "x")]));
    }

    #[test]
    fn text_nodes_never_match() {
        let node = Node::new(NodeId::from(2), None, NodeData::Text("entry".into()));
        assert!(!node.matches(None, &[]));
        assert_eq!(node.name(), None);
        assert_eq!(node.attribute("id"), None);
    }
}
