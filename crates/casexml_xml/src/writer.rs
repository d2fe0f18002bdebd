use crate::document::Document;
use crate::node::{Attributes, NodeData, NodeId};

const INDENT: &str = "  ";

/// Writer to convert a document to an indented string
pub struct DocumentWriter {
    /// The buffer to write to
    buffer: String,
    /// Whether to include comments in the output
    comments: bool,
}

impl DocumentWriter {
    /// Writes the whole document, including the xml declaration
    pub fn write(doc: &Document) -> String {
        let mut w = Self {
            buffer: String::from("<?xml version=\"1.0\"?>\n"),
            comments: true,
        };

        w.visit_children(doc, NodeId::DOCUMENT, 0);
        w.buffer
    }

    /// Writes a single node and its subtree, without declaration and without comments
    pub fn write_from_node(doc: &Document, node: NodeId) -> String {
        let mut w = Self {
            buffer: String::new(),
            comments: false,
        };

        w.visit_node(doc, node, 0);
        w.buffer
    }

    fn visit_children(&mut self, doc: &Document, id: NodeId, depth: usize) {
        for child in doc.child_nodes(id) {
            self.visit_node(doc, *child, depth);
        }
    }

    fn visit_node(&mut self, doc: &Document, id: NodeId, depth: usize) {
        let Some(node) = doc.node(id) else {
            return;
        };

        match &node.data {
            NodeData::Document => self.visit_children(doc, id, depth),
            NodeData::Comment(comment) => {
                if self.comments {
                    self.indent(depth);
                    self.buffer.push_str("<!--");
                    self.buffer.push_str(comment);
                    self.buffer.push_str("-->\n");
                }
            }
            NodeData::Text(text) => {
                self.indent(depth);
                self.buffer.push_str(&escape_text(text.trim()));
                self.buffer.push('\n');
            }
            NodeData::Element { name, attributes } => {
                self.indent(depth);
                self.open_tag(name, attributes);

                if node.children.is_empty() {
                    self.buffer.push_str("/>\n");
                    return;
                }

                let texts = node
                    .children
                    .iter()
                    .filter(|c| matches!(doc.node(**c).map(|n| &n.data), Some(NodeData::Text(_))))
                    .count();

                if texts == node.children.len() {
                    self.buffer.push('>');
                    self.buffer
                        .push_str(&escape_text(&doc.text(id).unwrap_or_default()));
                } else if texts > 0 {
                    // Mixed content is written on one line, indentation would become part of the text
                    self.buffer.push('>');
                    for child in &node.children {
                        self.visit_inline(doc, *child);
                    }
                } else {
                    self.buffer.push_str(">\n");
                    self.visit_children(doc, id, depth + 1);
                    self.indent(depth);
                }

                self.buffer.push_str("</");
                self.buffer.push_str(name);
                self.buffer.push_str(">\n");
            }
        }
    }

    fn visit_inline(&mut self, doc: &Document, id: NodeId) {
        let Some(node) = doc.node(id) else {
            return;
        };

        match &node.data {
            NodeData::Document => {}
            NodeData::Comment(comment) => {
                if self.comments {
                    self.buffer.push_str("<!--");
                    self.buffer.push_str(comment);
                    self.buffer.push_str("-->");
                }
            }
            NodeData::Text(text) => self.buffer.push_str(&escape_text(text)),
            NodeData::Element { name, attributes } => {
                self.open_tag(name, attributes);
                if node.children.is_empty() {
                    self.buffer.push_str("/>");
                    return;
                }

                self.buffer.push('>');
                for child in &node.children {
                    self.visit_inline(doc, *child);
                }
                self.buffer.push_str("</");
                self.buffer.push_str(name);
                self.buffer.push('>');
            }
        }
    }

    fn open_tag(&mut self, name: &str, attributes: &Attributes) {
        self.buffer.push('<');
        self.buffer.push_str(name);
        for (key, value) in attributes {
            self.buffer.push(' ');
            self.buffer.push_str(key);
            self.buffer.push_str("=\"");
            self.buffer.push_str(&escape_attribute(value));
            self.buffer.push('"');
        }
    }

    fn indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.buffer.push_str(INDENT);
        }
    }
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_attribute(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}
