//! XML layer for casexml
//!
//! A small, order preserving XML document model. Documents are parsed with [`parser::parse`],
//! stored in a node arena ([`document::Document`]) and written back with
//! [`writer::DocumentWriter`]. [`generic::GenericXml`] binds a document to a file on disk.

pub mod document;
pub mod generic;
pub mod node;
pub mod parser;
pub mod writer;

pub use document::Document;
pub use generic::GenericXml;
pub use node::{Node, NodeData, NodeId};
