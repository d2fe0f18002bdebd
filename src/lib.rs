//! Casexml: XML-backed case configuration files.
//!
//! This crate ties the workspace crates together and hosts the `env-xml` binary.

pub use casexml_shared::errors::{Error, ParseError};
pub use casexml_shared::types::Result;

pub use casexml_xml::parser::parse;
pub use casexml_xml::writer::DocumentWriter;
pub use casexml_xml::{Document, GenericXml, NodeId};

pub use casexml_config::{
    Case, EntryId, EntryType, EntryValue, EnvBase, HeaderProvider, Headers, NewEntry,
};
