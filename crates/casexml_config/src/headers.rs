use casexml_shared::errors::Error;
use casexml_shared::types::Result;
use casexml_xml::parser::parse;
use casexml_xml::{Document, NodeId};
use log::debug;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Header templates are kept in an xml file, but this copy is included in the binary so a case
/// can be created without one on disk.
const CONFIG_HEADERS_XML: &str = include_str!("./config_headers.xml");

/// `HeaderProvider` supplies the default header of a configuration file, keyed by the basename
/// of the file (ie: `env_case.xml`).
pub trait HeaderProvider {
    /// Returns a detached document whose root element is the `<header>` element for the given
    /// file name. An unknown file name is an error.
    fn header_node(&self, file_name: &str) -> Result<Document>;
}

/// Header templates read from a `config_headers.xml` document:
///
/// ```xml
/// <files>
///   <file name="env_case.xml">
///     <header>These variables CANNOT BE CHANGED once a case has been created.</header>
///   </file>
/// </files>
/// ```
#[derive(Debug, Clone)]
pub struct Headers {
    doc: Document,
}

impl Headers {
    /// Loads the header templates from the given file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("loading header templates from {}", path.display());

        let data = fs::read_to_string(path)?;
        Self::from_str(&data)
    }

    /// Header templates shipped with the library
    pub fn builtin() -> Result<Self> {
        Self::from_str(CONFIG_HEADERS_XML)
    }

    /// Names of all files that have a header template
    pub fn file_names(&self) -> Vec<String> {
        let Some(root) = self.doc.root() else {
            return Vec::new();
        };

        self.doc
            .children(root, Some("file"), &[])
            .into_iter()
            .filter_map(|file| self.doc.get(file, "name").map(str::to_string))
            .collect()
    }
}

impl FromStr for Headers {
    type Err = Error;

    fn from_str(data: &str) -> Result<Self> {
        let doc = parse(data)?;

        let root = doc.root_element()?;
        if doc.name(root) != Some("files") {
            return Err(Error::Config(format!(
                "header templates must have a <files> root element, found <{}>",
                doc.name(root).unwrap_or_default()
            )));
        }

        Ok(Self { doc })
    }
}

impl HeaderProvider for Headers {
    fn header_node(&self, file_name: &str) -> Result<Document> {
        let root = self.doc.root_element()?;

        let file = self
            .doc
            .get_optional_child(root, Some("file"), &[("name", file_name)])?
            .ok_or_else(|| Error::MissingHeader(file_name.to_string()))?;
        let header = self
            .doc
            .get_optional_child(file, Some("header"), &[])?
            .ok_or_else(|| Error::MissingHeader(file_name.to_string()))?;

        let mut node = Document::new();
        node.import(NodeId::DOCUMENT, &self.doc, header)?;

        Ok(node)
    }
}
