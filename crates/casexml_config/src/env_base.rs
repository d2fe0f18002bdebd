use crate::entry_id::EntryId;
use crate::headers::HeaderProvider;
use casexml_shared::types::Result;
use casexml_xml::NodeId;
use log::debug;
use std::ops::{Deref, DerefMut};
use std::path::Path;

/// An env file of a case (`env_case.xml`, `env_run.xml`, ...).
///
/// Loads like any other entry file. A file that does not exist yet starts with the default
/// header for its basename, taken from the header provider.
#[derive(Debug, Clone)]
pub struct EnvBase {
    entries: EntryId,
    /// True when there was no file on disk and the header was inserted
    created: bool,
}

impl EnvBase {
    pub fn new(case_root: impl AsRef<Path>, infile: &str, headers: &dyn HeaderProvider) -> Result<Self> {
        let fullpath = case_root.as_ref().join(infile);
        let mut entries = EntryId::new(&fullpath)?;

        let created = !fullpath.is_file();
        if created {
            let file_name = entries.file_name();
            let header = headers.header_node(&file_name)?;
            let header_root = header.root_element()?;

            let root = entries.root()?;
            entries
                .xml_mut()
                .document_mut()
                .import(root, &header, header_root)?;
            debug!("{}: new file, inserted default header", fullpath.display());
        }

        Ok(Self { entries, created })
    }

    /// True when the file did not exist and was bootstrapped with a default header
    pub fn is_new(&self) -> bool {
        self.created
    }

    /// The `<header>` elements directly below the root
    pub fn headers(&self) -> Vec<NodeId> {
        match self.entries.root() {
            Ok(root) => self.document().children(root, Some("header"), &[]),
            Err(_) => Vec::new(),
        }
    }
}

impl Deref for EnvBase {
    type Target = EntryId;

    fn deref(&self) -> &Self::Target {
        &self.entries
    }
}

impl DerefMut for EnvBase {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.entries
    }
}
