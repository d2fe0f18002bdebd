use crate::document::Document;
use crate::parser::parse;
use crate::writer::DocumentWriter;
use casexml_shared::errors::Error;
use casexml_shared::types::Result;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Version written on the root element of newly created files
pub const DEFAULT_VERSION: &str = "2.0";

/// An XML document bound to a file on disk.
///
/// When the file exists it is read and parsed on construction. Otherwise a document with only
/// a root element is created in memory; nothing touches the disk until `write()` or `flush()`
/// is called.
#[derive(Debug, Clone)]
pub struct GenericXml {
    path: PathBuf,
    doc: Document,
    /// True when the document was read from disk
    loaded: bool,
    /// True when the in-memory document differs from what is on disk
    dirty: bool,
    read_only: bool,
}

impl GenericXml {
    /// Loads the file at `path`, or creates `<root_name id="<basename>" version="2.0"/>` when
    /// there is no such file.
    pub fn new(path: impl AsRef<Path>, root_name: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if path.is_file() {
            debug!("reading xml file {}", path.display());
            let data = fs::read_to_string(&path)?;
            let doc = parse(&data)?;
            if doc.root().is_none() {
                return Err(Error::Query(format!("{} has no root element", path.display())));
            }

            return Ok(Self {
                path,
                doc,
                loaded: true,
                dirty: false,
                read_only: false,
            });
        }

        let id = basename(&path);
        debug!("creating new xml document for {}", path.display());

        Ok(Self {
            doc: Document::with_root(root_name, &[("id", id.as_str()), ("version", DEFAULT_VERSION)]),
            path,
            loaded: false,
            dirty: true,
            read_only: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Basename of the backing file
    pub fn file_name(&self) -> String {
        basename(&self.path)
    }

    /// True when the document was read from an existing file
    pub fn exists_on_disk(&self) -> bool {
        self.loaded
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Mutable access to the document. The object is considered modified afterwards.
    pub fn document_mut(&mut self) -> &mut Document {
        self.dirty = true;
        &mut self.doc
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Version attribute of the root element, 1.0 when it is missing or not a number
    pub fn version(&self) -> f64 {
        self.doc
            .root()
            .and_then(|root| self.doc.get(root, "version"))
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(1.0)
    }

    /// Writes the document to its path, creating parent directories when needed
    pub fn write(&mut self) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnly(self.path.display().to_string()));
        }

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        debug!("writing xml file {}", self.path.display());
        fs::write(&self.path, DocumentWriter::write(&self.doc))?;

        self.loaded = true;
        self.dirty = false;
        Ok(())
    }

    /// Writes the document only when it has been modified. Returns true when it was written.
    pub fn flush(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }

        self.write()?;
        Ok(true)
    }
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
