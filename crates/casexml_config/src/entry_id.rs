//! Entry/ID configuration files
//!
//! An entry file holds `<entry id=".." value="..">` elements below a `<file>` root element,
//! optionally grouped in `<group id="..">` elements. Each entry can describe itself:
//!
//! ```xml
//! <entry id="STOP_OPTION" value="ndays">
//!   <type>char</type>
//!   <valid_values>nsteps,ndays,nmonths</valid_values>
//!   <desc>Sets the run length along with STOP_N</desc>
//! </entry>
//! ```
use crate::value::{split_list, EntryType, EntryValue};
use casexml_shared::errors::Error;
use casexml_shared::types::Result;
use casexml_xml::document::AttrFilter;
use casexml_xml::{Document, GenericXml, NodeId};
use log::{debug, warn};
use std::path::Path;

/// Name of the root element of entry files
pub const ROOT_ELEMENT: &str = "file";

/// Description of an entry to add with [`EntryId::add_entry`]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewEntry {
    pub id: String,
    pub value: String,
    pub entry_type: EntryType,
    pub description: Option<String>,
    pub valid_values: Vec<String>,
    pub default_value: Option<String>,
}

impl NewEntry {
    pub fn new(id: &str, value: &str) -> Self {
        Self {
            id: id.to_string(),
            value: value.to_string(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_type(mut self, entry_type: EntryType) -> Self {
        self.entry_type = entry_type;
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    #[must_use]
    pub fn with_valid_values(mut self, values: &[&str]) -> Self {
        self.valid_values = values.iter().map(|v| v.to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_default(mut self, default_value: &str) -> Self {
        self.default_value = Some(default_value.to_string());
        self
    }
}

/// Configuration file made of identified entries
#[derive(Debug, Clone)]
pub struct EntryId {
    xml: GenericXml,
}

impl EntryId {
    /// Loads the entry file at `path`, or starts an empty one in memory
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            xml: GenericXml::new(path, ROOT_ELEMENT)?,
        })
    }

    pub fn xml(&self) -> &GenericXml {
        &self.xml
    }

    pub fn xml_mut(&mut self) -> &mut GenericXml {
        &mut self.xml
    }

    pub fn document(&self) -> &Document {
        self.xml.document()
    }

    pub fn path(&self) -> &Path {
        self.xml.path()
    }

    pub fn file_name(&self) -> String {
        self.xml.file_name()
    }

    pub fn root(&self) -> Result<NodeId> {
        self.document().root_element()
    }

    pub fn write(&mut self) -> Result<()> {
        self.xml.write()
    }

    pub fn flush(&mut self) -> Result<bool> {
        self.xml.flush()
    }

    /// Entry nodes with the given id, limited to the group `subgroup` when given
    fn entry_nodes(&self, vid: &str, subgroup: Option<&str>) -> Result<Vec<NodeId>> {
        let doc = self.document();
        let root = self.root()?;

        let Some(group) = subgroup else {
            return Ok(doc.scan_children(root, Some("entry"), &[("id", vid)]));
        };

        let mut nodes = Vec::new();
        for group_node in doc.scan_children(root, Some("group"), &[("id", group)]) {
            nodes.extend(doc.scan_children(group_node, Some("entry"), &[("id", vid)]));
        }

        Ok(nodes)
    }

    fn first_entry(&self, vid: &str) -> Result<Option<NodeId>> {
        Ok(self.entry_nodes(vid, None)?.first().copied())
    }

    /// Trimmed text of the named child element of an entry
    fn child_text(&self, node: NodeId, name: &str) -> Option<String> {
        let doc = self.document();
        doc.children(node, Some(name), &[])
            .first()
            .and_then(|child| doc.text(*child))
            .map(|text| text.trim().to_string())
    }

    /// All entry ids in document order, without duplicates
    pub fn entry_ids(&self) -> Result<Vec<String>> {
        let doc = self.document();
        let mut ids: Vec<String> = Vec::new();

        for node in doc.scan_children(self.root()?, Some("entry"), &[]) {
            if let Some(id) = doc.get(node, "id") {
                if !ids.iter().any(|known| known == id) {
                    ids.push(id.to_string());
                }
            }
        }

        Ok(ids)
    }

    pub fn has_entry(&self, vid: &str) -> Result<bool> {
        Ok(!self.entry_nodes(vid, None)?.is_empty())
    }

    fn node_value(&self, node: NodeId) -> Option<String> {
        match self.document().get(node, "value") {
            Some(value) => Some(value.to_string()),
            None => self.value_match(node, &[]),
        }
    }

    /// Returns the value of the first entry with id `vid`, or `None` when there is no such
    /// entry. An entry without a value attribute falls back to its default value.
    pub fn get_value(&self, vid: &str, subgroup: Option<&str>) -> Result<Option<String>> {
        let nodes = self.entry_nodes(vid, subgroup)?;
        Ok(nodes.first().and_then(|node| self.node_value(*node)))
    }

    /// Returns the value converted to the declared type of the entry
    pub fn get_typed_value(&self, vid: &str, subgroup: Option<&str>) -> Result<Option<EntryValue>> {
        let Some(node) = self.entry_nodes(vid, subgroup)?.first().copied() else {
            return Ok(None);
        };
        let Some(raw) = self.node_value(node) else {
            return Ok(None);
        };

        // The type is declared per entry, so read it from the entry the value came from
        let entry_type = self
            .child_text(node, "type")
            .map(|t| EntryType::from_type_str(&t))
            .unwrap_or_default();
        EntryValue::parse(entry_type, &raw)
            .map(Some)
            .map_err(|err| Error::InvalidValue {
                id: vid.to_string(),
                value: raw,
                reason: err.to_string(),
            })
    }

    /// Checks `value` against the type and the valid values of the entry and returns the form
    /// in which it will be stored.
    fn check_value(&self, vid: &str, node: NodeId, value: &str, ignore_type: bool) -> Result<String> {
        // References to other entries are resolved later, they can't be checked here
        if ignore_type || value.starts_with('$') {
            return Ok(value.to_string());
        }

        let entry_type = self
            .child_text(node, "type")
            .map(|t| EntryType::from_type_str(&t))
            .unwrap_or_default();

        let invalid = |reason: String| Error::InvalidValue {
            id: vid.to_string(),
            value: value.to_string(),
            reason,
        };

        let parsed = EntryValue::parse(entry_type, value).map_err(|err| invalid(err.to_string()))?;

        let valid_values = self
            .child_text(node, "valid_values")
            .map(|v| split_list(&v))
            .unwrap_or_default();
        if !valid_values.is_empty() {
            let allowed = valid_values.iter().any(|valid| {
                EntryValue::parse(entry_type, valid).is_ok_and(|v| v == parsed)
            });
            if !allowed {
                return Err(invalid(format!("must be one of {}", valid_values.join(","))));
            }
        }

        Ok(match parsed {
            EntryValue::Logical(_) | EntryValue::Integer(_) => format!("{parsed}"),
            _ => value.to_string(),
        })
    }

    /// Sets the value of every entry with id `vid` (within `subgroup` when given). Returns the
    /// stored value, or `None` when no entry matched.
    pub fn set_value(
        &mut self,
        vid: &str,
        value: &str,
        subgroup: Option<&str>,
        ignore_type: bool,
    ) -> Result<Option<String>> {
        let nodes = self.entry_nodes(vid, subgroup)?;
        if nodes.is_empty() {
            return Ok(None);
        }

        let mut updates = Vec::with_capacity(nodes.len());
        for node in nodes {
            let stored = self.check_value(vid, node, value, ignore_type)?;
            updates.push((node, stored));
        }

        let changed = updates
            .iter()
            .any(|(node, stored)| self.document().get(*node, "value") != Some(stored.as_str()));
        if changed {
            debug!("{}: setting {vid} to {value}", self.file_name());
            let doc = self.xml.document_mut();
            for (node, stored) in &updates {
                doc.set(*node, "value", stored)?;
            }
        }

        Ok(updates.into_iter().next().map(|(_, stored)| stored))
    }

    pub fn get_type_info(&self, vid: &str) -> Result<Option<EntryType>> {
        Ok(self
            .first_entry(vid)?
            .and_then(|node| self.child_text(node, "type"))
            .map(|t| EntryType::from_type_str(&t)))
    }

    pub fn get_valid_values(&self, vid: &str) -> Result<Vec<String>> {
        Ok(self
            .first_entry(vid)?
            .and_then(|node| self.child_text(node, "valid_values"))
            .map(|v| split_list(&v))
            .unwrap_or_default())
    }

    pub fn get_description(&self, vid: &str) -> Result<Option<String>> {
        Ok(self
            .first_entry(vid)?
            .and_then(|node| self.child_text(node, "desc")))
    }

    /// Ids of the groups that hold an entry with id `vid`
    pub fn get_groups(&self, vid: &str) -> Result<Vec<String>> {
        let doc = self.document();
        let mut groups = Vec::new();

        for node in self.entry_nodes(vid, None)? {
            let Some(parent) = doc.parent(node) else {
                continue;
            };
            if doc.name(parent) == Some("group") {
                if let Some(id) = doc.get(parent, "id") {
                    groups.push(id.to_string());
                }
            }
        }

        Ok(groups)
    }

    /// Picks the `<values>/<value>` child that best fits the given attributes. Every attribute
    /// on a value element must be present in `attributes` with the same value; among those the
    /// one matching the most attributes wins, and on a tie the later one. Without a match the
    /// `<default_value>` is returned.
    pub fn get_value_match(&self, vid: &str, attributes: AttrFilter) -> Result<Option<String>> {
        Ok(self
            .first_entry(vid)?
            .and_then(|node| self.value_match(node, attributes)))
    }

    fn value_match(&self, node: NodeId, attributes: AttrFilter) -> Option<String> {
        let doc = self.document();
        let mut best: Option<(usize, NodeId)> = None;

        for values in doc.children(node, Some("values"), &[]) {
            for candidate in doc.children(values, Some("value"), &[]) {
                let own = doc.attributes(candidate).map(Vec::as_slice).unwrap_or_default();

                let all_match = own.iter().all(|(key, val)| {
                    attributes
                        .iter()
                        .any(|(k, v)| *k == key.as_str() && *v == val.as_str())
                });
                if !all_match {
                    continue;
                }

                if best.map_or(true, |(score, _)| own.len() >= score) {
                    best = Some((own.len(), candidate));
                }
            }
        }

        match best {
            Some((_, candidate)) => Some(doc.text(candidate).unwrap_or_default().trim().to_string()),
            None => self.child_text(node, "default_value"),
        }
    }

    /// Appends a new entry to `group`, creating the group when it doesn't exist yet
    pub fn add_entry(&mut self, group: &str, entry: NewEntry) -> Result<NodeId> {
        let root = self.root()?;

        let existing = self
            .document()
            .get_optional_child(root, Some("group"), &[("id", group)])?;
        if let Some(group_node) = existing {
            let duplicates = self
                .document()
                .children(group_node, Some("entry"), &[("id", entry.id.as_str())]);
            if !duplicates.is_empty() {
                return Err(Error::Config(format!(
                    "entry {} already exists in group {group}",
                    entry.id
                )));
            }
        }

        let doc = self.xml.document_mut();
        let group_node = match existing {
            Some(node) => node,
            None => doc.make_child(root, "group", &[("id", group)], None)?,
        };

        let node = doc.make_child(
            group_node,
            "entry",
            &[("id", entry.id.as_str()), ("value", entry.value.as_str())],
            None,
        )?;
        doc.make_child(node, "type", &[], Some(entry.entry_type.as_str()))?;
        if !entry.valid_values.is_empty() {
            doc.make_child(node, "valid_values", &[], Some(entry.valid_values.join(",").as_str()))?;
        }
        if let Some(description) = entry.description.as_deref() {
            doc.make_child(node, "desc", &[], Some(description))?;
        }
        if let Some(default_value) = entry.default_value.as_deref() {
            doc.make_child(node, "default_value", &[], Some(default_value))?;
        }

        Ok(node)
    }

    /// Lists the entries whose value differs from, or which are missing in, `other`
    pub fn compare_xml(&self, other: &EntryId) -> Result<Vec<String>> {
        let mut differences = Vec::new();

        for vid in self.entry_ids()? {
            let mine = self.get_value(&vid, None)?.unwrap_or_default();
            match other.get_value(&vid, None)? {
                None => {
                    warn!("{vid} is missing in {}", other.file_name());
                    differences.push(format!("{vid}: missing in {}", other.file_name()));
                }
                Some(theirs) if theirs != mine => {
                    differences.push(format!("{vid}: '{mine}' != '{theirs}'"));
                }
                Some(_) => {}
            }
        }

        Ok(differences)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    const ENV_RUN: &str = r#"<?xml version="1.0"?>
<file id="env_run.xml" version="2.0">
  <group id="run_begin_stop_restart">
    <entry id="STOP_OPTION" value="ndays">
      <type>char</type>
      <valid_values>nsteps,nseconds,ndays,nmonths</valid_values>
      <desc>Sets the run length along with STOP_N</desc>
    </entry>
    <entry id="STOP_N" value="5">
      <type>integer</type>
    </entry>
    <entry id="CONTINUE_RUN" value="FALSE">
      <type>logical</type>
      <valid_values>TRUE,FALSE</valid_values>
    </entry>
  </group>
  <group id="run_din">
    <entry id="DIN_LOC_ROOT" value="$ENV{HOME}/inputdata">
      <type>char</type>
    </entry>
  </group>
  <group id="run_pio">
    <entry id="PIO_STRIDE" value="-1">
      <type>integer</type>
    </entry>
  </group>
  <group id="run_pio_ocn">
    <entry id="PIO_STRIDE" value="4">
      <type>integer</type>
    </entry>
  </group>
  <group id="run_flags">
    <entry id="ATM_NCPL">
      <type>integer</type>
      <values>
        <value>48</value>
        <value compset="CAM6">24</value>
        <value compset="CAM6" grid="f09">12</value>
      </values>
      <default_value>96</default_value>
    </entry>
    <entry id="DEBUG">
      <type>logical</type>
      <default_value>FALSE</default_value>
    </entry>
  </group>
</file>
"#;

    fn load() -> (tempfile::TempDir, EntryId) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("env_run.xml");
        fs::write(&path, ENV_RUN).unwrap();
        let entries = EntryId::new(&path).unwrap();
        (dir, entries)
    }

    #[test]
    fn get_values() {
        let (_dir, entries) = load();

        assert_eq!(entries.get_value("STOP_N", None).unwrap().as_deref(), Some("5"));
        assert_eq!(entries.get_value("NOT_THERE", None).unwrap(), None);
        assert_eq!(
            entries.get_typed_value("CONTINUE_RUN", None).unwrap(),
            Some(EntryValue::Logical(false))
        );
        assert_eq!(
            entries.get_typed_value("STOP_N", None).unwrap(),
            Some(EntryValue::Integer(5))
        );
    }

    #[test]
    fn subgroups() {
        let (_dir, entries) = load();

        // First in document order without a subgroup
        assert_eq!(entries.get_value("PIO_STRIDE", None).unwrap().as_deref(), Some("-1"));
        assert_eq!(
            entries.get_value("PIO_STRIDE", Some("run_pio_ocn")).unwrap().as_deref(),
            Some("4")
        );
        assert_eq!(entries.get_value("PIO_STRIDE", Some("run_din")).unwrap(), None);
        assert_eq!(
            entries.get_groups("PIO_STRIDE").unwrap(),
            vec!["run_pio", "run_pio_ocn"]
        );
    }

    #[test]
    fn typed_value_uses_type_of_subgroup_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("env_mixed.xml");
        fs::write(
            &path,
            r#"<file id="env_mixed.xml" version="2.0">
  <group id="g1"><entry id="X" value="abc"><type>char</type></entry></group>
  <group id="g2"><entry id="X" value="7"><type>integer</type></entry></group>
</file>"#,
        )
        .unwrap();
        let entries = EntryId::new(&path).unwrap();

        assert_eq!(
            entries.get_typed_value("X", Some("g2")).unwrap(),
            Some(EntryValue::Integer(7))
        );
        assert_eq!(
            entries.get_typed_value("X", Some("g1")).unwrap(),
            Some(EntryValue::Char("abc".to_string()))
        );
        assert_eq!(
            entries.get_typed_value("X", None).unwrap(),
            Some(EntryValue::Char("abc".to_string()))
        );
        assert_eq!(entries.get_typed_value("X", Some("g3")).unwrap(), None);
    }

    #[test]
    fn entry_metadata() {
        let (_dir, entries) = load();

        assert_eq!(entries.get_type_info("STOP_N").unwrap(), Some(EntryType::Integer));
        assert_eq!(
            entries.get_valid_values("STOP_OPTION").unwrap(),
            vec!["nsteps", "nseconds", "ndays", "nmonths"]
        );
        assert_eq!(
            entries.get_description("STOP_OPTION").unwrap().as_deref(),
            Some("Sets the run length along with STOP_N")
        );
        assert!(entries.get_valid_values("STOP_N").unwrap().is_empty());
        assert_eq!(entries.get_description("STOP_N").unwrap(), None);

        let ids = entries.entry_ids().unwrap();
        assert_eq!(ids.iter().filter(|id| *id == "PIO_STRIDE").count(), 1);
        assert_eq!(ids.len(), 7);
    }

    #[test]
    fn set_value_checks_type() {
        let (_dir, mut entries) = load();

        assert_eq!(
            entries.set_value("STOP_N", "10", None, false).unwrap().as_deref(),
            Some("10")
        );
        assert_eq!(entries.get_value("STOP_N", None).unwrap().as_deref(), Some("10"));

        let err = entries.set_value("STOP_N", "ten", None, false).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
        assert_eq!(entries.get_value("STOP_N", None).unwrap().as_deref(), Some("10"));

        // ignore_type stores anything
        entries.set_value("STOP_N", "ten", None, true).unwrap();
        assert_eq!(entries.get_value("STOP_N", None).unwrap().as_deref(), Some("ten"));
    }

    #[test]
    fn set_value_checks_valid_values() {
        let (_dir, mut entries) = load();

        assert!(entries.set_value("STOP_OPTION", "nyears", None, false).is_err());
        entries.set_value("STOP_OPTION", "nmonths", None, false).unwrap();

        // logicals are compared and stored in canonical form
        assert_eq!(
            entries.set_value("CONTINUE_RUN", "true", None, false).unwrap().as_deref(),
            Some("TRUE")
        );
    }

    #[test]
    fn references_skip_checks() {
        let (_dir, mut entries) = load();

        entries.set_value("STOP_N", "$OTHER_N", None, false).unwrap();
        assert_eq!(entries.get_value("STOP_N", None).unwrap().as_deref(), Some("$OTHER_N"));
    }

    #[test]
    fn set_value_updates_all_or_subgroup() {
        let (_dir, mut entries) = load();

        entries.set_value("PIO_STRIDE", "2", Some("run_pio_ocn"), false).unwrap();
        assert_eq!(entries.get_value("PIO_STRIDE", Some("run_pio")).unwrap().as_deref(), Some("-1"));
        assert_eq!(entries.get_value("PIO_STRIDE", Some("run_pio_ocn")).unwrap().as_deref(), Some("2"));

        entries.set_value("PIO_STRIDE", "8", None, false).unwrap();
        assert_eq!(entries.get_value("PIO_STRIDE", Some("run_pio")).unwrap().as_deref(), Some("8"));
        assert_eq!(entries.get_value("PIO_STRIDE", Some("run_pio_ocn")).unwrap().as_deref(), Some("8"));

        assert_eq!(entries.set_value("UNKNOWN", "1", None, false).unwrap(), None);
    }

    #[test]
    fn unchanged_value_keeps_file_clean() {
        let (_dir, mut entries) = load();

        entries.set_value("STOP_N", "5", None, false).unwrap();
        assert!(!entries.xml().is_dirty());
        entries.set_value("STOP_N", "6", None, false).unwrap();
        assert!(entries.xml().is_dirty());
    }

    #[test]
    fn value_match() {
        let (_dir, entries) = load();

        assert_eq!(entries.get_value_match("ATM_NCPL", &[]).unwrap().as_deref(), Some("48"));
        assert_eq!(
            entries.get_value_match("ATM_NCPL", &[("compset", "CAM6")]).unwrap().as_deref(),
            Some("24")
        );
        assert_eq!(
            entries
                .get_value_match("ATM_NCPL", &[("compset", "CAM6"), ("grid", "f09")])
                .unwrap()
                .as_deref(),
            Some("12")
        );
        assert_eq!(
            entries.get_value_match("ATM_NCPL", &[("grid", "f09")]).unwrap().as_deref(),
            Some("48")
        );
        assert_eq!(entries.get_value_match("DEBUG", &[]).unwrap().as_deref(), Some("FALSE"));
        assert_eq!(entries.get_value_match("STOP_N", &[]).unwrap(), None);

        // No value attribute: the value comes from the values block
        assert_eq!(entries.get_value("ATM_NCPL", None).unwrap().as_deref(), Some("48"));
        assert_eq!(entries.get_value("DEBUG", None).unwrap().as_deref(), Some("FALSE"));
    }

    #[test]
    fn add_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut entries = EntryId::new(dir.path().join("env_build.xml")).unwrap();

        entries
            .add_entry(
                "build_def",
                NewEntry::new("DEBUG", "FALSE")
                    .with_type(EntryType::Logical)
                    .with_valid_values(&["TRUE", "FALSE"])
                    .with_description("Flag to turn on debugging"),
            )
            .unwrap();
        entries
            .add_entry("build_def", NewEntry::new("GMAKE_J", "8").with_type(EntryType::Integer))
            .unwrap();

        assert!(entries.add_entry("build_def", NewEntry::new("DEBUG", "TRUE")).is_err());
        assert_eq!(entries.get_groups("GMAKE_J").unwrap(), vec!["build_def"]);
        assert_eq!(
            entries.get_description("DEBUG").unwrap().as_deref(),
            Some("Flag to turn on debugging")
        );
        assert!(entries.set_value("DEBUG", "maybe", None, false).is_err());

        entries.write().unwrap();
        let reloaded = EntryId::new(dir.path().join("env_build.xml")).unwrap();
        assert_eq!(reloaded.get_value("GMAKE_J", None).unwrap().as_deref(), Some("8"));
        assert_eq!(reloaded.get_type_info("DEBUG").unwrap(), Some(EntryType::Logical));
    }

    #[test]
    fn compare_files() {
        let (_dir, entries) = load();
        let (_dir2, mut other) = load();

        assert!(entries.compare_xml(&other).unwrap().is_empty());

        other.set_value("STOP_N", "7", None, false).unwrap();
        let diffs = entries.compare_xml(&other).unwrap();
        assert_eq!(diffs, vec!["STOP_N: '5' != '7'"]);

        let dir = tempfile::tempdir().unwrap();
        let empty = EntryId::new(dir.path().join("env_run.xml")).unwrap();
        assert_eq!(entries.compare_xml(&empty).unwrap().len(), 7);
    }
}
