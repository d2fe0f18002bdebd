use crate::env_base::EnvBase;
use crate::headers::HeaderProvider;
use crate::value::EntryValue;
use casexml_shared::errors::Error;
use casexml_shared::types::Result;
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use std::path::{Path, PathBuf};
use wildmatch::WildMatch;

/// Maximum number of reference expansions done for a single value
const MAX_RESOLVE_DEPTH: usize = 20;

lazy_static! {
    // $ENV{NAME}, ${NAME} or $NAME
    static ref REFERENCE: Regex =
        Regex::new(r"\$ENV\{(\w+)\}|\$\{(\w+)\}|\$(\w+)").expect("reference pattern");
}

/// All env files of a single case root. Lookups go through the files in the order they were
/// opened and the first file that knows an id owns it.
#[derive(Debug, Clone)]
pub struct Case {
    case_root: PathBuf,
    files: Vec<EnvBase>,
}

impl Case {
    /// The env files every case has
    pub const DEFAULT_FILES: [&'static str; 5] = [
        "env_case.xml",
        "env_build.xml",
        "env_run.xml",
        "env_mach_pes.xml",
        "env_batch.xml",
    ];

    /// Opens (or bootstraps) the given env files below `case_root`
    pub fn open(case_root: impl AsRef<Path>, file_names: &[&str], headers: &dyn HeaderProvider) -> Result<Self> {
        let case_root = case_root.as_ref().to_path_buf();

        let mut files = Vec::with_capacity(file_names.len());
        for name in file_names {
            files.push(EnvBase::new(&case_root, name, headers)?);
        }
        debug!("opened case {} with {} env files", case_root.display(), files.len());

        Ok(Self { case_root, files })
    }

    pub fn case_root(&self) -> &Path {
        &self.case_root
    }

    pub fn files(&self) -> &[EnvBase] {
        &self.files
    }

    /// Returns the env file with the given basename
    pub fn env(&self, file_name: &str) -> Option<&EnvBase> {
        self.files.iter().find(|env| env.file_name() == file_name)
    }

    pub fn env_mut(&mut self, file_name: &str) -> Option<&mut EnvBase> {
        self.files.iter_mut().find(|env| env.file_name() == file_name)
    }

    /// Index of the first env file that has an entry with the given id
    fn owner(&self, vid: &str) -> Result<Option<usize>> {
        for (idx, env) in self.files.iter().enumerate() {
            if env.has_entry(vid)? {
                return Ok(Some(idx));
            }
        }

        Ok(None)
    }

    /// Returns the env file that owns the given id
    pub fn owner_of(&self, vid: &str) -> Result<Option<&EnvBase>> {
        Ok(self.owner(vid)?.and_then(|idx| self.files.get(idx)))
    }

    pub fn get_value(&self, vid: &str) -> Result<Option<String>> {
        match self.owner(vid)? {
            Some(idx) => self.files[idx].get_value(vid, None),
            None => Ok(None),
        }
    }

    pub fn get_typed_value(&self, vid: &str) -> Result<Option<EntryValue>> {
        match self.owner(vid)? {
            Some(idx) => self.files[idx].get_typed_value(vid, None),
            None => Ok(None),
        }
    }

    /// Returns the value with all references to other entries and environment variables
    /// expanded
    pub fn get_resolved_value(&self, vid: &str) -> Result<Option<String>> {
        match self.get_value(vid)? {
            Some(value) => self.resolve(&value).map(Some),
            None => Ok(None),
        }
    }

    /// Expands `$NAME` and `${NAME}` from the entries of this case and `$ENV{NAME}` from the
    /// process environment. Unknown names are left in place.
    pub fn resolve(&self, value: &str) -> Result<String> {
        let mut current = value.to_string();

        for _ in 0..MAX_RESOLVE_DEPTH {
            let mut out = String::with_capacity(current.len());
            let mut last = 0;
            let mut changed = false;

            for caps in REFERENCE.captures_iter(&current) {
                let Some(whole) = caps.get(0) else {
                    continue;
                };

                let replacement = if let Some(var) = caps.get(1) {
                    std::env::var(var.as_str()).ok()
                } else {
                    match caps.get(2).or_else(|| caps.get(3)) {
                        Some(name) => self.get_value(name.as_str())?,
                        None => None,
                    }
                };

                out.push_str(&current[last..whole.start()]);
                match replacement {
                    Some(replacement) => {
                        out.push_str(&replacement);
                        changed = true;
                    }
                    None => {
                        warn!("cannot resolve {} in '{value}'", whole.as_str());
                        out.push_str(whole.as_str());
                    }
                }
                last = whole.end();
            }
            out.push_str(&current[last..]);

            if !changed {
                return Ok(out);
            }
            current = out;
        }

        Err(Error::Config(format!(
            "more than {MAX_RESOLVE_DEPTH} nested references while resolving '{value}'"
        )))
    }

    /// Sets the value in the env file that owns the id. Returns `None` when no file knows it.
    pub fn set_value(&mut self, vid: &str, value: &str, ignore_type: bool) -> Result<Option<String>> {
        match self.owner(vid)? {
            Some(idx) => self.files[idx].set_value(vid, value, None, ignore_type),
            None => {
                warn!("{vid} is not known in case {}", self.case_root.display());
                Ok(None)
            }
        }
    }

    /// Returns all entry ids that match the given search string (can use ? and *) for search
    /// wildcards.
    pub fn find(&self, search: &str) -> Result<Vec<String>> {
        let search = WildMatch::new(search);

        let mut keys: Vec<String> = Vec::new();
        for env in &self.files {
            for id in env.entry_ids()? {
                if search.matches(&id) && !keys.contains(&id) {
                    keys.push(id);
                }
            }
        }

        Ok(keys)
    }

    /// Writes every modified env file. Returns the number of files written.
    pub fn flush(&mut self) -> Result<usize> {
        let mut written = 0;
        for env in &mut self.files {
            if env.flush()? {
                written += 1;
            }
        }

        Ok(written)
    }
}
