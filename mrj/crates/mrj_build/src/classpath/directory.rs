use super::{AccessRuleSet, Answer, ClassQuery, ClasspathLocation, ModuleConstraint};
use crate::classfile::CLASS_SUFFIX;
use crate::module::ModuleDescriptor;
use crate::release::Release;
use crate::session::BuildSession;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Binary output directory, optionally bound to an overlay release.
pub struct ClasspathDirectory {
    root: PathBuf,
    release: Release,
    module: Option<ModuleDescriptor>,
    access_rules: Option<AccessRuleSet>,
    directory_cache: RefCell<HashMap<String, Option<Vec<String>>>>,
    session: Arc<BuildSession>,
}

impl ClasspathDirectory {
    pub fn new(root: impl Into<PathBuf>, release: Release, session: Arc<BuildSession>) -> Self {
        Self {
            root: root.into(),
            release,
            module: None,
            access_rules: None,
            directory_cache: RefCell::new(HashMap::new()),
            session,
        }
    }

    pub fn with_module(mut self, module: ModuleDescriptor) -> Self {
        self.module = Some(module);
        self
    }

    pub fn with_access_rules(mut self, rules: AccessRuleSet) -> Self {
        self.access_rules = Some(rules);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sub-folders and class files of a `p/q` package, sorted by name.
    pub fn directory_list(&self, package_name: &str) -> Option<Vec<String>> {
        if let Some(cached) = self.directory_cache.borrow().get(package_name) {
            return cached.clone();
        }
        let listing = list_members(&self.root.join(package_name), |name| {
            name.ends_with(CLASS_SUFFIX)
        })
        .map(|(members, _)| members);
        self.directory_cache
            .borrow_mut()
            .insert(package_name.to_string(), listing.clone());
        listing
    }
}

impl ClasspathLocation for ClasspathDirectory {
    fn find_class(
        &self,
        query: &ClassQuery,
        module: ModuleConstraint<'_>,
        release: Release,
    ) -> Option<Answer> {
        if !self.release.applies_to(release) || !module.accepts(self.module_name()) {
            return None;
        }
        let listing = self.directory_list(&query.package_name)?;
        if !listing.iter().any(|name| *name == query.binary_file_name) {
            return None;
        }
        let path = self.root.join(&query.qualified_binary_file_name);
        read_binary_answer(&self.session, &path, query, self.module_name(), self.release)
            .map(|answer| {
                let restriction = self
                    .access_rules
                    .as_ref()
                    .and_then(|rules| rules.restriction_for(query.qualified_type_name()));
                answer.with_restriction(restriction)
            })
    }

    fn release(&self) -> Release {
        self.release
    }

    fn module_name(&self) -> Option<&str> {
        self.module.as_ref().map(|module| module.name.as_str())
    }
}

impl fmt::Debug for ClasspathDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClasspathDirectory")
            .field("root", &self.root)
            .field("release", &self.release)
            .field("module", &self.module_name())
            .finish()
    }
}

impl fmt::Display for ClasspathDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Binary classpath directory {}", self.root.display())
    }
}

/// Lists folders and files accepted by `is_member`, sorted. The flag reports
/// whether any file was accepted.
pub(super) fn list_members(
    dir: &Path,
    is_member: impl Fn(&str) -> bool,
) -> Option<(Vec<String>, bool)> {
    let entries = fs::read_dir(dir).ok()?;
    let mut members = Vec::new();
    let mut found_file = false;
    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        if file_type.is_dir() {
            members.push(name);
        } else if file_type.is_file() && is_member(&name) {
            found_file = true;
            members.push(name);
        }
    }
    members.sort();
    Some((members, found_file))
}

/// Reads a class file into an answer; unreadable or malformed content is
/// logged and treated as absent.
pub(super) fn read_binary_answer(
    session: &BuildSession,
    path: &Path,
    query: &ClassQuery,
    module_name: Option<&str>,
    release: Release,
) -> Option<Answer> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) => {
            debug!(path = %path.display(), error = %error, "unable to read class file");
            return None;
        }
    };
    match session.reader().read(&bytes, &query.qualified_binary_file_name) {
        Ok(binary) => Some(Answer::binary(
            binary,
            module_name.map(str::to_string),
            release,
        )),
        Err(error) => {
            debug!(path = %path.display(), error = %error, "malformed class file ignored");
            None
        }
    }
}
