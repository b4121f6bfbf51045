//! State shared by every classpath entry of one build session.

use crate::classfile::{BinaryTypeReader, ClassFileReader};
use crate::jrt::{CtSym, SymbolArchiveError};
use crate::module::ModuleDescriptor;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Module descriptors keyed by module name.
pub type ModuleMap = BTreeMap<String, ModuleDescriptor>;

/// Session-wide module listing cache keyed by module-path string.
///
/// A key is written at most once: concurrent first populations race to a
/// single winner and the losing candidate is dropped. Entries are never
/// evicted for the lifetime of the cache.
#[derive(Debug, Default)]
pub struct ModuleNameCache {
    entries: DashMap<String, Arc<ModuleMap>>,
}

impl ModuleNameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<ModuleMap>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Installs `candidate` unless `key` is already populated and returns
    /// whichever mapping ends up stored.
    pub fn insert_if_absent(&self, key: impl Into<String>, candidate: ModuleMap) -> Arc<ModuleMap> {
        let entry = self
            .entries
            .entry(key.into())
            .or_insert_with(|| Arc::new(candidate));
        Arc::clone(entry.value())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Owns the caches and capabilities shared across one build.
pub struct BuildSession {
    module_names: ModuleNameCache,
    symbol_archives: DashMap<PathBuf, Arc<CtSym>>,
    reader: Arc<dyn BinaryTypeReader>,
}

impl BuildSession {
    pub fn new() -> Self {
        Self::with_reader(Arc::new(ClassFileReader))
    }

    pub fn with_reader(reader: Arc<dyn BinaryTypeReader>) -> Self {
        Self {
            module_names: ModuleNameCache::new(),
            symbol_archives: DashMap::new(),
            reader,
        }
    }

    pub fn module_names(&self) -> &ModuleNameCache {
        &self.module_names
    }

    pub fn reader(&self) -> &dyn BinaryTypeReader {
        self.reader.as_ref()
    }

    /// Symbol archive of the given JDK, opened once per session.
    pub fn symbol_archive(&self, jdk_home: &Path) -> Result<Arc<CtSym>, SymbolArchiveError> {
        if let Some(existing) = self.symbol_archives.get(jdk_home) {
            return Ok(Arc::clone(existing.value()));
        }

        let opened = Arc::new(CtSym::open(jdk_home)?);
        debug!(jdk = %jdk_home.display(), "opened symbol archive");
        let entry = self
            .symbol_archives
            .entry(jdk_home.to_path_buf())
            .or_insert(opened);
        Ok(Arc::clone(entry.value()))
    }
}

impl Default for BuildSession {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BuildSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildSession")
            .field("module_names", &self.module_names.len())
            .field("symbol_archives", &self.symbol_archives.len())
            .finish()
    }
}
