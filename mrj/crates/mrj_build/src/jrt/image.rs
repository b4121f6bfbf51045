use super::SymbolArchiveError;
use crate::module::MODULE_INFO_NAME;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use zip::result::ZipError;
use zip::ZipArchive;

const MODULE_INFO_CLASS: &str = "module-info.class";
const JMOD_CLASSES_PREFIX: &str = "classes/";

/// Class bytes loaded from the runtime image together with their module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageClass {
    pub module: String,
    pub bytes: Vec<u8>,
}

/// The live class library of a JDK, used whenever the symbol archive has
/// no distinct data for a release.
pub trait RuntimeImage: Send + Sync + fmt::Debug {
    /// Looks up `p/q/Type.class`, either in `module` or in every module the
    /// filter accepts.
    fn find_class(
        &self,
        qualified_binary_file_name: &str,
        module: Option<&str>,
        module_filter: &dyn Fn(&str) -> bool,
    ) -> Result<Option<ImageClass>, SymbolArchiveError>;

    /// Raw `module-info.class` content of every module, keyed by module name.
    fn module_infos(&self) -> Result<Vec<(String, Vec<u8>)>, SymbolArchiveError>;
}

/// Picks the runtime image available under a JDK home: an exploded
/// `modules/` tree, or the packaged `jmods/` directory.
pub fn open_runtime_image(jdk_home: &Path) -> Result<Arc<dyn RuntimeImage>, SymbolArchiveError> {
    let exploded = jdk_home.join("modules");
    if exploded.is_dir() {
        return Ok(Arc::new(ExplodedImage::open(&exploded)?));
    }

    let jmods = jdk_home.join("jmods");
    if jmods.is_dir() {
        return Ok(Arc::new(JmodImage::open(&jmods)?));
    }

    Err(SymbolArchiveError::NoRuntimeImage(jdk_home.to_path_buf()))
}

/// `<jdk>/modules/<module>/<package path>/<Type>.class`
#[derive(Debug, Clone)]
pub struct ExplodedImage {
    root: PathBuf,
    modules: Vec<String>,
}

impl ExplodedImage {
    pub fn open(root: &Path) -> Result<Self, SymbolArchiveError> {
        let mut modules = Vec::new();
        for entry in read_dir(root)? {
            let entry = entry.map_err(|source| io_error(root, source))?;
            if entry.path().is_dir() {
                modules.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        modules.sort();
        Ok(Self {
            root: root.to_path_buf(),
            modules,
        })
    }

    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    fn read_class(
        &self,
        module: &str,
        name: &str,
    ) -> Result<Option<ImageClass>, SymbolArchiveError> {
        let path = self.root.join(module).join(name);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|source| io_error(&path, source))?;
        Ok(Some(ImageClass {
            module: module.to_string(),
            bytes,
        }))
    }
}

impl RuntimeImage for ExplodedImage {
    fn find_class(
        &self,
        qualified_binary_file_name: &str,
        module: Option<&str>,
        module_filter: &dyn Fn(&str) -> bool,
    ) -> Result<Option<ImageClass>, SymbolArchiveError> {
        if let Some(module) = module {
            return self.read_class(module, qualified_binary_file_name);
        }
        for module in self.modules.iter().filter(|module| module_filter(module)) {
            if let Some(found) = self.read_class(module, qualified_binary_file_name)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn module_infos(&self) -> Result<Vec<(String, Vec<u8>)>, SymbolArchiveError> {
        let mut infos = Vec::new();
        for module in &self.modules {
            if let Some(found) = self.read_class(module, MODULE_INFO_CLASS)? {
                infos.push((module.clone(), found.bytes));
            }
        }
        Ok(infos)
    }
}

/// `<jdk>/jmods/<module>.jmod`, zip archives with classes under `classes/`.
pub struct JmodImage {
    modules: BTreeMap<String, PathBuf>,
    open_archives: Mutex<HashMap<String, ZipArchive<BufReader<File>>>>,
}

impl JmodImage {
    pub fn open(dir: &Path) -> Result<Self, SymbolArchiveError> {
        let mut modules = BTreeMap::new();
        for entry in read_dir(dir)? {
            let entry = entry.map_err(|source| io_error(dir, source))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("jmod") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                modules.insert(stem.to_string(), path.clone());
            }
        }
        Ok(Self {
            modules,
            open_archives: Mutex::new(HashMap::new()),
        })
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    fn read_entry(&self, module: &str, name: &str) -> Result<Option<Vec<u8>>, SymbolArchiveError> {
        let Some(path) = self.modules.get(module) else {
            return Ok(None);
        };

        let mut archives = self.open_archives.lock().map_err(|_| {
            io_error(path, io::Error::other("jmod archive lock poisoned"))
        })?;
        if !archives.contains_key(module) {
            let file = File::open(path).map_err(|source| io_error(path, source))?;
            let archive = ZipArchive::new(BufReader::new(file)).map_err(|source| {
                SymbolArchiveError::Zip {
                    path: path.clone(),
                    source,
                }
            })?;
            archives.insert(module.to_string(), archive);
        }
        let Some(archive) = archives.get_mut(module) else {
            return Ok(None);
        };

        let entry_name = format!("{JMOD_CLASSES_PREFIX}{name}");
        let mut entry = match archive.by_name(&entry_name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(source) => {
                return Err(SymbolArchiveError::Zip {
                    path: path.clone(),
                    source,
                })
            }
        };
        let mut buffer = Vec::new();
        entry
            .read_to_end(&mut buffer)
            .map_err(|source| io_error(path, source))?;
        Ok(Some(buffer))
    }
}

impl RuntimeImage for JmodImage {
    fn find_class(
        &self,
        qualified_binary_file_name: &str,
        module: Option<&str>,
        module_filter: &dyn Fn(&str) -> bool,
    ) -> Result<Option<ImageClass>, SymbolArchiveError> {
        let candidates: Vec<&str> = match module {
            Some(module) => vec![module],
            None => self.modules().filter(|module| module_filter(module)).collect(),
        };
        for module in candidates {
            if let Some(bytes) = self.read_entry(module, qualified_binary_file_name)? {
                return Ok(Some(ImageClass {
                    module: module.to_string(),
                    bytes,
                }));
            }
        }
        Ok(None)
    }

    fn module_infos(&self) -> Result<Vec<(String, Vec<u8>)>, SymbolArchiveError> {
        let mut infos = Vec::new();
        for module in self.modules.keys() {
            let name = format!("{MODULE_INFO_NAME}.class");
            if let Some(bytes) = self.read_entry(module, &name)? {
                infos.push((module.clone(), bytes));
            }
        }
        Ok(infos)
    }
}

impl fmt::Debug for JmodImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JmodImage")
            .field("modules", &self.modules.len())
            .finish()
    }
}

fn read_dir(path: &Path) -> Result<fs::ReadDir, SymbolArchiveError> {
    fs::read_dir(path).map_err(|source| io_error(path, source))
}

fn io_error(path: &Path, source: io::Error) -> SymbolArchiveError {
    SymbolArchiveError::Io {
        path: path.to_path_buf(),
        source,
    }
}
