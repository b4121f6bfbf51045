use super::SymbolArchiveError;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::trace;
use zip::ZipArchive;

/// Location of the symbol archive inside a JDK home.
pub const CT_SYM_PATH: &str = "lib/ct.sym";

/// Module descriptor signature file inside a per-module directory.
pub const MODULE_INFO_SIG: &str = "module-info.sig";

/// Marks a release whose classes are identical to the running JDK.
pub const SYSTEM_MODULES_MARKER: &str = "system-modules";

const LEGACY_MODULES_SUFFIX: &str = "-modules";

/// Read-only view of `lib/ct.sym`.
///
/// Top-level directories are named by the concatenated codes of the
/// releases they apply to (`789ABC`, `B`, ...). From JDK 12 on each of them
/// holds one directory per module; older layouts keep packages directly
/// under the release directory and list modules under `<code>-modules`.
pub struct CtSym {
    path: PathBuf,
    archive: Mutex<ZipArchive<BufReader<File>>>,
    files: BTreeSet<String>,
    dirs: BTreeSet<String>,
    jre12_plus: bool,
}

impl CtSym {
    pub fn open(jdk_home: &Path) -> Result<Self, SymbolArchiveError> {
        Self::open_file(&jdk_home.join(CT_SYM_PATH))
    }

    pub fn open_file(path: &Path) -> Result<Self, SymbolArchiveError> {
        let file = File::open(path).map_err(|source| SymbolArchiveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut archive =
            ZipArchive::new(BufReader::new(file)).map_err(|source| SymbolArchiveError::Zip {
                path: path.to_path_buf(),
                source,
            })?;

        let mut files = BTreeSet::new();
        let mut dirs = BTreeSet::new();
        for index in 0..archive.len() {
            let entry = archive
                .by_index_raw(index)
                .map_err(|source| SymbolArchiveError::Zip {
                    path: path.to_path_buf(),
                    source,
                })?;
            let name = entry.name().trim_start_matches('/');
            let trimmed = name.trim_end_matches('/');
            if trimmed.is_empty() {
                continue;
            }
            if !name.ends_with('/') {
                files.insert(trimmed.to_string());
            } else {
                dirs.insert(trimmed.to_string());
            }
            let mut parent = trimmed;
            while let Some((head, _)) = parent.rsplit_once('/') {
                dirs.insert(head.to_string());
                parent = head;
            }
        }

        let jre12_plus = !dirs
            .iter()
            .any(|dir| !dir.contains('/') && dir.ends_with(LEGACY_MODULES_SUFFIX));
        trace!(path = %path.display(), files = files.len(), jre12_plus, "indexed symbol archive");

        Ok(Self {
            path: path.to_path_buf(),
            archive: Mutex::new(archive),
            files,
            dirs,
            jre12_plus,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the archive uses the per-module layout introduced with JDK 12.
    pub fn is_jre12_plus(&self) -> bool {
        self.jre12_plus
    }

    pub fn contains_dir(&self, path: &str) -> bool {
        self.dirs.contains(path.trim_end_matches('/'))
    }

    pub fn contains_file(&self, path: &str) -> bool {
        self.files.contains(path)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.contains_file(path) || self.contains_dir(path)
    }

    /// Directory holding the module listing of a release.
    pub fn module_dir(&self, release_code: char) -> String {
        if self.jre12_plus {
            release_code.to_string()
        } else {
            format!("{release_code}{LEGACY_MODULES_SUFFIX}")
        }
    }

    /// Top-level directories carrying data for the given release.
    pub fn release_roots(&self, release_code: char) -> Vec<String> {
        self.dirs
            .iter()
            .filter(|dir| !dir.contains('/') && !dir.ends_with(LEGACY_MODULES_SUFFIX))
            .filter(|dir| dir.contains(release_code))
            .cloned()
            .collect()
    }

    /// Immediate sub-directories of `dir`.
    pub fn child_dirs(&self, dir: &str) -> Vec<String> {
        let prefix = format!("{dir}/");
        self.dirs
            .range::<String, _>((Bound::Included(&prefix), Bound::Unbounded))
            .take_while(|candidate| candidate.starts_with(&prefix))
            .filter_map(|candidate| {
                let rest = &candidate[prefix.len()..];
                (!rest.contains('/')).then(|| rest.to_string())
            })
            .collect()
    }

    /// Resolves a signature file for a release, optionally scoped to a module.
    pub fn full_path(
        &self,
        release_code: char,
        signature_path: &str,
        module_name: Option<&str>,
    ) -> Option<String> {
        for root in self.release_roots(release_code) {
            if !self.jre12_plus {
                let candidate = format!("{root}/{signature_path}");
                if self.contains_file(&candidate) {
                    return Some(candidate);
                }
                continue;
            }

            match module_name {
                Some(module) => {
                    let candidate = format!("{root}/{module}/{signature_path}");
                    if self.contains_file(&candidate) {
                        return Some(candidate);
                    }
                }
                None => {
                    for module in self.child_dirs(&root) {
                        let candidate = format!("{root}/{module}/{signature_path}");
                        if self.contains_file(&candidate) {
                            return Some(candidate);
                        }
                    }
                }
            }
        }
        None
    }

    /// Owning module of a signature file in the per-module layout.
    pub fn module_of(&self, release_code: char, signature_path: &str) -> Option<String> {
        if !self.jre12_plus {
            return None;
        }
        self.release_roots(release_code).into_iter().find_map(|root| {
            self.child_dirs(&root).into_iter().find(|module| {
                self.contains_file(&format!("{root}/{module}/{signature_path}"))
            })
        })
    }

    pub fn file_bytes(&self, path: &str) -> Result<Vec<u8>, SymbolArchiveError> {
        let mut archive = self.archive.lock().map_err(|_| SymbolArchiveError::Io {
            path: self.path.clone(),
            source: std::io::Error::other("symbol archive lock poisoned"),
        })?;
        let mut entry = archive
            .by_name(path)
            .map_err(|source| SymbolArchiveError::Zip {
                path: self.path.join(path),
                source,
            })?;
        let mut buffer = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buffer)
            .map_err(|source| SymbolArchiveError::Io {
                path: self.path.join(path),
                source,
            })?;
        Ok(buffer)
    }
}

impl std::fmt::Debug for CtSym {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CtSym")
            .field("path", &self.path)
            .field("files", &self.files.len())
            .field("jre12_plus", &self.jre12_plus)
            .finish()
    }
}
