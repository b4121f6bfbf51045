use super::directory::{list_members, read_binary_answer};
use super::{Answer, ClassQuery, ClasspathLocation, ModuleConstraint};
use crate::classfile::{CLASS_SUFFIX, SOURCE_SUFFIX};
use crate::module::{ModuleDescriptor, MODULE_INFO_NAME};
use crate::release::{Release, VERSIONS_DIR};
use crate::session::BuildSession;
use crate::source::{parse_module_file, ParserOptions};
use crate::BuildError;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
struct PackageListing {
    entries: Vec<String>,
    from_source: bool,
}

/// A source folder together with the output it compiles to, optionally
/// bound to an overlay release.
///
/// Overlay roots write to `<output>/META-INF/versions/<release>`; package
/// listings prefer that binary output and only fall back to sources when
/// it holds no class files for the package.
pub struct ClasspathMultiDirectory {
    source_folder: PathBuf,
    output_folder: PathBuf,
    binary_folder: PathBuf,
    inclusion_patterns: Vec<String>,
    exclusion_patterns: Vec<String>,
    inclusion: Option<GlobSet>,
    exclusion: Option<GlobSet>,
    release: Release,
    module: Option<ModuleDescriptor>,
    directory_cache: RefCell<HashMap<String, Option<PackageListing>>>,
    session: Arc<BuildSession>,
}

impl ClasspathMultiDirectory {
    pub fn new(
        source_folder: impl Into<PathBuf>,
        output_folder: impl Into<PathBuf>,
        release: Option<u16>,
        session: Arc<BuildSession>,
    ) -> Self {
        let output_folder = output_folder.into();
        let release = Release::overlay(release);
        let binary_folder = match release.number() {
            Some(number) => output_folder.join(VERSIONS_DIR).join(number.to_string()),
            None => output_folder.clone(),
        };
        Self {
            source_folder: source_folder.into(),
            output_folder,
            binary_folder,
            inclusion_patterns: Vec::new(),
            exclusion_patterns: Vec::new(),
            inclusion: None,
            exclusion: None,
            release,
            module: None,
            directory_cache: RefCell::new(HashMap::new()),
            session,
        }
    }

    /// Sets the glob patterns used when walking the source folder.
    pub fn with_patterns(
        mut self,
        inclusion_patterns: Vec<String>,
        exclusion_patterns: Vec<String>,
    ) -> Result<Self, BuildError> {
        self.inclusion = build_glob_set(&inclusion_patterns)?;
        self.exclusion = build_glob_set(&exclusion_patterns)?;
        self.inclusion_patterns = inclusion_patterns;
        self.exclusion_patterns = exclusion_patterns;
        Ok(self)
    }

    pub fn with_module(mut self, module: ModuleDescriptor) -> Self {
        self.module = Some(module);
        self
    }

    pub fn source_folder(&self) -> &Path {
        &self.source_folder
    }

    /// Baseline output root shared by every release of this folder.
    pub fn output_folder(&self) -> &Path {
        &self.output_folder
    }

    /// Where this root's classes are written.
    pub fn binary_folder(&self) -> &Path {
        &self.binary_folder
    }

    pub fn module(&self) -> Option<&ModuleDescriptor> {
        self.module.as_ref()
    }

    pub fn inclusion_patterns(&self) -> &[String] {
        &self.inclusion_patterns
    }

    pub fn exclusion_patterns(&self) -> &[String] {
        &self.exclusion_patterns
    }

    /// Whether a path relative to the source folder is filtered out. Patterns
    /// only apply when sources and classes share one folder.
    pub fn is_excluded(&self, relative_path: &str) -> bool {
        if self.source_folder != self.binary_folder {
            return false;
        }
        if let Some(exclusion) = &self.exclusion {
            if exclusion.is_match(relative_path) {
                return true;
            }
        }
        match &self.inclusion {
            Some(inclusion) => !inclusion.is_match(relative_path),
            None => false,
        }
    }

    /// Members of a `p/q` package: folders and class files from the binary
    /// output, or folders and source files when the output has no class
    /// file for the package.
    pub fn directory_list(&self, package_name: &str) -> Option<Vec<String>> {
        self.package_listing(package_name)
            .map(|listing| listing.entries)
    }

    fn package_listing(&self, package_name: &str) -> Option<PackageListing> {
        if let Some(cached) = self.directory_cache.borrow().get(package_name) {
            return cached.clone();
        }

        let listing = self.probe_package(package_name);
        self.directory_cache
            .borrow_mut()
            .insert(package_name.to_string(), listing.clone());
        listing
    }

    fn probe_package(&self, package_name: &str) -> Option<PackageListing> {
        let binary = list_members(&self.binary_folder.join(package_name), |name| {
            name.ends_with(CLASS_SUFFIX)
        });
        if let Some((entries, true)) = &binary {
            return Some(PackageListing {
                entries: entries.clone(),
                from_source: false,
            });
        }

        let source_dir = self.source_folder.join(package_name);
        let source = list_members(&source_dir, |name| name.ends_with(SOURCE_SUFFIX))
            .map(|(entries, _)| self.filter_excluded(package_name, entries));
        // A source folder holding anything at all answers for the package,
        // even when none of it is a source file.
        let source_has_files = fs::read_dir(&source_dir)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false);
        match (binary, source) {
            (_, Some(entries)) if source_has_files => Some(PackageListing {
                entries,
                from_source: true,
            }),
            (Some((entries, _)), _) => Some(PackageListing {
                entries,
                from_source: false,
            }),
            (None, Some(entries)) => Some(PackageListing {
                entries,
                from_source: true,
            }),
            (None, None) => None,
        }
    }

    fn filter_excluded(&self, package_name: &str, entries: Vec<String>) -> Vec<String> {
        entries
            .into_iter()
            .filter(|name| {
                let relative = if package_name.is_empty() {
                    name.clone()
                } else {
                    format!("{package_name}/{name}")
                };
                !name.ends_with(SOURCE_SUFFIX) || !self.is_excluded(&relative)
            })
            .collect()
    }

    /// Reads `module-info.java` from the source folder, if there is one.
    /// Parse failures are logged and yield no module.
    pub fn initialize_module_from_source(&self) -> Option<ModuleDescriptor> {
        let path = self
            .source_folder
            .join(format!("{MODULE_INFO_NAME}{SOURCE_SUFFIX}"));
        if !path.is_file() {
            return None;
        }
        match parse_module_file(&path, &ParserOptions::for_release(self.release)) {
            Ok(module) => Some(module),
            Err(error) => {
                debug!(path = %path.display(), error = %error, "failed to parse module-info.java");
                None
            }
        }
    }
}

fn build_glob_set(patterns: &[String]) -> Result<Option<GlobSet>, BuildError> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|source| BuildError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
        builder.add(glob);
    }
    builder
        .build()
        .map(Some)
        .map_err(|source| BuildError::Pattern {
            pattern: patterns.join(", "),
            source,
        })
}

impl ClasspathLocation for ClasspathMultiDirectory {
    fn find_class(
        &self,
        query: &ClassQuery,
        module: ModuleConstraint<'_>,
        release: Release,
    ) -> Option<Answer> {
        if !self.release.applies_to(release) || !module.accepts(self.module_name()) {
            return None;
        }
        let listing = self.package_listing(&query.package_name)?;

        if !listing.from_source {
            if !listing.entries.contains(&query.binary_file_name) {
                return None;
            }
            let path = self.binary_folder.join(&query.qualified_binary_file_name);
            return read_binary_answer(
                &self.session,
                &path,
                query,
                self.module_name(),
                self.release,
            );
        }

        if query.binary_only {
            return None;
        }
        let source_name = format!("{}{SOURCE_SUFFIX}", query.type_name());
        if !listing.entries.contains(&source_name) {
            return None;
        }
        let path = self.source_folder.join(&query.package_name).join(&source_name);
        let mut answer = Answer::source(path, query.type_name(), self.release);
        answer.module_name = self.module_name().map(str::to_string);
        Some(answer)
    }

    fn release(&self) -> Release {
        self.release
    }

    fn module_name(&self) -> Option<&str> {
        self.module.as_ref().map(|module| module.name.as_str())
    }
}

impl PartialEq for ClasspathMultiDirectory {
    fn eq(&self, other: &Self) -> bool {
        self.source_folder == other.source_folder
            && self.binary_folder == other.binary_folder
            && self.inclusion_patterns == other.inclusion_patterns
            && self.exclusion_patterns == other.exclusion_patterns
    }
}

impl Eq for ClasspathMultiDirectory {}

impl fmt::Debug for ClasspathMultiDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClasspathMultiDirectory")
            .field("source_folder", &self.source_folder)
            .field("binary_folder", &self.binary_folder)
            .field("release", &self.release)
            .finish()
    }
}

impl fmt::Display for ClasspathMultiDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Source classpath directory {} with binary classpath directory {}",
            self.source_folder.display(),
            self.binary_folder.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::ClassFileWriter;
    use std::fs;

    fn write_source(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "class X {}").unwrap();
    }

    #[test]
    fn binary_members_win_over_sources() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let bin = dir.path().join("bin");
        write_source(&src, "p/A.java");
        write_source(&src, "p/B.java");
        ClassFileWriter::new("p/A")
            .write_to(&bin.join("p/A.class"))
            .unwrap();

        let root = ClasspathMultiDirectory::new(&src, &bin, None, Arc::default());
        assert_eq!(root.directory_list("p"), Some(vec!["A.class".to_string()]));

        let query = ClassQuery::from_compound(&["p", "B"]).unwrap();
        assert!(root
            .find_class(&query, ModuleConstraint::Any, Release::Unversioned)
            .is_none());
    }

    #[test]
    fn folders_only_output_falls_back_to_sources() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let bin = dir.path().join("bin");
        write_source(&src, "p/A.java");
        fs::create_dir_all(bin.join("p/internal")).unwrap();

        let root = ClasspathMultiDirectory::new(&src, &bin, None, Arc::default());
        assert_eq!(root.directory_list("p"), Some(vec!["A.java".to_string()]));

        let query = ClassQuery::from_compound(&["p", "A"]).unwrap();
        let answer = root
            .find_class(&query, ModuleConstraint::Any, Release::Unversioned)
            .expect("source answer");
        assert!(answer.is_source());
        assert!(root
            .find_class(&query.clone().binary_only(), ModuleConstraint::Any, Release::Unversioned)
            .is_none());
    }

    #[test]
    fn source_folder_without_sources_still_answers() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let bin = dir.path().join("bin");
        fs::create_dir_all(bin.join("p/sub")).unwrap();
        fs::create_dir_all(src.join("p")).unwrap();
        fs::write(src.join("p/readme.txt"), "notes").unwrap();

        let root = ClasspathMultiDirectory::new(&src, &bin, None, Arc::default());
        assert_eq!(root.directory_list("p"), Some(Vec::new()));

        fs::create_dir_all(bin.join("q/sub")).unwrap();
        fs::create_dir_all(src.join("q")).unwrap();
        assert_eq!(root.directory_list("q"), Some(vec!["sub".to_string()]));
    }

    #[test]
    fn absent_package_is_cached_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let root = ClasspathMultiDirectory::new(
            dir.path().join("src"),
            dir.path().join("bin"),
            None,
            Arc::default(),
        );
        assert_eq!(root.directory_list("nope"), None);
        write_source(&dir.path().join("src"), "nope/Late.java");
        assert_eq!(root.directory_list("nope"), None);
    }

    #[test]
    fn overlay_root_targets_versioned_output() {
        let dir = tempfile::tempdir().unwrap();
        let root = ClasspathMultiDirectory::new(
            dir.path().join("src11"),
            dir.path().join("bin"),
            Some(11),
            Arc::default(),
        );
        assert_eq!(root.release(), Release::Java(11));
        assert_eq!(
            root.binary_folder(),
            dir.path().join("bin/META-INF/versions/11")
        );

        let legacy = ClasspathMultiDirectory::new(
            dir.path().join("src8"),
            dir.path().join("bin"),
            Some(8),
            Arc::default(),
        );
        assert_eq!(legacy.release(), Release::Unversioned);
        assert_eq!(legacy.binary_folder(), dir.path().join("bin"));
    }

    #[test]
    fn patterns_apply_only_to_shared_folders() {
        let dir = tempfile::tempdir().unwrap();
        let shared = ClasspathMultiDirectory::new(dir.path(), dir.path(), None, Arc::default())
            .with_patterns(vec![], vec!["**/generated/**".to_string()])
            .unwrap();
        assert!(shared.is_excluded("p/generated/A.java"));
        assert!(!shared.is_excluded("p/A.java"));

        let separate = ClasspathMultiDirectory::new(
            dir.path().join("src"),
            dir.path().join("bin"),
            None,
            Arc::default(),
        )
        .with_patterns(vec![], vec!["**/generated/**".to_string()])
        .unwrap();
        assert!(!separate.is_excluded("p/generated/A.java"));
    }

    #[test]
    fn module_from_source_uses_bound_release() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("module-info.java"), "module app { exports p; }").unwrap();

        let root =
            ClasspathMultiDirectory::new(&src, dir.path().join("bin"), Some(11), Arc::default());
        let module = root.initialize_module_from_source().expect("module");
        assert_eq!(module.name, "app");
        assert!(module.exports_package("p"));

        fs::write(src.join("module-info.java"), "module app { exports }").unwrap();
        assert!(root.initialize_module_from_source().is_none());
    }
}
