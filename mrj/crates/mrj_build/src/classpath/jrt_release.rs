use super::{AccessRuleSet, Answer, ClassQuery, ClasspathJrt, ClasspathLocation, ModuleConstraint};
use crate::jrt::JrtReleaseClasses;
use crate::release::{parse_release, release_option_from_compliance, Release};
use crate::session::BuildSession;
use crate::BuildError;
use once_cell::sync::OnceCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Platform library entry compiled against a fixed `--release`.
///
/// Lookups without a release are served from the symbol archive for the
/// entry's own release; lookups naming a concrete release use the plain
/// runtime image.
pub struct ClasspathJrtWithRelease {
    jrt: ClasspathJrt,
    release: String,
    release_number: u16,
    release_classes: OnceCell<JrtReleaseClasses>,
}

impl ClasspathJrtWithRelease {
    pub fn new(
        archive_path: impl Into<PathBuf>,
        access_rules: Option<AccessRuleSet>,
        external_annotation_path: Option<PathBuf>,
        compliance: &str,
        session: Arc<BuildSession>,
    ) -> Result<Self, BuildError> {
        let release = release_option_from_compliance(compliance)?;
        let release_number = parse_release(&release)?;
        let jrt = ClasspathJrt::new(archive_path, access_rules, external_annotation_path, session)?;
        Ok(Self {
            jrt,
            release,
            release_number,
            release_classes: OnceCell::new(),
        })
    }

    /// Normalised `--release` value, e.g. `"8"` for compliance `"1.8"`.
    pub fn release_option(&self) -> &str {
        &self.release
    }

    pub fn release_number(&self) -> u16 {
        self.release_number
    }

    pub fn archive_path(&self) -> &Path {
        self.jrt.archive_path()
    }

    pub fn external_annotation_path(&self) -> Option<&Path> {
        self.jrt.external_annotation_path()
    }

    fn release_classes(&self) -> &JrtReleaseClasses {
        self.release_classes
            .get_or_init(|| JrtReleaseClasses::new(&self.jrt, self.release_number))
    }

    /// Module cache key for this entry's release.
    pub fn key(&self) -> Option<String> {
        self.release_classes().key(&self.jrt)
    }
}

impl ClasspathLocation for ClasspathJrtWithRelease {
    fn find_class(
        &self,
        query: &ClassQuery,
        module: ModuleConstraint<'_>,
        release: Release,
    ) -> Option<Answer> {
        if release.is_versioned() {
            return self.jrt.find_class(query, module, release);
        }
        match self.release_classes().load_type(
            &self.jrt,
            &query.qualified_binary_file_name,
            module.name(),
            &|_| true,
        ) {
            Ok(answer) => answer,
            Err(error) => {
                debug!(
                    name = %query.qualified_binary_file_name,
                    release = %self.release,
                    error = %error,
                    "platform type treated as missing"
                );
                None
            }
        }
    }

    fn module_names(&self, limit: Option<&[String]>) -> Vec<String> {
        self.key()
            .map(|key| self.jrt.module_names_for_key(&key, limit))
            .unwrap_or_default()
    }

    fn has_module(&self) -> bool {
        self.release_classes().has_module()
    }
}

impl PartialEq for ClasspathJrtWithRelease {
    fn eq(&self, other: &Self) -> bool {
        self.release == other.release && self.jrt.archive_path() == other.jrt.archive_path()
    }
}

impl Eq for ClasspathJrtWithRelease {}

impl Hash for ClasspathJrtWithRelease {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.jrt.archive_path().hash(state);
        self.release.hash(state);
    }
}

impl fmt::Debug for ClasspathJrtWithRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClasspathJrtWithRelease")
            .field("archive_path", &self.jrt.archive_path())
            .field("release", &self.release)
            .field("initialized", &self.release_classes.get().is_some())
            .finish()
    }
}

impl fmt::Display for ClasspathJrtWithRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Classpath jrt file {} with --release option {}",
            self.jrt.archive_path().display(),
            self.release
        )
    }
}
