use super::{select_modules, AccessRuleSet, Answer, ClassQuery, ClasspathLocation, ModuleConstraint};
use crate::classfile::{parse_module_info, BinaryType};
use crate::jrt::{open_runtime_image, LoadTypeError, RuntimeImage, SymbolArchiveError};
use crate::release::Release;
use crate::session::{BuildSession, ModuleMap};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// The platform library entry (`<jdk>/lib/jrt-fs.jar`) answering from the
/// live runtime image.
pub struct ClasspathJrt {
    archive_path: PathBuf,
    jdk_home: PathBuf,
    image: Option<Arc<dyn RuntimeImage>>,
    access_rules: Option<AccessRuleSet>,
    external_annotation_path: Option<PathBuf>,
    session: Arc<BuildSession>,
}

impl ClasspathJrt {
    pub fn new(
        archive_path: impl Into<PathBuf>,
        access_rules: Option<AccessRuleSet>,
        external_annotation_path: Option<PathBuf>,
        session: Arc<BuildSession>,
    ) -> Result<Self, SymbolArchiveError> {
        let archive_path = archive_path.into();
        if !archive_path.is_file() {
            return Err(SymbolArchiveError::Io {
                path: archive_path,
                source: io::Error::new(io::ErrorKind::NotFound, "platform archive not found"),
            });
        }
        let jdk_home = archive_path
            .parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .ok_or_else(|| SymbolArchiveError::NoJdkHome(archive_path.clone()))?;

        let image = match open_runtime_image(&jdk_home) {
            Ok(image) => Some(image),
            Err(error) => {
                debug!(jdk = %jdk_home.display(), error = %error, "runtime image unavailable");
                None
            }
        };

        Ok(Self {
            archive_path,
            jdk_home,
            image,
            access_rules,
            external_annotation_path,
            session,
        })
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn jdk_home(&self) -> &Path {
        &self.jdk_home
    }

    pub fn session(&self) -> &Arc<BuildSession> {
        &self.session
    }

    pub fn external_annotation_path(&self) -> Option<&Path> {
        self.external_annotation_path.as_deref()
    }

    /// Module cache key of the unversioned image.
    pub fn key(&self) -> String {
        self.archive_path.display().to_string()
    }

    /// Loads `p/q/Type.class` from the runtime image.
    pub fn load_default_type(
        &self,
        qualified_binary_file_name: &str,
        module: Option<&str>,
        module_filter: &dyn Fn(&str) -> bool,
    ) -> Result<Option<Answer>, LoadTypeError> {
        let Some(image) = &self.image else {
            return Ok(None);
        };
        let Some(found) = image.find_class(qualified_binary_file_name, module, module_filter)?
        else {
            return Ok(None);
        };
        let binary = self
            .session
            .reader()
            .read(&found.bytes, qualified_binary_file_name)
            .map_err(|source| LoadTypeError::Format {
                name: qualified_binary_file_name.to_string(),
                source,
            })?;
        Ok(Some(self.create_answer(binary, Some(found.module), Release::Unversioned)))
    }

    /// Wraps a loaded type, stamping its module and applying access rules.
    pub fn create_answer(
        &self,
        binary: BinaryType,
        module_name: Option<String>,
        release: Release,
    ) -> Answer {
        let restriction = self
            .access_rules
            .as_ref()
            .and_then(|rules| rules.restriction_for(&binary.name));
        let binary = match &module_name {
            Some(module) => binary.with_module_name(module.clone()),
            None => binary,
        };
        Answer::binary(binary, module_name, release).with_restriction(restriction)
    }

    /// Populates the session module cache from the runtime image, once.
    pub fn load_modules(&self) {
        let key = self.key();
        if self.session.module_names().contains(&key) {
            return;
        }
        let Some(image) = &self.image else {
            return;
        };
        let infos = match image.module_infos() {
            Ok(infos) => infos,
            Err(error) => {
                warn!(
                    jdk = %self.jdk_home.display(),
                    error = %error,
                    "failed to read module descriptors"
                );
                return;
            }
        };

        let mut modules = ModuleMap::new();
        for (name, bytes) in infos {
            match parse_module_info(&bytes) {
                Ok(descriptor) => {
                    modules.insert(name, descriptor);
                }
                Err(error) => {
                    warn!(module = %name, error = %error, "skipping unreadable module descriptor");
                }
            }
        }
        if !modules.is_empty() {
            self.session.module_names().insert_if_absent(key, modules);
        }
    }

    pub(crate) fn module_names_for_key(&self, key: &str, limit: Option<&[String]>) -> Vec<String> {
        self.session
            .module_names()
            .get(key)
            .map(|modules| select_modules(&modules, limit))
            .unwrap_or_default()
    }
}

impl ClasspathLocation for ClasspathJrt {
    fn find_class(
        &self,
        query: &ClassQuery,
        module: ModuleConstraint<'_>,
        _release: Release,
    ) -> Option<Answer> {
        match self.load_default_type(
            &query.qualified_binary_file_name,
            module.name(),
            &|_| true,
        ) {
            Ok(answer) => answer,
            Err(error) => {
                debug!(
                    name = %query.qualified_binary_file_name,
                    error = %error,
                    "platform type treated as missing"
                );
                None
            }
        }
    }

    fn module_names(&self, limit: Option<&[String]>) -> Vec<String> {
        self.load_modules();
        self.module_names_for_key(&self.key(), limit)
    }

    fn has_module(&self) -> bool {
        true
    }
}

impl fmt::Debug for ClasspathJrt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClasspathJrt")
            .field("archive_path", &self.archive_path)
            .field("image", &self.image.is_some())
            .finish()
    }
}

impl fmt::Display for ClasspathJrt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Classpath jrt file {}", self.archive_path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{ClassFileWriter, MemberSpec};
    use crate::classpath::AccessRuleKind;
    use crate::module::ModuleDescriptor;
    use std::fs;

    fn fake_jdk(root: &Path) -> PathBuf {
        let archive = root.join("lib/jrt-fs.jar");
        fs::create_dir_all(archive.parent().unwrap()).unwrap();
        fs::write(&archive, b"").unwrap();
        let modules = root.join("modules");
        ClassFileWriter::new("java/lang/Object")
            .method(MemberSpec::public("hashCode", "()I"))
            .write_to(&modules.join("java.base/java/lang/Object.class"))
            .unwrap();
        ClassFileWriter::module_info(&ModuleDescriptor::new("java.base"))
            .write_to(&modules.join("java.base/module-info.class"))
            .unwrap();
        archive
    }

    #[test]
    fn answers_from_runtime_image_with_module() {
        let dir = tempfile::tempdir().unwrap();
        let archive = fake_jdk(dir.path());
        let jrt = ClasspathJrt::new(&archive, None, None, Arc::default()).unwrap();
        assert_eq!(jrt.jdk_home(), dir.path());

        let query = ClassQuery::from_compound(&["java", "lang", "Object"]).unwrap();
        let answer = jrt
            .find_class(&query, ModuleConstraint::Any, Release::Unversioned)
            .expect("found");
        assert_eq!(answer.module_name.as_deref(), Some("java.base"));
        assert_eq!(
            answer.binary_type().unwrap().module_name.as_deref(),
            Some("java.base")
        );
        assert!(jrt
            .find_class(&query, ModuleConstraint::Named("java.sql"), Release::Unversioned)
            .is_none());
    }

    #[test]
    fn module_listing_is_cached_in_session() {
        let dir = tempfile::tempdir().unwrap();
        let archive = fake_jdk(dir.path());
        let session = Arc::new(BuildSession::new());
        let jrt = ClasspathJrt::new(&archive, None, None, Arc::clone(&session)).unwrap();

        assert_eq!(jrt.module_names(None), vec!["java.base".to_string()]);
        assert!(session.module_names().contains(&jrt.key()));
        assert!(jrt.module_names(Some(&["java.sql".to_string()])).is_empty());
    }

    #[test]
    fn access_rules_restrict_answers() {
        let dir = tempfile::tempdir().unwrap();
        let archive = fake_jdk(dir.path());
        let rules =
            AccessRuleSet::new([("java/lang/**", AccessRuleKind::Forbidden)], "jrt").unwrap();
        let jrt = ClasspathJrt::new(&archive, Some(rules), None, Arc::default()).unwrap();
        let query = ClassQuery::from_compound(&["java", "lang", "Object"]).unwrap();
        let answer = jrt
            .find_class(&query, ModuleConstraint::Any, Release::Unversioned)
            .unwrap();
        assert_eq!(
            answer.access_restriction.map(|restriction| restriction.kind),
            Some(AccessRuleKind::Forbidden)
        );
    }

    #[test]
    fn missing_archive_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            ClasspathJrt::new(dir.path().join("lib/jrt-fs.jar"), None, None, Arc::default());
        assert!(matches!(result, Err(SymbolArchiveError::Io { .. })));
    }
}
