use crate::classpath::{
    AccessRuleKind, AccessRuleSet, ClasspathDirectory, ClasspathJrtWithRelease,
    ClasspathMultiDirectory,
};
use crate::environment::NameEnvironment;
use crate::jdk::{discover_jdk, JdkInfo};
use crate::release::{parse_release, Release, FIRST_MULTI_RELEASE, VERSIONS_DIR};
use crate::session::BuildSession;
use crate::source::DEFAULT_SOURCE_LEVEL;
use crate::BuildError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// One source folder and the overlay release it compiles for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRootConfig {
    pub source_folder: PathBuf,
    /// `None` (or anything below 9) compiles into the baseline output.
    pub release: Option<u16>,
    pub inclusion_patterns: Vec<String>,
    pub exclusion_patterns: Vec<String>,
}

impl SourceRootConfig {
    pub fn new(source_folder: impl Into<PathBuf>) -> Self {
        Self {
            source_folder: source_folder.into(),
            release: None,
            inclusion_patterns: Vec::new(),
            exclusion_patterns: Vec::new(),
        }
    }

    pub fn with_release(mut self, release: u16) -> Self {
        self.release = Some(release);
        self
    }

    pub fn with_exclusions<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusion_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_inclusions<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inclusion_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }
}

/// Top-level configuration of a multi-release build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Baseline output root; overlays go to `META-INF/versions/<n>` below it.
    pub output_dir: PathBuf,
    pub source_roots: Vec<SourceRootConfig>,
    /// Additional binary directories on the classpath.
    pub classpath: Vec<PathBuf>,
    /// Explicit JDK; discovered from the environment when absent.
    pub java_home: Option<PathBuf>,
    /// Compliance level passed through `--release` normalisation.
    pub compliance: String,
    pub access_rules: Vec<(String, AccessRuleKind)>,
    pub external_annotation_path: Option<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./out"),
            source_roots: Vec::new(),
            classpath: Vec::new(),
            java_home: None,
            compliance: DEFAULT_SOURCE_LEVEL.to_string(),
            access_rules: Vec::new(),
            external_annotation_path: None,
        }
    }
}

impl BuildConfig {
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_source_root(mut self, root: SourceRootConfig) -> Self {
        self.source_roots.push(root);
        self
    }

    pub fn with_java_home(mut self, java_home: impl Into<PathBuf>) -> Self {
        self.java_home = Some(java_home.into());
        self
    }

    pub fn with_compliance(mut self, compliance: impl Into<String>) -> Self {
        self.compliance = compliance.into();
        self
    }

    pub fn add_classpath<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.classpath.extend(entries);
    }

    /// Output folder of an overlay release.
    pub fn overlay_output_dir(&self, release: u16) -> PathBuf {
        self.output_dir.join(VERSIONS_DIR).join(release.to_string())
    }

    /// Checks release bindings and the compliance level.
    pub fn validate(&self) -> Result<(), BuildError> {
        parse_release(&self.compliance)?;
        for (index, root) in self.source_roots.iter().enumerate() {
            if self.source_roots[..index]
                .iter()
                .any(|other| other.source_folder == root.source_folder)
            {
                return Err(BuildError::ConfigError(format!(
                    "source folder '{}' is configured more than once",
                    root.source_folder.display()
                )));
            }
            if let Some(release) = root.release {
                if release < FIRST_MULTI_RELEASE {
                    warn!(
                        folder = %root.source_folder.display(),
                        release,
                        "overlay release below 9 compiles into the baseline output"
                    );
                }
            }
        }
        Ok(())
    }

    /// Builds the overlay source roots, reading each root's
    /// `module-info.java` when present.
    pub fn source_locations(
        &self,
        session: &Arc<BuildSession>,
    ) -> Result<Vec<ClasspathMultiDirectory>, BuildError> {
        self.source_roots
            .iter()
            .map(|root| {
                let location = ClasspathMultiDirectory::new(
                    &root.source_folder,
                    &self.output_dir,
                    root.release,
                    Arc::clone(session),
                )
                .with_patterns(
                    root.inclusion_patterns.clone(),
                    root.exclusion_patterns.clone(),
                )?;
                Ok(match location.initialize_module_from_source() {
                    Some(module) => location.with_module(module),
                    None => location,
                })
            })
            .collect()
    }

    fn jdk(&self) -> Result<Option<JdkInfo>, BuildError> {
        match &self.java_home {
            Some(home) => JdkInfo::from_home(home).map(Some),
            None => match discover_jdk() {
                Ok(info) => Ok(Some(info)),
                Err(error) => {
                    warn!(error = %error, "continuing without platform classes");
                    Ok(None)
                }
            },
        }
    }

    /// Assembles the name environment: overlay source roots, extra binary
    /// directories, then the platform library at the configured release.
    pub fn name_environment(
        &self,
        session: &Arc<BuildSession>,
    ) -> Result<NameEnvironment, BuildError> {
        self.validate()?;
        let mut environment = NameEnvironment::default();

        for location in self.source_locations(session)? {
            environment.push(Box::new(location));
        }
        for entry in &self.classpath {
            environment.push(Box::new(ClasspathDirectory::new(
                entry,
                Release::Unversioned,
                Arc::clone(session),
            )));
        }

        if let Some(jdk) = self.jdk()? {
            let rules = self.platform_access_rules(&jdk.jrt_archive())?;
            let entry = ClasspathJrtWithRelease::new(
                jdk.jrt_archive(),
                rules,
                self.external_annotation_path.clone(),
                &self.compliance,
                Arc::clone(session),
            )?;
            debug!(entry = %entry, "platform library configured");
            environment.push(Box::new(entry));
        }

        Ok(environment)
    }

    fn platform_access_rules(&self, archive: &Path) -> Result<Option<AccessRuleSet>, BuildError> {
        if self.access_rules.is_empty() {
            return Ok(None);
        }
        AccessRuleSet::new(self.access_rules.iter().cloned(), archive.display().to_string())
            .map(Some)
            .map_err(|source| BuildError::Pattern {
                pattern: self
                    .access_rules
                    .iter()
                    .map(|(pattern, _)| pattern.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::ReleaseError;

    #[test]
    fn overlay_output_dir_is_versioned() {
        let config = BuildConfig::default().with_output_dir("/tmp/out");
        assert_eq!(
            config.overlay_output_dir(11),
            PathBuf::from("/tmp/out/META-INF/versions/11")
        );
    }

    #[test]
    fn invalid_compliance_fails_validation() {
        let config = BuildConfig::default().with_compliance("1.8.1");
        assert!(matches!(
            config.validate(),
            Err(BuildError::Release(ReleaseError::Invalid(_)))
        ));
    }

    #[test]
    fn duplicate_source_folders_are_rejected() {
        let config = BuildConfig::default()
            .with_source_root(SourceRootConfig::new("src"))
            .with_source_root(SourceRootConfig::new("src").with_release(11));
        assert!(matches!(config.validate(), Err(BuildError::ConfigError(_))));
    }

    #[test]
    fn source_locations_follow_roots() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig::default()
            .with_output_dir(dir.path().join("bin"))
            .with_source_root(SourceRootConfig::new(dir.path().join("src")))
            .with_source_root(SourceRootConfig::new(dir.path().join("src11")).with_release(11));
        let session = Arc::new(BuildSession::new());
        let locations = config.source_locations(&session).unwrap();

        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0].binary_folder(), dir.path().join("bin"));
        assert_eq!(locations[1].binary_folder(), config.overlay_output_dir(11));
    }

    #[test]
    fn explicit_java_home_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig::default().with_java_home(dir.path().join("missing"));
        let session = Arc::new(BuildSession::new());
        assert!(matches!(
            config.name_environment(&session),
            Err(BuildError::JdkNotFound(_))
        ));
    }

    #[test]
    fn inclusion_patterns_reach_source_locations() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig::default()
            .with_output_dir(dir.path())
            .with_source_root(SourceRootConfig::new(dir.path()).with_inclusions(["p/**"]));
        let session = Arc::new(BuildSession::new());
        let locations = config.source_locations(&session).unwrap();
        assert_eq!(locations[0].inclusion_patterns(), ["p/**".to_string()]);
        assert!(locations[0].exclusion_patterns().is_empty());
    }

    #[test]
    fn bad_exclusion_pattern_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig::default()
            .with_output_dir(dir.path())
            .with_source_root(SourceRootConfig::new(dir.path()).with_exclusions(["a[b"]));
        let session = Arc::new(BuildSession::new());
        assert!(matches!(
            config.source_locations(&session),
            Err(BuildError::Pattern { .. })
        ));
    }
}
