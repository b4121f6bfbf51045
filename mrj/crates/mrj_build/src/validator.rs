//! Post-build check that overlay variants keep the baseline's public API.

use crate::classfile::{BinaryType, BinaryTypeReader, CLASS_SUFFIX, SOURCE_SUFFIX};
use crate::classpath::{ClasspathLocation, ClasspathMultiDirectory};
use crate::problem::{Problem, ProblemReporter, Severity};
use crate::release::{overlay_release_from_dir_name, Release, VERSIONS_DIR};
use crate::session::BuildSession;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// One compiled class file and the release it was produced for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeVariant {
    pub class_file: PathBuf,
    pub release: Release,
}

/// Public methods `(name, descriptor)` and public fields `(name, descriptor)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiSignature {
    pub methods: BTreeSet<(String, String)>,
    pub fields: BTreeSet<(String, String)>,
}

impl ApiSignature {
    pub fn of(binary: &BinaryType) -> Self {
        Self {
            methods: binary
                .public_methods()
                .map(|method| (method.name.clone(), method.descriptor.clone()))
                .collect(),
            fields: binary
                .public_fields()
                .map(|field| (field.name.clone(), field.descriptor.clone()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    /// Types produced for more than one release.
    pub multi_release_types: usize,
    /// Overlay variants compared against their baseline.
    pub comparisons: usize,
    pub problems: usize,
}

/// Compares every overlay variant of a type with its baseline variant and
/// reports public members the overlay dropped.
pub struct MultiReleaseApiValidator<'a> {
    roots: &'a [ClasspathMultiDirectory],
    reader: &'a dyn BinaryTypeReader,
}

impl<'a> MultiReleaseApiValidator<'a> {
    pub fn new(roots: &'a [ClasspathMultiDirectory], session: &'a BuildSession) -> Self {
        Self {
            roots,
            reader: session.reader(),
        }
    }

    pub fn validate(&self, reporter: &dyn ProblemReporter) -> ValidationSummary {
        let mut summary = ValidationSummary::default();
        for (type_name, mut variants) in self.collect_variants() {
            if variants.len() < 2 {
                continue;
            }
            variants.sort_by(|a, b| {
                a.release
                    .cmp(&b.release)
                    .then_with(|| a.class_file.cmp(&b.class_file))
            });
            summary.multi_release_types += 1;
            self.validate_type(&type_name, &variants, reporter, &mut summary);
        }
        debug!(
            types = summary.multi_release_types,
            comparisons = summary.comparisons,
            problems = summary.problems,
            "multi-release API validation finished"
        );
        summary
    }

    /// Class files of every output folder grouped by internal type name.
    pub fn collect_variants(&self) -> BTreeMap<String, Vec<TypeVariant>> {
        let mut variants: BTreeMap<String, Vec<TypeVariant>> = BTreeMap::new();
        let outputs: BTreeSet<&Path> = self.roots.iter().map(|root| root.output_folder()).collect();

        for output in outputs {
            collect_from_folder(output, Release::Unversioned, &mut variants);

            let versions = output.join(VERSIONS_DIR);
            let Ok(entries) = fs::read_dir(&versions) else {
                continue;
            };
            for entry in entries.flatten() {
                if !entry.file_type().is_ok_and(|file_type| file_type.is_dir()) {
                    continue;
                }
                let name = entry.file_name();
                let Some(release) = name.to_str().and_then(overlay_release_from_dir_name) else {
                    continue;
                };
                collect_from_folder(&entry.path(), Release::Java(release), &mut variants);
            }
        }
        variants
    }

    fn validate_type(
        &self,
        type_name: &str,
        variants: &[TypeVariant],
        reporter: &dyn ProblemReporter,
        summary: &mut ValidationSummary,
    ) {
        let Some((baseline, later)) = variants.split_first() else {
            return;
        };
        let Some(baseline_signature) = self.read_signature(baseline) else {
            return;
        };

        for variant in later {
            let Release::Java(release) = variant.release else {
                continue;
            };
            let Some(signature) = self.read_signature(variant) else {
                continue;
            };
            summary.comparisons += 1;

            let resource = self
                .find_source_file(type_name, variant.release)
                .unwrap_or_else(|| variant.class_file.clone());
            let display_name = type_name.replace('/', ".");

            for (name, descriptor) in &baseline_signature.methods {
                if signature.methods.contains(&(name.clone(), descriptor.clone())) {
                    continue;
                }
                summary.problems += 1;
                reporter.report(problem(
                    &resource,
                    format!(
                        "Multi-Release type '{display_name}': public method '{name}' from base version is missing in version {release}"
                    ),
                ));
            }
            for (name, descriptor) in &baseline_signature.fields {
                if signature.fields.contains(&(name.clone(), descriptor.clone())) {
                    continue;
                }
                summary.problems += 1;
                reporter.report(problem(
                    &resource,
                    format!(
                        "Multi-Release type '{display_name}': public field '{name}' from base version is missing in version {release}"
                    ),
                ));
            }
        }
    }

    fn read_signature(&self, variant: &TypeVariant) -> Option<ApiSignature> {
        let path = &variant.class_file;
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(path = %path.display(), error = %error, "unable to read class file");
                return None;
            }
        };
        match self.reader.read(&bytes, &path.to_string_lossy()) {
            Ok(binary) => Some(ApiSignature::of(&binary)),
            Err(error) => {
                warn!(path = %path.display(), error = %error, "skipping unreadable class file");
                None
            }
        }
    }

    /// Source file that produced `type_name` for `release`; nested types map
    /// to the file of their outermost type.
    pub fn find_source_file(&self, type_name: &str, release: Release) -> Option<PathBuf> {
        let (package, simple) = match type_name.rsplit_once('/') {
            Some((package, simple)) => (Some(package), simple),
            None => (None, type_name),
        };
        let outer = simple.split('$').next().unwrap_or(simple);
        let relative = match package {
            Some(package) => format!("{package}/{outer}{SOURCE_SUFFIX}"),
            None => format!("{outer}{SOURCE_SUFFIX}"),
        };

        self.roots
            .iter()
            .filter(|root| release == Release::Unversioned || root.release() == release)
            .map(|root| root.source_folder().join(&relative))
            .find(|candidate| candidate.is_file())
    }
}

fn collect_from_folder(
    folder: &Path,
    release: Release,
    variants: &mut BTreeMap<String, Vec<TypeVariant>>,
) {
    let versions = folder.join(VERSIONS_DIR);
    let walker = WalkDir::new(folder)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| release.is_versioned() || entry.path() != versions.as_path());

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                debug!(
                    folder = %folder.display(),
                    error = %error,
                    "skipping unreadable output entry"
                );
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(folder) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let Some(type_name) = relative.strip_suffix(CLASS_SUFFIX) else {
            continue;
        };
        variants
            .entry(type_name.to_string())
            .or_default()
            .push(TypeVariant {
                class_file: entry.path().to_path_buf(),
                release,
            });
    }
}

fn problem(resource: &Path, message: String) -> Problem {
    Problem {
        resource: resource.to_path_buf(),
        range: None,
        message,
        severity: Severity::Error,
    }
}
