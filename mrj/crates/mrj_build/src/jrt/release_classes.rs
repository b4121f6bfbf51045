use super::{CtSym, LoadTypeError, SymbolArchiveError, MODULE_INFO_SIG, SYSTEM_MODULES_MARKER};
use crate::classfile::{parse_module_info, CLASS_SUFFIX, SIGNATURE_SUFFIX};
use crate::classpath::{Answer, ClasspathJrt};
use crate::release::{release_code, Release};
use crate::session::ModuleMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Platform classes as seen by one `--release`, read from `lib/ct.sym`.
///
/// A release the archive does not know records an error that only surfaces
/// once a type is actually requested. A release marked `system-modules`
/// carries no data of its own and is served from the runtime image.
#[derive(Debug)]
pub struct JrtReleaseClasses {
    release: u16,
    release_code: char,
    ct_sym: Option<Arc<CtSym>>,
    archive_backed: bool,
    mod_path_key: Option<String>,
    init_error: Option<Arc<SymbolArchiveError>>,
}

impl JrtReleaseClasses {
    pub fn new(jrt: &ClasspathJrt, release: u16) -> Self {
        let mut classes = Self {
            release,
            release_code: '0',
            ct_sym: None,
            archive_backed: false,
            mod_path_key: None,
            init_error: None,
        };

        let Some(code) = release_code(release) else {
            debug!(release, "release has no symbol archive code");
            classes.init_error = Some(Arc::new(SymbolArchiveError::ReleaseNotFound { release }));
            classes.load_modules(jrt);
            return classes;
        };
        classes.release_code = code;

        match jrt.session().symbol_archive(jrt.jdk_home()) {
            Ok(ct_sym) => {
                let module_dir = ct_sym.module_dir(code);
                if ct_sym.contains_dir(&module_dir) {
                    classes.mod_path_key = Some(format!("{}|{module_dir}", jrt.key()));
                }
                if !ct_sym.contains_dir(&code.to_string()) {
                    classes.init_error = Some(Arc::new(SymbolArchiveError::ReleaseNotFound {
                        release,
                    }));
                } else if ct_sym.exists(&format!("{code}/{SYSTEM_MODULES_MARKER}")) {
                    debug!(release, "release served from the runtime image");
                } else {
                    classes.archive_backed = true;
                }
                classes.ct_sym = Some(ct_sym);
            }
            Err(error) => {
                debug!(release, error = %error, "symbol archive unavailable");
                classes.init_error = Some(Arc::new(error));
            }
        }

        classes.load_modules(jrt);
        classes
    }

    pub fn release(&self) -> u16 {
        self.release
    }

    /// Loads `p/q/Type.class` as it looked in this release.
    pub fn load_type(
        &self,
        jrt: &ClasspathJrt,
        qualified_binary_file_name: &str,
        module: Option<&str>,
        module_filter: &dyn Fn(&str) -> bool,
    ) -> Result<Option<Answer>, LoadTypeError> {
        let ct_sym = match (&self.ct_sym, self.archive_backed) {
            (Some(ct_sym), true) => ct_sym,
            _ => {
                if let Some(error) = &self.init_error {
                    return Err(LoadTypeError::Init(Arc::clone(error)));
                }
                return jrt.load_default_type(qualified_binary_file_name, module, module_filter);
            }
        };

        if ct_sym.release_roots(self.release_code).is_empty() {
            return jrt.load_default_type(qualified_binary_file_name, module, module_filter);
        }

        let type_name = qualified_binary_file_name
            .strip_suffix(CLASS_SUFFIX)
            .unwrap_or(qualified_binary_file_name);
        let signature_path = format!("{type_name}{SIGNATURE_SUFFIX}");
        let Some(full_path) = ct_sym.full_path(self.release_code, &signature_path, module) else {
            return Ok(None);
        };

        let bytes = ct_sym.file_bytes(&full_path)?;
        let binary = jrt
            .session()
            .reader()
            .read(&bytes, &signature_path)
            .map_err(|source| LoadTypeError::Format {
                name: full_path.clone(),
                source,
            })?;

        let module_name = match module {
            Some(module) => Some(module.to_string()),
            None if ct_sym.is_jre12_plus() => ct_sym.module_of(self.release_code, &signature_path),
            None => None,
        };
        Ok(Some(jrt.create_answer(
            binary,
            module_name,
            Release::Java(self.release),
        )))
    }

    fn load_modules(&self, jrt: &ClasspathJrt) {
        let ct_sym = match (&self.ct_sym, self.archive_backed) {
            (Some(ct_sym), true) => ct_sym,
            _ => {
                jrt.load_modules();
                return;
            }
        };
        let Some(key) = &self.mod_path_key else {
            return;
        };
        let cache = jrt.session().module_names();
        if cache.contains(key) {
            return;
        }

        // The legacy layout keeps every descriptor under `<code>-modules`.
        let roots = if ct_sym.is_jre12_plus() {
            ct_sym.release_roots(self.release_code)
        } else {
            vec![ct_sym.module_dir(self.release_code)]
        };
        let mut modules = ModuleMap::new();
        for root in roots {
            for module in ct_sym.child_dirs(&root) {
                let path = format!("{root}/{module}/{MODULE_INFO_SIG}");
                if !ct_sym.contains_file(&path) {
                    continue;
                }
                let descriptor = ct_sym
                    .file_bytes(&path)
                    .map_err(|error| error.to_string())
                    .and_then(|bytes| parse_module_info(&bytes).map_err(|error| error.to_string()));
                match descriptor {
                    Ok(descriptor) => {
                        modules.entry(module).or_insert(descriptor);
                    }
                    Err(error) => {
                        warn!(
                            key = %key,
                            path = %path,
                            error = %error,
                            "failed to init modules cache"
                        );
                    }
                }
            }
        }

        if !modules.is_empty() {
            cache.insert_if_absent(key.clone(), modules);
        }
    }

    /// Whether this release has a module listing of its own.
    pub fn has_module(&self) -> bool {
        if self.archive_backed {
            self.mod_path_key.is_some()
        } else {
            true
        }
    }

    /// Module cache key used by this release.
    pub fn key(&self, jrt: &ClasspathJrt) -> Option<String> {
        if self.archive_backed {
            self.mod_path_key.clone()
        } else {
            Some(jrt.key())
        }
    }
}
