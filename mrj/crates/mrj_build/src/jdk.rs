use crate::jrt::{CT_SYM_PATH, JRT_ARCHIVE_PATH};
use crate::BuildError;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A JDK installation usable as the platform library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JdkInfo {
    pub java_home: PathBuf,
    /// Feature release read from `<home>/release`, when present.
    pub feature_version: Option<u16>,
}

impl JdkInfo {
    /// Describes the JDK rooted at `java_home`; it must carry
    /// `lib/jrt-fs.jar`.
    pub fn from_home(java_home: impl Into<PathBuf>) -> Result<Self, BuildError> {
        let java_home = java_home.into();
        if !java_home.join(JRT_ARCHIVE_PATH).is_file() {
            return Err(BuildError::JdkNotFound(format!(
                "'{}' does not contain {JRT_ARCHIVE_PATH}",
                java_home.display()
            )));
        }
        let feature_version = read_release_file(&java_home);
        Ok(Self {
            java_home,
            feature_version,
        })
    }

    pub fn jrt_archive(&self) -> PathBuf {
        self.java_home.join(JRT_ARCHIVE_PATH)
    }

    pub fn has_symbol_archive(&self) -> bool {
        self.java_home.join(CT_SYM_PATH).is_file()
    }
}

/// Locates a JDK through `JAVA_HOME`/`JDK_HOME`, `javac` on the `PATH`,
/// then well-known installation roots.
pub fn discover_jdk() -> Result<JdkInfo, BuildError> {
    let home = find_home_from_env()
        .or_else(find_home_in_path)
        .or_else(search_known_installations)
        .ok_or_else(|| {
            BuildError::JdkNotFound(
                "Unable to locate a JDK. Set JAVA_HOME or pass --jdk.".into(),
            )
        })?;
    debug!(home = %home.display(), "discovered JDK");
    JdkInfo::from_home(home)
}

fn find_home_from_env() -> Option<PathBuf> {
    ["JAVA_HOME", "JDK_HOME"]
        .into_iter()
        .filter_map(env::var_os)
        .map(PathBuf::from)
        .find(|home| is_jdk_home(home))
}

fn find_home_in_path() -> Option<PathBuf> {
    let javac = which::which("javac").ok()?;
    let javac = fs::canonicalize(&javac).unwrap_or(javac);
    let home = javac.parent()?.parent()?.to_path_buf();
    is_jdk_home(&home).then_some(home)
}

fn search_known_installations() -> Option<PathBuf> {
    known_jdk_roots()
        .into_iter()
        .find_map(|root| search_root_for_jdk(&root))
}

fn known_jdk_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();

    #[cfg(target_os = "windows")]
    {
        if let Some(dir) = env::var_os("ProgramFiles").map(PathBuf::from) {
            roots.push(dir.join("Java"));
            roots.push(dir.join("Eclipse Adoptium"));
            roots.push(dir.join("Zulu"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        roots.push(PathBuf::from("/Library/Java/JavaVirtualMachines"));
        roots.push(PathBuf::from("/opt/homebrew/opt/openjdk/libexec/openjdk.jdk"));
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        roots.push(PathBuf::from("/usr/lib/jvm"));
        roots.push(PathBuf::from("/usr/java"));
        roots.push(PathBuf::from("/opt/java"));
    }

    roots
}

fn search_root_for_jdk(root: &Path) -> Option<PathBuf> {
    if !root.is_dir() {
        return None;
    }
    if is_jdk_home(root) {
        return Some(root.to_path_buf());
    }

    let mut candidates: Vec<PathBuf> = fs::read_dir(root)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    // Newest-looking installation first.
    candidates.sort();
    candidates.reverse();

    candidates.into_iter().find_map(|path| {
        let contents_home = path.join("Contents").join("Home");
        if is_jdk_home(&contents_home) {
            Some(contents_home)
        } else {
            is_jdk_home(&path).then_some(path)
        }
    })
}

fn is_jdk_home(home: &Path) -> bool {
    home.join(JRT_ARCHIVE_PATH).is_file()
}

/// Reads `JAVA_VERSION="..."` from the JDK `release` file.
fn read_release_file(home: &Path) -> Option<u16> {
    let content = fs::read_to_string(home.join("release")).ok()?;
    content.lines().find_map(|line| {
        let value = line.strip_prefix("JAVA_VERSION=")?;
        interpret_version_token(value.trim().trim_matches('"'))
    })
}

fn interpret_version_token(token: &str) -> Option<u16> {
    if let Some(stripped) = token.strip_prefix("1.") {
        let minor = stripped.split(['.', '_', '-']).next()?;
        return leading_number(minor);
    }
    leading_number(token)
}

fn leading_number(token: &str) -> Option<u16> {
    let digits: String = token.chars().take_while(|ch| ch.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse::<u16>().ok()
    }
}
