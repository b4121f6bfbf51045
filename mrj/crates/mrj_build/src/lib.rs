// mrj_build - Release-aware type resolution and multi-release API validation
pub mod classfile;
pub mod classpath;
mod config;
pub mod environment;
pub mod jdk;
pub mod jrt;
pub mod module;
pub mod problem;
pub mod release;
pub mod session;
pub mod source;
pub mod validator;

pub use config::{BuildConfig, SourceRootConfig};
pub use environment::NameEnvironment;
pub use jdk::{discover_jdk, JdkInfo};
pub use problem::{CollectingReporter, Problem, ProblemReporter, Severity};
pub use release::{Release, ReleaseError};
pub use session::BuildSession;
pub use validator::{MultiReleaseApiValidator, ValidationSummary};

use jrt::SymbolArchiveError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Build configuration error: {0}")]
    ConfigError(String),
    #[error(transparent)]
    Release(#[from] ReleaseError),
    #[error("JDK not found: {0}")]
    JdkNotFound(String),
    #[error(transparent)]
    SymbolArchive(#[from] SymbolArchiveError),
    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
