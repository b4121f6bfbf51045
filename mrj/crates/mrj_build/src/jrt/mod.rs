//! Access to the platform's own class library: the release-indexed symbol
//! archive (`lib/ct.sym`) and the live runtime image.

mod ctsym;
mod image;
mod release_classes;

pub use ctsym::{CtSym, CT_SYM_PATH, MODULE_INFO_SIG, SYSTEM_MODULES_MARKER};
pub use image::{open_runtime_image, ExplodedImage, ImageClass, JmodImage, RuntimeImage};
pub use release_classes::JrtReleaseClasses;

use crate::classfile::ClassParseError;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use zip::result::ZipError;

/// Location of the platform-library archive inside a JDK home.
pub const JRT_ARCHIVE_PATH: &str = "lib/jrt-fs.jar";

#[derive(Debug, Error)]
pub enum SymbolArchiveError {
    #[error("IO error while reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("ZIP error while reading {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("release {release} is not found in the system")]
    ReleaseNotFound { release: u16 },
    #[error("no runtime image found under {0}")]
    NoRuntimeImage(PathBuf),
    #[error("cannot derive the JDK home from {0}")]
    NoJdkHome(PathBuf),
}

/// Failure while loading one type; callers treat every variant as "not found".
#[derive(Debug, Error)]
pub enum LoadTypeError {
    #[error("{0}")]
    Init(Arc<SymbolArchiveError>),
    #[error(transparent)]
    Archive(#[from] SymbolArchiveError),
    #[error("malformed binary type {name}: {source}")]
    Format {
        name: String,
        #[source]
        source: ClassParseError,
    },
}
