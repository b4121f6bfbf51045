//! Reading module declarations straight from `module-info.java`.

mod module_info;

pub use module_info::{parse_module_declaration, Token, TokenKind, Tokenizer};

use crate::module::ModuleDescriptor;
use crate::release::{Release, FIRST_MULTI_RELEASE};
use std::path::Path;
use thiserror::Error;

/// Source level used when a source root is not bound to a release.
pub const DEFAULT_SOURCE_LEVEL: u16 = 21;

/// Language-level settings for parsing one compilation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    pub source_level: u16,
    pub compliance_level: u16,
    pub target_level: u16,
}

impl ParserOptions {
    pub fn new(source_level: u16) -> Self {
        Self {
            source_level,
            compliance_level: source_level,
            target_level: source_level,
        }
    }

    /// Settings for a source root bound to `release`.
    pub fn for_release(release: Release) -> Self {
        release.number().map(Self::new).unwrap_or_default()
    }

    pub fn supports_modules(&self) -> bool {
        self.source_level >= FIRST_MULTI_RELEASE
    }
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_LEVEL)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceParseError {
    #[error("Unexpected character '{ch}' at line {line}, column {column}")]
    UnexpectedChar { ch: char, line: usize, column: usize },
    #[error("Unterminated {what} starting at line {line}, column {column}")]
    Unterminated {
        what: &'static str,
        line: usize,
        column: usize,
    },
    #[error("Expected {expected} but found '{found}' at line {line}, column {column}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },
    #[error("Expected {expected} but reached end of input")]
    UnexpectedEof { expected: String },
    #[error("No module declaration found")]
    MissingModuleDeclaration,
    #[error("Module declarations require source level 9 or above (found {level})")]
    ModulesUnsupported { level: u16 },
    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },
}

/// Reads and parses a `module-info.java` file.
pub fn parse_module_file(
    path: &Path,
    options: &ParserOptions,
) -> Result<ModuleDescriptor, SourceParseError> {
    let text = std::fs::read_to_string(path).map_err(|error| SourceParseError::Io {
        path: path.display().to_string(),
        message: error.to_string(),
    })?;
    parse_module_declaration(&text, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_bound_release() {
        assert_eq!(ParserOptions::for_release(Release::Java(11)).source_level, 11);
        assert_eq!(
            ParserOptions::for_release(Release::Unversioned),
            ParserOptions::default()
        );
        assert!(!ParserOptions::new(8).supports_modules());
    }
}
