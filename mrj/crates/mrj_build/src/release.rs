use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The first Java release that supports multi-release output.
pub const FIRST_MULTI_RELEASE: u16 = 9;

/// Oldest release carried by the JDK symbol archive (JDK 11 dropped 5).
pub const OLDEST_SYMBOL_RELEASE: u16 = 6;

/// Relative location of versioned overlay output inside the baseline output.
pub const VERSIONS_DIR: &str = "META-INF/versions";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReleaseError {
    #[error("--release argument can not be null or empty")]
    Empty,
    #[error("Invalid value for --release argument: {0}")]
    Invalid(String),
}

/// Release a lookup or an output variant is bound to.
///
/// `Unversioned` is the "no specific release" sentinel and always sorts
/// before every concrete release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Release {
    #[default]
    Unversioned,
    Java(u16),
}

impl Release {
    /// Binds an explicit release to an overlay root; anything older than
    /// [`FIRST_MULTI_RELEASE`] collapses to the sentinel.
    pub fn overlay(value: Option<u16>) -> Self {
        match value {
            Some(release) if release >= FIRST_MULTI_RELEASE => Release::Java(release),
            _ => Release::Unversioned,
        }
    }

    pub fn number(self) -> Option<u16> {
        match self {
            Release::Unversioned => None,
            Release::Java(release) => Some(release),
        }
    }

    pub fn is_versioned(self) -> bool {
        matches!(self, Release::Java(_))
    }

    /// Whether output bound to `self` may answer a lookup made at `requested`.
    pub fn applies_to(self, requested: Release) -> bool {
        match (self, requested) {
            (Release::Unversioned, _) => true,
            (Release::Java(_), Release::Unversioned) => false,
            (Release::Java(own), Release::Java(limit)) => own <= limit,
        }
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Release::Unversioned => f.write_str("base"),
            Release::Java(release) => write!(f, "{release}"),
        }
    }
}

/// Normalises a compliance string into the value accepted by `--release`.
pub fn release_option_from_compliance(compliance: &str) -> Result<String, ReleaseError> {
    let compliance = compliance.trim();
    if compliance.is_empty() {
        return Err(ReleaseError::Empty);
    }

    if let Some(level) = compliance_level(compliance) {
        if level <= 5 {
            return Ok(OLDEST_SYMBOL_RELEASE.to_string());
        }
    }

    if let Some(minor) = compliance.strip_prefix("1.") {
        if minor.is_empty() || minor.contains('.') {
            return Err(ReleaseError::Invalid(compliance.to_string()));
        }
        return Ok(minor.to_string());
    }

    if !compliance.contains('.') {
        return Ok(compliance.to_string());
    }

    Err(ReleaseError::Invalid(compliance.to_string()))
}

/// Parses a compliance string straight to the release number.
pub fn parse_release(compliance: &str) -> Result<u16, ReleaseError> {
    let option = release_option_from_compliance(compliance)?;
    option
        .parse::<u16>()
        .map_err(|_| ReleaseError::Invalid(compliance.to_string()))
}

fn compliance_level(compliance: &str) -> Option<u16> {
    let token = compliance.strip_prefix("1.").unwrap_or(compliance);
    let digits: String = token.chars().take_while(|ch| ch.is_ascii_digit()).collect();
    if digits.is_empty() || digits.len() != token.len() {
        return None;
    }
    digits.parse::<u16>().ok()
}

/// Release code used for directory names inside `ct.sym`; codes are a
/// single base-36 digit, so releases above 35 have none.
pub fn release_code(release: u16) -> Option<char> {
    std::char::from_digit(u32::from(release), 36).map(|ch| ch.to_ascii_uppercase())
}

/// Release number of an overlay output directory name, if it is one.
pub fn overlay_release_from_dir_name(name: &str) -> Option<u16> {
    name.parse::<u16>().ok()
}
