//! Classpath entries answering type lookups for the name environment.

mod directory;
mod jrt;
mod jrt_release;
mod multi_directory;

pub use directory::ClasspathDirectory;
pub use jrt::ClasspathJrt;
pub use jrt_release::ClasspathJrtWithRelease;
pub use multi_directory::ClasspathMultiDirectory;

use crate::classfile::{BinaryType, CLASS_SUFFIX};
use crate::release::Release;
use crate::session::ModuleMap;
use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One type lookup, expressed in file-name terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassQuery {
    /// `Type.class`
    pub binary_file_name: String,
    /// `p/q`, empty for the default package.
    pub package_name: String,
    /// `p/q/Type.class`
    pub qualified_binary_file_name: String,
    /// Skip source answers.
    pub binary_only: bool,
}

impl ClassQuery {
    /// Builds a query from a compound name such as `["java", "lang", "Object"]`.
    pub fn from_compound(compound: &[&str]) -> Option<Self> {
        let (type_name, package) = compound.split_last()?;
        Some(Self::in_package(type_name, package))
    }

    pub fn in_package(type_name: &str, package: &[&str]) -> Self {
        let package_name = package.join("/");
        let binary_file_name = format!("{type_name}{CLASS_SUFFIX}");
        let qualified_binary_file_name = if package_name.is_empty() {
            binary_file_name.clone()
        } else {
            format!("{package_name}/{binary_file_name}")
        };
        Self {
            binary_file_name,
            package_name,
            qualified_binary_file_name,
            binary_only: false,
        }
    }

    /// Parses a dotted name such as `java.lang.Object`.
    pub fn from_dotted(name: &str) -> Option<Self> {
        let parts: Vec<&str> = name.split('.').collect();
        if parts.iter().any(|part| part.is_empty()) {
            return None;
        }
        Self::from_compound(&parts)
    }

    pub fn binary_only(mut self) -> Self {
        self.binary_only = true;
        self
    }

    /// Simple name without the class suffix.
    pub fn type_name(&self) -> &str {
        self.binary_file_name
            .strip_suffix(CLASS_SUFFIX)
            .unwrap_or(&self.binary_file_name)
    }

    /// `p/q/Type`
    pub fn qualified_type_name(&self) -> &str {
        self.qualified_binary_file_name
            .strip_suffix(CLASS_SUFFIX)
            .unwrap_or(&self.qualified_binary_file_name)
    }
}

/// Which module a lookup is allowed to resolve into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleConstraint<'a> {
    #[default]
    Any,
    Unnamed,
    Named(&'a str),
}

impl<'a> ModuleConstraint<'a> {
    /// Whether a location belonging to `module` may answer.
    pub fn accepts(self, module: Option<&str>) -> bool {
        match self {
            ModuleConstraint::Any => true,
            ModuleConstraint::Unnamed => module.is_none(),
            ModuleConstraint::Named(name) => module == Some(name),
        }
    }

    pub fn name(self) -> Option<&'a str> {
        match self {
            ModuleConstraint::Named(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerKind {
    Binary(BinaryType),
    Source { path: PathBuf, main_type_name: String },
}

/// Result of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub kind: AnswerKind,
    pub module_name: Option<String>,
    /// Release of the location that answered.
    pub release: Release,
    pub access_restriction: Option<AccessRestriction>,
}

impl Answer {
    pub fn binary(binary: BinaryType, module_name: Option<String>, release: Release) -> Self {
        Self {
            kind: AnswerKind::Binary(binary),
            module_name,
            release,
            access_restriction: None,
        }
    }

    pub fn source(path: PathBuf, main_type_name: impl Into<String>, release: Release) -> Self {
        Self {
            kind: AnswerKind::Source {
                path,
                main_type_name: main_type_name.into(),
            },
            module_name: None,
            release,
            access_restriction: None,
        }
    }

    pub fn binary_type(&self) -> Option<&BinaryType> {
        match &self.kind {
            AnswerKind::Binary(binary) => Some(binary),
            AnswerKind::Source { .. } => None,
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self.kind, AnswerKind::Source { .. })
    }

    pub fn with_restriction(mut self, restriction: Option<AccessRestriction>) -> Self {
        self.access_restriction = restriction;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRuleKind {
    Accessible,
    Discouraged,
    Forbidden,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRestriction {
    pub kind: AccessRuleKind,
    pub pattern: String,
    /// Classpath entry that declared the rule.
    pub origin: String,
}

#[derive(Debug, Clone)]
struct AccessRule {
    pattern: String,
    matcher: GlobMatcher,
    kind: AccessRuleKind,
}

/// Ordered access rules over `p/q/Type` names; the first match decides.
#[derive(Debug, Clone)]
pub struct AccessRuleSet {
    rules: Vec<AccessRule>,
    origin: String,
}

impl AccessRuleSet {
    pub fn new<I, S>(rules: I, origin: impl Into<String>) -> Result<Self, globset::Error>
    where
        I: IntoIterator<Item = (S, AccessRuleKind)>,
        S: Into<String>,
    {
        let rules = rules
            .into_iter()
            .map(|(pattern, kind)| {
                let pattern = pattern.into();
                let matcher = GlobBuilder::new(&pattern)
                    .literal_separator(true)
                    .build()?
                    .compile_matcher();
                Ok(AccessRule {
                    pattern,
                    matcher,
                    kind,
                })
            })
            .collect::<Result<Vec<_>, globset::Error>>()?;
        Ok(Self {
            rules,
            origin: origin.into(),
        })
    }

    pub fn restriction_for(&self, qualified_type_name: &str) -> Option<AccessRestriction> {
        let rule = self
            .rules
            .iter()
            .find(|rule| rule.matcher.is_match(qualified_type_name))?;
        match rule.kind {
            AccessRuleKind::Accessible => None,
            kind => Some(AccessRestriction {
                kind,
                pattern: rule.pattern.clone(),
                origin: self.origin.clone(),
            }),
        }
    }
}

impl PartialEq for AccessRuleSet {
    fn eq(&self, other: &Self) -> bool {
        self.origin == other.origin
            && self.rules.len() == other.rules.len()
            && self
                .rules
                .iter()
                .zip(&other.rules)
                .all(|(a, b)| a.pattern == b.pattern && a.kind == b.kind)
    }
}

impl Eq for AccessRuleSet {}

/// A source of binary or source answers on the build classpath.
pub trait ClasspathLocation: fmt::Debug {
    fn find_class(
        &self,
        query: &ClassQuery,
        module: ModuleConstraint<'_>,
        release: Release,
    ) -> Option<Answer>;

    /// Release this location is bound to; overlay output answers only for
    /// lookups at that release or later.
    fn release(&self) -> Release {
        Release::Unversioned
    }

    fn module_name(&self) -> Option<&str> {
        None
    }

    fn module_names(&self, limit: Option<&[String]>) -> Vec<String> {
        self.module_name()
            .filter(|name| limit.map_or(true, |limit| limit.iter().any(|l| l == name)))
            .map(|name| vec![name.to_string()])
            .unwrap_or_default()
    }

    fn has_module(&self) -> bool {
        self.module_name().is_some()
    }
}

/// Names from a module cache entry, restricted to `limit` when given.
pub(crate) fn select_modules(modules: &ModuleMap, limit: Option<&[String]>) -> Vec<String> {
    match limit {
        None => modules.keys().cloned().collect(),
        Some(limit) => modules
            .keys()
            .filter(|name| limit.contains(name))
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_from_compound_name() {
        let query = ClassQuery::from_compound(&["p", "q", "Type"]).unwrap();
        assert_eq!(query.package_name, "p/q");
        assert_eq!(query.binary_file_name, "Type.class");
        assert_eq!(query.qualified_binary_file_name, "p/q/Type.class");
        assert_eq!(query.type_name(), "Type");
        assert_eq!(query.qualified_type_name(), "p/q/Type");
        assert!(ClassQuery::from_compound(&[]).is_none());
    }

    #[test]
    fn default_package_query() {
        let query = ClassQuery::from_dotted("Main").unwrap();
        assert_eq!(query.package_name, "");
        assert_eq!(query.qualified_binary_file_name, "Main.class");
        assert!(ClassQuery::from_dotted("a..B").is_none());
    }

    #[test]
    fn module_constraint_acceptance() {
        assert!(ModuleConstraint::Any.accepts(Some("m")));
        assert!(ModuleConstraint::Unnamed.accepts(None));
        assert!(!ModuleConstraint::Unnamed.accepts(Some("m")));
        assert!(ModuleConstraint::Named("m").accepts(Some("m")));
        assert!(!ModuleConstraint::Named("m").accepts(None));
    }

    #[test]
    fn first_matching_access_rule_decides() {
        let rules = AccessRuleSet::new(
            [
                ("java/lang/*", AccessRuleKind::Accessible),
                ("sun/**", AccessRuleKind::Forbidden),
                ("**", AccessRuleKind::Discouraged),
            ],
            "jrt",
        )
        .unwrap();

        assert_eq!(rules.restriction_for("java/lang/Object"), None);
        let forbidden = rules.restriction_for("sun/misc/Unsafe").unwrap();
        assert_eq!(forbidden.kind, AccessRuleKind::Forbidden);
        assert_eq!(forbidden.origin, "jrt");
        assert_eq!(
            rules.restriction_for("javax/swing/JButton").unwrap().kind,
            AccessRuleKind::Discouraged
        );
    }
}
