use serde::{Deserialize, Serialize};

/// Name reserved for module descriptor compilation units.
pub const MODULE_INFO_NAME: &str = "module-info";

/// Module declaration as read from `module-info.class` / `module-info.sig`
/// or parsed from `module-info.java`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    pub open: bool,
    pub requires: Vec<ModuleRequirement>,
    pub exports: Vec<PackageExport>,
    pub opens: Vec<PackageExport>,
    pub uses: Vec<String>,
    pub provides: Vec<ServiceProvision>,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Dotted names of all packages exported to every module.
    pub fn unqualified_exports(&self) -> impl Iterator<Item = &str> {
        self.exports
            .iter()
            .filter(|export| export.targets.is_empty())
            .map(|export| export.package.as_str())
    }

    pub fn exports_package(&self, package: &str) -> bool {
        self.exports.iter().any(|export| export.package == package)
    }

    pub fn requires_module(&self, module: &str) -> bool {
        self.requires.iter().any(|requirement| requirement.name == module)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRequirement {
    pub name: String,
    pub transitive: bool,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageExport {
    /// Dotted package name.
    pub package: String,
    /// Qualified targets; empty for an unqualified export.
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProvision {
    pub service: String,
    pub implementations: Vec<String>,
}
