//! Release-aware type lookup across the build classpath.

use crate::classpath::{Answer, ClassQuery, ClasspathLocation, ModuleConstraint};
use crate::release::Release;
use std::collections::BTreeSet;
use std::fmt;
use tracing::trace;

/// Resolves types against an ordered list of classpath locations.
///
/// A lookup at a concrete release consults overlay locations bound to that
/// release or an older one, newest first, and then every unversioned
/// location in classpath order. A lookup without a release only sees
/// unversioned locations. Absence is never an error.
#[derive(Default)]
pub struct NameEnvironment {
    locations: Vec<Box<dyn ClasspathLocation>>,
}

impl NameEnvironment {
    pub fn new(locations: Vec<Box<dyn ClasspathLocation>>) -> Self {
        Self { locations }
    }

    pub fn push(&mut self, location: Box<dyn ClasspathLocation>) {
        self.locations.push(location);
    }

    pub fn locations(&self) -> &[Box<dyn ClasspathLocation>] {
        &self.locations
    }

    /// `compound` is a qualified name split into segments, e.g.
    /// `["java", "lang", "Object"]`.
    pub fn find_type(
        &self,
        compound: &[&str],
        module: ModuleConstraint<'_>,
        release: Release,
    ) -> Option<Answer> {
        let query = ClassQuery::from_compound(compound)?;
        self.find_class(&query, module, release)
    }

    pub fn find_type_in_package(
        &self,
        type_name: &str,
        package: &[&str],
        module: ModuleConstraint<'_>,
        release: Release,
    ) -> Option<Answer> {
        if type_name.is_empty() {
            return None;
        }
        let query = ClassQuery::in_package(type_name, package);
        self.find_class(&query, module, release)
    }

    pub fn find_type_any(&self, compound: &[&str], release: Release) -> Option<Answer> {
        self.find_type(compound, ModuleConstraint::Any, release)
    }

    pub fn find_type_in_module(
        &self,
        compound: &[&str],
        module: ModuleConstraint<'_>,
    ) -> Option<Answer> {
        self.find_type(compound, module, Release::Unversioned)
    }

    pub fn find_type_unversioned(&self, compound: &[&str]) -> Option<Answer> {
        self.find_type(compound, ModuleConstraint::Any, Release::Unversioned)
    }

    pub fn find_type_in_package_any(
        &self,
        type_name: &str,
        package: &[&str],
        release: Release,
    ) -> Option<Answer> {
        self.find_type_in_package(type_name, package, ModuleConstraint::Any, release)
    }

    pub fn find_type_in_package_unversioned(
        &self,
        type_name: &str,
        package: &[&str],
    ) -> Option<Answer> {
        self.find_type_in_package(type_name, package, ModuleConstraint::Any, Release::Unversioned)
    }

    /// Runs a prepared query through the resolution order.
    pub fn find_class(
        &self,
        query: &ClassQuery,
        module: ModuleConstraint<'_>,
        release: Release,
    ) -> Option<Answer> {
        for location in self.resolution_order(release) {
            if let Some(answer) = location.find_class(query, module, release) {
                trace!(
                    name = %query.qualified_type_name(),
                    requested = %release,
                    answered = %answer.release,
                    "resolved type"
                );
                return Some(answer);
            }
        }
        None
    }

    /// Names of all modules visible through the classpath.
    pub fn module_names(&self, limit: Option<&[String]>) -> BTreeSet<String> {
        self.locations
            .iter()
            .flat_map(|location| location.module_names(limit))
            .collect()
    }

    fn resolution_order(&self, release: Release) -> Vec<&dyn ClasspathLocation> {
        let mut versioned: Vec<&dyn ClasspathLocation> = self
            .locations
            .iter()
            .map(Box::as_ref)
            .filter(|location| {
                location.release().is_versioned() && location.release().applies_to(release)
            })
            .collect();
        versioned.sort_by(|a, b| b.release().cmp(&a.release()));

        versioned.extend(
            self.locations
                .iter()
                .map(Box::as_ref)
                .filter(|location| !location.release().is_versioned()),
        );
        versioned
    }
}

impl fmt::Debug for NameEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.locations.iter()).finish()
    }
}
