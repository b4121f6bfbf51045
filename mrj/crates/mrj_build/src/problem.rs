use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(label)
    }
}

/// Character range inside the resource a problem is reported against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRange {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub resource: PathBuf,
    pub range: Option<SourceRange>,
    pub message: String,
    pub severity: Severity,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: {}",
            self.resource.display(),
            self.severity,
            self.message
        )
    }
}

/// Sink for build problems ("report problem against resource X").
pub trait ProblemReporter {
    fn report(&self, problem: Problem);
}

/// Reporter that keeps every problem in memory.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    problems: Mutex<Vec<Problem>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn problems(&self) -> Vec<Problem> {
        self.problems
            .lock()
            .map(|problems| problems.clone())
            .unwrap_or_default()
    }

    pub fn has_errors(&self) -> bool {
        self.problems()
            .iter()
            .any(|problem| problem.severity == Severity::Error)
    }
}

impl ProblemReporter for CollectingReporter {
    fn report(&self, problem: Problem) {
        if let Ok(mut problems) = self.problems.lock() {
            problems.push(problem);
        }
    }
}
