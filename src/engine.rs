//! Rule engine: check registration, execution, and fault isolation.
//!
//! Checks are registered against a rule key and run exactly once per
//! parsed document, in registration order. A check that panics is caught
//! and logged; its already-reported issues are kept and every other check
//! still runs. That containment is the central failure contract of the
//! engine.

use std::panic::{self, AssertUnwindSafe};

use log::warn;

use crate::model::{Document, TextRange};

/// An issue reported by a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Stable identifier of the rule that produced this issue.
    pub rule_key: String,
    /// Primary location; `None` for file-level issues.
    pub range: Option<TextRange>,
    pub message: String,
    pub secondary: Vec<SecondaryLocation>,
}

/// An additional location attached to an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryLocation {
    pub range: TextRange,
    pub message: String,
}

/// Side-channel record of one check's contained failure.
#[derive(Debug, Clone)]
pub struct CheckFailure {
    pub rule_key: String,
    pub cause: String,
}

/// An independent analysis over a parsed document.
///
/// Implementations must not mutate shared state: the document is read
/// concurrently when the host fans checks out across threads.
pub trait Check: Send + Sync {
    fn scan(&self, doc: &Document, ctx: &mut CheckContext);
}

/// Reporter capability handed to a check during its scan.
pub struct CheckContext {
    rule_key: String,
    issues: Vec<Issue>,
}

impl CheckContext {
    fn new(rule_key: String) -> Self {
        Self {
            rule_key,
            issues: Vec::new(),
        }
    }

    pub fn rule_key(&self) -> &str {
        &self.rule_key
    }

    /// Report an issue at a source range.
    pub fn report_issue(&mut self, range: TextRange, message: impl Into<String>) {
        self.report_issue_with_secondaries(range, message, Vec::new());
    }

    /// Report an issue with secondary locations.
    pub fn report_issue_with_secondaries(
        &mut self,
        range: TextRange,
        message: impl Into<String>,
        secondary: Vec<SecondaryLocation>,
    ) {
        self.issues.push(Issue {
            rule_key: self.rule_key.clone(),
            range: Some(range),
            message: message.into(),
            secondary,
        });
    }

    /// Report an issue against the file as a whole, with no location.
    pub fn report_file_issue(&mut self, message: impl Into<String>) {
        self.issues.push(Issue {
            rule_key: self.rule_key.clone(),
            range: None,
            message: message.into(),
            secondary: Vec::new(),
        });
    }
}

/// Issues and contained failures from one engine run.
#[derive(Debug, Default)]
pub struct CheckOutcome {
    pub issues: Vec<Issue>,
    pub failures: Vec<CheckFailure>,
}

/// The ordered set of enabled checks.
///
/// Registration order is the execution order, which keeps output
/// deterministic across runs.
#[derive(Default)]
pub struct CheckRegistry {
    checks: Vec<(String, Box<dyn Check>)>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a check under a rule key.
    pub fn register(&mut self, rule_key: impl Into<String>, check: impl Check + 'static) {
        self.checks.push((rule_key.into(), Box::new(check)));
    }

    /// Whether a rule key is registered (and therefore enabled).
    pub fn contains(&self, rule_key: &str) -> bool {
        self.checks.iter().any(|(key, _)| key == rule_key)
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every registered check against a document.
    ///
    /// A panicking check is logged and recorded as a [`CheckFailure`];
    /// issues it reported before failing are retained, and the remaining
    /// checks run normally.
    pub fn run(&self, doc: &Document) -> CheckOutcome {
        let mut outcome = CheckOutcome::default();

        for (rule_key, check) in &self.checks {
            let mut ctx = CheckContext::new(rule_key.clone());
            let result = panic::catch_unwind(AssertUnwindSafe(|| check.scan(doc, &mut ctx)));
            outcome.issues.append(&mut ctx.issues);

            if let Err(payload) = result {
                let cause = panic_message(payload.as_ref());
                warn!(
                    "check {} failed on {}: {}",
                    rule_key,
                    doc.source().name(),
                    cause
                );
                outcome.failures.push(CheckFailure {
                    rule_key: rule_key.clone(),
                    cause,
                });
            }
        }

        outcome
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::source::SourceFile;

    struct AlwaysReport(&'static str);

    impl Check for AlwaysReport {
        fn scan(&self, _doc: &Document, ctx: &mut CheckContext) {
            ctx.report_file_issue(self.0);
        }
    }

    struct ReportThenPanic;

    impl Check for ReportThenPanic {
        fn scan(&self, _doc: &Document, ctx: &mut CheckContext) {
            ctx.report_file_issue("before the fault");
            panic!("boom");
        }
    }

    fn doc() -> Document {
        parse(SourceFile::from_text("<a/>")).unwrap()
    }

    #[test]
    fn test_issues_in_registration_order() {
        let mut registry = CheckRegistry::new();
        registry.register("r1", AlwaysReport("first"));
        registry.register("r2", AlwaysReport("second"));

        let outcome = registry.run(&doc());
        assert!(outcome.failures.is_empty());
        let keys: Vec<_> = outcome.issues.iter().map(|i| i.rule_key.as_str()).collect();
        assert_eq!(keys, vec!["r1", "r2"]);
    }

    #[test]
    fn test_panicking_check_is_isolated() {
        // Whichever position the faulty check occupies, the others still
        // report and exactly one failure is recorded.
        for faulty_position in 0..3 {
            let mut registry = CheckRegistry::new();
            for i in 0..3 {
                if i == faulty_position {
                    registry.register(format!("faulty{i}"), ReportThenPanic);
                } else {
                    registry.register(format!("ok{i}"), AlwaysReport("fine"));
                }
            }

            let outcome = registry.run(&doc());
            assert_eq!(outcome.failures.len(), 1);
            assert_eq!(
                outcome.failures[0].rule_key,
                format!("faulty{faulty_position}")
            );
            assert_eq!(outcome.failures[0].cause, "boom");
            // Two healthy issues plus the one reported before the panic
            assert_eq!(outcome.issues.len(), 3);
        }
    }

    #[test]
    fn test_issues_before_fault_are_retained() {
        let mut registry = CheckRegistry::new();
        registry.register("faulty", ReportThenPanic);

        let outcome = registry.run(&doc());
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].message, "before the fault");
        assert_eq!(outcome.failures.len(), 1);
    }

    #[test]
    fn test_contains() {
        let mut registry = CheckRegistry::new();
        registry.register("r1", AlwaysReport("x"));
        assert!(registry.contains("r1"));
        assert!(!registry.contains("r2"));
        assert_eq!(registry.len(), 1);
    }
}
