//! Per-file analysis driver.
//!
//! Sequences the pipeline for one file: tolerant line metrics first, then
//! the strict parse, then checks and highlighting. Failures never cross
//! file boundaries; a parse failure skips the checks for that file and is
//! reported both as an analysis-error record and, when the parsing-error
//! rule is enabled, as a single localized issue.

use std::path::Path;

use log::{debug, warn};

use crate::checks::{self, PARSING_ERROR_RULE_KEY};
use crate::engine::{CheckFailure, CheckRegistry, Issue};
use crate::error::Result;
use crate::highlight::{HighlightSpan, highlight};
use crate::metrics::{LineMetrics, count_lines};
use crate::model::{TextPosition, TextRange};
use crate::parser::parse;
use crate::source::SourceFile;

/// A problem the host should know about even when no issue was filed.
#[derive(Debug, Clone)]
pub struct AnalysisError {
    pub message: String,
    pub position: Option<TextPosition>,
}

/// Everything the analysis of one file produced.
#[derive(Debug, Default)]
pub struct FileAnalysis {
    pub metrics: LineMetrics,
    pub issues: Vec<Issue>,
    pub highlights: Vec<HighlightSpan>,
    /// Contained per-check faults, for the host's logs.
    pub check_failures: Vec<CheckFailure>,
    /// Analysis-error records; non-empty whenever the file could not be
    /// fully analyzed.
    pub errors: Vec<AnalysisError>,
}

/// Analyzes XML files with a fixed set of enabled checks.
pub struct Analyzer {
    registry: CheckRegistry,
}

impl Analyzer {
    /// Build an analyzer over an explicit check registry.
    pub fn new(registry: CheckRegistry) -> Self {
        Self { registry }
    }

    /// Build an analyzer with every built-in check enabled.
    pub fn with_builtin_checks() -> Self {
        let mut registry = CheckRegistry::new();
        checks::register_builtin(&mut registry);
        Self::new(registry)
    }

    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    /// Read, decode, and analyze a file.
    ///
    /// I/O and encoding failures are fatal for the file and surface as
    /// `Err`; everything downstream degrades per the analysis policy.
    pub fn analyze_file(
        &self,
        path: impl AsRef<Path>,
        hint_encoding: Option<&str>,
    ) -> Result<FileAnalysis> {
        let source = SourceFile::read(path, hint_encoding)?;
        Ok(self.analyze(source))
    }

    /// Analyze an in-memory source.
    pub fn analyze(&self, source: SourceFile) -> FileAnalysis {
        let name = source.name().into_owned();
        debug!("analyzing {name}");

        // Metrics run first on their own tolerant pass, independent of
        // parse success.
        let metrics = count_lines(&source);

        match parse(source) {
            Ok(doc) => {
                let outcome = self.registry.run(&doc);
                let highlights = match highlight(&doc) {
                    Ok(spans) => spans,
                    Err(e) => {
                        warn!("can't highlight {name}: {e}");
                        Vec::new()
                    }
                };
                FileAnalysis {
                    metrics,
                    issues: outcome.issues,
                    highlights,
                    check_failures: outcome.failures,
                    errors: Vec::new(),
                }
            }
            Err(e) => {
                warn!("unable to parse {name}: {e}");

                let mut issues = Vec::new();
                if self.registry.contains(PARSING_ERROR_RULE_KEY) {
                    let at = TextRange::new(e.position, e.position);
                    issues.push(Issue {
                        rule_key: PARSING_ERROR_RULE_KEY.to_string(),
                        range: Some(at),
                        message: format!("Parse error: {}", e.message),
                        secondary: Vec::new(),
                    });
                }

                FileAnalysis {
                    metrics,
                    issues,
                    highlights: Vec::new(),
                    check_failures: Vec::new(),
                    errors: vec![AnalysisError {
                        message: e.message,
                        position: Some(e.position),
                    }],
                }
            }
        }
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::with_builtin_checks()
    }
}
