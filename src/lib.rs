//! # xmlscan
//!
//! A static-analysis engine for XML documents: position-aware parsing,
//! independently-failing lint checks, line metrics, and syntax
//! highlighting.
//!
//! ## Features
//!
//! - Parse XML 1.0/1.1 into a tree where every node and attribute keeps
//!   exact line/column ranges in the original text
//! - Run a registry of checks with per-check fault isolation
//! - Best-effort code/comment line counting that survives malformed input
//! - Non-overlapping syntax-highlighting spans
//! - Encoding-aware source loading (BOM, XML declaration, host hint)
//!
//! ## Quick Start
//!
//! ```
//! use xmlscan::{Analyzer, SourceFile};
//!
//! let analyzer = Analyzer::with_builtin_checks();
//! let report = analyzer.analyze(SourceFile::from_text("<a>\t<b/></a>"));
//!
//! assert_eq!(report.issues[0].rule_key, "S105"); // tab character
//! assert_eq!(report.metrics.code_lines, 1);
//! ```
//!
//! ## Custom checks
//!
//! A check is anything implementing [`Check`]; it reads the [`Document`]
//! and reports issues through the [`CheckContext`] it is handed:
//!
//! ```
//! use xmlscan::{parse, Check, CheckContext, CheckRegistry, Document, SourceFile};
//!
//! struct RootMustBeConfig;
//!
//! impl Check for RootMustBeConfig {
//!     fn scan(&self, doc: &Document, ctx: &mut CheckContext) {
//!         if let Some(root) = doc.root_element()
//!             && doc.element_name(root) != Some("config")
//!         {
//!             let range = doc.name_range(root).unwrap();
//!             ctx.report_issue(range, "Root element should be <config>.");
//!         }
//!     }
//! }
//!
//! let mut registry = CheckRegistry::new();
//! registry.register("root-name", RootMustBeConfig);
//!
//! let doc = parse(SourceFile::from_text("<settings/>")).unwrap();
//! assert_eq!(registry.run(&doc).issues.len(), 1);
//! ```

pub mod analyzer;
pub mod checks;
pub mod engine;
pub mod error;
pub mod highlight;
pub mod metrics;
pub mod model;
pub mod parser;
pub mod source;

pub use analyzer::{AnalysisError, Analyzer, FileAnalysis};
pub use engine::{
    Check, CheckContext, CheckFailure, CheckOutcome, CheckRegistry, Issue, SecondaryLocation,
};
pub use error::{Error, HighlightError, ParseError, Result};
pub use highlight::{HighlightKind, HighlightSpan, highlight};
pub use metrics::{LineMetrics, count_lines};
pub use model::{Attribute, Document, Node, NodeId, NodeKind, TextPosition, TextRange};
pub use parser::parse;
pub use source::SourceFile;
