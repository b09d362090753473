//! End-to-end analysis tests: file reading, the parse-failure policy, and
//! check fault isolation across the public API.

use std::io::Write;

use tempfile::NamedTempFile;

use xmlscan::checks::{CharBeforePrologCheck, PARSING_ERROR_RULE_KEY, ParsingErrorCheck};
use xmlscan::{Analyzer, Check, CheckContext, CheckRegistry, Document, SourceFile};

fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(bytes).expect("write");
    file
}

#[test]
fn test_analyze_file_from_disk() {
    let file = write_temp(b"<?xml version=\"1.0\"?>\n<project>\n  <!-- build config -->\n</project>\n");
    let analyzer = Analyzer::with_builtin_checks();
    let analysis = analyzer.analyze_file(file.path(), None).unwrap();

    assert!(analysis.errors.is_empty());
    assert!(analysis.issues.is_empty());
    assert_eq!(analysis.metrics.code_lines, 1);
    assert_eq!(analysis.metrics.comment_lines, 1);
    assert!(!analysis.highlights.is_empty());
}

#[test]
fn test_analyze_file_latin1() {
    let mut bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a name=\"caf".to_vec();
    bytes.push(0xE9); // é in Latin-1
    bytes.extend_from_slice(b"\"/>");
    let file = write_temp(&bytes);

    let analyzer = Analyzer::with_builtin_checks();
    let analysis = analyzer.analyze_file(file.path(), None).unwrap();
    assert!(analysis.errors.is_empty());
}

#[test]
fn test_unreadable_file_is_io_error() {
    let analyzer = Analyzer::with_builtin_checks();
    let result = analyzer.analyze_file("/nonexistent/definitely-missing.xml", None);
    assert!(matches!(result, Err(xmlscan::Error::Io(_))));
}

#[test]
fn test_undecodable_file_is_encoding_error() {
    let file = write_temp(&[b'<', b'a', 0xFF, 0xFE, 0xFF, b'>']);
    let analyzer = Analyzer::with_builtin_checks();
    let result = analyzer.analyze_file(file.path(), None);
    assert!(matches!(result, Err(xmlscan::Error::Encoding(_))));
}

#[test]
fn test_parsing_error_substitution() {
    let malformed = "<a><b>";

    // Rule enabled: exactly one issue under the parsing-error rule.
    let analyzer = Analyzer::with_builtin_checks();
    let enabled = analyzer.analyze(SourceFile::from_text(malformed));
    assert_eq!(enabled.issues.len(), 1);
    assert_eq!(enabled.issues[0].rule_key, PARSING_ERROR_RULE_KEY);
    assert!(!enabled.issues[0].message.is_empty());
    assert_eq!(enabled.errors.len(), 1);

    // Rule disabled: no issue, but the analysis error is still recorded.
    let mut registry = CheckRegistry::new();
    registry.register(CharBeforePrologCheck::RULE_KEY, CharBeforePrologCheck);
    let analyzer = Analyzer::new(registry);
    let disabled = analyzer.analyze(SourceFile::from_text(malformed));
    assert!(disabled.issues.is_empty());
    assert_eq!(disabled.errors.len(), 1);
}

struct PanickingCheck;

impl Check for PanickingCheck {
    fn scan(&self, _doc: &Document, _ctx: &mut CheckContext) {
        panic!("injected fault");
    }
}

struct ElementCounter;

impl Check for ElementCounter {
    fn scan(&self, doc: &Document, ctx: &mut CheckContext) {
        let elements = doc
            .descendants()
            .filter(|&id| doc.get(id).is_some_and(|n| n.is_element()))
            .count();
        ctx.report_file_issue(format!("{elements} elements"));
    }
}

#[test]
fn test_fault_isolation_end_to_end() {
    let mut registry = CheckRegistry::new();
    registry.register("count", ElementCounter);
    registry.register("broken", PanickingCheck);
    registry.register(PARSING_ERROR_RULE_KEY, ParsingErrorCheck);
    let analyzer = Analyzer::new(registry);

    let analysis = analyzer.analyze(SourceFile::from_text("<a><b/><c/></a>"));
    assert_eq!(analysis.check_failures.len(), 1);
    assert_eq!(analysis.check_failures[0].rule_key, "broken");
    assert_eq!(analysis.check_failures[0].cause, "injected fault");

    assert_eq!(analysis.issues.len(), 1);
    assert_eq!(analysis.issues[0].message, "3 elements");
}

#[test]
fn test_deterministic_across_runs() {
    let text = "<!-- x --><?xml version=\"1.0\"?>\n<a>\t<b/></a>";
    let analyzer = Analyzer::with_builtin_checks();

    let first = analyzer.analyze(SourceFile::from_text(text));
    let second = analyzer.analyze(SourceFile::from_text(text));

    assert_eq!(first.issues, second.issues);
    assert_eq!(first.metrics, second.metrics);
    assert_eq!(first.highlights, second.highlights);
}

#[test]
fn test_char_before_prolog_via_analyzer() {
    let analyzer = Analyzer::with_builtin_checks();
    let analysis = analyzer.analyze(SourceFile::from_text(
        "<!-- leading --><?xml version=\"1.0\"?><a/>",
    ));
    let keys: Vec<_> = analysis.issues.iter().map(|i| i.rule_key.as_str()).collect();
    assert_eq!(keys, vec![CharBeforePrologCheck::RULE_KEY]);
}
