//! Built-in checks.
//!
//! The full rule catalog lives with the host; these checks demonstrate the
//! engine contract and cover the rules the analyzer itself depends on.

use memchr::memchr;

use crate::engine::{Check, CheckContext, CheckRegistry};
use crate::model::Document;

/// Rule key under which a parse failure is reported as an issue, when
/// enabled.
pub const PARSING_ERROR_RULE_KEY: &str = "S2260";

/// Placeholder check for the parsing-error rule.
///
/// The scan body is empty: its issue is synthesized by the analyzer when
/// parsing fails, since no document exists to scan at that point.
/// Registering it is what enables the rule.
pub struct ParsingErrorCheck;

impl Check for ParsingErrorCheck {
    fn scan(&self, _doc: &Document, _ctx: &mut CheckContext) {}
}

/// S1778: no content is allowed before the XML prolog.
pub struct CharBeforePrologCheck;

impl CharBeforePrologCheck {
    pub const RULE_KEY: &'static str = "S1778";
}

impl Check for CharBeforePrologCheck {
    fn scan(&self, doc: &Document, ctx: &mut CheckContext) {
        if let Some(prolog) = doc.prolog()
            && let Some(node) = doc.get(prolog)
        {
            let start = node.range.start;
            if start.line != 1 || start.column != 0 {
                ctx.report_issue(
                    node.range,
                    "Remove all characters located before \"<?xml\".",
                );
            }
        }
    }
}

/// S105: tab characters should not be used.
pub struct TabCharacterCheck;

impl TabCharacterCheck {
    pub const RULE_KEY: &'static str = "S105";
}

impl Check for TabCharacterCheck {
    fn scan(&self, doc: &Document, ctx: &mut CheckContext) {
        // One issue per file, at the first tab.
        if let Some(offset) = memchr(b'\t', doc.source().text().as_bytes()) {
            ctx.report_issue(
                doc.source().range(offset, offset + 1),
                "Replace all tab characters in this file by sequences of white-spaces.",
            );
        }
    }
}

/// Register every built-in check, the parsing-error rule included.
pub fn register_builtin(registry: &mut CheckRegistry) {
    registry.register(PARSING_ERROR_RULE_KEY, ParsingErrorCheck);
    registry.register(CharBeforePrologCheck::RULE_KEY, CharBeforePrologCheck);
    registry.register(TabCharacterCheck::RULE_KEY, TabCharacterCheck);
}
