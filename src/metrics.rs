//! Best-effort line classification: code, comment, and blank counts.
//!
//! This pass is independent of the strict positional parser. It runs its
//! own lenient streaming scan so a file that later fails well-formedness
//! checks still gets a line count, and it never fails: an unrecoverable
//! scan fault is surfaced as a result variant that zeroes the comment
//! count while keeping the best-effort code and blank counts.
//!
//! Classification precedence: code always wins over comment on a shared
//! line, regardless of which token the scan saw first. Two watermarks
//! (last code line, last comment line) are updated in event order;
//! registering code on a line at or before the comment watermark
//! retroactively revokes one previously counted comment line.

use memchr::memchr_iter;
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::source::SourceFile;

/// Per-file line counts. Derived and immutable; rebuilt per analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineMetrics {
    pub code_lines: u32,
    pub comment_lines: u32,
    pub blank_lines: u32,
}

/// Outcome of one scan step. `Aborted` is the distinguished "stop now,
/// report zero comments" signal, checked by the caller rather than
/// unwinding through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Complete,
    Aborted,
}

/// Count code, comment, and blank lines. Never fails.
pub fn count_lines(source: &SourceFile) -> LineMetrics {
    let mut classifier = LineClassifier::default();
    let outcome = scan_events(source, &mut classifier);

    let comment_lines = match outcome {
        Scan::Complete => classifier.comment_lines.max(0) as u32,
        // Comment counting is best-effort only; on malformed input the
        // count is dropped while code lines keep their partial value.
        Scan::Aborted => 0,
    };

    let blank_lines = (1..=source.line_count())
        .filter(|&line| {
            source
                .line_text(line)
                .is_some_and(|text| text.trim().is_empty())
        })
        .count() as u32;

    LineMetrics {
        code_lines: classifier.code_lines,
        comment_lines,
        blank_lines,
    }
}

#[derive(Debug, Default)]
struct LineClassifier {
    last_code_line: u32,
    last_comment_line: u32,
    code_lines: u32,
    /// Signed: a code registration may revoke a comment claim that was
    /// never counted, and a later comment must not re-inflate the total.
    comment_lines: i32,
}

impl LineClassifier {
    /// A code token (element start, CDATA or DOCTYPE boundary, entity
    /// reference) was seen on `line`.
    fn register_code(&mut self, line: u32) {
        if line > self.last_code_line {
            self.code_lines += 1;
        }
        self.last_code_line = line;
        if self.last_comment_line >= line {
            self.comment_lines -= 1;
        }
    }

    /// A comment ending on `end_line` spanned `newlines` embedded line
    /// breaks. Each spanned line above both watermarks is claimed once.
    fn register_comment(&mut self, end_line: u32, newlines: u32) {
        let first = end_line.saturating_sub(newlines);
        for line in first..=end_line {
            if self.last_code_line < line && self.last_comment_line < line {
                self.comment_lines += 1;
                self.last_comment_line = line;
            }
        }
    }
}

fn scan_events(source: &SourceFile, classifier: &mut LineClassifier) -> Scan {
    let mut reader = Reader::from_str(source.text());
    // Lenient on structure: mismatched end tags must not kill the count.
    reader.config_mut().check_end_names = false;

    let mut pos = 0usize;
    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(_) => return Scan::Aborted,
        };
        let end = reader.buffer_position() as usize;

        match event {
            Event::Start(_) | Event::Empty(_) => {
                classifier.register_code(source.position_at(pos).line);
            }
            Event::CData(_) | Event::DocType(_) => {
                // Both boundaries register, so multi-line sections mark
                // their first and last line as code.
                classifier.register_code(source.position_at(pos).line);
                classifier.register_code(source.position_at(end).line);
            }
            Event::GeneralRef(_) => {
                classifier.register_code(source.position_at(pos).line);
            }
            Event::Comment(_) => {
                let newlines =
                    memchr_iter(b'\n', source.text()[pos..end].as_bytes()).count() as u32;
                classifier.register_comment(source.position_at(end).line, newlines);
            }
            Event::End(_) | Event::Text(_) | Event::Decl(_) | Event::PI(_) => {}
            Event::Eof => return Scan::Complete,
        }

        pos = end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(text: &str) -> LineMetrics {
        count_lines(&SourceFile::from_text(text))
    }

    #[test]
    fn test_prolog_comment_element() {
        // The XML declaration is not a code token; the comment on line 1
        // stands, the element makes line 2 code.
        let m = metrics("<?xml version=\"1.0\"?><!-- c -->\n<a/>");
        assert_eq!(m.code_lines, 1);
        assert_eq!(m.comment_lines, 1);
        assert_eq!(m.blank_lines, 0);
    }

    #[test]
    fn test_code_wins_comment_first() {
        let m = metrics("<!-- c --><a/>");
        assert_eq!(m.comment_lines, 0);
        assert_eq!(m.code_lines, 1);
    }

    #[test]
    fn test_code_wins_code_first() {
        let m = metrics("<a><!-- c --></a>");
        assert_eq!(m.comment_lines, 0);
        assert_eq!(m.code_lines, 1);
    }

    #[test]
    fn test_comment_only_lines() {
        let m = metrics("<a>\n<!-- one -->\n<!-- two -->\n</a>");
        assert_eq!(m.code_lines, 1);
        assert_eq!(m.comment_lines, 2);
    }

    #[test]
    fn test_multiline_comment() {
        let m = metrics("<a>\n<!-- x\n y\n z -->\n</a>");
        assert_eq!(m.comment_lines, 3);
        assert_eq!(m.code_lines, 1);
    }

    #[test]
    fn test_multiline_comment_shares_line_with_code() {
        // The comment ends on the same line the element starts; the code
        // registration revokes that line's comment claim.
        let m = metrics("<r>\n<!-- x\n y --><a/>\n</r>");
        assert_eq!(m.comment_lines, 1);
        assert_eq!(m.code_lines, 2);
    }

    #[test]
    fn test_blank_lines() {
        let m = metrics("<a>\n\n  \n</a>");
        assert_eq!(m.blank_lines, 2);
        assert_eq!(m.code_lines, 1);
    }

    #[test]
    fn test_cdata_boundaries_are_code() {
        let m = metrics("<a><![CDATA[\nplain\n]]></a>");
        assert_eq!(m.code_lines, 2); // line 1 (start) and line 3 (end)
    }

    #[test]
    fn test_malformed_input_zeroes_comments_only() {
        // Unterminated comment aborts the scan; code counted so far stays.
        let m = metrics("<a>\n<!-- never closed");
        assert_eq!(m.comment_lines, 0);
        assert_eq!(m.code_lines, 1);
    }

    #[test]
    fn test_mismatched_tags_tolerated() {
        let m = metrics("<a>\n<!-- c -->\n</b>");
        assert_eq!(m.comment_lines, 1);
        assert_eq!(m.code_lines, 1);
    }

    #[test]
    fn test_never_negative() {
        // Comment then two elements on one line: the single claim is
        // revoked once and the count clamps at zero.
        let m = metrics("<!-- c --><a><b/></a>");
        assert_eq!(m.comment_lines, 0);
        assert_eq!(m.code_lines, 1);
    }
}
