//! Source loading: decoding, line-ending normalization, and the line index
//! that backs offset to (line, column) conversion.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use memchr::memchr_iter;

use crate::error::{Error, Result};
use crate::model::{TextPosition, TextRange};

/// A decoded XML source file.
///
/// The text is normalized to `\n` line endings so that every recorded
/// offset agrees with the line index. All positions produced by the parser
/// refer to this normalized text.
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: Option<PathBuf>,
    text: String,
    /// Byte offset of the first character of each line.
    line_starts: Vec<usize>,
}

impl SourceFile {
    /// Read and decode a file from disk.
    ///
    /// `hint_encoding` is the host's declared encoding, consulted after the
    /// BOM and the `<?xml encoding="..."?>` declaration.
    pub fn read(path: impl AsRef<Path>, hint_encoding: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let mut source = Self::from_bytes(&bytes, hint_encoding)?;
        source.path = Some(path.to_path_buf());
        Ok(source)
    }

    /// Decode raw bytes into a source file.
    ///
    /// Encoding resolution order: byte-order mark, then the encoding named
    /// in the XML declaration, then `hint_encoding`, then UTF-8. Bytes that
    /// are malformed under the resolved encoding are an [`Error::Encoding`],
    /// never silently replaced.
    pub fn from_bytes(bytes: &[u8], hint_encoding: Option<&str>) -> Result<Self> {
        let text = decode_bytes(bytes, hint_encoding)?;
        Ok(Self::from_text(&text))
    }

    /// Build a source file from already-decoded text.
    pub fn from_text(text: &str) -> Self {
        let text = normalize_newlines(text);
        let line_starts = build_line_index(&text);
        Self {
            path: None,
            text,
            line_starts,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Display name for reports: the path if known, `<memory>` otherwise.
    pub fn name(&self) -> Cow<'_, str> {
        match &self.path {
            Some(p) => p.to_string_lossy(),
            None => Cow::Borrowed("<memory>"),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of lines (a trailing newline does not open a new line).
    pub fn line_count(&self) -> u32 {
        let mut count = self.line_starts.len();
        if *self.line_starts.last().unwrap_or(&0) >= self.text.len() && count > 1 {
            count -= 1;
        }
        count as u32
    }

    /// Text of the given 1-based line, without its trailing newline.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        let idx = line.checked_sub(1)? as usize;
        let start = *self.line_starts.get(idx)?;
        let end = self
            .line_starts
            .get(idx + 1)
            .map(|&next| next - 1)
            .unwrap_or(self.text.len());
        self.text.get(start..end)
    }

    /// Convert an absolute byte offset into a position.
    ///
    /// Offsets past the end of the text clamp to the final position.
    pub fn position_at(&self, offset: usize) -> TextPosition {
        let offset = offset.min(self.text.len());
        let idx = self.line_starts.partition_point(|&start| start <= offset) - 1;
        TextPosition {
            line: (idx + 1) as u32,
            column: (offset - self.line_starts[idx]) as u32,
            offset,
        }
    }

    /// Convert a byte offset pair into a range.
    pub fn range(&self, start: usize, end: usize) -> TextRange {
        TextRange::new(self.position_at(start), self.position_at(end))
    }
}

/// Replace `\r\n` and bare `\r` with `\n`.
fn normalize_newlines(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(c);
        }
    }
    out
}

fn build_line_index(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    starts.extend(memchr_iter(b'\n', text.as_bytes()).map(|i| i + 1));
    starts
}

fn decode_bytes(bytes: &[u8], hint_encoding: Option<&str>) -> Result<String> {
    // BOM wins over everything else.
    if let Some((encoding, bom_len)) = encoding_rs::Encoding::for_bom(bytes) {
        return decode_with(encoding, &bytes[bom_len..]);
    }

    if let Some(name) = extract_xml_encoding(bytes)
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        return decode_with(encoding, bytes);
    }

    if let Some(name) = hint_encoding {
        let encoding = encoding_rs::Encoding::for_label(name.as_bytes())
            .ok_or_else(|| Error::Encoding(format!("unknown encoding label: {name}")))?;
        return decode_with(encoding, bytes);
    }

    decode_with(encoding_rs::UTF_8, bytes)
}

fn decode_with(encoding: &'static encoding_rs::Encoding, bytes: &[u8]) -> Result<String> {
    let (text, _, malformed) = encoding.decode(bytes);
    if malformed {
        return Err(Error::Encoding(format!(
            "input is not valid {}",
            encoding.name()
        )));
    }
    Ok(text.into_owned())
}

/// Extract the encoding name from `<?xml ... encoding="..." ?>`.
///
/// Only the first 100 bytes are checked; the declaration must appear at the
/// head of the document anyway.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    let check_len = bytes.len().min(100);
    let prefix = &bytes[..check_len];

    let xml_start = prefix.windows(5).position(|w| w == b"<?xml")?;
    let after_xml = &prefix[xml_start..];

    let enc_pos = after_xml
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let after_enc = &after_xml[enc_pos + 9..];

    if after_enc.is_empty() {
        return None;
    }

    let quote = after_enc[0];
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let value_start = 1;
    let value_end = after_enc[value_start..].iter().position(|&b| b == quote)? + value_start;

    std::str::from_utf8(&after_enc[value_start..value_end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_at() {
        let source = SourceFile::from_text("ab\ncde\n\nf");
        assert_eq!(source.position_at(0), TextPosition::new(1, 0, 0));
        assert_eq!(source.position_at(2), TextPosition::new(1, 2, 2));
        assert_eq!(source.position_at(3), TextPosition::new(2, 0, 3));
        assert_eq!(source.position_at(6), TextPosition::new(2, 3, 6));
        assert_eq!(source.position_at(7), TextPosition::new(3, 0, 7));
        assert_eq!(source.position_at(8), TextPosition::new(4, 0, 8));
        // Past-the-end clamps
        assert_eq!(source.position_at(100), TextPosition::new(4, 1, 9));
    }

    #[test]
    fn test_line_text() {
        let source = SourceFile::from_text("ab\ncde\n\nf");
        assert_eq!(source.line_text(1), Some("ab"));
        assert_eq!(source.line_text(2), Some("cde"));
        assert_eq!(source.line_text(3), Some(""));
        assert_eq!(source.line_text(4), Some("f"));
        assert_eq!(source.line_text(5), None);
        assert_eq!(source.line_count(), 4);
    }

    #[test]
    fn test_crlf_normalization() {
        let source = SourceFile::from_bytes(b"<a>\r\n</a>\r", None).unwrap();
        assert_eq!(source.text(), "<a>\n</a>\n");
        assert_eq!(source.position_at(4).line, 2);
    }

    #[test]
    fn test_utf8_bom_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"<a/>");
        let source = SourceFile::from_bytes(&bytes, None).unwrap();
        assert_eq!(source.text(), "<a/>");
    }

    #[test]
    fn test_declared_encoding() {
        // 0xE9 is é in ISO-8859-1 but malformed UTF-8.
        let mut bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a v=\"".to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b"\"/>");
        let source = SourceFile::from_bytes(&bytes, None).unwrap();
        assert!(source.text().contains('\u{e9}'));
    }

    #[test]
    fn test_malformed_utf8_is_an_error() {
        let bytes = [b'<', b'a', 0xFF, b'>'];
        match SourceFile::from_bytes(&bytes, None) {
            Err(Error::Encoding(_)) => {}
            other => panic!("expected encoding error, got {other:?}"),
        }
    }

    #[test]
    fn test_hint_encoding() {
        let bytes = [b'a', 0xE9, b'b'];
        let source = SourceFile::from_bytes(&bytes, Some("ISO-8859-1")).unwrap();
        assert_eq!(source.text(), "a\u{e9}b");
    }

    #[test]
    fn test_extract_xml_encoding() {
        assert_eq!(
            extract_xml_encoding(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>"),
            Some("UTF-8")
        );
        assert_eq!(
            extract_xml_encoding(b"<?xml version='1.0' encoding='latin1'?>"),
            Some("latin1")
        );
        assert_eq!(extract_xml_encoding(b"<?xml version=\"1.0\"?>"), None);
        assert_eq!(extract_xml_encoding(b"<a/>"), None);
    }
}
