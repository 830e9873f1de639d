//! Shared strings table (`xl/sharedStrings.xml`).
//!
//! Cells of type `s` refer to this table by index. The writer interns every
//! string value as worksheets stream and writes the table once all worksheets
//! are finished, so indices stay stable while cells reference them.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::BufRead;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::ooxml::error::Result;
use crate::ooxml::opc::constants::namespace;
use crate::ooxml::xml::{decode_hex_escapes, escape_cell_text, push_general_ref, text_of};

/// Ordered set of distinct strings.
#[derive(Debug, Default, Clone)]
pub struct SharedStrings {
    strings: Vec<String>,
    index: HashMap<String, u32>,
    /// Total number of references handed out, written as `count`
    references: u64,
}

impl SharedStrings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `text`, appending it when absent.
    ///
    /// ```
    /// use loquat::ooxml::xlsx::SharedStrings;
    ///
    /// let mut table = SharedStrings::new();
    /// assert_eq!(table.intern("north"), 0);
    /// assert_eq!(table.intern("south"), 1);
    /// assert_eq!(table.intern("north"), 0);
    /// assert_eq!(table.get(1), Some("south"));
    /// ```
    pub fn intern(&mut self, text: &str) -> u32 {
        self.references += 1;
        if let Some(&i) = self.index.get(text) {
            return i;
        }
        let i = self.strings.len() as u32;
        self.strings.push(text.to_string());
        self.index.insert(text.to_string(), i);
        i
    }

    #[inline]
    pub fn get(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }

    /// Parse `xl/sharedStrings.xml`.
    ///
    /// Rich-text runs are flattened to their text; phonetic runs are skipped.
    /// Every `<si>` keeps its position even when its text repeats an earlier
    /// one, since cells refer to positions.
    pub fn parse(content: &str) -> Result<Self> {
        let mut reader = Reader::from_str(content);
        let mut table = Self::new();
        let mut buf = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) if e.local_name().as_ref() == b"si" => {
                    let text = read_string_item(&mut reader, b"si")?;
                    table.push(text);
                },
                Event::Empty(e) if e.local_name().as_ref() == b"si" => {
                    table.push(String::new());
                },
                Event::Eof => break,
                _ => {},
            }
        }

        log::debug!("parsed {} shared strings", table.len());
        Ok(table)
    }

    fn push(&mut self, text: String) {
        let i = self.strings.len() as u32;
        self.index.entry(text.clone()).or_insert(i);
        self.strings.push(text);
    }

    /// Serialize as `xl/sharedStrings.xml`.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(128 + self.strings.iter().map(|s| s.len() + 16).sum::<usize>());
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        let _ = write!(
            xml,
            r#"<sst xmlns="{}" count="{}" uniqueCount="{}">"#,
            namespace::SML_MAIN,
            self.references.max(self.strings.len() as u64),
            self.strings.len()
        );
        for s in &self.strings {
            xml.push_str("<si>");
            push_text_element(&mut xml, s);
            xml.push_str("</si>");
        }
        xml.push_str("</sst>");
        xml
    }
}

/// Write `<t>` with `xml:space="preserve"` when surrounding whitespace would
/// otherwise be lost.
pub(crate) fn push_text_element(xml: &mut String, text: &str) {
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        xml.push_str(r#"<t xml:space="preserve">"#);
    } else {
        xml.push_str("<t>");
    }
    xml.push_str(&escape_cell_text(text));
    xml.push_str("</t>");
}

/// Read the text of a string item (`<si>` or an inline `<is>`) up to the
/// closing `end` tag.
pub(crate) fn read_string_item<R: BufRead>(reader: &mut Reader<R>, end: &[u8]) -> Result<String> {
    let mut text = String::new();
    let mut in_text = false;
    let mut phonetic_depth = 0usize;
    let mut buf = Vec::with_capacity(256);

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"t" if phonetic_depth == 0 => in_text = true,
                b"rPh" => phonetic_depth += 1,
                _ => {},
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                name if name == end => break,
                _ => {},
            },
            Event::Text(t) if in_text => text.push_str(&text_of(&t)?),
            Event::CData(t) if in_text => text.push_str(&String::from_utf8_lossy(&t)),
            Event::GeneralRef(r) if in_text => push_general_ref(&mut text, &r)?,
            Event::Eof => break,
            _ => {},
        }
    }

    if let Cow::Owned(decoded) = decode_hex_escapes(&text) {
        return Ok(decoded);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_dedups() {
        let mut ss = SharedStrings::new();
        let idx1 = ss.intern("Hello");
        let idx2 = ss.intern("World");
        let idx3 = ss.intern("Hello");

        assert_eq!(idx1, 0);
        assert_eq!(idx2, 1);
        assert_eq!(idx3, 0);
        assert_eq!(ss.len(), 2);
        assert!(ss.to_xml().contains(r#"count="3" uniqueCount="2""#));
    }

    #[test]
    fn test_parse_plain_and_rich() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="4" uniqueCount="4">
<si><t>Plain</t></si>
<si><r><rPr><b/></rPr><t>Bold</t></r><r><t xml:space="preserve"> and normal</t></r></si>
<si><t>東京</t><rPh sb="0" eb="2"><t>トウキョウ</t></rPh></si>
<si><t>Fish &amp; Chips_x000D_</t></si>
<si/>
</sst>"#;
        let ss = SharedStrings::parse(xml).unwrap();
        assert_eq!(ss.len(), 5);
        assert_eq!(ss.get(0), Some("Plain"));
        assert_eq!(ss.get(1), Some("Bold and normal"));
        assert_eq!(ss.get(2), Some("東京"));
        assert_eq!(ss.get(3), Some("Fish & Chips\r"));
        assert_eq!(ss.get(4), Some(""));
        assert_eq!(ss.get(5), None);
    }

    #[test]
    fn test_parse_keeps_duplicate_positions() {
        let xml = "<sst><si><t>a</t></si><si><t>a</t></si></sst>";
        let mut ss = SharedStrings::parse(xml).unwrap();
        assert_eq!(ss.len(), 2);
        assert_eq!(ss.get(1), Some("a"));
        assert_eq!(ss.intern("a"), 0);
    }

    #[test]
    fn test_xml_roundtrip() {
        let mut ss = SharedStrings::new();
        for s in ["  padded ", "<tag> & \"quoted\"", "tab\there", "_x0041_ literal", "ünïcödé"] {
            ss.intern(s);
        }
        let xml = ss.to_xml();
        assert!(xml.contains(r#"<t xml:space="preserve">  padded </t>"#));

        let parsed = SharedStrings::parse(&xml).unwrap();
        assert_eq!(parsed.iter().collect::<Vec<_>>(), ss.iter().collect::<Vec<_>>());
    }
}
