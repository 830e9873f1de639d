//! XML text helpers shared by the part codecs.
//!
//! Besides the five predefined entities, SpreadsheetML escapes characters that
//! XML 1.0 cannot carry (most C0 controls) as `_xHHHH_`. A literal `_xHHHH_`
//! sequence in user text is protected by escaping its leading underscore as
//! `_x005F_`.

use std::borrow::Cow;

use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesRef, BytesText};

use super::error::{OoxmlError, Result};

static XML_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(["&", "<", ">", "\"", "'"])
        .expect("static pattern set")
});

const XML_ENTITIES: [&str; 5] = ["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"];

/// Escape XML special characters for element text or attribute values.
///
/// ```
/// use loquat::ooxml::xml::escape_xml;
/// assert_eq!(escape_xml("a & b"), "a &amp; b");
/// assert_eq!(escape_xml("<\"x\">"), "&lt;&quot;x&quot;&gt;");
/// ```
#[inline]
pub fn escape_xml(s: &str) -> String {
    XML_ESCAPER.replace_all(s, &XML_ENTITIES)
}

fn is_hex_escape(bytes: &[u8]) -> bool {
    bytes.len() >= 7
        && bytes[0] == b'_'
        && bytes[1] == b'x'
        && bytes[2..6].iter().all(u8::is_ascii_hexdigit)
        && bytes[6] == b'_'
}

fn needs_hex_escape(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}')
}

/// Escape cell text: `_xHHHH_` for characters XML cannot hold, then entities.
pub fn escape_cell_text(s: &str) -> String {
    let bytes = s.as_bytes();
    let plain = !s.chars().any(needs_hex_escape)
        && !bytes.windows(7).any(is_hex_escape);
    if plain {
        return escape_xml(s);
    }

    let mut encoded = String::with_capacity(s.len() + 16);
    for (i, c) in s.char_indices() {
        if needs_hex_escape(c) {
            encoded.push_str(&format!("_x{:04X}_", c as u32));
        } else if c == '_' && is_hex_escape(&bytes[i..]) {
            encoded.push_str("_x005F_");
        } else {
            encoded.push(c);
        }
    }
    escape_xml(&encoded)
}

/// Decode `_xHHHH_` escapes. Sequences that do not name a valid scalar value
/// are kept as written.
///
/// ```
/// use loquat::ooxml::xml::decode_hex_escapes;
/// assert_eq!(decode_hex_escapes("a_x0009_b"), "a\tb");
/// assert_eq!(decode_hex_escapes("_x005F_x0041_"), "_x0041_");
/// ```
pub fn decode_hex_escapes(s: &str) -> Cow<'_, str> {
    let bytes = s.as_bytes();
    if !bytes.windows(7).any(is_hex_escape) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < s.len() {
        if is_hex_escape(&bytes[i..]) {
            let decoded = u32::from_str_radix(&s[i + 2..i + 6], 16)
                .ok()
                .and_then(char::from_u32);
            if let Some(c) = decoded {
                out.push(c);
                i += 7;
                continue;
            }
        }
        let Some(c) = s[i..].chars().next() else {
            break;
        };
        out.push(c);
        i += c.len_utf8();
    }
    Cow::Owned(out)
}

/// Decoded text of a text event.
#[inline]
pub(crate) fn text_of<'a>(t: &'a BytesText<'_>) -> Result<Cow<'a, str>> {
    t.decode()
        .map_err(|e| OoxmlError::Xml(format!("Invalid text content: {}", e)))
}

/// Append the character or predefined entity named by a general reference.
pub(crate) fn push_general_ref(out: &mut String, r: &BytesRef<'_>) -> Result<()> {
    if let Some(c) = r
        .resolve_char_ref()
        .map_err(|e| OoxmlError::Xml(format!("Invalid character reference: {}", e)))?
    {
        out.push(c);
        return Ok(());
    }
    let name = r
        .decode()
        .map_err(|e| OoxmlError::Xml(format!("Invalid entity reference: {}", e)))?;
    match quick_xml::escape::resolve_predefined_entity(&name) {
        Some(value) => out.push_str(value),
        None => {
            return Err(OoxmlError::Xml(format!("Unknown entity &{};", name)));
        },
    }
    Ok(())
}

/// Attribute value with entities resolved.
#[inline]
pub(crate) fn attr_value(attr: &Attribute<'_>) -> Result<String> {
    Ok(attr
        .unescape_value()
        .map_err(|e| OoxmlError::Xml(format!("Invalid attribute value: {}", e)))?
        .into_owned())
}

/// Parse an unsigned integer attribute.
pub(crate) fn attr_u32(attr: &Attribute<'_>) -> Result<u32> {
    atoi_simd::parse::<u32, false, false>(attr.value.as_ref()).map_err(|_| {
        OoxmlError::Xml(format!(
            "Expected an integer in attribute {}",
            String::from_utf8_lossy(attr.key.as_ref())
        ))
    })
}

/// `true`/`1` and `false`/`0`, as xsd:boolean allows.
pub(crate) fn parse_bool(value: &[u8]) -> bool {
    matches!(value, b"1" | b"true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_characters_are_hex_escaped() {
        assert_eq!(escape_cell_text("a\u{1}b"), "a_x0001_b");
        assert_eq!(escape_cell_text("tab\tstays"), "tab\tstays");
        assert_eq!(escape_cell_text("x<y"), "x&lt;y");
    }

    #[test]
    fn literal_escape_sequence_is_protected() {
        let encoded = escape_cell_text("_x0041_");
        assert_eq!(encoded, "_x005F_x0041_");
        assert_eq!(decode_hex_escapes(&encoded), "_x0041_");
    }

    #[test]
    fn decode_leaves_plain_text_borrowed() {
        assert!(matches!(decode_hex_escapes("plain_text"), Cow::Borrowed(_)));
        assert_eq!(decode_hex_escapes("_xD800_"), "_xD800_");
    }

    #[test]
    fn booleans() {
        assert!(parse_bool(b"1"));
        assert!(parse_bool(b"true"));
        assert!(!parse_bool(b"0"));
        assert!(!parse_bool(b"false"));
    }
}
