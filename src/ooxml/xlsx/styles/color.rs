//! Colors as SpreadsheetML stores them.

use std::hash::{Hash, Hasher};

use quick_xml::events::BytesStart;

use crate::ooxml::error::Result;
use crate::ooxml::xlsx::number::{format_number, parse_number};
use crate::ooxml::xml::{attr_u32, attr_value, escape_xml, parse_bool};

/// A color reference.
#[derive(Debug, Clone)]
pub enum Color {
    /// ARGB hex such as `FF1F497D`
    Rgb(String),
    /// Theme color slot with an optional tint in `[-1, 1]`
    Theme { theme: u32, tint: Option<f64> },
    /// Legacy palette index
    Indexed(u32),
    /// System default
    Auto,
}

impl Color {
    /// Parse the attributes of any color element (`color`, `fgColor`, ...).
    pub(crate) fn from_element(e: &BytesStart<'_>) -> Result<Option<Self>> {
        let mut rgb = None;
        let mut theme = None;
        let mut indexed = None;
        let mut tint = None;
        let mut auto = false;
        for attr in e.attributes().flatten() {
            match attr.key.local_name().as_ref() {
                b"rgb" => rgb = Some(attr_value(&attr)?),
                b"theme" => theme = Some(attr_u32(&attr)?),
                b"indexed" => indexed = Some(attr_u32(&attr)?),
                b"tint" => tint = Some(parse_number(&attr_value(&attr)?)?),
                b"auto" => auto = parse_bool(&attr.value),
                _ => {},
            }
        }
        Ok(match (rgb, theme, indexed) {
            (Some(rgb), ..) => Some(Color::Rgb(rgb)),
            (None, Some(theme), _) => Some(Color::Theme { theme, tint }),
            (None, None, Some(index)) => Some(Color::Indexed(index)),
            _ if auto => Some(Color::Auto),
            _ => None,
        })
    }

    /// Serialize as an element named `tag`.
    pub(crate) fn write_element(&self, out: &mut String, tag: &str) {
        out.push('<');
        out.push_str(tag);
        match self {
            Color::Rgb(rgb) => {
                out.push_str(" rgb=\"");
                out.push_str(&escape_xml(rgb));
                out.push('"');
            },
            Color::Theme { theme, tint } => {
                out.push_str(&format!(" theme=\"{}\"", theme));
                if let Some(tint) = tint {
                    out.push_str(&format!(" tint=\"{}\"", format_number(*tint)));
                }
            },
            Color::Indexed(index) => out.push_str(&format!(" indexed=\"{}\"", index)),
            Color::Auto => out.push_str(" auto=\"1\""),
        }
        out.push_str("/>");
    }
}

impl PartialEq for Color {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Color::Rgb(a), Color::Rgb(b)) => a.eq_ignore_ascii_case(b),
            (Color::Theme { theme: a, tint: ta }, Color::Theme { theme: b, tint: tb }) => {
                a == b && ta.map(f64::to_bits) == tb.map(f64::to_bits)
            },
            (Color::Indexed(a), Color::Indexed(b)) => a == b,
            (Color::Auto, Color::Auto) => true,
            _ => false,
        }
    }
}

impl Eq for Color {}

impl Hash for Color {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Color::Rgb(rgb) => rgb.to_ascii_uppercase().hash(state),
            Color::Theme { theme, tint } => {
                theme.hash(state);
                tint.map(f64::to_bits).hash(state);
            },
            Color::Indexed(index) => index.hash(state),
            Color::Auto => {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::Reader;
    use quick_xml::events::Event;

    fn parse(xml: &str) -> Option<Color> {
        let mut reader = Reader::from_str(xml);
        match reader.read_event().unwrap() {
            Event::Empty(e) => Color::from_element(&e).unwrap(),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parses_each_kind() {
        assert_eq!(parse(r#"<color rgb="FF00FF00"/>"#), Some(Color::Rgb("ff00ff00".into())));
        assert_eq!(
            parse(r#"<color theme="1" tint="-0.25"/>"#),
            Some(Color::Theme { theme: 1, tint: Some(-0.25) })
        );
        assert_eq!(parse(r#"<color indexed="64"/>"#), Some(Color::Indexed(64)));
        assert_eq!(parse(r#"<color auto="1"/>"#), Some(Color::Auto));
        assert_eq!(parse(r#"<color/>"#), None);
    }

    #[test]
    fn writes_elements() {
        let mut out = String::new();
        Color::Theme { theme: 3, tint: Some(0.5) }.write_element(&mut out, "fgColor");
        assert_eq!(out, r#"<fgColor theme="3" tint="0.5"/>"#);
        assert_eq!(parse(&out), Some(Color::Theme { theme: 3, tint: Some(0.5) }));
    }
}
