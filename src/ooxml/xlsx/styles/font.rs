//! Font records.

use std::hash::{Hash, Hasher};

use super::Color;
use crate::ooxml::xlsx::number::format_number;
use crate::ooxml::xml::escape_xml;

/// Font information.
///
/// Defines the visual appearance of text in cells including
/// typeface, size, color, and text decoration.
#[derive(Debug, Clone, Default)]
pub struct Font {
    /// Font name/family (e.g., "Calibri", "Arial")
    pub name: Option<String>,
    /// Font size in points
    pub size: Option<f64>,
    pub bold: bool,
    pub italic: bool,
    /// Underline style; `single` when the element has no value
    pub underline: Option<String>,
    pub strike: bool,
    pub color: Option<Color>,
    pub charset: Option<u32>,
    /// Font family (1=Roman, 2=Swiss, 3=Modern, 4=Script, 5=Decorative)
    pub family: Option<u32>,
    /// Font scheme (major, minor, none)
    pub scheme: Option<String>,
    /// `superscript` or `subscript`
    pub vertical_align: Option<String>,
}

impl Font {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Typeface and size.
    pub fn named(name: impl Into<String>, size: f64) -> Self {
        Self {
            name: Some(name.into()),
            size: Some(size),
            ..Self::default()
        }
    }

    pub fn with_bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }

    pub fn with_italic(mut self, italic: bool) -> Self {
        self.italic = italic;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    /// Check if the font has any special formatting.
    #[inline]
    pub fn has_formatting(&self) -> bool {
        self.bold || self.italic || self.strike || self.underline.is_some()
    }

    pub(crate) fn write_xml(&self, out: &mut String) {
        out.push_str("<font>");
        if self.bold {
            out.push_str("<b/>");
        }
        if self.italic {
            out.push_str("<i/>");
        }
        if let Some(u) = &self.underline {
            if u == "single" {
                out.push_str("<u/>");
            } else {
                out.push_str(&format!("<u val=\"{}\"/>", escape_xml(u)));
            }
        }
        if self.strike {
            out.push_str("<strike/>");
        }
        if let Some(va) = &self.vertical_align {
            out.push_str(&format!("<vertAlign val=\"{}\"/>", escape_xml(va)));
        }
        if let Some(size) = self.size {
            out.push_str(&format!("<sz val=\"{}\"/>", format_number(size)));
        }
        if let Some(color) = &self.color {
            color.write_element(out, "color");
        }
        if let Some(name) = &self.name {
            out.push_str(&format!("<name val=\"{}\"/>", escape_xml(name)));
        }
        if let Some(family) = self.family {
            out.push_str(&format!("<family val=\"{}\"/>", family));
        }
        if let Some(charset) = self.charset {
            out.push_str(&format!("<charset val=\"{}\"/>", charset));
        }
        if let Some(scheme) = &self.scheme {
            out.push_str(&format!("<scheme val=\"{}\"/>", escape_xml(scheme)));
        }
        out.push_str("</font>");
    }
}

impl PartialEq for Font {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.size.map(f64::to_bits) == other.size.map(f64::to_bits)
            && self.bold == other.bold
            && self.italic == other.italic
            && self.underline == other.underline
            && self.strike == other.strike
            && self.color == other.color
            && self.charset == other.charset
            && self.family == other.family
            && self.scheme == other.scheme
            && self.vertical_align == other.vertical_align
    }
}

impl Eq for Font {}

impl Hash for Font {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.size.map(f64::to_bits).hash(state);
        (self.bold, self.italic, self.strike).hash(state);
        self.underline.hash(state);
        self.color.hash(state);
        (self.charset, self.family).hash(state);
        self.scheme.hash(state);
        self.vertical_align.hash(state);
    }
}
