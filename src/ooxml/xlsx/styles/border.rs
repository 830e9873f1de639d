//! Border styles and definitions.

use super::Color;
use crate::ooxml::xml::escape_xml;

/// Border information for a cell.
///
/// Defines the borders on all four sides of a cell plus the diagonal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Border {
    pub left: Option<BorderStyle>,
    pub right: Option<BorderStyle>,
    pub top: Option<BorderStyle>,
    pub bottom: Option<BorderStyle>,
    pub diagonal: Option<BorderStyle>,
    pub diagonal_up: bool,
    pub diagonal_down: bool,
}

/// One side of a border.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BorderStyle {
    /// Border style name (e.g., "thin", "medium", "thick", "double")
    pub style: String,
    pub color: Option<Color>,
}

impl Border {
    /// Create a new empty border (no borders on any side).
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// The same line on all four sides.
    pub fn outline(style: BorderStyle) -> Self {
        Self {
            left: Some(style.clone()),
            right: Some(style.clone()),
            top: Some(style.clone()),
            bottom: Some(style),
            ..Self::default()
        }
    }

    /// Check if this border has any visible borders.
    #[inline]
    pub fn has_borders(&self) -> bool {
        self.left.is_some()
            || self.right.is_some()
            || self.top.is_some()
            || self.bottom.is_some()
            || self.diagonal.is_some()
    }

    pub(crate) fn write_xml(&self, out: &mut String) {
        out.push_str("<border");
        if self.diagonal_up {
            out.push_str(" diagonalUp=\"1\"");
        }
        if self.diagonal_down {
            out.push_str(" diagonalDown=\"1\"");
        }
        out.push('>');
        for (tag, side) in [
            ("left", &self.left),
            ("right", &self.right),
            ("top", &self.top),
            ("bottom", &self.bottom),
            ("diagonal", &self.diagonal),
        ] {
            match side {
                None => {
                    out.push('<');
                    out.push_str(tag);
                    out.push_str("/>");
                },
                Some(side) => {
                    out.push_str(&format!("<{} style=\"{}\"", tag, escape_xml(&side.style)));
                    match &side.color {
                        Some(color) => {
                            out.push('>');
                            color.write_element(out, "color");
                            out.push_str(&format!("</{}>", tag));
                        },
                        None => out.push_str("/>"),
                    }
                },
            }
        }
        out.push_str("</border>");
    }
}

impl BorderStyle {
    #[inline]
    pub fn new(style: impl Into<String>, color: Option<Color>) -> Self {
        Self {
            style: style.into(),
            color,
        }
    }
}
