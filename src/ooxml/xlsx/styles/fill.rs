//! Fill patterns and colors.

use std::hash::{Hash, Hasher};

use super::Color;
use crate::ooxml::xlsx::number::format_number;
use crate::ooxml::xml::escape_xml;

/// Fill information.
///
/// Defines the background fill for cells, either as a pattern (including
/// solid) or a gradient.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fill {
    /// Pattern fill; `none` and `gray125` are the two fills every stylesheet
    /// starts with
    Pattern {
        /// Pattern type (e.g., "solid", "gray125", "lightGray")
        pattern_type: String,
        fg_color: Option<Color>,
        bg_color: Option<Color>,
    },
    Gradient(GradientFill),
}

impl Default for Fill {
    fn default() -> Self {
        Fill::pattern("none")
    }
}

impl Fill {
    /// A pattern fill without colors.
    pub fn pattern(pattern_type: impl Into<String>) -> Self {
        Fill::Pattern {
            pattern_type: pattern_type.into(),
            fg_color: None,
            bg_color: None,
        }
    }

    /// Create a new solid fill with the given color.
    #[inline]
    pub fn solid(color: Color) -> Self {
        Fill::Pattern {
            pattern_type: "solid".to_string(),
            fg_color: Some(color),
            bg_color: None,
        }
    }

    /// Check if this is a solid fill.
    pub fn is_solid(&self) -> bool {
        matches!(self, Fill::Pattern { pattern_type, .. } if pattern_type == "solid")
    }

    pub(crate) fn write_xml(&self, out: &mut String) {
        out.push_str("<fill>");
        match self {
            Fill::Pattern {
                pattern_type,
                fg_color,
                bg_color,
            } => {
                out.push_str(&format!("<patternFill patternType=\"{}\"", escape_xml(pattern_type)));
                if fg_color.is_none() && bg_color.is_none() {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    if let Some(c) = fg_color {
                        c.write_element(out, "fgColor");
                    }
                    if let Some(c) = bg_color {
                        c.write_element(out, "bgColor");
                    }
                    out.push_str("</patternFill>");
                }
            },
            Fill::Gradient(gradient) => gradient.write_xml(out),
        }
        out.push_str("</fill>");
    }
}

/// `<gradientFill>`; linear unless `path` is set.
#[derive(Debug, Clone, Default)]
pub struct GradientFill {
    /// `linear` or `path`
    pub gradient_type: Option<String>,
    pub degree: Option<f64>,
    pub left: Option<f64>,
    pub right: Option<f64>,
    pub top: Option<f64>,
    pub bottom: Option<f64>,
    /// (position in `[0, 1]`, color)
    pub stops: Vec<(f64, Color)>,
}

impl GradientFill {
    fn numbers(&self) -> [Option<u64>; 5] {
        [self.degree, self.left, self.right, self.top, self.bottom].map(|v| v.map(f64::to_bits))
    }

    fn write_xml(&self, out: &mut String) {
        out.push_str("<gradientFill");
        if let Some(t) = &self.gradient_type {
            out.push_str(&format!(" type=\"{}\"", escape_xml(t)));
        }
        for (name, value) in [
            ("degree", self.degree),
            ("left", self.left),
            ("right", self.right),
            ("top", self.top),
            ("bottom", self.bottom),
        ] {
            if let Some(v) = value {
                out.push_str(&format!(" {}=\"{}\"", name, format_number(v)));
            }
        }
        out.push('>');
        for (position, color) in &self.stops {
            out.push_str(&format!("<stop position=\"{}\">", format_number(*position)));
            color.write_element(out, "color");
            out.push_str("</stop>");
        }
        out.push_str("</gradientFill>");
    }
}

impl PartialEq for GradientFill {
    fn eq(&self, other: &Self) -> bool {
        self.gradient_type == other.gradient_type
            && self.numbers() == other.numbers()
            && self.stops.len() == other.stops.len()
            && self
                .stops
                .iter()
                .zip(&other.stops)
                .all(|((pa, ca), (pb, cb))| pa.to_bits() == pb.to_bits() && ca == cb)
    }
}

impl Eq for GradientFill {}

impl Hash for GradientFill {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.gradient_type.hash(state);
        self.numbers().hash(state);
        for (position, color) in &self.stops {
            position.to_bits().hash(state);
            color.hash(state);
        }
    }
}
