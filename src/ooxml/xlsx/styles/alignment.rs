//! Cell alignment and protection.

use crate::ooxml::xml::escape_xml;

/// Alignment information for cell content.
///
/// Controls how text is positioned within a cell both horizontally
/// and vertically, as well as text wrapping and rotation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Alignment {
    /// Horizontal alignment (e.g., "left", "center", "right", "fill", "justify")
    pub horizontal: Option<String>,
    /// Vertical alignment (e.g., "top", "center", "bottom", "justify")
    pub vertical: Option<String>,
    /// Text rotation (angle in degrees, 0-180, or 255 for vertical)
    pub text_rotation: Option<u32>,
    pub wrap_text: bool,
    /// Indent level (for horizontal alignment)
    pub indent: Option<u32>,
    pub shrink_to_fit: bool,
    /// Reading order (0=context, 1=LTR, 2=RTL)
    pub reading_order: Option<u32>,
}

impl Alignment {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new alignment with horizontal and vertical settings.
    #[inline]
    pub fn with_alignment(horizontal: Option<String>, vertical: Option<String>) -> Self {
        Self {
            horizontal,
            vertical,
            ..Default::default()
        }
    }

    pub(crate) fn write_xml(&self, out: &mut String) {
        out.push_str("<alignment");
        if let Some(h) = &self.horizontal {
            out.push_str(&format!(" horizontal=\"{}\"", escape_xml(h)));
        }
        if let Some(v) = &self.vertical {
            out.push_str(&format!(" vertical=\"{}\"", escape_xml(v)));
        }
        if let Some(r) = self.text_rotation {
            out.push_str(&format!(" textRotation=\"{}\"", r));
        }
        if self.wrap_text {
            out.push_str(" wrapText=\"1\"");
        }
        if let Some(i) = self.indent {
            out.push_str(&format!(" indent=\"{}\"", i));
        }
        if self.shrink_to_fit {
            out.push_str(" shrinkToFit=\"1\"");
        }
        if let Some(r) = self.reading_order {
            out.push_str(&format!(" readingOrder=\"{}\"", r));
        }
        out.push_str("/>");
    }
}

/// Cell protection flags; both only take effect on a protected sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Protection {
    pub locked: bool,
    pub hidden: bool,
}

impl Default for Protection {
    fn default() -> Self {
        Self {
            locked: true,
            hidden: false,
        }
    }
}

impl Protection {
    pub(crate) fn write_xml(&self, out: &mut String) {
        out.push_str(&format!(
            "<protection locked=\"{}\" hidden=\"{}\"/>",
            u8::from(self.locked),
            u8::from(self.hidden)
        ));
    }
}
