//! Format records (`<xf>`) and named styles.

use bitflags::bitflags;

use super::{Alignment, Border, Fill, Font, Protection};

bitflags! {
    /// Which components of a format record override its named style.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Applied: u8 {
        const ALIGNMENT = 1;
        const BORDER = 1 << 1;
        const FILL = 1 << 2;
        const FONT = 1 << 3;
        const NUMBER_FORMAT = 1 << 4;
        const PROTECTION = 1 << 5;
    }
}

/// A cell format record.
///
/// Components are indices into the stylesheet's tables, except
/// `number_format`, which holds a number format id (builtin or custom).
/// Records are interned: cells sharing a format share one index, and a cell
/// whose style changes gets a new (or another existing) record instead of
/// mutating the shared one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Format {
    pub alignment: Option<u32>,
    pub border: Option<u32>,
    pub fill: Option<u32>,
    pub font: Option<u32>,
    pub number_format: Option<u32>,
    pub protection: Option<u32>,
    pub applied: Applied,
    /// Name of the named style this record is based on
    pub style: Option<String>,
    pub quote_prefix: bool,
    pub pivot_button: bool,
}

/// A named style (`cellStyleXfs` entry plus its `cellStyles` name).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NamedStyle {
    pub name: String,
    pub builtin_id: Option<u32>,
    pub hidden: bool,
    pub alignment: Option<u32>,
    pub border: Option<u32>,
    pub fill: Option<u32>,
    pub font: Option<u32>,
    pub number_format: Option<u32>,
    pub protection: Option<u32>,
    pub applied: Applied,
}

impl NamedStyle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// The components a cell's style changes. `None` leaves the base format's
/// component alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatDelta {
    pub alignment: Option<Alignment>,
    pub border: Option<Border>,
    pub fill: Option<Fill>,
    pub font: Option<Font>,
    /// Format code; builtin codes map to their builtin id
    pub number_format: Option<String>,
    pub protection: Option<Protection>,
    /// Base the record on this named style
    pub style: Option<String>,
}

impl FormatDelta {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn with_border(mut self, border: Border) -> Self {
        self.border = Some(border);
        self
    }

    pub fn with_fill(mut self, fill: Fill) -> Self {
        self.fill = Some(fill);
        self
    }

    pub fn with_font(mut self, font: Font) -> Self {
        self.font = Some(font);
        self
    }

    pub fn with_number_format(mut self, code: impl Into<String>) -> Self {
        self.number_format = Some(code.into());
        self
    }

    pub fn with_protection(mut self, protection: Protection) -> Self {
        self.protection = Some(protection);
        self
    }

    pub fn with_style(mut self, name: impl Into<String>) -> Self {
        self.style = Some(name.into());
        self
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
