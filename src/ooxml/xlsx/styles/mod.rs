//! Stylesheet interning store.
//!
//! Every formatting component lives in an append-only table owned by the
//! workbook's [`Stylesheet`]: alignments, borders, fills, fonts, number
//! formats and protections, plus the format records and named styles that
//! reference them by index. Inserting a value that is already present returns
//! the existing index, so equal formatting is stored once and indices never
//! move.
//!
//! # Example
//!
//! ```rust
//! use loquat::ooxml::xlsx::styles::{FormatDelta, Font, Stylesheet};
//!
//! let mut styles = Stylesheet::default();
//! let bold = Font::named("Calibri", 11.0).with_bold(true);
//! let a = styles.find_or_add(bold.clone());
//! assert_eq!(styles.find_or_add(bold.clone()), a);
//!
//! let delta = FormatDelta::new().with_font(bold).with_number_format("0.000");
//! let f = styles.find_or_create_format(None, &delta)?;
//! assert_eq!(styles.find_or_create_format(None, &delta)?, f);
//! assert_eq!(styles.format(f)?.number_format, Some(164));
//! # Ok::<(), loquat::ooxml::error::OoxmlError>(())
//! ```

mod alignment;
mod border;
mod color;
mod fill;
mod font;
mod format;
mod number_format;
mod parser;
mod writer;

pub use alignment::{Alignment, Protection};
pub use border::{Border, BorderStyle};
pub use color::Color;
pub use fill::{Fill, GradientFill};
pub use font::Font;
pub use format::{Applied, Format, FormatDelta, NamedStyle};
pub use number_format::{
    FIRST_CUSTOM_ID, NumberFormat, builtin_format_code, builtin_format_id,
};

use std::collections::HashMap;
use std::hash::Hash;

use crate::ooxml::error::{OoxmlError, Result};

/// Append-only table with a hashed index over its values.
///
/// The index maps a value to the first slot holding it; a parsed stylesheet
/// may carry duplicates, which keep their own slots so existing references
/// stay valid.
#[derive(Debug, Clone)]
pub struct Interner<T> {
    values: Vec<T>,
    index: HashMap<T, u32>,
}

impl<T> Default for Interner<T> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Clone + Eq + Hash> Interner<T> {
    /// Index of `value`, appending it if absent.
    pub fn find_or_add(&mut self, value: T) -> u32 {
        if let Some(&i) = self.index.get(&value) {
            return i;
        }
        let i = self.values.len() as u32;
        self.index.insert(value.clone(), i);
        self.values.push(value);
        i
    }

    /// Append without deduplicating, as a parser must.
    pub(crate) fn push(&mut self, value: T) -> u32 {
        let i = self.values.len() as u32;
        self.index.entry(value.clone()).or_insert(i);
        self.values.push(value);
        i
    }

    pub fn find(&self, value: &T) -> Option<u32> {
        self.index.get(value).copied()
    }

    #[inline]
    pub fn get(&self, index: u32) -> Option<&T> {
        self.values.get(index as usize)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.values.iter()
    }
}

/// A value that lives in one of the stylesheet's component tables.
pub trait StyleComponent: Clone + Eq + Hash {
    /// Table name used in error messages.
    const TABLE: &'static str;

    fn table(styles: &Stylesheet) -> &Interner<Self>;
    fn table_mut(styles: &mut Stylesheet) -> &mut Interner<Self>;
}

macro_rules! style_component {
    ($ty:ty, $field:ident, $name:literal) => {
        impl StyleComponent for $ty {
            const TABLE: &'static str = $name;

            #[inline]
            fn table(styles: &Stylesheet) -> &Interner<Self> {
                &styles.$field
            }

            #[inline]
            fn table_mut(styles: &mut Stylesheet) -> &mut Interner<Self> {
                &mut styles.$field
            }
        }
    };
}

style_component!(Alignment, alignments, "alignment");
style_component!(Border, borders, "border");
style_component!(Fill, fills, "fill");
style_component!(Font, fonts, "font");
style_component!(Protection, protections, "protection");

/// The formatting tables of one workbook.
#[derive(Debug, Clone)]
pub struct Stylesheet {
    alignments: Interner<Alignment>,
    borders: Interner<Border>,
    fills: Interner<Fill>,
    fonts: Interner<Font>,
    protections: Interner<Protection>,
    /// Custom number formats by id
    number_formats: Vec<NumberFormat>,
    next_number_format_id: u32,
    formats: Interner<Format>,
    named_styles: Vec<NamedStyle>,
}

impl Default for Stylesheet {
    /// The records every consumer expects: Calibri 11, the `none` and
    /// `gray125` fills, an empty border, format 0 and the "Normal" style.
    fn default() -> Self {
        let mut styles = Self::empty();
        let font = styles.find_or_add(Font {
            name: Some("Calibri".to_string()),
            size: Some(11.0),
            color: Some(Color::Theme {
                theme: 1,
                tint: None,
            }),
            family: Some(2),
            scheme: Some("minor".to_string()),
            ..Font::default()
        });
        let fill = styles.find_or_add(Fill::pattern("none"));
        styles.find_or_add(Fill::pattern("gray125"));
        let border = styles.find_or_add(Border::default());

        styles.named_styles.push(NamedStyle {
            name: "Normal".to_string(),
            builtin_id: Some(0),
            font: Some(font),
            fill: Some(fill),
            border: Some(border),
            number_format: Some(0),
            ..NamedStyle::default()
        });
        styles.formats.find_or_add(Format {
            font: Some(font),
            fill: Some(fill),
            border: Some(border),
            number_format: Some(0),
            style: Some("Normal".to_string()),
            ..Format::default()
        });
        styles
    }
}

impl Stylesheet {
    /// A stylesheet with no records at all.
    pub fn empty() -> Self {
        Self {
            alignments: Interner::default(),
            borders: Interner::default(),
            fills: Interner::default(),
            fonts: Interner::default(),
            protections: Interner::default(),
            number_formats: Vec::new(),
            next_number_format_id: FIRST_CUSTOM_ID,
            formats: Interner::default(),
            named_styles: Vec::new(),
        }
    }

    /// Parse `xl/styles.xml`.
    pub fn parse(xml: &str) -> Result<Self> {
        parser::parse_stylesheet(xml)
    }

    /// Serialize as `xl/styles.xml`.
    pub fn to_xml(&self) -> String {
        writer::write_stylesheet(self)
    }

    /// Index of `value` in its table, appending it if absent.
    pub fn find_or_add<T: StyleComponent>(&mut self, value: T) -> u32 {
        T::table_mut(self).find_or_add(value)
    }

    /// Look up a component by index.
    pub fn get<T: StyleComponent>(&self, index: u32) -> Result<&T> {
        let table = T::table(self);
        table.get(index).ok_or(OoxmlError::InvalidStyleIndex {
            table: T::TABLE,
            index: index as usize,
            len: table.len(),
        })
    }

    /// All values of one component table in index order.
    pub fn table<T: StyleComponent>(&self) -> &Interner<T> {
        T::table(self)
    }

    pub(crate) fn table_mut<T: StyleComponent>(&mut self) -> &mut Interner<T> {
        T::table_mut(self)
    }

    /// Id for a number format code: the builtin id when the code is builtin,
    /// else an existing or newly assigned custom id.
    pub fn find_or_add_number_format(&mut self, code: &str) -> u32 {
        if let Some(f) = self.number_formats.iter().find(|f| f.code == code) {
            return f.id;
        }
        if let Some(id) = builtin_format_id(code) {
            return id;
        }
        let id = self.next_number_format_id;
        self.next_number_format_id += 1;
        self.number_formats.push(NumberFormat::new(id, code));
        id
    }

    /// Register a number format read from a file under its own id.
    pub(crate) fn insert_number_format(&mut self, format: NumberFormat) {
        self.next_number_format_id = self.next_number_format_id.max(format.id + 1);
        match self.number_formats.iter_mut().find(|f| f.id == format.id) {
            Some(existing) => *existing = format,
            None => self.number_formats.push(format),
        }
    }

    /// Number format by id, custom definitions taking precedence.
    pub fn number_format(&self, id: u32) -> Result<NumberFormat> {
        self.number_formats
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .or_else(|| NumberFormat::builtin(id))
            .ok_or(OoxmlError::InvalidStyleIndex {
                table: "number_format",
                index: id as usize,
                len: self.number_formats.len(),
            })
    }

    /// Custom number formats in insertion order.
    pub fn custom_number_formats(&self) -> &[NumberFormat] {
        &self.number_formats
    }

    /// Format record by index.
    pub fn format(&self, index: u32) -> Result<&Format> {
        self.formats.get(index).ok_or(OoxmlError::InvalidStyleIndex {
            table: "format",
            index: index as usize,
            len: self.formats.len(),
        })
    }

    /// Number of format records.
    #[inline]
    pub fn format_count(&self) -> usize {
        self.formats.len()
    }

    pub fn formats(&self) -> &Interner<Format> {
        &self.formats
    }

    pub(crate) fn formats_mut(&mut self) -> &mut Interner<Format> {
        &mut self.formats
    }

    /// Intern a complete format record.
    pub fn find_or_add_format(&mut self, format: Format) -> u32 {
        self.formats.find_or_add(format)
    }

    /// The format a cell gets when `delta` is applied to the format at
    /// `base` (or to a blank format). Existing records are reused; the base
    /// record itself is never modified.
    pub fn find_or_create_format(&mut self, base: Option<u32>, delta: &FormatDelta) -> Result<u32> {
        let mut format = match base {
            Some(index) => self.format(index)?.clone(),
            None => Format::default(),
        };
        if let Some(alignment) = &delta.alignment {
            format.alignment = Some(self.find_or_add(alignment.clone()));
            format.applied |= Applied::ALIGNMENT;
        }
        if let Some(border) = &delta.border {
            format.border = Some(self.find_or_add(border.clone()));
            format.applied |= Applied::BORDER;
        }
        if let Some(fill) = &delta.fill {
            format.fill = Some(self.find_or_add(fill.clone()));
            format.applied |= Applied::FILL;
        }
        if let Some(font) = &delta.font {
            format.font = Some(self.find_or_add(font.clone()));
            format.applied |= Applied::FONT;
        }
        if let Some(code) = &delta.number_format {
            format.number_format = Some(self.find_or_add_number_format(code));
            format.applied |= Applied::NUMBER_FORMAT;
        }
        if let Some(protection) = delta.protection {
            format.protection = Some(self.find_or_add(protection));
            format.applied |= Applied::PROTECTION;
        }
        if let Some(name) = &delta.style {
            if self.named_style(name).is_none() {
                return Err(OoxmlError::InvalidOperation(format!(
                    "No named style called {:?}",
                    name
                )));
            }
            format.style = Some(name.clone());
        }
        Ok(self.formats.find_or_add(format))
    }

    /// Named style by name.
    pub fn named_style(&self, name: &str) -> Option<&NamedStyle> {
        self.named_styles.iter().find(|s| s.name == name)
    }

    pub fn named_styles(&self) -> &[NamedStyle] {
        &self.named_styles
    }

    /// Add a named style, replacing one with the same name. Returns its
    /// position among the named styles.
    pub fn add_named_style(&mut self, style: NamedStyle) -> u32 {
        match self.named_styles.iter().position(|s| s.name == style.name) {
            Some(i) => {
                self.named_styles[i] = style;
                i as u32
            },
            None => {
                self.named_styles.push(style);
                (self.named_styles.len() - 1) as u32
            },
        }
    }

    pub(crate) fn named_styles_mut(&mut self) -> &mut Vec<NamedStyle> {
        &mut self.named_styles
    }
}
