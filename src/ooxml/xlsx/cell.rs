//! Cell references and cell records.

use std::fmt;
use std::str::FromStr;

use crate::ooxml::error::{OoxmlError, Result};

use super::styles::FormatDelta;

/// Largest column SpreadsheetML allows (`XFD`).
pub const MAX_COLUMN: u32 = 16_384;
/// Largest row SpreadsheetML allows.
pub const MAX_ROW: u32 = 1_048_576;

/// Convert column number to letters (e.g., 1 -> "A", 26 -> "Z", 27 -> "AA").
pub fn column_to_letters(column: u32) -> String {
    let mut letters = Vec::with_capacity(3);
    let mut col = column;
    while col > 0 {
        col -= 1;
        letters.push((col % 26) as u8 + b'A');
        col /= 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Convert column letters to a number; `None` for anything but `A`..=`XFD`.
pub fn letters_to_column(letters: &str) -> Option<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut column = 0u32;
    for b in letters.bytes() {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        column = column * 26 + u32::from(b.to_ascii_uppercase() - b'A') + 1;
    }
    (column <= MAX_COLUMN).then_some(column)
}

/// A1-style position of one cell. Both coordinates are 1-based.
///
/// References order row-major, which is the order cells must be written in.
///
/// ```
/// use loquat::ooxml::xlsx::CellReference;
///
/// let r: CellReference = "$B$12".parse()?;
/// assert_eq!((r.column, r.row), (2, 12));
/// assert_eq!(r.to_string(), "B12");
/// assert!(CellReference::new(12, 2)? < CellReference::new(1, 3)?);
/// # Ok::<(), loquat::ooxml::error::OoxmlError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellReference {
    pub column: u32,
    pub row: u32,
}

impl CellReference {
    pub fn new(column: u32, row: u32) -> Result<Self> {
        if column == 0 || column > MAX_COLUMN || row == 0 || row > MAX_ROW {
            return Err(OoxmlError::InvalidFormat(format!(
                "Cell position column {} row {} is out of range",
                column, row
            )));
        }
        Ok(Self { column, row })
    }

    /// Column letters of this reference.
    pub fn column_letters(&self) -> String {
        column_to_letters(self.column)
    }
}

impl PartialOrd for CellReference {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellReference {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.row, self.column).cmp(&(other.row, other.column))
    }
}

impl FromStr for CellReference {
    type Err = OoxmlError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || OoxmlError::InvalidFormat(format!("Invalid cell reference: {:?}", s));
        let unanchored: String = s.chars().filter(|&c| c != '$').collect();
        let split = unanchored
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (letters, digits) = unanchored.split_at(split);
        let column = letters_to_column(letters).ok_or_else(invalid)?;
        let row = atoi_simd::parse::<u32, false, false>(digits.as_bytes()).map_err(|_| invalid())?;
        Self::new(column, row).map_err(|_| invalid())
    }
}

impl fmt::Display for CellReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_to_letters(self.column), self.row)
    }
}

/// A rectangular block of cells such as `A1:C10`. A single reference parses
/// as a one-cell range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeReference {
    pub top_left: CellReference,
    pub bottom_right: CellReference,
}

impl RangeReference {
    pub fn new(top_left: CellReference, bottom_right: CellReference) -> Self {
        Self {
            top_left,
            bottom_right,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.bottom_right.column - self.top_left.column + 1
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.bottom_right.row - self.top_left.row + 1
    }

    pub fn contains(&self, cell: CellReference) -> bool {
        (self.top_left.column..=self.bottom_right.column).contains(&cell.column)
            && (self.top_left.row..=self.bottom_right.row).contains(&cell.row)
    }
}

impl FromStr for RangeReference {
    type Err = OoxmlError;

    fn from_str(s: &str) -> Result<Self> {
        let (first, second) = match s.split_once(':') {
            Some((a, b)) => (a.parse::<CellReference>()?, b.parse::<CellReference>()?),
            None => {
                let single = s.parse::<CellReference>()?;
                (single, single)
            },
        };
        // Normalize so that top_left really is the top-left corner.
        Ok(Self {
            top_left: CellReference {
                column: first.column.min(second.column),
                row: first.row.min(second.row),
            },
            bottom_right: CellReference {
                column: first.column.max(second.column),
                row: first.row.max(second.row),
            },
        })
    }
}

impl fmt::Display for RangeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.top_left == self.bottom_right {
            write!(f, "{}", self.top_left)
        } else {
            write!(f, "{}:{}", self.top_left, self.bottom_right)
        }
    }
}

/// The value held by a cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// No value (the cell may still carry a style)
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    /// Text, written through the shared string table
    String(String),
    /// Text written inline in the worksheet
    InlineString(String),
    /// Error literal such as `#DIV/0!`
    Error(String),
    /// ISO 8601 date as written in `t="d"` cells
    Date(String),
}

impl CellValue {
    /// Text content, for both shared and inline strings.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) | CellValue::InlineString(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Number(f64::from(value))
    }
}

impl From<u32> for CellValue {
    fn from(value: u32) -> Self {
        CellValue::Number(f64::from(value))
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

/// The `t` attribute of a cell as found in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellType {
    /// `n`, or no type attribute
    #[default]
    Number,
    /// `s`, an index into the shared string table
    SharedString,
    /// `inlineStr`
    InlineString,
    /// `str`, the string result of a formula
    FormulaString,
    /// `b`
    Boolean,
    /// `e`
    Error,
    /// `d`
    Date,
}

impl CellType {
    /// Map the `t` attribute; unknown values yield `None`.
    pub fn from_attr(value: &[u8]) -> Option<Self> {
        Some(match value {
            b"n" => CellType::Number,
            b"s" => CellType::SharedString,
            b"inlineStr" => CellType::InlineString,
            b"str" => CellType::FormulaString,
            b"b" => CellType::Boolean,
            b"e" => CellType::Error,
            b"d" => CellType::Date,
            _ => return None,
        })
    }

    /// Type a value is written with when it has no formula.
    pub fn of(value: &CellValue) -> Self {
        match value {
            CellValue::Empty | CellValue::Number(_) => CellType::Number,
            CellValue::Bool(_) => CellType::Boolean,
            CellValue::String(_) => CellType::SharedString,
            CellValue::InlineString(_) => CellType::InlineString,
            CellValue::Error(_) => CellType::Error,
            CellValue::Date(_) => CellType::Date,
        }
    }

    /// The `t` attribute value, `None` for numbers.
    pub fn as_attr(self) -> Option<&'static str> {
        match self {
            CellType::Number => None,
            CellType::SharedString => Some("s"),
            CellType::InlineString => Some("inlineStr"),
            CellType::FormulaString => Some("str"),
            CellType::Boolean => Some("b"),
            CellType::Error => Some("e"),
            CellType::Date => Some("d"),
        }
    }
}

/// One cell as decoded by the worksheet reader.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub reference: CellReference,
    pub value: CellValue,
    pub cell_type: CellType,
    /// Formula text without the leading `=`
    pub formula: Option<String>,
    /// Index into the workbook's format records
    pub style: Option<u32>,
    /// Shared string index the value was resolved from
    pub shared_string: Option<u32>,
}

/// Style to apply to a cell being written.
#[derive(Debug, Clone, PartialEq)]
pub enum CellStyle {
    /// An existing format record
    Index(u32),
    /// A change relative to an existing format (or to the default one),
    /// resolved through the stylesheet when the cell is written.
    Delta {
        base: Option<u32>,
        delta: FormatDelta,
    },
}

/// Everything about a cell the writer needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellData {
    pub value: CellValue,
    pub formula: Option<String>,
    pub style: Option<CellStyle>,
}

impl CellData {
    pub fn new(value: impl Into<CellValue>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    pub fn with_style(mut self, style: CellStyle) -> Self {
        self.style = Some(style);
        self
    }
}

impl From<Cell> for CellData {
    fn from(cell: Cell) -> Self {
        Self {
            value: cell.value,
            formula: cell.formula,
            style: cell.style.map(CellStyle::Index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters() {
        assert_eq!(column_to_letters(1), "A");
        assert_eq!(column_to_letters(26), "Z");
        assert_eq!(column_to_letters(27), "AA");
        assert_eq!(column_to_letters(MAX_COLUMN), "XFD");
        assert_eq!(letters_to_column("xfd"), Some(MAX_COLUMN));
        assert_eq!(letters_to_column("XFE"), None);
        assert_eq!(letters_to_column("A1"), None);
    }

    #[test]
    fn parse_and_format_references() {
        let r: CellReference = "AB7".parse().unwrap();
        assert_eq!(r, CellReference { column: 28, row: 7 });
        assert_eq!(r.to_string(), "AB7");
        assert_eq!(r.column_letters(), "AB");
        assert!("7".parse::<CellReference>().is_err());
        assert!("A0".parse::<CellReference>().is_err());
        assert!("A1048577".parse::<CellReference>().is_err());
        assert!("".parse::<CellReference>().is_err());
    }

    #[test]
    fn ordering_is_row_major() {
        let a1: CellReference = "A1".parse().unwrap();
        let z1: CellReference = "Z1".parse().unwrap();
        let a2: CellReference = "A2".parse().unwrap();
        assert!(a1 < z1 && z1 < a2);
    }

    #[test]
    fn ranges() {
        let range: RangeReference = "C3:A1".parse().unwrap();
        assert_eq!(range.to_string(), "A1:C3");
        assert_eq!((range.width(), range.height()), (3, 3));
        assert!(range.contains("B2".parse().unwrap()));
        assert!(!range.contains("D1".parse().unwrap()));
        let single: RangeReference = "B2".parse().unwrap();
        assert_eq!(single.to_string(), "B2");
    }

    #[test]
    fn cell_types() {
        for t in ["n", "s", "inlineStr", "str", "b", "e", "d"] {
            let ty = CellType::from_attr(t.as_bytes()).unwrap();
            assert_eq!(ty.as_attr().unwrap_or("n"), t);
        }
        assert_eq!(CellType::from_attr(b"x"), None);
    }
}
