//! Push writer for one worksheet part.

use std::fmt::Write as _;
use std::io::Write;

use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::constants::namespace;
use super::PartReferences;
use crate::ooxml::xlsx::cell::{CellData, CellReference, CellStyle, CellValue, RangeReference};
use crate::ooxml::xlsx::number::format_number;
use crate::ooxml::xlsx::shared_strings::{SharedStrings, push_text_element};
use crate::ooxml::xlsx::styles::Stylesheet;
use crate::ooxml::xml::{escape_cell_text, escape_xml};

/// Where a worksheet part goes. `finish_part` is called once after the
/// closing tags are written.
pub trait PartSink: Write {
    fn finish_part(self) -> Result<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

impl<W: Write> PartSink for kumquat_zip::EntryWriter<'_, W> {
    fn finish_part(self) -> Result<()> {
        Ok(self.finish()?)
    }
}

impl PartSink for &mut Vec<u8> {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteState {
    BeforeWorksheet,
    WritingRow { open_row: Option<u32> },
    AfterWorksheet,
}

/// Streaming writer of one worksheet.
///
/// Cells must arrive in row-major order: strictly increasing rows, and
/// strictly increasing columns within a row. String values are interned in
/// the workbook's shared string table; styles given as deltas are resolved
/// through its stylesheet.
pub struct WorksheetWriter<'a, S: PartSink> {
    out: Option<S>,
    state: WriteState,
    last: Option<CellReference>,
    stylesheet: &'a mut Stylesheet,
    shared_strings: &'a mut SharedStrings,
    tab_selected: bool,
    merged_cells: Vec<RangeReference>,
    references: PartReferences,
    cell: String,
}

impl<'a, S: PartSink> WorksheetWriter<'a, S> {
    /// Start a worksheet part and write everything up to `<sheetData>`.
    pub fn new(
        out: S,
        stylesheet: &'a mut Stylesheet,
        shared_strings: &'a mut SharedStrings,
        tab_selected: bool,
    ) -> Result<Self> {
        let mut writer = Self {
            out: Some(out),
            state: WriteState::BeforeWorksheet,
            last: None,
            stylesheet,
            shared_strings,
            tab_selected,
            merged_cells: Vec::new(),
            references: PartReferences::default(),
            cell: String::with_capacity(128),
        };
        writer.begin()?;
        Ok(writer)
    }

    fn begin(&mut self) -> Result<()> {
        let mut head = String::with_capacity(512);
        head.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        let _ = write!(
            head,
            r#"<worksheet xmlns="{}" xmlns:r="{}">"#,
            namespace::SML_MAIN,
            namespace::OFC_RELATIONSHIPS
        );
        if self.tab_selected {
            head.push_str(r#"<sheetViews><sheetView tabSelected="1" workbookViewId="0"/></sheetViews>"#);
        } else {
            head.push_str(r#"<sheetViews><sheetView workbookViewId="0"/></sheetViews>"#);
        }
        head.push_str(r#"<sheetFormatPr defaultRowHeight="15"/><sheetData>"#);
        self.sink()?.write_all(head.as_bytes())?;
        self.state = WriteState::WritingRow { open_row: None };
        Ok(())
    }

    fn sink(&mut self) -> Result<&mut S> {
        self.out
            .as_mut()
            .ok_or_else(|| OoxmlError::InvalidOperation("Worksheet already closed".to_string()))
    }

    /// Write a cell holding `value`.
    pub fn add_cell(&mut self, reference: CellReference, value: impl Into<CellValue>) -> Result<()> {
        self.add_cell_with(reference, CellData::new(value))
    }

    /// Write a cell with a formula and/or style.
    pub fn add_cell_with(&mut self, reference: CellReference, data: CellData) -> Result<()> {
        let WriteState::WritingRow { open_row } = self.state else {
            return Err(OoxmlError::InvalidOperation(
                "Worksheet is not accepting cells".to_string(),
            ));
        };
        if let Some(previous) = self.last
            && reference <= previous
        {
            return Err(OoxmlError::OutOfOrderCell {
                previous: previous.to_string(),
                attempted: reference.to_string(),
            });
        }
        if let CellValue::Number(n) = data.value
            && !n.is_finite()
        {
            return Err(OoxmlError::InvalidOperation(format!(
                "Cell {} holds {}, which a worksheet cannot store",
                reference, n
            )));
        }
        let style = match &data.style {
            None => None,
            Some(CellStyle::Index(index)) => {
                self.stylesheet.format(*index)?;
                Some(*index)
            },
            Some(CellStyle::Delta { base, delta }) => {
                Some(self.stylesheet.find_or_create_format(*base, delta)?)
            },
        };

        // Build the whole element before writing so a failure leaves the
        // part untouched.
        let mut cell = std::mem::take(&mut self.cell);
        cell.clear();
        if open_row != Some(reference.row) {
            if open_row.is_some() {
                cell.push_str("</row>");
            }
            let _ = write!(cell, r#"<row r="{}">"#, reference.row);
        }
        self.encode_cell(&mut cell, reference, data, style);

        let written = self.sink().and_then(|out| Ok(out.write_all(cell.as_bytes())?));
        self.cell = cell;
        written?;

        self.last = Some(reference);
        self.state = WriteState::WritingRow {
            open_row: Some(reference.row),
        };
        Ok(())
    }

    fn encode_cell(&mut self, cell: &mut String, reference: CellReference, data: CellData, style: Option<u32>) {
        let _ = write!(cell, r#"<c r="{}""#, reference);
        if let Some(style) = style.filter(|&s| s != 0) {
            let _ = write!(cell, r#" s="{}""#, style);
        }

        let formula = data.formula.as_deref().map(|f| f.strip_prefix('=').unwrap_or(f));
        let (cell_type, value) = match data.value {
            CellValue::Empty => (None, None),
            CellValue::Number(n) => (None, Some(format_number(n))),
            // A formula's cached string result is stored inline.
            CellValue::String(s) if formula.is_some() => (Some("str"), Some(escape_cell_text(&s))),
            CellValue::String(s) => {
                let index = self.shared_strings.intern(&s);
                (Some("s"), Some(index.to_string()))
            },
            CellValue::Bool(b) => (Some("b"), Some(if b { "1" } else { "0" }.to_string())),
            CellValue::Error(e) => (Some("e"), Some(escape_xml(&e))),
            CellValue::Date(d) => (Some("d"), Some(escape_xml(&d))),
            CellValue::InlineString(s) => {
                cell.push_str(r#" t="inlineStr">"#);
                if let Some(f) = formula {
                    let _ = write!(cell, "<f>{}</f>", escape_xml(f));
                }
                cell.push_str("<is>");
                push_text_element(cell, &s);
                cell.push_str("</is></c>");
                return;
            },
        };
        if let Some(t) = cell_type {
            let _ = write!(cell, r#" t="{}""#, t);
        }
        if formula.is_none() && value.is_none() {
            cell.push_str("/>");
            return;
        }
        cell.push('>');
        if let Some(f) = formula {
            let _ = write!(cell, "<f>{}</f>", escape_xml(f));
        }
        if let Some(v) = value {
            let _ = write!(cell, "<v>{}</v>", v);
        }
        cell.push_str("</c>");
    }

    /// Merge a range. Merges are written when the worksheet is closed and
    /// may not overlap one another.
    pub fn merge_cells(&mut self, range: RangeReference) -> Result<()> {
        if self.state == WriteState::AfterWorksheet {
            return Err(OoxmlError::InvalidOperation("Worksheet already closed".to_string()));
        }
        if let Some(other) = self.merged_cells.iter().find(|m| overlaps(m, &range)) {
            return Err(OoxmlError::InvalidOperation(format!(
                "Merged range {} overlaps {}",
                range, other
            )));
        }
        self.merged_cells.push(range);
        Ok(())
    }

    /// Refer to drawings, comments' VML and tables by relationship id. The
    /// ids must exist in the worksheet's relationships.
    pub fn set_references(&mut self, references: PartReferences) -> Result<()> {
        if self.state == WriteState::AfterWorksheet {
            return Err(OoxmlError::InvalidOperation("Worksheet already closed".to_string()));
        }
        self.references = references;
        Ok(())
    }

    /// Reference of the last cell written.
    pub fn last_cell(&self) -> Option<CellReference> {
        self.last
    }

    /// Write the closing tags and finish the part. Calling it again does
    /// nothing.
    pub fn close(&mut self) -> Result<()> {
        let WriteState::WritingRow { open_row } = self.state else {
            return Ok(());
        };
        self.state = WriteState::AfterWorksheet;
        let Some(mut out) = self.out.take() else {
            return Ok(());
        };
        if open_row.is_some() {
            out.write_all(b"</row>")?;
        }
        out.write_all(b"</sheetData>")?;
        out.write_all(self.trailer().as_bytes())?;
        out.write_all(b"</worksheet>")?;
        out.flush()?;
        out.finish_part()
    }
}

impl<S: PartSink> WorksheetWriter<'_, S> {
    /// Elements after `<sheetData>`, in schema order.
    fn trailer(&self) -> String {
        let mut xml = String::new();
        if !self.merged_cells.is_empty() {
            let _ = write!(xml, r#"<mergeCells count="{}">"#, self.merged_cells.len());
            for range in &self.merged_cells {
                let _ = write!(xml, r#"<mergeCell ref="{}"/>"#, range);
            }
            xml.push_str("</mergeCells>");
        }
        let refs = &self.references;
        for (element, id) in [
            ("drawing", &refs.drawing),
            ("legacyDrawing", &refs.legacy_drawing),
            ("legacyDrawingHF", &refs.legacy_drawing_header_footer),
            ("picture", &refs.picture),
        ] {
            if let Some(id) = id {
                let _ = write!(xml, r#"<{} r:id="{}"/>"#, element, escape_xml(id));
            }
        }
        if !refs.table_parts.is_empty() {
            let _ = write!(xml, r#"<tableParts count="{}">"#, refs.table_parts.len());
            for id in &refs.table_parts {
                let _ = write!(xml, r#"<tablePart r:id="{}"/>"#, escape_xml(id));
            }
            xml.push_str("</tableParts>");
        }
        xml
    }
}

fn overlaps(a: &RangeReference, b: &RangeReference) -> bool {
    a.top_left.column <= b.bottom_right.column
        && b.top_left.column <= a.bottom_right.column
        && a.top_left.row <= b.bottom_right.row
        && b.top_left.row <= a.bottom_right.row
}

impl<S: PartSink> Drop for WorksheetWriter<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("failed to close worksheet: {}", e);
        }
    }
}
