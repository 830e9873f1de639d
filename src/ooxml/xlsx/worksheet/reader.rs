//! Pull cursor over the cells of one worksheet part.

use std::io::BufRead;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::WorksheetMetadata;
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::xlsx::cell::{Cell, CellReference, CellType, CellValue, RangeReference};
use crate::ooxml::xlsx::number::parse_number;
use crate::ooxml::xlsx::shared_strings::{SharedStrings, read_string_item};
use crate::ooxml::xml::{attr_u32, attr_value, decode_hex_escapes, parse_bool, push_general_ref, text_of};

enum ReadState {
    BeforeWorksheet,
    /// Inside `<sheetData>`, between cells. `row` is 0 before the first row.
    InRow { row: u32, next_column: u32 },
    /// The start tag of the next cell has been read but not decoded.
    AtCell {
        row: u32,
        next_column: u32,
        tag: BytesStart<'static>,
        empty: bool,
    },
    AfterWorksheet,
}

/// Streaming reader of one worksheet.
///
/// Cells come back in document order. Reading a cell consumes exactly the
/// events of that `<c>` element, so the cursor never moves past the closing
/// tag of the row it is in until the next cell is asked for.
pub struct WorksheetReader<'a, R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    state: ReadState,
    shared_strings: &'a SharedStrings,
    metadata: WorksheetMetadata,
}

impl<'a, R: BufRead> WorksheetReader<'a, R> {
    /// Open a worksheet part and position the cursor at its `<sheetData>`.
    pub fn new(source: R, shared_strings: &'a SharedStrings) -> Result<Self> {
        let mut sheet = Self {
            reader: Reader::from_reader(source),
            buf: Vec::with_capacity(1024),
            state: ReadState::BeforeWorksheet,
            shared_strings,
            metadata: WorksheetMetadata::default(),
        };
        sheet.begin()?;
        Ok(sheet)
    }

    fn begin(&mut self) -> Result<()> {
        let mut seen_view = false;
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"dimension" => {
                    self.metadata.dimension = range_attribute(&e, b"ref")?;
                },
                Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheetView" => {
                    // Only the first view counts; later ones belong to other windows.
                    if !seen_view {
                        seen_view = true;
                        for attr in e.attributes().flatten() {
                            if attr.key.local_name().as_ref() == b"tabSelected" {
                                self.metadata.tab_selected = parse_bool(&attr.value);
                            }
                        }
                    }
                },
                Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"pane" => {
                    if let Some(cell) = frozen_top_left(&e)? {
                        self.metadata.freeze_panes.get_or_insert(cell);
                    }
                },
                Event::Start(e) if e.local_name().as_ref() == b"sheetData" => {
                    self.state = ReadState::InRow {
                        row: 0,
                        next_column: 1,
                    };
                    return Ok(());
                },
                Event::Empty(e) if e.local_name().as_ref() == b"sheetData" => {
                    self.state = ReadState::AfterWorksheet;
                    return Ok(());
                },
                Event::Eof => {
                    log::warn!("worksheet part has no sheetData element");
                    self.state = ReadState::AfterWorksheet;
                    return Ok(());
                },
                _ => {},
            }
        }
    }

    /// Metadata gathered so far; merged cells only appear after
    /// [`end_worksheet`](Self::end_worksheet).
    pub fn metadata(&self) -> &WorksheetMetadata {
        &self.metadata
    }

    /// Whether another cell follows. Advances past row boundaries as needed.
    pub fn has_cell(&mut self) -> Result<bool> {
        let (mut row, mut next_column) = match self.state {
            ReadState::AtCell { .. } => return Ok(true),
            ReadState::AfterWorksheet => return Ok(false),
            ReadState::BeforeWorksheet => {
                return Err(OoxmlError::InvalidOperation(
                    "Worksheet not positioned at its cell data".to_string(),
                ));
            },
            ReadState::InRow { row, next_column } => (row, next_column),
        };

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) if e.local_name().as_ref() == b"row" => {
                    row = row_number(&e, row)?;
                    next_column = 1;
                    self.state = ReadState::InRow { row, next_column };
                },
                Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                    row = row_number(&e, row)?;
                    self.state = ReadState::InRow { row, next_column: 1 };
                },
                Event::Start(e) if e.local_name().as_ref() == b"c" => {
                    self.state = ReadState::AtCell {
                        row,
                        next_column,
                        tag: e.into_owned(),
                        empty: false,
                    };
                    return Ok(true);
                },
                Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                    self.state = ReadState::AtCell {
                        row,
                        next_column,
                        tag: e.into_owned(),
                        empty: true,
                    };
                    return Ok(true);
                },
                Event::End(e) if e.local_name().as_ref() == b"sheetData" => {
                    self.state = ReadState::AfterWorksheet;
                    return Ok(false);
                },
                Event::Eof => {
                    self.state = ReadState::AfterWorksheet;
                    return Err(OoxmlError::Xml(
                        "Worksheet ended inside sheetData".to_string(),
                    ));
                },
                _ => {},
            }
        }
    }

    /// Decode the next cell.
    pub fn read_cell(&mut self) -> Result<Cell> {
        if !self.has_cell()? {
            return Err(OoxmlError::InvalidOperation(
                "No cells left in worksheet".to_string(),
            ));
        }
        let placeholder = ReadState::InRow {
            row: 0,
            next_column: 1,
        };
        let (row, next_column, tag, empty) = match std::mem::replace(&mut self.state, placeholder) {
            ReadState::AtCell {
                row,
                next_column,
                tag,
                empty,
            } => (row, next_column, tag, empty),
            other => {
                self.state = other;
                return Err(OoxmlError::InvalidOperation(
                    "Cursor is not at a cell".to_string(),
                ));
            },
        };

        let mut reference = None;
        let mut cell_type = CellType::Number;
        let mut style = None;
        for attr in tag.attributes().flatten() {
            match attr.key.local_name().as_ref() {
                b"r" => reference = Some(attr_value(&attr)?.parse::<CellReference>()?),
                b"t" => {
                    cell_type = CellType::from_attr(&attr.value).unwrap_or_else(|| {
                        log::warn!(
                            "unknown cell type {:?}, reading as number",
                            String::from_utf8_lossy(&attr.value)
                        );
                        CellType::Number
                    })
                },
                b"s" => style = Some(attr_u32(&attr)?),
                _ => {},
            }
        }
        // Cells without `r` take the next column of the current row.
        let reference = match reference {
            Some(r) => r,
            None => CellReference::new(next_column, row.max(1))?,
        };
        self.state = ReadState::InRow {
            row: reference.row,
            next_column: reference.column + 1,
        };

        let mut value_text = None;
        let mut formula = None;
        let mut inline = None;
        if !empty {
            loop {
                self.buf.clear();
                match self.reader.read_event_into(&mut self.buf)? {
                    Event::Start(e) => match e.local_name().as_ref() {
                        b"v" => value_text = Some(read_text(&mut self.reader, b"v")?),
                        b"f" => formula = Some(read_text(&mut self.reader, b"f")?),
                        b"is" => inline = Some(read_string_item(&mut self.reader, b"is")?),
                        _ => {},
                    },
                    Event::End(e) if e.local_name().as_ref() == b"c" => break,
                    Event::Eof => {
                        return Err(OoxmlError::Xml(format!(
                            "Worksheet ended inside cell {}",
                            reference
                        )));
                    },
                    _ => {},
                }
            }
        }

        let mut shared_string = None;
        let value = match (cell_type, value_text) {
            (CellType::InlineString, text) => match inline.or(text) {
                Some(text) => CellValue::InlineString(text),
                None => CellValue::Empty,
            },
            (_, None) => CellValue::Empty,
            (CellType::Number, Some(text)) if text.trim().is_empty() => CellValue::Empty,
            (CellType::Number, Some(text)) => CellValue::Number(parse_number(&text)?),
            (CellType::SharedString, Some(text)) => {
                let index = atoi_simd::parse::<u32, false, false>(text.trim().as_bytes()).map_err(|_| {
                    OoxmlError::InvalidFormat(format!("Bad shared string index {:?} in {}", text, reference))
                })?;
                let resolved = self.shared_strings.get(index).ok_or_else(|| {
                    OoxmlError::InvalidFormat(format!(
                        "Cell {} refers to shared string {} of {}",
                        reference,
                        index,
                        self.shared_strings.len()
                    ))
                })?;
                shared_string = Some(index);
                CellValue::String(resolved.to_string())
            },
            (CellType::FormulaString, Some(text)) => {
                CellValue::String(decode_hex_escapes(&text).into_owned())
            },
            (CellType::Boolean, Some(text)) => CellValue::Bool(parse_bool(text.trim().as_bytes())),
            (CellType::Error, Some(text)) => CellValue::Error(text),
            (CellType::Date, Some(text)) => CellValue::Date(text),
        };

        Ok(Cell {
            reference,
            value,
            cell_type,
            formula,
            style,
            shared_string,
        })
    }

    /// Skip whatever cells remain and read the rest of the part.
    pub fn end_worksheet(mut self) -> Result<WorksheetMetadata> {
        let mut in_sheet_data = matches!(
            self.state,
            ReadState::InRow { .. } | ReadState::AtCell { .. }
        );
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::End(e) if e.local_name().as_ref() == b"sheetData" => in_sheet_data = false,
                Event::Start(e) | Event::Empty(e)
                    if !in_sheet_data && e.local_name().as_ref() == b"mergeCell" =>
                {
                    if let Some(range) = range_attribute(&e, b"ref")? {
                        self.metadata.merged_cells.push(range);
                    }
                },
                Event::Start(e) | Event::Empty(e) if !in_sheet_data => {
                    let references = &mut self.metadata.references;
                    match e.local_name().as_ref() {
                        b"drawing" => references.drawing = relationship_id(&e)?,
                        b"legacyDrawing" => references.legacy_drawing = relationship_id(&e)?,
                        b"legacyDrawingHF" => {
                            references.legacy_drawing_header_footer = relationship_id(&e)?
                        },
                        b"picture" => references.picture = relationship_id(&e)?,
                        b"tablePart" => references.table_parts.extend(relationship_id(&e)?),
                        _ => {},
                    }
                },
                Event::Eof => break,
                _ => {},
            }
        }
        self.state = ReadState::AfterWorksheet;
        Ok(std::mem::take(&mut self.metadata))
    }
}

/// Row number from `r`, else the one after `previous`.
fn row_number(e: &BytesStart<'_>, previous: u32) -> Result<u32> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == b"r" {
            return attr_u32(&attr);
        }
    }
    Ok(previous + 1)
}

fn range_attribute(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<RangeReference>> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == name {
            let value = attr_value(&attr)?;
            return match value.parse::<RangeReference>() {
                Ok(range) => Ok(Some(range)),
                Err(_) => {
                    log::warn!("ignoring malformed range {:?}", value);
                    Ok(None)
                },
            };
        }
    }
    Ok(None)
}

/// The `r:id` of an element that refers to another part.
fn relationship_id(e: &BytesStart<'_>) -> Result<Option<String>> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == b"id" {
            return Ok(Some(attr_value(&attr)?));
        }
    }
    Ok(None)
}

/// Top-left cell of a frozen pane.
fn frozen_top_left(e: &BytesStart<'_>) -> Result<Option<CellReference>> {
    let mut frozen = false;
    let mut top_left = None;
    for attr in e.attributes().flatten() {
        match attr.key.local_name().as_ref() {
            b"state" => frozen = matches!(attr.value.as_ref(), b"frozen" | b"frozenSplit"),
            b"topLeftCell" => top_left = attr_value(&attr)?.parse::<CellReference>().ok(),
            _ => {},
        }
    }
    Ok(if frozen { top_left } else { None })
}

/// Text content of a simple element up to its closing tag.
fn read_text<R: BufRead>(reader: &mut Reader<R>, end: &[u8]) -> Result<String> {
    let mut text = String::new();
    let mut buf = Vec::with_capacity(64);
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Text(t) => text.push_str(&text_of(&t)?),
            Event::CData(t) => text.push_str(&String::from_utf8_lossy(&t)),
            Event::GeneralRef(r) => push_general_ref(&mut text, &r)?,
            Event::End(e) if e.local_name().as_ref() == end => break,
            Event::Eof => break,
            _ => {},
        }
    }
    Ok(text)
}
