//! In-memory workbook built on the streaming reader and writer.

use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;

use super::options::{LoadOptions, SaveOptions};
use super::reader::WorkbookReader;
use super::writer::WorkbookWriter;
use super::PreservedPart;
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::xlsx::cell::{Cell, CellData, CellReference, CellType, CellValue};
use crate::ooxml::xlsx::styles::Stylesheet;
use crate::ooxml::xlsx::workbook::{DefinedName, SheetState, validate_title};
use crate::ooxml::xlsx::worksheet::WorksheetMetadata;

/// One worksheet held in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub title: String,
    pub state: SheetState,
    pub cells: Vec<Cell>,
    pub metadata: WorksheetMetadata,
}

impl Sheet {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn cell(&self, reference: CellReference) -> Option<&Cell> {
        self.cells.iter().find(|c| c.reference == reference)
    }

    /// Set a cell's value, replacing any cell already at `reference`.
    pub fn set_value(&mut self, reference: CellReference, value: impl Into<CellValue>) {
        let value = value.into();
        let cell_type = CellType::of(&value);
        match self.cells.iter_mut().find(|c| c.reference == reference) {
            Some(cell) => {
                cell.value = value;
                cell.cell_type = cell_type;
                cell.shared_string = None;
            },
            None => self.cells.push(Cell {
                reference,
                value,
                cell_type,
                formula: None,
                style: None,
                shared_string: None,
            }),
        }
    }
}

/// A whole workbook in memory: sheets with their cells, the stylesheet the
/// cells' style indices refer to, and the parts carried through unchanged.
#[derive(Debug, Clone)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
    pub stylesheet: Stylesheet,
    pub defined_names: Vec<DefinedName>,
    pub date1904: bool,
    pub preserved: Vec<PreservedPart>,
}

impl Default for Workbook {
    fn default() -> Self {
        Self {
            sheets: Vec::new(),
            stylesheet: Stylesheet::default(),
            defined_names: Vec::new(),
            date1904: false,
            preserved: Vec::new(),
        }
    }
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a package held in memory.
    pub fn load(bytes: &[u8], options: LoadOptions) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes), options)
    }

    pub fn load_from_path(path: impl AsRef<Path>, options: LoadOptions) -> Result<Self> {
        Self::from_reader(File::open(path)?, options)
    }

    /// Read every worksheet of a package.
    pub fn from_reader<R: Read + Seek>(source: R, options: LoadOptions) -> Result<Self> {
        let mut reader = WorkbookReader::open(source, options)?;
        let entries: Vec<(String, SheetState)> = reader
            .workbook()
            .sheets
            .iter()
            .map(|s| (s.title.clone(), s.state))
            .collect();

        let mut sheets = Vec::with_capacity(entries.len());
        for (title, state) in entries {
            let mut worksheet = reader.begin_worksheet(&title)?;
            let mut cells = Vec::new();
            while worksheet.has_cell()? {
                cells.push(worksheet.read_cell()?);
            }
            let metadata = worksheet.end_worksheet()?;
            sheets.push(Sheet {
                title,
                state,
                cells,
                metadata,
            });
        }

        let (workbook, stylesheet, preserved) = reader.into_parts();
        Ok(Self {
            sheets,
            stylesheet,
            defined_names: workbook.defined_names,
            date1904: workbook.date1904,
            preserved,
        })
    }

    /// Sheet by title, compared case-insensitively.
    pub fn sheet(&self, title: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.title.to_lowercase() == title.to_lowercase())
    }

    pub fn sheet_mut(&mut self, title: &str) -> Option<&mut Sheet> {
        self.sheets
            .iter_mut()
            .find(|s| s.title.to_lowercase() == title.to_lowercase())
    }

    /// Append an empty sheet.
    pub fn add_sheet(&mut self, title: &str) -> Result<&mut Sheet> {
        validate_title(title)?;
        if self.sheet(title).is_some() {
            return Err(OoxmlError::InvalidOperation(format!(
                "A worksheet named '{}' already exists",
                title
            )));
        }
        self.sheets.push(Sheet::new(title));
        let last = self.sheets.len() - 1;
        Ok(&mut self.sheets[last])
    }

    /// Whether a preserved part is the target of relationship `id` of the
    /// worksheet titled `title`.
    fn has_worksheet_relationship(&self, title: &str, id: &str) -> bool {
        self.preserved
            .iter()
            .flat_map(|part| &part.incoming)
            .any(|rel| rel.id == id && rel.source.is_worksheet(title))
    }

    /// Serialize the package into memory.
    pub fn save(&self, options: SaveOptions) -> Result<Vec<u8>> {
        self.write_to(Vec::new(), options)
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>, options: SaveOptions) -> Result<()> {
        let out = self.write_to(BufWriter::new(File::create(path)?), options)?;
        out.into_inner().map_err(|e| OoxmlError::Io(e.into_error()))?;
        Ok(())
    }

    /// Serialize the package into `out` and give it back.
    ///
    /// Cells are written in row-major order whatever their order in
    /// [`Sheet::cells`]; two cells at the same reference are an
    /// [`OoxmlError::OutOfOrderCell`]. Merged ranges are written back, and
    /// so are references to drawings, comments and tables whose targets are
    /// among the preserved parts.
    pub fn write_to<W: Write>(&self, out: W, options: SaveOptions) -> Result<W> {
        let mut writer = WorkbookWriter::new(out, options)?;
        writer.set_stylesheet(self.stylesheet.clone());
        writer.set_date1904(self.date1904);
        for name in &self.defined_names {
            writer.add_defined_name(name.clone());
        }
        for part in &self.preserved {
            writer.preserve(part.clone())?;
        }

        for sheet in &self.sheets {
            let mut cells: Vec<&Cell> = sheet.cells.iter().collect();
            cells.sort_by_key(|c| c.reference);
            {
                let mut worksheet = writer.add_worksheet(&sheet.title)?;
                for cell in cells {
                    worksheet.add_cell_with(cell.reference, CellData::from(cell.clone()))?;
                }
                for range in &sheet.metadata.merged_cells {
                    worksheet.merge_cells(*range)?;
                }
                let mut references = sheet.metadata.references.clone();
                references.retain(|id| self.has_worksheet_relationship(&sheet.title, id));
                if references != sheet.metadata.references {
                    log::warn!(
                        "worksheet '{}' refers to parts that are not preserved; the references are dropped",
                        sheet.title
                    );
                }
                worksheet.set_references(references)?;
                worksheet.close()?;
            }
            if sheet.state != SheetState::Visible {
                writer.set_sheet_state(&sheet.title, sheet.state)?;
            }
        }
        writer.into_inner()
    }
}
