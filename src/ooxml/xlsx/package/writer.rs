//! Writing a workbook package.

use std::io::{self, Write};

use kumquat_zip::{ArchiveWriter, CompressionMethod, EntryWriter};

use super::options::SaveOptions;
use super::{IncomingRelationship, PreservedPart, RelationshipSource, same_title};
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::constants::{content_type as ct, relationship_type as rt};
use crate::ooxml::opc::{ContentTypes, PackURI, Relationships, TargetMode};
use crate::ooxml::xlsx::shared_strings::SharedStrings;
use crate::ooxml::xlsx::styles::Stylesheet;
use crate::ooxml::xlsx::workbook::{DefinedName, SheetEntry, SheetState, WorkbookPart, validate_title};
use crate::ooxml::xlsx::worksheet::WorksheetWriter;

#[cfg(feature = "ooxml_encryption")]
use crate::ooxml::crypto;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const STYLES_PART: &str = "xl/styles.xml";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

/// Where the ZIP bytes go: straight to the caller's sink, or into memory
/// until they are encrypted.
pub enum PackageSink<W> {
    Direct(W),
    Buffered { zip: Vec<u8>, out: W },
}

impl<W: Write> Write for PackageSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            PackageSink::Direct(w) => w.write(buf),
            PackageSink::Buffered { zip, .. } => zip.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            PackageSink::Direct(w) => w.flush(),
            PackageSink::Buffered { .. } => Ok(()),
        }
    }
}

#[derive(Debug)]
struct WrittenSheet {
    title: String,
    part: PackURI,
    state: SheetState,
}

/// Streaming writer of a workbook package.
///
/// Worksheets are written one at a time through
/// [`add_worksheet`](Self::add_worksheet); the stylesheet, shared strings,
/// workbook part, relationships and content types follow on
/// [`close`](Self::close). Dropping an unclosed writer closes it and logs
/// any failure.
pub struct WorkbookWriter<W: Write> {
    archive: Option<ArchiveWriter<PackageSink<W>>>,
    out: Option<W>,
    options: SaveOptions,
    stylesheet: Stylesheet,
    shared_strings: SharedStrings,
    sheets: Vec<WrittenSheet>,
    defined_names: Vec<DefinedName>,
    date1904: bool,
    preserved: Vec<PreservedPart>,
}

impl<W: Write> WorkbookWriter<W> {
    pub fn new(out: W, options: SaveOptions) -> Result<Self> {
        let sink = match options.password {
            None => PackageSink::Direct(out),
            Some(_) if cfg!(feature = "ooxml_encryption") => PackageSink::Buffered {
                zip: Vec::new(),
                out,
            },
            Some(_) => {
                return Err(OoxmlError::UnsupportedEncryption(
                    "saving with a password needs the ooxml_encryption feature".to_string(),
                ));
            },
        };
        let archive = ArchiveWriter::new(sink).with_compression_level(options.compression_level);
        Ok(Self {
            archive: Some(archive),
            out: None,
            options,
            stylesheet: Stylesheet::default(),
            shared_strings: SharedStrings::new(),
            sheets: Vec::new(),
            defined_names: Vec::new(),
            date1904: false,
            preserved: Vec::new(),
        })
    }

    /// Start the next worksheet. The first one added is the selected tab.
    ///
    /// Titles are validated and must be unique, ignoring case.
    pub fn add_worksheet(
        &mut self,
        title: &str,
    ) -> Result<WorksheetWriter<'_, EntryWriter<'_, PackageSink<W>>>> {
        validate_title(title)?;
        if self.sheets.iter().any(|s| same_title(&s.title, title)) {
            return Err(OoxmlError::InvalidOperation(format!(
                "A worksheet named '{}' already exists",
                title
            )));
        }
        let part = self.next_sheet_part();
        let archive = self.archive.as_mut().ok_or_else(closed)?;
        let entry = archive.start_entry(part.membername(), CompressionMethod::Deflate)?;
        log::debug!("writing worksheet '{}' to {}", title, part);

        let tab_selected = self.sheets.is_empty();
        self.sheets.push(WrittenSheet {
            title: title.to_string(),
            part,
            state: SheetState::Visible,
        });
        WorksheetWriter::new(
            entry,
            &mut self.stylesheet,
            &mut self.shared_strings,
            tab_selected,
        )
    }

    fn next_sheet_part(&self) -> PackURI {
        let mut n = self.sheets.len() + 1;
        loop {
            let part = PackURI::from_member_name(&format!("xl/worksheets/sheet{}.xml", n));
            let rels = part.rels_uri();
            if !self.preserved.iter().any(|p| p.name == part || p.name == rels) {
                return part;
            }
            n += 1;
        }
    }

    /// Hide or show a worksheet already added.
    pub fn set_sheet_state(&mut self, title: &str, state: SheetState) -> Result<()> {
        let sheet = self
            .sheets
            .iter_mut()
            .find(|s| same_title(&s.title, title))
            .ok_or_else(|| OoxmlError::InvalidOperation(format!("No worksheet named '{}'", title)))?;
        sheet.state = state;
        Ok(())
    }

    /// The stylesheet cells are resolved against.
    pub fn stylesheet(&self) -> &Stylesheet {
        &self.stylesheet
    }

    pub fn stylesheet_mut(&mut self) -> &mut Stylesheet {
        &mut self.stylesheet
    }

    /// Replace the stylesheet, typically with one loaded from another
    /// package so its format indices stay valid.
    pub fn set_stylesheet(&mut self, stylesheet: Stylesheet) {
        self.stylesheet = stylesheet;
    }

    pub fn shared_strings(&self) -> &SharedStrings {
        &self.shared_strings
    }

    pub fn add_defined_name(&mut self, name: DefinedName) {
        self.defined_names.push(name);
    }

    /// Use the 1904 date system.
    pub fn set_date1904(&mut self, date1904: bool) {
        self.date1904 = date1904;
    }

    /// Carry a part through verbatim. Its incoming relationships are added
    /// to the root, workbook or worksheet relationships when the package is
    /// closed; a worksheet's elements referring to them are set with
    /// [`WorksheetWriter::set_references`].
    pub fn preserve(&mut self, part: PreservedPart) -> Result<()> {
        let reserved = [WORKBOOK_PART, STYLES_PART, SHARED_STRINGS_PART, "[Content_Types].xml"];
        let name = part.name.membername();
        let clash = reserved.iter().any(|r| r.eq_ignore_ascii_case(name))
            || part.name == PackURI::package().rels_uri()
            || part.name == PackURI::from_member_name(WORKBOOK_PART).rels_uri()
            || self.sheets.iter().any(|s| s.part == part.name || s.part.rels_uri() == part.name)
            || self.preserved.iter().any(|p| p.name == part.name);
        if clash {
            return Err(OoxmlError::InvalidOperation(format!(
                "Part {} is already written by the package",
                part.name
            )));
        }
        self.preserved.push(part);
        Ok(())
    }

    /// Write everything that depends on the worksheets and finish the
    /// package. Calling it again does nothing.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut archive) = self.archive.take() else {
            return Ok(());
        };
        if self.sheets.is_empty() {
            log::warn!("workbook has no worksheets; spreadsheet applications will reject it");
        }

        let workbook_uri = PackURI::from_member_name(WORKBOOK_PART);
        let styles_uri = PackURI::from_member_name(STYLES_PART);
        let strings_uri = PackURI::from_member_name(SHARED_STRINGS_PART);

        let mut content_types = ContentTypes::new();
        content_types.add_default("rels", ct::OPC_RELATIONSHIPS);
        content_types.add_default("xml", ct::XML);

        let mut root_rels = Relationships::new(PackURI::package());
        let mut workbook_rels = Relationships::new(workbook_uri.clone());
        let mut sheet_rels: Vec<Relationships> =
            self.sheets.iter().map(|s| Relationships::new(s.part.clone())).collect();
        for part in &self.preserved {
            for incoming in &part.incoming {
                let rels = match &incoming.source {
                    RelationshipSource::Package => &mut root_rels,
                    RelationshipSource::Workbook => &mut workbook_rels,
                    RelationshipSource::Worksheet(title) => {
                        match self.sheets.iter().position(|s| same_title(&s.title, title)) {
                            Some(i) => &mut sheet_rels[i],
                            None => {
                                log::warn!(
                                    "no worksheet '{}'; {} loses relationship {}",
                                    title,
                                    part.name,
                                    incoming.id
                                );
                                continue;
                            },
                        }
                    },
                };
                add_incoming(rels, incoming, &part.name);
            }
        }
        for rels in sheet_rels.iter().filter(|rels| !rels.is_empty()) {
            archive.write_deflated(rels.source().rels_uri().membername(), rels.to_xml().as_bytes())?;
        }

        let mut workbook = WorkbookPart::new();
        workbook.date1904 = self.date1904;
        workbook.defined_names = self.defined_names.clone();
        for (i, sheet) in self.sheets.iter().enumerate() {
            let r_id = workbook_rels.get_or_add(rt::WORKSHEET, &sheet.part).r_id().to_string();
            workbook.sheets.push(SheetEntry {
                title: sheet.title.clone(),
                sheet_id: i as u32 + 1,
                relationship_id: r_id,
                state: sheet.state,
            });
            content_types.add_override(sheet.part.clone(), ct::SML_WORKSHEET);
        }

        archive.write_deflated(styles_uri.membername(), self.stylesheet.to_xml().as_bytes())?;
        workbook_rels.get_or_add(rt::STYLES, &styles_uri);
        content_types.add_override(styles_uri, ct::SML_STYLES);

        archive.write_deflated(strings_uri.membername(), self.shared_strings.to_xml().as_bytes())?;
        workbook_rels.get_or_add(rt::SHARED_STRINGS, &strings_uri);
        content_types.add_override(strings_uri, ct::SML_SHARED_STRINGS);

        archive.write_deflated(workbook_uri.membername(), workbook.to_xml().as_bytes())?;
        content_types.add_override(workbook_uri.clone(), ct::SML_SHEET_MAIN);

        for part in &self.preserved {
            archive.write_deflated(part.name.membername(), &part.data)?;
            register_content_type(&mut content_types, part);
        }

        archive.write_deflated(
            workbook_uri.rels_uri().membername(),
            workbook_rels.to_xml().as_bytes(),
        )?;
        root_rels.get_or_add(rt::OFFICE_DOCUMENT, &workbook_uri);
        archive.write_deflated(
            PackURI::package().rels_uri().membername(),
            root_rels.to_xml().as_bytes(),
        )?;
        archive.write_deflated("[Content_Types].xml", content_types.to_xml().as_bytes())?;

        let sink = archive.finish()?;
        log::debug!(
            "package closed with {} worksheets and {} preserved parts",
            self.sheets.len(),
            self.preserved.len()
        );
        self.out = Some(seal(sink, &self.options)?);
        Ok(())
    }

    /// Close the package and give back the sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.close()?;
        self.out
            .take()
            .ok_or_else(|| OoxmlError::InvalidOperation("Package output already taken".to_string()))
    }
}

impl<W: Write> Drop for WorkbookWriter<W> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("failed to close workbook package: {}", e);
        }
    }
}

fn closed() -> OoxmlError {
    OoxmlError::InvalidOperation("Workbook package already closed".to_string())
}

/// Re-create a preserved relationship, keeping its id when it is free.
fn add_incoming(rels: &mut Relationships, incoming: &IncomingRelationship, target: &PackURI) {
    let target_ref = target.relative_ref(rels.source().base_uri());
    let id = if rels.contains(&incoming.id) {
        let fresh = rels.next_r_id();
        log::debug!("relationship id {} to {} renumbered to {}", incoming.id, target, fresh);
        fresh
    } else {
        incoming.id.clone()
    };
    rels.add_relationship(&incoming.reltype, &target_ref, &id, TargetMode::Internal);
}

/// Declare a preserved part's content type, as an extension default when
/// the extension is not claimed yet and as an override otherwise.
fn register_content_type(content_types: &mut ContentTypes, part: &PreservedPart) {
    if content_types.get(&part.name) == Some(part.content_type.as_str()) {
        return;
    }
    let ext = part.name.ext();
    if !ext.is_empty() && !content_types.has_default(ext) {
        content_types.add_default(ext, &part.content_type);
    } else {
        content_types.add_override(part.name.clone(), &part.content_type);
    }
}

fn seal<W: Write>(sink: PackageSink<W>, options: &SaveOptions) -> Result<W> {
    match sink {
        PackageSink::Direct(mut out) => {
            out.flush()?;
            Ok(out)
        },
        PackageSink::Buffered { zip, mut out } => {
            let sealed = encrypt_package(&zip, options)?;
            out.write_all(&sealed)?;
            out.flush()?;
            Ok(out)
        },
    }
}

#[cfg(feature = "ooxml_encryption")]
fn encrypt_package(zip: &[u8], options: &SaveOptions) -> Result<Vec<u8>> {
    log::debug!("encrypting {} package bytes ({:?})", zip.len(), options.encryption);
    let password = options.password.as_deref().unwrap_or_default();
    crypto::encrypt_with(zip, password, options.encryption, options.spin_count)
}

#[cfg(not(feature = "ooxml_encryption"))]
fn encrypt_package(_zip: &[u8], _options: &SaveOptions) -> Result<Vec<u8>> {
    Err(OoxmlError::UnsupportedEncryption(
        "saving with a password needs the ooxml_encryption feature".to_string(),
    ))
}
