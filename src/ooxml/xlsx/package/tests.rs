use std::io::Cursor;

use kumquat_zip::ArchiveWriter;

use super::*;
use crate::ooxml::error::OoxmlError;
use crate::ooxml::opc::constants::relationship_type as rt;
use crate::ooxml::opc::PackURI;
use crate::ooxml::xlsx::cell::{CellReference, CellValue};
use crate::ooxml::xlsx::workbook::SheetState;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/><Override PartName="/xl/calcChain.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.calcChain+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/></Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Data" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme" Target="theme/theme1.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain" Target="calcChain.xml"/><Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#;

const THEME_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/image1.png"/></Relationships>"#;

const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"><v>2.5</v></c></row></sheetData></worksheet>"#;

const SHARED_STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="1" uniqueCount="1"><si><t>hello</t></si></sst>"#;

const THEME: &str = r#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme"/>"#;

const CORE: &str = r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties"/>"#;

fn standard_parts() -> Vec<(&'static str, &'static [u8])> {
    vec![
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", ROOT_RELS.as_bytes()),
        ("xl/workbook.xml", WORKBOOK.as_bytes()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.as_bytes()),
        ("xl/worksheets/sheet1.xml", SHEET.as_bytes()),
        ("xl/sharedStrings.xml", SHARED_STRINGS.as_bytes()),
        ("xl/calcChain.xml", &b"<calcChain/>"[..]),
        ("xl/theme/theme1.xml", THEME.as_bytes()),
        ("xl/theme/_rels/theme1.xml.rels", THEME_RELS.as_bytes()),
        ("xl/media/image1.png", &b"\x89PNG\r\n\x1a\nnot really"[..]),
        ("docProps/core.xml", CORE.as_bytes()),
        ("docProps/orphan.xml", &b"<orphan/>"[..]),
    ]
}

/// Store every part uncompressed, so tests can find and patch their bytes.
fn build_package(parts: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ArchiveWriter::new(Vec::new());
    for (name, data) in parts {
        writer.write_stored(name, data).unwrap();
    }
    writer.finish().unwrap()
}

fn without(name: &str) -> Vec<u8> {
    let parts: Vec<_> = standard_parts().into_iter().filter(|(n, _)| *n != name).collect();
    build_package(&parts)
}

fn open(bytes: &[u8], options: LoadOptions) -> crate::ooxml::error::Result<WorkbookReader<Cursor<&[u8]>>> {
    WorkbookReader::open(Cursor::new(bytes), options)
}

fn a1(text: &str) -> CellReference {
    text.parse().unwrap()
}

fn preserved_names(parts: &[PreservedPart]) -> Vec<String> {
    let mut names: Vec<String> = parts.iter().map(|p| p.name.to_string()).collect();
    names.sort();
    names
}

#[test]
fn test_open_handcrafted_package() {
    let bytes = build_package(&standard_parts());
    let mut reader = open(&bytes, LoadOptions::default()).unwrap();

    assert_eq!(reader.sheet_titles().collect::<Vec<_>>(), ["Data"]);
    assert!(reader.has_worksheet("DATA"));
    assert!(!reader.has_worksheet("Other"));
    assert_eq!(reader.workbook_part().as_str(), "/xl/workbook.xml");
    // No styles part: the default stylesheet stands in.
    assert_eq!(reader.stylesheet().format_count(), 1);
    assert_eq!(reader.shared_strings().get(0), Some("hello"));

    let mut sheet = reader.begin_worksheet("Data").unwrap();
    let first = sheet.read_cell().unwrap();
    assert_eq!(first.reference, a1("A1"));
    assert_eq!(first.value, CellValue::String("hello".to_string()));
    let second = sheet.read_cell().unwrap();
    assert_eq!(second.value, CellValue::Number(2.5));
    assert!(!sheet.has_cell().unwrap());
}

#[test]
fn test_unknown_parts_are_preserved() {
    let bytes = build_package(&standard_parts());
    let reader = open(&bytes, LoadOptions::default()).unwrap();
    let parts = reader.preserved_parts();

    // calcChain is regenerated by the application; the orphan is unreachable.
    assert_eq!(
        preserved_names(parts),
        [
            "/docProps/core.xml",
            "/xl/media/image1.png",
            "/xl/theme/_rels/theme1.xml.rels",
            "/xl/theme/theme1.xml",
        ]
    );

    let theme = parts.iter().find(|p| p.name.as_str() == "/xl/theme/theme1.xml").unwrap();
    assert_eq!(theme.data, THEME.as_bytes());
    assert_eq!(
        theme.incoming,
        [IncomingRelationship {
            source: RelationshipSource::Workbook,
            id: "rId2".to_string(),
            reltype: rt::THEME.to_string(),
        }]
    );
    let core = parts.iter().find(|p| p.name.as_str() == "/docProps/core.xml").unwrap();
    assert_eq!(core.incoming[0].source, RelationshipSource::Package);
    let image = parts.iter().find(|p| p.name.as_str() == "/xl/media/image1.png").unwrap();
    assert_eq!(image.content_type, "image/png");
    assert!(image.incoming.is_empty());
}

#[test]
fn test_preservation_can_be_disabled() {
    let bytes = build_package(&standard_parts());
    let reader = open(&bytes, LoadOptions::new().with_preserve_unknown_parts(false)).unwrap();
    assert!(reader.preserved_parts().is_empty());
}

#[test]
fn test_preserved_parts_survive_a_save() {
    let bytes = build_package(&standard_parts());
    let book = Workbook::load(&bytes, LoadOptions::default()).unwrap();
    let saved = book.save(SaveOptions::default()).unwrap();

    let reader = open(&saved, LoadOptions::default()).unwrap();
    assert_eq!(preserved_names(reader.preserved_parts()), preserved_names(&book.preserved));

    let manifest = reader.manifest();
    let theme = manifest.relationship(reader.workbook_part(), "rId2").unwrap();
    assert_eq!(theme.reltype(), rt::THEME);
    assert_eq!(theme.target_ref(), "theme/theme1.xml");
    let core = manifest.relationship(&PackURI::package(), "rId2").unwrap();
    assert_eq!(core.reltype(), rt::CORE_PROPERTIES);
    let office = manifest.relationship(&PackURI::package(), "rId1").unwrap();
    assert_eq!(office.reltype(), rt::OFFICE_DOCUMENT);
    assert!(manifest.content_types().has_default("png"));
    assert!(
        manifest
            .relationships(reader.workbook_part())
            .unwrap()
            .by_type(rt::CALC_CHAIN)
            .next()
            .is_none()
    );
}

#[test]
fn test_missing_required_parts() {
    let err = open(&without("[Content_Types].xml"), LoadOptions::default()).err().unwrap();
    assert!(matches!(err, OoxmlError::InvalidPackage(_)), "{err:?}");

    let err = open(&without("_rels/.rels"), LoadOptions::default()).err().unwrap();
    assert!(matches!(err, OoxmlError::InvalidPackage(_)), "{err:?}");

    let err = open(&without("xl/workbook.xml"), LoadOptions::default()).err().unwrap();
    assert!(matches!(err, OoxmlError::InvalidPackage(_)), "{err:?}");

    let err = open(b"definitely not a zip archive", LoadOptions::default()).err().unwrap();
    assert!(err.is_format_error(), "{err:?}");
}

#[test]
fn test_missing_shared_strings_is_empty() {
    let mut parts = standard_parts();
    parts.retain(|(n, _)| *n != "xl/sharedStrings.xml");
    let bytes = build_package(&parts);
    let mut reader = open(&bytes, LoadOptions::default()).unwrap();
    assert!(reader.shared_strings().is_empty());

    // The sheet still refers to string 0, which no longer exists.
    let mut sheet = reader.begin_worksheet("Data").unwrap();
    assert!(matches!(sheet.read_cell(), Err(OoxmlError::InvalidFormat(_))));
}

#[test]
fn test_not_a_workbook() {
    let content_types = CONTENT_TYPES.replace("spreadsheetml.sheet.main+xml", "wordprocessingml.document.main+xml");
    let mut parts: Vec<(&str, &[u8])> = standard_parts();
    parts[0].1 = content_types.as_bytes();
    let bytes = build_package(&parts);
    let err = open(&bytes, LoadOptions::default()).err().unwrap();
    assert!(matches!(err, OoxmlError::InvalidPackage(_)), "{err:?}");
}

#[test]
fn test_unknown_worksheet_title() {
    let bytes = build_package(&standard_parts());
    let mut reader = open(&bytes, LoadOptions::default()).unwrap();
    assert!(matches!(reader.begin_worksheet("Nope"), Err(OoxmlError::EntryNotFound(_))));
}

#[test]
fn test_checksum_mismatch_is_lenient_by_default() {
    let mut bytes = build_package(&standard_parts());
    let needle = b"<t>hello</t>";
    let pos = bytes.windows(needle.len()).position(|w| w == needle).unwrap();
    bytes[pos + 7] = b'p';

    let err = open(&bytes, LoadOptions::new().with_verify_checksums(true)).err().unwrap();
    assert!(matches!(err, OoxmlError::ChecksumMismatch { .. }), "{err:?}");

    let reader = open(&bytes, LoadOptions::default()).unwrap();
    assert_eq!(reader.shared_strings().get(0), Some("hellp"));
}

fn drain_worksheet<R: std::io::Read + std::io::Seek>(
    reader: &mut WorkbookReader<R>,
    title: &str,
) -> crate::ooxml::error::Result<Vec<CellValue>> {
    let mut sheet = reader.begin_worksheet(title)?;
    let mut values = Vec::new();
    while sheet.has_cell()? {
        values.push(sheet.read_cell()?.value);
    }
    sheet.end_worksheet()?;
    Ok(values)
}

#[test]
fn test_worksheet_checksum_mismatch_keeps_its_kind() {
    let mut bytes = build_package(&standard_parts());
    let needle = b"<v>2.5</v>";
    let pos = bytes.windows(needle.len()).position(|w| w == needle).unwrap();
    bytes[pos + 5] = b'6';

    // The worksheet is only read when streamed, so opening succeeds.
    let mut reader = open(&bytes, LoadOptions::new().with_verify_checksums(true)).unwrap();
    let err = drain_worksheet(&mut reader, "Data").err().unwrap();
    assert!(matches!(err, OoxmlError::ChecksumMismatch { .. }), "{err:?}");

    let mut reader = open(&bytes, LoadOptions::default()).unwrap();
    let values = drain_worksheet(&mut reader, "Data").unwrap();
    assert_eq!(values[1], CellValue::Number(2.6));
}

#[test]
fn test_writer_rejects_bad_titles() {
    let mut writer = WorkbookWriter::new(Vec::new(), SaveOptions::default()).unwrap();
    writer.add_worksheet("Sales").unwrap().close().unwrap();
    assert!(matches!(writer.add_worksheet("SALES"), Err(OoxmlError::InvalidOperation(_))));
    assert!(matches!(writer.add_worksheet("a/b"), Err(OoxmlError::InvalidOperation(_))));
    assert!(matches!(writer.add_worksheet(""), Err(OoxmlError::InvalidOperation(_))));
    assert!(writer.add_worksheet("Sales 2").is_ok());
}

#[test]
fn test_writer_close_is_idempotent() {
    let mut writer = WorkbookWriter::new(Vec::new(), SaveOptions::default()).unwrap();
    writer.add_worksheet("One").unwrap().add_cell(a1("A1"), 1.0).unwrap();
    writer.close().unwrap();
    writer.close().unwrap();
    assert!(matches!(writer.add_worksheet("Two"), Err(OoxmlError::InvalidOperation(_))));

    let bytes = writer.into_inner().unwrap();
    let mut reader = open(&bytes, LoadOptions::default()).unwrap();
    let mut sheet = reader.begin_worksheet("One").unwrap();
    assert_eq!(sheet.read_cell().unwrap().value, CellValue::Number(1.0));
}

#[test]
fn test_sheets_written_in_order_with_first_tab_selected() {
    let mut writer = WorkbookWriter::new(Vec::new(), SaveOptions::default()).unwrap();
    for title in ["First", "Second", "Third"] {
        let mut sheet = writer.add_worksheet(title).unwrap();
        sheet.add_cell(a1("A1"), title).unwrap();
        sheet.close().unwrap();
    }
    let bytes = writer.into_inner().unwrap();

    let mut reader = open(&bytes, LoadOptions::default()).unwrap();
    assert_eq!(reader.sheet_titles().collect::<Vec<_>>(), ["First", "Second", "Third"]);
    assert_eq!(reader.shared_strings().len(), 3);
    for (i, title) in ["First", "Second", "Third"].into_iter().enumerate() {
        let mut sheet = reader.begin_worksheet(title).unwrap();
        assert_eq!(sheet.read_cell().unwrap().value.as_str(), Some(title));
        assert_eq!(sheet.end_worksheet().unwrap().tab_selected, i == 0);
    }
}

#[test]
fn test_preserve_rejects_generated_names() {
    let mut writer = WorkbookWriter::new(Vec::new(), SaveOptions::default()).unwrap();
    let styles = PreservedPart::new(PackURI::new("/xl/styles.xml").unwrap(), "application/xml", Vec::new());
    assert!(matches!(writer.preserve(styles), Err(OoxmlError::InvalidOperation(_))));

    let custom = PreservedPart::new(
        PackURI::new("/xl/worksheets/sheet1.xml").unwrap(),
        "application/xml",
        b"<custom/>".to_vec(),
    );
    writer.preserve(custom).unwrap();
    // The worksheet moves out of the way of the preserved part.
    writer.add_worksheet("Only").unwrap().close().unwrap();
    let bytes = writer.into_inner().unwrap();

    let reader = open(&bytes, LoadOptions::default()).unwrap();
    let rel = reader
        .manifest()
        .relationship_by_type(reader.workbook_part(), rt::WORKSHEET)
        .unwrap();
    assert_eq!(rel.target_ref(), "worksheets/sheet2.xml");
}

#[test]
fn test_workbook_model_round_trip() {
    let mut book = Workbook::new();
    {
        let sheet = book.add_sheet("Visible").unwrap();
        // Out of order on purpose; the model sorts before writing.
        sheet.set_value(a1("B2"), 4.0);
        sheet.set_value(a1("A1"), "label");
        sheet.set_value(a1("A2"), true);
    }
    book.add_sheet("Secret").unwrap().state = SheetState::Hidden;
    assert!(book.add_sheet("visible").is_err());

    let bytes = book.save(SaveOptions::default()).unwrap();
    let loaded = Workbook::load(&bytes, LoadOptions::default()).unwrap();

    assert_eq!(loaded.sheets.len(), 2);
    let visible = loaded.sheet("visible").unwrap();
    let refs: Vec<String> = visible.cells.iter().map(|c| c.reference.to_string()).collect();
    assert_eq!(refs, ["A1", "A2", "B2"]);
    assert_eq!(visible.cell(a1("A2")).unwrap().value, CellValue::Bool(true));
    assert_eq!(loaded.sheet("Secret").unwrap().state, SheetState::Hidden);
}

#[test]
fn test_duplicate_cells_are_rejected_on_save() {
    let mut book = Workbook::new();
    let sheet = book.add_sheet("Dup").unwrap();
    sheet.set_value(a1("A1"), 1.0);
    sheet.cells.push(sheet.cells[0].clone());
    assert!(matches!(
        book.save(SaveOptions::default()),
        Err(OoxmlError::OutOfOrderCell { .. })
    ));
}

const DRAWING_CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Default Extension="vml" ContentType="application/vnd.openxmlformats-officedocument.vmlDrawing"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/><Override PartName="/xl/drawings/drawing1.xml" ContentType="application/vnd.openxmlformats-officedocument.drawing+xml"/><Override PartName="/xl/comments1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.comments+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/></Types>"#;

const DRAWING_SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"><v>2.5</v></c></row></sheetData><mergeCells count="1"><mergeCell ref="A2:B3"/></mergeCells><hyperlinks><hyperlink ref="A1" r:id="rId4"/></hyperlinks><drawing r:id="rId1"/><legacyDrawing r:id="rId3"/></worksheet>"#;

const DRAWING_SHEET_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing" Target="../drawings/drawing1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments" Target="../comments1.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/vmlDrawing" Target="../drawings/vmlDrawing1.vml"/><Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/" TargetMode="External"/></Relationships>"#;

const DRAWING: &str = r#"<xdr:wsDr xmlns:xdr="http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing"/>"#;

const DRAWING_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/image1.png"/></Relationships>"#;

fn drawing_parts() -> Vec<(&'static str, &'static [u8])> {
    let mut parts: Vec<_> = standard_parts()
        .into_iter()
        .filter(|(n, _)| *n != "xl/worksheets/sheet1.xml")
        .collect();
    parts[0].1 = DRAWING_CONTENT_TYPES.as_bytes();
    parts.extend([
        ("xl/worksheets/sheet1.xml", DRAWING_SHEET.as_bytes()),
        ("xl/worksheets/_rels/sheet1.xml.rels", DRAWING_SHEET_RELS.as_bytes()),
        ("xl/drawings/drawing1.xml", DRAWING.as_bytes()),
        ("xl/drawings/_rels/drawing1.xml.rels", DRAWING_RELS.as_bytes()),
        ("xl/comments1.xml", &b"<comments/>"[..]),
        ("xl/drawings/vmlDrawing1.vml", &b"<xml/>"[..]),
    ]);
    parts
}

#[test]
fn test_worksheet_linked_parts_are_preserved() {
    let bytes = build_package(&drawing_parts());
    let reader = open(&bytes, LoadOptions::default()).unwrap();
    let parts = reader.preserved_parts();
    let names = preserved_names(parts);
    for name in [
        "/xl/comments1.xml",
        "/xl/drawings/_rels/drawing1.xml.rels",
        "/xl/drawings/drawing1.xml",
        "/xl/drawings/vmlDrawing1.vml",
        "/xl/media/image1.png",
    ] {
        assert!(names.iter().any(|n| n == name), "{name} missing from {names:?}");
    }
    // The sheet's own relationships are regenerated, never copied.
    assert!(!names.iter().any(|n| n == "/xl/worksheets/_rels/sheet1.xml.rels"));

    let drawing = parts.iter().find(|p| p.name.as_str() == "/xl/drawings/drawing1.xml").unwrap();
    assert_eq!(
        drawing.incoming,
        [IncomingRelationship {
            source: RelationshipSource::Worksheet("Data".to_string()),
            id: "rId1".to_string(),
            reltype: rt::DRAWING.to_string(),
        }]
    );
}

#[test]
fn test_worksheet_linked_parts_survive_a_save() {
    let bytes = build_package(&drawing_parts());
    let book = Workbook::load(&bytes, LoadOptions::default()).unwrap();
    let metadata = &book.sheet("Data").unwrap().metadata;
    assert_eq!(metadata.references.drawing.as_deref(), Some("rId1"));
    assert_eq!(metadata.references.legacy_drawing.as_deref(), Some("rId3"));

    let saved = book.save(SaveOptions::default()).unwrap();
    let mut reader = open(&saved, LoadOptions::default()).unwrap();
    let sheet_part = reader
        .manifest()
        .relationship_by_type(reader.workbook_part(), rt::WORKSHEET)
        .unwrap()
        .target_partname()
        .unwrap();

    let rels = reader.manifest().relationships(&sheet_part).unwrap();
    let drawing = rels.get("rId1").unwrap();
    assert_eq!(drawing.reltype(), rt::DRAWING);
    assert_eq!(drawing.target_ref(), "../drawings/drawing1.xml");
    assert_eq!(rels.get("rId2").unwrap().target_ref(), "../comments1.xml");
    assert_eq!(rels.get("rId3").unwrap().target_ref(), "../drawings/vmlDrawing1.vml");
    // External hyperlinks are not carried.
    assert!(rels.get("rId4").is_none());
    assert_eq!(
        preserved_names(reader.preserved_parts()),
        preserved_names(&book.preserved)
    );

    let mut sheet = reader.begin_worksheet("Data").unwrap();
    while sheet.has_cell().unwrap() {
        sheet.read_cell().unwrap();
    }
    let metadata = sheet.end_worksheet().unwrap();
    assert_eq!(metadata.references.drawing.as_deref(), Some("rId1"));
    assert_eq!(metadata.references.legacy_drawing.as_deref(), Some("rId3"));
    let merges: Vec<String> = metadata.merged_cells.iter().map(|r| r.to_string()).collect();
    assert_eq!(merges, ["A2:B3"]);
}

#[test]
fn test_references_without_preserved_targets_are_dropped() {
    let bytes = build_package(&drawing_parts());
    let book = Workbook::load(&bytes, LoadOptions::new().with_preserve_unknown_parts(false)).unwrap();
    assert!(book.preserved.is_empty());
    assert!(!book.sheet("Data").unwrap().metadata.references.is_empty());

    let saved = book.save(SaveOptions::default()).unwrap();
    let loaded = Workbook::load(&saved, LoadOptions::default()).unwrap();
    let metadata = &loaded.sheet("Data").unwrap().metadata;
    assert!(metadata.references.is_empty());
    assert_eq!(metadata.merged_cells.len(), 1);
}

#[test]
fn test_merged_cells_survive_a_model_round_trip() {
    let mut book = Workbook::new();
    let sheet = book.add_sheet("Merged").unwrap();
    sheet.set_value(a1("A1"), "title");
    sheet.metadata.merged_cells.push("A1:D1".parse().unwrap());
    sheet.metadata.merged_cells.push("B3:C4".parse().unwrap());

    let bytes = book.save(SaveOptions::default()).unwrap();
    let loaded = Workbook::load(&bytes, LoadOptions::default()).unwrap();
    let merged = &loaded.sheet("Merged").unwrap().metadata.merged_cells;
    assert_eq!(merged, &book.sheets[0].metadata.merged_cells);

    // Overlapping merges cannot be written.
    book.sheets[0].metadata.merged_cells.push("C1:C2".parse().unwrap());
    assert!(matches!(
        book.save(SaveOptions::default()),
        Err(OoxmlError::InvalidOperation(_))
    ));
}
