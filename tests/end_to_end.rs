use std::io::{Cursor, Read, Write};

use loquat::ooxml::opc::PackURI;
use loquat::ooxml::xlsx::styles::{Border, BorderStyle, Color, Fill, Font};
use loquat::ooxml::xlsx::{
    Cell, CellData, CellReference, CellStyle, CellType, CellValue, FormatDelta, LoadOptions,
    SaveOptions, Stylesheet, Workbook, WorkbookReader, WorkbookWriter,
};
use loquat::OoxmlError;

fn a1(text: &str) -> CellReference {
    text.parse().unwrap()
}

/// The formatting a cell actually refers to, independent of table positions.
fn resolved(cell: &Cell, styles: &Stylesheet) -> (Font, Fill, Border, String) {
    let format = styles.format(cell.style.unwrap_or(0)).unwrap();
    (
        styles.get::<Font>(format.font.unwrap_or(0)).unwrap().clone(),
        styles.get::<Fill>(format.fill.unwrap_or(0)).unwrap().clone(),
        styles.get::<Border>(format.border.unwrap_or(0)).unwrap().clone(),
        styles.number_format(format.number_format.unwrap_or(0)).unwrap().code,
    )
}

#[test]
fn two_sheet_workbook_round_trips() {
    let mut writer = WorkbookWriter::new(Vec::new(), SaveOptions::default()).unwrap();
    {
        let mut sheet = writer.add_worksheet("Sheet1").unwrap();
        sheet.add_cell(a1("A1"), "Hello").unwrap();
        sheet.add_cell(a1("B1"), 42.0).unwrap();
        sheet.close().unwrap();
    }
    {
        let mut sheet = writer.add_worksheet("Sheet2").unwrap();
        sheet.add_cell(a1("A1"), 3.14159265358979).unwrap();
        sheet.close().unwrap();
    }
    let bytes = writer.into_inner().unwrap();

    let mut reader = WorkbookReader::open(Cursor::new(bytes), LoadOptions::default()).unwrap();
    assert_eq!(reader.sheet_titles().count(), 2);
    assert_eq!(reader.shared_strings().len(), 1);

    let mut first = reader.begin_worksheet("Sheet1").unwrap();
    let hello = first.read_cell().unwrap();
    assert_eq!(hello.reference, a1("A1"));
    assert_eq!(hello.cell_type, CellType::SharedString);
    assert_eq!(hello.shared_string, Some(0));
    assert_eq!(hello.value, CellValue::String("Hello".to_string()));
    let answer = first.read_cell().unwrap();
    assert_eq!(answer.reference, a1("B1"));
    assert_eq!(answer.value, CellValue::Number(42.0));
    assert!(!first.has_cell().unwrap());
    first.end_worksheet().unwrap();

    let mut second = reader.begin_worksheet("Sheet2").unwrap();
    assert_eq!(second.read_cell().unwrap().value, CellValue::Number(3.14159265358979));
    assert!(!second.has_cell().unwrap());
}

#[test]
fn styled_workbook_round_trips_through_the_model() {
    let mut book = Workbook::new();
    let bold = FormatDelta::new().with_font(Font::named("Arial", 12.0).with_bold(true));
    let money = FormatDelta::new()
        .with_number_format("#,##0.00")
        .with_fill(Fill::solid(Color::Rgb("FFFFFF00".to_string())))
        .with_border(Border {
            bottom: Some(BorderStyle::new("thin", None)),
            ..Border::default()
        });
    let bold_index = book.stylesheet.find_or_create_format(None, &bold).unwrap();
    let money_index = book.stylesheet.find_or_create_format(None, &money).unwrap();
    // Asking again hands back the same records.
    assert_eq!(book.stylesheet.find_or_create_format(None, &bold).unwrap(), bold_index);

    {
        let sheet = book.add_sheet("Ledger").unwrap();
        sheet.set_value(a1("A1"), "Item");
        sheet.cells[0].style = Some(bold_index);
        sheet.set_value(a1("A2"), 1234.5);
        sheet.cells[1].style = Some(money_index);
        sheet.set_value(a1("B2"), 2469.0);
        sheet.cells[2].formula = Some("A2*2".to_string());
    }

    let bytes = book.save(SaveOptions::default()).unwrap();
    let loaded = Workbook::load(&bytes, LoadOptions::default()).unwrap();

    let before = book.sheet("Ledger").unwrap();
    let after = loaded.sheet("Ledger").unwrap();
    assert_eq!(after.cells.len(), before.cells.len());
    for (old, new) in before.cells.iter().zip(&after.cells) {
        assert_eq!(new.reference, old.reference);
        assert_eq!(new.value, old.value);
        assert_eq!(new.formula, old.formula);
        assert_eq!(resolved(new, &loaded.stylesheet), resolved(old, &book.stylesheet));
    }
    let (font, _, _, _) = resolved(&after.cells[0], &loaded.stylesheet);
    assert!(font.bold);
    let (_, fill, border, code) = resolved(&after.cells[1], &loaded.stylesheet);
    assert!(fill.is_solid());
    assert_eq!(border.bottom.unwrap().style, "thin");
    assert_eq!(code, "#,##0.00");
}

#[test]
fn out_of_order_cell_leaves_the_sheet_intact() {
    let mut writer = WorkbookWriter::new(Vec::new(), SaveOptions::default()).unwrap();
    {
        let mut sheet = writer.add_worksheet("Orders").unwrap();
        sheet.add_cell(a1("B2"), 1.0).unwrap();
        let err = sheet.add_cell(a1("A2"), 2.0).unwrap_err();
        assert!(matches!(err, OoxmlError::OutOfOrderCell { .. }));
        let err = sheet.add_cell(a1("B2"), 3.0).unwrap_err();
        assert!(matches!(err, OoxmlError::OutOfOrderCell { .. }));
        sheet.add_cell(a1("C2"), 4.0).unwrap();
        sheet.add_cell_with(a1("A3"), CellData::new("tail")).unwrap();
    }
    let bytes = writer.into_inner().unwrap();

    let book = Workbook::load(&bytes, LoadOptions::default()).unwrap();
    let values: Vec<_> = book.sheets[0].cells.iter().map(|c| c.value.clone()).collect();
    assert_eq!(
        values,
        [
            CellValue::Number(1.0),
            CellValue::Number(4.0),
            CellValue::String("tail".to_string()),
        ]
    );
}

#[test]
fn invalid_style_index_is_reported() {
    let mut writer = WorkbookWriter::new(Vec::new(), SaveOptions::default()).unwrap();
    let mut sheet = writer.add_worksheet("Styles").unwrap();
    let err = sheet
        .add_cell_with(a1("A1"), CellData::new(1.0).with_style(CellStyle::Index(99)))
        .unwrap_err();
    assert!(matches!(err, OoxmlError::InvalidStyleIndex { index: 99, .. }), "{err:?}");
}

#[test]
fn save_and_load_through_the_file_system() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.xlsx");

    let mut book = Workbook::new();
    book.add_sheet("Report").unwrap().set_value(a1("C3"), "on disk");
    book.save_to_path(&path, SaveOptions::default()).unwrap();

    let loaded = Workbook::load_from_path(&path, LoadOptions::default()).unwrap();
    assert_eq!(loaded.sheets[0].cell(a1("C3")).unwrap().value.as_str(), Some("on disk"));
}

#[test]
fn written_packages_open_with_an_independent_zip_reader() {
    let mut book = Workbook::new();
    book.add_sheet("Interop").unwrap().set_value(a1("A1"), 7.5);
    let bytes = book.save(SaveOptions::default()).unwrap();

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(
        names,
        [
            "[Content_Types].xml",
            "_rels/.rels",
            "xl/_rels/workbook.xml.rels",
            "xl/sharedStrings.xml",
            "xl/styles.xml",
            "xl/workbook.xml",
            "xl/worksheets/sheet1.xml",
        ]
    );
    let mut sheet = String::new();
    archive
        .by_name("xl/worksheets/sheet1.xml")
        .unwrap()
        .read_to_string(&mut sheet)
        .unwrap();
    assert!(sheet.contains(r#"<c r="A1"><v>7.5</v></c>"#), "{sheet}");
}

/// A minimal package written by another ZIP implementation, with an
/// override that beats the `xml` extension default.
fn foreign_package() -> Vec<u8> {
    use zip::write::SimpleFileOptions;

    let parts = [
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#,
        ),
        (
            "_rels/.rels",
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="/xl/workbook.xml"/></Relationships>"#,
        ),
        (
            "xl/workbook.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Foreign" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#,
        ),
        (
            "xl/worksheets/sheet1.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="2"><c r="B2" t="inlineStr"><is><t>inline</t></is></c></row></sheetData></worksheet>"#,
        ),
    ];

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, xml) in parts {
        writer.start_file(name, options).unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[test]
fn reads_packages_from_an_independent_zip_writer() {
    let bytes = foreign_package();
    let mut reader = WorkbookReader::open(Cursor::new(bytes), LoadOptions::default()).unwrap();

    let manifest = reader.manifest();
    let worksheet = PackURI::new("/xl/worksheets/sheet1.xml").unwrap();
    let other = PackURI::new("/xl/elsewhere.xml").unwrap();
    assert_eq!(
        manifest.content_type_of(&worksheet).unwrap(),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"
    );
    assert_eq!(manifest.content_type_of(&other).unwrap(), "application/xml");

    let mut sheet = reader.begin_worksheet("Foreign").unwrap();
    let cell = sheet.read_cell().unwrap();
    assert_eq!(cell.reference, a1("B2"));
    assert_eq!(cell.value, CellValue::InlineString("inline".to_string()));
}
