#![cfg(feature = "ooxml_encryption")]

use std::io::Cursor;

use loquat::ooxml::crypto::{self, EncryptionScheme};
use loquat::ooxml::xlsx::{
    CellReference, CellValue, LoadOptions, SaveOptions, Workbook, WorkbookReader,
};
use loquat::OoxmlError;

/// Keeps key derivation fast; the format does not care.
const SPIN_COUNT: u32 = 1_000;

fn a1(text: &str) -> CellReference {
    text.parse().unwrap()
}

fn sample() -> Workbook {
    let mut book = Workbook::new();
    let sheet = book.add_sheet("Vault").unwrap();
    sheet.set_value(a1("A1"), "secret");
    sheet.set_value(a1("B1"), 1.5);
    book
}

fn sealed(scheme: EncryptionScheme, password: &str) -> Vec<u8> {
    let options = SaveOptions::new()
        .with_password(password)
        .with_encryption(scheme)
        .with_spin_count(SPIN_COUNT);
    sample().save(options).unwrap()
}

#[test]
fn agile_round_trip() {
    let bytes = sealed(EncryptionScheme::Agile, "correct horse");
    assert!(crypto::detect(&bytes));
    assert!(!bytes.starts_with(b"PK"));

    let book = Workbook::load(
        &bytes,
        LoadOptions::new()
            .with_password("correct horse")
            .with_verify_integrity(true),
    )
    .unwrap();
    let sheet = book.sheet("Vault").unwrap();
    assert_eq!(sheet.cell(a1("A1")).unwrap().value.as_str(), Some("secret"));
    assert_eq!(sheet.cell(a1("B1")).unwrap().value, CellValue::Number(1.5));
}

#[test]
fn standard_round_trip() {
    let bytes = sealed(EncryptionScheme::Standard, "pass");
    let mut reader =
        WorkbookReader::open(Cursor::new(bytes), LoadOptions::new().with_password("pass")).unwrap();
    let mut sheet = reader.begin_worksheet("Vault").unwrap();
    assert_eq!(sheet.read_cell().unwrap().value.as_str(), Some("secret"));
}

#[test]
fn wrong_password_is_rejected_before_any_content() {
    for scheme in [EncryptionScheme::Agile, EncryptionScheme::Standard] {
        let bytes = sealed(scheme, "right");
        let err = WorkbookReader::open(Cursor::new(bytes.clone()), LoadOptions::new().with_password("wrong"))
            .err()
            .unwrap();
        assert!(matches!(err, OoxmlError::InvalidPassword), "{scheme:?}: {err:?}");

        // No password means the empty one, which is wrong here too.
        let err = Workbook::load(&bytes, LoadOptions::default()).err().unwrap();
        assert!(matches!(err, OoxmlError::InvalidPassword), "{scheme:?}: {err:?}");
    }
}

#[test]
fn empty_password_opens_without_asking() {
    let bytes = sealed(EncryptionScheme::Agile, "");
    let book = Workbook::load(&bytes, LoadOptions::default()).unwrap();
    assert_eq!(book.sheets.len(), 1);
}

#[test]
fn decrypted_bytes_are_a_plain_package() {
    let bytes = sealed(EncryptionScheme::Agile, "pw");
    let plain = crypto::decrypt_to_vec(&bytes, "pw", true).unwrap();
    assert!(plain.starts_with(b"PK\x03\x04"));

    let mut archive = zip::ZipArchive::new(Cursor::new(plain.as_slice())).unwrap();
    assert!(archive.by_name("xl/workbook.xml").is_ok());
    let book = Workbook::load(&plain, LoadOptions::default()).unwrap();
    assert_eq!(book.sheets[0].title, "Vault");
}
