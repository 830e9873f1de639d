//! The workbook part (`xl/workbook.xml`): sheet list, defined names and the
//! active tab.

use std::fmt::Write as _;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::constants::namespace;
use crate::ooxml::xml::{attr_u32, attr_value, escape_xml, parse_bool, push_general_ref, text_of};

/// Longest sheet title Excel accepts.
pub const MAX_TITLE_LEN: usize = 31;

const FORBIDDEN_TITLE_CHARS: &[char] = &['*', ':', '/', '\\', '?', '[', ']'];

/// Visibility of a sheet in the tab bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SheetState {
    #[default]
    Visible,
    Hidden,
    /// Only reachable through VBA
    VeryHidden,
}

impl SheetState {
    fn from_attr(value: &str) -> Self {
        match value {
            "hidden" => SheetState::Hidden,
            "veryHidden" => SheetState::VeryHidden,
            _ => SheetState::Visible,
        }
    }

    fn as_attr(self) -> Option<&'static str> {
        match self {
            SheetState::Visible => None,
            SheetState::Hidden => Some("hidden"),
            SheetState::VeryHidden => Some("veryHidden"),
        }
    }
}

/// One `<sheet>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    pub title: String,
    pub sheet_id: u32,
    /// Id of the workbook relationship that targets the worksheet part
    pub relationship_id: String,
    pub state: SheetState,
}

/// A `<definedName>`: a named formula, optionally scoped to one sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinedName {
    pub name: String,
    /// Position of the sheet in the sheet list when sheet-scoped
    pub local_sheet_id: Option<u32>,
    pub hidden: bool,
    pub formula: String,
}

/// Parsed `xl/workbook.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkbookPart {
    pub sheets: Vec<SheetEntry>,
    pub defined_names: Vec<DefinedName>,
    pub active_tab: u32,
    /// Serial dates count from 1904 instead of 1900
    pub date1904: bool,
}

/// Check a sheet title against the rules Excel enforces.
///
/// ```
/// use loquat::ooxml::xlsx::workbook::validate_title;
/// assert!(validate_title("Q1 Sales").is_ok());
/// assert!(validate_title("Q1/Q2").is_err());
/// assert!(validate_title("").is_err());
/// ```
pub fn validate_title(title: &str) -> Result<()> {
    if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
        return Err(OoxmlError::InvalidOperation(format!(
            "Sheet title must be 1 to {} characters: {:?}",
            MAX_TITLE_LEN, title
        )));
    }
    if title.contains(FORBIDDEN_TITLE_CHARS) || title.starts_with('\'') || title.ends_with('\'') {
        return Err(OoxmlError::InvalidOperation(format!(
            "Sheet title contains a forbidden character: {:?}",
            title
        )));
    }
    Ok(())
}

impl WorkbookPart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sheet entry by title, compared case-insensitively as Excel does.
    pub fn sheet(&self, title: &str) -> Option<&SheetEntry> {
        self.sheets
            .iter()
            .find(|s| s.title.eq_ignore_ascii_case(title))
            .or_else(|| {
                let folded = title.to_lowercase();
                self.sheets.iter().find(|s| s.title.to_lowercase() == folded)
            })
    }

    /// Next free `sheetId`.
    pub fn next_sheet_id(&self) -> u32 {
        self.sheets.iter().map(|s| s.sheet_id).max().unwrap_or(0) + 1
    }

    /// Parse `xl/workbook.xml`.
    pub fn parse(content: &str) -> Result<Self> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut part = Self::new();
        let mut buf = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) if e.local_name().as_ref() == b"definedName" => {
                    let name = parse_defined_name(&mut reader, &e, true)?;
                    part.defined_names.push(name);
                },
                Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                    b"sheet" => {
                        if let Some(entry) = parse_sheet(&e)? {
                            part.sheets.push(entry);
                        }
                    },
                    b"workbookView" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.local_name().as_ref() == b"activeTab" {
                                part.active_tab = attr_u32(&attr)?;
                            }
                        }
                    },
                    b"workbookPr" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.local_name().as_ref() == b"date1904" {
                                part.date1904 = parse_bool(&attr.value);
                            }
                        }
                    },
                    b"definedName" => {
                        let name = parse_defined_name(&mut reader, &e, false)?;
                        part.defined_names.push(name);
                    },
                    _ => {},
                },
                Event::Eof => break,
                _ => {},
            }
        }

        if !part.sheets.is_empty() {
            part.active_tab = part.active_tab.min(part.sheets.len() as u32 - 1);
        }
        log::debug!("workbook lists {} sheets", part.sheets.len());
        Ok(part)
    }

    /// Serialize as `xl/workbook.xml`.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(512 + self.sheets.len() * 96);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        let _ = write!(
            xml,
            r#"<workbook xmlns="{}" xmlns:r="{}">"#,
            namespace::SML_MAIN,
            namespace::OFC_RELATIONSHIPS
        );
        if self.date1904 {
            xml.push_str(r#"<workbookPr date1904="1"/>"#);
        } else {
            xml.push_str("<workbookPr/>");
        }
        let _ = write!(
            xml,
            r#"<bookViews><workbookView activeTab="{}"/></bookViews>"#,
            self.active_tab
        );

        xml.push_str("<sheets>");
        for sheet in &self.sheets {
            let _ = write!(
                xml,
                r#"<sheet name="{}" sheetId="{}""#,
                escape_xml(&sheet.title),
                sheet.sheet_id
            );
            if let Some(state) = sheet.state.as_attr() {
                let _ = write!(xml, r#" state="{}""#, state);
            }
            let _ = write!(xml, r#" r:id="{}"/>"#, escape_xml(&sheet.relationship_id));
        }
        xml.push_str("</sheets>");

        if !self.defined_names.is_empty() {
            xml.push_str("<definedNames>");
            for name in &self.defined_names {
                let _ = write!(xml, r#"<definedName name="{}""#, escape_xml(&name.name));
                if let Some(local) = name.local_sheet_id {
                    let _ = write!(xml, r#" localSheetId="{}""#, local);
                }
                if name.hidden {
                    xml.push_str(r#" hidden="1""#);
                }
                let _ = write!(xml, ">{}</definedName>", escape_xml(&name.formula));
            }
            xml.push_str("</definedNames>");
        }

        xml.push_str(r#"<calcPr calcId="191029"/></workbook>"#);
        xml
    }
}

fn parse_sheet(e: &BytesStart<'_>) -> Result<Option<SheetEntry>> {
    let mut title = None;
    let mut sheet_id = None;
    let mut relationship_id = None;
    let mut state = SheetState::Visible;

    for attr in e.attributes().flatten() {
        let key = attr.key.as_ref();
        match attr.key.local_name().as_ref() {
            b"name" => title = Some(attr_value(&attr)?),
            b"sheetId" => sheet_id = Some(attr_u32(&attr)?),
            b"state" => state = SheetState::from_attr(&attr_value(&attr)?),
            // r:id; the prefix varies but the local name is always `id`
            b"id" if key != b"id" => relationship_id = Some(attr_value(&attr)?),
            _ => {},
        }
    }

    match (title, sheet_id, relationship_id) {
        (Some(title), Some(sheet_id), Some(relationship_id)) => Ok(Some(SheetEntry {
            title,
            sheet_id,
            relationship_id,
            state,
        })),
        (title, ..) => {
            log::warn!("skipping incomplete sheet entry {:?}", title);
            Ok(None)
        },
    }
}

fn parse_defined_name(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart<'_>,
    has_body: bool,
) -> Result<DefinedName> {
    let mut name = DefinedName {
        name: String::new(),
        local_sheet_id: None,
        hidden: false,
        formula: String::new(),
    };
    for attr in start.attributes().flatten() {
        match attr.key.local_name().as_ref() {
            b"name" => name.name = attr_value(&attr)?,
            b"localSheetId" => name.local_sheet_id = Some(attr_u32(&attr)?),
            b"hidden" => name.hidden = parse_bool(&attr.value),
            _ => {},
        }
    }

    if !has_body {
        return Ok(name);
    }

    let mut buf = Vec::with_capacity(128);
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Text(t) => name.formula.push_str(&text_of(&t)?),
            Event::GeneralRef(r) => push_general_ref(&mut name.formula, &r)?,
            Event::End(e) if e.local_name().as_ref() == b"definedName" => break,
            Event::Eof => break,
            _ => {},
        }
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKBOOK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <workbookPr date1904="1"/>
  <bookViews><workbookView xWindow="0" yWindow="0" activeTab="1"/></bookViews>
  <sheets>
    <sheet name="Data" sheetId="1" r:id="rId1"/>
    <sheet name="R&amp;D" sheetId="4" state="hidden" r:id="rId2"/>
    <sheet name="Broken" sheetId="5"/>
  </sheets>
  <definedNames>
    <definedName name="_xlnm.Print_Area" localSheetId="0">Data!$A$1:$C$10</definedName>
    <definedName name="Rate">0.05</definedName>
  </definedNames>
</workbook>"#;

    #[test]
    fn test_parse_workbook() {
        let part = WorkbookPart::parse(WORKBOOK_XML).unwrap();
        assert_eq!(part.sheets.len(), 2);
        assert_eq!(part.sheets[1].title, "R&D");
        assert_eq!(part.sheets[1].sheet_id, 4);
        assert_eq!(part.sheets[1].relationship_id, "rId2");
        assert_eq!(part.sheets[1].state, SheetState::Hidden);
        assert_eq!(part.active_tab, 1);
        assert!(part.date1904);
        assert_eq!(part.defined_names[0].local_sheet_id, Some(0));
        assert_eq!(part.defined_names[0].formula, "Data!$A$1:$C$10");
        assert_eq!(part.next_sheet_id(), 5);
    }

    #[test]
    fn test_sheet_lookup_ignores_case() {
        let part = WorkbookPart::parse(WORKBOOK_XML).unwrap();
        assert_eq!(part.sheet("data").unwrap().sheet_id, 1);
        assert!(part.sheet("Missing").is_none());
    }

    #[test]
    fn test_roundtrip() {
        let part = WorkbookPart::parse(WORKBOOK_XML).unwrap();
        let reparsed = WorkbookPart::parse(&part.to_xml()).unwrap();
        assert_eq!(reparsed, part);
    }

    #[test]
    fn test_titles() {
        assert!(validate_title("Sheet1").is_ok());
        assert!(validate_title(&"x".repeat(31)).is_ok());
        assert!(validate_title(&"x".repeat(32)).is_err());
        for bad in ["a*b", "a:b", "a\\b", "a?b", "[a]", "'quoted'"] {
            assert!(validate_title(bad).is_err(), "{bad}");
        }
    }
}
