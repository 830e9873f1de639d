//! Serialization of the stylesheet to `xl/styles.xml`.

use std::fmt::Write as _;

use super::{Alignment, Applied, Border, Fill, Font, Protection, Stylesheet};
use crate::ooxml::opc::constants::namespace;
use crate::ooxml::xml::escape_xml;

/// Record fields shared by `cellXfs` and `cellStyleXfs` entries.
struct XfRecord {
    number_format: Option<u32>,
    font: Option<u32>,
    fill: Option<u32>,
    border: Option<u32>,
    alignment: Option<u32>,
    protection: Option<u32>,
    applied: Applied,
}

pub(crate) fn write_stylesheet(styles: &Stylesheet) -> String {
    let mut xml = String::with_capacity(4096);

    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    let _ = write!(xml, r#"<styleSheet xmlns="{}">"#, namespace::SML_MAIN);

    // Only custom formats are listed; builtin ids are implied.
    let custom = styles.custom_number_formats();
    if !custom.is_empty() {
        let _ = write!(xml, r#"<numFmts count="{}">"#, custom.len());
        for format in custom {
            let _ = write!(
                xml,
                r#"<numFmt numFmtId="{}" formatCode="{}"/>"#,
                format.id,
                escape_xml(&format.code)
            );
        }
        xml.push_str("</numFmts>");
    }

    let fonts = styles.table::<Font>();
    let _ = write!(xml, r#"<fonts count="{}">"#, fonts.len());
    for font in fonts.iter() {
        font.write_xml(&mut xml);
    }
    xml.push_str("</fonts>");

    let fills = styles.table::<Fill>();
    let _ = write!(xml, r#"<fills count="{}">"#, fills.len());
    for fill in fills.iter() {
        fill.write_xml(&mut xml);
    }
    xml.push_str("</fills>");

    let borders = styles.table::<Border>();
    let _ = write!(xml, r#"<borders count="{}">"#, borders.len());
    for border in borders.iter() {
        border.write_xml(&mut xml);
    }
    xml.push_str("</borders>");

    // One cellStyleXfs record per named style, in the same order.
    let named = styles.named_styles();
    if named.is_empty() {
        xml.push_str(r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#);
    } else {
        let _ = write!(xml, r#"<cellStyleXfs count="{}">"#, named.len());
        for style in named {
            let record = XfRecord {
                number_format: style.number_format,
                font: style.font,
                fill: style.fill,
                border: style.border,
                alignment: style.alignment,
                protection: style.protection,
                applied: style.applied,
            };
            write_xf(&mut xml, styles, &record, None, false, false);
        }
        xml.push_str("</cellStyleXfs>");
    }

    let formats = styles.formats();
    let _ = write!(xml, r#"<cellXfs count="{}">"#, formats.len());
    for format in formats.iter() {
        let xf_id = format
            .style
            .as_deref()
            .and_then(|name| named.iter().position(|s| s.name == name))
            .unwrap_or(0) as u32;
        let record = XfRecord {
            number_format: format.number_format,
            font: format.font,
            fill: format.fill,
            border: format.border,
            alignment: format.alignment,
            protection: format.protection,
            applied: format.applied,
        };
        write_xf(
            &mut xml,
            styles,
            &record,
            Some(xf_id),
            format.quote_prefix,
            format.pivot_button,
        );
    }
    xml.push_str("</cellXfs>");

    if named.is_empty() {
        xml.push_str(r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#);
    } else {
        let _ = write!(xml, r#"<cellStyles count="{}">"#, named.len());
        for (xf_id, style) in named.iter().enumerate() {
            let _ = write!(
                xml,
                r#"<cellStyle name="{}" xfId="{}""#,
                escape_xml(&style.name),
                xf_id
            );
            if let Some(builtin) = style.builtin_id {
                let _ = write!(xml, r#" builtinId="{}""#, builtin);
            }
            if style.hidden {
                xml.push_str(r#" hidden="1""#);
            }
            xml.push_str("/>");
        }
        xml.push_str("</cellStyles>");
    }

    xml.push_str("</styleSheet>");
    xml
}

fn write_xf(
    xml: &mut String,
    styles: &Stylesheet,
    record: &XfRecord,
    xf_id: Option<u32>,
    quote_prefix: bool,
    pivot_button: bool,
) {
    let _ = write!(
        xml,
        r#"<xf numFmtId="{}" fontId="{}" fillId="{}" borderId="{}""#,
        record.number_format.unwrap_or(0),
        record.font.unwrap_or(0),
        record.fill.unwrap_or(0),
        record.border.unwrap_or(0)
    );
    if let Some(xf_id) = xf_id {
        let _ = write!(xml, r#" xfId="{}""#, xf_id);
    }
    for (flag, attr) in [
        (Applied::NUMBER_FORMAT, "applyNumberFormat"),
        (Applied::FONT, "applyFont"),
        (Applied::FILL, "applyFill"),
        (Applied::BORDER, "applyBorder"),
        (Applied::ALIGNMENT, "applyAlignment"),
        (Applied::PROTECTION, "applyProtection"),
    ] {
        if record.applied.contains(flag) {
            let _ = write!(xml, r#" {}="1""#, attr);
        }
    }
    if quote_prefix {
        xml.push_str(r#" quotePrefix="1""#);
    }
    if pivot_button {
        xml.push_str(r#" pivotButton="1""#);
    }

    let alignment = record
        .alignment
        .and_then(|i| styles.get::<Alignment>(i).ok());
    let protection = record
        .protection
        .and_then(|i| styles.get::<Protection>(i).ok());
    if alignment.is_none() && protection.is_none() {
        xml.push_str("/>");
        return;
    }
    xml.push('>');
    if let Some(alignment) = alignment {
        alignment.write_xml(xml);
    }
    if let Some(protection) = protection {
        protection.write_xml(xml);
    }
    xml.push_str("</xf>");
}
