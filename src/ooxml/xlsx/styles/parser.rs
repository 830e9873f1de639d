//! XML parser for styles.xml file.
//!
//! Tables are read in file order so that every index a format record or a
//! cell refers to stays valid.

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{
    Alignment, Applied, Border, BorderStyle, Color, Fill, Font, Format, GradientFill, NamedStyle,
    NumberFormat, Protection, Stylesheet,
};
use crate::ooxml::error::Result;
use crate::ooxml::xlsx::number::parse_number;
use crate::ooxml::xml::{attr_u32, attr_value, parse_bool};

/// Parse styles from xl/styles.xml XML content.
pub(crate) fn parse_stylesheet(content: &str) -> Result<Stylesheet> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut styles = Stylesheet::empty();
    let mut style_xfs = Vec::new();
    let mut cell_xfs = Vec::new();
    let mut cell_styles = Vec::new();
    let mut buf = Vec::with_capacity(1024);

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"numFmts" => parse_number_formats(&mut reader, &mut styles)?,
                b"fonts" => parse_fonts(&mut reader, &mut styles)?,
                b"fills" => parse_fills(&mut reader, &mut styles)?,
                b"borders" => parse_borders(&mut reader, &mut styles)?,
                b"cellStyleXfs" => parse_xfs(&mut reader, &mut styles, b"cellStyleXfs", &mut style_xfs)?,
                b"cellXfs" => parse_xfs(&mut reader, &mut styles, b"cellXfs", &mut cell_xfs)?,
                b"cellStyles" => parse_cell_styles(&mut reader, &mut cell_styles)?,
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
    }

    // Named styles: a cellStyles entry names one cellStyleXfs record.
    let mut names = HashMap::with_capacity(cell_styles.len());
    for entry in cell_styles {
        let Some((xf, _)) = style_xfs.get(entry.xf_id as usize) else {
            log::warn!("cell style {:?} refers to missing record {}", entry.name, entry.xf_id);
            continue;
        };
        names.entry(entry.xf_id).or_insert_with(|| entry.name.clone());
        styles.named_styles_mut().push(NamedStyle {
            name: entry.name,
            builtin_id: entry.builtin_id,
            hidden: entry.hidden,
            alignment: xf.alignment,
            border: xf.border,
            fill: xf.fill,
            font: xf.font,
            number_format: xf.number_format,
            protection: xf.protection,
            applied: xf.applied,
        });
    }

    for (mut format, xf_id) in cell_xfs {
        format.style = xf_id.and_then(|id| names.get(&id).cloned());
        styles.formats_mut().push(format);
    }

    Ok(styles)
}

struct CellStyleEntry {
    name: String,
    xf_id: u32,
    builtin_id: Option<u32>,
    hidden: bool,
}

/// The `val` attribute most font child elements carry.
fn val(e: &BytesStart<'_>) -> Result<Option<String>> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == b"val" {
            return Ok(Some(attr_value(&attr)?));
        }
    }
    Ok(None)
}

fn val_u32(e: &BytesStart<'_>) -> Result<Option<u32>> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == b"val" {
            return Ok(Some(attr_u32(&attr)?));
        }
    }
    Ok(None)
}

/// Boolean font elements (`<b/>`, `<i val="0"/>`) default to true.
fn val_bool(e: &BytesStart<'_>) -> bool {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == b"val")
        .map(|a| parse_bool(&a.value))
        .unwrap_or(true)
}

/// Parse number formats section.
fn parse_number_formats(reader: &mut Reader<&[u8]>, styles: &mut Stylesheet) -> Result<()> {
    let mut buf = Vec::with_capacity(512);

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"numFmt" => {
                let mut id = None;
                let mut code = None;
                for attr in e.attributes().flatten() {
                    match attr.key.local_name().as_ref() {
                        b"numFmtId" => id = Some(attr_u32(&attr)?),
                        b"formatCode" => code = Some(attr_value(&attr)?),
                        _ => {},
                    }
                }
                if let (Some(id), Some(code)) = (id, code) {
                    styles.insert_number_format(NumberFormat::new(id, code));
                }
            },
            Event::End(e) if e.local_name().as_ref() == b"numFmts" => break,
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(())
}

/// Parse fonts section.
fn parse_fonts(reader: &mut Reader<&[u8]>, styles: &mut Stylesheet) -> Result<()> {
    let mut buf = Vec::with_capacity(512);

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"font" => {
                let font = parse_font(reader)?;
                styles.table_mut::<Font>().push(font);
            },
            Event::Empty(e) if e.local_name().as_ref() == b"font" => {
                styles.table_mut::<Font>().push(Font::default());
            },
            Event::End(e) if e.local_name().as_ref() == b"fonts" => break,
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(())
}

/// Parse a single font element.
fn parse_font(reader: &mut Reader<&[u8]>) -> Result<Font> {
    let mut font = Font::new();
    let mut buf = Vec::with_capacity(256);

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"name" | b"rFont" => font.name = val(&e)?,
                b"sz" => {
                    font.size = match val(&e)? {
                        Some(v) => Some(parse_number(&v)?),
                        None => None,
                    }
                },
                b"b" => font.bold = val_bool(&e),
                b"i" => font.italic = val_bool(&e),
                b"strike" => font.strike = val_bool(&e),
                // Underline can have a val attribute, default is "single"
                b"u" => font.underline = Some(val(&e)?.unwrap_or_else(|| "single".to_string())),
                b"vertAlign" => font.vertical_align = val(&e)?,
                b"color" => font.color = Color::from_element(&e)?,
                b"charset" => font.charset = val_u32(&e)?,
                b"family" => font.family = val_u32(&e)?,
                b"scheme" => font.scheme = val(&e)?,
                _ => {},
            },
            Event::End(e) if e.local_name().as_ref() == b"font" => break,
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(font)
}

/// Parse fills section.
fn parse_fills(reader: &mut Reader<&[u8]>, styles: &mut Stylesheet) -> Result<()> {
    let mut buf = Vec::with_capacity(512);

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"fill" => {
                let fill = parse_fill(reader)?;
                styles.table_mut::<Fill>().push(fill);
            },
            Event::Empty(e) if e.local_name().as_ref() == b"fill" => {
                styles.table_mut::<Fill>().push(Fill::default());
            },
            Event::End(e) if e.local_name().as_ref() == b"fills" => break,
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(())
}

/// Parse a single fill element.
fn parse_fill(reader: &mut Reader<&[u8]>) -> Result<Fill> {
    let mut fill = Fill::default();
    let mut buf = Vec::with_capacity(256);

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Empty(e) if e.local_name().as_ref() == b"patternFill" => {
                fill = Fill::pattern(pattern_type(&e)?);
            },
            Event::Start(e) if e.local_name().as_ref() == b"patternFill" => {
                let pattern = pattern_type(&e)?;
                fill = parse_pattern_fill(reader, pattern)?;
            },
            Event::Start(e) if e.local_name().as_ref() == b"gradientFill" => {
                fill = Fill::Gradient(parse_gradient_fill(reader, &e)?);
            },
            Event::End(e) if e.local_name().as_ref() == b"fill" => break,
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(fill)
}

fn pattern_type(e: &BytesStart<'_>) -> Result<String> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == b"patternType" {
            return attr_value(&attr);
        }
    }
    Ok("none".to_string())
}

/// Parse a pattern fill.
fn parse_pattern_fill(reader: &mut Reader<&[u8]>, pattern_type: String) -> Result<Fill> {
    let mut fg_color = None;
    let mut bg_color = None;

    let mut buf = Vec::with_capacity(128);
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"fgColor" => fg_color = Color::from_element(&e)?,
                b"bgColor" => bg_color = Color::from_element(&e)?,
                _ => {},
            },
            Event::End(e) if e.local_name().as_ref() == b"patternFill" => break,
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(Fill::Pattern {
        pattern_type,
        fg_color,
        bg_color,
    })
}

/// Parse a gradient fill.
fn parse_gradient_fill(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> Result<GradientFill> {
    let mut gradient = GradientFill::default();
    for attr in start.attributes().flatten() {
        let number = || -> Result<Option<f64>> { Ok(Some(parse_number(&attr_value(&attr)?)?)) };
        match attr.key.local_name().as_ref() {
            b"type" => gradient.gradient_type = Some(attr_value(&attr)?),
            b"degree" => gradient.degree = number()?,
            b"left" => gradient.left = number()?,
            b"right" => gradient.right = number()?,
            b"top" => gradient.top = number()?,
            b"bottom" => gradient.bottom = number()?,
            _ => {},
        }
    }

    let mut position = 0.0;
    let mut buf = Vec::with_capacity(128);
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"stop" => {
                for attr in e.attributes().flatten() {
                    if attr.key.local_name().as_ref() == b"position" {
                        position = parse_number(&attr_value(&attr)?)?;
                    }
                }
            },
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"color" => {
                if let Some(color) = Color::from_element(&e)? {
                    gradient.stops.push((position, color));
                }
            },
            Event::End(e) if e.local_name().as_ref() == b"gradientFill" => break,
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(gradient)
}

/// Parse borders section.
fn parse_borders(reader: &mut Reader<&[u8]>, styles: &mut Stylesheet) -> Result<()> {
    let mut buf = Vec::with_capacity(512);

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"border" => {
                let border = parse_border(reader, &e)?;
                styles.table_mut::<Border>().push(border);
            },
            Event::Empty(e) if e.local_name().as_ref() == b"border" => {
                let border = border_attributes(&e);
                styles.table_mut::<Border>().push(border);
            },
            Event::End(e) if e.local_name().as_ref() == b"borders" => break,
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(())
}

fn border_attributes(start: &BytesStart<'_>) -> Border {
    let mut border = Border::new();
    for attr in start.attributes().flatten() {
        match attr.key.local_name().as_ref() {
            b"diagonalUp" => border.diagonal_up = parse_bool(&attr.value),
            b"diagonalDown" => border.diagonal_down = parse_bool(&attr.value),
            _ => {},
        }
    }
    border
}

/// Parse a single border element.
fn parse_border(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> Result<Border> {
    let mut border = border_attributes(start);

    let mut buf = Vec::with_capacity(256);
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let side = parse_border_side(reader, &e, true)?;
                assign_side(&mut border, e.local_name().as_ref(), side);
            },
            Event::Empty(e) => {
                let side = parse_border_side(reader, &e, false)?;
                assign_side(&mut border, e.local_name().as_ref(), side);
            },
            Event::End(e) if e.local_name().as_ref() == b"border" => break,
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(border)
}

fn assign_side(border: &mut Border, name: &[u8], side: Option<BorderStyle>) {
    match name {
        b"left" | b"start" => border.left = side,
        b"right" | b"end" => border.right = side,
        b"top" => border.top = side,
        b"bottom" => border.bottom = side,
        b"diagonal" => border.diagonal = side,
        _ => {},
    }
}

/// Parse a single border side (left, right, top, bottom, diagonal).
fn parse_border_side(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart<'_>,
    has_children: bool,
) -> Result<Option<BorderStyle>> {
    let mut style = String::from("none");
    let mut color = None;

    for attr in start.attributes().flatten() {
        if attr.key.local_name().as_ref() == b"style" {
            style = attr_value(&attr)?;
        }
    }

    if has_children {
        let mut buf = Vec::with_capacity(128);
        let side_name = start.local_name().as_ref().to_vec();
        loop {
            buf.clear();
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"color" => {
                    color = Color::from_element(&e)?;
                },
                Event::End(e) if e.local_name().as_ref() == side_name.as_slice() => break,
                Event::Eof => break,
                _ => {},
            }
        }
    }

    if style == "none" {
        Ok(None)
    } else {
        Ok(Some(BorderStyle::new(style, color)))
    }
}

/// Parse `cellXfs` or `cellStyleXfs`; each record comes with its `xfId`.
fn parse_xfs(
    reader: &mut Reader<&[u8]>,
    styles: &mut Stylesheet,
    section: &[u8],
    out: &mut Vec<(Format, Option<u32>)>,
) -> Result<()> {
    let mut buf = Vec::with_capacity(512);

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"xf" => {
                let (mut format, xf_id) = xf_attributes(&e)?;
                parse_xf_children(reader, styles, &mut format)?;
                out.push((format, xf_id));
            },
            Event::Empty(e) if e.local_name().as_ref() == b"xf" => {
                out.push(xf_attributes(&e)?);
            },
            Event::End(e) if e.local_name().as_ref() == section => break,
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(())
}

fn xf_attributes(start: &BytesStart<'_>) -> Result<(Format, Option<u32>)> {
    let mut format = Format::default();
    let mut xf_id = None;

    for attr in start.attributes().flatten() {
        let flag = |applied: &mut Applied, bit: Applied| applied.set(bit, parse_bool(&attr.value));
        match attr.key.local_name().as_ref() {
            b"numFmtId" => format.number_format = Some(attr_u32(&attr)?),
            b"fontId" => format.font = Some(attr_u32(&attr)?),
            b"fillId" => format.fill = Some(attr_u32(&attr)?),
            b"borderId" => format.border = Some(attr_u32(&attr)?),
            b"xfId" => xf_id = Some(attr_u32(&attr)?),
            b"applyNumberFormat" => flag(&mut format.applied, Applied::NUMBER_FORMAT),
            b"applyFont" => flag(&mut format.applied, Applied::FONT),
            b"applyFill" => flag(&mut format.applied, Applied::FILL),
            b"applyBorder" => flag(&mut format.applied, Applied::BORDER),
            b"applyAlignment" => flag(&mut format.applied, Applied::ALIGNMENT),
            b"applyProtection" => flag(&mut format.applied, Applied::PROTECTION),
            b"quotePrefix" => format.quote_prefix = parse_bool(&attr.value),
            b"pivotButton" => format.pivot_button = parse_bool(&attr.value),
            _ => {},
        }
    }

    Ok((format, xf_id))
}

fn parse_xf_children(
    reader: &mut Reader<&[u8]>,
    styles: &mut Stylesheet,
    format: &mut Format,
) -> Result<()> {
    let mut buf = Vec::with_capacity(256);
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"alignment" => {
                    let alignment = parse_alignment(&e)?;
                    format.alignment = Some(styles.find_or_add(alignment));
                },
                b"protection" => {
                    let mut protection = Protection::default();
                    for attr in e.attributes().flatten() {
                        match attr.key.local_name().as_ref() {
                            b"locked" => protection.locked = parse_bool(&attr.value),
                            b"hidden" => protection.hidden = parse_bool(&attr.value),
                            _ => {},
                        }
                    }
                    format.protection = Some(styles.find_or_add(protection));
                },
                _ => {},
            },
            Event::End(e) if e.local_name().as_ref() == b"xf" => break,
            Event::Eof => break,
            _ => {},
        }
    }
    Ok(())
}

/// Parse alignment element.
fn parse_alignment(start: &BytesStart<'_>) -> Result<Alignment> {
    let mut alignment = Alignment::new();

    for attr in start.attributes().flatten() {
        match attr.key.local_name().as_ref() {
            b"horizontal" => alignment.horizontal = Some(attr_value(&attr)?),
            b"vertical" => alignment.vertical = Some(attr_value(&attr)?),
            b"textRotation" => alignment.text_rotation = Some(attr_u32(&attr)?),
            b"wrapText" => alignment.wrap_text = parse_bool(&attr.value),
            b"indent" => alignment.indent = Some(attr_u32(&attr)?),
            b"shrinkToFit" => alignment.shrink_to_fit = parse_bool(&attr.value),
            b"readingOrder" => alignment.reading_order = Some(attr_u32(&attr)?),
            _ => {},
        }
    }

    Ok(alignment)
}

fn parse_cell_styles(reader: &mut Reader<&[u8]>, out: &mut Vec<CellStyleEntry>) -> Result<()> {
    let mut buf = Vec::with_capacity(256);
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"cellStyle" => {
                let mut entry = CellStyleEntry {
                    name: String::new(),
                    xf_id: 0,
                    builtin_id: None,
                    hidden: false,
                };
                for attr in e.attributes().flatten() {
                    match attr.key.local_name().as_ref() {
                        b"name" => entry.name = attr_value(&attr)?,
                        b"xfId" => entry.xf_id = attr_u32(&attr)?,
                        b"builtinId" => entry.builtin_id = Some(attr_u32(&attr)?),
                        b"hidden" => entry.hidden = parse_bool(&attr.value),
                        _ => {},
                    }
                }
                out.push(entry);
            },
            Event::End(e) if e.local_name().as_ref() == b"cellStyles" => break,
            Event::Eof => break,
            _ => {},
        }
    }
    Ok(())
}
