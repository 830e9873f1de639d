//! The `[Content_Types].xml` registry.

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::Event;

use super::constants::namespace;
use super::error::{OpcError, Result};
use super::packuri::PackURI;
use crate::ooxml::xml::escape_xml;

/// Content types by extension (defaults) and by exact part name (overrides).
///
/// Extensions are stored lowercased. Both maps are ordered so serialization
/// is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypes {
    defaults: BTreeMap<String, String>,
    overrides: BTreeMap<PackURI, String>,
}

impl ContentTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `content_type` for every part with extension `ext`.
    pub fn add_default(&mut self, ext: &str, content_type: &str) {
        self.defaults
            .insert(ext.trim_start_matches('.').to_ascii_lowercase(), content_type.to_string());
    }

    /// Register `content_type` for exactly `partname`, taking precedence over defaults.
    pub fn add_override(&mut self, partname: PackURI, content_type: &str) {
        self.overrides.insert(partname, content_type.to_string());
    }

    pub fn remove_override(&mut self, partname: &PackURI) -> Option<String> {
        self.overrides.remove(partname)
    }

    /// Content type of `partname`: override, then default by extension.
    pub fn get(&self, partname: &PackURI) -> Option<&str> {
        if let Some(ct) = self.overrides.get(partname) {
            return Some(ct);
        }
        // Part names compare case-insensitively in OPC.
        if let Some((_, ct)) = self
            .overrides
            .iter()
            .find(|(name, _)| name.as_str().eq_ignore_ascii_case(partname.as_str()))
        {
            return Some(ct);
        }
        self.defaults
            .get(&partname.ext().to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Like [`get`](Self::get) but fails with `ContentTypeNotFound`.
    pub fn require(&self, partname: &PackURI) -> Result<&str> {
        self.get(partname)
            .ok_or_else(|| OpcError::ContentTypeNotFound(partname.to_string()))
    }

    #[inline]
    pub fn has_default(&self, ext: &str) -> bool {
        self.defaults.contains_key(&ext.to_ascii_lowercase())
    }

    pub fn defaults(&self) -> impl Iterator<Item = (&str, &str)> {
        self.defaults.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn overrides(&self) -> impl Iterator<Item = (&PackURI, &str)> {
        self.overrides.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// Parse a `[Content_Types].xml` document.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let mut types = ContentTypes::new();
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let is_default = match e.local_name().as_ref() {
                        b"Default" => true,
                        b"Override" => false,
                        _ => {
                            buf.clear();
                            continue;
                        },
                    };

                    let mut key = None;
                    let mut content_type = None;
                    for attr in e.attributes() {
                        let attr = attr?;
                        match attr.key.local_name().as_ref() {
                            b"Extension" | b"PartName" => {
                                key = Some(attr.unescape_value()?.into_owned())
                            },
                            b"ContentType" => {
                                content_type = Some(attr.unescape_value()?.into_owned())
                            },
                            _ => {},
                        }
                    }

                    let (Some(key), Some(content_type)) = (key, content_type) else {
                        return Err(OpcError::XmlError(
                            "[Content_Types].xml entry without key or ContentType".to_string(),
                        ));
                    };
                    if is_default {
                        types.add_default(&key, &content_type);
                    } else {
                        let partname = if key.starts_with('/') {
                            PackURI::new(key)?
                        } else {
                            PackURI::from_member_name(&key)
                        };
                        types.add_override(partname, &content_type);
                    }
                },
                Event::Eof => break,
                _ => {},
            }
            buf.clear();
        }

        Ok(types)
    }

    /// Serialize with defaults then overrides, each sorted.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(
            256 + self.defaults.len() * 96 + self.overrides.len() * 160,
        );
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(&format!(r#"<Types xmlns="{}">"#, namespace::OPC_CONTENT_TYPES));

        for (ext, ct) in &self.defaults {
            xml.push_str(&format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                escape_xml(ext),
                escape_xml(ct)
            ));
        }
        for (partname, ct) in &self.overrides {
            xml.push_str(&format!(
                r#"<Override PartName="{}" ContentType="{}"/>"#,
                escape_xml(partname.as_str()),
                escape_xml(ct)
            ));
        }

        xml.push_str("</Types>");
        xml
    }
}
