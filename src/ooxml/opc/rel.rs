//! Relationships from one source part.
//!
//! A `.rels` part lists typed edges from its source part to other parts
//! (internal, resolved relative to the source's directory) or to external
//! URIs. Document order is kept so a package re-serializes the way it was read.

use quick_xml::Reader;
use quick_xml::events::Event;

use super::constants::{namespace, target_mode};
use super::error::{OpcError, Result};
use super::packuri::PackURI;
use crate::ooxml::xml::escape_xml;

/// Whether a relationship points into the package or outside of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetMode {
    #[default]
    Internal,
    External,
}

/// A single relationship from a source part to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    r_id: String,
    reltype: String,
    target_ref: String,
    mode: TargetMode,
    /// Directory of the source part, for resolving `target_ref`
    base_uri: String,
}

impl Relationship {
    pub fn new(
        r_id: impl Into<String>,
        reltype: impl Into<String>,
        target_ref: impl Into<String>,
        base_uri: impl Into<String>,
        mode: TargetMode,
    ) -> Self {
        Self {
            r_id: r_id.into(),
            reltype: reltype.into(),
            target_ref: target_ref.into(),
            mode,
            base_uri: base_uri.into(),
        }
    }

    #[inline]
    pub fn r_id(&self) -> &str {
        &self.r_id
    }

    #[inline]
    pub fn reltype(&self) -> &str {
        &self.reltype
    }

    /// Target as written: a part reference relative to the source, or a URI.
    #[inline]
    pub fn target_ref(&self) -> &str {
        &self.target_ref
    }

    #[inline]
    pub fn mode(&self) -> TargetMode {
        self.mode
    }

    #[inline]
    pub fn is_external(&self) -> bool {
        self.mode == TargetMode::External
    }

    /// Absolute part name of an internal target.
    pub fn target_partname(&self) -> Result<PackURI> {
        if self.is_external() {
            return Err(OpcError::InvalidRelationship(format!(
                "{} targets external resource {}",
                self.r_id, self.target_ref
            )));
        }
        PackURI::from_rel_ref(&self.base_uri, &self.target_ref)
    }
}

/// Relationships of one source part, in document order.
#[derive(Debug, Clone)]
pub struct Relationships {
    source: PackURI,
    rels: Vec<Relationship>,
}

impl Relationships {
    /// Empty collection for `source`.
    pub fn new(source: PackURI) -> Self {
        Self {
            source,
            rels: Vec::new(),
        }
    }

    /// Part that owns these relationships (`/` for the package).
    #[inline]
    pub fn source(&self) -> &PackURI {
        &self.source
    }

    /// Add a relationship with an explicit id, replacing one with the same id.
    pub fn add_relationship(
        &mut self,
        reltype: &str,
        target_ref: &str,
        r_id: &str,
        mode: TargetMode,
    ) -> &Relationship {
        let rel = Relationship::new(r_id, reltype, target_ref, self.source.base_uri(), mode);
        let pos = match self.rels.iter().position(|r| r.r_id == r_id) {
            Some(pos) => {
                self.rels[pos] = rel;
                pos
            },
            None => {
                self.rels.push(rel);
                self.rels.len() - 1
            },
        };
        &self.rels[pos]
    }

    #[inline]
    pub fn get(&self, r_id: &str) -> Option<&Relationship> {
        self.rels.iter().find(|r| r.r_id == r_id)
    }

    #[inline]
    pub fn contains(&self, r_id: &str) -> bool {
        self.get(r_id).is_some()
    }

    /// Existing internal relationship of `reltype` to `target`, or a new one.
    pub fn get_or_add(&mut self, reltype: &str, target: &PackURI) -> &Relationship {
        let target_ref = target.relative_ref(self.source.base_uri());
        let existing = self
            .rels
            .iter()
            .position(|r| !r.is_external() && r.reltype == reltype && r.target_ref == target_ref);
        match existing {
            Some(pos) => &self.rels[pos],
            None => {
                let r_id = self.next_r_id();
                self.add_relationship(reltype, &target_ref, &r_id, TargetMode::Internal)
            },
        }
    }

    /// Existing external relationship of `reltype` to `target_ref`, or a new one.
    pub fn get_or_add_ext_rel(&mut self, reltype: &str, target_ref: &str) -> String {
        if let Some(rel) = self
            .rels
            .iter()
            .find(|r| r.is_external() && r.reltype == reltype && r.target_ref == target_ref)
        {
            return rel.r_id.clone();
        }
        let r_id = self.next_r_id();
        self.add_relationship(reltype, target_ref, &r_id, TargetMode::External);
        r_id
    }

    /// Lowest free `rIdN`, filling gaps left by removed relationships.
    pub fn next_r_id(&self) -> String {
        let mut used: Vec<u32> = self
            .rels
            .iter()
            .filter_map(|r| r.r_id.strip_prefix("rId"))
            .filter_map(|n| atoi_simd::parse::<u32, false, false>(n.as_bytes()).ok())
            .collect();
        used.sort_unstable();

        let mut next = 1u32;
        for n in used {
            match n.cmp(&next) {
                std::cmp::Ordering::Equal => next += 1,
                std::cmp::Ordering::Greater => break,
                std::cmp::Ordering::Less => {},
            }
        }
        format!("rId{}", next)
    }

    /// All relationships of `reltype`, in document order.
    pub fn by_type<'a>(&'a self, reltype: &'a str) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.rels.iter().filter(move |r| r.reltype == reltype)
    }

    /// The single relationship of `reltype`.
    pub fn part_with_reltype<'a>(&'a self, reltype: &'a str) -> Result<&'a Relationship> {
        let mut matching = self.by_type(reltype);
        let first = matching.next().ok_or_else(|| {
            OpcError::RelationshipNotFound(format!(
                "no relationship of type '{}' from {}",
                reltype, self.source
            ))
        })?;
        let extra = matching.count();
        if extra > 0 {
            return Err(OpcError::AmbiguousRelationship {
                source_part: self.source.to_string(),
                rel_type: reltype.to_string(),
                count: extra + 1,
            });
        }
        Ok(first)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    pub fn remove(&mut self, r_id: &str) -> Option<Relationship> {
        let pos = self.rels.iter().position(|r| r.r_id == r_id)?;
        Some(self.rels.remove(pos))
    }

    /// Parse the `.rels` part belonging to `source`.
    pub fn from_xml(source: PackURI, xml: &str) -> Result<Self> {
        let mut rels = Relationships::new(source);
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) | Event::Empty(ref e)
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let mut r_id = None;
                    let mut reltype = None;
                    let mut target_ref = None;
                    let mut mode = TargetMode::Internal;

                    for attr in e.attributes() {
                        let attr = attr?;
                        let value = attr.unescape_value()?;
                        match attr.key.local_name().as_ref() {
                            b"Id" => r_id = Some(value.into_owned()),
                            b"Type" => reltype = Some(value.into_owned()),
                            b"Target" => target_ref = Some(value.into_owned()),
                            b"TargetMode" if value == target_mode::EXTERNAL => {
                                mode = TargetMode::External
                            },
                            _ => {},
                        }
                    }

                    match (r_id, reltype, target_ref) {
                        (Some(r_id), Some(reltype), Some(target_ref)) => {
                            rels.add_relationship(&reltype, &target_ref, &r_id, mode);
                        },
                        _ => {
                            return Err(OpcError::InvalidRelationship(format!(
                                "Relationship in {} is missing Id, Type or Target",
                                rels.source.rels_uri()
                            )));
                        },
                    }
                },
                Event::Eof => break,
                _ => {},
            }
            buf.clear();
        }

        Ok(rels)
    }

    /// Serialize as a `.rels` part, in document order.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(128 + self.rels.len() * 160);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(&format!(r#"<Relationships xmlns="{}">"#, namespace::OPC_RELATIONSHIPS));

        for rel in &self.rels {
            let mode = if rel.is_external() {
                r#" TargetMode="External""#
            } else {
                ""
            };
            xml.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}"{}/>"#,
                escape_xml(&rel.r_id),
                escape_xml(&rel.reltype),
                escape_xml(&rel.target_ref),
                mode
            ));
        }

        xml.push_str("</Relationships>");
        xml
    }
}
