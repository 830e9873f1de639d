//! Content types plus the relationship graph of a package.

use std::collections::BTreeMap;

use super::content_types::ContentTypes;
use super::error::{OpcError, Result};
use super::packuri::PackURI;
use super::rel::{Relationship, Relationships};

/// What a package declares about its parts: their content types and the
/// typed relationships between them.
///
/// The manifest is mutated while parts are discovered (reading) or registered
/// (writing) and must be complete before `[Content_Types].xml` is written.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    content_types: ContentTypes,
    relationships: BTreeMap<PackURI, Relationships>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manifest over an already parsed content-type registry.
    pub fn with_content_types(content_types: ContentTypes) -> Self {
        Self {
            content_types,
            relationships: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    pub fn add_default_type(&mut self, extension: &str, content_type: &str) {
        self.content_types.add_default(extension, content_type);
    }

    pub fn add_override_type(&mut self, part: &PackURI, content_type: &str) {
        self.content_types.add_override(part.clone(), content_type);
    }

    /// Content type of `part`; an override beats the extension default.
    pub fn content_type_of(&self, part: &PackURI) -> Result<&str> {
        self.content_types.require(part)
    }

    /// Install the parsed relationships of one source part.
    pub fn set_relationships(&mut self, rels: Relationships) {
        self.relationships.insert(rels.source().clone(), rels);
    }

    pub fn relationships(&self, source: &PackURI) -> Option<&Relationships> {
        self.relationships.get(source)
    }

    /// Relationships of `source`, created empty on first use.
    pub fn relationships_mut(&mut self, source: &PackURI) -> &mut Relationships {
        self.relationships
            .entry(source.clone())
            .or_insert_with(|| Relationships::new(source.clone()))
    }

    /// Every source part with at least one relationship.
    pub fn sources(&self) -> impl Iterator<Item = &Relationships> {
        self.relationships.values().filter(|r| !r.is_empty())
    }

    /// Relationship `id` of `source`.
    pub fn relationship(&self, source: &PackURI, id: &str) -> Result<&Relationship> {
        self.relationships(source)
            .and_then(|rels| rels.get(id))
            .ok_or_else(|| OpcError::RelationshipNotFound(format!("{} from {}", id, source)))
    }

    /// The only relationship of `reltype` from `source`.
    pub fn relationship_by_type<'a>(&'a self, source: &PackURI, reltype: &'a str) -> Result<&'a Relationship> {
        match self.relationships(source) {
            Some(rels) => rels.part_with_reltype(reltype),
            None => Err(OpcError::RelationshipNotFound(format!(
                "no relationship of type '{}' from {}",
                reltype, source
            ))),
        }
    }

    /// Follow relationship ids from the package root, each id looked up on the
    /// part the previous one resolved to.
    pub fn resolve_chain(&self, ids: &[&str]) -> Result<PackURI> {
        let mut part = PackURI::package();
        for id in ids {
            part = self.relationship(&part, id)?.target_partname()?;
        }
        Ok(part)
    }
}

/// Resolve successive relationship targets into one absolute part name.
///
/// The first target is relative to the package root; each following target is
/// relative to the directory of the part the previous one named.
///
/// ```
/// use loquat::ooxml::opc::canonicalize;
/// let part = canonicalize(["xl/workbook.xml", "worksheets/sheet1.xml", "../drawings/drawing1.xml"])?;
/// assert_eq!(part.as_str(), "/xl/drawings/drawing1.xml");
/// # Ok::<(), loquat::ooxml::opc::OpcError>(())
/// ```
pub fn canonicalize<'a, I>(chain: I) -> Result<PackURI>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut part = PackURI::package();
    for target in chain {
        part = PackURI::from_rel_ref(part.base_uri(), target)?;
    }
    Ok(part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::opc::constants::{content_type as CT, relationship_type as RT};
    use crate::ooxml::opc::rel::TargetMode;

    fn uri(s: &str) -> PackURI {
        PackURI::new(s).unwrap()
    }

    fn sample() -> Manifest {
        let mut manifest = Manifest::new();
        manifest.add_default_type("xml", CT::XML);
        manifest.add_default_type("rels", CT::OPC_RELATIONSHIPS);
        manifest.add_override_type(&uri("/xl/workbook.xml"), CT::SML_SHEET_MAIN);

        manifest.relationships_mut(&PackURI::package()).add_relationship(
            RT::OFFICE_DOCUMENT,
            "xl/workbook.xml",
            "rId1",
            TargetMode::Internal,
        );
        let wb = manifest.relationships_mut(&uri("/xl/workbook.xml"));
        wb.add_relationship(RT::WORKSHEET, "worksheets/sheet1.xml", "rId1", TargetMode::Internal);
        wb.add_relationship(RT::WORKSHEET, "worksheets/sheet2.xml", "rId2", TargetMode::Internal);
        wb.add_relationship(RT::STYLES, "styles.xml", "rId3", TargetMode::Internal);
        manifest
    }

    #[test]
    fn content_type_resolution() {
        let manifest = sample();
        assert_eq!(
            manifest.content_type_of(&uri("/xl/workbook.xml")).unwrap(),
            CT::SML_SHEET_MAIN
        );
        assert_eq!(manifest.content_type_of(&uri("/xl/styles.xml")).unwrap(), CT::XML);
        assert!(matches!(
            manifest.content_type_of(&uri("/xl/vbaProject.bin")),
            Err(OpcError::ContentTypeNotFound(_))
        ));
    }

    #[test]
    fn relationship_lookup() {
        let manifest = sample();
        let wb = uri("/xl/workbook.xml");
        assert_eq!(
            manifest.relationship(&wb, "rId2").unwrap().target_partname().unwrap(),
            uri("/xl/worksheets/sheet2.xml")
        );
        assert!(matches!(
            manifest.relationship(&wb, "rId9"),
            Err(OpcError::RelationshipNotFound(_))
        ));
        assert_eq!(manifest.relationship_by_type(&wb, RT::STYLES).unwrap().r_id(), "rId3");
        assert!(matches!(
            manifest.relationship_by_type(&wb, RT::WORKSHEET),
            Err(OpcError::AmbiguousRelationship { count: 2, .. })
        ));
        assert!(matches!(
            manifest.relationship_by_type(&uri("/xl/styles.xml"), RT::THEME),
            Err(OpcError::RelationshipNotFound(_))
        ));
    }

    #[test]
    fn chains_resolve_from_the_root() {
        let manifest = sample();
        assert_eq!(
            manifest.resolve_chain(&["rId1", "rId1"]).unwrap(),
            uri("/xl/worksheets/sheet1.xml")
        );
        assert_eq!(
            canonicalize(["/xl/workbook.xml", "../docProps/./app.xml"]).unwrap(),
            uri("/docProps/app.xml")
        );
        assert_eq!(canonicalize([]).unwrap(), PackURI::package());
    }
}
