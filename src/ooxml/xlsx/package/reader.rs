//! Opening a workbook package.

use std::collections::{HashMap, HashSet};
use std::io::{self, BufReader, Read, Seek, SeekFrom};

use kumquat_zip::{EntryReader, ErrorKind, ReadOptions, ZipArchive};

use super::options::LoadOptions;
use super::{IncomingRelationship, PreservedPart, RelationshipSource};
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::constants::{content_type as ct, relationship_type as rt};
use crate::ooxml::opc::{ContentTypes, Manifest, OpcError, PackURI, Relationships};
use crate::ooxml::xlsx::shared_strings::SharedStrings;
use crate::ooxml::xlsx::styles::Stylesheet;
use crate::ooxml::xlsx::workbook::WorkbookPart;
use crate::ooxml::xlsx::worksheet::WorksheetReader;

#[cfg(feature = "ooxml_encryption")]
use crate::ooxml::crypto::{self, DecryptingReader};

/// First eight bytes of every compound file.
const COMPOUND_FILE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Content types a workbook part may declare.
const WORKBOOK_CONTENT_TYPES: [&str; 3] =
    [ct::SML_SHEET_MAIN, ct::SML_MACRO_ENABLED_MAIN, ct::SML_TEMPLATE_MAIN];

/// Workbook relationships whose targets are interpreted or regenerated, and
/// so never carried over.
const CONSUMED_RELATIONSHIPS: [&str; 5] = [
    rt::WORKSHEET,
    rt::CHARTSHEET,
    rt::STYLES,
    rt::SHARED_STRINGS,
    rt::CALC_CHAIN,
];

/// The ZIP bytes of a package: the source itself, or the plaintext view of
/// an encrypted one.
pub enum PackageSource<R> {
    Plain(R),
    #[cfg(feature = "ooxml_encryption")]
    Decrypted(DecryptingReader<io::Cursor<Vec<u8>>>),
}

impl<R: Read + Seek> Read for PackageSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            PackageSource::Plain(r) => r.read(buf),
            #[cfg(feature = "ooxml_encryption")]
            PackageSource::Decrypted(r) => r.read(buf),
        }
    }
}

impl<R: Read + Seek> Seek for PackageSource<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            PackageSource::Plain(r) => r.seek(pos),
            #[cfg(feature = "ooxml_encryption")]
            PackageSource::Decrypted(r) => r.seek(pos),
        }
    }
}

/// An open workbook package.
///
/// Everything except the worksheets is loaded by [`open`](Self::open).
/// Worksheets are streamed with [`begin_worksheet`](Self::begin_worksheet);
/// the returned cursor borrows the reader, so only one is open at a time.
pub struct WorkbookReader<R: Read + Seek> {
    archive: ZipArchive<PackageSource<R>>,
    verify_checksums: bool,
    manifest: Manifest,
    workbook_uri: PackURI,
    workbook: WorkbookPart,
    stylesheet: Stylesheet,
    shared_strings: SharedStrings,
    preserved: Vec<PreservedPart>,
}

impl<R: Read + Seek> WorkbookReader<R> {
    /// Open a package, decrypting it first if it is a compound file.
    ///
    /// A missing stylesheet or shared string table is not an error; the
    /// defaults are used. A package without a workbook part is
    /// [`OoxmlError::InvalidPackage`].
    pub fn open(source: R, options: LoadOptions) -> Result<Self> {
        let source = open_source(source, &options)?;
        let mut archive = ZipArchive::new(source)?;
        let verify = options.verify_checksums;
        log::debug!("package has {} entries", archive.len());

        let content_types_uri = PackURI::from_member_name("[Content_Types].xml");
        let content_types = match read_xml_part(&mut archive, &content_types_uri, verify) {
            Ok(xml) => ContentTypes::from_xml(&xml)?,
            Err(OoxmlError::EntryNotFound(_)) => {
                return Err(OoxmlError::InvalidPackage(
                    "[Content_Types].xml is missing".to_string(),
                ));
            },
            Err(e) => return Err(e),
        };
        let mut manifest = Manifest::with_content_types(content_types);

        let package = PackURI::package();
        let root_rels = read_relationships(&mut archive, &package, verify)?
            .ok_or_else(|| OoxmlError::InvalidPackage("_rels/.rels is missing".to_string()))?;
        manifest.set_relationships(root_rels);

        let workbook_uri = related_part(&manifest, &package, rt::OFFICE_DOCUMENT)?
            .ok_or_else(|| OoxmlError::InvalidPackage("package has no office document".to_string()))?;
        if !archive.contains(workbook_uri.membername()) {
            return Err(OoxmlError::InvalidPackage(format!(
                "office document {} is missing",
                workbook_uri
            )));
        }
        let workbook_type = manifest.content_type_of(&workbook_uri)?;
        if !WORKBOOK_CONTENT_TYPES.contains(&workbook_type) {
            return Err(OoxmlError::InvalidPackage(format!(
                "{} is {}, not a workbook",
                workbook_uri, workbook_type
            )));
        }
        log::debug!("workbook part {} ({})", workbook_uri, workbook_type);

        if let Some(rels) = read_relationships(&mut archive, &workbook_uri, verify)? {
            manifest.set_relationships(rels);
        }

        let styles_uri = related_part(&manifest, &workbook_uri, rt::STYLES)?;
        let stylesheet = match read_optional_xml(&mut archive, styles_uri.as_ref(), verify)? {
            Some(xml) => Stylesheet::parse(&xml)?,
            None => {
                log::debug!("no stylesheet; using the default one");
                Stylesheet::default()
            },
        };

        let strings_uri = related_part(&manifest, &workbook_uri, rt::SHARED_STRINGS)?;
        let shared_strings = match read_optional_xml(&mut archive, strings_uri.as_ref(), verify)? {
            Some(xml) => SharedStrings::parse(&xml)?,
            None => SharedStrings::new(),
        };
        log::debug!("{} shared strings", shared_strings.len());

        let mut workbook = WorkbookPart::parse(&read_xml_part(&mut archive, &workbook_uri, verify)?)?;
        workbook.sheets.retain(|sheet| {
            match manifest.relationship(&workbook_uri, &sheet.relationship_id) {
                Ok(rel) if rel.reltype() == rt::WORKSHEET => true,
                Ok(rel) => {
                    log::warn!(
                        "sheet '{}' is a {} and is skipped",
                        sheet.title,
                        rel.reltype().rsplit('/').next().unwrap_or_default()
                    );
                    false
                },
                Err(e) => {
                    log::warn!("sheet '{}' is skipped: {}", sheet.title, e);
                    false
                },
            }
        });

        let preserved = if options.preserve_unknown_parts {
            let mut consumed: HashSet<PackURI> = HashSet::from([
                content_types_uri,
                package.rels_uri(),
                workbook_uri.clone(),
                workbook_uri.rels_uri(),
            ]);
            if let Some(rels) = manifest.relationships(&workbook_uri) {
                for rel in rels.iter().filter(|r| CONSUMED_RELATIONSHIPS.contains(&r.reltype())) {
                    if let Ok(target) = rel.target_partname() {
                        consumed.insert(target.rels_uri());
                        consumed.insert(target);
                    }
                }
            }
            let mut roots = vec![
                (RelationshipSource::Package, package.clone()),
                (RelationshipSource::Workbook, workbook_uri.clone()),
            ];
            for sheet in &workbook.sheets {
                let part = manifest
                    .relationship(&workbook_uri, &sheet.relationship_id)?
                    .target_partname()?;
                if let Some(rels) = read_relationships(&mut archive, &part, verify)? {
                    manifest.set_relationships(rels);
                    roots.push((RelationshipSource::Worksheet(sheet.title.clone()), part));
                }
            }
            collect_preserved(&mut archive, &manifest, &roots, &consumed, verify)?
        } else {
            Vec::new()
        };
        log::debug!("{} parts preserved", preserved.len());

        Ok(Self {
            archive,
            verify_checksums: verify,
            manifest,
            workbook_uri,
            workbook,
            stylesheet,
            shared_strings,
            preserved,
        })
    }

    /// Titles of the worksheets, in workbook order.
    pub fn sheet_titles(&self) -> impl Iterator<Item = &str> {
        self.workbook.sheets.iter().map(|s| s.title.as_str())
    }

    /// True if a worksheet has this title, compared case-insensitively.
    pub fn has_worksheet(&self, title: &str) -> bool {
        self.workbook.sheet(title).is_some()
    }

    /// Start streaming the cells of a worksheet.
    pub fn begin_worksheet(
        &mut self,
        title: &str,
    ) -> Result<WorksheetReader<'_, BufReader<EntryReader<'_, PackageSource<R>>>>> {
        let sheet = self
            .workbook
            .sheet(title)
            .ok_or_else(|| OoxmlError::EntryNotFound(format!("worksheet '{}'", title)))?;
        let part = self
            .manifest
            .relationship(&self.workbook_uri, &sheet.relationship_id)?
            .target_partname()?;
        log::debug!("streaming worksheet '{}' from {}", sheet.title, part);

        let options = ReadOptions::new().with_verify_checksums(self.verify_checksums);
        let entry = self.archive.read_entry_with(part.membername(), options)?;
        WorksheetReader::new(BufReader::new(entry), &self.shared_strings)
    }

    pub fn workbook(&self) -> &WorkbookPart {
        &self.workbook
    }

    pub fn stylesheet(&self) -> &Stylesheet {
        &self.stylesheet
    }

    pub fn shared_strings(&self) -> &SharedStrings {
        &self.shared_strings
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Part name of the workbook, usually `/xl/workbook.xml`.
    pub fn workbook_part(&self) -> &PackURI {
        &self.workbook_uri
    }

    /// Parts carried through without interpretation.
    pub fn preserved_parts(&self) -> &[PreservedPart] {
        &self.preserved
    }

    pub(crate) fn into_parts(self) -> (WorkbookPart, Stylesheet, Vec<PreservedPart>) {
        (self.workbook, self.stylesheet, self.preserved)
    }
}

/// Wrap the source, decrypting it when it starts with the compound file
/// signature.
fn open_source<R: Read + Seek>(mut source: R, options: &LoadOptions) -> Result<PackageSource<R>> {
    let start = source.stream_position()?;
    let mut magic = [0u8; 8];
    let mut filled = 0;
    while filled < magic.len() {
        match source.read(&mut magic[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    source.seek(SeekFrom::Start(start))?;
    if filled < magic.len() || magic != COMPOUND_FILE_MAGIC {
        return Ok(PackageSource::Plain(source));
    }
    decrypt_source(source, options)
}

#[cfg(feature = "ooxml_encryption")]
fn decrypt_source<R: Read + Seek>(mut source: R, options: &LoadOptions) -> Result<PackageSource<R>> {
    let mut data = Vec::new();
    source.read_to_end(&mut data)?;
    if !crypto::detect(&data) {
        return Err(OoxmlError::InvalidPackage(
            "compound file without an EncryptionInfo stream".to_string(),
        ));
    }
    if options.password.is_none() {
        log::debug!("encrypted package and no password; trying the empty password");
    }
    let password = options.password.as_deref().unwrap_or_default();
    let reader = crypto::decrypt(&data, password, options.verify_integrity)?;
    Ok(PackageSource::Decrypted(reader))
}

#[cfg(not(feature = "ooxml_encryption"))]
fn decrypt_source<R: Read + Seek>(_source: R, _options: &LoadOptions) -> Result<PackageSource<R>> {
    Err(OoxmlError::UnsupportedEncryption(
        "encrypted packages need the ooxml_encryption feature".to_string(),
    ))
}

/// Read a whole part. Unless `verify` is set, a CRC mismatch is logged and
/// the part is read again without the check.
fn read_part<S: Read + Seek>(archive: &mut ZipArchive<S>, part: &PackURI, verify: bool) -> Result<Vec<u8>> {
    match archive.read(part.membername()) {
        Err(e) if !verify && matches!(e.kind(), ErrorKind::ChecksumMismatch { .. }) => {
            log::warn!("{}; reading {} anyway", e, part);
            let lenient = ReadOptions::new().with_verify_checksums(false);
            Ok(archive.read_with(part.membername(), lenient)?)
        },
        read => Ok(read?),
    }
}

fn read_xml_part<S: Read + Seek>(archive: &mut ZipArchive<S>, part: &PackURI, verify: bool) -> Result<String> {
    let bytes = read_part(archive, part, verify)?;
    let mut xml = String::from_utf8(bytes)
        .map_err(|e| OoxmlError::InvalidFormat(format!("{} is not UTF-8: {}", part, e)))?;
    if xml.starts_with('\u{feff}') {
        xml.drain(..'\u{feff}'.len_utf8());
    }
    Ok(xml)
}

/// Read a part named by a relationship, if the relationship exists and its
/// target is in the archive.
fn read_optional_xml<S: Read + Seek>(
    archive: &mut ZipArchive<S>,
    part: Option<&PackURI>,
    verify: bool,
) -> Result<Option<String>> {
    let Some(part) = part else {
        return Ok(None);
    };
    if !archive.contains(part.membername()) {
        log::warn!("relationship target {} is not in the package", part);
        return Ok(None);
    }
    read_xml_part(archive, part, verify).map(Some)
}

/// Relationships of `source`, or `None` if it has no `.rels` part.
fn read_relationships<S: Read + Seek>(
    archive: &mut ZipArchive<S>,
    source: &PackURI,
    verify: bool,
) -> Result<Option<Relationships>> {
    let rels_uri = source.rels_uri();
    if !archive.contains(rels_uri.membername()) {
        return Ok(None);
    }
    let xml = read_xml_part(archive, &rels_uri, verify)?;
    Ok(Some(Relationships::from_xml(source.clone(), &xml)?))
}

/// Target of the single relationship of `reltype` from `source`.
fn related_part(manifest: &Manifest, source: &PackURI, reltype: &str) -> Result<Option<PackURI>> {
    match manifest.relationship_by_type(source, reltype) {
        Ok(rel) => Ok(Some(rel.target_partname()?)),
        Err(OpcError::RelationshipNotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Gather every part reachable from the relationships of `roots` that is
/// not in `consumed`, following the `.rels` of each part found.
fn collect_preserved<S: Read + Seek>(
    archive: &mut ZipArchive<S>,
    manifest: &Manifest,
    roots: &[(RelationshipSource, PackURI)],
    consumed: &HashSet<PackURI>,
    verify: bool,
) -> Result<Vec<PreservedPart>> {
    let mut parts: Vec<PreservedPart> = Vec::new();
    let mut index: HashMap<PackURI, usize> = HashMap::new();
    let mut pending: Vec<usize> = Vec::new();

    for (source, source_uri) in roots {
        let Some(rels) = manifest.relationships(source_uri) else {
            continue;
        };
        for rel in rels.iter() {
            if rel.is_external() {
                log::warn!(
                    "external relationship {} from {} is dropped",
                    rel.r_id(),
                    source_uri
                );
                continue;
            }
            let Ok(target) = rel.target_partname() else {
                log::warn!("relationship {} from {} has an unusable target", rel.r_id(), source_uri);
                continue;
            };
            if consumed.contains(&target) {
                continue;
            }
            let incoming = IncomingRelationship {
                source: source.clone(),
                id: rel.r_id().to_string(),
                reltype: rel.reltype().to_string(),
            };
            if let Some(&i) = index.get(&target) {
                parts[i].incoming.push(incoming);
                continue;
            }
            if let Some(mut part) = load_part(archive, manifest, &target, verify)? {
                part.incoming.push(incoming);
                index.insert(target, parts.len());
                pending.push(parts.len());
                parts.push(part);
            }
        }
    }

    while let Some(i) = pending.pop() {
        let source_uri = parts[i].name.clone();
        let rels_uri = source_uri.rels_uri();
        if index.contains_key(&rels_uri) || !archive.contains(rels_uri.membername()) {
            continue;
        }
        let Some(rels_part) = load_part(archive, manifest, &rels_uri, verify)? else {
            continue;
        };
        let rels = std::str::from_utf8(&rels_part.data)
            .map_err(|e| OpcError::XmlError(e.to_string()))
            .and_then(|xml| Relationships::from_xml(source_uri.clone(), xml));
        index.insert(rels_uri, parts.len());
        parts.push(rels_part);

        let rels = match rels {
            Ok(rels) => rels,
            Err(e) => {
                log::warn!("relationships of {} kept unread: {}", source_uri, e);
                continue;
            },
        };
        for rel in rels.iter().filter(|r| !r.is_external()) {
            let Ok(target) = rel.target_partname() else {
                continue;
            };
            if consumed.contains(&target) || index.contains_key(&target) {
                continue;
            }
            if let Some(part) = load_part(archive, manifest, &target, verify)? {
                index.insert(target, parts.len());
                pending.push(parts.len());
                parts.push(part);
            }
        }
    }
    Ok(parts)
}

fn load_part<S: Read + Seek>(
    archive: &mut ZipArchive<S>,
    manifest: &Manifest,
    part: &PackURI,
    verify: bool,
) -> Result<Option<PreservedPart>> {
    if !archive.contains(part.membername()) {
        log::warn!("relationship target {} is not in the package", part);
        return Ok(None);
    }
    let content_type = match manifest.content_type_of(part) {
        Ok(content_type) => content_type.to_string(),
        Err(e) => {
            log::warn!("{} is dropped: {}", part, e);
            return Ok(None);
        },
    };
    log::debug!("preserving {} ({})", part, content_type);
    let data = read_part(archive, part, verify)?;
    Ok(Some(PreservedPart::new(part.clone(), content_type, data)))
}
