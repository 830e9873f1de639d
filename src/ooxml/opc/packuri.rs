//! Part names inside a package.
//!
//! A [`PackURI`] is the absolute, forward-slash form of a part name
//! (`/xl/worksheets/sheet1.xml`). The matching ZIP entry name is the same
//! string without the leading slash (the *member name*).

use std::fmt;

use super::error::{OpcError, Result};

/// The package pseudo-partname, source of the root relationships
pub const PACKAGE_URI: &str = "/";

/// The `[Content_Types].xml` part
pub const CONTENT_TYPES_URI: &str = "/[Content_Types].xml";

/// Absolute part name within a package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackURI {
    uri: String,
}

impl PackURI {
    /// Wrap an absolute part name. It must begin with `/`.
    pub fn new<S: Into<String>>(uri: S) -> Result<Self> {
        let uri = uri.into();
        if !uri.starts_with('/') {
            return Err(OpcError::InvalidPackUri(format!(
                "PackURI must begin with slash, got '{}'",
                uri
            )));
        }
        Ok(PackURI { uri })
    }

    /// The package pseudo-part `/`.
    pub fn package() -> Self {
        PackURI {
            uri: PACKAGE_URI.to_string(),
        }
    }

    /// Part name for a ZIP member name. Backslashes are treated as separators.
    pub fn from_member_name(name: &str) -> Self {
        let cleaned = name.replace('\\', "/");
        PackURI {
            uri: normalize_path(&format!("/{}", cleaned.trim_start_matches('/'))),
        }
    }

    /// Resolve a relationship target against the directory of its source part.
    ///
    /// Absolute targets (`/xl/styles.xml`) ignore `base_uri`. `.` and `..`
    /// segments are collapsed; `..` never climbs above the package root.
    pub fn from_rel_ref(base_uri: &str, relative_ref: &str) -> Result<Self> {
        let target = relative_ref.replace('\\', "/");
        let target = strip_fragment(&target);
        if target.is_empty() {
            return Err(OpcError::InvalidPackUri(format!(
                "Empty relationship target relative to '{}'",
                base_uri
            )));
        }
        let joined = if target.starts_with('/') {
            target.to_string()
        } else if base_uri.ends_with('/') {
            format!("{}{}", base_uri, target)
        } else {
            format!("{}/{}", base_uri, target)
        };
        Self::new(normalize_path(&joined))
    }

    /// Directory portion: `/xl/worksheets` for `/xl/worksheets/sheet1.xml`.
    pub fn base_uri(&self) -> &str {
        match self.uri.rfind('/') {
            Some(0) | None => "/",
            Some(pos) => &self.uri[..pos],
        }
    }

    /// Last path segment, empty for `/`.
    pub fn filename(&self) -> &str {
        match self.uri.rfind('/') {
            Some(pos) => &self.uri[pos + 1..],
            None => "",
        }
    }

    /// Extension without the dot, empty if there is none.
    pub fn ext(&self) -> &str {
        let filename = self.filename();
        match filename.rfind('.') {
            Some(pos) => &filename[pos + 1..],
            None => "",
        }
    }

    /// Trailing number of the file stem: 3 for `/xl/worksheets/sheet3.xml`.
    pub fn idx(&self) -> Option<u32> {
        let filename = self.filename();
        let stem = match filename.rfind('.') {
            Some(pos) => &filename[..pos],
            None => filename,
        };
        let digits = stem.len() - stem.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 || digits == stem.len() {
            return None;
        }
        atoi_simd::parse::<u32, false, false>(&stem.as_bytes()[stem.len() - digits..]).ok()
    }

    /// ZIP entry name: the part name without its leading slash.
    pub fn membername(&self) -> &str {
        &self.uri[1..]
    }

    /// Relative reference from the directory `base_uri` to this part.
    ///
    /// `/xl/styles.xml` seen from `/xl/worksheets` is `../styles.xml`.
    pub fn relative_ref(&self, base_uri: &str) -> String {
        if base_uri == "/" {
            return self.membername().to_string();
        }

        let from: Vec<&str> = base_uri.split('/').filter(|s| !s.is_empty()).collect();
        let to: Vec<&str> = self.uri.split('/').filter(|s| !s.is_empty()).collect();
        // The last segment of `to` is the file name; never share it with a directory.
        let common = from
            .iter()
            .zip(to.iter().take(to.len().saturating_sub(1)))
            .take_while(|(a, b)| a == b)
            .count();

        let mut parts: Vec<&str> = std::iter::repeat_n("..", from.len() - common).collect();
        parts.extend_from_slice(&to[common..]);
        parts.join("/")
    }

    /// The relationships part belonging to this part.
    ///
    /// `/xl/_rels/workbook.xml.rels` for `/xl/workbook.xml`, and
    /// `/_rels/.rels` for the package itself.
    pub fn rels_uri(&self) -> PackURI {
        let base = self.base_uri();
        let uri = if base == "/" {
            format!("/_rels/{}.rels", self.filename())
        } else {
            format!("{}/_rels/{}.rels", base, self.filename())
        };
        PackURI { uri }
    }

    /// True for `*.rels` parts inside a `_rels` directory.
    pub fn is_rels_part(&self) -> bool {
        self.ext().eq_ignore_ascii_case("rels")
            && (self.base_uri() == "/_rels" || self.base_uri().ends_with("/_rels"))
    }

    /// The part whose relationships this `.rels` part holds.
    pub fn rels_source(&self) -> Option<PackURI> {
        if !self.is_rels_part() {
            return None;
        }
        let filename = self.filename();
        let source_name = &filename[..filename.len() - ".rels".len()];
        let dir = self.base_uri();
        let parent = &dir[..dir.len() - "_rels".len()];
        let uri = if source_name.is_empty() {
            PACKAGE_URI.to_string()
        } else {
            format!("{}{}", parent, source_name)
        };
        Some(PackURI { uri })
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.uri
    }
}

fn strip_fragment(target: &str) -> &str {
    match target.find('#') {
        Some(pos) => &target[..pos],
        None => target,
    }
}

/// Collapse empty, `.` and `..` segments of an absolute path.
pub(crate) fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {},
            ".." => {
                parts.pop();
            },
            _ => parts.push(part),
        }
    }
    format!("/{}", parts.join("/"))
}

impl fmt::Display for PackURI {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

impl AsRef<str> for PackURI {
    fn as_ref(&self) -> &str {
        &self.uri
    }
}
