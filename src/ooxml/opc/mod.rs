//! Package manifest: part names, content types and relationships.
//!
//! This is the Open Packaging Conventions layer of a spreadsheet package. It
//! knows nothing about ZIP or worksheets; the assembler feeds it the contents
//! of `[Content_Types].xml` and every `.rels` part, then asks it which part
//! plays which role.

pub mod constants;
pub mod content_types;
pub mod error;
pub mod manifest;
pub mod packuri;
pub mod rel;

pub use content_types::ContentTypes;
pub use error::{OpcError, Result};
pub use manifest::{Manifest, canonicalize};
pub use packuri::{CONTENT_TYPES_URI, PACKAGE_URI, PackURI};
pub use rel::{Relationship, Relationships, TargetMode};
