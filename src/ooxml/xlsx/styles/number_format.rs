//! Number format definitions.
//!
//! Ids below 164 are reserved for the builtin formats every consumer knows;
//! those are recognized by id and code and never written to `<numFmts>`.

use phf::phf_map;

/// First id available to custom formats.
pub const FIRST_CUSTOM_ID: u32 = 164;

static BUILTIN_FORMATS: phf::Map<u32, &'static str> = phf_map! {
    0u32 => "General",
    1u32 => "0",
    2u32 => "0.00",
    3u32 => "#,##0",
    4u32 => "#,##0.00",
    9u32 => "0%",
    10u32 => "0.00%",
    11u32 => "0.00E+00",
    12u32 => "# ?/?",
    13u32 => "# ??/??",
    14u32 => "mm-dd-yy",
    15u32 => "d-mmm-yy",
    16u32 => "d-mmm",
    17u32 => "mmm-yy",
    18u32 => "h:mm AM/PM",
    19u32 => "h:mm:ss AM/PM",
    20u32 => "h:mm",
    21u32 => "h:mm:ss",
    22u32 => "m/d/yy h:mm",
    37u32 => "#,##0 ;(#,##0)",
    38u32 => "#,##0 ;[Red](#,##0)",
    39u32 => "#,##0.00;(#,##0.00)",
    40u32 => "#,##0.00;[Red](#,##0.00)",
    45u32 => "mm:ss",
    46u32 => "[h]:mm:ss",
    47u32 => "mmss.0",
    48u32 => "##0.0E+0",
    49u32 => "@",
};

/// Number format information.
///
/// Excel number formats control how cell values are displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NumberFormat {
    pub id: u32,
    /// Format code (e.g., "General", "0.00", "mm/dd/yyyy")
    pub code: String,
}

impl NumberFormat {
    #[inline]
    pub fn new(id: u32, code: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
        }
    }

    /// The builtin format with `id`, if there is one.
    pub fn builtin(id: u32) -> Option<Self> {
        builtin_format_code(id).map(|code| Self::new(id, code))
    }

    /// Check if this is a built-in format (ID < 164).
    #[inline]
    pub fn is_builtin(&self) -> bool {
        self.id < FIRST_CUSTOM_ID
    }
}

/// Get the format code for a built-in number format ID.
pub fn builtin_format_code(id: u32) -> Option<&'static str> {
    BUILTIN_FORMATS.get(&id).copied()
}

/// Id of the builtin format with exactly this code.
pub fn builtin_format_id(code: &str) -> Option<u32> {
    BUILTIN_FORMATS
        .entries()
        .filter(|(_, c)| **c == code)
        .map(|(id, _)| *id)
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_format_code() {
        assert_eq!(builtin_format_code(0), Some("General"));
        assert_eq!(builtin_format_code(14), Some("mm-dd-yy"));
        assert_eq!(builtin_format_code(22), Some("m/d/yy h:mm"));
        assert_eq!(builtin_format_code(999), None);
    }

    #[test]
    fn builtin_lookup_by_code() {
        assert_eq!(builtin_format_id("0"), Some(1));
        assert_eq!(builtin_format_id("@"), Some(49));
        assert_eq!(builtin_format_id("0.000"), None);
        assert!(NumberFormat::builtin(9).unwrap().is_builtin());
        assert!(!NumberFormat::new(FIRST_CUSTOM_ID, "0.000").is_builtin());
    }
}
