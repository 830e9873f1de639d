/// Compression method of an archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    /// Stored without compression (method 0).
    Store,
    /// Raw DEFLATE stream (method 8).
    Deflate,
    /// Any other method id; readable only as an error.
    Other(u16),
}

impl CompressionMethod {
    #[inline]
    pub fn from_id(id: u16) -> Self {
        match id {
            0 => CompressionMethod::Store,
            8 => CompressionMethod::Deflate,
            other => CompressionMethod::Other(other),
        }
    }

    #[inline]
    pub fn as_u16(self) -> u16 {
        match self {
            CompressionMethod::Store => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Other(id) => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_roundtrip() {
        for id in [0u16, 8, 12, 93] {
            assert_eq!(CompressionMethod::from_id(id).as_u16(), id);
        }
        assert_eq!(CompressionMethod::from_id(8), CompressionMethod::Deflate);
    }
}
