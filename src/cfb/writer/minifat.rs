//! Mini stream allocation for streams below the 4096-byte cutoff.

use super::super::consts::*;
use super::pack_u32_sectors;

#[derive(Debug, Default)]
pub(super) struct MiniFatBuilder {
    minifat: Vec<u32>,
    /// Concatenated small streams, each padded to a mini sector
    ministream: Vec<u8>,
}

impl MiniFatBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `data` to the mini stream; returns its first mini sector.
    pub fn allocate_mini_chain(&mut self, data: &[u8]) -> u32 {
        if data.is_empty() {
            return ENDOFCHAIN;
        }
        let count = data.len().div_ceil(MINI_SECTOR_SIZE) as u32;
        let start = self.minifat.len() as u32;
        self.minifat.extend((start + 1)..(start + count));
        self.minifat.push(ENDOFCHAIN);

        let offset = self.ministream.len();
        self.ministream.extend_from_slice(data);
        self.ministream.resize(offset + count as usize * MINI_SECTOR_SIZE, 0);
        start
    }

    pub fn ministream(&self) -> &[u8] {
        &self.ministream
    }

    pub fn is_empty(&self) -> bool {
        self.minifat.is_empty()
    }

    pub fn generate_minifat_sectors(&self) -> Vec<Vec<u8>> {
        pack_u32_sectors(&self.minifat)
    }
}
