//! FAT and DIFAT construction.
//!
//! Sectors are handed out sequentially, so every chain is contiguous. The
//! FAT marks its own sectors with `FATSECT` and DIFAT sectors with `DIFSECT`.

use super::super::consts::*;
use super::pack_u32_sectors;

#[derive(Debug, Default)]
pub(super) struct FatBuilder {
    fat: Vec<u32>,
}

impl FatBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a chain long enough for `size` bytes; returns its first sector
    /// or `ENDOFCHAIN` when `size` is zero.
    pub fn allocate_chain(&mut self, size: usize) -> u32 {
        if size == 0 {
            return ENDOFCHAIN;
        }
        let count = size.div_ceil(SECTOR_SIZE) as u32;
        let start = self.fat.len() as u32;
        self.fat.extend((start + 1)..(start + count));
        self.fat.push(ENDOFCHAIN);
        start
    }

    /// Reserve `count` sectors marked with `marker` (`FATSECT` or `DIFSECT`).
    pub fn allocate_special(&mut self, count: u32, marker: u32) -> u32 {
        if count == 0 {
            return ENDOFCHAIN;
        }
        let start = self.fat.len() as u32;
        self.fat.extend(std::iter::repeat_n(marker, count as usize));
        start
    }

    pub fn total_sectors(&self) -> u32 {
        self.fat.len() as u32
    }

    /// Work out how many FAT and DIFAT sectors are needed to describe every
    /// sector including themselves.
    pub fn plan_table_sectors(&self) -> (u32, u32) {
        let per_fat = (SECTOR_SIZE / 4) as u32;
        let per_difat = per_fat - 1;
        let used = self.total_sectors();
        let (mut n_fat, mut n_difat) = (0u32, 0u32);
        loop {
            let fat = (used + n_fat + n_difat).div_ceil(per_fat);
            let difat = fat
                .saturating_sub(HEADER_DIFAT_ENTRIES as u32)
                .div_ceil(per_difat);
            if fat == n_fat && difat == n_difat {
                return (n_fat, n_difat);
            }
            n_fat = fat;
            n_difat = difat;
        }
    }

    pub fn generate_fat_sectors(&self) -> Vec<Vec<u8>> {
        pack_u32_sectors(&self.fat)
    }

    #[cfg(test)]
    pub fn fat(&self) -> &[u32] {
        &self.fat
    }
}

/// DIFAT sectors holding the FAT sector ids that do not fit in the header.
/// Each sector ends with the id of the next DIFAT sector.
pub(super) fn generate_difat_sectors(fat_sector_ids: &[u32], first_difat_sector: u32) -> Vec<Vec<u8>> {
    if fat_sector_ids.len() <= HEADER_DIFAT_ENTRIES {
        return Vec::new();
    }
    let per_difat = SECTOR_SIZE / 4 - 1;
    let overflow = &fat_sector_ids[HEADER_DIFAT_ENTRIES..];
    let count = overflow.len().div_ceil(per_difat);
    overflow
        .chunks(per_difat)
        .enumerate()
        .map(|(i, ids)| {
            let mut sector = vec![0xFFu8; SECTOR_SIZE];
            for (j, id) in ids.iter().enumerate() {
                sector[j * 4..j * 4 + 4].copy_from_slice(&id.to_le_bytes());
            }
            let next = if i + 1 < count {
                first_difat_sector + i as u32 + 1
            } else {
                ENDOFCHAIN
            };
            sector[SECTOR_SIZE - 4..].copy_from_slice(&next.to_le_bytes());
            sector
        })
        .collect()
}
