//! Compound file writer.
//!
//! Streams and storages are buffered in memory and laid out on
//! [`CompoundFileWriter::write_to`]: large streams first, then the mini stream,
//! the directory, the MiniFAT, DIFAT and finally the FAT.

mod directory;
mod fat;
mod header;
mod minifat;

#[cfg(test)]
mod tests;

use super::CfbError;
use super::consts::*;
use directory::DirectoryBuilder;
use fat::{FatBuilder, generate_difat_sectors};
use header::HeaderBuilder;
use minifat::MiniFatBuilder;
use std::io::{Cursor, Seek, SeekFrom, Write};

/// Serialize a u32 table into 512-byte sectors padded with `FREESECT`.
fn pack_u32_sectors(table: &[u32]) -> Vec<Vec<u8>> {
    table
        .chunks(SECTOR_SIZE / 4)
        .map(|chunk| {
            let mut sector = vec![0xFFu8; SECTOR_SIZE];
            for (i, value) in chunk.iter().enumerate() {
                sector[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
            }
            sector
        })
        .collect()
}

/// Builds a version 3 compound file in memory.
#[derive(Debug, Default)]
pub struct CompoundFileWriter {
    /// Streams in insertion order
    streams: Vec<(Vec<String>, Vec<u8>)>,
    storages: Vec<Vec<String>>,
}

impl CompoundFileWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a stream; parent storages are created implicitly.
    pub fn create_stream(&mut self, path: &[&str], data: &[u8]) -> Result<(), CfbError> {
        let owned = owned_path(path)?;
        match self.streams.iter_mut().find(|(p, _)| *p == owned) {
            Some((_, existing)) => *existing = data.to_vec(),
            None => self.streams.push((owned, data.to_vec())),
        }
        Ok(())
    }

    /// Declare a storage, so that it exists even with no streams inside.
    pub fn create_storage(&mut self, path: &[&str]) -> Result<(), CfbError> {
        let owned = owned_path(path)?;
        if !self.storages.contains(&owned) {
            self.storages.push(owned);
        }
        Ok(())
    }

    pub fn write_to<W: Write + Seek>(&self, writer: &mut W) -> Result<(), CfbError> {
        let mut fat = FatBuilder::new();
        let mut minifat = MiniFatBuilder::new();

        let mut placed: Vec<(&[String], u32, u64)> = Vec::with_capacity(self.streams.len());
        let mut large: Vec<(u32, &[u8])> = Vec::new();
        for (path, data) in &self.streams {
            if data.len() >= MINI_STREAM_CUTOFF as usize {
                let start = fat.allocate_chain(data.len());
                large.push((start, data.as_slice()));
                placed.push((path.as_slice(), start, data.len() as u64));
            }
        }
        for (path, data) in &self.streams {
            if data.len() < MINI_STREAM_CUTOFF as usize {
                let start = minifat.allocate_mini_chain(data);
                placed.push((path.as_slice(), start, data.len() as u64));
            }
        }

        let ministream_start = fat.allocate_chain(minifat.ministream().len());
        let mut directory =
            DirectoryBuilder::new(ministream_start, minifat.ministream().len() as u64);
        for storage in &self.storages {
            directory.add_storage_path(storage);
        }
        for (path, start, size) in &placed {
            directory.add_stream_path(path, *start, *size);
        }
        let dir_stream = directory.generate_directory_stream();
        let dir_start = fat.allocate_chain(dir_stream.len());

        let minifat_sectors = minifat.generate_minifat_sectors();
        let minifat_start = fat.allocate_chain(minifat_sectors.len() * SECTOR_SIZE);

        let (n_fat, n_difat) = fat.plan_table_sectors();
        let difat_start = fat.allocate_special(n_difat, DIFSECT);
        let fat_start = fat.allocate_special(n_fat, FATSECT);
        let fat_ids: Vec<u32> = (fat_start..fat_start + n_fat).collect();
        let fat_sectors = fat.generate_fat_sectors();
        if fat_sectors.len() != n_fat as usize {
            return Err(CfbError::InvalidFormat(format!(
                "FAT needs {} sectors, {} were reserved",
                fat_sectors.len(),
                n_fat
            )));
        }
        let difat_sectors = generate_difat_sectors(&fat_ids, difat_start);

        let header = HeaderBuilder {
            first_dir_sector: dir_start,
            first_minifat_sector: minifat_start,
            num_minifat_sectors: minifat_sectors.len() as u32,
            first_difat_sector: difat_start,
            num_difat_sectors: n_difat,
            fat_sectors: fat_ids,
        };

        writer.seek(SeekFrom::Start(0))?;
        writer.write_all(&header.generate())?;
        for (start, data) in large {
            write_padded(writer, start, data)?;
        }
        write_padded(writer, ministream_start, minifat.ministream())?;
        write_padded(writer, dir_start, &dir_stream)?;
        write_padded(writer, minifat_start, &minifat_sectors.concat())?;
        write_padded(writer, difat_start, &difat_sectors.concat())?;
        write_padded(writer, fat_start, &fat_sectors.concat())?;
        writer.flush()?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CfbError> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_to(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

fn owned_path(path: &[&str]) -> Result<Vec<String>, CfbError> {
    if path.is_empty() {
        return Err(CfbError::InvalidFormat("Empty path".to_string()));
    }
    if let Some(long) = path.iter().find(|name| name.encode_utf16().count() > 31) {
        return Err(CfbError::InvalidFormat(format!(
            "Name longer than 31 characters: {}",
            long
        )));
    }
    Ok(path.iter().map(|s| s.to_string()).collect())
}

/// Write `data` at sector `start`, zero-padded to a whole sector.
fn write_padded<W: Write + Seek>(writer: &mut W, start: u32, data: &[u8]) -> Result<(), CfbError> {
    if start == ENDOFCHAIN || data.is_empty() {
        return Ok(());
    }
    writer.seek(SeekFrom::Start((start as u64 + 1) * SECTOR_SIZE as u64))?;
    writer.write_all(data)?;
    let tail = data.len() % SECTOR_SIZE;
    if tail != 0 {
        writer.write_all(&[0u8; SECTOR_SIZE][..SECTOR_SIZE - tail])?;
    }
    Ok(())
}
