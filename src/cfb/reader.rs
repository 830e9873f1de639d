use super::CfbError;
use super::consts::*;
use encoding_rs::UTF_16LE;
use std::io::{Read, Seek, SeekFrom};
use zerocopy::{FromBytes, LE, U16, U32, U64};
use zerocopy_derive::FromBytes as DeriveFromBytes;

/// On-disk compound file header (first 512 bytes).
#[derive(Debug, Clone, DeriveFromBytes)]
#[repr(C)]
struct RawHeader {
    magic: [u8; 8],
    clsid: [u8; 16],
    minor_version: U16<LE>,
    major_version: U16<LE>,
    byte_order: U16<LE>,
    sector_shift: U16<LE>,
    mini_sector_shift: U16<LE>,
    reserved: [u8; 6],
    num_dir_sectors: U32<LE>,
    num_fat_sectors: U32<LE>,
    first_dir_sector: U32<LE>,
    transaction_signature: U32<LE>,
    mini_stream_cutoff: U32<LE>,
    first_minifat_sector: U32<LE>,
    num_minifat_sectors: U32<LE>,
    first_difat_sector: U32<LE>,
    num_difat_sectors: U32<LE>,
    difat: [U32<LE>; HEADER_DIFAT_ENTRIES],
}

/// On-disk directory entry (128 bytes).
#[derive(Debug, Clone, DeriveFromBytes)]
#[repr(C)]
struct RawDirectoryEntry {
    /// Entry name in UTF-16LE, null-padded
    name: [u8; 64],
    /// Length of name in bytes including the null terminator
    name_len: U16<LE>,
    entry_type: u8,
    node_color: u8,
    sid_left: U32<LE>,
    sid_right: U32<LE>,
    sid_child: U32<LE>,
    clsid: [u8; 16],
    state_bits: U32<LE>,
    creation_time: U64<LE>,
    modified_time: U64<LE>,
    start_sector: U32<LE>,
    stream_size: U64<LE>,
}

/// A stream or storage in the directory
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    /// Index in the directory
    pub sid: u32,
    pub name: String,
    /// One of the `STGTY_*` constants
    pub entry_type: u8,
    pub sid_left: u32,
    pub sid_right: u32,
    pub sid_child: u32,
    pub start_sector: u32,
    pub size: u64,
}

impl DirectoryEntry {
    #[inline]
    pub fn is_stream(&self) -> bool {
        self.entry_type == STGTY_STREAM
    }

    #[inline]
    pub fn is_storage(&self) -> bool {
        self.entry_type == STGTY_STORAGE || self.entry_type == STGTY_ROOT
    }
}

/// Cheap signature check, used to tell an encrypted package from a ZIP.
pub fn is_compound_file(data: &[u8]) -> bool {
    data.len() >= MAGIC.len() && &data[..MAGIC.len()] == MAGIC
}

/// Read-only view of a compound file.
#[derive(Debug)]
pub struct CompoundFile<R: Read + Seek> {
    reader: R,
    sector_size: usize,
    mini_sector_size: usize,
    mini_stream_cutoff: u32,
    fat: Vec<u32>,
    minifat: Vec<u32>,
    entries: Vec<DirectoryEntry>,
    /// Mini stream contents, loaded on first small-stream read
    ministream: Option<Vec<u8>>,
}

impl<R: Read + Seek> CompoundFile<R> {
    /// Parse the header, FAT, directory and MiniFAT.
    pub fn open(mut reader: R) -> Result<Self, CfbError> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        if file_size < MINIMAL_FILE_SIZE as u64 {
            return Err(CfbError::NotCompoundFile);
        }

        let mut block = [0u8; HEADER_SIZE];
        reader.read_exact(&mut block)?;
        let header = RawHeader::read_from_bytes(&block[..])
            .map_err(|_| CfbError::InvalidFormat("Failed to parse header".to_string()))?;
        if &header.magic != MAGIC {
            return Err(CfbError::NotCompoundFile);
        }
        if header.byte_order.get() != 0xFFFE {
            return Err(CfbError::InvalidFormat("Invalid byte order".to_string()));
        }

        let sector_shift = header.sector_shift.get();
        let sector_size = match (header.major_version.get(), sector_shift) {
            (3, 9) => 512,
            (4, 12) => 4096,
            (major, shift) => {
                return Err(CfbError::InvalidFormat(format!(
                    "Unsupported version {} with sector shift {}",
                    major, shift
                )));
            },
        };
        let mini_sector_shift = header.mini_sector_shift.get();
        if mini_sector_shift != 6 {
            return Err(CfbError::InvalidFormat(format!(
                "Unsupported mini sector shift {}",
                mini_sector_shift
            )));
        }

        let mut file = CompoundFile {
            reader,
            sector_size,
            mini_sector_size: 1 << mini_sector_shift,
            mini_stream_cutoff: header.mini_stream_cutoff.get(),
            fat: Vec::new(),
            minifat: Vec::new(),
            entries: Vec::new(),
            ministream: None,
        };

        file.load_fat(&header)?;
        file.load_directory(header.first_dir_sector.get())?;
        if header.num_minifat_sectors.get() > 0 {
            file.load_minifat(header.first_minifat_sector.get())?;
        }
        Ok(file)
    }

    /// Collect FAT sector ids from the header and the DIFAT chain, then read them.
    fn load_fat(&mut self, header: &RawHeader) -> Result<(), CfbError> {
        let mut fat_sectors: Vec<u32> = header
            .difat
            .iter()
            .map(|v| v.get())
            .take_while(|&s| s != FREESECT && s != ENDOFCHAIN)
            .collect();

        let ids_per_difat = self.sector_size / 4 - 1;
        let mut difat_sector = header.first_difat_sector.get();
        for _ in 0..header.num_difat_sectors.get() {
            if difat_sector == ENDOFCHAIN || difat_sector == FREESECT {
                break;
            }
            let data = self.read_sector(difat_sector)?;
            let ids = read_u32_table(&data);
            fat_sectors.extend(
                ids[..ids_per_difat]
                    .iter()
                    .copied()
                    .take_while(|&s| s != FREESECT && s != ENDOFCHAIN),
            );
            difat_sector = ids[ids_per_difat];
        }

        let expected = header.num_fat_sectors.get() as usize;
        if fat_sectors.len() < expected {
            return Err(CfbError::CorruptedFile(format!(
                "Header declares {} FAT sectors, found {}",
                expected,
                fat_sectors.len()
            )));
        }

        self.fat.reserve(fat_sectors.len() * (self.sector_size / 4));
        for sector in fat_sectors {
            let data = self.read_sector(sector)?;
            self.fat.extend(read_u32_table(&data));
        }
        Ok(())
    }

    fn load_minifat(&mut self, first_sector: u32) -> Result<(), CfbError> {
        let data = self.read_chain(first_sector)?;
        self.minifat = read_u32_table(&data);
        Ok(())
    }

    fn load_directory(&mut self, first_sector: u32) -> Result<(), CfbError> {
        let data = self.read_chain(first_sector)?;
        let count = data.len() / DIRENTRY_SIZE;
        if count == 0 {
            return Err(CfbError::CorruptedFile("Empty directory".to_string()));
        }
        self.entries.reserve(count);
        for (sid, chunk) in data.chunks_exact(DIRENTRY_SIZE).enumerate() {
            let raw = RawDirectoryEntry::read_from_bytes(chunk).map_err(|_| {
                CfbError::InvalidFormat("Failed to parse directory entry".to_string())
            })?;
            let name_len = (raw.name_len.get() as usize).saturating_sub(2).min(64);
            let (name, _) = UTF_16LE.decode_without_bom_handling(&raw.name[..name_len]);
            let size = if self.sector_size == 512 {
                raw.stream_size.get() & 0xFFFF_FFFF
            } else {
                raw.stream_size.get()
            };
            self.entries.push(DirectoryEntry {
                sid: sid as u32,
                name: name.trim_end_matches('\0').to_string(),
                entry_type: raw.entry_type,
                sid_left: raw.sid_left.get(),
                sid_right: raw.sid_right.get(),
                sid_child: raw.sid_child.get(),
                start_sector: raw.start_sector.get(),
                size,
            });
        }
        if self.entries[0].entry_type != STGTY_ROOT {
            return Err(CfbError::CorruptedFile(
                "First directory entry is not the root".to_string(),
            ));
        }
        Ok(())
    }

    fn read_sector(&mut self, sector: u32) -> Result<Vec<u8>, CfbError> {
        let position = (sector as u64 + 1) * self.sector_size as u64;
        self.reader.seek(SeekFrom::Start(position))?;
        let mut buffer = vec![0u8; self.sector_size];
        self.reader.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Follow a FAT chain. Chains longer than the FAT are cycles.
    fn read_chain(&mut self, start: u32) -> Result<Vec<u8>, CfbError> {
        let mut data = Vec::new();
        let mut sector = start;
        let mut steps = 0usize;
        while sector != ENDOFCHAIN {
            if sector as usize >= self.fat.len() {
                return Err(CfbError::CorruptedFile(format!(
                    "Sector {} outside the FAT",
                    sector
                )));
            }
            steps += 1;
            if steps > self.fat.len() {
                return Err(CfbError::CorruptedFile("Cycle in FAT chain".to_string()));
            }
            data.extend_from_slice(&self.read_sector(sector)?);
            sector = self.fat[sector as usize];
        }
        Ok(data)
    }

    fn read_mini_chain(&mut self, start: u32, declared: u64) -> Result<Vec<u8>, CfbError> {
        if self.ministream.is_none() {
            let root_start = self.entries[0].start_sector;
            self.ministream = Some(self.read_chain(root_start)?);
        }
        let Some(ministream) = self.ministream.as_deref() else {
            return Err(CfbError::CorruptedFile("Missing mini stream".to_string()));
        };

        // The declared size is untrusted; the stream cannot outgrow the ministream.
        let size = declared.min(ministream.len() as u64);
        let mut data = Vec::with_capacity(size as usize);
        let mut sector = start;
        let mut steps = 0usize;
        while sector != ENDOFCHAIN && (data.len() as u64) < size {
            if sector as usize >= self.minifat.len() {
                return Err(CfbError::CorruptedFile(format!(
                    "Mini sector {} outside the MiniFAT",
                    sector
                )));
            }
            steps += 1;
            if steps > self.minifat.len() {
                return Err(CfbError::CorruptedFile("Cycle in MiniFAT chain".to_string()));
            }
            let position = sector as usize * self.mini_sector_size;
            let end = position + self.mini_sector_size;
            if end > ministream.len() {
                return Err(CfbError::CorruptedFile(
                    "Mini sector out of bounds".to_string(),
                ));
            }
            data.extend_from_slice(&ministream[position..end]);
            sector = self.minifat[sector as usize];
        }
        if (data.len() as u64) < declared {
            return Err(CfbError::CorruptedFile(
                "Mini stream is shorter than its declared size".to_string(),
            ));
        }
        data.truncate(size as usize);
        Ok(data)
    }

    /// Children of a storage, in tree order.
    fn children(&self, sid: u32) -> Vec<&DirectoryEntry> {
        let mut out = Vec::new();
        let mut stack = Vec::new();
        let mut seen = vec![false; self.entries.len()];
        let mut current = self.entries.get(sid as usize).map_or(NOSTREAM, |e| e.sid_child);
        loop {
            while let Some(entry) = self.entries.get(current as usize) {
                if std::mem::replace(&mut seen[current as usize], true) {
                    break;
                }
                stack.push(entry);
                current = entry.sid_left;
            }
            let Some(entry) = stack.pop() else {
                break;
            };
            if entry.entry_type != STGTY_EMPTY {
                out.push(entry);
            }
            current = entry.sid_right;
        }
        out
    }

    /// Look up an entry by path; names compare case-insensitively.
    pub fn find_entry(&self, path: &[&str]) -> Option<&DirectoryEntry> {
        let mut current = &self.entries[0];
        for name in path {
            current = self
                .children(current.sid)
                .into_iter()
                .find(|e| e.name.to_uppercase() == name.to_uppercase())?;
        }
        Some(current)
    }

    pub fn exists(&self, path: &[&str]) -> bool {
        self.find_entry(path).is_some()
    }

    /// Read a whole stream.
    pub fn open_stream(&mut self, path: &[&str]) -> Result<Vec<u8>, CfbError> {
        let entry = self
            .find_entry(path)
            .ok_or_else(|| CfbError::StreamNotFound(path.join("/")))?;
        if !entry.is_stream() {
            return Err(CfbError::InvalidFormat(format!(
                "{} is not a stream",
                path.join("/")
            )));
        }
        let (start, size) = (entry.start_sector, entry.size);
        if size < self.mini_stream_cutoff as u64 {
            self.read_mini_chain(start, size)
        } else {
            let mut data = self.read_chain(start)?;
            if (data.len() as u64) < size {
                return Err(CfbError::CorruptedFile(format!(
                    "Stream {} is shorter than its declared size",
                    path.join("/")
                )));
            }
            data.truncate(size as usize);
            Ok(data)
        }
    }

    /// Every stream path, depth first.
    pub fn list_streams(&self) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        self.collect_streams(0, &mut Vec::new(), &mut out, 0);
        out
    }

    fn collect_streams(
        &self,
        sid: u32,
        prefix: &mut Vec<String>,
        out: &mut Vec<Vec<String>>,
        depth: usize,
    ) {
        if depth > self.entries.len() {
            return;
        }
        for child in self.children(sid) {
            prefix.push(child.name.clone());
            if child.is_stream() {
                out.push(prefix.clone());
            } else if child.is_storage() {
                self.collect_streams(child.sid, prefix, out, depth + 1);
            }
            prefix.pop();
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

fn read_u32_table(data: &[u8]) -> Vec<u32> {
    data.chunks_exact(4)
        .filter_map(|chunk| U32::<LE>::read_from_bytes(chunk).ok())
        .map(|v| v.get())
        .collect()
}
