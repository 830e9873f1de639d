/// Magic bytes at the start of every compound file.
pub const MAGIC: &[u8; 8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";

/// Smallest valid file with 512-byte sectors: header, one FAT sector, one directory sector.
pub const MINIMAL_FILE_SIZE: usize = 1536;

/// Size of the header block read from the start of the file.
pub const HEADER_SIZE: usize = 512;

/// Size of a directory entry in bytes
pub const DIRENTRY_SIZE: usize = 128;

/// Sector size of version 3 files, the only size the writer produces
pub const SECTOR_SIZE: usize = 512;

/// Mini sector size
pub const MINI_SECTOR_SIZE: usize = 64;

/// Streams smaller than this live in the mini stream
pub const MINI_STREAM_CUTOFF: u32 = 4096;

/// Number of FAT sector ids stored directly in the header
pub const HEADER_DIFAT_ENTRIES: usize = 109;

// Special sector ids
/// Denotes a DIFAT sector in a FAT
pub const DIFSECT: u32 = 0xFFFF_FFFC;
/// Denotes a FAT sector in a FAT
pub const FATSECT: u32 = 0xFFFF_FFFD;
/// End of a sector chain
pub const ENDOFCHAIN: u32 = 0xFFFF_FFFE;
/// Unallocated sector
pub const FREESECT: u32 = 0xFFFF_FFFF;

/// Unallocated directory entry
pub const NOSTREAM: u32 = 0xFFFF_FFFF;

// Directory entry object types
pub const STGTY_EMPTY: u8 = 0;
pub const STGTY_STORAGE: u8 = 1;
pub const STGTY_STREAM: u8 = 2;
pub const STGTY_ROOT: u8 = 5;

/// Red-black tree node colors
pub const COLOR_BLACK: u8 = 1;
