//! Streaming ZIP archive writer.
//!
//! This module produces ZIP archives incrementally, without knowing entry
//! sizes up front and without seeking back in the output.
//!
//! ## Architecture
//!
//! - [`crc`]: incremental CRC-32 used for every entry's checksum
//! - [`structures`]: fixed-layout records (local header, data descriptor,
//!   central directory header, end record) and DOS timestamps
//! - [`writer`]: the entry state machine and archive bookkeeping
//!
//! ## ZIP Format Overview
//!
//! The writer emits:
//! 1. For each entry: a local file header with deferred sizes, the stored
//!    payload, and a data descriptor with the real CRC and sizes
//! 2. A central directory repeating every entry's metadata in the same order
//! 3. An End of Central Directory (EOCD) record locating the directory
//!
//! ## Limitations
//!
//! - STORED only, no compression
//! - No ZIP64: at most 65535 entries and 4 GiB of output
//! - No encryption, no multi-disk archives

pub mod crc;
mod error;
pub mod structures;
mod writer;

pub use crc::Crc32;
pub use error::{ArchiveError, ArchiveResult};
pub use structures::{CompressionMethod, DosDateTime};
pub use writer::{ArchiveEntry, CHUNK_SIZE, EntryOptions, EntryState, ZipStreamWriter};
