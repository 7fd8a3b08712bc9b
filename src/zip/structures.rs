use byteorder::{ByteOrder, LittleEndian};
use chrono::{Datelike, NaiveDateTime, Timelike};

/// ZIP compression methods.
///
/// The writer only ever emits [`CompressionMethod::Stored`]; the enum exists
/// so the method code is named rather than a bare zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
}

impl CompressionMethod {
    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
        }
    }
}

/// "Version needed to extract" (and "version made by"): 2.0, MS-DOS host.
pub const VERSION: u16 = 20;

/// General purpose bit 3: sizes and CRC follow the data in a descriptor.
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;

/// General purpose bit 11: file name and comment are UTF-8.
pub const FLAG_UTF8: u16 = 1 << 11;

/// MS-DOS directory attribute, stored in the low byte of the external attributes.
pub const DOS_DIRECTORY_ATTRIBUTE: u32 = 0x10;

/// Largest value a 16-bit length or count field can carry.
pub const MAX_U16_FIELD: usize = u16::MAX as usize;

/// MS-DOS packed date and time, as stored in ZIP headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DosDateTime {
    pub time: u16,
    pub date: u16,
}

impl DosDateTime {
    /// Pack a calendar timestamp. DOS dates cover 1980..=2107; anything
    /// outside that range is clamped to the nearest representable instant.
    pub fn from_naive(dt: NaiveDateTime) -> Self {
        if dt.year() < 1980 {
            return Self {
                time: 0,
                date: (1 << 5) | 1,
            };
        }
        if dt.year() > 2107 {
            return Self {
                time: (23 << 11) | (59 << 5) | 29,
                date: (127 << 9) | (12 << 5) | 31,
            };
        }

        let time = ((dt.hour() as u16) << 11) | ((dt.minute() as u16) << 5) | (dt.second() as u16 / 2);
        let date = (((dt.year() - 1980) as u16) << 9) | ((dt.month() as u16) << 5) | dt.day() as u16;
        Self { time, date }
    }

    /// Unpack the date to (year, month, day).
    pub fn date_parts(&self) -> (u16, u8, u8) {
        let day = (self.date & 0x1F) as u8;
        let month = ((self.date >> 5) & 0x0F) as u8;
        let year = ((self.date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Unpack the time to (hour, minute, second).
    pub fn time_parts(&self) -> (u8, u8, u8) {
        let second = ((self.time & 0x1F) * 2) as u8;
        let minute = ((self.time >> 5) & 0x3F) as u8;
        let hour = ((self.time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

/// The fields shared verbatim by a local file header and its central
/// directory counterpart (everything from "version needed" through
/// "extra field length").
///
/// The writer keeps one of these per entry. It is encoded once with zeroed
/// CRC and sizes for the local header, then finalized with the real values
/// and encoded again for the central directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub modified: DosDateTime,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
}

impl EntryHeader {
    /// Encoded length of the shared block.
    pub const SIZE: usize = 26;

    /// A header for a stored entry whose sizes are deferred to a data descriptor.
    pub fn deferred(file_name_length: u16, modified: DosDateTime) -> Self {
        Self {
            version_needed: VERSION,
            flags: FLAG_UTF8 | FLAG_DATA_DESCRIPTOR,
            compression_method: CompressionMethod::Stored,
            modified,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            file_name_length,
        }
    }

    /// Record the values learned once the payload has been streamed.
    pub fn finalize(&mut self, crc32: u32, compressed_size: u32, uncompressed_size: u32) {
        self.crc32 = crc32;
        self.compressed_size = compressed_size;
        self.uncompressed_size = uncompressed_size;
    }

    fn write_to(&self, buf: &mut [u8]) {
        LittleEndian::write_u16(&mut buf[0..2], self.version_needed);
        LittleEndian::write_u16(&mut buf[2..4], self.flags);
        LittleEndian::write_u16(&mut buf[4..6], self.compression_method.as_u16());
        LittleEndian::write_u16(&mut buf[6..8], self.modified.time);
        LittleEndian::write_u16(&mut buf[8..10], self.modified.date);
        LittleEndian::write_u32(&mut buf[10..14], self.crc32);
        LittleEndian::write_u32(&mut buf[14..18], self.compressed_size);
        LittleEndian::write_u32(&mut buf[18..22], self.uncompressed_size);
        LittleEndian::write_u16(&mut buf[22..24], self.file_name_length);
        // extra field length: never used
        LittleEndian::write_u16(&mut buf[24..26], 0);
    }
}

/// Local File Header (LFH) - 30 bytes + file name
pub struct LocalFileHeader;

impl LocalFileHeader {
    pub const SIGNATURE: &'static [u8] = b"PK\x03\x04";
    pub const SIZE: usize = 30;

    pub fn encode(header: &EntryHeader, file_name: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; Self::SIZE + file_name.len()];
        buf[0..4].copy_from_slice(Self::SIGNATURE);
        header.write_to(&mut buf[4..Self::SIZE]);
        buf[Self::SIZE..].copy_from_slice(file_name);
        buf
    }
}

/// Data descriptor - 16 bytes, written after an entry's payload
pub struct DataDescriptor;

impl DataDescriptor {
    pub const SIGNATURE: &'static [u8] = b"PK\x07\x08";
    pub const SIZE: usize = 16;

    pub fn encode(crc32: u32, compressed_size: u32, uncompressed_size: u32) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(Self::SIGNATURE);
        LittleEndian::write_u32(&mut buf[4..8], crc32);
        LittleEndian::write_u32(&mut buf[8..12], compressed_size);
        LittleEndian::write_u32(&mut buf[12..16], uncompressed_size);
        buf
    }
}

/// Central Directory File Header (CDFH) - 46 bytes + name + comment
pub struct CentralDirectoryHeader;

impl CentralDirectoryHeader {
    pub const SIGNATURE: &'static [u8] = b"PK\x01\x02";
    pub const MIN_SIZE: usize = 46;

    /// Encoded size for a given name and comment.
    pub fn size(file_name: &[u8], comment: &[u8]) -> usize {
        Self::MIN_SIZE + file_name.len() + comment.len()
    }

    pub fn encode(
        header: &EntryHeader,
        file_name: &[u8],
        comment: &[u8],
        is_directory: bool,
        lfh_offset: u32,
    ) -> Vec<u8> {
        let mut buf = vec![0u8; Self::size(file_name, comment)];
        buf[0..4].copy_from_slice(Self::SIGNATURE);
        LittleEndian::write_u16(&mut buf[4..6], VERSION);
        header.write_to(&mut buf[6..6 + EntryHeader::SIZE]);
        LittleEndian::write_u16(&mut buf[32..34], comment.len() as u16);
        // disk number start (34..36) and internal attributes (36..38) stay zero
        let external = if is_directory {
            DOS_DIRECTORY_ATTRIBUTE
        } else {
            0
        };
        LittleEndian::write_u32(&mut buf[38..42], external);
        LittleEndian::write_u32(&mut buf[42..46], lfh_offset);

        let name_end = Self::MIN_SIZE + file_name.len();
        buf[Self::MIN_SIZE..name_end].copy_from_slice(file_name);
        buf[name_end..].copy_from_slice(comment);
        buf
    }
}

/// End of Central Directory (EOCD) - 22 bytes, no archive comment
pub struct EndOfCentralDirectory {
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(Self::SIGNATURE);
        // disk number (4..6) and disk with central directory (6..8) stay zero
        LittleEndian::write_u16(&mut buf[8..10], self.total_entries);
        LittleEndian::write_u16(&mut buf[10..12], self.total_entries);
        LittleEndian::write_u32(&mut buf[12..16], self.cd_size);
        LittleEndian::write_u32(&mut buf[16..20], self.cd_offset);
        // comment length (20..22) stays zero
        buf
    }
}
