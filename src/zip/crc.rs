//! Incremental CRC-32 (IEEE 802.3, reflected polynomial `0xEDB88320`).
//!
//! ZIP stores a CRC-32 of every entry's uncompressed bytes. Because entries
//! are streamed, the checksum has to be folded in chunk by chunk while the
//! payload passes through, and the result must not depend on how the payload
//! was split.

/// Running CRC-32 over an arbitrary sequence of byte chunks.
///
/// ```
/// use feedzip::zip::Crc32;
///
/// let mut crc = Crc32::new();
/// crc.append(b"hel");
/// crc.append(b"lo");
/// assert_eq!(crc.value(), 0x3610_A686);
/// ```
#[derive(Debug, Clone)]
pub struct Crc32(crc32fast::Hasher);

impl Crc32 {
    pub fn new() -> Self {
        Self(crc32fast::Hasher::new())
    }

    /// Fold `data` into the running checksum.
    pub fn append(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    /// Checksum of every byte appended so far. Appending may continue.
    pub fn value(&self) -> u32 {
        self.0.clone().finalize()
    }

    /// One-shot checksum of a complete buffer.
    pub fn checksum(data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}
