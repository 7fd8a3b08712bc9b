//! Streaming ZIP writer.
//!
//! Entries are written front to back and never revisited, so the sink only
//! needs to accept appends. Each entry is framed as
//!
//! ```text
//! [local file header][payload][data descriptor]
//! ```
//!
//! where the local header carries zeroed CRC and sizes (general purpose bit 3
//! set) because they are not known until the payload has streamed through.
//! The writer keeps its own copy of every header and finalizes that copy, so
//! the central directory written by [`ZipStreamWriter::close`] carries the
//! real values without re-reading anything from the sink.

use std::collections::HashSet;

use chrono::{Local, NaiveDateTime};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use super::crc::Crc32;
use super::error::{ArchiveError, ArchiveResult};
use super::structures::*;

/// Payloads handed over as one buffer are forwarded in chunks of this size.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Describes an entry about to be written.
#[derive(Debug, Clone)]
pub struct EntryOptions {
    pub name: String,
    pub directory: bool,
    pub comment: String,
    /// Modification time; the current local time when `None`.
    pub modified: Option<NaiveDateTime>,
}

impl EntryOptions {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directory: false,
            comment: String::new(),
            modified: None,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            directory: true,
            ..Self::file(name)
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn with_modified(mut self, modified: NaiveDateTime) -> Self {
        self.modified = Some(modified);
        self
    }
}

/// Bookkeeping for one entry, retained until the central directory is written.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    name: String,
    comment: Vec<u8>,
    is_directory: bool,
    lfh_offset: u32,
    /// Finalize-time record. The bytes already on the wire were encoded from
    /// this before finalization and are never touched again.
    header: EntryHeader,
    finalized: bool,
}

impl ArchiveEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    /// Number of archive bytes emitted before this entry's local header.
    pub fn offset(&self) -> u32 {
        self.lfh_offset
    }

    pub fn crc32(&self) -> u32 {
        self.header.crc32
    }

    pub fn compressed_size(&self) -> u32 {
        self.header.compressed_size
    }

    pub fn uncompressed_size(&self) -> u32 {
        self.header.uncompressed_size
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Bytes this entry occupies in the local-file section.
    pub fn block_size(&self) -> u64 {
        (LocalFileHeader::SIZE + self.name.len()) as u64
            + self.header.compressed_size as u64
            + DataDescriptor::SIZE as u64
    }
}

/// Lifecycle of the entry currently being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    HeaderWritten,
    Streaming,
    Finalized,
}

#[derive(Debug)]
struct ActiveEntry {
    index: usize,
    crc: Crc32,
    length: u64,
    state: EntryState,
}

/// Writes a stored (uncompressed) ZIP archive to an append-only sink.
///
/// At most one entry is open at a time: [`start_entry`](Self::start_entry),
/// any number of [`write_chunk`](Self::write_chunk) calls, then
/// [`finish_entry`](Self::finish_entry). A caller that feeds items one at a
/// time therefore never holds more than one payload in memory.
///
/// ## Example
///
/// ```no_run
/// use feedzip::zip::{EntryOptions, ZipStreamWriter};
///
/// # async fn run() -> anyhow::Result<()> {
/// let file = tokio::fs::File::create("out.zip").await?;
/// let mut zip = ZipStreamWriter::new(file);
/// zip.add_file(EntryOptions::file("a.txt"), b"hello").await?;
/// zip.add_directory("media/").await?;
/// zip.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct ZipStreamWriter<W> {
    sink: W,
    entries: Vec<ArchiveEntry>,
    names: HashSet<String>,
    /// Bytes emitted so far; only advanced after a successful write.
    offset: u64,
    active: Option<ActiveEntry>,
    closed: bool,
}

impl<W: AsyncWrite + Unpin> ZipStreamWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            entries: Vec::new(),
            names: HashSet::new(),
            offset: 0,
            active: None,
            closed: false,
        }
    }

    /// Write the local header for a new entry.
    ///
    /// Directory entries (either flagged or named with a trailing `/`) have
    /// no payload and are finalized immediately: header and descriptor are
    /// written back to back.
    ///
    /// # Errors
    ///
    /// - [`ArchiveError::StreamClosed`] after [`close`](Self::close)
    /// - [`ArchiveError::EntryInProgress`] while another entry is open
    /// - [`ArchiveError::DuplicateEntry`] if the name was already used
    /// - [`ArchiveError::InvalidName`] / [`ArchiveError::LimitExceeded`] for
    ///   names, comments or archives the 32-bit format cannot describe
    ///
    /// None of these write anything.
    pub async fn start_entry(&mut self, options: EntryOptions) -> ArchiveResult<()> {
        if self.closed {
            return Err(ArchiveError::StreamClosed);
        }
        if let Some(active) = &self.active {
            return Err(ArchiveError::EntryInProgress(
                self.entries[active.index].name.clone(),
            ));
        }

        let mut name = options.name.trim().to_string();
        if name.is_empty() || name == "/" {
            return Err(ArchiveError::InvalidName(options.name));
        }
        if options.directory && !name.ends_with('/') {
            name.push('/');
        }
        let is_directory = name.ends_with('/');

        if self.names.contains(&name) {
            return Err(ArchiveError::DuplicateEntry(name));
        }
        if name.len() > MAX_U16_FIELD {
            return Err(ArchiveError::InvalidName(name));
        }
        if options.comment.len() > MAX_U16_FIELD {
            return Err(ArchiveError::LimitExceeded("entry comment longer than 65535 bytes"));
        }
        if self.entries.len() >= MAX_U16_FIELD {
            return Err(ArchiveError::LimitExceeded("more than 65535 entries"));
        }
        let lfh_offset = u32::try_from(self.offset)
            .map_err(|_| ArchiveError::LimitExceeded("archive larger than 4 GiB"))?;

        let modified = options
            .modified
            .unwrap_or_else(|| Local::now().naive_local());
        let header = EntryHeader::deferred(name.len() as u16, DosDateTime::from_naive(modified));
        let local = LocalFileHeader::encode(&header, name.as_bytes());

        self.sink.write_all(&local).await?;
        self.offset += local.len() as u64;

        debug!(entry = %name, offset = lfh_offset, directory = is_directory, "entry started");

        self.names.insert(name.clone());
        self.entries.push(ArchiveEntry {
            name,
            comment: options.comment.into_bytes(),
            is_directory,
            lfh_offset,
            header,
            finalized: false,
        });
        self.active = Some(ActiveEntry {
            index: self.entries.len() - 1,
            crc: Crc32::new(),
            length: 0,
            state: EntryState::HeaderWritten,
        });

        if is_directory {
            self.finish_entry().await?;
        }
        Ok(())
    }

    /// Forward one payload chunk of the open entry to the sink, folding it
    /// into the entry's checksum on the way.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> ArchiveResult<()> {
        if self.closed {
            return Err(ArchiveError::StreamClosed);
        }
        let active = self.active.as_mut().ok_or(ArchiveError::NoActiveEntry)?;

        if active.length + chunk.len() as u64 > u32::MAX as u64 {
            return Err(ArchiveError::EntryTooLarge(
                self.entries[active.index].name.clone(),
            ));
        }

        self.sink.write_all(chunk).await?;
        active.crc.append(chunk);
        active.length += chunk.len() as u64;
        active.state = EntryState::Streaming;
        self.offset += chunk.len() as u64;
        Ok(())
    }

    /// Close the open entry: write its data descriptor and record the final
    /// checksum and length for the central directory.
    pub async fn finish_entry(&mut self) -> ArchiveResult<()> {
        if self.closed {
            return Err(ArchiveError::StreamClosed);
        }
        let active = self.active.as_ref().ok_or(ArchiveError::NoActiveEntry)?;

        let crc = active.crc.value();
        let length = active.length as u32;
        let index = active.index;

        let descriptor = DataDescriptor::encode(crc, length, length);
        self.sink.write_all(&descriptor).await?;
        self.offset += descriptor.len() as u64;

        self.active = None;
        let entry = &mut self.entries[index];
        entry.header.finalize(crc, length, length);
        entry.finalized = true;

        debug!(entry = %entry.name, size = length, crc32 = format_args!("{crc:08x}"), "entry finished");
        Ok(())
    }

    /// Write a complete file entry from an in-memory payload.
    ///
    /// A name that resolves to a directory is only accepted with an empty
    /// payload; otherwise [`ArchiveError::InvalidName`] is returned and
    /// nothing is written.
    pub async fn add_file(&mut self, options: EntryOptions, data: &[u8]) -> ArchiveResult<()> {
        if self.closed {
            return Err(ArchiveError::StreamClosed);
        }
        if data.len() as u64 > u32::MAX as u64 {
            return Err(ArchiveError::EntryTooLarge(options.name));
        }
        if !data.is_empty() && (options.directory || options.name.trim().ends_with('/')) {
            return Err(ArchiveError::InvalidName(options.name));
        }
        self.start_entry(options).await?;
        for chunk in data.chunks(CHUNK_SIZE) {
            self.write_chunk(chunk).await?;
        }
        // directories finalize themselves in start_entry
        if self.active.is_some() {
            self.finish_entry().await?;
        }
        Ok(())
    }

    /// Write a directory entry (a trailing `/` is added when missing).
    pub async fn add_directory(&mut self, name: impl Into<String>) -> ArchiveResult<()> {
        self.start_entry(EntryOptions::directory(name)).await
    }

    /// Write the central directory and end record, then shut the sink down.
    ///
    /// Entries appear in the central directory in the order they were
    /// started. No further writes are accepted afterwards.
    ///
    /// # Errors
    ///
    /// [`ArchiveError::StreamClosed`] if already closed,
    /// [`ArchiveError::EntryInProgress`] if an entry is still open.
    pub async fn close(&mut self) -> ArchiveResult<()> {
        if self.closed {
            return Err(ArchiveError::StreamClosed);
        }
        if let Some(active) = &self.active {
            return Err(ArchiveError::EntryInProgress(
                self.entries[active.index].name.clone(),
            ));
        }
        let cd_offset = u32::try_from(self.offset)
            .map_err(|_| ArchiveError::LimitExceeded("archive larger than 4 GiB"))?;
        self.closed = true;

        let cd_len: usize = self
            .entries
            .iter()
            .map(|e| CentralDirectoryHeader::size(e.name.as_bytes(), &e.comment))
            .sum();
        let cd_size = u32::try_from(cd_len)
            .map_err(|_| ArchiveError::LimitExceeded("central directory larger than 4 GiB"))?;

        let mut buf = Vec::with_capacity(cd_len + EndOfCentralDirectory::SIZE);
        for entry in &self.entries {
            buf.extend_from_slice(&CentralDirectoryHeader::encode(
                &entry.header,
                entry.name.as_bytes(),
                &entry.comment,
                entry.is_directory,
                entry.lfh_offset,
            ));
        }

        let eocd = EndOfCentralDirectory {
            total_entries: self.entries.len() as u16,
            cd_size,
            cd_offset,
        };
        buf.extend_from_slice(&eocd.to_bytes());

        self.sink.write_all(&buf).await?;
        self.offset += buf.len() as u64;
        self.sink.flush().await?;
        self.sink.shutdown().await?;

        info!(
            entries = self.entries.len(),
            bytes = self.offset,
            "archive closed"
        );
        Ok(())
    }

    /// Total bytes emitted to the sink so far.
    pub fn bytes_written(&self) -> u64 {
        self.offset
    }

    /// Entries in emission order.
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// State of the most recently started entry.
    ///
    /// `None` means no entry has been started yet, i.e. the next one is
    /// still pending. Once an entry is finalized it stays `Finalized` until
    /// the next [`start_entry`](Self::start_entry).
    pub fn entry_state(&self) -> Option<EntryState> {
        match &self.active {
            Some(active) => Some(active.state),
            None if self.entries.is_empty() => None,
            None => Some(EntryState::Finalized),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{ByteOrder, LittleEndian};

    async fn archive_of(files: &[(&str, &[u8])]) -> ZipStreamWriter<Vec<u8>> {
        let mut zip = ZipStreamWriter::new(Vec::new());
        for (name, data) in files {
            zip.add_file(EntryOptions::file(*name), data).await.unwrap();
        }
        zip
    }

    #[tokio::test]
    async fn single_entry_framing() {
        let mut zip = archive_of(&[("a.txt", b"hello")]).await;
        zip.close().await.unwrap();
        let out = zip.into_inner();

        // header
        assert_eq!(&out[0..4], b"PK\x03\x04");
        assert_eq!(&out[30..35], b"a.txt");
        // payload passes through unchanged
        assert_eq!(&out[35..40], b"hello");
        // descriptor
        assert_eq!(&out[40..44], b"PK\x07\x08");
        assert_eq!(LittleEndian::read_u32(&out[44..48]), 0x3610_A686);
        assert_eq!(LittleEndian::read_u32(&out[48..52]), 5);
        assert_eq!(LittleEndian::read_u32(&out[52..56]), 5);
        // central directory right after
        assert_eq!(&out[56..60], b"PK\x01\x02");
        let eocd = &out[out.len() - 22..];
        assert_eq!(&eocd[0..4], b"PK\x05\x06");
        assert_eq!(LittleEndian::read_u16(&eocd[10..12]), 1);
        assert_eq!(LittleEndian::read_u32(&eocd[12..16]), 46 + 5);
        assert_eq!(LittleEndian::read_u32(&eocd[16..20]), 56);
    }

    #[tokio::test]
    async fn local_header_keeps_deferred_markers() {
        let zip = archive_of(&[("a.txt", b"hello")]).await;
        let out = zip.get_ref();
        // CRC and sizes on the wire stay zero; the descriptor carries them
        assert_eq!(&out[14..26], &[0u8; 12]);
        assert_eq!(zip.entries()[0].crc32(), 0x3610_A686);
        assert_eq!(zip.entries()[0].uncompressed_size(), 5);
    }

    #[tokio::test]
    async fn offsets_are_sums_of_preceding_blocks() {
        let zip = archive_of(&[
            ("one.txt", b"1"),
            ("two.bin", &[7u8; 300]),
            ("three/", b""),
            ("four.txt", b"four"),
        ])
        .await;

        let mut expected = 0u64;
        for entry in zip.entries() {
            assert_eq!(entry.offset() as u64, expected, "{}", entry.name());
            expected += entry.block_size();
        }
        assert_eq!(zip.bytes_written(), expected);
    }

    #[tokio::test]
    async fn checksum_is_independent_of_chunking() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 253) as u8).collect();
        let mut crcs = Vec::new();

        for chunk_size in [1, 13, 1024, 10_000] {
            let mut zip = ZipStreamWriter::new(Vec::new());
            zip.start_entry(EntryOptions::file("data.bin")).await.unwrap();
            for chunk in data.chunks(chunk_size) {
                zip.write_chunk(chunk).await.unwrap();
            }
            zip.finish_entry().await.unwrap();
            crcs.push(zip.entries()[0].crc32());
        }

        assert!(crcs.iter().all(|c| *c == Crc32::checksum(&data)));
    }

    #[tokio::test]
    async fn directory_entry_has_no_payload() {
        let mut zip = ZipStreamWriter::new(Vec::new());
        zip.add_directory("media").await.unwrap();

        let entry = &zip.entries()[0];
        assert_eq!(entry.name(), "media/");
        assert!(entry.is_directory());
        assert!(entry.is_finalized());
        assert_eq!(entry.crc32(), 0);
        assert_eq!(entry.compressed_size(), 0);
        assert_eq!(zip.entry_state(), Some(EntryState::Finalized));

        let out = zip.get_ref();
        let header_len = 30 + "media/".len();
        assert_eq!(out.len(), header_len + 16);
        assert_eq!(&out[header_len..header_len + 4], b"PK\x07\x08");
        assert_eq!(&out[header_len + 4..], &[0u8; 12]);
    }

    #[tokio::test]
    async fn trailing_slash_marks_a_directory() {
        let mut zip = ZipStreamWriter::new(Vec::new());
        zip.add_file(EntryOptions::file("docs/"), b"").await.unwrap();
        assert!(zip.entries()[0].is_directory());
        zip.close().await.unwrap();
    }

    #[tokio::test]
    async fn directory_name_with_payload_is_rejected_without_writing() {
        let mut zip = archive_of(&[("a.txt", b"hello")]).await;
        let before = zip.get_ref().clone();

        let err = zip
            .add_file(EntryOptions::file("notes/"), b"has content")
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidName(_)));
        assert!(err.is_entry_rejection());
        assert_eq!(zip.get_ref(), &before);
        assert_eq!(zip.entries().len(), 1);
        assert!(!zip.contains("notes/"));

        zip.add_file(EntryOptions::file("b.txt"), b"b").await.unwrap();
        zip.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected_without_writing() {
        let mut zip = archive_of(&[("a.txt", b"hello")]).await;
        let before = zip.get_ref().clone();

        let err = zip
            .add_file(EntryOptions::file("a.txt"), b"other")
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::DuplicateEntry(name) if name == "a.txt"));
        assert_eq!(zip.get_ref(), &before);
        assert_eq!(zip.entries().len(), 1);

        // the writer is still usable
        zip.add_file(EntryOptions::file("b.txt"), b"b").await.unwrap();
        zip.close().await.unwrap();
        assert_eq!(zip.entries().len(), 2);
    }

    #[tokio::test]
    async fn names_are_trimmed_before_comparison() {
        let mut zip = archive_of(&[("a.txt", b"x")]).await;
        let err = zip.add_file(EntryOptions::file("  a.txt "), b"y").await.unwrap_err();
        assert!(matches!(err, ArchiveError::DuplicateEntry(_)));
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let mut zip = ZipStreamWriter::new(Vec::new());
        let err = zip.start_entry(EntryOptions::file("   ")).await.unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidName(_)));
        assert!(zip.get_ref().is_empty());
    }

    #[tokio::test]
    async fn writes_after_close_fail() {
        let mut zip = archive_of(&[("a.txt", b"hello")]).await;
        zip.close().await.unwrap();
        let len = zip.get_ref().len();

        assert!(matches!(
            zip.add_file(EntryOptions::file("b.txt"), b"b").await,
            Err(ArchiveError::StreamClosed)
        ));
        assert!(matches!(zip.close().await, Err(ArchiveError::StreamClosed)));
        assert!(matches!(zip.write_chunk(b"x").await, Err(ArchiveError::StreamClosed)));
        assert_eq!(zip.get_ref().len(), len);
    }

    #[tokio::test]
    async fn only_one_entry_open_at_a_time() {
        let mut zip = ZipStreamWriter::new(Vec::new());
        assert_eq!(zip.entry_state(), None);
        zip.start_entry(EntryOptions::file("a.txt")).await.unwrap();
        assert_eq!(zip.entry_state(), Some(EntryState::HeaderWritten));
        zip.write_chunk(b"abc").await.unwrap();
        assert_eq!(zip.entry_state(), Some(EntryState::Streaming));

        let err = zip.start_entry(EntryOptions::file("b.txt")).await.unwrap_err();
        assert!(matches!(err, ArchiveError::EntryInProgress(name) if name == "a.txt"));
        assert!(matches!(zip.close().await, Err(ArchiveError::EntryInProgress(_))));

        zip.finish_entry().await.unwrap();
        assert_eq!(zip.entry_state(), Some(EntryState::Finalized));
        assert!(matches!(zip.finish_entry().await, Err(ArchiveError::NoActiveEntry)));
        zip.close().await.unwrap();
    }

    #[tokio::test]
    async fn empty_archive_is_just_an_end_record() {
        let mut zip = ZipStreamWriter::new(Vec::new());
        zip.close().await.unwrap();
        let out = zip.into_inner();

        assert_eq!(out.len(), 22);
        assert_eq!(&out[0..4], b"PK\x05\x06");
        assert_eq!(&out[4..], &[0u8; 18]);
    }

    #[tokio::test]
    async fn comments_land_in_the_central_directory() {
        let mut zip = ZipStreamWriter::new(Vec::new());
        zip.add_file(EntryOptions::file("a.txt").with_comment("note"), b"x")
            .await
            .unwrap();
        zip.close().await.unwrap();
        let out = zip.into_inner();

        let cd = 30 + 5 + 1 + 16;
        assert_eq!(LittleEndian::read_u16(&out[cd + 32..cd + 34]), 4);
        assert_eq!(&out[cd + 46 + 5..cd + 46 + 5 + 4], b"note");
    }
}
