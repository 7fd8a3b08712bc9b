//! # feedzip
//!
//! Export captured social-media posts, with their downloaded media, as a
//! ZIP archive that is streamed to its sink while it is being built.
//!
//! The archive uses the "stored" method with trailing data descriptors, so
//! no entry has to be buffered or seeked back to: each item's bytes go
//! straight to the sink, and only the central directory is held until
//! [`ZipStreamWriter::close`].
//!
//! Remote media is fetched one item at a time with per-attempt timeouts,
//! linear backoff and jittered pacing. An item that still fails is written
//! as `<name>.error.txt` instead of being dropped.
//!
//! ## Example
//!
//! ```no_run
//! use feedzip::{ExportConfig, ExportItem, HttpFetcher, VecSource};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ExportConfig::default();
//!     let mut exporter = config.exporter(HttpFetcher::new(&config.user_agent)?);
//!
//!     let mut source = VecSource::new(vec![
//!         ExportItem::text("notes/readme.txt", "hello"),
//!         ExportItem::remote("notes/photo.jpg", "https://example.com/photo.jpg"),
//!     ])?;
//!
//!     let sink = tokio::fs::File::create("out.zip").await?;
//!     let result = exporter
//!         .export(&mut source, sink, |p| println!("{}/{} {}", p.current, p.total, p.name))
//!         .await?;
//!     println!("{} items, {} failed", result.total_items, result.failed_items);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod export;
pub mod fetch;
pub mod io;
pub mod posts;
pub mod zip;

pub use cli::Cli;
pub use config::ExportConfig;
pub use export::{ExportError, ExportItem, ExportOutcome, ExportResult, Exporter, ItemSource, VecSource};
pub use io::{Fetch, FetchError, HttpFetcher};
pub use zip::{ArchiveError, EntryOptions, ZipStreamWriter};
