//! Export pipeline: items in, one ZIP archive out.
//!
//! An [`ItemSource`] yields [`ExportItem`]s lazily. The [`Exporter`] pulls
//! them one at a time, resolves each to bytes through the resilient fetcher,
//! frames it with the streaming writer, and reports progress after every
//! item.

mod exporter;
mod item;
mod source;

pub use exporter::{BusyFlag, ExportError, ExportOutcome, ExportResult, Exporter, ProgressEvent};
pub use item::{
    DIAGNOSTIC_SUFFIX, EntryBody, ExportItem, ItemKind, ItemPayload, ReadyEntry, diagnostic_name,
    numbered_diagnostic_name,
};
pub use source::{ItemSource, IterSource, SourceError, VecSource};
