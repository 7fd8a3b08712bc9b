use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWrite;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::item::{DIAGNOSTIC_SUFFIX, EntryBody, ItemKind, ReadyEntry, numbered_diagnostic_name};
use super::source::ItemSource;
use crate::fetch::{RateLimiter, ResilientFetcher, Resolution};
use crate::io::Fetch;
use crate::zip::{ArchiveError, ArchiveResult, EntryOptions, ZipStreamWriter};

/// Reported once per item, after it has been written (or replaced).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent<'a> {
    pub current: usize,
    /// Known total, or `current` for sources that cannot tell.
    pub total: usize,
    /// Name of the entry actually written, i.e. the `.error.txt` name for
    /// substituted items. If not even a placeholder could be written this
    /// is the item's own name and nothing was added to the archive.
    pub name: &'a str,
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    Completed,
    /// The overall deadline passed; the archive holds the items written so far.
    TimedOut,
    /// The cancellation token fired; the archive holds the items written so far.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    /// Items written, including substituted ones.
    pub total_items: usize,
    /// Items replaced by a diagnostic entry.
    pub failed_items: usize,
    pub bytes_written: u64,
    pub outcome: ExportOutcome,
}

/// Failures that stop the export as a whole.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("an export is already running")]
    Busy,

    #[error("writing the archive failed: {0}")]
    Sink(#[source] std::io::Error),

    #[error(transparent)]
    Archive(ArchiveError),
}

impl From<ArchiveError> for ExportError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Io(io) => ExportError::Sink(io),
            other => ExportError::Archive(other),
        }
    }
}

/// Shared "an export is running" indicator, cleared however the export ends.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn try_acquire(&self) -> Option<BusyGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(self.clone()))
    }
}

struct BusyGuard(BusyFlag);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.0.store(false, Ordering::Release);
    }
}

/// Drives an [`ItemSource`] through the resilient fetcher into a
/// [`ZipStreamWriter`].
///
/// Items are handled strictly one at a time: the next item is pulled only
/// once the previous one is fully framed. A failing item never aborts the
/// export; it is written as `<name>.error.txt` and counted as failed. Only
/// sink failures and writer misuse end the export with an error.
///
/// When the overall timeout passes or the cancellation token fires, the
/// in-flight acquisition is dropped, no further items are pulled, and the
/// archive is closed over the entries already written. The sink therefore
/// always receives a complete, readable archive.
pub struct Exporter<F> {
    fetcher: ResilientFetcher<F>,
    limiter: RateLimiter,
    overall_timeout: Duration,
    cancel: CancellationToken,
    busy: BusyFlag,
}

impl<F: Fetch> Exporter<F> {
    pub const DEFAULT_OVERALL_TIMEOUT: Duration = Duration::from_secs(180);

    pub fn new(fetcher: ResilientFetcher<F>, limiter: RateLimiter) -> Self {
        Self {
            fetcher,
            limiter,
            overall_timeout: Self::DEFAULT_OVERALL_TIMEOUT,
            cancel: CancellationToken::new(),
            busy: BusyFlag::new(),
        }
    }

    pub fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_busy_flag(mut self, busy: BusyFlag) -> Self {
        self.busy = busy;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn busy_flag(&self) -> BusyFlag {
        self.busy.clone()
    }

    pub fn fetcher(&self) -> &ResilientFetcher<F> {
        &self.fetcher
    }

    /// Export every item `source` yields into a ZIP archive written to `sink`.
    ///
    /// `on_progress` is called after each item. The sink is flushed and shut
    /// down once the central directory has been written.
    ///
    /// # Errors
    ///
    /// - [`ExportError::Busy`] if the busy flag is already set
    /// - [`ExportError::Sink`] if writing to the sink fails
    /// - [`ExportError::Archive`] if the archive outgrows the 32-bit format
    pub async fn export<S, W, P>(
        &mut self,
        source: &mut S,
        sink: W,
        mut on_progress: P,
    ) -> Result<ExportResult, ExportError>
    where
        S: ItemSource + ?Sized,
        W: AsyncWrite + Unpin,
        P: FnMut(ProgressEvent<'_>),
    {
        let _busy = self.busy.try_acquire().ok_or(ExportError::Busy)?;

        let deadline = Instant::now() + self.overall_timeout;
        let cancel = self.cancel.clone();
        let total_hint = source.size_hint();
        let mut zip = ZipStreamWriter::new(sink);

        let mut current = 0usize;
        let mut failed = 0usize;
        let mut outcome = ExportOutcome::Completed;
        let mut previous: Option<ItemKind> = None;

        info!(
            total = ?total_hint,
            timeout_secs = self.overall_timeout.as_secs(),
            "export started"
        );

        loop {
            if cancel.is_cancelled() {
                outcome = ExportOutcome::Cancelled;
                break;
            }

            let fetcher = &self.fetcher;
            let limiter = &mut self.limiter;
            let step = async {
                let item = source.next_item().await?;
                if let Some(kind) = previous {
                    limiter.pause_after(kind).await;
                }
                let kind = item.kind();
                Some((kind, fetcher.resolve(item, &cancel).await))
            };

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    outcome = ExportOutcome::Cancelled;
                    break;
                }
                _ = sleep_until(deadline) => {
                    outcome = ExportOutcome::TimedOut;
                    break;
                }
                next = step => next,
            };

            let Some((kind, resolution)) = next else {
                break;
            };
            previous = Some(kind);
            current += 1;

            let (name, success) = frame(&mut zip, resolution).await?;
            if !success {
                failed += 1;
            }

            let total = total_hint.map_or(current, |t| t.max(current));
            on_progress(ProgressEvent {
                current,
                total,
                name: &name,
                success,
            });
        }

        match outcome {
            ExportOutcome::Completed => {}
            ExportOutcome::TimedOut => warn!(
                written = current,
                "export timed out, closing archive with the items written so far"
            ),
            ExportOutcome::Cancelled => warn!(
                written = current,
                "export cancelled, closing archive with the items written so far"
            ),
        }

        zip.close().await?;

        let result = ExportResult {
            total_items: current,
            failed_items: failed,
            bytes_written: zip.bytes_written(),
            outcome,
        };
        info!(
            total = result.total_items,
            failed = result.failed_items,
            bytes = result.bytes_written,
            outcome = ?result.outcome,
            "export finished"
        );
        Ok(result)
    }
}

/// Write one resolved item, substituting a diagnostic if the writer refuses
/// it. Returns the name written and whether the original item made it.
async fn frame<W: AsyncWrite + Unpin>(
    zip: &mut ZipStreamWriter<W>,
    resolution: Resolution,
) -> Result<(String, bool), ExportError> {
    match resolution {
        Resolution::Ready(entry) => match write_entry(zip, &entry).await {
            Ok(()) => Ok((entry.name, true)),
            Err(err) if err.is_entry_rejection() => {
                warn!(item = %entry.name, error = %err, "entry rejected, substituting");
                let message = format!(
                    "Failed to add file: {}\nContent length: {}\n",
                    err,
                    entry.len()
                );
                let diagnostic = ReadyEntry::diagnostic(&entry.name, message);
                let name = write_diagnostic(zip, &entry.name, diagnostic).await?;
                Ok((name, false))
            }
            Err(err) => Err(err.into()),
        },
        Resolution::Substituted { entry, .. } => {
            let original = entry
                .name
                .strip_suffix(DIAGNOSTIC_SUFFIX)
                .unwrap_or(&entry.name)
                .to_string();
            Ok((write_diagnostic(zip, &original, entry).await?, false))
        }
    }
}

/// How many numbered names a diagnostic may try before the item is dropped.
const MAX_DIAGNOSTIC_NAMES: usize = 16;

/// Write the placeholder for `original`, numbering it if the plain
/// `.error.txt` name is taken. Returns the name actually written, or
/// `original` when no placeholder could be written at all.
async fn write_diagnostic<W: AsyncWrite + Unpin>(
    zip: &mut ZipStreamWriter<W>,
    original: &str,
    mut entry: ReadyEntry,
) -> Result<String, ExportError> {
    let mut n = 1;
    loop {
        match write_entry(zip, &entry).await {
            Ok(()) => return Ok(entry.name),
            Err(ArchiveError::DuplicateEntry(_)) if n < MAX_DIAGNOSTIC_NAMES => {
                n += 1;
                entry.name = numbered_diagnostic_name(original, n);
            }
            Err(err) if err.is_entry_rejection() => {
                error!(
                    item = %original,
                    error = %err,
                    "no diagnostic entry could be written, item dropped"
                );
                return Ok(original.to_string());
            }
            Err(err) => return Err(err.into()),
        }
    }
}

async fn write_entry<W: AsyncWrite + Unpin>(
    zip: &mut ZipStreamWriter<W>,
    entry: &ReadyEntry,
) -> ArchiveResult<()> {
    let mut options = match entry.body {
        EntryBody::Directory => EntryOptions::directory(&entry.name),
        EntryBody::Bytes(_) => EntryOptions::file(&entry.name),
    };
    if let Some(modified) = entry.modified {
        options = options.with_modified(modified);
    }

    match &entry.body {
        EntryBody::Bytes(data) => zip.add_file(options, data).await,
        EntryBody::Directory => zip.start_entry(options).await,
    }
}
