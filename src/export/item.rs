use bytes::Bytes;
use chrono::NaiveDateTime;

/// Suffix given to the placeholder written in place of a failed item.
pub const DIAGNOSTIC_SUFFIX: &str = ".error.txt";

/// How an item's bytes are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Text,
    Blob,
    Remote,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemPayload {
    /// Inline text, stored as UTF-8.
    Text(String),
    /// Inline binary data.
    Blob(Bytes),
    /// URL to download at export time.
    Remote(String),
    /// A folder entry with no content.
    Directory,
}

/// One named unit handed to the exporter. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportItem {
    pub name: String,
    pub payload: ItemPayload,
    pub modified: Option<NaiveDateTime>,
}

impl ExportItem {
    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(name, ItemPayload::Text(content.into()))
    }

    pub fn blob(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::new(name, ItemPayload::Blob(data.into()))
    }

    pub fn remote(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(name, ItemPayload::Remote(url.into()))
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, ItemPayload::Directory)
    }

    fn new(name: impl Into<String>, payload: ItemPayload) -> Self {
        Self {
            name: name.into(),
            payload,
            modified: None,
        }
    }

    pub fn with_modified(mut self, modified: NaiveDateTime) -> Self {
        self.modified = Some(modified);
        self
    }

    pub fn kind(&self) -> ItemKind {
        match self.payload {
            ItemPayload::Text(_) => ItemKind::Text,
            ItemPayload::Blob(_) => ItemKind::Blob,
            ItemPayload::Remote(_) => ItemKind::Remote,
            ItemPayload::Directory => ItemKind::Directory,
        }
    }
}

/// Name of the placeholder that replaces `name` when it cannot be exported.
pub fn diagnostic_name(name: &str) -> String {
    format!("{}{}", name.trim(), DIAGNOSTIC_SUFFIX)
}

/// Fallback placeholder name used when `diagnostic_name(name)` is already
/// taken: `<name>.error-<n>.txt`.
pub fn numbered_diagnostic_name(name: &str, n: usize) -> String {
    format!("{}.error-{n}.txt", name.trim())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryBody {
    Bytes(Bytes),
    Directory,
}

/// An item whose bytes are in hand and which can be framed right away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyEntry {
    pub name: String,
    pub body: EntryBody,
    pub modified: Option<NaiveDateTime>,
}

impl ReadyEntry {
    pub fn new(name: impl Into<String>, body: EntryBody, modified: Option<NaiveDateTime>) -> Self {
        Self {
            name: name.into(),
            body,
            modified,
        }
    }

    /// Placeholder text entry standing in for `original_name`.
    pub fn diagnostic(original_name: &str, message: impl Into<String>) -> Self {
        Self {
            name: diagnostic_name(original_name),
            body: EntryBody::Bytes(Bytes::from(message.into())),
            modified: None,
        }
    }

    pub fn len(&self) -> usize {
        match &self.body {
            EntryBody::Bytes(b) => b.len(),
            EntryBody::Directory => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
