use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

use super::item::ExportItem;

/// Pull contract for the exporter's input.
///
/// The exporter asks for the next item only after the previous one has been
/// completely written, so a source never has more than one item in flight.
/// Sequences are finite and are consumed exactly once.
#[async_trait]
pub trait ItemSource: Send {
    /// The next item, or `None` once the source is exhausted.
    async fn next_item(&mut self) -> Option<ExportItem>;

    /// Total number of items, when known up front. Used for progress reports.
    fn size_hint(&self) -> Option<usize> {
        None
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("duplicate item name: {0}")]
    DuplicateName(String),
}

/// A fully materialized list of items.
pub struct VecSource {
    items: std::vec::IntoIter<ExportItem>,
    total: usize,
}

impl VecSource {
    /// Build a source, rejecting lists in which two items share a name.
    pub fn new(items: Vec<ExportItem>) -> Result<Self, SourceError> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if !seen.insert(item.name.trim()) {
                return Err(SourceError::DuplicateName(item.name.clone()));
            }
        }

        Ok(Self {
            total: items.len(),
            items: items.into_iter(),
        })
    }
}

#[async_trait]
impl ItemSource for VecSource {
    async fn next_item(&mut self) -> Option<ExportItem> {
        self.items.next()
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.total)
    }
}

/// Adapts any iterator, producing items lazily. Name uniqueness is left to
/// the iterator; collisions surface as failed items during export.
pub struct IterSource<I> {
    iter: I,
    total: Option<usize>,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = ExportItem> + Send,
{
    pub fn new(iter: I) -> Self {
        let total = match iter.size_hint() {
            (lower, Some(upper)) if lower == upper => Some(upper),
            _ => None,
        };
        Self { iter, total }
    }
}

#[async_trait]
impl<I> ItemSource for IterSource<I>
where
    I: Iterator<Item = ExportItem> + Send,
{
    async fn next_item(&mut self) -> Option<ExportItem> {
        self.iter.next()
    }

    fn size_hint(&self) -> Option<usize> {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn vec_source_yields_in_order_then_stops() {
        let mut source = VecSource::new(vec![
            ExportItem::text("a.txt", "a"),
            ExportItem::text("b.txt", "b"),
        ])
        .unwrap();

        assert_eq!(source.size_hint(), Some(2));
        assert_eq!(source.next_item().await.unwrap().name, "a.txt");
        assert_eq!(source.next_item().await.unwrap().name, "b.txt");
        assert!(source.next_item().await.is_none());
        assert!(source.next_item().await.is_none());
    }

    #[test]
    fn vec_source_rejects_duplicates() {
        let result = VecSource::new(vec![
            ExportItem::text("a.txt", "a"),
            ExportItem::text("a.txt ", "b"),
        ]);
        assert!(matches!(result, Err(SourceError::DuplicateName(_))));
    }

    #[tokio::test]
    async fn iter_source_reports_exact_sizes_only() {
        let exact = IterSource::new(vec![ExportItem::text("a", "")].into_iter());
        assert_eq!(exact.size_hint(), Some(1));

        let mut lazy = IterSource::new(
            (0..3)
                .map(|i| ExportItem::text(format!("{i}.txt"), ""))
                .filter(|_| true),
        );
        assert_eq!(lazy.size_hint(), None);
        assert_eq!(lazy.next_item().await.unwrap().name, "0.txt");
    }
}
