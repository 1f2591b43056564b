// ── Snapshot cells ──
//
// A snapshot is a whole collection plus its freshness marker. Every
// transition replaces the value inside one `watch` send, so readers
// never observe a half-applied refresh.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::stream::SnapshotStream;

/// Freshness of a snapshot: `Empty → Loading → Fresh → Stale → Loading → …`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Freshness {
    /// Never fetched.
    Empty,
    /// A fetch is in flight.
    Loading,
    /// Matches the backend as of `fetched_at`.
    Fresh,
    /// Known or suspected to be out of date.
    Stale,
}

/// An immutable view of one server-owned collection.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub items: Arc<Vec<T>>,
    pub freshness: Freshness,
    /// When `items` were fetched. `None` until the first success.
    pub fetched_at: Option<DateTime<Utc>>,
    /// Message of the most recent failed fetch, cleared on success.
    pub last_error: Option<String>,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(Vec::new()),
            freshness: Freshness::Empty,
            fetched_at: None,
            last_error: None,
        }
    }
}

impl<T> Snapshot<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.freshness == Freshness::Loading
    }

    /// Whether any fetch has ever succeeded.
    pub fn has_data(&self) -> bool {
        self.fetched_at.is_some()
    }
}

/// Owner side of a snapshot. Only the aggregator holds one.
pub(crate) struct SnapshotCell<T> {
    tx: watch::Sender<Snapshot<T>>,
}

impl<T: Clone + Send + Sync + 'static> SnapshotCell<T> {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(Snapshot::default());
        Self { tx }
    }

    pub(crate) fn current(&self) -> Snapshot<T> {
        self.tx.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> SnapshotStream<T> {
        SnapshotStream::new(self.tx.subscribe())
    }

    /// `Fresh → Stale`. Other states are left alone: an empty snapshot
    /// has nothing to go stale and a loading one is already refreshing.
    pub(crate) fn mark_stale(&self) {
        self.transition(|snap| {
            if snap.freshness != Freshness::Fresh {
                return false;
            }
            snap.freshness = Freshness::Stale;
            true
        });
    }

    pub(crate) fn begin_loading(&self) {
        self.transition(|snap| {
            if snap.freshness == Freshness::Loading {
                return false;
            }
            snap.freshness = Freshness::Loading;
            true
        });
    }

    /// Replace the whole collection.
    pub(crate) fn complete(&self, items: Vec<T>) {
        self.tx.send_replace(Snapshot {
            items: Arc::new(items),
            freshness: Freshness::Fresh,
            fetched_at: Some(Utc::now()),
            last_error: None,
        });
    }

    /// Keep the last items; fall back to `Stale` (or `Empty` if nothing
    /// was ever fetched) and record the error.
    pub(crate) fn fail(&self, error: String) {
        self.transition(|snap| {
            snap.freshness = if snap.has_data() {
                Freshness::Stale
            } else {
                Freshness::Empty
            };
            snap.last_error = Some(error);
            true
        });
    }

    /// Undo `begin_loading` for a fetch that will never complete.
    pub(crate) fn abandon_loading(&self) {
        self.transition(|snap| {
            if snap.freshness != Freshness::Loading {
                return false;
            }
            snap.freshness = if snap.has_data() {
                Freshness::Stale
            } else {
                Freshness::Empty
            };
            true
        });
    }

    pub(crate) fn reset(&self) {
        self.tx.send_replace(Snapshot::default());
    }

    fn transition(&self, f: impl FnOnce(&mut Snapshot<T>) -> bool) {
        self.tx.send_if_modified(f);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let cell = SnapshotCell::<u32>::new();
        let snap = cell.current();
        assert_eq!(snap.freshness, Freshness::Empty);
        assert!(snap.is_empty());
        assert!(!snap.has_data());
    }

    #[test]
    fn full_cycle() {
        let cell = SnapshotCell::new();

        cell.begin_loading();
        assert_eq!(cell.current().freshness, Freshness::Loading);

        cell.complete(vec![1, 2, 3]);
        let snap = cell.current();
        assert_eq!(snap.freshness, Freshness::Fresh);
        assert_eq!(*snap.items, vec![1, 2, 3]);

        cell.mark_stale();
        assert_eq!(cell.current().freshness, Freshness::Stale);

        cell.begin_loading();
        cell.complete(vec![4]);
        assert_eq!(*cell.current().items, vec![4]);
    }

    #[test]
    fn mark_stale_only_affects_fresh() {
        let cell = SnapshotCell::<u32>::new();
        cell.mark_stale();
        assert_eq!(cell.current().freshness, Freshness::Empty);

        cell.begin_loading();
        cell.mark_stale();
        assert_eq!(cell.current().freshness, Freshness::Loading);
    }

    #[test]
    fn failure_keeps_last_items() {
        let cell = SnapshotCell::new();
        cell.complete(vec!["a"]);
        cell.begin_loading();
        cell.fail("HTTP 500".into());

        let snap = cell.current();
        assert_eq!(snap.freshness, Freshness::Stale);
        assert_eq!(*snap.items, vec!["a"]);
        assert_eq!(snap.last_error.as_deref(), Some("HTTP 500"));
    }

    #[test]
    fn failure_before_first_fetch_stays_empty() {
        let cell = SnapshotCell::<u32>::new();
        cell.begin_loading();
        cell.fail("offline".into());
        assert_eq!(cell.current().freshness, Freshness::Empty);
    }

    #[test]
    fn abandoned_fetch_falls_back() {
        let cell = SnapshotCell::new();
        cell.begin_loading();
        cell.abandon_loading();
        assert_eq!(cell.current().freshness, Freshness::Empty);

        cell.complete(vec![1]);
        cell.begin_loading();
        cell.abandon_loading();
        assert_eq!(cell.current().freshness, Freshness::Stale);
    }

    #[test]
    fn readers_hold_their_own_copy() {
        let cell = SnapshotCell::new();
        cell.complete(vec![1]);
        let held = cell.current();
        cell.complete(vec![2]);
        assert_eq!(*held.items, vec![1]);
    }
}
