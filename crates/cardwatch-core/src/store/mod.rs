// ── Snapshot store ──
//
// Server-owned collections cached client-side, refreshed by pull.

mod aggregator;
mod snapshot;

pub use aggregator::{SnapshotKind, StateAggregator};
pub use snapshot::{Freshness, Snapshot};
