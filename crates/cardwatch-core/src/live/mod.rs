// ── Live event layer ──
//
// Stream client, per-kind dispatcher and the connection monitor they
// feed. Data flows one way: wire → client → dispatcher → handlers.

mod client;
mod dispatch;
mod monitor;

pub use client::{CONNECTION_LOST, FAILED_TO_CONNECT, LifecycleHooks, StreamClient};
pub use dispatch::{EventDispatcher, EventKind, Handler};
pub use monitor::{ConnectionMonitor, ConnectionState, label_for};
