// ── Alert lifecycle ──
//
// Alerts are raised by consumers (threshold checks on live data, local
// business logic) and live in a bounded queue until they expire, are
// removed, or are evicted by newer ones.

mod model;
mod queue;

pub use model::{Alert, AlertId, AlertOptions, Severity};
pub use queue::AlertQueue;
