//! Timezone module
//!
//! Day boundaries for snapshots and time-travel reads, and the startup check
//! that regenerates the read side when the configured zone changes.

mod reconcile;
mod zone;

pub use reconcile::{reconcile_timezone, Reconciliation, TIMEZONE_KEY};
pub use zone::{DayBoundary, TimezoneError, Zone};
