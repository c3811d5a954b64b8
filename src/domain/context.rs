//! Operation Context
//!
//! Who performs an operation and when, used for audit fields.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Context for an operation, used for auditing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationContext {
    /// Actor recorded in `created_by` / `updated_by` / `deleted_by`
    pub actor: String,

    /// Fixed clock reading; `None` means "now"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<DateTime<Utc>>,
}

impl OperationContext {
    /// Create a context for the given actor
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            occurred_at: None,
        }
    }

    /// Context for work initiated by the system itself
    pub fn system() -> Self {
        Self::new("system")
    }

    /// Pin the clock to a specific instant
    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }

    /// Instant to stamp on events produced under this context
    ///
    /// Truncated to microseconds, the precision of a Postgres `TIMESTAMPTZ`.
    pub fn now(&self) -> DateTime<Utc> {
        self.occurred_at.unwrap_or_else(Utc::now).trunc_subsecs(6)
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_context_builder() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();

        let context = OperationContext::new("alice").at(at);

        assert_eq!(context.actor, "alice");
        assert_eq!(context.now(), at);
    }

    #[test]
    fn test_unpinned_clock_moves() {
        let context = OperationContext::system();
        let before = Utc::now();
        assert!(context.now() >= before);
    }

    #[test]
    fn test_clock_has_microsecond_precision() {
        let unpinned = OperationContext::new("alice").now();
        assert_eq!(unpinned.timestamp_subsec_nanos() % 1_000, 0);

        let at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        let pinned = OperationContext::new("alice").at(at).now();
        assert_eq!(pinned.timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn test_default_is_system_actor() {
        assert_eq!(OperationContext::default().actor, "system");
    }
}
