//! Append-only event/actor recorder.
//!
//! Every mutating manager operation calls [`AuditLog::record_call`] on entry,
//! before the operation body runs, so attempts are recorded whether or not
//! they succeed. The recorder itself is the one call path excluded from its
//! own instrumentation; auditing it would recurse forever.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use tracing::warn;

use crate::db::{AuditEntry, Store};
use crate::error::{Error, Result};

/// Synthetic actor for calls made without an attributable human actor.
pub const SYSTEM_ACTOR: i64 = 0;

pub struct AuditLog {
    store: Store,
}

impl AuditLog {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Appends one event row, then one actor row per id. Returns the event id.
    pub async fn record(&self, description: &str, actor_ids: &[i64]) -> Result<i64> {
        let timestamp = Utc::now().timestamp();
        let id = self
            .store
            .append_event(description, timestamp, actor_ids)
            .await?;
        Ok(id)
    }

    /// Entry wrapper for mutating operations: records
    /// `"<operation>(<args>)"` attributed to the System actor. A failed audit
    /// write is reported to the diagnostic log but never aborts the
    /// operation it wraps.
    pub async fn record_call(&self, operation: &str, args: &str) {
        let description = format!("{operation}({args})");
        if let Err(err) = self.record(&description, &[SYSTEM_ACTOR]).await {
            warn!(operation, "audit write failed: {err}");
        }
    }

    /// Events at or after a flexibly formatted point in time, ascending.
    pub async fn logs_since(&self, input: &str) -> Result<Vec<AuditEntry>> {
        let since = parse_point_in_time(input)?;
        let entries = self.store.events_since(since).await?;
        Ok(entries)
    }
}

/// Accepts a bare unix epoch, RFC 3339, `YYYY-MM-DD HH:MM[:SS]`, or a bare
/// date. Anything else is a [`Error::ParseFailure`], never a crash.
pub fn parse_point_in_time(input: &str) -> Result<i64> {
    let input = input.trim();

    if let Ok(epoch) = input.parse::<i64>() {
        return Ok(epoch);
    }

    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(input) {
        return Ok(parsed.timestamp());
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(naive.and_utc().timestamp());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc().timestamp());
        }
    }

    Err(Error::ParseFailure(format!("date/time `{input}`")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flexible_inputs() {
        assert_eq!(parse_point_in_time("0").unwrap(), 0);
        assert_eq!(parse_point_in_time(" 1535659200 ").unwrap(), 1_535_659_200);
        assert_eq!(
            parse_point_in_time("2018-08-30T20:00:00+00:00").unwrap(),
            1_535_659_200
        );
        assert_eq!(
            parse_point_in_time("2018-08-30 20:00:00").unwrap(),
            1_535_659_200
        );
        assert_eq!(
            parse_point_in_time("2018-08-30").unwrap(),
            1_535_587_200
        );
    }

    #[test]
    fn rejects_garbage_with_parse_failure() {
        let err = parse_point_in_time("last tuesday-ish").unwrap_err();
        assert!(matches!(err, Error::ParseFailure(_)));
    }
}
