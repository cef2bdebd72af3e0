//! Admin override
//!
//! Out-of-band edits to the countdown, hints and secrets. Validation is
//! all-or-nothing: every present field is checked before any of them is
//! turned into a mutation, and the mutation is committed as a single CAS.
//!
//! Besides the sparse [`AdminUpdate`], the game-master panel has two
//! incremental edits: moving the deadline relative to now and appending a
//! hint. Both derive their mutation from the snapshot they were given, so
//! a concurrent edit surfaces as a version conflict instead of a lost update.

use crate::error::{HourglassError, Result};
use crate::orchestrator::StateMutation;
use crate::types::{GameState, MasterCodes, StagePins};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sparse admin update
///
/// An absent or `null` field leaves state untouched; a present empty value
/// (`[]`, `""`) is applied as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminUpdate {
    /// New countdown deadline (ISO-8601)
    pub target_time: Option<String>,
    /// Replacement hint list
    pub hints: Option<Vec<String>>,
    /// Replacement room passphrase
    pub passphrase: Option<String>,
    /// Replacement stage PINs (exactly two)
    pub puzzle_1b_pins: Option<Vec<String>>,
}

impl AdminUpdate {
    /// Empty update
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With target time
    #[inline]
    #[must_use]
    pub fn with_target_time(mut self, target_time: impl Into<String>) -> Self {
        self.target_time = Some(target_time.into());
        self
    }

    /// With hints
    #[inline]
    #[must_use]
    pub fn with_hints(mut self, hints: Vec<String>) -> Self {
        self.hints = Some(hints);
        self
    }

    /// With passphrase
    #[inline]
    #[must_use]
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// With stage PINs
    #[inline]
    #[must_use]
    pub fn with_pins(mut self, pins: Vec<String>) -> Self {
        self.puzzle_1b_pins = Some(pins);
        self
    }
}

/// Parse an ISO-8601 timestamp
///
/// Accepts RFC 3339 (`2025-05-01T18:30:00+02:00`), a naive date-time
/// (`2025-05-01T18:30:00`, `T` or space separated, optional fraction) or a
/// bare date; naive values are taken as UTC.
///
/// # Errors
/// - `HourglassError::Validation` if nothing matches
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }
    Err(HourglassError::Validation(format!(
        "invalid target_time: {raw:?} is not an ISO-8601 timestamp"
    )))
}

/// Validate `update` and turn it into a mutation of `current`
///
/// # Errors
/// - `HourglassError::Validation` if any present field is malformed; no
///   mutation is produced in that case
pub fn apply_admin_update(current: &GameState, update: AdminUpdate) -> Result<StateMutation> {
    let target_time = update
        .target_time
        .as_deref()
        .map(parse_timestamp)
        .transpose()?;

    let pins = update
        .puzzle_1b_pins
        .map(StagePins::try_from)
        .transpose()
        .map_err(|reason| HourglassError::Validation(format!("invalid puzzle_1b_pins: {reason}")))?;

    let mut mutation = StateMutation::new();
    if let Some(target_time) = target_time {
        mutation = mutation.with_target_time(target_time);
    }
    if let Some(hints) = update.hints {
        mutation = mutation.with_hints(hints);
    }
    if update.passphrase.is_some() || pins.is_some() {
        let mut codes: MasterCodes = current.master_codes.clone();
        if let Some(passphrase) = update.passphrase {
            codes.passphrase = passphrase;
        }
        if let Some(pins) = pins {
            codes.puzzle_1b_pins = pins;
        }
        mutation = mutation.with_master_codes(codes);
    }
    Ok(mutation)
}

/// Deadline `minutes_from_now` minutes after `now`; negative values lie in the past
///
/// # Errors
/// - `HourglassError::Validation` if the offset is out of range
pub fn deadline_from_now(now: DateTime<Utc>, minutes_from_now: i64) -> Result<DateTime<Utc>> {
    Duration::try_minutes(minutes_from_now)
        .and_then(|offset| now.checked_add_signed(offset))
        .ok_or_else(|| {
            HourglassError::Validation(format!(
                "invalid minutes_from_now: {minutes_from_now} is out of range"
            ))
        })
}

/// Mutation appending `hint` to the hints of `current`
///
/// # Errors
/// - `HourglassError::Validation` if the hint is blank
pub fn append_hint(current: &GameState, hint: &str) -> Result<StateMutation> {
    let hint = hint.trim();
    if hint.is_empty() {
        return Err(HourglassError::Validation("hint must not be empty".to_string()));
    }
    let mut hints = current.hints.clone();
    hints.push(hint.to_string());
    Ok(StateMutation::new().with_hints(hints))
}
