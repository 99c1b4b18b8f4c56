//! Inactivity timeout policy
//!
//! Two separate mappings exist for a timeout selector such as `"6-months"`:
//!
//! - a block count, embedded in the on-chain contract at creation
//!   ([`TimeoutTable`]), and
//! - a wall-clock duration, which drives the off-chain status machine
//!   ([`parse_timeout`], [`has_elapsed`]).
//!
//! The two are not reconciled. At ~10 minutes per block, 52 000 blocks is
//! roughly a year, not six months.

use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Block count used for selectors missing from the table
pub const DEFAULT_TIMEOUT_BLOCKS: u32 = 52_000;

/// Approximate average block interval
pub const BLOCK_INTERVAL_SECS: u64 = 600;

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: u64 = 24 * SECONDS_PER_HOUR;

/// Selector → on-chain block count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutTable {
    pub blocks: BTreeMap<String, u32>,
    pub default_blocks: u32,
}

impl Default for TimeoutTable {
    fn default() -> Self {
        let blocks = [
            ("3-months", 26_000),
            ("6-months", 52_000),
            ("1-year", 104_000),
            ("5-years", 520_000),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            blocks,
            default_blocks: DEFAULT_TIMEOUT_BLOCKS,
        }
    }
}

impl TimeoutTable {
    /// Block count for `selector`, falling back to the default.
    pub fn blocks_for(&self, selector: &str) -> u32 {
        self.blocks
            .get(selector)
            .copied()
            .unwrap_or(self.default_blocks)
    }

    /// Check that every entry parses as a duration and that block counts
    /// strictly increase with duration.
    pub fn validate(&self) -> Result<(), Error> {
        if self.default_blocks == 0 {
            return Err(Error::InvalidInput(
                "default timeout block count must be positive".into(),
            ));
        }

        let mut entries = Vec::with_capacity(self.blocks.len());
        for (selector, blocks) in &self.blocks {
            let duration = parse_timeout(selector);
            if duration.is_zero() {
                return Err(Error::InvalidInput(format!(
                    "timeout selector '{}' is not a valid duration",
                    selector
                )));
            }
            if *blocks == 0 {
                return Err(Error::InvalidInput(format!(
                    "timeout selector '{}' maps to zero blocks",
                    selector
                )));
            }
            entries.push((duration, *blocks, selector.as_str()));
        }

        entries.sort_by_key(|(duration, _, _)| *duration);
        for pair in entries.windows(2) {
            let (shorter, longer) = (&pair[0], &pair[1]);
            if longer.1 <= shorter.1 {
                return Err(Error::InvalidInput(format!(
                    "timeout table not monotonic: '{}' ({} blocks) is not above '{}' ({} blocks)",
                    longer.2, longer.1, shorter.2, shorter.1
                )));
            }
        }
        Ok(())
    }
}

/// Parse a `"<value>-<unit>"` selector into a wall-clock duration.
///
/// Only the first two `-` separated fields are read, so `"60-seconds-x"`
/// is 60 seconds. Months count as 30 days and years as 365. Anything
/// unparseable yields a zero duration, which never elapses.
pub fn parse_timeout(selector: &str) -> Duration {
    let lowered = selector.trim().to_ascii_lowercase();
    let mut fields = lowered.split('-');
    let (Some(value), Some(unit)) = (fields.next(), fields.next()) else {
        return Duration::ZERO;
    };
    let Ok(value) = value.trim().parse::<u64>() else {
        return Duration::ZERO;
    };

    let unit_secs = match unit.trim() {
        "second" | "seconds" => 1,
        "minute" | "minutes" => SECONDS_PER_MINUTE,
        "hour" | "hours" => SECONDS_PER_HOUR,
        "day" | "days" => SECONDS_PER_DAY,
        "week" | "weeks" => 7 * SECONDS_PER_DAY,
        "month" | "months" => 30 * SECONDS_PER_DAY,
        "year" | "years" => 365 * SECONDS_PER_DAY,
        _ => return Duration::ZERO,
    };

    value
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .unwrap_or(Duration::ZERO)
}

/// Time since `created_at`, or `None` when `now` is before it.
fn elapsed_since(created_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    now.signed_duration_since(created_at).to_std().ok()
}

/// Whether the inactivity period named by `selector` has run out.
pub fn has_elapsed(selector: &str, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let timeout = parse_timeout(selector);
    if timeout.is_zero() {
        return false;
    }
    elapsed_since(created_at, now).is_some_and(|elapsed| elapsed >= timeout)
}

/// Time left until the period runs out.
///
/// `None` for selectors that never elapse; zero once elapsed.
pub fn remaining(selector: &str, created_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    let timeout = parse_timeout(selector);
    if timeout.is_zero() {
        return None;
    }
    let elapsed = elapsed_since(created_at, now).unwrap_or(Duration::ZERO);
    Some(timeout.saturating_sub(elapsed))
}

/// Rough wall-clock equivalent of a block count.
pub fn estimated_duration(blocks: u32) -> Duration {
    Duration::from_secs(u64::from(blocks) * BLOCK_INTERVAL_SECS)
}
