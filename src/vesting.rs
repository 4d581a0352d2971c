//! Vesting schedules
//!
//! ```text
//! anchor        anchor+cliff   +window/12  +2*window/12  ...  anchor+duration
//!   |---- cliff ----|-------------|-------------|---- ... -------|
//!                  0 units     total/12      total/12          total/12
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::TokenError;

/// Number of equal release periods.
pub const VESTING_PERIODS: u64 = 12;

/// One release point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingEntry {
    /// Units released, zero for the cliff marker
    pub amount: U256,
    /// Unix seconds
    pub timestamp: u64,
}

/// What to do with `total % 12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RemainderPolicy {
    /// Drop the remainder. Matches the deployed contract.
    #[default]
    Truncate,
    /// Release the remainder in an extra entry at the final timestamp, so the
    /// schedule sums to the total.
    DustEntry,
}

/// Time-ordered release plan. Timestamps never decrease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingSchedule {
    entries: Vec<VestingEntry>,
}

impl VestingSchedule {
    /// Build a schedule anchored at `anchor` (Unix seconds).
    ///
    /// With a non-zero cliff the first entry is a zero-amount marker at
    /// `anchor + cliff_duration`. Twelve entries of `total_amount / 12` then
    /// follow, entry `i` at `anchor + cliff_duration + window * i / 12` where
    /// `window = duration - cliff_duration`. The last entry always lands on
    /// `anchor + duration`. A zero window puts all twelve on the cliff.
    pub fn build(
        anchor: u64,
        total_amount: U256,
        duration: u64,
        cliff_duration: u64,
        policy: RemainderPolicy,
    ) -> Result<Self, TokenError> {
        if cliff_duration > duration {
            return Err(TokenError::InvalidVesting(format!(
                "cliff {}s exceeds duration {}s",
                cliff_duration, duration
            )));
        }
        let window = duration - cliff_duration;
        let vesting_start = anchor.checked_add(cliff_duration).ok_or_else(overflow)?;
        let vesting_end = anchor.checked_add(duration).ok_or_else(overflow)?;

        let periods = U256::from(VESTING_PERIODS);
        let period_amount = total_amount / periods;

        let mut entries = Vec::with_capacity(VESTING_PERIODS as usize + 2);
        if cliff_duration > 0 {
            entries.push(VestingEntry {
                amount: U256::ZERO,
                timestamp: vesting_start,
            });
        }
        entries.extend((1..=VESTING_PERIODS).map(|i| VestingEntry {
            amount: period_amount,
            timestamp: release_time(vesting_start, window, i),
        }));

        let dust = total_amount % periods;
        if policy == RemainderPolicy::DustEntry && !dust.is_zero() {
            entries.push(VestingEntry {
                amount: dust,
                timestamp: vesting_end,
            });
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[VestingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VestingEntry> {
        self.entries.iter()
    }

    /// Sum of all entry amounts.
    pub fn total_released(&self) -> U256 {
        self.entries.iter().fold(U256::ZERO, |acc, entry| acc + entry.amount)
    }

    /// Units released by `timestamp`, inclusive.
    pub fn released_at(&self, timestamp: u64) -> U256 {
        self.entries
            .iter()
            .take_while(|entry| entry.timestamp <= timestamp)
            .fold(U256::ZERO, |acc, entry| acc + entry.amount)
    }
}

impl IntoIterator for VestingSchedule {
    type Item = VestingEntry;
    type IntoIter = std::vec::IntoIter<VestingEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a VestingSchedule {
    type Item = &'a VestingEntry;
    type IntoIter = std::slice::Iter<'a, VestingEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn overflow() -> TokenError {
    TokenError::InvalidVesting("schedule extends past u64 timestamps".to_string())
}

// Never exceeds `start + window`, which the caller has already bounds-checked.
fn release_time(start: u64, window: u64, period: u64) -> u64 {
    start + (u128::from(window) * u128::from(period) / u128::from(VESTING_PERIODS)) as u64
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
