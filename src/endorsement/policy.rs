use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::endorsement::{
    error::{EndorsementError, internal_error},
    types::PaperWindow,
};

fn default_lookback_days() -> i64 {
    5 * 365 + 1
}

fn default_lookahead_cutoff_days() -> i64 {
    91
}

fn default_positive_point_value() -> i32 {
    10
}

fn default_endorsement_threshold() -> i32 {
    10
}

/// Range of paper dates that count towards an endorsee's own eligibility:
/// from `lookback_days` ago up to `lookahead_cutoff_days` ago.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityWindow {
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    #[serde(default = "default_lookahead_cutoff_days")]
    pub lookahead_cutoff_days: i64,
}

impl Default for EligibilityWindow {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            lookahead_cutoff_days: default_lookahead_cutoff_days(),
        }
    }
}

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

fn days_before(now: OffsetDateTime, days: i64) -> Option<OffsetDateTime> {
    let seconds = days.checked_mul(SECONDS_PER_DAY)?;
    now.checked_sub(Duration::seconds(seconds))
}

impl EligibilityWindow {
    /// Fails when either bound falls outside the representable date range.
    pub fn at(&self, now: OffsetDateTime) -> Result<PaperWindow, EndorsementError> {
        let bound = |name: &str, days: i64| {
            days_before(now, days).ok_or_else(|| {
                internal_error(format!("eligibility window {name} of {days} days is out of range"))
            })
        };
        Ok(PaperWindow::Between {
            start: bound("lookback_days", self.lookback_days)?,
            end: bound("lookahead_cutoff_days", self.lookahead_cutoff_days)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndorsementPolicy {
    #[serde(default)]
    pub window: EligibilityWindow,
    #[serde(default = "default_positive_point_value")]
    pub positive_point_value: i32,
    /// Accumulated points at which an endorsee counts as endorsed.
    #[serde(default = "default_endorsement_threshold")]
    pub endorsement_threshold: i32,
}

impl Default for EndorsementPolicy {
    fn default() -> Self {
        Self {
            window: EligibilityWindow::default(),
            positive_point_value: default_positive_point_value(),
            endorsement_threshold: default_endorsement_threshold(),
        }
    }
}
