use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use rand::Rng;
use thiserror::Error;

/// Asia/Jakarta, which has no daylight saving time.
const REFERENCE_OFFSET_SECS: i32 = 7 * 60 * 60;
const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Error)]
pub enum RotationError {
    #[error("rotation table is empty")]
    EmptyRotation,
    #[error("invalid rotation epoch")]
    InvalidEpoch,
}

/// Fixed table of 1-based lemma positions, one per day since the epoch.
#[derive(Debug, Clone)]
pub struct DailyRotation {
    table: Vec<i64>,
    epoch_ms: i64,
}

impl DailyRotation {
    pub fn new(table: Vec<i64>) -> Result<Self, RotationError> {
        if table.is_empty() {
            return Err(RotationError::EmptyRotation);
        }
        Ok(Self {
            table,
            epoch_ms: epoch_millis()?,
        })
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Milliseconds since the Unix epoch of 2022-10-30 00:00 in the
    /// reference zone.
    pub fn epoch_ms(&self) -> i64 {
        self.epoch_ms
    }

    /// A uniformly chosen index into the table, not yet resolved to a
    /// lemma position.
    pub fn random_index(&self) -> usize {
        self.random_index_with(&mut rand::thread_rng())
    }

    pub fn random_index_with<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.gen_range(0..self.table.len())
    }

    /// Table value at a rotation index.
    pub fn entry_at(&self, index: usize) -> Option<i64> {
        self.table.get(index).copied()
    }

    /// Today's 1-based lemma position.
    pub fn today_index(&self) -> i64 {
        self.index_at(Utc::now())
    }

    pub fn index_at<Tz: TimeZone>(&self, instant: DateTime<Tz>) -> i64 {
        let days = (instant.timestamp_millis() - self.epoch_ms).div_euclid(MILLIS_PER_DAY);
        let slot = days.rem_euclid(self.table.len() as i64) as usize;
        self.table[slot]
    }
}

/// The reference zone every instance agrees on, independent of the host.
pub fn reference_zone() -> FixedOffset {
    FixedOffset::east_opt(REFERENCE_OFFSET_SECS).expect("UTC+07:00 is a valid offset")
}

fn epoch_millis() -> Result<i64, RotationError> {
    let midnight = NaiveDate::from_ymd_opt(2022, 10, 30)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or(RotationError::InvalidEpoch)?;
    let epoch = reference_zone()
        .from_local_datetime(&midnight)
        .single()
        .ok_or(RotationError::InvalidEpoch)?;
    Ok(epoch.timestamp_millis())
}
