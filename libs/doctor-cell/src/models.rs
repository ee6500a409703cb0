use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// TIME RANGES
// ==============================================================================

/// Half-open interval `[start_time, end_time)` in UTC.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TimeRange {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// A computed, bookable interval. Never persisted.
pub type Slot = TimeRange;

impl TimeRange {
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self { start_time, end_time }
    }

    pub fn try_new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Result<Self, ScheduleError> {
        if start_time >= end_time {
            return Err(ScheduleError::InvalidRange(format!(
                "start {} must be before end {}",
                start_time, end_time
            )));
        }
        Ok(Self { start_time, end_time })
    }

    pub fn is_empty(&self) -> bool {
        self.start_time >= self.end_time
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Any shared instant. Touching endpoints do not overlap; empty ranges overlap nothing.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.start_time < other.end_time
            && other.start_time < self.end_time
    }

    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start_time <= other.start_time && other.end_time <= self.end_time
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start_time.to_rfc3339(), self.end_time.to_rfc3339())
    }
}

// ==============================================================================
// RECURRING SCHEDULE
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeeklyScheduleEntry {
    pub day_of_week: u8, // 0 = Sunday, 1 = Monday, etc.
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub break_start: Option<NaiveTime>,
    pub break_end: Option<NaiveTime>,
    pub slot_duration_minutes: i64,
}

impl WeeklyScheduleEntry {
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.day_of_week > 6 {
            return Err(ScheduleError::InvalidSchedule(
                "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
            ));
        }

        if self.start_time >= self.end_time {
            return Err(ScheduleError::InvalidSchedule(
                "Start time must be before end time".to_string(),
            ));
        }

        if self.slot_duration_minutes <= 0 || self.slot_duration_minutes > 24 * 60 {
            return Err(ScheduleError::InvalidSchedule(
                "Slot duration must be between 1 and 1440 minutes".to_string(),
            ));
        }

        match (self.break_start, self.break_end) {
            (None, None) => {}
            (Some(break_start), Some(break_end)) => {
                if !(self.start_time <= break_start && break_start < break_end && break_end <= self.end_time) {
                    return Err(ScheduleError::InvalidSchedule(
                        "Break must lie inside working hours and start before it ends".to_string(),
                    ));
                }
            }
            _ => {
                return Err(ScheduleError::InvalidSchedule(
                    "Break start and break end must be given together".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn break_window(&self) -> Option<(NaiveTime, NaiveTime)> {
        self.break_start.zip(self.break_end)
    }
}

/// Absolute, non-recurring interval during which the doctor cannot be booked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnavailableRange {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: DateTime<Utc>,
    pub reason: Option<String>,
}

impl UnavailableRange {
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start_date_time, self.end_date_time)
    }
}

/// Everything the slot math needs to know about one doctor's recurring week.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorSchedule {
    pub doctor_id: Uuid,
    pub timezone: Tz,
    pub weekly: Vec<WeeklyScheduleEntry>,
}

impl DoctorSchedule {
    pub fn new(doctor_id: Uuid, timezone: Tz) -> Self {
        Self { doctor_id, timezone, weekly: Vec::new() }
    }

    pub fn entry_for_day(&self, day_of_week: u8) -> Option<&WeeklyScheduleEntry> {
        self.weekly.iter().find(|entry| entry.day_of_week == day_of_week)
    }

    pub fn entry_for(&self, date: NaiveDate) -> Option<&WeeklyScheduleEntry> {
        self.entry_for_day(day_of_week(date))
    }

    /// Calendar day of an instant in the doctor's zone.
    pub fn local_date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.timezone).date_naive()
    }

    /// Local midnight to the next local midnight, in UTC.
    pub fn day_bounds(&self, date: NaiveDate) -> Result<TimeRange, ScheduleError> {
        let next = date
            .succ_opt()
            .ok_or_else(|| ScheduleError::InvalidRange(format!("{} is past the last supported date", date)))?;

        let start = local_to_utc(&self.timezone, date.and_time(NaiveTime::MIN));
        let end = local_to_utc(&self.timezone, next.and_time(NaiveTime::MIN));
        Ok(TimeRange::new(start, end))
    }

    /// Resolve the weekly entry for `date` into concrete instants.
    pub fn working_day(&self, date: NaiveDate) -> Option<WorkingDay> {
        let entry = self.entry_for(date)?.clone();
        let tz = self.timezone;

        let window = TimeRange::new(
            local_to_utc(&tz, date.and_time(entry.start_time)),
            local_to_utc(&tz, date.and_time(entry.end_time)),
        );
        let break_range = entry.break_window().map(|(start, end)| {
            TimeRange::new(
                local_to_utc(&tz, date.and_time(start)),
                local_to_utc(&tz, date.and_time(end)),
            )
        });

        Some(WorkingDay { date, timezone: tz, entry, window, break_range })
    }
}

/// A weekly entry pinned to one calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingDay {
    pub date: NaiveDate,
    pub timezone: Tz,
    pub entry: WeeklyScheduleEntry,
    pub window: TimeRange,
    pub break_range: Option<TimeRange>,
}

pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Wall-clock time to UTC. Ambiguous times take the earlier instant; times
/// skipped by a DST jump resolve to the first instant after the gap.
pub fn local_to_utc(tz: &Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let mut candidate = naive;
            for _ in 0..(24 * 60) {
                let Some(next) = candidate.checked_add_signed(Duration::minutes(1)) else {
                    break;
                };
                candidate = next;
                if let Some(dt) = tz.from_local_datetime(&candidate).earliest() {
                    return dt.with_timezone(&Utc);
                }
            }
            // No zone has a day-long gap; this only happens at the edge of
            // the representable range. Treat the wall time as UTC.
            naive.and_utc()
        }
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ScheduleError {
    #[error("Doctor not found: {0}")]
    DoctorNotFound(Uuid),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Invalid time range: {0}")]
    InvalidRange(String),

    #[error("Database error: {0}")]
    Database(String),
}
