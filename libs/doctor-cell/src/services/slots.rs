use chrono::{Duration, NaiveDate};
use std::fmt;

use crate::models::{local_to_utc, DoctorSchedule, Slot, TimeRange, UnavailableRange, WorkingDay};

/// Anything that may occupy a doctor's time, e.g. an appointment.
pub trait Occupancy {
    fn occupied_range(&self) -> TimeRange;

    /// Whether this occupant currently blocks availability.
    fn blocks_availability(&self) -> bool;
}

impl Occupancy for TimeRange {
    fn occupied_range(&self) -> TimeRange {
        *self
    }

    fn blocks_availability(&self) -> bool {
        true
    }
}

/// The first rule that keeps an interval from being bookable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    NotAWorkingDay,
    OutsideWorkingHours,
    Break,
    Unavailable { reason: Option<String> },
    Booked,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclusion::NotAWorkingDay => write!(f, "doctor does not work on this day"),
            Exclusion::OutsideWorkingHours => write!(f, "interval is outside working hours"),
            Exclusion::Break => write!(f, "interval overlaps the doctor's break"),
            Exclusion::Unavailable { reason: Some(reason) } => {
                write!(f, "doctor is unavailable ({})", reason)
            }
            Exclusion::Unavailable { reason: None } => write!(f, "doctor is unavailable"),
            Exclusion::Booked => write!(f, "interval overlaps an existing appointment"),
        }
    }
}

impl Exclusion {
    /// The same rule without the doctor's free-text notes.
    pub fn redacted(&self) -> Exclusion {
        match self {
            Exclusion::Unavailable { .. } => Exclusion::Unavailable { reason: None },
            other => other.clone(),
        }
    }
}

/// Pure slot math: no I/O, no shared state.
pub struct SlotCalculator;

impl SlotCalculator {
    /// Free slots for `date`, ordered by start time.
    pub fn compute_available_slots<O: Occupancy>(
        schedule: &DoctorSchedule,
        unavailable: &[UnavailableRange],
        bookings: &[O],
        date: NaiveDate,
    ) -> Vec<Slot> {
        let Some(day) = schedule.working_day(date) else {
            return Vec::new();
        };

        let mut slots: Vec<Slot> = Self::candidate_slots(&day)
            .into_iter()
            .filter(|candidate| Self::exclusion_for(&day, unavailable, bookings, candidate).is_none())
            .collect();

        slots.sort_by_key(|slot| slot.start_time);
        slots
    }

    /// Walk the working window in wall-clock steps of the slot duration.
    /// A trailing step that would pass the end of the window is dropped.
    pub fn candidate_slots(day: &WorkingDay) -> Vec<Slot> {
        let step = Duration::minutes(day.entry.slot_duration_minutes);
        if step <= Duration::zero() {
            return Vec::new();
        }

        let end = day.date.and_time(day.entry.end_time);
        let mut cursor = day.date.and_time(day.entry.start_time);
        let mut candidates = Vec::new();

        while let Some(next) = cursor.checked_add_signed(step).filter(|next| *next <= end) {
            let slot = TimeRange::new(
                local_to_utc(&day.timezone, cursor),
                local_to_utc(&day.timezone, next),
            );
            // Slots swallowed by a DST gap collapse to nothing.
            if !slot.is_empty() {
                candidates.push(slot);
            }
            cursor = next;
        }

        candidates
    }

    /// Why `interval` cannot be booked on `day`, or `None` when it is free.
    /// Any partial overlap excludes the whole interval.
    pub fn exclusion_for<O: Occupancy>(
        day: &WorkingDay,
        unavailable: &[UnavailableRange],
        bookings: &[O],
        interval: &TimeRange,
    ) -> Option<Exclusion> {
        if !day.window.contains(interval) {
            return Some(Exclusion::OutsideWorkingHours);
        }

        if day.break_range.is_some_and(|pause| pause.overlaps(interval)) {
            return Some(Exclusion::Break);
        }

        if let Some(range) = unavailable.iter().find(|range| range.range().overlaps(interval)) {
            return Some(Exclusion::Unavailable { reason: range.reason.clone() });
        }

        if bookings
            .iter()
            .any(|booking| booking.blocks_availability() && booking.occupied_range().overlaps(interval))
        {
            return Some(Exclusion::Booked);
        }

        None
    }

    /// Same checks as `exclusion_for`, resolving the working day from the
    /// interval's local start date.
    pub fn check_interval<O: Occupancy>(
        schedule: &DoctorSchedule,
        unavailable: &[UnavailableRange],
        bookings: &[O],
        interval: &TimeRange,
    ) -> Option<Exclusion> {
        let date = schedule.local_date_of(interval.start_time);
        match schedule.working_day(date) {
            Some(day) => Self::exclusion_for(&day, unavailable, bookings, interval),
            None => Some(Exclusion::NotAWorkingDay),
        }
    }
}
