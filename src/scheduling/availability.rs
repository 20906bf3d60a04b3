use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use super::status::AppointmentStatus;

pub const SLOT_TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlotGridError {
    #[error("slot step must be greater than zero")]
    ZeroStep,
    #[error("day start {start} is after day end {end}")]
    Inverted { start: NaiveTime, end: NaiveTime },
}

/// Bookable times within one business day, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotGrid {
    day_start: NaiveTime,
    day_end: NaiveTime,
    step_minutes: u32,
}

impl Default for SlotGrid {
    fn default() -> Self {
        Self {
            day_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            day_end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
            step_minutes: 30,
        }
    }
}

impl SlotGrid {
    pub fn new(
        day_start: NaiveTime,
        day_end: NaiveTime,
        step_minutes: u32,
    ) -> Result<Self, SlotGridError> {
        if step_minutes == 0 {
            return Err(SlotGridError::ZeroStep);
        }
        if day_start > day_end {
            return Err(SlotGridError::Inverted {
                start: day_start,
                end: day_end,
            });
        }
        Ok(Self {
            day_start,
            day_end,
            step_minutes,
        })
    }

    pub fn times(&self) -> Vec<NaiveTime> {
        let step = TimeDelta::minutes(i64::from(self.step_minutes));
        let mut times = Vec::new();
        let mut current = self.day_start;
        while current <= self.day_end {
            times.push(current);
            let (next, wrapped) = current.overflowing_add_signed(step);
            if wrapped != 0 {
                break;
            }
            current = next;
        }
        times
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.times().contains(&time)
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    Free,
    Booked,
    /// Bookings could not be read, so the slot is neither confirmed free nor taken.
    Unknown,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct TimeSlot {
    pub time: String,
    pub available: bool,
    pub state: SlotState,
}

impl TimeSlot {
    fn new(time: NaiveTime, state: SlotState) -> Self {
        Self {
            time: time.format(SLOT_TIME_FORMAT).to_string(),
            available: state == SlotState::Free,
            state,
        }
    }
}

/// Marks every slot of `date` as free or booked.
///
/// A slot is booked when a non-cancelled appointment starts exactly at that
/// local time on that local date. Duration is not taken into account.
pub fn compute_slots<'a, I>(
    grid: &SlotGrid,
    date: NaiveDate,
    offset: FixedOffset,
    bookings: I,
) -> Vec<TimeSlot>
where
    I: IntoIterator<Item = (DateTime<Utc>, &'a str)>,
{
    let booked: HashSet<NaiveTime> = bookings
        .into_iter()
        .filter(|(_, status)| *status != AppointmentStatus::Cancelled.as_str())
        .map(|(start, _)| start.with_timezone(&offset))
        .filter(|local| local.date_naive() == date)
        .map(|local| local.time())
        .collect();

    grid.times()
        .into_iter()
        .map(|time| {
            let state = if booked.contains(&time) {
                SlotState::Booked
            } else {
                SlotState::Free
            };
            TimeSlot::new(time, state)
        })
        .collect()
}

pub fn unknown_slots(grid: &SlotGrid) -> Vec<TimeSlot> {
    grid.times()
        .into_iter()
        .map(|time| TimeSlot::new(time, SlotState::Unknown))
        .collect()
}

/// Converts a business-local date and time into UTC. `None` when the result
/// falls outside chrono's representable range.
pub fn local_to_utc(
    date: NaiveDate,
    time: NaiveTime,
    offset: FixedOffset,
) -> Option<DateTime<Utc>> {
    date.and_time(time)
        .and_utc()
        .checked_sub_signed(TimeDelta::seconds(i64::from(offset.local_minus_utc())))
}

/// UTC bounds `[start, end)` of a business-local day.
pub fn day_bounds_utc(
    date: NaiveDate,
    offset: FixedOffset,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = local_to_utc(date, NaiveTime::MIN, offset)?;
    let end = start.checked_add_signed(TimeDelta::days(1))?;
    Some((start, end))
}
