use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

use super::availability::{SLOT_TIME_FORMAT, SlotGrid, local_to_utc};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy)]
pub struct BookingInput<'a> {
    pub date: &'a str,
    pub time: &'a str,
    pub service: &'a str,
    pub notes: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidBooking {
    pub start_time: DateTime<Utc>,
    pub service: String,
    pub notes: Option<String>,
}

/// Every problem found in a booking request, in field order.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{}", .0.join(" "))]
pub struct BookingInputError(pub Vec<String>);

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

/// Checks a booking request before anything is written.
///
/// The start time is the business-local `date` + `time` converted to UTC.
/// It must sit on the slot grid and must not be in the past.
pub fn validate_booking(
    input: BookingInput<'_>,
    grid: &SlotGrid,
    offset: FixedOffset,
    now: DateTime<Utc>,
) -> Result<ValidBooking, BookingInputError> {
    let mut errors = Vec::new();

    let service = input.service.trim();
    if service.is_empty() {
        errors.push("Please select a service.".to_string());
    }

    let date = if input.date.trim().is_empty() {
        errors.push("Please pick a date.".to_string());
        None
    } else {
        let date = parse_date(input.date);
        if date.is_none() {
            errors.push(format!("{} is not a valid date.", input.date.trim()));
        }
        date
    };

    let time = if input.time.trim().is_empty() {
        errors.push("Please pick a time.".to_string());
        None
    } else {
        match NaiveTime::parse_from_str(input.time.trim(), SLOT_TIME_FORMAT) {
            Ok(time) if grid.contains(time) => Some(time),
            Ok(_) => {
                errors.push(format!("{} is not a bookable slot.", input.time.trim()));
                None
            }
            Err(_) => {
                errors.push(format!("{} is not a valid time.", input.time.trim()));
                None
            }
        }
    };

    let start_time = match (date, time) {
        (Some(date), Some(time)) => match local_to_utc(date, time, offset) {
            Some(start_time) => {
                if start_time < now {
                    errors.push("Appointments cannot be booked in the past.".to_string());
                }
                Some(start_time)
            }
            None => {
                errors.push(format!("{} is out of the supported range.", input.date.trim()));
                None
            }
        },
        _ => None,
    };

    match start_time {
        Some(start_time) if errors.is_empty() => Ok(ValidBooking {
            start_time,
            service: service.to_string(),
            notes: input
                .notes
                .map(str::trim)
                .filter(|notes| !notes.is_empty())
                .map(str::to_string),
        }),
        _ => Err(BookingInputError(errors)),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Offset, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn input<'a>(date: &'a str, time: &'a str, service: &'a str) -> BookingInput<'a> {
        BookingInput {
            date,
            time,
            service,
            notes: None,
        }
    }

    #[test]
    fn test_valid_booking_builds_utc_start() {
        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        let booking = validate_booking(
            BookingInput {
                notes: Some("  allergic to oatmeal "),
                ..input("2024-06-02", "14:00", " Bath ")
            },
            &SlotGrid::default(),
            offset,
            now(),
        )
        .unwrap();
        assert_eq!(
            booking.start_time,
            Utc.with_ymd_and_hms(2024, 6, 2, 17, 0, 0).unwrap()
        );
        assert_eq!(booking.service, "Bath");
        assert_eq!(booking.notes.as_deref(), Some("allergic to oatmeal"));
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let err = validate_booking(input("", " ", ""), &SlotGrid::default(), Utc.fix(), now())
            .unwrap_err();
        assert_eq!(err.0.len(), 3);
    }

    #[test]
    fn test_off_grid_time_is_rejected() {
        let err = validate_booking(
            input("2024-06-02", "14:15", "Bath"),
            &SlotGrid::default(),
            Utc.fix(),
            now(),
        )
        .unwrap_err();
        assert_eq!(err.0, vec!["14:15 is not a bookable slot."]);
    }

    #[test]
    fn test_invalid_date_and_time_are_rejected() {
        let err = validate_booking(
            input("2024-02-30", "2pm", "Bath"),
            &SlotGrid::default(),
            Utc.fix(),
            now(),
        )
        .unwrap_err();
        assert_eq!(err.0.len(), 2);
    }

    #[test]
    fn test_past_start_is_rejected() {
        let err = validate_booking(
            input("2024-06-01", "08:30", "Bath"),
            &SlotGrid::default(),
            Utc.fix(),
            now(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Appointments cannot be booked in the past.");
    }

    #[test]
    fn test_date_beyond_utc_range_is_rejected() {
        let last_day = NaiveDate::MAX.format(DATE_FORMAT).to_string();
        let err = validate_booking(
            input(&last_day, "17:00", "Bath"),
            &SlotGrid::default(),
            FixedOffset::west_opt(8 * 3600).unwrap(),
            now(),
        )
        .unwrap_err();
        assert_eq!(
            err.0,
            vec![format!("{} is out of the supported range.", last_day)]
        );
    }
}
