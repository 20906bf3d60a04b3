use chrono::{DateTime, Utc};

use super::status::AppointmentStatus;

/// Earliest upcoming start among appointments that will still take place.
pub fn next_appointment<'a, I>(now: DateTime<Utc>, appointments: I) -> Option<DateTime<Utc>>
where
    I: IntoIterator<Item = (DateTime<Utc>, &'a str)>,
{
    appointments
        .into_iter()
        .filter(|(start, _)| *start >= now)
        .filter(|(_, status)| {
            !status
                .parse::<AppointmentStatus>()
                .is_ok_and(|status| status.is_terminal())
        })
        .map(|(start, _)| start)
        .min()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_later_booking_does_not_replace_earlier_one() {
        let earlier = now() + TimeDelta::days(1);
        let just_booked = now() + TimeDelta::days(5);
        let next = next_appointment(now(), [(earlier, "confirmed"), (just_booked, "pending")]);
        assert_eq!(next, Some(earlier));
    }

    #[test]
    fn test_cancelled_finished_and_past_are_ignored() {
        let upcoming = now() + TimeDelta::hours(3);
        let next = next_appointment(
            now(),
            [
                (now() - TimeDelta::hours(1), "confirmed"),
                (now() + TimeDelta::hours(1), "cancelled"),
                (now() + TimeDelta::hours(2), "finished"),
                (upcoming, "ready"),
            ],
        );
        assert_eq!(next, Some(upcoming));
    }

    #[test]
    fn test_none_when_nothing_is_upcoming() {
        let next = next_appointment(now(), [(now() + TimeDelta::hours(1), "cancelled")]);
        assert_eq!(next, None);
        assert_eq!(next_appointment(now(), Vec::new()), None);
    }
}
