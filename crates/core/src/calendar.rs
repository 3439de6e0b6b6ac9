//! Calendar-month arithmetic for calibration scheduling.

use chrono::{Datelike, Months};

use crate::error::CoreError;
use crate::types::Date;

/// Add `frequency_months` calendar months to `last_calibration`.
///
/// Month-length overflow clamps to the last valid day of the target month
/// (Jan 31 + 1 month is Feb 28, or Feb 29 in a leap year).
pub fn next_calibration_date(
    last_calibration: Date,
    frequency_months: i32,
) -> Result<Date, CoreError> {
    if frequency_months <= 0 {
        return Err(CoreError::Validation(format!(
            "calibration_frequency must be a positive number of months, got {frequency_months}"
        )));
    }
    // `frequency_months` is positive, so the cast is lossless.
    last_calibration
        .checked_add_months(Months::new(frequency_months as u32))
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "next calibration date for {last_calibration} + {frequency_months} months \
                 is out of range"
            ))
        })
}

/// Whole calendar months from `from` to `to`.
///
/// Computed as `(year delta * 12) + month delta`; the day of month is
/// ignored, so Jan 31 -> Feb 1 counts as one month. Negative when `to` is
/// before `from`.
pub fn months_between(from: Date, to: Date) -> i32 {
    (to.year() - from.year()) * 12 + (to.month() as i32 - from.month() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Date {
        Date::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn adds_whole_months() {
        let next = next_calibration_date(date(2024, 3, 15), 12).unwrap();
        assert_eq!(next, date(2025, 3, 15));
    }

    #[test]
    fn clamps_to_end_of_short_month() {
        assert_eq!(
            next_calibration_date(date(2023, 1, 31), 1).unwrap(),
            date(2023, 2, 28)
        );
        assert_eq!(
            next_calibration_date(date(2024, 1, 31), 1).unwrap(),
            date(2024, 2, 29)
        );
    }

    #[test]
    fn zero_frequency_is_rejected() {
        assert!(next_calibration_date(date(2024, 1, 1), 0).is_err());
        assert!(next_calibration_date(date(2024, 1, 1), -3).is_err());
    }

    #[test]
    fn positive_frequency_is_strictly_later() {
        let start = date(2024, 1, 31);
        for months in 1..=36 {
            let next = next_calibration_date(start, months).unwrap();
            assert!(next > start, "{months} months should move forward");
        }
    }

    #[test]
    fn months_between_uses_calendar_months() {
        assert_eq!(months_between(date(2024, 1, 31), date(2024, 2, 1)), 1);
        assert_eq!(months_between(date(2024, 1, 1), date(2024, 1, 31)), 0);
        assert_eq!(months_between(date(2023, 11, 15), date(2025, 2, 1)), 15);
        assert_eq!(months_between(date(2025, 2, 1), date(2024, 2, 1)), -12);
    }
}
