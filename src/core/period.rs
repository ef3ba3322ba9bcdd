use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::core::error::{AppError, Result};

/// One calendar month as a half-open UTC window.
///
/// `start` is the first instant of the month and `end_exclusive` the first
/// instant of the next month, so an event on the last millisecond of the
/// month belongs to it and the first millisecond of the next month does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    pub month: u32,
    pub year: i32,
    pub start: DateTime<Utc>,
    pub end_exclusive: DateTime<Utc>,
}

impl BillingPeriod {
    pub fn of_month(month: u32, year: i32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(AppError::validation(format!(
                "month must be in 1..=12, got {}",
                month
            )));
        }

        let start = Utc
            .with_ymd_and_hms(year, month, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| {
                AppError::validation(format!("invalid billing month {}-{:02}", year, month))
            })?;

        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        let end_exclusive = Utc
            .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| {
                AppError::validation(format!("invalid billing month {}-{:02}", year, month))
            })?;

        Ok(Self {
            month,
            year,
            start,
            end_exclusive,
        })
    }

    /// Last representable instant inside the window, for display and storage
    pub fn end_inclusive(&self) -> DateTime<Utc> {
        self.end_exclusive - Duration::milliseconds(1)
    }

    /// Whether a timestamp falls inside this billing month
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end_exclusive
    }

    /// The period immediately before this one
    pub fn previous(&self) -> Result<Self> {
        if self.month == 1 {
            Self::of_month(12, self.year - 1)
        } else {
            Self::of_month(self.month - 1, self.year)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_window_bounds() {
        let period = BillingPeriod::of_month(1, 2024).unwrap();
        assert_eq!(period.start.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(
            period.end_exclusive.to_rfc3339(),
            "2024-02-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_december_rolls_into_next_year() {
        let period = BillingPeriod::of_month(12, 2024).unwrap();
        assert_eq!(
            period.end_exclusive.to_rfc3339(),
            "2025-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_month_rollover_boundary() {
        let period = BillingPeriod::of_month(1, 2024).unwrap();
        let last_ms = period.end_exclusive - Duration::milliseconds(1);
        assert!(period.contains(last_ms));
        assert!(!period.contains(period.end_exclusive));
        assert!(period.contains(period.start));
    }

    #[test]
    fn test_invalid_month_rejected() {
        assert!(BillingPeriod::of_month(0, 2024).is_err());
        assert!(BillingPeriod::of_month(13, 2024).is_err());
    }

    #[test]
    fn test_previous_period() {
        let jan = BillingPeriod::of_month(1, 2024).unwrap();
        let dec = jan.previous().unwrap();
        assert_eq!((dec.month, dec.year), (12, 2023));
    }
}
