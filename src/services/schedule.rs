//! Business-date scheduling of new orders.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::config::AppConfig;

/// Date an order placed at `placed_at_local` is scheduled for.
///
/// Orders placed at or after `cutoff` roll over to the next calendar day.
pub fn scheduled_order_date(placed_at_local: NaiveDateTime, cutoff: NaiveTime) -> NaiveDate {
    let date = placed_at_local.date();
    if placed_at_local.time() >= cutoff {
        date.succ_opt().unwrap_or(date)
    } else {
        date
    }
}

/// The station's wall clock: a fixed UTC offset plus the daily order cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessClock {
    offset: FixedOffset,
    cutoff: NaiveTime,
}

impl BusinessClock {
    pub fn new(offset: FixedOffset, cutoff: NaiveTime) -> Self {
        Self { offset, cutoff }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(cfg.business_offset(), cfg.order_cutoff())
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn cutoff(&self) -> NaiveTime {
        self.cutoff
    }

    /// Local date-time at the station for the instant `at`.
    pub fn local(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.with_timezone(&self.offset).naive_local()
    }

    /// Scheduled order date for an order placed at `at`.
    pub fn order_date_at(&self, at: DateTime<Utc>) -> NaiveDate {
        scheduled_order_date(self.local(at), self.cutoff)
    }

    pub fn order_date_now(&self) -> NaiveDate {
        self.order_date_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn five_pm() -> NaiveTime {
        NaiveTime::from_hms_opt(17, 0, 0).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[rstest]
    #[case(at(2024, 3, 10, 16, 59, 59), NaiveDate::from_ymd_opt(2024, 3, 10).unwrap())]
    #[case(at(2024, 3, 10, 17, 0, 0), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap())]
    #[case(at(2024, 3, 10, 0, 0, 0), NaiveDate::from_ymd_opt(2024, 3, 10).unwrap())]
    #[case(at(2024, 3, 10, 23, 59, 59), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap())]
    #[case(at(2024, 2, 28, 18, 30, 0), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())]
    #[case(at(2024, 12, 31, 17, 0, 1), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())]
    fn cutoff_boundary(#[case] placed: NaiveDateTime, #[case] expected: NaiveDate) {
        assert_eq!(scheduled_order_date(placed, five_pm()), expected);
    }

    #[test]
    fn clock_applies_offset_before_cutoff() {
        let clock = BusinessClock::new(FixedOffset::east_opt(8 * 3600).unwrap(), five_pm());

        // 08:59:59Z is 16:59:59 at UTC+8
        let before = Utc.with_ymd_and_hms(2024, 6, 1, 8, 59, 59).unwrap();
        assert_eq!(
            clock.order_date_at(before),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
        );

        let after = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        assert_eq!(
            clock.order_date_at(after),
            NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()
        );

        // 20:00Z on the 1st is already the 2nd locally, before the cutoff
        let late_utc = Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap();
        assert_eq!(
            clock.order_date_at(late_utc),
            NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()
        );
    }
}
