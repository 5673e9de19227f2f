//! Due-date arithmetic and linear pro-ration of bill reservations.

use chrono::{Datelike, Duration, NaiveDate};

use super::bills_model::{BillFrequency, CadenceUnit};
use crate::utils::time_utils::{add_months_clamped, clamped_date, start_of_month};

/// Upper bound on cycles walked from the anchor before giving up.
const MAX_CYCLES: i64 = 10_000;

/// The due date just passed and the one the reservation is building toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cycle {
    pub previous_due: NaiveDate,
    pub next_due: NaiveDate,
}

impl Cycle {
    pub fn length_days(&self) -> i64 {
        (self.next_due - self.previous_due).num_days()
    }

    /// Days since the previous due date, clamped to the cycle.
    pub fn elapsed_days(&self, today: NaiveDate) -> i64 {
        (today - self.previous_due).num_days().clamp(0, self.length_days())
    }
}

/// `day_of_month` of the calendar month before `today`, clamped to that
/// month's last day.
pub fn anchor_date(today: NaiveDate, day_of_month: u32) -> Option<NaiveDate> {
    let last_of_previous = start_of_month(today).pred_opt()?;
    clamped_date(last_of_previous.year(), last_of_previous.month(), day_of_month)
}

fn due_date(anchor: NaiveDate, frequency: BillFrequency, day_of_month: u32, step: i64) -> Option<NaiveDate> {
    let (unit, interval) = frequency.cadence();
    let steps = i64::from(interval) * step;
    match unit {
        CadenceUnit::Week => anchor.checked_add_signed(Duration::weeks(steps)),
        CadenceUnit::Month => add_months_clamped(anchor, i32::try_from(steps).ok()?, day_of_month),
        CadenceUnit::Year => add_months_clamped(anchor, i32::try_from(steps * 12).ok()?, day_of_month),
    }
}

/// The cycle containing `today`: the first due date on or after `today`
/// and the one before it.
pub fn current_cycle(
    anchor: NaiveDate,
    frequency: BillFrequency,
    day_of_month: u32,
    today: NaiveDate,
) -> Option<Cycle> {
    if today <= anchor {
        return Some(Cycle {
            previous_due: due_date(anchor, frequency, day_of_month, -1)?,
            next_due: anchor,
        });
    }
    let mut previous = anchor;
    for step in 1..=MAX_CYCLES {
        let next = due_date(anchor, frequency, day_of_month, step)?;
        if next >= today {
            return Some(Cycle {
                previous_due: previous,
                next_due: next,
            });
        }
        previous = next;
    }
    None
}

/// `floor(amount * elapsed / cycle)`; the full amount for a zero-length cycle.
pub fn prorated_reservation(amount: i64, elapsed_days: i64, cycle_days: i64) -> i64 {
    if cycle_days <= 0 {
        return amount;
    }
    let elapsed = elapsed_days.clamp(0, cycle_days);
    (i128::from(amount) * i128::from(elapsed) / i128::from(cycle_days)) as i64
}

/// What a bill's pocket should hold on `today`.
pub fn target_reservation(
    amount: i64,
    frequency: BillFrequency,
    anchor: NaiveDate,
    day_of_month: u32,
    today: NaiveDate,
) -> Option<(Cycle, i64)> {
    let cycle = current_cycle(anchor, frequency, day_of_month, today)?;
    let target = prorated_reservation(amount, cycle.elapsed_days(today), cycle.length_days());
    Some((cycle, target))
}

/// `reserved / amount * 100` clamped to [0, 100]; 0 when `amount` is not positive.
pub fn progress_percent(reserved: i64, amount: i64) -> f64 {
    if amount <= 0 {
        return 0.0;
    }
    (reserved as f64 / amount as f64 * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_anchor_is_previous_month_clamped() {
        assert_eq!(anchor_date(d(2025, 9, 16), 1), Some(d(2025, 8, 1)));
        assert_eq!(anchor_date(d(2025, 3, 10), 31), Some(d(2025, 2, 28)));
        assert_eq!(anchor_date(d(2025, 1, 5), 15), Some(d(2024, 12, 15)));
    }

    #[test]
    fn test_rent_half_way_through_the_month() {
        let today = d(2025, 9, 16);
        let anchor = anchor_date(today, 1).unwrap();
        let (cycle, reserve) = target_reservation(150_000, BillFrequency::Monthly, anchor, 1, today).unwrap();
        assert_eq!(cycle.previous_due, d(2025, 9, 1));
        assert_eq!(cycle.next_due, d(2025, 10, 1));
        assert_eq!(cycle.length_days(), 30);
        assert_eq!(cycle.elapsed_days(today), 15);
        assert_eq!(reserve, 75_000);
    }

    #[test]
    fn test_due_today_reserves_everything() {
        let today = d(2025, 9, 1);
        let anchor = anchor_date(today, 1).unwrap();
        let (cycle, reserve) = target_reservation(150_000, BillFrequency::Monthly, anchor, 1, today).unwrap();
        assert_eq!(cycle.next_due, today);
        assert_eq!(reserve, 150_000);
    }

    #[test]
    fn test_day_31_re_clamps_each_month() {
        let anchor = d(2025, 1, 31);
        let cycle = current_cycle(anchor, BillFrequency::Monthly, 31, d(2025, 3, 15)).unwrap();
        assert_eq!(cycle.previous_due, d(2025, 2, 28));
        assert_eq!(cycle.next_due, d(2025, 3, 31));
    }

    #[test]
    fn test_weekly_and_quarterly_cycles() {
        let anchor = d(2025, 8, 10);
        let weekly = current_cycle(anchor, BillFrequency::Biweekly, 10, d(2025, 9, 1)).unwrap();
        assert_eq!(weekly.previous_due, d(2025, 8, 24));
        assert_eq!(weekly.next_due, d(2025, 9, 7));

        let quarterly = current_cycle(anchor, BillFrequency::Quarterly, 10, d(2025, 9, 1)).unwrap();
        assert_eq!(quarterly.previous_due, anchor);
        assert_eq!(quarterly.next_due, d(2025, 11, 10));
    }

    #[test]
    fn test_prorate_floors_and_clamps() {
        assert_eq!(prorated_reservation(1_000, 1, 3), 333);
        assert_eq!(prorated_reservation(1_000, 5, 3), 1_000);
        assert_eq!(prorated_reservation(1_000, -2, 3), 0);
        assert_eq!(prorated_reservation(1_000, 0, 0), 1_000);
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(75_000, 150_000), 50.0);
        assert_eq!(progress_percent(200, 100), 100.0);
        assert_eq!(progress_percent(10, 0), 0.0);
        assert_eq!(progress_percent(-5, 100), 0.0);
    }
}
