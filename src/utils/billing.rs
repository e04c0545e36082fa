use time::OffsetDateTime;

const SECONDS_PER_DAY: i64 = 86_400;

/// Whole days between two instants, rounded up. A partial day bills as a
/// full day, matching the receipt and fine formulas.
pub fn billable_days(from: OffsetDateTime, to: OffsetDateTime) -> i64 {
    // i64::div_ceil is still unstable (int_roundings); this is its exact
    // expansion for a positive divisor.
    let seconds = (to - from).whole_seconds();
    let quotient = seconds / SECONDS_PER_DAY;
    if seconds % SECONDS_PER_DAY > 0 { quotient + 1 } else { quotient }
}

/// Inclusive-boundary overlap test between two date ranges. Two bookings
/// sharing a boundary date count as overlapping. Mirrors the SQL predicate
/// used by the availability queries and the bookings_no_overlap constraint.
pub fn ranges_overlap(
    a_from: OffsetDateTime,
    a_to: OffsetDateTime,
    b_from: OffsetDateTime,
    b_to: OffsetDateTime,
) -> bool {
    a_from <= b_to && a_to >= b_from
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverstayAssessment {
    pub overstay_days: i64,
    pub fine_amount: f64,
}

/// Fine for a booking still open (or exited) past its due date. Returns
/// None when `at` is not past `due`. Always recomputed from `due`, never
/// accumulated, so repeated assessments of the same booking agree.
/// `fallback_rate` covers legacy bookings persisted without a daily rate.
pub fn assess_overstay(
    due: OffsetDateTime,
    at: OffsetDateTime,
    daily_rate: Option<f64>,
    fallback_rate: f64,
) -> Option<OverstayAssessment> {
    if at <= due {
        return None;
    }

    let overstay_days = billable_days(due, at);
    let rate = daily_rate.unwrap_or(fallback_rate);

    Some(OverstayAssessment {
        overstay_days,
        fine_amount: overstay_days as f64 * rate,
    })
}

/// Date-only comparison against "today": a from-date earlier than today at
/// midnight is a past-dated booking, whatever its time of day.
pub fn is_past_date(from: OffsetDateTime, now: OffsetDateTime) -> bool {
    from.date() < now.date()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn billable_days_rounds_partial_days_up() {
        let from = datetime!(2024-01-01 00:00 UTC);
        assert_eq!(billable_days(from, datetime!(2024-01-05 00:00 UTC)), 4);
        assert_eq!(billable_days(from, datetime!(2024-01-05 00:01 UTC)), 5);
        assert_eq!(billable_days(from, datetime!(2024-01-01 06:00 UTC)), 1);
    }

    #[test]
    fn shared_boundary_counts_as_overlap() {
        // existing booking 01-01..01-05, request starting 01-05
        assert!(ranges_overlap(
            datetime!(2024-01-05 00:00 UTC),
            datetime!(2024-01-08 00:00 UTC),
            datetime!(2024-01-01 00:00 UTC),
            datetime!(2024-01-05 00:00 UTC),
        ));
    }

    #[test]
    fn disjoint_ranges_do_not_overlap() {
        assert!(!ranges_overlap(
            datetime!(2024-01-06 00:00 UTC),
            datetime!(2024-01-08 00:00 UTC),
            datetime!(2024-01-01 00:00 UTC),
            datetime!(2024-01-05 00:00 UTC),
        ));
    }

    #[test]
    fn contained_range_overlaps() {
        assert!(ranges_overlap(
            datetime!(2024-01-02 00:00 UTC),
            datetime!(2024-01-03 00:00 UTC),
            datetime!(2024-01-01 00:00 UTC),
            datetime!(2024-01-05 00:00 UTC),
        ));
    }

    #[test]
    fn overstay_three_days_at_rate_twenty() {
        let due = datetime!(2024-03-01 00:00 UTC);
        let now = datetime!(2024-03-04 00:00 UTC);

        let first = assess_overstay(due, now, Some(20.0), 10.0).unwrap();
        assert_eq!(first.overstay_days, 3);
        assert_eq!(first.fine_amount, 60.0);

        // a second assessment at the same instant yields the same figures,
        // not an accumulation
        let second = assess_overstay(due, now, Some(20.0), 10.0).unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn overstay_uses_fallback_rate_when_rate_missing() {
        let due = datetime!(2024-03-01 00:00 UTC);
        let now = datetime!(2024-03-03 00:00 UTC);

        let assessed = assess_overstay(due, now, None, 10.0).unwrap();
        assert_eq!(assessed.overstay_days, 2);
        assert_eq!(assessed.fine_amount, 20.0);
    }

    #[test]
    fn no_overstay_before_or_at_due_date() {
        let due = datetime!(2024-03-01 12:00 UTC);
        assert!(assess_overstay(due, datetime!(2024-03-01 11:00 UTC), Some(20.0), 10.0).is_none());
        assert!(assess_overstay(due, due, Some(20.0), 10.0).is_none());
    }

    #[test]
    fn late_exit_two_days_after_due() {
        let due = datetime!(2024-05-10 00:00 UTC);
        let exit = datetime!(2024-05-12 00:00 UTC);

        let assessed = assess_overstay(due, exit, Some(15.0), 10.0).unwrap();
        assert_eq!(assessed.overstay_days, 2);
        assert_eq!(assessed.fine_amount, 30.0);
    }

    #[test]
    fn past_date_is_date_only() {
        let now = datetime!(2024-06-15 09:30 UTC);
        // yesterday is past regardless of time of day
        assert!(is_past_date(datetime!(2024-06-14 23:59 UTC), now));
        // earlier today is not past: the comparison normalizes to midnight
        assert!(!is_past_date(datetime!(2024-06-15 00:00 UTC), now));
        assert!(!is_past_date(datetime!(2024-06-16 00:00 UTC), now));
    }
}
