use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::{PaymentMode, PaymentPlan};

/// total number of scheduled payments for a term count under a mode
pub fn number_of_payments(mode: PaymentMode, terms: u32) -> Result<u32> {
    match mode {
        PaymentMode::Daily => Ok(terms * 30),
        PaymentMode::Weekly => Ok(terms * 4),
        PaymentMode::SemiMonthly => Ok(terms * 2),
        PaymentMode::Monthly => Ok(terms),
        PaymentMode::Quarterly => Ok(terms / 3),
        PaymentMode::SemiAnnual => Ok(terms / 6),
        PaymentMode::Lumpsum => Ok(1),
        PaymentMode::FixedDays => {
            if terms == 0 {
                return Err(LedgerError::InvalidSchedule {
                    message: "fixed-days terms must be greater than 0".to_string(),
                });
            }
            Ok(terms)
        }
    }
}

/// per-period payment figure stored on the loan after balancing
pub fn amortization_per_period(applied: Money, plan: &PaymentPlan, terms: u32) -> Result<Money> {
    if terms == 0 {
        return Err(LedgerError::InvalidSchedule {
            message: "terms must be greater than 0".to_string(),
        });
    }
    let terms_dec = Decimal::from(terms);
    let amount = match plan.mode {
        PaymentMode::Daily => applied / terms_dec / Decimal::from(30),
        PaymentMode::Weekly => applied / terms_dec / Decimal::from(4),
        PaymentMode::SemiMonthly => applied / terms_dec / Decimal::from(2),
        PaymentMode::Monthly => applied / terms_dec,
        PaymentMode::Quarterly => applied / (terms_dec / Decimal::from(3)),
        PaymentMode::SemiAnnual => applied / (terms_dec / Decimal::from(6)),
        PaymentMode::Lumpsum => applied,
        PaymentMode::FixedDays => {
            if plan.fixed_days == 0 {
                return Err(LedgerError::InvalidSchedule {
                    message: "fixed days must be greater than 0".to_string(),
                });
            }
            applied / terms_dec
        }
    };
    Ok(amount.round_centavos())
}

/// next scheduled payment date after the current one; pure, and it never
/// applies skip rules, since the caller composes skip counting and advancing
pub fn next_payment_date(current: DateTime<Utc>, plan: &PaymentPlan) -> DateTime<Utc> {
    match plan.mode {
        PaymentMode::Daily | PaymentMode::FixedDays => current + Duration::days(1),
        PaymentMode::Weekly => {
            let mut next = current + Duration::days(1);
            while next.weekday() != plan.weekly_payday {
                next += Duration::days(1);
            }
            next
        }
        PaymentMode::SemiMonthly => {
            let day = current.day();
            if day < plan.semi_monthly_payday1 {
                with_day_of_month(current, plan.semi_monthly_payday1)
            } else if day < plan.semi_monthly_payday2 {
                with_day_of_month(current, plan.semi_monthly_payday2)
            } else {
                let next_month = add_months(current, 1);
                with_day_of_month(next_month, plan.semi_monthly_payday1)
            }
        }
        PaymentMode::Monthly => {
            if plan.monthly_exact_day {
                let day = current.day();
                with_day_of_month(add_months(current, 1), day)
            } else {
                // a flat 30-day advance, drifting against real month
                // lengths; preserved legacy behavior
                current + Duration::days(30)
            }
        }
        PaymentMode::Quarterly => add_months(current, 3),
        PaymentMode::SemiAnnual => add_months(current, 6),
        // single terminal payment, no further advance
        PaymentMode::Lumpsum => current,
    }
}

/// calendar-month advance, clamping to the last day of a short month
fn add_months(instant: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    instant
        .checked_add_months(Months::new(months))
        .unwrap_or(instant)
}

/// pin the day-of-month, preserving the time of day and clamping to the
/// month's last day when the target day does not exist
fn with_day_of_month(instant: DateTime<Utc>, day: u32) -> DateTime<Utc> {
    let clamped = day.min(days_in_month(instant.year(), instant.month()));
    let date = NaiveDate::from_ymd_opt(instant.year(), instant.month(), clamped)
        .expect("clamped day is always valid");
    Utc.from_utc_datetime(&date.and_time(instant.time()))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Weekday};

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_number_of_payments_per_mode() {
        assert_eq!(number_of_payments(PaymentMode::Daily, 2).unwrap(), 60);
        assert_eq!(number_of_payments(PaymentMode::Weekly, 3).unwrap(), 12);
        assert_eq!(number_of_payments(PaymentMode::SemiMonthly, 6).unwrap(), 12);
        assert_eq!(number_of_payments(PaymentMode::Monthly, 12).unwrap(), 12);
        assert_eq!(number_of_payments(PaymentMode::Quarterly, 12).unwrap(), 4);
        assert_eq!(number_of_payments(PaymentMode::SemiAnnual, 12).unwrap(), 2);
        assert_eq!(number_of_payments(PaymentMode::Lumpsum, 36).unwrap(), 1);
        assert_eq!(number_of_payments(PaymentMode::FixedDays, 45).unwrap(), 45);
        assert!(number_of_payments(PaymentMode::FixedDays, 0).is_err());
    }

    #[test]
    fn test_amortization_per_period() {
        let applied = Money::from_major(12_000);
        let monthly = PaymentPlan::new(PaymentMode::Monthly);
        assert_eq!(
            amortization_per_period(applied, &monthly, 12).unwrap(),
            Money::from_major(1_000)
        );

        let quarterly = PaymentPlan::new(PaymentMode::Quarterly);
        assert_eq!(
            amortization_per_period(applied, &quarterly, 12).unwrap(),
            Money::from_major(3_000)
        );

        let lumpsum = PaymentPlan::new(PaymentMode::Lumpsum);
        assert_eq!(
            amortization_per_period(applied, &lumpsum, 12).unwrap(),
            applied
        );

        assert!(amortization_per_period(applied, &monthly, 0).is_err());
    }

    #[test]
    fn test_daily_advances_one_day() {
        let plan = PaymentPlan::new(PaymentMode::Daily);
        assert_eq!(next_payment_date(at(2024, 6, 14), &plan), at(2024, 6, 15));
    }

    #[test]
    fn test_weekly_strictly_after() {
        let mut plan = PaymentPlan::new(PaymentMode::Weekly);
        plan.weekly_payday = Weekday::Fri;

        // 2024-06-14 is itself a friday; strictly-after lands a week later
        assert_eq!(next_payment_date(at(2024, 6, 14), &plan), at(2024, 6, 21));
        assert_eq!(next_payment_date(at(2024, 6, 12), &plan), at(2024, 6, 14));
    }

    #[test]
    fn test_semi_monthly_branch_ordering() {
        let mut plan = PaymentPlan::new(PaymentMode::SemiMonthly);
        plan.semi_monthly_payday1 = 15;
        plan.semi_monthly_payday2 = 30;

        // before the first payday: snap to it
        assert_eq!(next_payment_date(at(2024, 6, 5), &plan), at(2024, 6, 15));
        // between paydays: snap to the second, still this month
        assert_eq!(next_payment_date(at(2024, 6, 20), &plan), at(2024, 6, 30));
        // at or past the second payday: first payday of the next month
        assert_eq!(next_payment_date(at(2024, 6, 30), &plan), at(2024, 7, 15));
    }

    #[test]
    fn test_semi_monthly_preserves_time_of_day() {
        let plan = PaymentPlan::new(PaymentMode::SemiMonthly);
        let current = Utc.with_ymd_and_hms(2024, 6, 5, 17, 45, 30).unwrap();
        let next = next_payment_date(current, &plan);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 6, 15, 17, 45, 30).unwrap());
    }

    #[test]
    fn test_semi_monthly_payday_clamps_in_february() {
        let plan = PaymentPlan::new(PaymentMode::SemiMonthly);
        // day 20 is past payday1 and before payday2=30, which february
        // cannot hold
        assert_eq!(next_payment_date(at(2023, 2, 20), &plan), at(2023, 2, 28));
    }

    #[test]
    fn test_monthly_exact_day_keeps_day_of_month() {
        let mut plan = PaymentPlan::new(PaymentMode::Monthly);
        plan.monthly_exact_day = true;
        assert_eq!(next_payment_date(at(2024, 1, 15), &plan), at(2024, 2, 15));
    }

    #[test]
    fn test_monthly_flat_thirty_day_drift() {
        // without the exact-day flag the advance is 30 literal days, so a
        // january date drifts into early march over two hops
        let plan = PaymentPlan::new(PaymentMode::Monthly);
        let first = next_payment_date(at(2023, 1, 31), &plan);
        assert_eq!(first, at(2023, 3, 2));
        let second = next_payment_date(first, &plan);
        assert_eq!(second, at(2023, 4, 1));
    }

    #[test]
    fn test_quarterly_and_semi_annual() {
        let quarterly = PaymentPlan::new(PaymentMode::Quarterly);
        assert_eq!(
            next_payment_date(at(2024, 1, 10), &quarterly),
            at(2024, 4, 10)
        );

        let semi_annual = PaymentPlan::new(PaymentMode::SemiAnnual);
        assert_eq!(
            next_payment_date(at(2024, 1, 10), &semi_annual),
            at(2024, 7, 10)
        );
    }

    #[test]
    fn test_lumpsum_never_advances() {
        let plan = PaymentPlan::new(PaymentMode::Lumpsum);
        assert_eq!(next_payment_date(at(2024, 6, 14), &plan), at(2024, 6, 14));
    }
}
