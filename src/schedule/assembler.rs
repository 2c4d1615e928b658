use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::account::{account_type_priority, AccountSnapshot, PeriodCharge, RateBasis};
use crate::calendar::BusinessCalendar;
use crate::decimal::Money;
use crate::interest::InterestPolicy;
use crate::schedule::period::next_payment_date;
use crate::types::PaymentPlan;

/// one account's contribution to a schedule period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountValue {
    pub account: AccountSnapshot,
    pub value: Money,
    /// running total across all periods so far
    pub total: Money,
}

/// one period of the amortization schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    /// nominal date before skip resolution
    pub actual_date: DateTime<Utc>,
    /// nominal date advanced past excluded days
    pub scheduled_date: DateTime<Utc>,
    pub days_skipped: u32,
    pub total: Money,
    /// remaining balance after this period's principal reduction
    pub balance: Money,
    pub accounts: Vec<AccountValue>,
}

/// how the first iteration of the loop behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpeningPeriod {
    /// the first row performs principal accounting only (loan schedules)
    PrincipalOnly,
    /// a leading row that fixes dates without accruing (dry-run previews
    /// and the processing catch-up)
    DatesOnly,
}

/// inputs for one schedule assembly run; all collaborator state is
/// resolved up front so assembly is pure and reproducible
pub struct ScheduleInputs<'a> {
    pub plan: &'a PaymentPlan,
    pub calendar: &'a BusinessCalendar,
    pub policy: &'a dyn InterestPolicy,
    /// tracked accounts, snapshots as of the loan's printed date
    pub accounts: Vec<AccountSnapshot>,
    /// principal financed, the total credit of the balanced entries
    pub principal: Money,
    pub number_of_payments: u32,
    pub start_date: DateTime<Utc>,
    pub opening: OpeningPeriod,
}

/// assembled schedule with its grand total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledSchedule {
    pub rows: Vec<ScheduleRow>,
    pub total: Money,
}

struct AccountState {
    snapshot: AccountSnapshot,
    running_total: Money,
}

/// drive the period advancer and calculators across the payment count,
/// producing ordered rows with running balance and totals
pub fn build_schedule(inputs: ScheduleInputs<'_>) -> AssembledSchedule {
    let ScheduleInputs {
        plan,
        calendar,
        policy,
        accounts,
        principal,
        number_of_payments,
        start_date,
        opening,
    } = inputs;

    let mut states: Vec<AccountState> = accounts
        .into_iter()
        .map(|snapshot| AccountState {
            snapshot,
            running_total: Money::ZERO,
        })
        .collect();

    let iterations = match opening {
        OpeningPeriod::PrincipalOnly => number_of_payments,
        OpeningPeriod::DatesOnly => number_of_payments + 1,
    };
    let payments = Decimal::from(number_of_payments.max(1));

    let mut rows = Vec::with_capacity(iterations as usize);
    let mut balance = principal;
    let mut payment_date = start_date;
    let mut grand_total = Money::ZERO;

    for i in 0..iterations {
        let actual_date = payment_date;
        let days_skipped = calendar.skipped_days(payment_date);
        let scheduled_date = payment_date + Duration::days(i64::from(days_skipped));
        let mut row_total = Money::ZERO;
        let mut period_accounts = Vec::with_capacity(states.len());

        for state in states.iter_mut() {
            let mut value = Money::ZERO;
            let accrues = match opening {
                OpeningPeriod::PrincipalOnly => {
                    i > 0 || state.snapshot.charge_kind() == PeriodCharge::Principal
                }
                OpeningPeriod::DatesOnly => i > 0,
            };

            if accrues {
                match state.snapshot.charge_kind() {
                    PeriodCharge::Principal => {
                        value = (principal / payments).clamp(Money::ZERO, balance);
                        balance -= value;
                    }
                    PeriodCharge::Fines => {
                        if days_skipped > 0 && !state.snapshot.no_grace_period_daily {
                            value = policy.fines(
                                principal,
                                &state.snapshot,
                                days_skipped,
                                plan.mode,
                            );
                        }
                    }
                    PeriodCharge::Interest(basis) => {
                        let base = match basis {
                            RateBasis::OriginalPrincipal => principal,
                            RateBasis::RemainingBalance => balance,
                        };
                        value = policy.interest(base, state.snapshot.interest_standard, plan.mode);
                    }
                    PeriodCharge::None => {}
                }
            }

            if !value.is_zero() {
                state.running_total += value;
            }
            grand_total += value;
            row_total += value;
            period_accounts.push(AccountValue {
                account: state.snapshot.clone(),
                value,
                total: state.running_total,
            });
        }

        period_accounts.sort_by_key(|av| account_type_priority(av.account.account_type));

        rows.push(ScheduleRow {
            actual_date,
            scheduled_date,
            days_skipped,
            total: row_total,
            balance,
            accounts: period_accounts,
        });

        payment_date = next_payment_date(payment_date, plan);
    }

    AssembledSchedule {
        rows,
        total: grand_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountType, ComputationType};
    use crate::calendar::SkipRules;
    use crate::decimal::Rate;
    use crate::interest::StandardPolicy;
    use crate::types::{Currency, PaymentMode};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn manila() -> Currency {
        Currency {
            id: Uuid::new_v4(),
            code: "PHP".to_string(),
            timezone: "Asia/Manila".to_string(),
        }
    }

    fn open_calendar() -> BusinessCalendar {
        BusinessCalendar::for_currency(&manila(), SkipRules::none(), &[]).unwrap()
    }

    fn loan_account() -> AccountSnapshot {
        AccountSnapshot::bare(Uuid::new_v4(), "SALARY LOAN", AccountType::Loan)
    }

    fn interest_account(computation: ComputationType, rate: Decimal) -> AccountSnapshot {
        let mut account = AccountSnapshot::bare(Uuid::new_v4(), "INTEREST", AccountType::Interest);
        account.computation_type = computation;
        account.interest_standard = Rate::from_percentage(rate);
        account
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap()
    }

    fn monthly_inputs<'a>(
        plan: &'a PaymentPlan,
        calendar: &'a BusinessCalendar,
        policy: &'a StandardPolicy,
        accounts: Vec<AccountSnapshot>,
        payments: u32,
    ) -> ScheduleInputs<'a> {
        ScheduleInputs {
            plan,
            calendar,
            policy,
            accounts,
            principal: Money::from_major(12_000),
            number_of_payments: payments,
            start_date: start(),
            opening: OpeningPeriod::PrincipalOnly,
        }
    }

    #[test]
    fn test_monthly_twelve_term_equal_principal() {
        let plan = PaymentPlan::new(PaymentMode::Monthly);
        let calendar = open_calendar();
        let policy = StandardPolicy;
        let schedule = build_schedule(monthly_inputs(
            &plan,
            &calendar,
            &policy,
            vec![loan_account()],
            12,
        ));

        assert_eq!(schedule.rows.len(), 12);
        let mut expected_balance = Money::from_major(12_000);
        for row in &schedule.rows {
            expected_balance -= Money::from_major(1_000);
            assert_eq!(row.accounts[0].value, Money::from_major(1_000));
            assert_eq!(row.balance, expected_balance);
        }
        assert_eq!(schedule.rows[0].balance, Money::from_major(11_000));
        assert_eq!(schedule.rows[11].balance, Money::ZERO);
        assert_eq!(schedule.total, Money::from_major(12_000));
    }

    #[test]
    fn test_straight_interest_constant_diminishing_decreases() {
        let plan = PaymentPlan::new(PaymentMode::Monthly);
        let calendar = open_calendar();
        let policy = StandardPolicy;

        let straight = build_schedule(monthly_inputs(
            &plan,
            &calendar,
            &policy,
            vec![
                loan_account(),
                interest_account(ComputationType::Straight, dec!(2)),
            ],
            12,
        ));
        let values: Vec<Money> = straight.rows[1..]
            .iter()
            .map(|row| row.accounts[1].value)
            .collect();
        assert!(values.iter().all(|v| *v == Money::from_major(240)));

        let diminishing = build_schedule(monthly_inputs(
            &plan,
            &calendar,
            &policy,
            vec![
                loan_account(),
                interest_account(ComputationType::Diminishing, dec!(2)),
            ],
            12,
        ));
        let values: Vec<Money> = diminishing.rows[1..]
            .iter()
            .map(|row| row.accounts[1].value)
            .collect();
        for pair in values.windows(2) {
            assert!(pair[1] < pair[0], "diminishing interest must decrease");
        }
    }

    #[test]
    fn test_lumpsum_single_row() {
        let plan = PaymentPlan::new(PaymentMode::Lumpsum);
        let calendar = open_calendar();
        let policy = StandardPolicy;
        let schedule = build_schedule(monthly_inputs(
            &plan,
            &calendar,
            &policy,
            vec![loan_account()],
            1,
        ));

        assert_eq!(schedule.rows.len(), 1);
        assert_eq!(schedule.rows[0].accounts[0].value, Money::from_major(12_000));
        assert_eq!(schedule.rows[0].balance, Money::ZERO);
    }

    #[test]
    fn test_opening_dates_only_adds_leading_row() {
        let plan = PaymentPlan::new(PaymentMode::Monthly);
        let calendar = open_calendar();
        let policy = StandardPolicy;
        let mut inputs =
            monthly_inputs(&plan, &calendar, &policy, vec![loan_account()], 12);
        inputs.opening = OpeningPeriod::DatesOnly;
        let schedule = build_schedule(inputs);

        assert_eq!(schedule.rows.len(), 13);
        assert_eq!(schedule.rows[0].total, Money::ZERO);
        assert_eq!(schedule.rows[0].balance, Money::from_major(12_000));
        assert_eq!(schedule.rows[1].accounts[0].value, Money::from_major(1_000));
    }

    #[test]
    fn test_skipped_start_shifts_scheduled_date() {
        let plan = PaymentPlan::new(PaymentMode::Daily);
        let rules = SkipRules {
            exclude_saturday: true,
            exclude_sunday: true,
            exclude_holiday: false,
        };
        let calendar = BusinessCalendar::for_currency(&manila(), rules, &[]).unwrap();
        let policy = StandardPolicy;

        // 2024-06-01 is a saturday in manila
        let inputs = ScheduleInputs {
            plan: &plan,
            calendar: &calendar,
            policy: &policy,
            accounts: vec![loan_account()],
            principal: Money::from_major(300),
            number_of_payments: 3,
            start_date: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            opening: OpeningPeriod::PrincipalOnly,
        };
        let schedule = build_schedule(inputs);

        assert_eq!(schedule.rows[0].days_skipped, 2);
        assert_eq!(
            schedule.rows[0].scheduled_date,
            Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap()
        );
        // the nominal date keeps advancing a day at a time regardless
        assert_eq!(
            schedule.rows[1].actual_date,
            Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_rows_sorted_by_account_priority() {
        let plan = PaymentPlan::new(PaymentMode::Monthly);
        let calendar = open_calendar();
        let policy = StandardPolicy;
        let mut fines = AccountSnapshot::bare(Uuid::new_v4(), "FINES", AccountType::Fines);
        fines.fines_amortization = Rate::from_percentage(dec!(2));

        let schedule = build_schedule(monthly_inputs(
            &plan,
            &calendar,
            &policy,
            vec![
                fines,
                interest_account(ComputationType::Straight, dec!(2)),
                loan_account(),
            ],
            12,
        ));

        let types: Vec<AccountType> = schedule.rows[0]
            .accounts
            .iter()
            .map(|av| av.account.account_type)
            .collect();
        assert_eq!(
            types,
            vec![AccountType::Loan, AccountType::Interest, AccountType::Fines]
        );
    }

    #[test]
    fn test_identical_inputs_reproduce_identical_rows() {
        let plan = PaymentPlan::new(PaymentMode::Monthly);
        let calendar = open_calendar();
        let policy = StandardPolicy;
        let accounts = vec![
            loan_account(),
            interest_account(ComputationType::Diminishing, dec!(2)),
        ];

        let first = build_schedule(monthly_inputs(
            &plan,
            &calendar,
            &policy,
            accounts.clone(),
            12,
        ));
        let second = build_schedule(monthly_inputs(&plan, &calendar, &policy, accounts, 12));

        assert_eq!(
            serde_json::to_string(&first.rows).unwrap(),
            serde_json::to_string(&second.rows).unwrap()
        );
    }
}
