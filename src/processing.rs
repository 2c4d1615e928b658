use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::account::{PeriodCharge, RateBasis};
use crate::calendar::BusinessCalendar;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::interest::InterestPolicy;
use crate::loan::LoanTransaction;
use crate::repository::LedgerStore;
use crate::schedule::{next_payment_date, number_of_payments};
use crate::types::LoanTransactionId;

/// claim a loan, post the periods it owes, and release the claim again;
/// a loan someone else already claimed is rejected
pub fn process_loan(
    store: &dyn LedgerStore,
    policy: &dyn InterestPolicy,
    loan_transaction_id: LoanTransactionId,
    now: DateTime<Utc>,
) -> Result<LoanTransaction> {
    if !store.claim_for_processing(loan_transaction_id)? {
        return Err(LedgerError::AlreadyProcessing {
            loan: loan_transaction_id,
        });
    }
    let result = process_claimed_loan(store, policy, loan_transaction_id, now);
    // the claim is released on success and on failure, so a failed loan
    // can be retried
    store.release_processing(loan_transaction_id)?;
    result
}

/// periodic catch-up over the payment schedule; the caller must hold the
/// processing claim
pub(crate) fn process_claimed_loan(
    store: &dyn LedgerStore,
    policy: &dyn InterestPolicy,
    loan_transaction_id: LoanTransactionId,
    now: DateTime<Utc>,
) -> Result<LoanTransaction> {
    let mut loan = store.loan_transaction(loan_transaction_id)?;
    info!(loan = %loan.id, count = loan.count, "processing loan periods");

    let member_id = loan.member_profile_id.ok_or_else(|| {
        LedgerError::validation("loan transaction has no member profile to process against")
    })?;
    store.member_profile(member_id)?;

    let loan_account = store.account(loan.account_id)?;
    let currency_id = loan_account.currency_id.ok_or_else(|| {
        LedgerError::validation("loan account has no currency for schedule evaluation")
    })?;
    let currency = store.currency(currency_id)?;

    let mut accumulators = store.loan_accounts(loan.id)?;
    if accumulators.is_empty() {
        return Err(LedgerError::validation(
            "no loan accounts found for the loan transaction",
        ));
    }

    let printed_date = loan.printed_date.ok_or_else(|| {
        LedgerError::validation("loan transaction has no printed date to schedule from")
    })?;
    let history_at = loan.released_date.unwrap_or(printed_date);

    let holidays = store.holidays(loan.organization_id, loan.branch_id, Some(currency.id))?;
    let calendar = BusinessCalendar::for_currency(&currency, loan.skip_rules, &holidays)?;
    let payments = number_of_payments(loan.payment_plan.mode, loan.terms)?;

    let principal = loan.total_principal;
    let mut balance = principal;
    let mut payment_date = printed_date;
    let payments_dec = rust_decimal::Decimal::from(payments.max(1));

    let mut tx = store.begin()?;
    tx.lock_account(loan.account_id)?;

    for period in 0..=payments {
        let days_skipped = calendar.skipped_days(payment_date);

        if period > 0 {
            let scheduled_date = payment_date + Duration::days(i64::from(days_skipped));
            let principal_share = (principal / payments_dec).clamp(Money::ZERO, balance);

            // only periods past the posted count and already due accrue
            if period >= loan.count && scheduled_date < now {
                for accumulator in accumulators.iter_mut() {
                    let snapshot =
                        store.account_history_as_of(accumulator.account_id, history_at)?;

                    let amount = match snapshot.charge_kind() {
                        // principal is settled by payments, not accrual
                        PeriodCharge::Principal => continue,
                        PeriodCharge::Fines => {
                            if days_skipped > 0 && !snapshot.no_grace_period_daily {
                                policy.fines(
                                    principal,
                                    &snapshot,
                                    days_skipped,
                                    loan.payment_plan.mode,
                                )
                            } else {
                                Money::ZERO
                            }
                        }
                        PeriodCharge::Interest(basis) => {
                            let base = match basis {
                                RateBasis::OriginalPrincipal => principal,
                                RateBasis::RemainingBalance => balance,
                            };
                            policy.interest(base, snapshot.interest_standard, loan.payment_plan.mode)
                        }
                        PeriodCharge::None => Money::ZERO,
                    };

                    if amount.is_positive() {
                        accumulator.accrue(amount);
                        tx.upsert_loan_account(accumulator)?;
                        debug!(
                            loan = %loan.id,
                            account = %accumulator.account_id,
                            %amount,
                            period,
                            "accrued period amount"
                        );
                    }
                }

                loan.count = period + 1;
                tx.update_loan(&loan)?;
            }

            balance -= principal_share;
        }

        payment_date = next_payment_date(payment_date, &loan.payment_plan);
    }

    tx.commit()?;
    info!(loan = %loan.id, count = loan.count, "loan periods posted");
    Ok(loan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountSnapshot, AccountType, ComputationType};
    use crate::decimal::{Money, Rate};
    use crate::interest::StandardPolicy;
    use crate::loan::{LoanAccount, MemberProfile};
    use crate::repository::memory::MemoryLedger;
    use crate::types::{Currency, PaymentMode, PaymentPlan};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    struct Fixture {
        store: MemoryLedger,
        loan_id: LoanTransactionId,
    }

    fn fixture(computation: ComputationType) -> Fixture {
        let store = MemoryLedger::new();
        let currency = Currency {
            id: Uuid::new_v4(),
            code: "PHP".to_string(),
            timezone: "Asia/Manila".to_string(),
        };
        let currency_id = currency.id;
        store.put_currency(currency);

        let mut loan_account =
            AccountSnapshot::bare(Uuid::new_v4(), "SALARY LOAN", AccountType::Loan);
        loan_account.currency_id = Some(currency_id);
        let loan_account_id = loan_account.id;
        store.put_account(loan_account);

        let mut interest =
            AccountSnapshot::bare(Uuid::new_v4(), "LOAN INTEREST", AccountType::Interest);
        interest.computation_type = computation;
        interest.interest_standard = Rate::from_percentage(dec!(2));
        interest.currency_id = Some(currency_id);
        let interest_id = interest.id;
        store.put_account(interest);

        let member = MemberProfile {
            id: Uuid::new_v4(),
            full_name: "Juana Dela Cruz".to_string(),
            member_type_id: None,
        };
        let member_id = member.id;
        store.put_member(member);

        let mut loan = LoanTransaction::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            loan_account_id,
            Money::from_major(12_000),
            12,
            PaymentPlan::new(PaymentMode::Monthly),
        );
        loan.member_profile_id = Some(member_id);
        loan.total_principal = Money::from_major(12_000);
        loan.balance = Money::from_major(12_000);
        loan.printed_date = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let loan_id = loan.id;
        store.put_loan(loan);

        // accumulators the release step would have seeded
        let interest_accumulator = LoanAccount::new(loan_id, interest_id);
        let principal_accumulator = LoanAccount::new(loan_id, loan_account_id);
        {
            let mut tx = store.begin().unwrap();
            tx.upsert_loan_account(&interest_accumulator).unwrap();
            tx.upsert_loan_account(&principal_accumulator).unwrap();
            tx.commit().unwrap();
        }

        Fixture { store, loan_id }
    }

    fn mid_march() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_catch_up_posts_due_periods_only() {
        let fixture = fixture(ComputationType::Straight);
        let policy = StandardPolicy;

        let loan = process_loan(&fixture.store, &policy, fixture.loan_id, mid_march()).unwrap();

        // printed jan 1, flat 30-day advances: jan 31 and mar 1 are due by
        // mid-march, mar 31 is not
        assert_eq!(loan.count, 3);
        assert!(!loan.processing);

        let accumulators = fixture.store.loan_accounts(fixture.loan_id).unwrap();
        let interest = accumulators
            .iter()
            .find(|a| a.add_count > 0)
            .expect("interest accumulator must have accrued");
        assert_eq!(interest.add_count, 2);
        // straight interest: 2% of 12,000 per period
        assert_eq!(interest.amount, Money::from_major(480));
    }

    #[test]
    fn test_diminishing_accrues_less_each_period() {
        let fixture = fixture(ComputationType::Diminishing);
        let policy = StandardPolicy;

        process_loan(&fixture.store, &policy, fixture.loan_id, mid_march()).unwrap();

        let accumulators = fixture.store.loan_accounts(fixture.loan_id).unwrap();
        let interest = accumulators.iter().find(|a| a.add_count > 0).unwrap();
        // first due period charges on 12,000, the second on 11,000
        assert_eq!(interest.amount, Money::from_major(240 + 220));
    }

    #[test]
    fn test_reprocessing_skips_posted_periods() {
        let fixture = fixture(ComputationType::Straight);
        let policy = StandardPolicy;

        process_loan(&fixture.store, &policy, fixture.loan_id, mid_march()).unwrap();
        let loan = process_loan(&fixture.store, &policy, fixture.loan_id, mid_march()).unwrap();

        assert_eq!(loan.count, 3);
        let accumulators = fixture.store.loan_accounts(fixture.loan_id).unwrap();
        let interest = accumulators.iter().find(|a| a.add_count > 0).unwrap();
        // nothing newly due, so the totals are unchanged
        assert_eq!(interest.amount, Money::from_major(480));
    }

    #[test]
    fn test_claimed_loan_is_rejected() {
        let fixture = fixture(ComputationType::Straight);
        let policy = StandardPolicy;
        assert!(fixture.store.claim_for_processing(fixture.loan_id).unwrap());

        let err =
            process_loan(&fixture.store, &policy, fixture.loan_id, mid_march()).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyProcessing { .. }));
    }

    #[test]
    fn test_missing_printed_date_fails_and_releases_claim() {
        let fixture = fixture(ComputationType::Straight);
        let policy = StandardPolicy;
        {
            let mut loan = fixture.store.loan_transaction(fixture.loan_id).unwrap();
            loan.printed_date = None;
            fixture.store.put_loan(loan);
        }

        let err =
            process_loan(&fixture.store, &policy, fixture.loan_id, mid_march()).unwrap_err();
        assert!(matches!(err, LedgerError::Validation { .. }));
        // failure must leave the loan claimable for a retry
        assert!(fixture.store.claim_for_processing(fixture.loan_id).unwrap());
    }
}
