use std::sync::Arc;
use std::time::Duration;

use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::account::AccountSnapshot;
use crate::batch::{BatchHandle, BatchProcessor};
use crate::calendar::{BusinessCalendar, SkipRules};
use crate::decimal::Money;
use crate::deductions::{rule_credit, ChargeContext};
use crate::errors::{LedgerError, Result};
use crate::events::ProgressPublisher;
use crate::interest::InterestPolicy;
use crate::ledger::balancer::{balance_loan, BalanceRequest};
use crate::ledger::entry::{entry_totals, LoanTransactionEntry};
use crate::ledger::release::release_loan;
use crate::loan::LoanTransaction;
use crate::processing::process_loan;
use crate::repository::LedgerStore;
use crate::schedule::{
    build_schedule, number_of_payments, OpeningPeriod, ScheduleInputs, ScheduleRow,
};
use crate::types::{
    AccountId, BranchId, ComputationSheetId, Currency, EntryType, LoanTransactionId,
    OrganizationId, PaymentPlan,
};

/// schedule rows plus the entry previews and totals callers render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationView {
    pub entries: Vec<LoanTransactionEntry>,
    pub total_debit: Money,
    pub total_credit: Money,
    pub currency: Currency,
    pub total: Money,
    pub schedule: Vec<ScheduleRow>,
}

/// dry-run inputs for a loan that does not exist yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputationSheetRequest {
    pub computation_sheet_id: ComputationSheetId,
    pub organization_id: OrganizationId,
    pub branch_id: BranchId,
    /// prospective loan account
    pub account_id: AccountId,
    /// account the disbursed cash would come from
    pub cash_account_id: AccountId,
    pub applied: Money,
    pub terms: u32,
    pub is_add_on: bool,
    pub member_type_id: Option<Uuid>,
    pub plan: PaymentPlan,
    pub skip_rules: SkipRules,
    /// accounts the prospective schedule tracks besides the loan account
    pub accounts: Vec<AccountSnapshot>,
}

/// facade wiring the stores, rate policy, clock, and event channel into
/// the loan operations
pub struct LedgerEngine {
    store: Arc<dyn LedgerStore>,
    policy: Arc<dyn InterestPolicy>,
    publisher: Arc<dyn ProgressPublisher>,
    time: Arc<SafeTimeProvider>,
}

impl LedgerEngine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        policy: Arc<dyn InterestPolicy>,
        publisher: Arc<dyn ProgressPublisher>,
        time: Arc<SafeTimeProvider>,
    ) -> Self {
        Self {
            store,
            policy,
            publisher,
            time,
        }
    }

    /// amortization schedule of a persisted loan transaction, with its
    /// current entry set and totals
    pub fn amortization_schedule(&self, loan_id: LoanTransactionId) -> Result<AmortizationView> {
        let loan = self.store.loan_transaction(loan_id)?;
        let loan_account = self.store.account(loan.account_id)?;
        let currency_id = loan_account.currency_id.ok_or_else(|| {
            LedgerError::validation("loan account has no currency for schedule generation")
        })?;
        let currency = self.store.currency(currency_id)?;

        let entries = self.store.entries_for_loan(loan.id)?;
        let (total_debit, total_credit) = entry_totals(&entries);

        // past periods compute under the rules in effect when they were due
        let as_of = loan.printed_date.unwrap_or_else(|| self.time.now());
        let mut tracked = Vec::new();
        for account in self.store.related_accounts(loan.account_id, currency.id)? {
            tracked.push(self.store.account_history_as_of(account.id, as_of)?);
        }
        tracked.push(self.store.account_history_as_of(loan.account_id, as_of)?);

        let holidays =
            self.store
                .holidays(loan.organization_id, loan.branch_id, Some(currency.id))?;
        let calendar = BusinessCalendar::for_currency(&currency, loan.skip_rules, &holidays)?;
        let payments = number_of_payments(loan.payment_plan.mode, loan.terms)?;

        let schedule = build_schedule(ScheduleInputs {
            plan: &loan.payment_plan,
            calendar: &calendar,
            policy: self.policy.as_ref(),
            accounts: tracked,
            principal: total_credit,
            number_of_payments: payments,
            start_date: as_of,
            opening: OpeningPeriod::PrincipalOnly,
        });

        Ok(AmortizationView {
            entries,
            total_debit,
            total_credit,
            currency,
            total: schedule.total,
            schedule: schedule.rows,
        })
    }

    /// dry-run preview: assemble the would-be entry set for a prospective
    /// loan and project its schedule, without touching persistence
    pub fn computation_sheet_preview(
        &self,
        request: ComputationSheetRequest,
    ) -> Result<AmortizationView> {
        let loan_account = self.store.account(request.account_id)?;
        let cash_account = self.store.account(request.cash_account_id)?;
        let currency_id = loan_account.currency_id.ok_or_else(|| {
            LedgerError::validation("loan account has no currency for schedule generation")
        })?;
        let currency = self.store.currency(currency_id)?;
        let rules = self
            .store
            .automatic_deductions(request.computation_sheet_id)?;

        let preview_id = Uuid::nil();
        let mut cash_entry = LoanTransactionEntry::new(preview_id, EntryType::Static);
        cash_entry.account_id = Some(cash_account.id);
        cash_entry.name = cash_account.name.clone();
        cash_entry.credit = request.applied;
        let mut loan_entry = LoanTransactionEntry::new(preview_id, EntryType::Static);
        loan_entry.account_id = Some(loan_account.id);
        loan_entry.name = loan_account.name.clone();
        loan_entry.debit = request.applied;
        let mut entries = vec![cash_entry, loan_entry];

        let ctx = ChargeContext {
            applied: request.applied,
            terms: request.terms,
            mode: request.plan.mode,
            member_type_id: request.member_type_id,
        };
        let mut total_non_add_on = Money::ZERO;
        let mut total_add_on = Money::ZERO;
        for rule in &rules {
            let scheme = match rule.charges_rate_scheme_id {
                Some(id) => Some(self.store.charges_rate_scheme(id)?),
                None => None,
            };
            let credit = rule_credit(rule, scheme.as_ref(), &ctx);
            if rule.add_on {
                total_add_on += credit;
            } else {
                total_non_add_on += credit;
            }
            if credit.is_positive() {
                let mut entry = LoanTransactionEntry::new(preview_id, EntryType::Deduction);
                entry.account_id = Some(rule.account.id);
                entry.automatic_deduction_id = Some(rule.id);
                entry.name = rule.name.clone();
                entry.description = rule.account.description.clone();
                entry.is_add_on = rule.add_on;
                entry.credit = credit;
                entries.push(entry);
            }
        }

        entries[0].credit = if request.is_add_on {
            request.applied - total_non_add_on
        } else {
            request.applied - (total_non_add_on + total_add_on)
        };
        if request.is_add_on && total_add_on.is_positive() {
            let mut add_on = LoanTransactionEntry::new(preview_id, EntryType::AddOn);
            add_on.name = "ADD ON INTEREST".to_string();
            add_on.is_add_on = true;
            add_on.debit = total_add_on;
            entries.push(add_on);
        }
        for (index, entry) in entries.iter_mut().enumerate() {
            entry.index = index;
        }

        let (total_debit, total_credit) = entry_totals(&entries);
        if total_debit != total_credit {
            return Err(LedgerError::UnbalancedLedger {
                debit: total_debit,
                credit: total_credit,
            });
        }

        let holidays =
            self.store
                .holidays(request.organization_id, request.branch_id, Some(currency.id))?;
        let calendar = BusinessCalendar::for_currency(&currency, request.skip_rules, &holidays)?;
        let payments = number_of_payments(request.plan.mode, request.terms)?;

        let mut tracked = request.accounts;
        tracked.push(loan_account);

        let schedule = build_schedule(ScheduleInputs {
            plan: &request.plan,
            calendar: &calendar,
            policy: self.policy.as_ref(),
            accounts: tracked,
            principal: total_credit,
            number_of_payments: payments,
            start_date: self.time.now(),
            opening: OpeningPeriod::DatesOnly,
        });

        info!(sheet = %request.computation_sheet_id, rows = schedule.rows.len(), "computed sheet preview");
        Ok(AmortizationView {
            entries,
            total_debit,
            total_credit,
            currency,
            total: schedule.total,
            schedule: schedule.rows,
        })
    }

    /// recompute and persist a balanced entry set for the loan
    pub fn balance(&self, request: BalanceRequest) -> Result<LoanTransaction> {
        balance_loan(self.store.as_ref(), request)
    }

    /// post a balanced loan to the member ledger and stamp it released
    pub fn release(&self, loan_id: LoanTransactionId) -> Result<LoanTransaction> {
        release_loan(self.store.as_ref(), loan_id, self.time.now())
    }

    /// catch a single loan up with its due periods
    pub fn process(&self, loan_id: LoanTransactionId) -> Result<LoanTransaction> {
        process_loan(
            self.store.as_ref(),
            self.policy.as_ref(),
            loan_id,
            self.time.now(),
        )
    }

    /// claim and process every eligible loan in scope on a detached task;
    /// must be called within a tokio runtime
    pub fn process_all(
        &self,
        organization: OrganizationId,
        branch: BranchId,
        timeout: Duration,
    ) -> Result<BatchHandle> {
        BatchProcessor::new(
            Arc::clone(&self.store),
            Arc::clone(&self.policy),
            Arc::clone(&self.publisher),
            Arc::clone(&self.time),
        )
        .with_timeout(timeout)
        .trigger(organization, branch)
    }
}
