use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::decimal::Money;
use crate::deductions::{rule_credit, ChargeContext};
use crate::errors::{LedgerError, Result};
use crate::ledger::entry::{entry_totals, LoanTransactionEntry};
use crate::loan::LoanTransaction;
use crate::repository::LedgerStore;
use crate::schedule::amortization_per_period;
use crate::types::{AccountId, EntryType, LoanTransactionId};

/// identifiers required to balance a loan transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRequest {
    pub loan_transaction_id: LoanTransactionId,
    /// account credited with the disbursed cash
    pub cash_equivalence_account_id: AccountId,
}

/// phases the balancer moves through; recorded for traceability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalancingPhase {
    Unbalanced,
    StaticEntriesResolved,
    DeductionsResolved,
    CashEntryAdjusted,
    Persisted,
}

/// recompute and persist the entry set of a loan transaction so total
/// debit equals total credit; the prior set is replaced atomically
pub fn balance_loan(store: &dyn LedgerStore, request: BalanceRequest) -> Result<LoanTransaction> {
    let mut phase = BalancingPhase::Unbalanced;
    info!(?phase, loan = %request.loan_transaction_id, "balancing loan transaction");

    let mut loan = store.loan_transaction(request.loan_transaction_id)?;
    let loan_account = store.account(loan.account_id)?;
    let existing = store.entries_for_loan(loan.id)?;

    let deductions_disabled = loan.loan_type.deductions_disabled();
    let rules = match loan_account.computation_sheet_id {
        Some(sheet) if !deductions_disabled => store.automatic_deductions(sheet)?,
        _ => Vec::new(),
    };

    let member_type_id = match loan.member_profile_id {
        Some(id) => store.member_profile(id)?.member_type_id,
        None => None,
    };
    let ctx = ChargeContext {
        applied: loan.applied,
        terms: loan.terms,
        mode: loan.payment_plan.mode,
        member_type_id,
    };

    let mut tx = store.begin()?;
    // serialize concurrent postings against the loan account
    tx.lock_account(loan.account_id)?;

    // categorize the existing set; stale add-on entries are recomputed
    let mut static_entries = Vec::new();
    let mut deduction_entries = Vec::new();
    let mut computed_entries = Vec::new();
    for entry in &existing {
        match entry.entry_type {
            EntryType::Static => static_entries.push(entry.clone()),
            EntryType::Deduction => deduction_entries.push(entry.clone()),
            EntryType::AutomaticDeduction if !deductions_disabled => {
                computed_entries.push(entry.clone())
            }
            _ => {}
        }
    }

    if static_entries.len() < 2 {
        let cash_account = store.account(request.cash_equivalence_account_id)?;
        let mut cash_entry = LoanTransactionEntry::new(loan.id, EntryType::Static);
        cash_entry.account_id = Some(cash_account.id);
        cash_entry.name = cash_account.name.clone();
        cash_entry.description = cash_account.description.clone();
        cash_entry.credit = loan.applied;

        let mut loan_entry = LoanTransactionEntry::new(loan.id, EntryType::Static);
        loan_entry.account_id = Some(loan_account.id);
        loan_entry.name = loan_account.name.clone();
        loan_entry.description = loan_account.description.clone();
        loan_entry.debit = loan.applied;

        static_entries = vec![cash_entry, loan_entry];
    }

    // the cash-equivalence account always orders first
    let first_is_cash = match static_entries[0].account_id {
        Some(id) => store.account(id)?.cash_equivalence,
        None => false,
    };
    if !first_is_cash {
        static_entries.swap(0, 1);
    }
    let mut result = static_entries;
    phase = BalancingPhase::StaticEntriesResolved;
    debug!(?phase, entries = result.len(), "static entries in place");

    let mut total_non_add_on = Money::ZERO;
    let mut total_add_on = Money::ZERO;

    for entry in deduction_entries {
        if entry.is_add_on {
            total_add_on += entry.credit;
        } else {
            total_non_add_on += entry.credit;
        }
        result.push(entry);
    }

    for mut entry in computed_entries.clone() {
        if entry.is_deduction_deleted {
            // keep the marker, it carries no value
            result.push(entry);
            continue;
        }

        if !entry.amount.is_zero() {
            entry.credit = entry.amount;
        } else if let Some(rule) = entry
            .automatic_deduction_id
            .and_then(|id| rules.iter().find(|r| r.id == id))
        {
            let scheme = match rule.charges_rate_scheme_id {
                Some(id) => Some(store.charges_rate_scheme(id)?),
                None => None,
            };
            entry.credit = rule_credit(rule, scheme.as_ref(), &ctx);
        }

        if entry.is_add_on {
            total_add_on += entry.credit;
        } else {
            total_non_add_on += entry.credit;
        }
        if entry.credit.is_positive() {
            result.push(entry);
        }
    }

    // fold in rules not yet represented among the computed entries
    for rule in &rules {
        let represented = computed_entries
            .iter()
            .any(|e| e.automatic_deduction_id == Some(rule.id));
        if represented {
            continue;
        }

        let scheme = match rule.charges_rate_scheme_id {
            Some(id) => Some(store.charges_rate_scheme(id)?),
            None => None,
        };
        let credit = rule_credit(rule, scheme.as_ref(), &ctx);

        if rule.add_on {
            total_add_on += credit;
        } else {
            total_non_add_on += credit;
        }
        if credit.is_positive() {
            let mut entry = LoanTransactionEntry::new(loan.id, EntryType::AutomaticDeduction);
            entry.account_id = Some(rule.account.id);
            entry.automatic_deduction_id = Some(rule.id);
            entry.name = rule.name.clone();
            entry.description = rule.account.description.clone();
            entry.is_add_on = rule.add_on;
            entry.credit = credit;
            result.push(entry);
        }
    }

    // renewals and restructures carry the previous loan's balance forward
    if loan.loan_type.carries_previous_balance() {
        if let Some(previous_id) = loan.previous_loan_id {
            let previous = store.loan_transaction(previous_id)?;
            let previous_account = store.account(previous.account_id)?;
            let mut entry = LoanTransactionEntry::new(loan.id, EntryType::Previous);
            entry.account_id = Some(previous_account.id);
            entry.name = previous_account.name.clone();
            entry.description = previous_account.description.clone();
            entry.credit = previous.balance;
            total_non_add_on += previous.balance;
            result.push(entry);
        }
    }
    phase = BalancingPhase::DeductionsResolved;
    debug!(?phase, %total_non_add_on, %total_add_on, "deductions resolved");

    // the cash entry disburses what deductions leave of the principal;
    // add-on loans keep the add-on portion out of the disbursement
    result[0].credit = if loan.is_add_on {
        loan.applied - total_non_add_on
    } else {
        loan.applied - (total_non_add_on + total_add_on)
    };

    result[1].debit = loan.applied;
    result[1].name = loan.entry_name(&loan_account.name);

    if loan.is_add_on && total_add_on.is_positive() {
        let mut add_on_entry = LoanTransactionEntry::new(loan.id, EntryType::AddOn);
        add_on_entry.name = "ADD ON INTEREST".to_string();
        add_on_entry.is_add_on = true;
        add_on_entry.debit = total_add_on;
        result.push(add_on_entry);
    }
    phase = BalancingPhase::CashEntryAdjusted;
    debug!(?phase, cash_credit = %result[0].credit, "cash entry adjusted");

    // replace the prior set atomically
    tx.delete_entries(loan.id)?;
    for (index, entry) in result.iter_mut().enumerate() {
        entry.index = index;
        tx.insert_entry(entry)?;
    }

    let (total_debit, total_credit) = entry_totals(&result);
    if total_debit != total_credit {
        warn!(%total_debit, %total_credit, "refusing to persist unbalanced ledger");
        tx.rollback()?;
        return Err(LedgerError::UnbalancedLedger {
            debit: total_debit,
            credit: total_credit,
        });
    }

    loan.amortization = amortization_per_period(loan.applied, &loan.payment_plan, loan.terms)?;
    loan.total_principal = total_credit;
    loan.balance = total_credit;
    loan.total_credit = total_credit;
    loan.total_debit = total_debit;
    tx.update_loan(&loan)?;
    tx.commit()?;

    phase = BalancingPhase::Persisted;
    info!(?phase, loan = %loan.id, %total_debit, %total_credit, "loan balanced");
    Ok(loan)
}
