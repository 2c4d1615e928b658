use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::loan::{LoanAccount, LoanTransaction};
use crate::repository::LedgerStore;
use crate::types::{AccountId, CurrencyId, EntryType, LoanTransactionId, MemberProfileId};

/// member-ledger line posted when a balanced loan is released
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralLedgerLine {
    pub id: Uuid,
    pub loan_transaction_id: LoanTransactionId,
    pub account_id: AccountId,
    pub member_profile_id: MemberProfileId,
    pub currency_id: Option<CurrencyId>,
    pub reference_number: String,
    pub entry_date: DateTime<Utc>,
    pub description: String,
    pub debit: Money,
    pub credit: Money,
    pub source: String,
}

/// post a balanced loan to the member ledger and stamp it released;
/// everything happens inside one transaction
pub fn release_loan(
    store: &dyn LedgerStore,
    loan_transaction_id: LoanTransactionId,
    now: DateTime<Utc>,
) -> Result<LoanTransaction> {
    info!(loan = %loan_transaction_id, "releasing loan transaction");

    let mut loan = store.loan_transaction(loan_transaction_id)?;
    let loan_account = store.account(loan.account_id)?;
    let member_id = loan.member_profile_id.ok_or_else(|| {
        LedgerError::validation("loan transaction has no member profile to release against")
    })?;
    let member = store.member_profile(member_id)?;
    let currency_id = loan_account.currency_id;

    let entries = store.entries_for_loan(loan.id)?;
    let history_at = loan.released_date.unwrap_or(now);

    // the add-on interest entry folds into the loan account's static debit
    let add_on_debit = entries
        .iter()
        .filter(|e| e.entry_type == EntryType::AddOn)
        .fold(Money::ZERO, |sum, e| sum + e.debit);
    let mut postable: Vec<_> = entries
        .into_iter()
        .filter(|e| e.entry_type != EntryType::AddOn)
        .collect();
    for entry in postable.iter_mut() {
        if entry.entry_type == EntryType::Static && entry.account_id == Some(loan.account_id) {
            entry.debit += add_on_debit;
        }
    }

    let mut tx = store.begin()?;
    tx.lock_account(loan.account_id)?;

    for entry in &postable {
        if entry.is_deduction_deleted {
            continue;
        }
        let account_id = entry.account_id.ok_or_else(|| {
            LedgerError::validation("loan transaction entry is missing its account")
        })?;
        // post under the rules in force at release time
        let snapshot = store.account_history_as_of(account_id, history_at)?;

        tx.post_general_ledger(&GeneralLedgerLine {
            id: Uuid::new_v4(),
            loan_transaction_id: loan.id,
            account_id: snapshot.id,
            member_profile_id: member.id,
            currency_id,
            reference_number: loan.voucher.clone(),
            entry_date: now,
            description: loan_account.description.clone(),
            debit: entry.debit,
            credit: entry.credit,
            source: "loan".to_string(),
        })?;
    }

    // seed a per-account accumulator for every account the schedule tracks
    if let Some(currency_id) = currency_id {
        for related in store.related_accounts(loan.account_id, currency_id)? {
            tx.upsert_loan_account(&LoanAccount::new(loan.id, related.id))?;
        }
    }
    tx.upsert_loan_account(&LoanAccount::new(loan.id, loan.account_id))?;

    loan.released_date = Some(now);
    loan.count += 1;
    tx.update_loan(&loan)?;
    tx.commit()?;

    info!(loan = %loan.id, member = %member.id, "loan released");
    Ok(loan)
}
