use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{AccountId, AutomaticDeductionId, EntryType, LoanTransactionId};

/// one debit or credit line of a loan transaction's double-entry set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTransactionEntry {
    pub id: Uuid,
    pub loan_transaction_id: LoanTransactionId,
    pub entry_type: EntryType,
    pub account_id: Option<AccountId>,
    pub automatic_deduction_id: Option<AutomaticDeductionId>,
    pub name: String,
    pub description: String,
    pub debit: Money,
    pub credit: Money,
    /// operator-pinned amount that overrides recomputation
    pub amount: Money,
    pub is_add_on: bool,
    /// deduction removed by hand; kept as a marker, excluded from totals
    pub is_deduction_deleted: bool,
    /// position within the persisted entry set
    pub index: usize,
}

impl LoanTransactionEntry {
    pub fn new(loan_transaction_id: LoanTransactionId, entry_type: EntryType) -> Self {
        Self {
            id: Uuid::new_v4(),
            loan_transaction_id,
            entry_type,
            account_id: None,
            automatic_deduction_id: None,
            name: String::new(),
            description: String::new(),
            debit: Money::ZERO,
            credit: Money::ZERO,
            amount: Money::ZERO,
            is_add_on: false,
            is_deduction_deleted: false,
            index: 0,
        }
    }

    /// entries excluded by hand carry no weight in the totals
    pub fn counts_toward_totals(&self) -> bool {
        !self.is_deduction_deleted
    }
}

/// sum debit and credit over non-deleted entries
pub fn entry_totals(entries: &[LoanTransactionEntry]) -> (Money, Money) {
    entries
        .iter()
        .filter(|e| e.counts_toward_totals())
        .fold((Money::ZERO, Money::ZERO), |(debit, credit), entry| {
            (debit + entry.debit, credit + entry.credit)
        })
}
