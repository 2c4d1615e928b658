use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::SkipRules;
use crate::decimal::Money;
use crate::types::{
    AccountId, BranchId, LoanTransactionId, LoanType, MemberProfileId, OrganizationId, PaymentPlan,
};

/// loan transaction aggregate; the balancer and processors mutate its
/// running counters, the soft-delete lifecycle stays with the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTransaction {
    pub id: LoanTransactionId,
    pub organization_id: OrganizationId,
    pub branch_id: BranchId,
    pub member_profile_id: Option<MemberProfileId>,
    /// the loan account debited on grant
    pub account_id: AccountId,
    /// principal applied for
    pub applied: Money,
    pub terms: u32,
    pub payment_plan: PaymentPlan,
    pub skip_rules: SkipRules,
    pub loan_type: LoanType,
    pub previous_loan_id: Option<LoanTransactionId>,
    /// add-on interest loans consolidate interest into a dedicated entry
    pub is_add_on: bool,
    pub voucher: String,
    pub printed_date: Option<DateTime<Utc>>,
    pub released_date: Option<DateTime<Utc>>,
    /// best-effort claim preventing two concurrent processing runs
    pub processing: bool,
    /// schedule periods already posted by periodic processing
    pub count: u32,
    /// per-period payment figure computed at balancing
    pub amortization: Money,
    pub total_principal: Money,
    pub balance: Money,
    pub total_debit: Money,
    pub total_credit: Money,
}

impl LoanTransaction {
    pub fn new(
        id: LoanTransactionId,
        organization_id: OrganizationId,
        branch_id: BranchId,
        account_id: AccountId,
        applied: Money,
        terms: u32,
        payment_plan: PaymentPlan,
    ) -> Self {
        Self {
            id,
            organization_id,
            branch_id,
            member_profile_id: None,
            account_id,
            applied,
            terms,
            payment_plan,
            skip_rules: SkipRules::none(),
            loan_type: LoanType::Standard,
            previous_loan_id: None,
            is_add_on: false,
            voucher: String::new(),
            printed_date: None,
            released_date: None,
            processing: false,
            count: 0,
            amortization: Money::ZERO,
            total_principal: Money::ZERO,
            balance: Money::ZERO,
            total_debit: Money::ZERO,
            total_credit: Money::ZERO,
        }
    }

    /// display suffix the ledger uses for the loan account entry
    pub fn entry_name(&self, account_name: &str) -> String {
        match self.loan_type {
            LoanType::Standard | LoanType::StandardPrevious => account_name.to_string(),
            LoanType::Restructured => format!("{account_name} - RESTRUCTURED"),
            LoanType::Renewal | LoanType::RenewalWithoutDeduction => {
                format!("{account_name} - CURRENT")
            }
        }
    }
}

/// member identity consumed by release posting and progress reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub id: MemberProfileId,
    pub full_name: String,
    pub member_type_id: Option<uuid::Uuid>,
}

/// per-account accumulator created at release and grown by periodic
/// processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanAccount {
    pub loan_transaction_id: LoanTransactionId,
    pub account_id: AccountId,
    pub amount: Money,
    pub total_added: Money,
    pub add_count: u32,
}

impl LoanAccount {
    pub fn new(loan_transaction_id: LoanTransactionId, account_id: AccountId) -> Self {
        Self {
            loan_transaction_id,
            account_id,
            amount: Money::ZERO,
            total_added: Money::ZERO,
            add_count: 0,
        }
    }

    /// fold one period's accrual into the accumulator
    pub fn accrue(&mut self, amount: Money) {
        self.add_count += 1;
        self.total_added += amount;
        self.amount += amount;
    }
}
