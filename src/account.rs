use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::Rate;
use crate::types::{AccountId, ComputationSheetId, CurrencyId, PaymentMode};

/// ledger role of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    Deposit,
    Loan,
    ArLedger,
    ArAging,
    Fines,
    Interest,
    SvfLedger,
    WriteOff,
    ApLedger,
    Other,
    TimeDeposit,
}

/// algorithm used to compute an account's per-period interest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComputationType {
    Straight,
    Diminishing,
    DiminishingStraight,
}

/// base amount a per-period interest computation runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateBasis {
    /// the original principal, unchanged across periods
    OriginalPrincipal,
    /// the remaining balance as of the period
    RemainingBalance,
}

/// what an account contributes to a schedule period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodCharge {
    /// principal repayment, capped by the remaining balance
    Principal,
    /// fines against skipped days
    Fines,
    /// interest against the given basis
    Interest(RateBasis),
    /// account carries no per-period value
    None,
}

/// declarative dispatch from account shape to period formula
pub fn period_charge(account_type: AccountType, computation: ComputationType) -> PeriodCharge {
    match account_type {
        AccountType::Loan => PeriodCharge::Principal,
        AccountType::Fines => PeriodCharge::Fines,
        AccountType::Interest | AccountType::SvfLedger => match computation {
            ComputationType::Straight => PeriodCharge::Interest(RateBasis::OriginalPrincipal),
            ComputationType::Diminishing | ComputationType::DiminishingStraight => {
                PeriodCharge::Interest(RateBasis::RemainingBalance)
            }
        },
        _ => PeriodCharge::None,
    }
}

/// ordering priority of account types inside a schedule row
pub fn account_type_priority(account_type: AccountType) -> u8 {
    match account_type {
        AccountType::Loan => 1,
        AccountType::Interest => 2,
        AccountType::SvfLedger => 3,
        AccountType::Fines => 4,
        _ => 5,
    }
}

/// fines grace percentages per payment mode; a percentage discounts the
/// fines rate, 100 or more suppresses the fine entirely
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GracePeriods {
    pub daily: Decimal,
    pub weekly: Decimal,
    pub semi_monthly: Decimal,
    pub monthly: Decimal,
    pub quarterly: Decimal,
    pub semi_annual: Decimal,
    pub lumpsum: Decimal,
}

impl GracePeriods {
    pub fn percentage_for(&self, mode: PaymentMode) -> Decimal {
        match mode {
            PaymentMode::Daily | PaymentMode::FixedDays => self.daily,
            PaymentMode::Weekly => self.weekly,
            PaymentMode::SemiMonthly => self.semi_monthly,
            PaymentMode::Monthly => self.monthly,
            PaymentMode::Quarterly => self.quarterly,
            PaymentMode::SemiAnnual => self.semi_annual,
            PaymentMode::Lumpsum => self.lumpsum,
        }
    }
}

/// immutable snapshot of the computation-relevant shape of an account;
/// one structural value replaces per-field copying between account,
/// request, and history representations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub id: AccountId,
    pub name: String,
    pub description: String,
    pub account_type: AccountType,
    pub computation_type: ComputationType,
    pub currency_id: Option<CurrencyId>,
    pub computation_sheet_id: Option<ComputationSheetId>,
    pub interest_standard: Rate,
    pub interest_secured: Rate,
    pub fines_amortization: Rate,
    pub fines_maturity: Rate,
    pub grace_periods: GracePeriods,
    pub no_grace_period_daily: bool,
    pub cash_equivalence: bool,
}

impl AccountSnapshot {
    /// minimal snapshot for an account that only tracks a type
    pub fn bare(id: AccountId, name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            account_type,
            computation_type: ComputationType::Straight,
            currency_id: None,
            computation_sheet_id: None,
            interest_standard: Rate::ZERO,
            interest_secured: Rate::ZERO,
            fines_amortization: Rate::ZERO,
            fines_maturity: Rate::ZERO,
            grace_periods: GracePeriods::default(),
            no_grace_period_daily: false,
            cash_equivalence: false,
        }
    }

    pub fn charge_kind(&self) -> PeriodCharge {
        period_charge(self.account_type, self.computation_type)
    }
}

/// account snapshot in force at a point in time; schedule rows dated before
/// a rate change must compute against the rules that were effective then
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountHistory {
    pub account_id: AccountId,
    pub effective_at: DateTime<Utc>,
    pub snapshot: AccountSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_dispatch_table() {
        assert_eq!(
            period_charge(AccountType::Loan, ComputationType::Diminishing),
            PeriodCharge::Principal
        );
        assert_eq!(
            period_charge(AccountType::Fines, ComputationType::Straight),
            PeriodCharge::Fines
        );
        assert_eq!(
            period_charge(AccountType::Interest, ComputationType::Straight),
            PeriodCharge::Interest(RateBasis::OriginalPrincipal)
        );
        assert_eq!(
            period_charge(AccountType::SvfLedger, ComputationType::DiminishingStraight),
            PeriodCharge::Interest(RateBasis::RemainingBalance)
        );
        assert_eq!(
            period_charge(AccountType::Deposit, ComputationType::Diminishing),
            PeriodCharge::None
        );
    }

    #[test]
    fn test_row_ordering_priority() {
        let mut types = vec![
            AccountType::Fines,
            AccountType::Deposit,
            AccountType::Loan,
            AccountType::Interest,
        ];
        types.sort_by_key(|t| account_type_priority(*t));
        assert_eq!(
            types,
            vec![
                AccountType::Loan,
                AccountType::Interest,
                AccountType::Fines,
                AccountType::Deposit,
            ]
        );
    }

    #[test]
    fn test_grace_lookup_follows_mode() {
        let grace = GracePeriods {
            weekly: rust_decimal_macros::dec!(25),
            ..GracePeriods::default()
        };
        assert_eq!(
            grace.percentage_for(PaymentMode::Weekly),
            rust_decimal_macros::dec!(25)
        );
        assert!(grace.percentage_for(PaymentMode::Monthly).is_zero());
    }

    #[test]
    fn test_bare_snapshot_defaults() {
        let snapshot = AccountSnapshot::bare(Uuid::new_v4(), "CASH ON HAND", AccountType::Other);
        assert_eq!(snapshot.charge_kind(), PeriodCharge::None);
        assert!(!snapshot.cash_equivalence);
    }
}
