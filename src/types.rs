use chrono::Weekday;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// unique identifier for a loan transaction
pub type LoanTransactionId = Uuid;
/// unique identifier for an account
pub type AccountId = Uuid;
/// unique identifier for a branch
pub type BranchId = Uuid;
/// unique identifier for an organization
pub type OrganizationId = Uuid;
/// unique identifier for a currency
pub type CurrencyId = Uuid;
/// unique identifier for a computation sheet
pub type ComputationSheetId = Uuid;
/// unique identifier for a charges rate scheme
pub type ChargesRateSchemeId = Uuid;
/// unique identifier for an automatic deduction rule
pub type AutomaticDeductionId = Uuid;
/// unique identifier for a member profile
pub type MemberProfileId = Uuid;

/// payment frequency of a loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMode {
    Daily,
    Weekly,
    SemiMonthly,
    Monthly,
    Quarterly,
    SemiAnnual,
    Lumpsum,
    FixedDays,
}

/// lifecycle category of a loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoanType {
    Standard,
    StandardPrevious,
    Renewal,
    RenewalWithoutDeduction,
    Restructured,
}

impl LoanType {
    /// renewal-family loans carry the previous loan's balance forward
    pub fn carries_previous_balance(&self) -> bool {
        matches!(
            self,
            LoanType::Renewal | LoanType::RenewalWithoutDeduction | LoanType::Restructured
        )
    }

    /// these loan types never receive automatic deductions
    pub fn deductions_disabled(&self) -> bool {
        matches!(
            self,
            LoanType::RenewalWithoutDeduction | LoanType::Restructured | LoanType::StandardPrevious
        )
    }
}

/// classification of a ledger entry within a loan transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryType {
    Static,
    Deduction,
    AutomaticDeduction,
    AddOn,
    Previous,
}

/// currency with the IANA timezone governing its business calendar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub id: CurrencyId,
    pub code: String,
    pub timezone: String,
}

/// mode parameters steering the period advancer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPlan {
    pub mode: PaymentMode,
    /// weekday paid on, weekly mode only
    pub weekly_payday: Weekday,
    /// first semi-monthly payday (day of month)
    pub semi_monthly_payday1: u32,
    /// second semi-monthly payday (day of month)
    pub semi_monthly_payday2: u32,
    /// monthly mode keeps the original day-of-month when set
    pub monthly_exact_day: bool,
    /// interval length for fixed-days mode
    pub fixed_days: u32,
}

impl PaymentPlan {
    pub fn new(mode: PaymentMode) -> Self {
        Self {
            mode,
            weekly_payday: Weekday::Mon,
            semi_monthly_payday1: 15,
            semi_monthly_payday2: 30,
            monthly_exact_day: false,
            fixed_days: 0,
        }
    }
}
