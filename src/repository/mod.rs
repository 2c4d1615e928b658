pub mod memory;

use chrono::{DateTime, Utc};

use crate::account::AccountSnapshot;
use crate::calendar::Holiday;
use crate::deductions::{AutomaticDeduction, ChargesRateScheme};
use crate::errors::Result;
use crate::ledger::entry::LoanTransactionEntry;
use crate::ledger::release::GeneralLedgerLine;
use crate::loan::{LoanAccount, LoanTransaction, MemberProfile};
use crate::types::{
    AccountId, BranchId, ChargesRateSchemeId, ComputationSheetId, Currency, CurrencyId,
    LoanTransactionId, MemberProfileId, OrganizationId,
};

/// narrow read-side interface over the persistence layer; every engine
/// operation loads fresh, transaction-scoped state through it
pub trait LedgerStore: Send + Sync {
    fn account(&self, id: AccountId) -> Result<AccountSnapshot>;

    /// snapshot of the account rules in force at the given instant
    fn account_history_as_of(
        &self,
        id: AccountId,
        at: DateTime<Utc>,
    ) -> Result<AccountSnapshot>;

    /// accounts tied to a loan account in the same currency (interest,
    /// fines, svf and kin)
    fn related_accounts(
        &self,
        loan_account: AccountId,
        currency: CurrencyId,
    ) -> Result<Vec<AccountSnapshot>>;

    fn currency(&self, id: CurrencyId) -> Result<Currency>;

    fn holidays(
        &self,
        organization: OrganizationId,
        branch: BranchId,
        currency: Option<CurrencyId>,
    ) -> Result<Vec<Holiday>>;

    fn automatic_deductions(
        &self,
        computation_sheet: ComputationSheetId,
    ) -> Result<Vec<AutomaticDeduction>>;

    fn charges_rate_scheme(&self, id: ChargesRateSchemeId) -> Result<ChargesRateScheme>;

    fn member_profile(&self, id: MemberProfileId) -> Result<MemberProfile>;

    fn loan_transaction(&self, id: LoanTransactionId) -> Result<LoanTransaction>;

    fn entries_for_loan(&self, id: LoanTransactionId) -> Result<Vec<LoanTransactionEntry>>;

    fn loan_accounts(&self, loan: LoanTransactionId) -> Result<Vec<LoanAccount>>;

    /// loans in scope that nobody has claimed for processing
    fn unprocessed_loans(
        &self,
        organization: OrganizationId,
        branch: BranchId,
    ) -> Result<Vec<LoanTransaction>>;

    /// durable claim transition; false when the loan is already claimed
    fn claim_for_processing(&self, id: LoanTransactionId) -> Result<bool>;

    /// release the processing claim so the loan can be retried
    fn release_processing(&self, id: LoanTransactionId) -> Result<()>;

    /// open a write transaction; dropping it without commit rolls back
    fn begin(&self) -> Result<Box<dyn LedgerTx + '_>>;
}

/// write-side transaction; commits on full success only, so no partial
/// entry set is ever left persisted
pub trait LedgerTx {
    /// read the account under a row-level lock for the transaction's
    /// duration, serializing concurrent postings against it
    fn lock_account(&mut self, id: AccountId) -> Result<AccountSnapshot>;

    fn delete_entries(&mut self, loan: LoanTransactionId) -> Result<()>;

    fn insert_entry(&mut self, entry: &LoanTransactionEntry) -> Result<()>;

    fn update_loan(&mut self, loan: &LoanTransaction) -> Result<()>;

    fn post_general_ledger(&mut self, line: &GeneralLedgerLine) -> Result<()>;

    fn upsert_loan_account(&mut self, account: &LoanAccount) -> Result<()>;

    fn commit(self: Box<Self>) -> Result<()>;

    fn rollback(self: Box<Self>) -> Result<()>;
}
