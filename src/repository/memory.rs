use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::account::{AccountHistory, AccountSnapshot};
use crate::calendar::Holiday;
use crate::deductions::{AutomaticDeduction, ChargesRateScheme};
use crate::errors::{LedgerError, Result};
use crate::ledger::entry::LoanTransactionEntry;
use crate::ledger::release::GeneralLedgerLine;
use crate::loan::{LoanAccount, LoanTransaction, MemberProfile};
use crate::repository::{LedgerStore, LedgerTx};
use crate::types::{
    AccountId, BranchId, ChargesRateSchemeId, ComputationSheetId, Currency, CurrencyId,
    LoanTransactionId, MemberProfileId, OrganizationId,
};

#[derive(Debug, Clone, Default)]
struct State {
    accounts: HashMap<AccountId, AccountSnapshot>,
    histories: HashMap<AccountId, Vec<AccountHistory>>,
    related: HashMap<AccountId, Vec<AccountId>>,
    currencies: HashMap<CurrencyId, Currency>,
    holidays: Vec<Holiday>,
    deductions: HashMap<ComputationSheetId, Vec<AutomaticDeduction>>,
    schemes: HashMap<ChargesRateSchemeId, ChargesRateScheme>,
    members: HashMap<MemberProfileId, MemberProfile>,
    loans: HashMap<LoanTransactionId, LoanTransaction>,
    entries: HashMap<LoanTransactionId, Vec<LoanTransactionEntry>>,
    loan_accounts: HashMap<LoanTransactionId, Vec<LoanAccount>>,
    general_ledger: Vec<GeneralLedgerLine>,
}

/// reference in-memory store; write transactions stage a copy of the full
/// state and swap it in on commit, so a rollback leaves nothing behind
#[derive(Debug, Default)]
pub struct MemoryLedger {
    inner: Mutex<State>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_account(&self, account: AccountSnapshot) {
        self.inner.lock().unwrap().accounts.insert(account.id, account);
    }

    pub fn put_account_history(&self, history: AccountHistory) {
        self.inner
            .lock()
            .unwrap()
            .histories
            .entry(history.account_id)
            .or_default()
            .push(history);
    }

    pub fn link_related_account(&self, loan_account: AccountId, related: AccountId) {
        self.inner
            .lock()
            .unwrap()
            .related
            .entry(loan_account)
            .or_default()
            .push(related);
    }

    pub fn put_currency(&self, currency: Currency) {
        self.inner.lock().unwrap().currencies.insert(currency.id, currency);
    }

    pub fn put_holiday(&self, holiday: Holiday) {
        self.inner.lock().unwrap().holidays.push(holiday);
    }

    pub fn put_automatic_deduction(&self, rule: AutomaticDeduction) {
        self.inner
            .lock()
            .unwrap()
            .deductions
            .entry(rule.computation_sheet_id)
            .or_default()
            .push(rule);
    }

    pub fn put_scheme(&self, scheme: ChargesRateScheme) {
        self.inner.lock().unwrap().schemes.insert(scheme.id, scheme);
    }

    pub fn put_member(&self, member: MemberProfile) {
        self.inner.lock().unwrap().members.insert(member.id, member);
    }

    pub fn put_loan(&self, loan: LoanTransaction) {
        self.inner.lock().unwrap().loans.insert(loan.id, loan);
    }

    /// posted member-ledger lines, in posting order
    pub fn general_ledger_lines(&self) -> Vec<GeneralLedgerLine> {
        self.inner.lock().unwrap().general_ledger.clone()
    }
}

impl LedgerStore for MemoryLedger {
    fn account(&self, id: AccountId) -> Result<AccountSnapshot> {
        self.inner
            .lock()
            .unwrap()
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("account", id))
    }

    fn account_history_as_of(&self, id: AccountId, at: DateTime<Utc>) -> Result<AccountSnapshot> {
        let state = self.inner.lock().unwrap();
        if let Some(histories) = state.histories.get(&id) {
            if let Some(history) = histories
                .iter()
                .filter(|h| h.effective_at <= at)
                .max_by_key(|h| h.effective_at)
            {
                return Ok(history.snapshot.clone());
            }
        }
        state
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("account history", id))
    }

    fn related_accounts(
        &self,
        loan_account: AccountId,
        currency: CurrencyId,
    ) -> Result<Vec<AccountSnapshot>> {
        let state = self.inner.lock().unwrap();
        let ids = state.related.get(&loan_account).cloned().unwrap_or_default();
        let mut accounts = Vec::with_capacity(ids.len());
        for id in ids {
            let account = state
                .accounts
                .get(&id)
                .cloned()
                .ok_or_else(|| LedgerError::not_found("account", id))?;
            if account.currency_id == Some(currency) {
                accounts.push(account);
            }
        }
        Ok(accounts)
    }

    fn currency(&self, id: CurrencyId) -> Result<Currency> {
        self.inner
            .lock()
            .unwrap()
            .currencies
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("currency", id))
    }

    fn holidays(
        &self,
        organization: OrganizationId,
        branch: BranchId,
        currency: Option<CurrencyId>,
    ) -> Result<Vec<Holiday>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .holidays
            .iter()
            .filter(|h| h.organization_id == organization && h.branch_id == branch)
            .filter(|h| currency.map_or(true, |c| h.currency_id == c))
            .cloned()
            .collect())
    }

    fn automatic_deductions(
        &self,
        computation_sheet: ComputationSheetId,
    ) -> Result<Vec<AutomaticDeduction>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .deductions
            .get(&computation_sheet)
            .cloned()
            .unwrap_or_default())
    }

    fn charges_rate_scheme(&self, id: ChargesRateSchemeId) -> Result<ChargesRateScheme> {
        self.inner
            .lock()
            .unwrap()
            .schemes
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("charges rate scheme", id))
    }

    fn member_profile(&self, id: MemberProfileId) -> Result<MemberProfile> {
        self.inner
            .lock()
            .unwrap()
            .members
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("member profile", id))
    }

    fn loan_transaction(&self, id: LoanTransactionId) -> Result<LoanTransaction> {
        self.inner
            .lock()
            .unwrap()
            .loans
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("loan transaction", id))
    }

    fn entries_for_loan(&self, id: LoanTransactionId) -> Result<Vec<LoanTransactionEntry>> {
        let mut entries = self
            .inner
            .lock()
            .unwrap()
            .entries
            .get(&id)
            .cloned()
            .unwrap_or_default();
        entries.sort_by_key(|e| e.index);
        Ok(entries)
    }

    fn loan_accounts(&self, loan: LoanTransactionId) -> Result<Vec<LoanAccount>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .loan_accounts
            .get(&loan)
            .cloned()
            .unwrap_or_default())
    }

    fn unprocessed_loans(
        &self,
        organization: OrganizationId,
        branch: BranchId,
    ) -> Result<Vec<LoanTransaction>> {
        let mut loans: Vec<LoanTransaction> = self
            .inner
            .lock()
            .unwrap()
            .loans
            .values()
            .filter(|l| {
                l.organization_id == organization && l.branch_id == branch && !l.processing
            })
            .cloned()
            .collect();
        loans.sort_by_key(|l| l.id);
        Ok(loans)
    }

    fn claim_for_processing(&self, id: LoanTransactionId) -> Result<bool> {
        let mut state = self.inner.lock().unwrap();
        let loan = state
            .loans
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("loan transaction", id))?;
        if loan.processing {
            return Ok(false);
        }
        loan.processing = true;
        Ok(true)
    }

    fn release_processing(&self, id: LoanTransactionId) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        let loan = state
            .loans
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("loan transaction", id))?;
        loan.processing = false;
        Ok(())
    }

    fn begin(&self) -> Result<Box<dyn LedgerTx + '_>> {
        let staged = self.inner.lock().unwrap().clone();
        Ok(Box::new(MemoryTx {
            owner: self,
            staged,
        }))
    }
}

/// staged copy of the store; dropping without commit discards every write
struct MemoryTx<'a> {
    owner: &'a MemoryLedger,
    staged: State,
}

impl LedgerTx for MemoryTx<'_> {
    fn lock_account(&mut self, id: AccountId) -> Result<AccountSnapshot> {
        self.staged
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("account", id))
    }

    fn delete_entries(&mut self, loan: LoanTransactionId) -> Result<()> {
        self.staged.entries.remove(&loan);
        Ok(())
    }

    fn insert_entry(&mut self, entry: &LoanTransactionEntry) -> Result<()> {
        self.staged
            .entries
            .entry(entry.loan_transaction_id)
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    fn update_loan(&mut self, loan: &LoanTransaction) -> Result<()> {
        self.staged.loans.insert(loan.id, loan.clone());
        Ok(())
    }

    fn post_general_ledger(&mut self, line: &GeneralLedgerLine) -> Result<()> {
        self.staged.general_ledger.push(line.clone());
        Ok(())
    }

    fn upsert_loan_account(&mut self, account: &LoanAccount) -> Result<()> {
        let accounts = self
            .staged
            .loan_accounts
            .entry(account.loan_transaction_id)
            .or_default();
        match accounts
            .iter_mut()
            .find(|a| a.account_id == account.account_id)
        {
            Some(existing) => *existing = account.clone(),
            None => accounts.push(account.clone()),
        }
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<()> {
        *self.owner.inner.lock().unwrap() = self.staged;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
