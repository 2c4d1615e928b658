pub mod account;
pub mod batch;
pub mod calendar;
pub mod decimal;
pub mod deductions;
pub mod engine;
pub mod errors;
pub mod events;
pub mod interest;
pub mod ledger;
pub mod loan;
pub mod processing;
pub mod repository;
pub mod schedule;
pub mod types;

// re-export key types
pub use account::{
    account_type_priority, period_charge, AccountHistory, AccountSnapshot, AccountType,
    ComputationType, GracePeriods, PeriodCharge, RateBasis,
};
pub use batch::{BatchHandle, BatchOutcome, BatchProcessor};
pub use calendar::{BusinessCalendar, Holiday, SkipRules};
pub use decimal::{Money, Rate};
pub use deductions::{
    rule_credit, AutomaticDeduction, ChargeContext, ChargesRateScheme, SchemeKind,
};
pub use engine::{AmortizationView, ComputationSheetRequest, LedgerEngine};
pub use errors::{LedgerError, Result};
pub use events::{
    completion_topics, progress_topics, EventStore, NullPublisher, ProcessEvent, ProgressPublisher,
};
pub use interest::{InterestPolicy, StandardPolicy};
pub use ledger::{
    balance_loan, entry_totals, release_loan, BalanceRequest, BalancingPhase, GeneralLedgerLine,
    LoanTransactionEntry,
};
pub use loan::{LoanAccount, LoanTransaction, MemberProfile};
pub use processing::process_loan;
pub use repository::{memory::MemoryLedger, LedgerStore, LedgerTx};
pub use schedule::{
    amortization_per_period, build_schedule, next_payment_date, number_of_payments, AccountValue,
    AssembledSchedule, OpeningPeriod, ScheduleInputs, ScheduleRow,
};
pub use types::{
    Currency, EntryType, LoanType, PaymentMode, PaymentPlan,
};

// re-export external dependencies that users will need
pub use chrono;
pub use chrono_tz;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
