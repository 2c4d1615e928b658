use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("validation failed: {message}")]
    Validation {
        message: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: Uuid,
    },

    #[error("unknown timezone: {name}")]
    Timezone {
        name: String,
    },

    #[error("ledger out of balance: debit {debit}, credit {credit}")]
    UnbalancedLedger {
        debit: Money,
        credit: Money,
    },

    #[error("loan transaction {loan} is already being processed")]
    AlreadyProcessing {
        loan: Uuid,
    },

    #[error("invalid schedule: {message}")]
    InvalidSchedule {
        message: String,
    },

    #[error("storage failure during {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },
}

impl LedgerError {
    /// not-found constructor, keeps call sites short
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        LedgerError::NotFound { entity, id }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation {
            message: message.into(),
        }
    }

    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        LedgerError::Storage {
            operation,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
