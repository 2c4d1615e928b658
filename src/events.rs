use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::types::{BranchId, LoanTransactionId, OrganizationId};

/// events emitted while a batch run progresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProcessEvent {
    LoanProcessed {
        loan_transaction_id: LoanTransactionId,
        total: usize,
        processed: usize,
        start_time: DateTime<Utc>,
        current_time: DateTime<Utc>,
        account_name: String,
        member_name: String,
    },
    BatchCompleted {
        organization_id: OrganizationId,
        branch_id: BranchId,
        total_processed: usize,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    },
}

/// topic strings a progress event is dispatched to
pub fn progress_topics(organization: OrganizationId, branch: BranchId) -> Vec<String> {
    vec![
        format!("loan.process.branch.{branch}"),
        format!("loan.process.organization.{organization}"),
    ]
}

/// topic strings the batch completion event is dispatched to
pub fn completion_topics(organization: OrganizationId, branch: BranchId) -> Vec<String> {
    vec![
        format!("loan.process.completed.branch.{branch}"),
        format!("loan.process.completed.organization.{organization}"),
    ]
}

/// outbound channel for progress reporting; publishing is best-effort and
/// must never fail the operation that emits
pub trait ProgressPublisher: Send + Sync {
    fn publish(&self, topics: &[String], event: &ProcessEvent);
}

/// publisher that drops every event
#[derive(Debug, Default)]
pub struct NullPublisher;

impl ProgressPublisher for NullPublisher {
    fn publish(&self, _topics: &[String], _event: &ProcessEvent) {}
}

/// publisher that collects events for later inspection
#[derive(Debug, Default)]
pub struct EventStore {
    events: Mutex<Vec<(Vec<String>, ProcessEvent)>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_events(&self) -> Vec<(Vec<String>, ProcessEvent)> {
        std::mem::take(&mut self.events.lock().unwrap())
    }

    pub fn events(&self) -> Vec<ProcessEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }
}

impl ProgressPublisher for EventStore {
    fn publish(&self, topics: &[String], event: &ProcessEvent) {
        self.events
            .lock()
            .unwrap()
            .push((topics.to_vec(), event.clone()));
    }
}
