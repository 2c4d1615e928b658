use std::sync::Arc;
use std::time::Duration;

use hourglass_rs::SafeTimeProvider;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::errors::{LedgerError, Result};
use crate::events::{completion_topics, progress_topics, ProcessEvent, ProgressPublisher};
use crate::interest::InterestPolicy;
use crate::processing::process_claimed_loan;
use crate::repository::LedgerStore;
use crate::types::{BranchId, OrganizationId};

/// what a finished batch run reports back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    /// the run stopped early on timeout or an explicit cancel
    pub cancelled: bool,
}

/// handle on a detached batch run
#[derive(Debug)]
pub struct BatchHandle {
    cancel: watch::Sender<bool>,
    join: JoinHandle<BatchOutcome>,
}

impl BatchHandle {
    /// ask the run to stop; honored between loans, never mid-transaction
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// wait for the run to finish
    pub async fn wait(self) -> BatchOutcome {
        self.join.await.unwrap_or(BatchOutcome {
            total: 0,
            processed: 0,
            failed: 0,
            cancelled: true,
        })
    }
}

/// claims loans synchronously, then catches their schedules up on a
/// detached task bounded by a wall-clock timeout
pub struct BatchProcessor {
    store: Arc<dyn LedgerStore>,
    policy: Arc<dyn InterestPolicy>,
    publisher: Arc<dyn ProgressPublisher>,
    time: Arc<SafeTimeProvider>,
    timeout: Duration,
    pacing: Duration,
}

impl BatchProcessor {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        policy: Arc<dyn InterestPolicy>,
        publisher: Arc<dyn ProgressPublisher>,
        time: Arc<SafeTimeProvider>,
    ) -> Self {
        Self {
            store,
            policy,
            publisher,
            time,
            timeout: Duration::from_secs(2 * 60 * 60),
            pacing: Duration::from_millis(500),
        }
    }

    /// wall-clock bound on the whole run
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// delay between loans, easing the load on the backing store
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// claim every unclaimed loan in scope and return immediately; the
    /// processing itself continues on a detached task
    pub fn trigger(&self, organization: OrganizationId, branch: BranchId) -> Result<BatchHandle> {
        let candidates = self.store.unprocessed_loans(organization, branch)?;
        if candidates.is_empty() {
            return Err(LedgerError::validation(
                "no loan transactions found to process",
            ));
        }

        // claiming happens synchronously so a second trigger skips these
        let mut claimed = Vec::with_capacity(candidates.len());
        for loan in candidates {
            if self.store.claim_for_processing(loan.id)? {
                claimed.push(loan);
            }
        }
        info!(total = claimed.len(), %organization, %branch, "batch claimed loans");

        let store = Arc::clone(&self.store);
        let policy = Arc::clone(&self.policy);
        let publisher = Arc::clone(&self.publisher);
        let time = Arc::clone(&self.time);
        let timeout = self.timeout;
        let pacing = self.pacing;
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            let start_time = time.now();
            let deadline = Instant::now() + timeout;
            let total = claimed.len();
            let mut processed = 0;
            let mut failed = 0;
            let mut cancelled = false;

            for (index, loan) in claimed.iter().enumerate() {
                // cancellation is cooperative and only observed between
                // transactions
                if *cancel_rx.borrow() || Instant::now() >= deadline {
                    cancelled = true;
                    warn!(processed, total, "batch run stopped early");
                    break;
                }
                if !pacing.is_zero() {
                    tokio::time::sleep(pacing).await;
                }

                match process_claimed_loan(store.as_ref(), policy.as_ref(), loan.id, time.now()) {
                    Ok(updated) => {
                        processed += 1;

                        let account_name = store
                            .account(updated.account_id)
                            .map(|a| a.name)
                            .unwrap_or_default();
                        let member_name = updated
                            .member_profile_id
                            .and_then(|id| store.member_profile(id).ok())
                            .map(|m| m.full_name)
                            .unwrap_or_default();
                        publisher.publish(
                            &progress_topics(organization, branch),
                            &ProcessEvent::LoanProcessed {
                                loan_transaction_id: updated.id,
                                total,
                                processed: index + 1,
                                start_time,
                                current_time: time.now(),
                                account_name,
                                member_name,
                            },
                        );
                    }
                    Err(err) => {
                        // one bad loan never aborts the batch
                        failed += 1;
                        error!(loan = %loan.id, %err, "failed to process loan transaction");
                    }
                }

                if let Err(err) = store.release_processing(loan.id) {
                    error!(loan = %loan.id, %err, "failed to release processing claim");
                }
            }

            // loans never reached keep no stale claim behind
            for loan in claimed.iter().skip(processed + failed) {
                if let Err(err) = store.release_processing(loan.id) {
                    error!(loan = %loan.id, %err, "failed to release unprocessed claim");
                }
            }

            publisher.publish(
                &completion_topics(organization, branch),
                &ProcessEvent::BatchCompleted {
                    organization_id: organization,
                    branch_id: branch,
                    total_processed: processed,
                    start_time,
                    end_time: time.now(),
                },
            );
            info!(processed, failed, total, cancelled, "batch run completed");

            BatchOutcome {
                total,
                processed,
                failed,
                cancelled,
            }
        });

        Ok(BatchHandle {
            cancel: cancel_tx,
            join,
        })
    }
}
