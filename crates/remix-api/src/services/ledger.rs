//! Credit ledger.
//!
//! Every balance change goes through `ProfileStore::adjust_credits`, a single
//! conditional update on the store side. Nothing here reads a balance and
//! writes it back, so concurrent requests for one user cannot lose updates
//! or push the balance below zero.

use std::sync::Arc;

use remix_models::{CreditAdjustment, CreditReason, UserProfile};
use remix_profiles::ProfileStore;
use tracing::{info, warn};

use super::error::{LedgerError, LedgerResult};
use crate::metrics::record_ledger_mutation;

#[derive(Clone)]
pub struct CreditLedger {
    store: Arc<dyn ProfileStore>,
}

impl CreditLedger {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    pub async fn profile(&self, user_id: &str) -> LedgerResult<UserProfile> {
        self.store
            .get_profile(user_id)
            .await?
            .ok_or_else(|| LedgerError::ProfileNotFound(user_id.to_string()))
    }

    /// Consume one credit. Fails with `InsufficientCredits` at zero.
    pub async fn decrement(&self, user_id: &str) -> LedgerResult<i64> {
        self.apply(CreditAdjustment::debit(user_id)).await
    }

    /// Grant `amount` credits (top-up or subscription).
    pub async fn increment(&self, user_id: &str, amount: i64, reason: CreditReason) -> LedgerResult<i64> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        self.apply(CreditAdjustment::grant(user_id, amount, reason)).await
    }

    async fn apply(&self, adjustment: CreditAdjustment) -> LedgerResult<i64> {
        let reason = adjustment.reason.as_str();
        match self
            .store
            .adjust_credits(&adjustment.user_id, adjustment.delta)
            .await
            .map_err(LedgerError::from)
        {
            Ok(balance) => {
                record_ledger_mutation(reason, "ok");
                info!(
                    user_id = %adjustment.user_id,
                    delta = adjustment.delta,
                    reason,
                    balance,
                    "Credit balance adjusted"
                );
                Ok(balance)
            }
            Err(e) => {
                let outcome = match e {
                    LedgerError::InsufficientCredits => "insufficient",
                    LedgerError::ProfileNotFound(_) => "not_found",
                    _ => "error",
                };
                record_ledger_mutation(reason, outcome);
                warn!(
                    user_id = %adjustment.user_id,
                    delta = adjustment.delta,
                    reason,
                    error = %e,
                    "Credit adjustment rejected"
                );
                Err(e)
            }
        }
    }
}
