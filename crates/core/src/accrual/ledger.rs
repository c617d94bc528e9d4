//! Applies accrual quotes to stored orders and balances.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::metrics;
use crate::order::{OrderStore, StoreError, Transition};

use super::AccrualQuote;

/// Writes accrual results through the order store.
///
/// Status change and balance credit happen in one store transaction, and the
/// credit is only granted on the transition into PROCESSED. Replaying the
/// same quote is therefore harmless.
#[derive(Clone)]
pub struct LedgerUpdater {
    store: Arc<dyn OrderStore>,
}

impl LedgerUpdater {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Apply `quote` to the order it names, owned by `owner_id`.
    ///
    /// Returns `Ok(None)` for quotes that carry no local status (REGISTERED).
    /// Store failures are logged and returned; the order keeps its previous
    /// state so recovery picks it up again.
    pub fn apply(
        &self,
        quote: &AccrualQuote,
        owner_id: &str,
    ) -> Result<Option<Transition>, StoreError> {
        let Some(status) = quote.status.to_order_status() else {
            debug!(order = %quote.order, "Order registered but not processed yet");
            return Ok(None);
        };

        let transition = self
            .store
            .apply_accrual(&quote.order, owner_id, status, quote.accrual)
            .map_err(|e| {
                metrics::LEDGER_FAILURES.inc();
                error!(order = %quote.order, owner = %owner_id, "Failed to apply accrual: {}", e);
                e
            })?;

        match transition {
            Transition::Applied { from, to, credited } => {
                metrics::ORDER_TRANSITIONS
                    .with_label_values(&[to.as_str()])
                    .inc();
                if credited > 0.0 {
                    metrics::POINTS_CREDITED.inc_by(credited);
                }
                if to.is_terminal() {
                    info!(
                        order = %quote.order,
                        owner = %owner_id,
                        "Order {} -> {}, credited {}",
                        from,
                        to,
                        credited
                    );
                } else {
                    debug!(order = %quote.order, "Order {} -> {}", from, to);
                }
            }
            Transition::Unchanged(status) => {
                debug!(order = %quote.order, "Order still {}", status);
            }
            Transition::AlreadyTerminal(status) => {
                debug!(order = %quote.order, "Order already {}, ignoring quote", status);
            }
        }

        Ok(Some(transition))
    }
}
