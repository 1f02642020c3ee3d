//! # Units of Work
//!
//! Every operation that changes more than one row runs here, inside one
//! SQLite transaction, and either fully lands or leaves nothing behind.
//!
//! ## Transaction Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  retry(max_retries, op, || op_once(..))                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                  │
//! │    first statement is a WRITE ──► holds SQLite's single write lock     │
//! │    reads see current rows, no other writer can interleave              │
//! │    pure decisions from tienda-core                                     │
//! │    guarded writes (stock >= qty, status <> 'cancelled')                │
//! │  COMMIT                                                                 │
//! │       │                                                                 │
//! │       ├── business error ─► dropped transaction rolls back, returned   │
//! │       └── BUSY / pool timeout ─► rolled back, whole op replayed        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`sale::SaleService`] - CreateSale, CancelSale, UpdateSale, lookups
//! - [`pricing::PricingService`] - price recalculation, overrides, analysis
//! - [`inventory::InventoryService`] - receiving, counts, ledger queries
//! - [`loyalty::LoyaltyService`] - point redemption

use std::future::Future;
use thiserror::Error;
use tracing::{error, warn};

use crate::error::DbError;
use tienda_core::{CoreError, ErrorKind, LoyaltyRate};

pub mod inventory;
pub mod loyalty;
pub mod pricing;
pub mod sale;

/// Default number of replays after a transient failure.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

// =============================================================================
// Errors
// =============================================================================

/// Failure of a unit of work.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A business rule rejected the request. Nothing was written.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage failure. Nothing was written.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Still busy after every replay.
    #[error("Database busy after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: DbError },
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Core(err) => err.kind(),
            ServiceError::Db(_) | ServiceError::RetriesExhausted { .. } => ErrorKind::Internal,
        }
    }

    /// The business error, if this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            ServiceError::Core(err) => Some(err),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Db(DbError::from(err))
    }
}

impl From<tienda_core::ValidationError> for ServiceError {
    fn from(err: tienda_core::ValidationError) -> Self {
        ServiceError::Core(CoreError::Validation(err))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// Settings
// =============================================================================

/// Knobs for the sale unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleSettings {
    /// Share of the sale total credited as loyalty points.
    pub loyalty_rate: LoyaltyRate,
    /// Replays after a transient storage failure.
    pub max_retries: u32,
}

impl Default for SaleSettings {
    fn default() -> Self {
        SaleSettings {
            loyalty_rate: LoyaltyRate::default(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

// =============================================================================
// Retry
// =============================================================================

/// Runs `attempt` until it succeeds, fails for a non-transient reason, or
/// has been replayed `max_retries` times.
///
/// Each attempt must be a complete unit of work: it re-reads current state
/// and either commits or rolls back on its own.
pub(crate) async fn retry<T, F, Fut>(
    max_retries: u32,
    operation: &'static str,
    mut attempt: F,
) -> ServiceResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ServiceResult<T>>,
{
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        match attempt().await {
            Err(ServiceError::Db(err)) if err.is_transient() => {
                if attempts > max_retries {
                    error!(operation, attempts, error = %err, "Giving up after transient failures");
                    return Err(ServiceError::RetriesExhausted {
                        attempts,
                        last: err,
                    });
                }
                warn!(operation, attempt = attempts, error = %err, "Transient database failure, replaying");
                tokio::task::yield_now().await;
            }
            outcome => return outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_replays_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = retry(3, "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ServiceError::Db(DbError::Busy("database is locked".into())))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let calls = AtomicU32::new(0);
        let result: ServiceResult<()> = retry(2, "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ServiceError::Db(DbError::PoolExhausted))
        })
        .await;

        assert!(matches!(
            result,
            Err(ServiceError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_business_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: ServiceResult<()> = retry(3, "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ServiceError::Core(CoreError::EmptyOrder))
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
