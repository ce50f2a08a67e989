//! Agent Dispatch & Scheduling (§4.2): cooperative cancellation, plus
//! the fan-out helper the Mission Controller uses to run many per-section
//! agent calls concurrently.
//!
//! Grounded in `agent::orchestrator::Orchestrator::fan_out`'s
//! `Semaphore`-bounded `tokio::spawn` pattern. Here the concurrency bound
//! is already enforced inside every dispatched call by
//! [`crate::agent::ModelDispatcher`]'s own per-mission semaphore, so the
//! fan-out itself only needs to poll every task together —
//! `futures_util::future::join_all` rather than a second, redundant
//! semaphore plus `tokio::spawn`/`JoinHandle` bookkeeping.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::join_all;

use crate::core::MissionId;
use crate::error::{MissionError, Result};

/// A cooperative cancellation flag for one mission, checked at await
/// boundaries throughout the phase loop (§5).
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns [`MissionError::Cancelled`] if cancellation has been
    /// requested, for use at await boundaries in the phase loop.
    ///
    /// # Errors
    ///
    /// Returns [`MissionError::Cancelled`] when cancelled.
    pub fn check(&self, mission_id: &MissionId) -> Result<()> {
        if self.is_cancelled() {
            return Err(MissionError::Cancelled {
                mission_id: mission_id.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Runs every future in `tasks` concurrently, returning their outputs in
/// input order once all have completed. The per-mission semaphore inside
/// [`crate::agent::ModelDispatcher`] is what actually bounds concurrency
/// (§4.2); this helper only needs to drive every task to completion
/// together rather than sequentially.
pub async fn fan_out<T, F>(tasks: Vec<F>) -> Vec<T>
where
    F: std::future::Future<Output = T>,
{
    join_all(tasks).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_token_starts_uncancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check(&MissionId::from("m1")).is_ok());
    }

    #[test]
    fn test_cancellation_token_cancel_is_observed() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(token.is_cancelled());
        assert!(token.check(&MissionId::from("m1")).is_err());
    }

    #[test]
    fn test_cancellation_token_clone_shares_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_fan_out_preserves_order() {
        let tasks: Vec<_> = (0..5).map(|i| async move { i * 2 }).collect();
        let results = fan_out(tasks).await;
        assert_eq!(results, vec![0, 2, 4, 6, 8]);
    }
}
