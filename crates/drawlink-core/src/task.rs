//! Observable background operations.
//!
//! An [`Operation`] runs a service call on the tokio runtime and exposes its
//! progress as an [`OperationState`] that can be polled or awaited. Dropping
//! or abandoning the handle only stops observing: work already sent to the
//! stores still completes.

use std::fmt::Display;
use std::future::Future;

use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState<T> {
    Pending,
    Succeeded(T),
    Failed(String),
}

impl<T> OperationState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, OperationState::Pending)
    }
}

/// Handle to a spawned operation
#[derive(Debug)]
pub struct Operation<T> {
    state: watch::Receiver<OperationState<T>>,
}

impl<T> Operation<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Spawn `future` on the current runtime
    pub fn spawn<F, E>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let (tx, rx) = watch::channel(OperationState::Pending);
        tokio::spawn(async move {
            let state = match future.await {
                Ok(value) => OperationState::Succeeded(value),
                Err(e) => OperationState::Failed(e.to_string()),
            };
            // Nobody listening is fine
            let _ = tx.send(state);
        });
        Self { state: rx }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> OperationState<T> {
        self.state.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        !self.state.borrow().is_pending()
    }

    /// Wait until the operation settles
    pub async fn wait(mut self) -> OperationState<T> {
        let settled = match self.state.wait_for(|state| !state.is_pending()).await {
            Ok(state) => (*state).clone(),
            Err(_) => OperationState::Failed("operation ended without a result".to_string()),
        };
        settled
    }

    /// Stop observing; the result, when it arrives, is ignored
    pub fn abandon(self) {}
}
