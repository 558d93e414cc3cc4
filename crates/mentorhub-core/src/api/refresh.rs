//! Single-flight coordination for access-token refresh.
//!
//! The coordinator only tracks who is waiting; the client performs the
//! actual `/token/refresh` call. The first caller to [`RefreshCoordinator::join`]
//! while idle becomes responsible for starting the refresh; everyone, that
//! caller included, waits on a receiver that [`RefreshCoordinator::settle`]
//! resolves exactly once.

use tokio::sync::{oneshot, Mutex};
use tracing::debug;

/// New access token, or the reason the refresh failed.
pub type RefreshOutcome = Result<String, String>;

enum RefreshState {
    Idle,
    Refreshing {
        waiters: Vec<oneshot::Sender<RefreshOutcome>>,
    },
}

/// Handed back by [`RefreshCoordinator::join`].
pub struct RefreshTicket {
    /// True for the caller that moved the state from idle to refreshing.
    pub must_start: bool,
    pub outcome: oneshot::Receiver<RefreshOutcome>,
}

pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RefreshState::Idle),
        }
    }

    /// Queue behind the in-flight refresh, starting one if none is running.
    pub async fn join(&self) -> RefreshTicket {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock().await;
        let must_start = match &mut *state {
            RefreshState::Idle => {
                *state = RefreshState::Refreshing { waiters: vec![tx] };
                true
            }
            RefreshState::Refreshing { waiters } => {
                waiters.push(tx);
                false
            }
        };
        debug!(must_start, "Joined token refresh");
        RefreshTicket {
            must_start,
            outcome: rx,
        }
    }

    /// Return to idle and resolve every queued waiter with `outcome`.
    /// Returns how many waiters were drained.
    pub async fn settle(&self, outcome: RefreshOutcome) -> usize {
        let waiters = {
            let mut state = self.state.lock().await;
            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Idle => Vec::new(),
                RefreshState::Refreshing { waiters } => waiters,
            }
        };

        let drained = waiters.len();
        for waiter in waiters {
            // A waiter whose caller went away is simply skipped
            let _ = waiter.send(outcome.clone());
        }
        debug!(drained, success = outcome.is_ok(), "Token refresh settled");
        drained
    }

    pub async fn is_refreshing(&self) -> bool {
        matches!(*self.state.lock().await, RefreshState::Refreshing { .. })
    }

    /// Number of requests waiting on the in-flight refresh.
    pub async fn queued(&self) -> usize {
        match &*self.state.lock().await {
            RefreshState::Idle => 0,
            RefreshState::Refreshing { waiters } => waiters.len(),
        }
    }
}
