use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::loader::LoadError;

pub(crate) type Outcome = Result<(), LoadError>;

/// Handle returned by [`crate::ResourceLoader::ensure_ready`].
///
/// Either already settled (the capability was present, or the loader had
/// reached a terminal phase) or registered as a pending waiter on the
/// running poll loop. Dropping a pending handle only discards the result;
/// the poll loop keeps serving the other waiters.
#[derive(Debug)]
#[must_use = "a ReadyWait does nothing unless awaited"]
pub struct ReadyWait {
    state: WaitState,
}

#[derive(Debug)]
enum WaitState {
    Settled(Outcome),
    Pending(oneshot::Receiver<Outcome>),
}

impl ReadyWait {
    pub(crate) fn settled(outcome: Outcome) -> Self {
        Self {
            state: WaitState::Settled(outcome),
        }
    }

    pub(crate) fn pending(rx: oneshot::Receiver<Outcome>) -> Self {
        Self {
            state: WaitState::Pending(rx),
        }
    }

    /// True if the outcome was known when the handle was created.
    pub fn is_settled(&self) -> bool {
        matches!(self.state, WaitState::Settled(_))
    }
}

impl Future for ReadyWait {
    type Output = Outcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            WaitState::Settled(outcome) => Poll::Ready(outcome.clone()),
            WaitState::Pending(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(outcome)) => {
                    this.state = WaitState::Settled(outcome.clone());
                    Poll::Ready(outcome)
                }
                // The poll loop went away without settling (runtime shutdown).
                Poll::Ready(Err(_)) => {
                    this.state = WaitState::Settled(Err(LoadError::Abandoned));
                    Poll::Ready(Err(LoadError::Abandoned))
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}
