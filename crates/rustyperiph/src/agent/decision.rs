//! Deferred user decisions
//!
//! Agent callbacks that need a human answer return a [`PendingDecision`]
//! straight away and resolve it later through the paired
//! [`DecisionResolver`]. The executor never blocks on the user: whoever
//! needs the answer either waits on the decision from its own thread or
//! chains a continuation with [`PendingDecision::then`].
//!
//! A decision settles exactly once. Dropping the resolver unsettled, or
//! cancelling through a [`DecisionCanceller`], settles it as Cancelled and
//! wakes any waiter.

use super::types::{PairingError, PairingResult};
use crate::sync::lock;
use std::mem;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

type Continuation<T> = Box<dyn FnOnce(PairingResult<T>) + Send>;

enum SlotState<T> {
    Pending,
    Settled(PairingResult<T>),
    Forwarded(Continuation<T>),
    Taken,
}

struct Slot<T> {
    state: Mutex<SlotState<T>>,
    settled: Condvar,
}

impl<T> Slot<T> {
    fn new(state: SlotState<T>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            settled: Condvar::new(),
        })
    }

    /// Settles the slot unless it already was. Returns true when this call
    /// settled it.
    fn settle(&self, outcome: PairingResult<T>) -> bool {
        let mut state = lock(&self.state);
        match mem::replace(&mut *state, SlotState::Taken) {
            SlotState::Pending => {
                *state = SlotState::Settled(outcome);
                drop(state);
                self.settled.notify_all();
                true
            }
            SlotState::Forwarded(continuation) => {
                drop(state);
                continuation(outcome);
                true
            }
            previous => {
                *state = previous;
                false
            }
        }
    }
}

/// Creates an unsettled decision and the resolver that settles it.
pub fn pending<T>() -> (PendingDecision<T>, DecisionResolver<T>) {
    let slot = Slot::new(SlotState::Pending);
    (
        PendingDecision { slot: slot.clone() },
        DecisionResolver { slot: Some(slot) },
    )
}

/// The receiving half of a deferred decision
pub struct PendingDecision<T> {
    slot: Arc<Slot<T>>,
}

impl<T> PendingDecision<T> {
    /// A decision that is already made.
    pub fn ready(value: T) -> Self {
        Self {
            slot: Slot::new(SlotState::Settled(Ok(value))),
        }
    }

    /// A decision that already failed.
    pub fn failed(err: PairingError) -> Self {
        Self {
            slot: Slot::new(SlotState::Settled(Err(err))),
        }
    }

    pub fn rejected() -> Self {
        Self::failed(PairingError::Rejected)
    }

    pub fn is_settled(&self) -> bool {
        matches!(*lock(&self.slot.state), SlotState::Settled(_))
    }

    /// Takes the outcome if the decision has settled.
    pub fn try_take(&mut self) -> Option<PairingResult<T>> {
        let mut state = lock(&self.slot.state);
        match mem::replace(&mut *state, SlotState::Taken) {
            SlotState::Settled(outcome) => Some(outcome),
            previous => {
                *state = previous;
                None
            }
        }
    }

    /// Blocks the calling thread until the decision settles.
    pub fn wait(self) -> PairingResult<T> {
        let state = lock(&self.slot.state);
        let mut state = self
            .slot
            .settled
            .wait_while(state, |s| matches!(s, SlotState::Pending))
            .unwrap_or_else(PoisonError::into_inner);
        take_settled(&mut state)
    }

    /// Like [`wait`](Self::wait), but gives up after `timeout` and reports
    /// the decision as Cancelled.
    pub fn wait_timeout(self, timeout: Duration) -> PairingResult<T> {
        let state = lock(&self.slot.state);
        let (mut state, _) = self
            .slot
            .settled
            .wait_timeout_while(state, timeout, |s| matches!(s, SlotState::Pending))
            .unwrap_or_else(PoisonError::into_inner);
        take_settled(&mut state)
    }
}

impl<T: Send + 'static> PendingDecision<T> {
    /// Runs `continuation` with the outcome once settled; immediately if it
    /// already is.
    pub fn then<F>(self, continuation: F)
    where
        F: FnOnce(PairingResult<T>) + Send + 'static,
    {
        let mut state = lock(&self.slot.state);
        match mem::replace(&mut *state, SlotState::Taken) {
            SlotState::Settled(outcome) => {
                drop(state);
                continuation(outcome);
            }
            SlotState::Pending => *state = SlotState::Forwarded(Box::new(continuation)),
            previous => *state = previous,
        }
    }

    /// A decision settled with `f` applied to this one's value.
    pub fn map<U, F>(self, f: F) -> PendingDecision<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> PairingResult<U> + Send + 'static,
    {
        let (decision, resolver) = pending();
        self.then(move |outcome| resolver.settle(outcome.and_then(f)));
        decision
    }

    /// Handle that settles this decision as Cancelled from elsewhere.
    pub fn canceller(&self) -> DecisionCanceller {
        let slot = self.slot.clone();
        DecisionCanceller {
            cancel: Box::new(move || slot.settle(Err(PairingError::Cancelled))),
        }
    }
}

fn take_settled<T>(state: &mut SlotState<T>) -> PairingResult<T> {
    match mem::replace(state, SlotState::Taken) {
        SlotState::Settled(outcome) => outcome,
        // Timed out or already consumed.
        _ => Err(PairingError::Cancelled),
    }
}

/// The settling half of a deferred decision
pub struct DecisionResolver<T> {
    slot: Option<Arc<Slot<T>>>,
}

impl<T> DecisionResolver<T> {
    pub fn resolve(self, value: T) {
        self.settle(Ok(value));
    }

    pub fn reject(self) {
        self.settle(Err(PairingError::Rejected));
    }

    pub fn settle(mut self, outcome: PairingResult<T>) {
        if let Some(slot) = self.slot.take() {
            slot.settle(outcome);
        }
    }
}

impl<T> Drop for DecisionResolver<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.settle(Err(PairingError::Cancelled));
        }
    }
}

/// Settles a decision as Cancelled, releasing whoever waits on it
pub struct DecisionCanceller {
    cancel: Box<dyn Fn() -> bool + Send + Sync>,
}

impl DecisionCanceller {
    /// Returns false when the decision had already settled.
    pub fn cancel(&self) -> bool {
        (self.cancel)()
    }
}

impl std::fmt::Debug for DecisionCanceller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionCanceller").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_resolve_wakes_waiter() {
        let (decision, resolver) = pending::<u32>();
        let waiter = thread::spawn(move || decision.wait());
        resolver.resolve(123456);
        assert_eq!(waiter.join().unwrap(), Ok(123456));
    }

    #[test]
    fn test_dropped_resolver_cancels() {
        let (decision, resolver) = pending::<bool>();
        drop(resolver);
        assert_eq!(decision.wait(), Err(PairingError::Cancelled));
    }

    #[test]
    fn test_canceller_releases_waiter() {
        let (decision, resolver) = pending::<bool>();
        let canceller = decision.canceller();
        let waiter = thread::spawn(move || decision.wait());

        assert!(canceller.cancel());
        assert_eq!(waiter.join().unwrap(), Err(PairingError::Cancelled));

        // The late answer is ignored.
        resolver.resolve(true);
        assert!(!canceller.cancel());
    }

    #[test]
    fn test_wait_timeout_reports_cancelled() {
        let (decision, _resolver) = pending::<bool>();
        assert_eq!(
            decision.wait_timeout(Duration::from_millis(10)),
            Err(PairingError::Cancelled)
        );
    }

    #[test]
    fn test_map_and_then() {
        let (decision, resolver) = pending::<bool>();
        let mapped = decision.map(|ok| if ok { Ok(()) } else { Err(PairingError::Rejected) });
        resolver.resolve(false);
        assert_eq!(mapped.wait(), Err(PairingError::Rejected));

        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        PendingDecision::ready(7u8).then(move |outcome| *sink.lock().unwrap() = Some(outcome));
        assert_eq!(*seen.lock().unwrap(), Some(Ok(7)));
    }

    #[test]
    fn test_try_take() {
        let (mut decision, resolver) = pending::<&'static str>();
        assert_eq!(decision.try_take(), None);
        resolver.resolve("1234");
        assert!(decision.is_settled());
        assert_eq!(decision.try_take(), Some(Ok("1234")));
        assert_eq!(decision.try_take(), None);
    }
}
