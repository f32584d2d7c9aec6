//! Pairing agent host
//!
//! Registers an [`Agent`] with the daemon's agent manager and forwards the
//! daemon's callbacks to it, tracking one [`PairingSession`] per remote
//! device. Callbacks return immediately with a [`PendingDecision`]; the
//! session completes or is cancelled when that decision settles.

use super::decision::{self, DecisionCanceller, PendingDecision};
use super::handler::Agent;
use super::pairing::PairingSession;
use super::types::*;
use crate::bus::{BusContext, DeviceId, ObjectPath};
use crate::error::{ConfigurationError, Result};
use crate::executor::panic_message;
use crate::sync::lock;
use crate::uuid::Uuid;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

/// Largest passkey the daemon accepts.
const MAX_PASSKEY: u32 = 999_999;

struct SessionEntry {
    session: PairingSession,
    /// Distinguishes this attempt from later ones with the same device.
    generation: u64,
    canceller: Option<DecisionCanceller>,
}

#[derive(Default)]
struct Sessions {
    entries: HashMap<DeviceId, SessionEntry>,
    next_generation: u64,
}

impl SessionEntry {
    fn new(device: &DeviceId, local: IoCapability, generation: u64) -> Self {
        Self {
            session: PairingSession::new(device.clone(), local),
            generation,
            canceller: None,
        }
    }
}

impl Sessions {
    /// The unfinished session for `device`, or a fresh one.
    ///
    /// A displayed passkey expects no answer, so a session left showing one
    /// ends Complete as soon as anything but another display update arrives.
    fn current(
        &mut self,
        device: &DeviceId,
        local: IoCapability,
        incoming: Option<CallbackKind>,
    ) -> &mut SessionEntry {
        let next = &mut self.next_generation;
        let entry = self.entries.entry(device.clone()).or_insert_with(|| {
            *next += 1;
            SessionEntry::new(device, local, *next)
        });

        let display_done = entry.session.state()
            == SessionState::Awaiting(CallbackKind::DisplayPasskey)
            && incoming != Some(CallbackKind::DisplayPasskey)
            && entry.session.complete().is_ok();
        if display_done {
            debug!("Passkey display for {} complete", device);
        }

        if entry.session.state().is_terminal() {
            *next += 1;
            *entry = SessionEntry::new(device, local, *next);
        }
        entry
    }

    /// Cancels unfinished sessions matching `filter`. Returns how many were
    /// cancelled and the cancellers of their outstanding decisions.
    fn cancel_where<F>(&mut self, filter: F) -> (usize, Vec<DecisionCanceller>)
    where
        F: Fn(&DeviceId) -> bool,
    {
        let mut cancelled = 0;
        let mut cancellers = Vec::new();
        for (device, entry) in self.entries.iter_mut() {
            if !filter(device) {
                continue;
            }
            if entry.session.cancel() {
                info!("Pairing with {} cancelled", device);
                cancelled += 1;
            }
            cancellers.extend(entry.canceller.take());
        }
        (cancelled, cancellers)
    }
}

/// Ends the step the decision answered. Returns false when its session had
/// already ended some other way, e.g. cancelled before the answer arrived.
fn settle_session(
    sessions: &Mutex<Sessions>,
    device: &DeviceId,
    generation: u64,
    success: bool,
) -> bool {
    let mut sessions = lock(sessions);
    let Some(entry) = sessions.entries.get_mut(device) else {
        return false;
    };
    if entry.generation != generation {
        return false;
    }

    entry.canceller = None;
    if success {
        if entry.session.complete().is_err() {
            return false;
        }
        debug!("Pairing step with {} complete", device);
    } else if entry.session.cancel() {
        info!("Pairing with {} was not accepted", device);
    }
    true
}

/// Hosts an [`Agent`] on the daemon's agent manager
pub struct PairingAgent {
    agent: Arc<dyn Agent>,
    path: ObjectPath,
    registered: Mutex<bool>,
    sessions: Arc<Mutex<Sessions>>,
}

impl PairingAgent {
    pub fn new(agent: Arc<dyn Agent>, path: ObjectPath) -> Self {
        Self {
            agent,
            path,
            registered: Mutex::new(false),
            sessions: Arc::new(Mutex::new(Sessions::default())),
        }
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    pub fn capability(&self) -> IoCapability {
        self.agent.capability()
    }

    pub fn is_registered(&self) -> bool {
        *lock(&self.registered)
    }

    /// Registers the agent. As the default agent it also answers pairing
    /// initiated by remote devices; that request needs elevated privilege
    /// on a real daemon. If it is refused the agent is unregistered again.
    pub fn register(&self, ctx: &BusContext, default: bool) -> Result<()> {
        let mut registered = lock(&self.registered);
        if *registered {
            return Err(ConfigurationError::AlreadyRegistered.into());
        }

        let capability = self.capability();
        ctx.agents
            .register_agent(&self.path, capability.as_daemon_str())?;

        if default {
            if let Err(err) = ctx.agents.request_default_agent(&self.path) {
                warn!("Agent {} could not become the default: {}", self.path, err);
                if let Err(rollback) = ctx.agents.unregister_agent(&self.path) {
                    warn!("Unregistering agent {} failed: {}", self.path, rollback);
                }
                return Err(err.into());
            }
        }

        *registered = true;
        info!(
            "Registered {} agent {}{}",
            capability,
            self.path,
            if default { " as default" } else { "" }
        );
        Ok(())
    }

    /// Unregisters the agent, cancelling every unfinished session.
    pub fn unregister(&self, ctx: &BusContext) -> Result<()> {
        {
            let mut registered = lock(&self.registered);
            if !*registered {
                return Err(ConfigurationError::NotRegistered.into());
            }
            *registered = false;
        }
        self.cancel_sessions(|_| true);

        ctx.agents.unregister_agent(&self.path)?;
        info!("Unregistered agent {}", self.path);
        Ok(())
    }

    /// Snapshot of the latest session with `device`.
    pub fn session(&self, device: &DeviceId) -> Option<PairingSession> {
        lock(&self.sessions)
            .entries
            .get(device)
            .map(|entry| entry.session.clone())
    }

    pub fn session_state(&self, device: &DeviceId) -> Option<SessionState> {
        self.session(device).map(|session| session.state())
    }

    /// Starts a session with `device` from its announced capability.
    pub fn exchange_capabilities(
        &self,
        device: &DeviceId,
        remote: IoCapability,
        mitm_requested: bool,
        out_of_band: bool,
    ) -> PairingResult<PairingModel> {
        let local = self.capability();
        let mut sessions = lock(&self.sessions);
        sessions
            .current(device, local, None)
            .session
            .exchange_capabilities(remote, mitm_requested, out_of_band)
    }

    /// Marks the outstanding step with `device` as done, for callbacks that
    /// carry no answer such as a displayed passkey.
    pub fn complete(&self, device: &DeviceId) -> PairingResult<()> {
        let mut sessions = lock(&self.sessions);
        let entry = sessions
            .entries
            .get_mut(device)
            .ok_or(PairingError::UnknownSession)?;
        entry.session.complete()?;
        entry.canceller = None;
        debug!("Pairing with {} complete", device);
        Ok(())
    }

    pub fn request_pin_code(&self, device: &DeviceId) -> PendingDecision<String> {
        self.run(device, CallbackKind::RequestPinCode, |agent| {
            agent.request_pin_code(device)
        })
    }

    pub fn display_pin_code(&self, device: &DeviceId, pin_code: &str) -> PendingDecision<()> {
        self.run(device, CallbackKind::DisplayPinCode, |agent| {
            agent.display_pin_code(device, pin_code)
        })
    }

    /// Passkeys above 999999 are rejected.
    pub fn request_passkey(&self, device: &DeviceId) -> PendingDecision<u32> {
        self.run(device, CallbackKind::RequestPasskey, |agent| {
            agent.request_passkey(device).map(|passkey| {
                if passkey <= MAX_PASSKEY {
                    Ok(passkey)
                } else {
                    warn!("Agent supplied out of range passkey {}", passkey);
                    Err(PairingError::Rejected)
                }
            })
        })
    }

    /// Shows a passkey. Repeated calls update the digits entered so far.
    /// The session stays open until [`complete`](Self::complete), a cancel,
    /// or the next other callback for the device.
    pub fn display_passkey(
        &self,
        device: &DeviceId,
        passkey: u32,
        entered: u16,
    ) -> PairingResult<()> {
        {
            let local = self.capability();
            let mut sessions = lock(&self.sessions);
            let entry = sessions.current(device, local, Some(CallbackKind::DisplayPasskey));
            if entry.session.state() != SessionState::Awaiting(CallbackKind::DisplayPasskey) {
                entry.session.begin(CallbackKind::DisplayPasskey)?;
            }
        }

        let agent = self.agent.clone();
        let shown = panic::catch_unwind(AssertUnwindSafe(|| {
            agent.display_passkey(device, passkey, entered)
        }));
        if let Err(payload) = shown {
            error!(
                "Agent callback DisplayPasskey for {} panicked: {}",
                device,
                panic_message(payload.as_ref())
            );
            self.cancel_device(device);
            return Err(PairingError::Cancelled);
        }
        Ok(())
    }

    pub fn request_confirmation(&self, device: &DeviceId, passkey: u32) -> PendingDecision<()> {
        self.run(device, CallbackKind::RequestConfirmation, |agent| {
            agent.request_confirmation(device, passkey)
        })
    }

    pub fn request_authorization(&self, device: &DeviceId) -> PendingDecision<()> {
        self.run(device, CallbackKind::RequestAuthorization, |agent| {
            agent.request_authorization(device)
        })
    }

    pub fn authorize_service(&self, device: &DeviceId, uuid: Uuid) -> PendingDecision<()> {
        self.run(device, CallbackKind::AuthorizeService, |agent| {
            agent.authorize_service(device, uuid)
        })
    }

    /// The daemon's Cancel: every outstanding request failed. Sessions end
    /// Cancelled and anyone waiting on their decisions is released.
    pub fn cancel(&self) {
        self.cancel_sessions(|_| true);
        self.notify_agent("Cancel", |agent| agent.cancel());
    }

    /// Cancels the session with one device, e.g. when it disconnects.
    pub fn cancel_device(&self, device: &DeviceId) {
        if self.cancel_sessions(|d| d == device) > 0 {
            self.notify_agent("Cancel", |agent| agent.cancel());
        }
    }

    /// The daemon's Release: it no longer uses this agent.
    pub fn release(&self) {
        *lock(&self.registered) = false;
        self.cancel_sessions(|_| true);
        self.notify_agent("Release", |agent| agent.release());
        info!("Agent {} released by the daemon", self.path);
    }

    /// Returns how many sessions were cancelled.
    fn cancel_sessions<F>(&self, filter: F) -> usize
    where
        F: Fn(&DeviceId) -> bool,
    {
        // Cancellers run continuations that lock the sessions again.
        let (cancelled, cancellers) = lock(&self.sessions).cancel_where(filter);
        for canceller in cancellers {
            canceller.cancel();
        }
        cancelled
    }

    fn notify_agent<F>(&self, what: &str, f: F)
    where
        F: FnOnce(&dyn Agent),
    {
        let agent = self.agent.clone();
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| f(agent.as_ref()))) {
            error!(
                "Agent callback {} panicked: {}",
                what,
                panic_message(payload.as_ref())
            );
        }
    }

    /// Opens the callback step on the device's session, asks the agent and
    /// ties the session's outcome to the returned decision.
    fn run<T, F>(&self, device: &DeviceId, kind: CallbackKind, call: F) -> PendingDecision<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Agent) -> PendingDecision<T>,
    {
        let local = self.capability();
        let generation = {
            let mut sessions = lock(&self.sessions);
            let entry = sessions.current(device, local, Some(kind));
            if let Err(err) = entry.session.begin(kind) {
                debug!("{} for {} refused: {}", kind, device, err);
                return PendingDecision::failed(err);
            }
            entry.generation
        };
        debug!("{} for {}", kind, device);

        let agent = self.agent.clone();
        let decision = match panic::catch_unwind(AssertUnwindSafe(|| call(agent.as_ref()))) {
            Ok(decision) => decision,
            Err(payload) => {
                error!(
                    "Agent callback {} for {} panicked: {}",
                    kind,
                    device,
                    panic_message(payload.as_ref())
                );
                PendingDecision::rejected()
            }
        };

        // A cancel may have landed while the agent was being asked.
        let still_awaiting = {
            let mut sessions = lock(&self.sessions);
            match sessions
                .entries
                .get_mut(device)
                .filter(|entry| entry.generation == generation)
            {
                Some(entry) if entry.session.state() == SessionState::Awaiting(kind) => {
                    entry.canceller = Some(decision.canceller());
                    true
                }
                _ => false,
            }
        };
        if !still_awaiting {
            debug!("{} for {} ended while the agent was asked", kind, device);
            decision.canceller().cancel();
        }

        let (tracked, resolver) = decision::pending();
        let sessions = Arc::clone(&self.sessions);
        let device = device.clone();
        decision.then(move |outcome| {
            let current = settle_session(&sessions, &device, generation, outcome.is_ok());
            let outcome = match outcome {
                Ok(_) if !current => Err(PairingError::Cancelled),
                outcome => outcome,
            };
            resolver.settle(outcome);
        });
        tracked
    }
}

impl std::fmt::Debug for PairingAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairingAgent")
            .field("path", &self.path)
            .field("capability", &self.capability())
            .finish_non_exhaustive()
    }
}
