//! Unit tests for the pairing agent

use super::*;
use crate::bus::{BusCall, BusContext, DeviceId, LoopbackBus, ObjectPath};
use crate::error::{BusError, ConfigurationError, Error};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use IoCapability::*;

const ALL: [IoCapability; 5] = [
    DisplayOnly,
    DisplayYesNo,
    KeyboardOnly,
    NoInputNoOutput,
    KeyboardDisplay,
];

fn agent_path() -> ObjectPath {
    ObjectPath::new("/org/rustyperiph/agent").unwrap()
}

fn device() -> DeviceId {
    DeviceId::new("/org/bluez/hci0/dev_00_11_22_33_44_55")
}

/// A yes/no agent whose prompts are answered by the test.
fn prompted_agent() -> (
    PairingAgent,
    Arc<Mutex<Vec<DecisionResolver<bool>>>>,
    Arc<AtomicUsize>,
) {
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let cancels = Arc::new(AtomicUsize::new(0));

    let queue = prompts.clone();
    let counter = cancels.clone();
    let agent = YesNoAgent::new(
        move |_, _| {
            let (decision, resolver) = pending();
            queue.lock().unwrap().push(resolver);
            decision
        },
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        },
    );
    (
        PairingAgent::new(Arc::new(agent), agent_path()),
        prompts,
        cancels,
    )
}

#[test]
fn test_model_spot_checks() {
    assert_eq!(
        resolve_model(NoInputNoOutput, NoInputNoOutput, false),
        PairingModel::JustWorks
    );
    assert_eq!(
        resolve_model(NoInputNoOutput, NoInputNoOutput, true),
        PairingModel::JustWorks
    );
    assert_eq!(
        resolve_model(DisplayYesNo, DisplayYesNo, true),
        PairingModel::NumericComparison
    );
    assert_eq!(
        resolve_model(KeyboardOnly, DisplayOnly, true),
        PairingModel::PasskeyEntry
    );
}

#[test]
fn test_model_matrix() {
    use PairingModel::*;

    // Rows: initiator, columns: responder, in the order of ALL.
    let expected = [
        [JustWorks, JustWorks, PasskeyEntry, JustWorks, PasskeyEntry],
        [JustWorks, NumericComparison, PasskeyEntry, JustWorks, NumericComparison],
        [PasskeyEntry, PasskeyEntry, PasskeyEntry, JustWorks, PasskeyEntry],
        [JustWorks, JustWorks, JustWorks, JustWorks, JustWorks],
        [PasskeyEntry, NumericComparison, PasskeyEntry, JustWorks, NumericComparison],
    ];

    for (i, initiator) in ALL.iter().enumerate() {
        for (j, responder) in ALL.iter().enumerate() {
            assert_eq!(
                resolve_model(*initiator, *responder, true),
                expected[i][j],
                "{:?} -> {:?}",
                initiator,
                responder
            );
            assert_eq!(
                resolve_model(*initiator, *responder, true),
                resolve_model(*responder, *initiator, true)
            );
            assert_eq!(
                resolve_model(*initiator, *responder, false),
                JustWorks
            );
        }
    }
}

#[test]
fn test_legacy_model_has_no_numeric_comparison() {
    for local in ALL {
        for remote in ALL {
            assert_ne!(
                resolve_legacy_model(local, remote, true),
                PairingModel::NumericComparison
            );
        }
    }
    assert_eq!(
        resolve_legacy_model(DisplayYesNo, DisplayYesNo, true),
        PairingModel::JustWorks
    );
    assert_eq!(
        resolve_legacy_model(KeyboardDisplay, DisplayYesNo, true),
        PairingModel::PasskeyEntry
    );
}

#[test]
fn test_capability_daemon_names() {
    for capability in ALL {
        let name = capability.as_daemon_str();
        assert_eq!(name.parse::<IoCapability>(), Ok(capability));
    }
    assert_eq!(NoInputNoOutput.as_daemon_str(), "NoInputNoOutput");
    assert!("Telepathy".parse::<IoCapability>().is_err());
}

#[test]
fn test_session_transitions() {
    let mut session = PairingSession::new(device(), DisplayYesNo);
    assert_eq!(session.state(), SessionState::Idle);

    assert_eq!(
        session.exchange_capabilities(KeyboardDisplay, true, false),
        Ok(PairingModel::NumericComparison)
    );
    assert_eq!(session.state(), SessionState::CapabilityExchanged);
    assert_eq!(session.remote_capability(), Some(KeyboardDisplay));
    assert_eq!(
        session.exchange_capabilities(KeyboardDisplay, true, false),
        Err(PairingError::InvalidState)
    );

    session.begin(CallbackKind::RequestConfirmation).unwrap();
    assert_eq!(
        session.state(),
        SessionState::Awaiting(CallbackKind::RequestConfirmation)
    );
    assert_eq!(
        session.begin(CallbackKind::RequestPasskey),
        Err(PairingError::InvalidState)
    );

    session.complete().unwrap();
    assert_eq!(session.state(), SessionState::Complete);
    assert!(!session.cancel());
    assert_eq!(session.complete(), Err(PairingError::InvalidState));
}

#[test]
fn test_session_infers_model_from_callback() {
    let mut session = PairingSession::new(device(), KeyboardOnly);
    session.begin(CallbackKind::RequestPasskey).unwrap();
    assert_eq!(session.model(), Some(PairingModel::PasskeyEntry));

    assert!(session.cancel());
    assert_eq!(session.state(), SessionState::Cancelled);
}

#[test]
fn test_out_of_band_unsupported() {
    let mut session = PairingSession::new(device(), KeyboardDisplay);
    assert_eq!(
        session.exchange_capabilities(KeyboardDisplay, true, true),
        Err(PairingError::OutOfBandUnsupported)
    );
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn test_register_as_default() {
    let bus = Arc::new(LoopbackBus::new());
    let ctx = BusContext::from_bus(bus.clone());
    let host = PairingAgent::new(Arc::new(NoIoAgent::new()), agent_path());

    host.register(&ctx, true).unwrap();
    assert!(host.is_registered());
    assert!(matches!(
        host.register(&ctx, true),
        Err(Error::Configuration(ConfigurationError::AlreadyRegistered))
    ));

    host.unregister(&ctx).unwrap();
    assert_eq!(
        bus.calls(),
        vec![
            BusCall::RegisterAgent {
                path: agent_path(),
                capability: "NoInputNoOutput".into(),
            },
            BusCall::RequestDefaultAgent { path: agent_path() },
            BusCall::UnregisterAgent { path: agent_path() },
        ]
    );
}

#[test]
fn test_refused_default_rolls_back() {
    let bus = Arc::new(LoopbackBus::new());
    let ctx = BusContext::from_bus(bus.clone());
    let host = PairingAgent::new(Arc::new(NoIoAgent::new()), agent_path());

    // Registration goes through, the default request is refused.
    bus.fail_call_after(1, BusError::new("org.bluez.Error.NotPermitted", "not root"));
    assert!(matches!(host.register(&ctx, true), Err(Error::Bus(_))));
    assert!(!host.is_registered());
    assert_eq!(
        bus.calls(),
        vec![
            BusCall::RegisterAgent {
                path: agent_path(),
                capability: "NoInputNoOutput".into(),
            },
            BusCall::UnregisterAgent { path: agent_path() },
        ]
    );

    host.register(&ctx, false).unwrap();
    assert!(host.is_registered());
}

#[test]
fn test_no_io_agent_authorizes() {
    let host = PairingAgent::new(Arc::new(NoIoAgent::new()), agent_path());

    assert_eq!(host.request_authorization(&device()).wait(), Ok(()));
    assert_eq!(host.session_state(&device()), Some(SessionState::Complete));

    let uuid = crate::uuid::Uuid::from_u16(0x180F);
    assert_eq!(host.authorize_service(&device(), uuid).wait(), Ok(()));

    // Callbacks it does not implement are rejected.
    assert_eq!(
        host.request_passkey(&device()).wait(),
        Err(PairingError::Rejected)
    );
    assert_eq!(host.session_state(&device()), Some(SessionState::Cancelled));
}

#[test]
fn test_yes_no_agent_confirms() {
    let (host, prompts, _) = prompted_agent();
    let decision = host.request_confirmation(&device(), 123456);
    assert_eq!(
        host.session_state(&device()),
        Some(SessionState::Awaiting(CallbackKind::RequestConfirmation))
    );

    prompts.lock().unwrap().pop().unwrap().resolve(true);
    assert_eq!(decision.wait(), Ok(()));
    assert_eq!(host.session_state(&device()), Some(SessionState::Complete));
}

#[test]
fn test_yes_no_agent_rejects() {
    let (host, prompts, _) = prompted_agent();
    let decision = host.request_confirmation(&device(), 123456);

    prompts.lock().unwrap().pop().unwrap().resolve(false);
    assert_eq!(decision.wait(), Err(PairingError::Rejected));
    assert_eq!(host.session_state(&device()), Some(SessionState::Cancelled));
}

#[test]
fn test_cancel_releases_waiter() {
    let (host, prompts, cancels) = prompted_agent();
    let decision = host.request_confirmation(&device(), 42);
    let waiter = thread::spawn(move || decision.wait());

    host.cancel();
    assert_eq!(waiter.join().unwrap(), Err(PairingError::Cancelled));
    assert_eq!(host.session_state(&device()), Some(SessionState::Cancelled));
    assert_eq!(cancels.load(Ordering::SeqCst), 1);

    // The user answering afterwards changes nothing.
    prompts.lock().unwrap().pop().unwrap().resolve(true);
    assert_eq!(host.session_state(&device()), Some(SessionState::Cancelled));
}

#[test]
fn test_new_attempt_after_cancel() {
    let (host, prompts, _) = prompted_agent();
    let first = host.request_confirmation(&device(), 1);
    host.cancel_device(&device());
    assert_eq!(first.wait(), Err(PairingError::Cancelled));

    let second = host.request_confirmation(&device(), 2);
    let mut prompts = prompts.lock().unwrap();
    assert_eq!(prompts.len(), 2);
    // Answering the stale prompt does not touch the new session.
    prompts.remove(0).resolve(true);
    assert_eq!(
        host.session_state(&device()),
        Some(SessionState::Awaiting(CallbackKind::RequestConfirmation))
    );
    prompts.remove(0).resolve(true);
    assert_eq!(second.wait(), Ok(()));
}

#[test]
fn test_concurrent_callback_refused() {
    let (host, _prompts, _) = prompted_agent();
    let _first = host.request_confirmation(&device(), 1);
    assert_eq!(
        host.request_confirmation(&device(), 2).wait(),
        Err(PairingError::InvalidState)
    );
}

#[test]
fn test_display_passkey_until_complete() {
    let host = PairingAgent::new(Arc::new(NoIoAgent::new()), agent_path());
    host.display_passkey(&device(), 123456, 0).unwrap();
    host.display_passkey(&device(), 123456, 3).unwrap();
    assert_eq!(
        host.session_state(&device()),
        Some(SessionState::Awaiting(CallbackKind::DisplayPasskey))
    );

    host.complete(&device()).unwrap();
    assert_eq!(host.session_state(&device()), Some(SessionState::Complete));
    assert_eq!(
        host.complete(&DeviceId::new("dev_unknown")),
        Err(PairingError::UnknownSession)
    );
}

struct PasskeyAgent(u32);

impl Agent for PasskeyAgent {
    fn capability(&self) -> IoCapability {
        KeyboardOnly
    }

    fn request_passkey(&self, _device: &DeviceId) -> PendingDecision<u32> {
        PendingDecision::ready(self.0)
    }
}

#[test]
fn test_passkey_range_checked() {
    let host = PairingAgent::new(Arc::new(PasskeyAgent(999_999)), agent_path());
    assert_eq!(host.request_passkey(&device()).wait(), Ok(999_999));

    let host = PairingAgent::new(Arc::new(PasskeyAgent(1_000_000)), agent_path());
    assert_eq!(
        host.request_passkey(&device()).wait(),
        Err(PairingError::Rejected)
    );
}

struct PanickingAgent;

impl Agent for PanickingAgent {
    fn capability(&self) -> IoCapability {
        DisplayYesNo
    }

    fn request_confirmation(&self, _device: &DeviceId, _passkey: u32) -> PendingDecision<()> {
        panic!("prompt window crashed")
    }
}

#[test]
fn test_panicking_agent_rejects() {
    let host = PairingAgent::new(Arc::new(PanickingAgent), agent_path());
    assert_eq!(
        host.request_confirmation(&device(), 1).wait(),
        Err(PairingError::Rejected)
    );
    assert_eq!(host.session_state(&device()), Some(SessionState::Cancelled));
}

/// Keyboard agent answering legacy PIN requests with a fixed code.
struct PinAgent {
    shown: Mutex<Vec<String>>,
    releases: AtomicUsize,
}

impl Agent for PinAgent {
    fn capability(&self) -> IoCapability {
        KeyboardDisplay
    }

    fn request_pin_code(&self, _device: &DeviceId) -> PendingDecision<String> {
        PendingDecision::ready("0000".to_string())
    }

    fn display_pin_code(&self, _device: &DeviceId, pin_code: &str) -> PendingDecision<()> {
        self.shown.lock().unwrap().push(pin_code.to_string());
        PendingDecision::ready(())
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

fn pin_agent() -> (PairingAgent, Arc<PinAgent>) {
    let agent = Arc::new(PinAgent {
        shown: Mutex::new(Vec::new()),
        releases: AtomicUsize::new(0),
    });
    (PairingAgent::new(agent.clone(), agent_path()), agent)
}

#[test]
fn test_legacy_pin_code_callbacks() {
    let (host, agent) = pin_agent();

    assert_eq!(
        host.request_pin_code(&device()).wait(),
        Ok("0000".to_string())
    );
    assert_eq!(host.session_state(&device()), Some(SessionState::Complete));

    assert_eq!(host.display_pin_code(&device(), "123456").wait(), Ok(()));
    assert_eq!(*agent.shown.lock().unwrap(), vec!["123456".to_string()]);
}

#[test]
fn test_daemon_release_cancels_sessions() {
    let bus = Arc::new(LoopbackBus::new());
    let ctx = BusContext::from_bus(bus.clone());
    let (host, _prompts, _) = prompted_agent();
    host.register(&ctx, false).unwrap();

    let decision = host.request_confirmation(&device(), 7);
    let waiter = thread::spawn(move || decision.wait());

    host.release();
    assert_eq!(waiter.join().unwrap(), Err(PairingError::Cancelled));
    assert_eq!(host.session_state(&device()), Some(SessionState::Cancelled));
    assert!(!host.is_registered());

    // Nothing is sent back to the daemon.
    assert!(!bus
        .calls()
        .iter()
        .any(|call| matches!(call, BusCall::UnregisterAgent { .. })));
}

#[test]
fn test_release_reaches_agent() {
    let (host, agent) = pin_agent();
    host.release();
    assert_eq!(agent.releases.load(Ordering::SeqCst), 1);
}

#[test]
fn test_display_passkey_does_not_block_later_callbacks() {
    let host = PairingAgent::new(Arc::new(NoIoAgent::new()), agent_path());
    host.display_passkey(&device(), 123456, 6).unwrap();

    let battery = crate::uuid::Uuid::from_u16(0x180F);
    assert_eq!(host.authorize_service(&device(), battery).wait(), Ok(()));
    assert_eq!(host.session_state(&device()), Some(SessionState::Complete));

    // Pairing again after another passkey display.
    host.display_passkey(&device(), 654321, 0).unwrap();
    assert_eq!(host.request_authorization(&device()).wait(), Ok(()));
    assert_eq!(host.session_state(&device()), Some(SessionState::Complete));
}

/// Confirms, but only after the daemon already cancelled the request.
struct LateAgent {
    host: Mutex<Option<Arc<PairingAgent>>>,
}

impl Agent for LateAgent {
    fn capability(&self) -> IoCapability {
        DisplayYesNo
    }

    fn request_confirmation(&self, device: &DeviceId, _passkey: u32) -> PendingDecision<()> {
        let host = self.host.lock().unwrap().clone();
        if let Some(host) = host {
            host.cancel_device(device);
        }
        PendingDecision::ready(())
    }
}

#[test]
fn test_answer_after_cancel_is_cancelled() {
    let agent = Arc::new(LateAgent {
        host: Mutex::new(None),
    });
    let host = Arc::new(PairingAgent::new(agent.clone(), agent_path()));
    *agent.host.lock().unwrap() = Some(host.clone());

    assert_eq!(
        host.request_confirmation(&device(), 42).wait(),
        Err(PairingError::Cancelled)
    );
    assert_eq!(host.session_state(&device()), Some(SessionState::Cancelled));

    *agent.host.lock().unwrap() = None;
}
