//! Unit tests for advertisement multiplexing

use super::*;
use crate::bus::{BusCall, BusContext, LoopbackBus, ObjectPath, PropValue};
use crate::config::PeripheralConfig;
use crate::error::{BusError, ConfigurationError, Error};
use crate::uuid::Uuid;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn setup() -> (Arc<LoopbackBus>, AdvertisementMultiplexer, ObjectPath) {
    let bus = Arc::new(LoopbackBus::new());
    let ctx = BusContext::from_bus(bus.clone());
    let config = PeripheralConfig::default();
    let mux = AdvertisementMultiplexer::new(&ctx, &config);
    (bus, mux, config.adapter)
}

fn advert(name: &str, timeout_secs: u64) -> Advertisement {
    Advertisement::new(
        name,
        [Uuid::from_u16(0x180F)],
        0x0340,
        Duration::from_secs(timeout_secs),
    )
}

fn at(t0: Instant, secs: u64) -> Instant {
    t0 + Duration::from_secs(secs)
}

#[test]
fn test_rotation_restarts_full_timeout() {
    let (bus, mux, adapter) = setup();
    let t0 = Instant::now();

    let a = mux.submit(advert("A", 10), &adapter, t0).unwrap();
    let b = mux.submit(advert("B", 20), &adapter, t0).unwrap();
    assert_eq!(mux.state(a), Some(AdvertState::Active));
    assert_eq!(mux.state(b), Some(AdvertState::Pending));
    assert_eq!(mux.active(&adapter), Some(a));
    assert_eq!(mux.queued(&adapter), vec![b]);
    assert_eq!(mux.next_deadline(), Some(at(t0, 10)));

    assert!(mux.poll(at(t0, 9)).is_empty());
    assert_eq!(mux.state(a), Some(AdvertState::Active));

    assert_eq!(mux.poll(at(t0, 10)), vec![a]);
    assert_eq!(mux.state(a), Some(AdvertState::Expired));
    assert_eq!(mux.state(b), Some(AdvertState::Active));
    // B gets its own full 20 seconds, not what was left of A's.
    assert_eq!(mux.next_deadline(), Some(at(t0, 30)));

    mux.cancel(b, at(t0, 15)).unwrap();
    assert_eq!(mux.state(b), Some(AdvertState::Cancelled));
    assert_eq!(mux.active(&adapter), None);
    assert_eq!(mux.next_deadline(), None);
    assert!(bus.active_adverts(&adapter).is_empty());

    let path_a = mux.path(a).unwrap();
    let path_b = mux.path(b).unwrap();
    assert_eq!(
        bus.calls(),
        vec![
            BusCall::RegisterAdvertisement {
                adapter: adapter.clone(),
                path: path_a.clone()
            },
            BusCall::UnregisterAdvertisement {
                adapter: adapter.clone(),
                path: path_a
            },
            BusCall::RegisterAdvertisement {
                adapter: adapter.clone(),
                path: path_b.clone()
            },
            BusCall::UnregisterAdvertisement {
                adapter,
                path: path_b
            },
        ]
    );
}

#[test]
fn test_late_poll_starts_timer_at_activation() {
    let (_bus, mux, adapter) = setup();
    let t0 = Instant::now();

    let a = mux.submit(advert("A", 10), &adapter, t0).unwrap();
    let b = mux.submit(advert("B", 5), &adapter, t0).unwrap();

    // Polled long after A's deadline: B starts now and is not expired by
    // the same poll.
    assert_eq!(mux.poll(at(t0, 30)), vec![a]);
    assert_eq!(mux.state(b), Some(AdvertState::Active));
    assert_eq!(mux.next_deadline(), Some(at(t0, 35)));
}

#[test]
fn test_single_advert_persists_until_timeout() {
    let (bus, mux, adapter) = setup();
    let t0 = Instant::now();

    let id = mux.submit(advert("Solo", 60), &adapter, t0).unwrap();
    assert!(mux.poll(at(t0, 59)).is_empty());
    assert_eq!(bus.active_adverts(&adapter), vec![mux.path(id).unwrap()]);

    assert_eq!(mux.poll(at(t0, 60)), vec![id]);
    assert!(bus.active_adverts(&adapter).is_empty());
    assert_eq!(mux.active(&adapter), None);
}

#[test]
fn test_zero_timeout_broadcasts_until_cancelled() {
    let (_bus, mux, adapter) = setup();
    let t0 = Instant::now();

    let forever = mux.submit(advert("Beacon", 0), &adapter, t0).unwrap();
    let waiting = mux.submit(advert("Next", 10), &adapter, t0).unwrap();
    assert_eq!(mux.next_deadline(), None);
    assert!(mux.poll(at(t0, 86_400)).is_empty());
    assert_eq!(mux.state(waiting), Some(AdvertState::Pending));

    mux.cancel(forever, at(t0, 86_400)).unwrap();
    assert_eq!(mux.state(waiting), Some(AdvertState::Active));
    assert_eq!(mux.next_deadline(), Some(at(t0, 86_410)));
}

#[test]
fn test_cancel_pending_leaves_queue_order() {
    let (_bus, mux, adapter) = setup();
    let t0 = Instant::now();

    let a = mux.submit(advert("A", 10), &adapter, t0).unwrap();
    let b = mux.submit(advert("B", 10), &adapter, t0).unwrap();
    let c = mux.submit(advert("C", 10), &adapter, t0).unwrap();
    let d = mux.submit(advert("D", 10), &adapter, t0).unwrap();

    mux.cancel(b, at(t0, 1)).unwrap();
    assert_eq!(mux.state(b), Some(AdvertState::Cancelled));
    assert_eq!(mux.queued(&adapter), vec![c, d]);
    assert_eq!(mux.state(a), Some(AdvertState::Active));

    assert_eq!(mux.poll(at(t0, 10)), vec![a]);
    assert_eq!(mux.active(&adapter), Some(c));

    // Cancelling again, or cancelling an expired advert, does nothing.
    mux.cancel(b, at(t0, 11)).unwrap();
    mux.cancel(a, at(t0, 11)).unwrap();
    assert_eq!(mux.active(&adapter), Some(c));
}

#[test]
fn test_cancel_unknown_advert() {
    let (_bus, mux, adapter) = setup();
    let (_other_bus, other, _) = setup();
    let t0 = Instant::now();

    other.submit(advert("X", 10), &adapter, t0).unwrap();
    let foreign = other.submit(advert("Y", 10), &adapter, t0).unwrap();

    assert!(matches!(
        mux.cancel(foreign, t0),
        Err(Error::Configuration(ConfigurationError::UnknownAdvertisement(1)))
    ));
    assert_eq!(mux.state(foreign), None);
}

#[test]
fn test_adapters_are_independent() {
    let (bus, mux, hci0) = setup();
    let hci1 = ObjectPath::new("/org/bluez/hci1").unwrap();
    let t0 = Instant::now();

    let a = mux.submit(advert("A", 10), &hci0, t0).unwrap();
    let b = mux.submit(advert("B", 20), &hci1, t0).unwrap();
    assert_eq!(mux.active(&hci0), Some(a));
    assert_eq!(mux.active(&hci1), Some(b));
    assert_eq!(bus.active_adverts(&hci1), vec![mux.path(b).unwrap()]);

    assert_eq!(mux.poll(at(t0, 10)), vec![a]);
    assert_eq!(mux.active(&hci0), None);
    assert_eq!(mux.active(&hci1), Some(b));
    assert_eq!(mux.next_deadline(), Some(at(t0, 20)));
}

#[test]
fn test_daemon_release_promotes_next() {
    let (bus, mux, adapter) = setup();
    let t0 = Instant::now();
    let released = Arc::new(AtomicUsize::new(0));
    let counter = released.clone();

    let a = mux
        .submit(
            advert("A", 10).with_release(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            &adapter,
            t0,
        )
        .unwrap();
    let b = mux.submit(advert("B", 10), &adapter, t0).unwrap();
    let path_a = mux.path(a).unwrap();

    assert!(mux.release(&path_a, at(t0, 3)));
    assert_eq!(released.load(Ordering::SeqCst), 1);
    assert_eq!(mux.state(a), Some(AdvertState::Expired));
    assert_eq!(mux.state(b), Some(AdvertState::Active));
    assert_eq!(mux.next_deadline(), Some(at(t0, 13)));

    // The daemon already dropped it, so it is not unregistered again.
    assert!(!bus.calls().contains(&BusCall::UnregisterAdvertisement {
        adapter: adapter.clone(),
        path: path_a.clone()
    }));

    assert!(!mux.release(&path_a, at(t0, 4)));
    assert!(!mux.release(&ObjectPath::new("/elsewhere").unwrap(), at(t0, 4)));
}

#[test]
fn test_release_callback_on_expiry_not_cancel() {
    let (_bus, mux, adapter) = setup();
    let t0 = Instant::now();
    let released = Arc::new(AtomicUsize::new(0));

    let make = |name: &str| {
        let counter = released.clone();
        advert(name, 10).with_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    };

    let a = mux.submit(make("A"), &adapter, t0).unwrap();
    let b = mux.submit(make("B"), &adapter, t0).unwrap();

    mux.cancel(a, at(t0, 1)).unwrap();
    assert_eq!(released.load(Ordering::SeqCst), 0);

    assert_eq!(mux.poll(at(t0, 11)), vec![b]);
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[test]
fn test_panicking_release_callback() {
    let (_bus, mux, adapter) = setup();
    let t0 = Instant::now();

    let a = mux
        .submit(
            advert("A", 10).with_release(|| panic!("release exploded")),
            &adapter,
            t0,
        )
        .unwrap();
    let b = mux.submit(advert("B", 10), &adapter, t0).unwrap();

    assert_eq!(mux.poll(at(t0, 10)), vec![a]);
    assert_eq!(mux.state(b), Some(AdvertState::Active));
}

#[test]
fn test_refused_submit_is_cancelled() {
    let (bus, mux, adapter) = setup();
    let t0 = Instant::now();

    bus.fail_next_call(BusError::new("org.bluez.Error.NotPermitted", "busy"));
    let result = mux.submit(advert("A", 10), &adapter, t0);
    assert!(matches!(result, Err(Error::Bus(ref err)) if err.message == "busy"));
    assert_eq!(mux.active(&adapter), None);

    // The adapter stays usable.
    let b = mux.submit(advert("B", 10), &adapter, t0).unwrap();
    assert_eq!(mux.active(&adapter), Some(b));
    assert_eq!(mux.path(b).unwrap().as_str(), "/org/rustyperiph/advert1");
}

#[test]
fn test_refused_promotion_skips_to_next() {
    let (bus, mux, adapter) = setup();
    let t0 = Instant::now();

    let a = mux.submit(advert("A", 10), &adapter, t0).unwrap();
    let b = mux.submit(advert("B", 10), &adapter, t0).unwrap();
    let c = mux.submit(advert("C", 10), &adapter, t0).unwrap();

    // Unregistering A goes through, registering B is refused.
    bus.fail_call_after(1, BusError::new("org.bluez.Error.Failed", "no slot"));
    assert_eq!(mux.poll(at(t0, 10)), vec![a]);
    assert_eq!(mux.state(b), Some(AdvertState::Cancelled));
    assert_eq!(mux.state(c), Some(AdvertState::Active));
    assert!(mux.queued(&adapter).is_empty());
}

#[test]
fn test_exported_properties() {
    let (bus, mux, adapter) = setup();
    let t0 = Instant::now();

    let id = mux
        .submit(
            advert("Battery", 30).with_manufacturer_data(0x004C, vec![0x02, 0x15]),
            &adapter,
            t0,
        )
        .unwrap();
    let path = mux.path(id).unwrap();
    assert_eq!(path.as_str(), "/org/rustyperiph/advert0");

    let props = bus.advert_properties(&path).unwrap();
    assert_eq!(props["LocalName"], PropValue::Str("Battery".to_string()));
    assert_eq!(props["ServiceUUIDs"], PropValue::StrList(vec!["180f".to_string()]));
    assert_eq!(props["Timeout"], PropValue::U16(30));
    assert_eq!(mux.properties(&path), Some(props));
}

#[test]
fn test_cancel_all() {
    let (bus, mux, hci0) = setup();
    let hci1 = ObjectPath::new("/org/bluez/hci1").unwrap();
    let t0 = Instant::now();

    let a = mux.submit(advert("A", 10), &hci0, t0).unwrap();
    let b = mux.submit(advert("B", 10), &hci0, t0).unwrap();
    let c = mux.submit(advert("C", 0), &hci1, t0).unwrap();

    mux.cancel_all().unwrap();
    for id in [a, b, c] {
        assert_eq!(mux.state(id), Some(AdvertState::Cancelled));
    }
    assert!(bus.active_adverts(&hci0).is_empty());
    assert!(bus.active_adverts(&hci1).is_empty());
    assert!(mux.poll(at(t0, 100)).is_empty());
}

#[test]
fn test_finished_requests_leave_the_pool() {
    let (_bus, mux, adapter) = setup();
    let t0 = Instant::now();

    let first = mux.submit(advert("first", 10), &adapter, t0).unwrap();
    mux.cancel(first, t0).unwrap();
    let mut last = first;
    for _ in 0..1000 {
        last = mux.submit(advert("A", 10), &adapter, t0).unwrap();
        mux.cancel(last, t0).unwrap();
    }
    assert!(mux.is_empty());
    assert_eq!(mux.state(last), Some(AdvertState::Cancelled));
    // Long forgotten, yet cancelling it again is still harmless.
    assert_eq!(mux.state(first), None);
    assert!(mux.cancel(first, t0).is_ok());

    let a = mux.submit(advert("A", 10), &adapter, t0).unwrap();
    let b = mux.submit(advert("B", 10), &adapter, t0).unwrap();
    assert_eq!(mux.len(), 2);

    assert_eq!(mux.poll(at(t0, 10)), vec![a]);
    assert_eq!(mux.len(), 1);
    let path_a = mux.path(a).unwrap();
    assert_eq!(mux.properties(&path_a), None);

    assert!(mux.release(&mux.path(b).unwrap(), at(t0, 12)));
    assert!(mux.is_empty());
    assert_eq!(mux.state(b), Some(AdvertState::Expired));
}
