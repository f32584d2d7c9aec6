//! Example exporting a Battery Service
//!
//! Builds a battery service with a notifiable level characteristic, registers
//! it together with a pairing agent and an advertisement, then plays the
//! daemon's part through the in-process loopback bus.

use rustyperiph::advert::{Advertisement, AdvertisementMultiplexer, AdvertisingIncludes};
use rustyperiph::agent::{NoIoAgent, PairingAgent};
use rustyperiph::bus::{BusContext, DeviceId, LoopbackBus};
use rustyperiph::gatt::{
    AccessDispatcher, AttributeId, Characteristic, Descriptor, GattApplication, ReadOptions,
    Service,
};
use rustyperiph::{Adapter, AttributeFlags, PeripheralConfig, SerialExecutor, Uuid};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const BATTERY_SERVICE: u16 = 0x180F;
const BATTERY_LEVEL: u16 = 0x2A19;
const APPEARANCE_GENERIC_WATCH: u16 = 0x00C0;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bus = Arc::new(LoopbackBus::new());
    let ctx = BusContext::from_bus(bus.clone());
    let config = PeripheralConfig::default();
    bus.add_adapter(&config.adapter, "00:1A:7D:DA:71:13", "rustyperiph-host");

    let adapter = Adapter::first(&ctx)?;
    adapter.set_powered(true)?;
    println!("Using {} at {}", adapter.path(), adapter.address()?);

    let executor = SerialExecutor::spawn("rustyperiph")?;
    let handle = executor.handle();

    // Build the attribute tree
    let level = Arc::new(AtomicU8::new(87));
    let app = Arc::new(GattApplication::new(config.clone()));
    let service = app.add_service(Service::new(BATTERY_SERVICE))?;

    let reader = level.clone();
    let level_id = app.add_characteristic(
        service,
        Characteristic::new(BATTERY_LEVEL, AttributeFlags::READ | AttributeFlags::NOTIFY)
            .with_value(vec![level.load(Ordering::SeqCst)])
            .with_getter(move |opts| opts.slice(&[reader.load(Ordering::SeqCst)])),
    )?;
    app.add_descriptor(level_id, Descriptor::user_description("Battery level"))?;

    // Register on the executor so that changes can be published from it
    let registered = {
        let app = app.clone();
        let ctx = ctx.clone();
        handle.call(move || app.register(&ctx))??
    };
    println!("Registered {} objects:", registered.len());
    for path in registered.keys() {
        println!("  {}", path);
    }

    let agent = PairingAgent::new(Arc::new(NoIoAgent::new()), config.agent_path.clone());
    agent.register(&ctx, false)?;
    println!("Registered {} agent", agent.capability());

    let adverts = AdvertisementMultiplexer::new(&ctx, &config);
    let now = Instant::now();
    let advert = adverts.submit(
        Advertisement::new(
            "RustyPeriph",
            [Uuid::from_u16(BATTERY_SERVICE)],
            APPEARANCE_GENERIC_WATCH,
            Duration::from_secs(30),
        )
        .with_includes(adapter.supported_includes()? & AdvertisingIncludes::TX_POWER),
        adapter.path(),
        now,
    )?;
    if let Some(path) = adverts.path(advert) {
        println!("Advertising as {}", path);
    }

    // A central subscribes and reads the level
    let dispatcher = Arc::new(AccessDispatcher::new(app.clone()));
    let central = DeviceId::new("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF");
    let level_path = app
        .path_of(AttributeId::Characteristic(level_id))
        .ok_or("battery level has no path")?;

    let seed = {
        let dispatcher = dispatcher.clone();
        let path = level_path.clone();
        let central = central.clone();
        handle.call(move || dispatcher.start_notify(&path, central))??
    };
    println!("{} subscribed, starting from {:?}", central, seed);

    let value = {
        let dispatcher = dispatcher.clone();
        let path = level_path.clone();
        handle.call(move || dispatcher.read(&path, &ReadOptions::new()))??
    };
    println!("Read battery level {}%", value.first().copied().unwrap_or_default());

    // The battery drains on some other thread
    level.store(86, Ordering::SeqCst);
    app.schedule_changed(&handle, level_id, vec![86])?;
    handle.call(|| ())?;
    for event in bus.take_events() {
        println!(
            "Sent {:?} of {} to {:?}",
            event.value, event.path, event.recipients
        );
    }

    // Time passes until the advert runs out
    for id in adverts.poll(now + Duration::from_secs(30)) {
        println!("Advert {} expired", id);
    }

    {
        let app = app.clone();
        let ctx = ctx.clone();
        handle.call(move || app.unregister(&ctx))??;
    }
    agent.unregister(&ctx)?;
    executor.shutdown();
    println!("Unregistered");

    Ok(())
}
