//! Bluetooth adapters
//!
//! An [`Adapter`] is a handle on one of the daemon's controllers. Reads and
//! writes go straight to the daemon; nothing is cached.

use crate::advert::AdvertisingIncludes;
use crate::bus::{AdapterManager, AdvertisingManager, BusContext, ObjectPath, PropValue};
use crate::error::{BusError, ConfigurationError, Result};
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;

/// A Bluetooth adapter managed by the daemon
#[derive(Clone)]
pub struct Adapter {
    path: ObjectPath,
    properties: Arc<dyn AdapterManager>,
    advertising: Arc<dyn AdvertisingManager>,
}

impl Adapter {
    /// Handle on the adapter at `path`. Whether it exists is only known on
    /// first use.
    pub fn new(ctx: &BusContext, path: ObjectPath) -> Self {
        Self {
            path,
            properties: ctx.adapters.clone(),
            advertising: ctx.advertising.clone(),
        }
    }

    /// Every adapter the daemon lists
    pub fn all(ctx: &BusContext) -> Result<Vec<Adapter>> {
        let paths = ctx.adapters.adapters()?;
        debug!("Found {} adapters", paths.len());
        Ok(paths
            .into_iter()
            .map(|path| Adapter::new(ctx, path))
            .collect())
    }

    /// The first adapter the daemon lists
    pub fn first(ctx: &BusContext) -> Result<Adapter> {
        Adapter::all(ctx)?
            .into_iter()
            .next()
            .ok_or_else(|| ConfigurationError::NoAdapter.into())
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    /// Gets the adapter's Bluetooth address
    pub fn address(&self) -> Result<String> {
        self.string("Address")
    }

    /// Gets the system's Bluetooth host name
    pub fn name(&self) -> Result<String> {
        self.string("Name")
    }

    /// Gets the user friendly name
    pub fn alias(&self) -> Result<String> {
        self.string("Alias")
    }

    /// Sets the user friendly name. An empty alias resets it to the host
    /// name.
    pub fn set_alias(&self, alias: &str) -> Result<()> {
        self.set("Alias", PropValue::Str(alias.to_string()))
    }

    pub fn powered(&self) -> Result<bool> {
        self.flag("Powered")
    }

    /// Turns the adapter on or off
    pub fn set_powered(&self, powered: bool) -> Result<()> {
        self.set("Powered", PropValue::Bool(powered))
    }

    pub fn pairable(&self) -> Result<bool> {
        self.flag("Pairable")
    }

    pub fn set_pairable(&self, pairable: bool) -> Result<()> {
        self.set("Pairable", PropValue::Bool(pairable))
    }

    /// How long the adapter stays pairable; zero means forever.
    pub fn pairable_timeout(&self) -> Result<Duration> {
        self.seconds("PairableTimeout")
    }

    pub fn set_pairable_timeout(&self, timeout: Duration) -> Result<()> {
        self.set("PairableTimeout", to_seconds(timeout))
    }

    pub fn discoverable(&self) -> Result<bool> {
        self.flag("Discoverable")
    }

    pub fn set_discoverable(&self, discoverable: bool) -> Result<()> {
        self.set("Discoverable", PropValue::Bool(discoverable))
    }

    /// How long the adapter stays discoverable; zero means forever.
    pub fn discoverable_timeout(&self) -> Result<Duration> {
        self.seconds("DiscoverableTimeout")
    }

    pub fn set_discoverable_timeout(&self, timeout: Duration) -> Result<()> {
        self.set("DiscoverableTimeout", to_seconds(timeout))
    }

    /// Optional fields this adapter can fill into an advertising packet.
    /// Names the crate does not know are skipped.
    pub fn supported_includes(&self) -> Result<AdvertisingIncludes> {
        let names = self.advertising.supported_includes(&self.path)?;
        Ok(AdvertisingIncludes::from_names(
            names.iter().map(String::as_str),
        ))
    }

    fn get(&self, name: &str) -> Result<PropValue> {
        Ok(self.properties.adapter_property(&self.path, name)?)
    }

    fn set(&self, name: &str, value: PropValue) -> Result<()> {
        self.properties
            .set_adapter_property(&self.path, name, value)?;
        info!("Set {} on {}", name, self.path);
        Ok(())
    }

    fn string(&self, name: &str) -> Result<String> {
        match self.get(name)? {
            PropValue::Str(value) => Ok(value),
            other => Err(wrong_type(name, &other)),
        }
    }

    fn flag(&self, name: &str) -> Result<bool> {
        let value = self.get(name)?;
        value.as_bool().ok_or_else(|| wrong_type(name, &value))
    }

    fn seconds(&self, name: &str) -> Result<Duration> {
        let value = self.get(name)?;
        value
            .as_u32()
            .map(|secs| Duration::from_secs(secs.into()))
            .ok_or_else(|| wrong_type(name, &value))
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Whole seconds, saturating at the largest the daemon accepts.
fn to_seconds(timeout: Duration) -> PropValue {
    PropValue::U32(u32::try_from(timeout.as_secs()).unwrap_or(u32::MAX))
}

fn wrong_type(name: &str, value: &PropValue) -> crate::error::Error {
    BusError::new(
        "org.freedesktop.DBus.Error.InvalidSignature",
        format!("Unexpected value {:?} for {}", value, name),
    )
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusCall, LoopbackBus};
    use crate::error::Error;

    fn path(s: &str) -> ObjectPath {
        ObjectPath::new(s).unwrap()
    }

    fn bus_with_adapters() -> (Arc<LoopbackBus>, BusContext) {
        let bus = Arc::new(LoopbackBus::new());
        bus.add_adapter(&path("/org/bluez/hci1"), "00:11:22:33:44:56", "lab-b");
        bus.add_adapter(&path("/org/bluez/hci0"), "00:11:22:33:44:55", "lab-a");
        let ctx = BusContext::from_bus(bus.clone());
        (bus, ctx)
    }

    #[test]
    fn test_enumerates_adapters() {
        let (_bus, ctx) = bus_with_adapters();

        let all = Adapter::all(&ctx).unwrap();
        let paths: Vec<&str> = all.iter().map(|a| a.path().as_str()).collect();
        assert_eq!(paths, vec!["/org/bluez/hci0", "/org/bluez/hci1"]);

        let first = Adapter::first(&ctx).unwrap();
        assert_eq!(first.path().as_str(), "/org/bluez/hci0");
        assert_eq!(first.address().unwrap(), "00:11:22:33:44:55");
        assert_eq!(first.name().unwrap(), "lab-a");
    }

    #[test]
    fn test_first_without_adapters() {
        let bus = Arc::new(LoopbackBus::new());
        let ctx = BusContext::from_bus(bus);
        assert!(Adapter::all(&ctx).unwrap().is_empty());
        assert!(matches!(
            Adapter::first(&ctx),
            Err(Error::Configuration(ConfigurationError::NoAdapter))
        ));
    }

    #[test]
    fn test_switches_and_timeouts() {
        let (bus, ctx) = bus_with_adapters();
        let adapter = Adapter::first(&ctx).unwrap();

        assert!(!adapter.powered().unwrap());
        adapter.set_powered(true).unwrap();
        assert!(adapter.powered().unwrap());

        adapter.set_pairable(true).unwrap();
        adapter.set_pairable_timeout(Duration::from_secs(60)).unwrap();
        assert!(adapter.pairable().unwrap());
        assert_eq!(adapter.pairable_timeout().unwrap(), Duration::from_secs(60));

        adapter.set_discoverable(true).unwrap();
        adapter.set_discoverable_timeout(Duration::ZERO).unwrap();
        assert!(adapter.discoverable().unwrap());
        assert_eq!(adapter.discoverable_timeout().unwrap(), Duration::ZERO);

        assert_eq!(
            bus.calls().first(),
            Some(&BusCall::SetAdapterProperty {
                adapter: path("/org/bluez/hci0"),
                name: "Powered".to_string(),
            })
        );
    }

    #[test]
    fn test_empty_alias_resets_to_name() {
        let (_bus, ctx) = bus_with_adapters();
        let adapter = Adapter::new(&ctx, path("/org/bluez/hci1"));

        assert_eq!(adapter.alias().unwrap(), "lab-b");
        adapter.set_alias("Kitchen sensor").unwrap();
        assert_eq!(adapter.alias().unwrap(), "Kitchen sensor");
        adapter.set_alias("").unwrap();
        assert_eq!(adapter.alias().unwrap(), "lab-b");
    }

    #[test]
    fn test_supported_includes() {
        let (bus, ctx) = bus_with_adapters();
        let adapter = Adapter::first(&ctx).unwrap();
        assert_eq!(adapter.supported_includes().unwrap(), AdvertisingIncludes::all());

        bus.set_supported_includes(adapter.path(), &["local-name", "rsi"]);
        assert_eq!(
            adapter.supported_includes().unwrap(),
            AdvertisingIncludes::LOCAL_NAME
        );
    }

    #[test]
    fn test_missing_adapter_reports_bus_error() {
        let (_bus, ctx) = bus_with_adapters();
        let missing = Adapter::new(&ctx, path("/org/bluez/hci9"));

        assert!(matches!(
            missing.powered(),
            Err(Error::Bus(ref err)) if err.name == "org.freedesktop.DBus.Error.UnknownObject"
        ));
        assert!(missing.set_powered(true).is_err());
        assert!(missing.supported_includes().is_err());
    }
}
