//! In-process daemon stand-in
//!
//! Plays every collaborator role, records each call and emitted change, and
//! can be told to fail the next call. Used by the test suite and the demos.

use super::types::{ManagedObjects, ObjectPath, PropValue, PropertyMap, ValueChanged};
use super::{AdapterManager, AdvertisingManager, AgentManager, GattManager, SignalSink};
use crate::error::BusError;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A recorded collaborator call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusCall {
    SetAdapterProperty { adapter: ObjectPath, name: String },
    RegisterApplication { adapter: ObjectPath, root: ObjectPath },
    UnregisterApplication { adapter: ObjectPath, root: ObjectPath },
    RegisterAdvertisement { adapter: ObjectPath, path: ObjectPath },
    UnregisterAdvertisement { adapter: ObjectPath, path: ObjectPath },
    RegisterAgent { path: ObjectPath, capability: String },
    RequestDefaultAgent { path: ObjectPath },
    UnregisterAgent { path: ObjectPath },
}

#[derive(Default)]
struct LoopbackState {
    calls: Vec<BusCall>,
    events: Vec<ValueChanged>,
    adapters: BTreeMap<ObjectPath, PropertyMap>,
    supported_includes: BTreeMap<ObjectPath, Vec<String>>,
    applications: BTreeMap<ObjectPath, ManagedObjects>,
    adverts: BTreeMap<ObjectPath, (ObjectPath, PropertyMap)>,
    /// Scripted outcomes of upcoming calls; `None` lets a call through.
    failures: VecDeque<Option<BusError>>,
}

/// Recording in-process implementation of every daemon collaborator
#[derive(Default)]
pub struct LoopbackBus {
    state: Mutex<LoopbackState>,
}

impl LoopbackBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a powered-off adapter that can include every optional
    /// advertising field.
    pub fn add_adapter(&self, path: &ObjectPath, address: &str, name: &str) {
        let props: PropertyMap = [
            ("Address", PropValue::Str(address.to_string())),
            ("Name", PropValue::Str(name.to_string())),
            ("Alias", PropValue::Str(name.to_string())),
            ("Powered", PropValue::Bool(false)),
            ("Pairable", PropValue::Bool(false)),
            ("PairableTimeout", PropValue::U32(0)),
            ("Discoverable", PropValue::Bool(false)),
            ("DiscoverableTimeout", PropValue::U32(180)),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();

        let mut state = self.state();
        state.adapters.insert(path.clone(), props);
        state.supported_includes.insert(
            path.clone(),
            vec![
                "tx-power".to_string(),
                "appearance".to_string(),
                "local-name".to_string(),
            ],
        );
    }

    /// Replaces the optional advertising fields `adapter` reports.
    pub fn set_supported_includes(&self, adapter: &ObjectPath, names: &[&str]) {
        self.state().supported_includes.insert(
            adapter.clone(),
            names.iter().map(|name| name.to_string()).collect(),
        );
    }

    /// Makes the next collaborator call fail with `err`.
    pub fn fail_next_call(&self, err: BusError) {
        self.fail_call_after(0, err);
    }

    /// Lets `skip` calls through, then fails the one after with `err`.
    pub fn fail_call_after(&self, skip: usize, err: BusError) {
        let mut state = self.state();
        state.failures.extend(std::iter::repeat_with(|| None).take(skip));
        state.failures.push_back(Some(err));
    }

    pub fn calls(&self) -> Vec<BusCall> {
        self.state().calls.clone()
    }

    pub fn events(&self) -> Vec<ValueChanged> {
        self.state().events.clone()
    }

    /// Returns and clears the recorded change events.
    pub fn take_events(&self) -> Vec<ValueChanged> {
        std::mem::take(&mut self.state().events)
    }

    /// Snapshot handed over when the application at `root` was registered.
    pub fn application(&self, root: &ObjectPath) -> Option<ManagedObjects> {
        self.state().applications.get(root).cloned()
    }

    /// Paths of the advertisements currently registered on `adapter`.
    pub fn active_adverts(&self, adapter: &ObjectPath) -> Vec<ObjectPath> {
        self.state()
            .adverts
            .iter()
            .filter(|(_, (a, _))| a == adapter)
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub fn advert_properties(&self, path: &ObjectPath) -> Option<PropertyMap> {
        self.state().adverts.get(path).map(|(_, props)| props.clone())
    }

    fn record(&self, call: BusCall) -> Result<(), BusError> {
        self.scripted_failure()?;
        self.state().calls.push(call);
        Ok(())
    }

    /// Consumes the scripted outcome of a call that is not recorded.
    fn scripted_failure(&self) -> Result<(), BusError> {
        match self.state().failures.pop_front() {
            Some(Some(err)) => Err(err),
            _ => Ok(()),
        }
    }
}

fn unknown_adapter(adapter: &ObjectPath) -> BusError {
    BusError::new(
        "org.freedesktop.DBus.Error.UnknownObject",
        format!("No adapter at {}", adapter),
    )
}

fn invalid_property(message: String) -> BusError {
    BusError::new("org.freedesktop.DBus.Error.InvalidArgs", message)
}

impl AdapterManager for LoopbackBus {
    fn adapters(&self) -> Result<Vec<ObjectPath>, BusError> {
        self.scripted_failure()?;
        Ok(self.state().adapters.keys().cloned().collect())
    }

    fn adapter_property(&self, adapter: &ObjectPath, name: &str) -> Result<PropValue, BusError> {
        self.scripted_failure()?;
        let state = self.state();
        let props = state
            .adapters
            .get(adapter)
            .ok_or_else(|| unknown_adapter(adapter))?;
        props
            .get(name)
            .cloned()
            .ok_or_else(|| invalid_property(format!("No such property {}", name)))
    }

    fn set_adapter_property(
        &self,
        adapter: &ObjectPath,
        name: &str,
        value: PropValue,
    ) -> Result<(), BusError> {
        {
            let state = self.state();
            let props = state
                .adapters
                .get(adapter)
                .ok_or_else(|| unknown_adapter(adapter))?;
            match props.get(name) {
                None => return Err(invalid_property(format!("No such property {}", name))),
                Some(_) if name == "Address" || name == "Name" => {
                    return Err(invalid_property(format!("Property {} is read-only", name)))
                }
                Some(current) if std::mem::discriminant(current) != std::mem::discriminant(&value) => {
                    return Err(invalid_property(format!("Wrong type for {}", name)))
                }
                Some(_) => {}
            }
        }

        self.record(BusCall::SetAdapterProperty {
            adapter: adapter.clone(),
            name: name.to_string(),
        })?;

        let mut state = self.state();
        let Some(props) = state.adapters.get_mut(adapter) else {
            return Err(unknown_adapter(adapter));
        };
        // An empty alias falls back to the adapter's name.
        let value = match (name, value) {
            ("Alias", PropValue::Str(alias)) if alias.is_empty() => {
                props.get("Name").cloned().unwrap_or(PropValue::Str(alias))
            }
            (_, value) => value,
        };
        props.insert(name.to_string(), value);
        Ok(())
    }
}

impl GattManager for LoopbackBus {
    fn register_application(
        &self,
        adapter: &ObjectPath,
        root: &ObjectPath,
        objects: &ManagedObjects,
    ) -> Result<(), BusError> {
        self.record(BusCall::RegisterApplication {
            adapter: adapter.clone(),
            root: root.clone(),
        })?;
        self.state()
            .applications
            .insert(root.clone(), objects.clone());
        Ok(())
    }

    fn unregister_application(
        &self,
        adapter: &ObjectPath,
        root: &ObjectPath,
    ) -> Result<(), BusError> {
        self.record(BusCall::UnregisterApplication {
            adapter: adapter.clone(),
            root: root.clone(),
        })?;
        self.state().applications.remove(root);
        Ok(())
    }
}

impl AdvertisingManager for LoopbackBus {
    fn register_advertisement(
        &self,
        adapter: &ObjectPath,
        path: &ObjectPath,
        properties: &PropertyMap,
    ) -> Result<(), BusError> {
        self.record(BusCall::RegisterAdvertisement {
            adapter: adapter.clone(),
            path: path.clone(),
        })?;
        self.state()
            .adverts
            .insert(path.clone(), (adapter.clone(), properties.clone()));
        Ok(())
    }

    fn unregister_advertisement(
        &self,
        adapter: &ObjectPath,
        path: &ObjectPath,
    ) -> Result<(), BusError> {
        self.record(BusCall::UnregisterAdvertisement {
            adapter: adapter.clone(),
            path: path.clone(),
        })?;
        self.state().adverts.remove(path);
        Ok(())
    }

    fn supported_includes(&self, adapter: &ObjectPath) -> Result<Vec<String>, BusError> {
        self.scripted_failure()?;
        self.state()
            .supported_includes
            .get(adapter)
            .cloned()
            .ok_or_else(|| unknown_adapter(adapter))
    }
}

impl AgentManager for LoopbackBus {
    fn register_agent(&self, path: &ObjectPath, capability: &str) -> Result<(), BusError> {
        self.record(BusCall::RegisterAgent {
            path: path.clone(),
            capability: capability.to_string(),
        })
    }

    fn request_default_agent(&self, path: &ObjectPath) -> Result<(), BusError> {
        self.record(BusCall::RequestDefaultAgent { path: path.clone() })
    }

    fn unregister_agent(&self, path: &ObjectPath) -> Result<(), BusError> {
        self.record(BusCall::UnregisterAgent { path: path.clone() })
    }
}

impl SignalSink for LoopbackBus {
    fn value_changed(&self, event: ValueChanged) {
        self.state().events.push(event);
    }
}
