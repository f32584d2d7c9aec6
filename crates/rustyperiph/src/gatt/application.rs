//! The attribute tree and its registration lifecycle
//!
//! A [`GattApplication`] owns services, their characteristics and the
//! descriptors of those characteristics. Children refer to their parent by
//! id, so the tree can be walked in both directions without shared
//! ownership. While registered the tree is frozen: object paths are
//! assigned, an index from path to attribute is built, and every structural
//! mutation is refused.

use super::attribute::{
    AttributeId, Characteristic, CharacteristicId, Descriptor, DescriptorId, Getter, Service,
    ServiceId, Setter,
};
use super::notify::{Subscription, SubscriptionState};
use crate::bus::{
    BusContext, ChangeKind, DeviceId, ManagedObjects, ObjectPath, PropValue, PropertyMap,
    SignalSink, ValueChanged, GATT_CHARACTERISTIC_INTERFACE, GATT_DESCRIPTOR_INTERFACE,
    GATT_SERVICE_INTERFACE,
};
use crate::config::PeripheralConfig;
use crate::error::{AccessError, ConfigurationError, Error, Result};
use crate::executor::ExecutorHandle;
use crate::flags::{AttributeFlags, AttributeKind};
use crate::sync::{lock, read, write};
use crate::uuid::Uuid;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, ThreadId};

struct ServiceNode {
    uuid: Uuid,
    primary: bool,
    includes: Vec<ServiceId>,
    characteristics: Vec<CharacteristicId>,
    path: Option<ObjectPath>,
}

struct CharacteristicNode {
    uuid: Uuid,
    flags: AttributeFlags,
    getter: Option<Getter>,
    setter: Option<Setter>,
    service: ServiceId,
    descriptors: Vec<DescriptorId>,
    subscription: Arc<Mutex<Subscription>>,
    path: Option<ObjectPath>,
}

struct DescriptorNode {
    uuid: Uuid,
    flags: AttributeFlags,
    getter: Option<Getter>,
    setter: Option<Setter>,
    characteristic: CharacteristicId,
    value: Arc<Mutex<Vec<u8>>>,
    path: Option<ObjectPath>,
}

struct Registration {
    adapter: ObjectPath,
    root: ObjectPath,
    index: HashMap<ObjectPath, AttributeId>,
    signals: Arc<dyn SignalSink>,
    context: ThreadId,
}

/// Arena of attribute nodes. Removed nodes leave a `None` slot so ids stay
/// stable.
#[derive(Default)]
struct Tree {
    services: Vec<Option<ServiceNode>>,
    characteristics: Vec<Option<CharacteristicNode>>,
    descriptors: Vec<Option<DescriptorNode>>,
    registration: Option<Registration>,
}

/// Cached value backing an attribute's exported `Value` property.
#[derive(Clone)]
pub(crate) enum ValueCache {
    Characteristic(Arc<Mutex<Subscription>>),
    Descriptor(Arc<Mutex<Vec<u8>>>),
}

impl ValueCache {
    pub(crate) fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Vec<u8>),
    {
        match self {
            ValueCache::Characteristic(sub) => f(lock(sub).value_mut()),
            ValueCache::Descriptor(value) => f(&mut lock(value)),
        }
    }
}

/// Everything the dispatcher needs to serve one request, detached from the
/// tree lock so callbacks may call back into the application.
#[derive(Clone)]
pub(crate) struct AccessTarget {
    pub(crate) kind: AttributeKind,
    pub(crate) flags: AttributeFlags,
    pub(crate) getter: Option<Getter>,
    pub(crate) setter: Option<Setter>,
    pub(crate) cache: ValueCache,
    pub(crate) characteristic: Option<CharacteristicId>,
}

impl Tree {
    fn ensure_unregistered(&self) -> std::result::Result<(), ConfigurationError> {
        if self.registration.is_some() {
            Err(ConfigurationError::ModifiedWhileRegistered)
        } else {
            Ok(())
        }
    }

    fn service(&self, id: ServiceId) -> Option<&ServiceNode> {
        self.services.get(id.0).and_then(Option::as_ref)
    }

    fn characteristic(&self, id: CharacteristicId) -> Option<&CharacteristicNode> {
        self.characteristics.get(id.0).and_then(Option::as_ref)
    }

    fn descriptor(&self, id: DescriptorId) -> Option<&DescriptorNode> {
        self.descriptors.get(id.0).and_then(Option::as_ref)
    }

    fn live_services(&self) -> impl Iterator<Item = (ServiceId, &ServiceNode)> {
        self.services
            .iter()
            .enumerate()
            .filter_map(|(i, node)| node.as_ref().map(|n| (ServiceId(i), n)))
    }

    fn path_of(&self, id: AttributeId) -> Option<&ObjectPath> {
        match id {
            AttributeId::Service(id) => self.service(id)?.path.as_ref(),
            AttributeId::Characteristic(id) => self.characteristic(id)?.path.as_ref(),
            AttributeId::Descriptor(id) => self.descriptor(id)?.path.as_ref(),
        }
    }

    /// Assigns `root/service{i}/char{j}/desc{k}` by sibling order and
    /// returns the path index.
    fn assign_paths(&mut self, root: &ObjectPath) -> HashMap<ObjectPath, AttributeId> {
        let mut index = HashMap::new();
        let service_ids: Vec<ServiceId> = self.live_services().map(|(id, _)| id).collect();

        for (i, service_id) in service_ids.into_iter().enumerate() {
            let service_path = root.child(&format!("service{}", i));
            let characteristics = match self.services[service_id.0].as_mut() {
                Some(service) => {
                    service.path = Some(service_path.clone());
                    service.characteristics.clone()
                }
                None => continue,
            };
            index.insert(service_path.clone(), AttributeId::Service(service_id));

            for (j, char_id) in characteristics.into_iter().enumerate() {
                let char_path = service_path.child(&format!("char{}", j));
                let descriptors = match self.characteristics[char_id.0].as_mut() {
                    Some(characteristic) => {
                        characteristic.path = Some(char_path.clone());
                        characteristic.descriptors.clone()
                    }
                    None => continue,
                };
                index.insert(char_path.clone(), AttributeId::Characteristic(char_id));

                for (k, desc_id) in descriptors.into_iter().enumerate() {
                    let desc_path = char_path.child(&format!("desc{}", k));
                    if let Some(descriptor) = self.descriptors[desc_id.0].as_mut() {
                        descriptor.path = Some(desc_path.clone());
                        index.insert(desc_path, AttributeId::Descriptor(desc_id));
                    }
                }
            }
        }

        index
    }

    fn release_paths(&mut self) {
        for service in self.services.iter_mut().flatten() {
            service.path = None;
        }
        for characteristic in self.characteristics.iter_mut().flatten() {
            characteristic.path = None;
            lock(&characteristic.subscription).clear();
        }
        for descriptor in self.descriptors.iter_mut().flatten() {
            descriptor.path = None;
        }
    }

    fn snapshot(&self) -> ManagedObjects {
        let mut objects = ManagedObjects::new();
        if self.registration.is_none() {
            return objects;
        }

        for (_, service) in self.live_services() {
            let Some(path) = service.path.clone() else {
                continue;
            };
            let includes = service
                .includes
                .iter()
                .filter_map(|id| self.service(*id).and_then(|s| s.path.clone()))
                .collect();

            let mut props = PropertyMap::new();
            props.insert("UUID".into(), PropValue::Str(service.uuid.to_string()));
            props.insert("Primary".into(), PropValue::Bool(service.primary));
            props.insert("Includes".into(), PropValue::PathList(includes));
            objects
                .entry(path.clone())
                .or_default()
                .insert(GATT_SERVICE_INTERFACE.into(), props);

            for char_id in &service.characteristics {
                let Some(characteristic) = self.characteristic(*char_id) else {
                    continue;
                };
                let Some(char_path) = characteristic.path.clone() else {
                    continue;
                };
                let (value, notifying) = {
                    let sub = lock(&characteristic.subscription);
                    (sub.value().to_vec(), sub.state() == SubscriptionState::Subscribed)
                };

                let mut props = PropertyMap::new();
                props.insert("UUID".into(), PropValue::Str(characteristic.uuid.to_string()));
                props.insert("Service".into(), PropValue::Path(path.clone()));
                props.insert(
                    "Flags".into(),
                    PropValue::StrList(characteristic.flags.to_names()),
                );
                props.insert("Value".into(), PropValue::Bytes(value));
                props.insert("Notifying".into(), PropValue::Bool(notifying));
                objects
                    .entry(char_path.clone())
                    .or_default()
                    .insert(GATT_CHARACTERISTIC_INTERFACE.into(), props);

                for desc_id in &characteristic.descriptors {
                    let Some(descriptor) = self.descriptor(*desc_id) else {
                        continue;
                    };
                    let Some(desc_path) = descriptor.path.clone() else {
                        continue;
                    };

                    let mut props = PropertyMap::new();
                    props.insert("UUID".into(), PropValue::Str(descriptor.uuid.to_string()));
                    props.insert("Characteristic".into(), PropValue::Path(char_path.clone()));
                    props.insert("Flags".into(), PropValue::StrList(descriptor.flags.to_names()));
                    props.insert(
                        "Value".into(),
                        PropValue::Bytes(lock(&descriptor.value).clone()),
                    );
                    objects
                        .entry(desc_path)
                        .or_default()
                        .insert(GATT_DESCRIPTOR_INTERFACE.into(), props);
                }
            }
        }

        objects
    }
}

fn check_attribute(
    kind: AttributeKind,
    uuid: Uuid,
    flags: AttributeFlags,
    getter: bool,
    setter: bool,
) -> std::result::Result<(), ConfigurationError> {
    if uuid.is_reserved() {
        return Err(ConfigurationError::ReservedUuid(uuid));
    }
    if !flags.is_valid_for(kind) {
        return Err(ConfigurationError::InvalidFlags { kind, flags });
    }
    if getter && !flags.can_read() {
        return Err(ConfigurationError::GetterWithoutRead(flags));
    }
    if setter && !flags.can_write() {
        return Err(ConfigurationError::SetterWithoutWrite(flags));
    }
    Ok(())
}

/// Delivery mode for a notifiable characteristic. Notify wins when both are
/// declared.
fn change_kind(flags: AttributeFlags) -> Option<ChangeKind> {
    if flags.contains(AttributeFlags::NOTIFY) {
        Some(ChangeKind::Notify)
    } else if flags.contains(AttributeFlags::INDICATE) {
        Some(ChangeKind::Indicate)
    } else {
        None
    }
}

/// A GATT application: a tree of services exported to the daemon as one unit
pub struct GattApplication {
    config: PeripheralConfig,
    tree: RwLock<Tree>,
}

impl GattApplication {
    pub fn new(config: PeripheralConfig) -> Self {
        Self {
            config,
            tree: RwLock::new(Tree::default()),
        }
    }

    pub fn config(&self) -> &PeripheralConfig {
        &self.config
    }

    pub fn is_registered(&self) -> bool {
        read(&self.tree).registration.is_some()
    }

    /// Adds a service. Included services must already be part of this
    /// application.
    pub fn add_service(&self, service: Service) -> std::result::Result<ServiceId, ConfigurationError> {
        let mut tree = write(&self.tree);
        tree.ensure_unregistered()?;

        if service.uuid.is_reserved() {
            return Err(ConfigurationError::ReservedUuid(service.uuid));
        }
        if let Some(missing) = service.includes.iter().find(|id| tree.service(**id).is_none()) {
            return Err(ConfigurationError::UnknownService(missing.0));
        }

        let id = ServiceId(tree.services.len());
        debug!("Adding service {} as {:?}", service.uuid, id);
        tree.services.push(Some(ServiceNode {
            uuid: service.uuid,
            primary: service.primary,
            includes: service.includes,
            characteristics: Vec::new(),
            path: None,
        }));
        Ok(id)
    }

    pub fn add_characteristic(
        &self,
        service: ServiceId,
        characteristic: Characteristic,
    ) -> std::result::Result<CharacteristicId, ConfigurationError> {
        let mut tree = write(&self.tree);
        tree.ensure_unregistered()?;

        if tree.service(service).is_none() {
            return Err(ConfigurationError::UnknownService(service.0));
        }
        check_attribute(
            AttributeKind::Characteristic,
            characteristic.uuid,
            characteristic.flags,
            characteristic.getter.is_some(),
            characteristic.setter.is_some(),
        )?;

        let id = CharacteristicId(tree.characteristics.len());
        debug!(
            "Adding characteristic {} to {:?} as {:?}",
            characteristic.uuid, service, id
        );
        tree.characteristics.push(Some(CharacteristicNode {
            uuid: characteristic.uuid,
            flags: characteristic.flags,
            getter: characteristic.getter,
            setter: characteristic.setter,
            service,
            descriptors: Vec::new(),
            subscription: Arc::new(Mutex::new(Subscription::new(
                characteristic.initial_value,
            ))),
            path: None,
        }));
        if let Some(parent) = tree.services[service.0].as_mut() {
            parent.characteristics.push(id);
        }
        Ok(id)
    }

    pub fn add_descriptor(
        &self,
        characteristic: CharacteristicId,
        descriptor: Descriptor,
    ) -> std::result::Result<DescriptorId, ConfigurationError> {
        let mut tree = write(&self.tree);
        tree.ensure_unregistered()?;

        if tree.characteristic(characteristic).is_none() {
            return Err(ConfigurationError::UnknownCharacteristic(characteristic.0));
        }
        check_attribute(
            AttributeKind::Descriptor,
            descriptor.uuid,
            descriptor.flags,
            descriptor.getter.is_some(),
            descriptor.setter.is_some(),
        )?;

        let id = DescriptorId(tree.descriptors.len());
        debug!(
            "Adding descriptor {} to {:?} as {:?}",
            descriptor.uuid, characteristic, id
        );
        tree.descriptors.push(Some(DescriptorNode {
            uuid: descriptor.uuid,
            flags: descriptor.flags,
            getter: descriptor.getter,
            setter: descriptor.setter,
            characteristic,
            value: Arc::new(Mutex::new(descriptor.initial_value)),
            path: None,
        }));
        if let Some(parent) = tree.characteristics[characteristic.0].as_mut() {
            parent.descriptors.push(id);
        }
        Ok(id)
    }

    /// Removes a service with all its characteristics and descriptors.
    pub fn remove_service(&self, id: ServiceId) -> std::result::Result<(), ConfigurationError> {
        let mut tree = write(&self.tree);
        tree.ensure_unregistered()?;

        let node = tree
            .services
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(ConfigurationError::UnknownService(id.0))?;

        for char_id in node.characteristics {
            if let Some(characteristic) = tree.characteristics[char_id.0].take() {
                for desc_id in characteristic.descriptors {
                    tree.descriptors[desc_id.0] = None;
                }
            }
        }
        for service in tree.services.iter_mut().flatten() {
            service.includes.retain(|included| *included != id);
        }
        debug!("Removed {:?}", id);
        Ok(())
    }

    pub fn remove_characteristic(
        &self,
        id: CharacteristicId,
    ) -> std::result::Result<(), ConfigurationError> {
        let mut tree = write(&self.tree);
        tree.ensure_unregistered()?;

        let node = tree
            .characteristics
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(ConfigurationError::UnknownCharacteristic(id.0))?;

        for desc_id in &node.descriptors {
            tree.descriptors[desc_id.0] = None;
        }
        if let Some(service) = tree.services[node.service.0].as_mut() {
            service.characteristics.retain(|c| *c != id);
        }
        debug!("Removed {:?}", id);
        Ok(())
    }

    pub fn remove_descriptor(&self, id: DescriptorId) -> std::result::Result<(), ConfigurationError> {
        let mut tree = write(&self.tree);
        tree.ensure_unregistered()?;

        let node = tree
            .descriptors
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(ConfigurationError::UnknownDescriptor(id.0))?;

        if let Some(characteristic) = tree.characteristics[node.characteristic.0].as_mut() {
            characteristic.descriptors.retain(|d| *d != id);
        }
        debug!("Removed {:?}", id);
        Ok(())
    }

    /// Service that owns `id`.
    pub fn service_of(&self, id: CharacteristicId) -> Option<ServiceId> {
        read(&self.tree).characteristic(id).map(|c| c.service)
    }

    /// Characteristic that owns `id`.
    pub fn characteristic_of(&self, id: DescriptorId) -> Option<CharacteristicId> {
        read(&self.tree).descriptor(id).map(|d| d.characteristic)
    }

    /// Object path of an attribute; only assigned while registered.
    pub fn path_of(&self, id: AttributeId) -> Option<ObjectPath> {
        read(&self.tree).path_of(id).cloned()
    }

    /// Attribute exported at `path`, if registered.
    pub fn resolve(&self, path: &ObjectPath) -> Option<AttributeId> {
        read(&self.tree)
            .registration
            .as_ref()
            .and_then(|reg| reg.index.get(path).copied())
    }

    /// Exports the tree to the daemon.
    ///
    /// Paths are assigned before the daemon is called, since it enumerates
    /// the tree while the call is outstanding. If the daemon refuses, the
    /// tree is returned to its unregistered state.
    pub fn register(&self, ctx: &BusContext) -> Result<ManagedObjects> {
        let (adapter, root, objects) = {
            let mut tree = write(&self.tree);
            if tree.registration.is_some() {
                return Err(ConfigurationError::AlreadyRegistered.into());
            }

            let adapter = self.config.adapter.clone();
            let root = self.config.root_path.clone();
            let index = tree.assign_paths(&root);
            tree.registration = Some(Registration {
                adapter: adapter.clone(),
                root: root.clone(),
                index,
                signals: ctx.signals.clone(),
                context: thread::current().id(),
            });
            (adapter, root, tree.snapshot())
        };

        if let Err(err) = ctx.gatt.register_application(&adapter, &root, &objects) {
            warn!("Registering application {} failed: {}", root, err);
            let mut tree = write(&self.tree);
            tree.registration = None;
            tree.release_paths();
            return Err(Error::Bus(err));
        }

        info!(
            "Registered GATT application {} on {} ({} objects)",
            root,
            adapter,
            objects.len()
        );
        Ok(objects)
    }

    /// Withdraws the tree from the daemon. Subscriptions are dropped and
    /// paths released even if the daemon reports an error.
    pub fn unregister(&self, ctx: &BusContext) -> Result<()> {
        let registration = {
            let mut tree = write(&self.tree);
            let registration = tree
                .registration
                .take()
                .ok_or(ConfigurationError::NotRegistered)?;
            tree.release_paths();
            registration
        };

        ctx.gatt
            .unregister_application(&registration.adapter, &registration.root)
            .map_err(|err| {
                warn!(
                    "Unregistering application {} failed: {}",
                    registration.root, err
                );
                Error::Bus(err)
            })?;

        info!("Unregistered GATT application {}", registration.root);
        Ok(())
    }

    /// Current exported snapshot; empty while unregistered.
    pub fn managed_objects(&self) -> ManagedObjects {
        read(&self.tree).snapshot()
    }

    /// Last value exported by a characteristic.
    pub fn value(&self, id: CharacteristicId) -> Option<Vec<u8>> {
        read(&self.tree)
            .characteristic(id)
            .map(|c| lock(&c.subscription).value().to_vec())
    }

    pub fn subscription_state(&self, id: CharacteristicId) -> Option<SubscriptionState> {
        read(&self.tree)
            .characteristic(id)
            .map(|c| lock(&c.subscription).state())
    }

    /// Starts sending value changes of `id` to `device`. Returns the value
    /// the subscriber starts from.
    pub fn subscribe(
        &self,
        id: CharacteristicId,
        device: DeviceId,
    ) -> std::result::Result<Vec<u8>, AccessError> {
        let tree = read(&self.tree);
        let characteristic = tree
            .characteristic(id)
            .ok_or_else(|| AccessError::Failed(format!("unknown characteristic {}", id.0)))?;
        if !characteristic.flags.can_subscribe() {
            return Err(AccessError::NotSupported);
        }

        debug!("{} subscribed to {}", device, characteristic.uuid);
        let seed = lock(&characteristic.subscription).subscribe(device);
        Ok(seed)
    }

    pub fn unsubscribe(
        &self,
        id: CharacteristicId,
        device: &DeviceId,
    ) -> std::result::Result<(), AccessError> {
        let tree = read(&self.tree);
        let characteristic = tree
            .characteristic(id)
            .ok_or_else(|| AccessError::Failed(format!("unknown characteristic {}", id.0)))?;
        if !characteristic.flags.can_subscribe() {
            return Err(AccessError::NotSupported);
        }

        if lock(&characteristic.subscription).unsubscribe(device) {
            debug!("{} unsubscribed from {}", device, characteristic.uuid);
        }
        Ok(())
    }

    /// Drops `device` from every subscription.
    pub fn device_disconnected(&self, device: &DeviceId) {
        let tree = read(&self.tree);
        for characteristic in tree.characteristics.iter().flatten() {
            lock(&characteristic.subscription).unsubscribe(device);
        }
    }

    /// Publishes a new value of a notifiable characteristic.
    ///
    /// The cached value is always updated. While registered, subscribers are
    /// sent the value, and the call must come from the context that
    /// registered the application; use [`schedule_changed`] from anywhere
    /// else.
    ///
    /// [`schedule_changed`]: GattApplication::schedule_changed
    pub fn changed(
        &self,
        id: CharacteristicId,
        value: &[u8],
    ) -> std::result::Result<(), ConfigurationError> {
        let tree = read(&self.tree);
        let characteristic = tree
            .characteristic(id)
            .ok_or(ConfigurationError::UnknownCharacteristic(id.0))?;
        let kind = change_kind(characteristic.flags)
            .ok_or(ConfigurationError::NotNotifiable(characteristic.uuid))?;

        let Some(registration) = tree.registration.as_ref() else {
            *lock(&characteristic.subscription).value_mut() = value.to_vec();
            return Ok(());
        };
        if registration.context != thread::current().id() {
            return Err(ConfigurationError::WrongContext);
        }

        let recipients = lock(&characteristic.subscription).record_change(value, kind);
        if recipients.is_empty() {
            return Ok(());
        }
        let Some(path) = characteristic.path.clone() else {
            return Ok(());
        };
        let signals = registration.signals.clone();
        drop(tree);

        signals.value_changed(ValueChanged {
            path,
            value: value.to_vec(),
            kind,
            recipients,
        });
        Ok(())
    }

    /// Hands a value change to the executor, for producers running on any
    /// other thread.
    pub fn schedule_changed(
        self: &Arc<Self>,
        executor: &ExecutorHandle,
        id: CharacteristicId,
        value: Vec<u8>,
    ) -> Result<()> {
        let app = Arc::clone(self);
        executor.submit(move || {
            if let Err(err) = app.changed(id, &value) {
                warn!("Scheduled change of {:?} failed: {}", id, err);
            }
        })
    }

    /// Records that `device` acknowledged an indication of `id`, sending it
    /// the value queued meanwhile, if any.
    pub fn acknowledge(
        &self,
        id: CharacteristicId,
        device: &DeviceId,
    ) -> std::result::Result<(), AccessError> {
        let tree = read(&self.tree);
        let characteristic = tree
            .characteristic(id)
            .ok_or_else(|| AccessError::Failed(format!("unknown characteristic {}", id.0)))?;

        let Some(queued) = lock(&characteristic.subscription).acknowledge(device) else {
            return Ok(());
        };
        let (Some(path), Some(registration)) =
            (characteristic.path.clone(), tree.registration.as_ref())
        else {
            return Ok(());
        };
        let signals = registration.signals.clone();
        drop(tree);

        signals.value_changed(ValueChanged {
            path,
            value: queued,
            kind: ChangeKind::Indicate,
            recipients: vec![device.clone()],
        });
        Ok(())
    }

    pub(crate) fn access_target(&self, path: &ObjectPath) -> Option<AccessTarget> {
        let tree = read(&self.tree);
        let id = *tree.registration.as_ref()?.index.get(path)?;

        match id {
            AttributeId::Service(_) => None,
            AttributeId::Characteristic(id) => {
                let node = tree.characteristic(id)?;
                Some(AccessTarget {
                    kind: AttributeKind::Characteristic,
                    flags: node.flags,
                    getter: node.getter.clone(),
                    setter: node.setter.clone(),
                    cache: ValueCache::Characteristic(node.subscription.clone()),
                    characteristic: Some(id),
                })
            }
            AttributeId::Descriptor(id) => {
                let node = tree.descriptor(id)?;
                Some(AccessTarget {
                    kind: AttributeKind::Descriptor,
                    flags: node.flags,
                    getter: node.getter.clone(),
                    setter: node.setter.clone(),
                    cache: ValueCache::Descriptor(node.value.clone()),
                    characteristic: None,
                })
            }
        }
    }
}

impl Default for GattApplication {
    fn default() -> Self {
        Self::new(PeripheralConfig::default())
    }
}
