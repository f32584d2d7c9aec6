//! Advertisement time-multiplexing
//!
//! Each adapter has one advertising slot. Requests for a busy adapter queue
//! in submission order and take the slot in turn, each for its own full
//! timeout counted from the moment it actually starts broadcasting.
//! Expired and cancelled requests leave the pool; only their final states
//! are remembered, and only for the most recent few.
//!
//! The multiplexer keeps no timer of its own. The host passes the current
//! [`Instant`] to every operation and calls [`poll`] once
//! [`next_deadline`] has passed.
//!
//! [`poll`]: AdvertisementMultiplexer::poll
//! [`next_deadline`]: AdvertisementMultiplexer::next_deadline

use super::advertisement::{Advertisement, ReleaseCallback};
use crate::bus::{AdvertisingManager, BusContext, ObjectPath, PropertyMap};
use crate::config::PeripheralConfig;
use crate::error::{BusError, ConfigurationError, Error, Result};
use crate::executor::panic_message;
use crate::sync::lock;
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Final states remembered after their requests leave the pool.
const FINISHED_HISTORY: usize = 32;

/// Handle of a submitted advertisement
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AdvertId(usize);

impl AdvertId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for AdvertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "advert{}", self.0)
    }
}

/// Lifecycle of a submitted advertisement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertState {
    /// Waiting for the adapter's slot.
    Pending,
    /// Registered with the daemon and broadcasting.
    Active,
    /// Ran out its timeout, or the daemon released it.
    Expired,
    Cancelled,
}

impl AdvertState {
    pub fn is_finished(&self) -> bool {
        matches!(self, AdvertState::Expired | AdvertState::Cancelled)
    }
}

struct Entry {
    advert: Advertisement,
    adapter: ObjectPath,
    path: ObjectPath,
    /// Pending or Active; finished requests leave `entries`.
    state: AdvertState,
    deadline: Option<Instant>,
}

#[derive(Default)]
struct Slots {
    entries: BTreeMap<AdvertId, Entry>,
    by_path: BTreeMap<ObjectPath, AdvertId>,
    /// Pending requests per adapter, oldest first. Non-empty only while the
    /// adapter has an active advertisement.
    queues: BTreeMap<ObjectPath, VecDeque<AdvertId>>,
    active: BTreeMap<ObjectPath, AdvertId>,
    /// Most recently finished requests, oldest first.
    finished: VecDeque<(AdvertId, AdvertState)>,
    next_id: usize,
}

impl Slots {
    /// Takes `id` out of the pool, remembering it ended in `state`.
    fn finish(&mut self, id: AdvertId, state: AdvertState) -> Option<Entry> {
        let entry = self.entries.remove(&id)?;
        self.by_path.remove(&entry.path);
        if self.finished.len() == FINISHED_HISTORY {
            self.finished.pop_front();
        }
        self.finished.push_back((id, state));
        Some(entry)
    }

    /// True for ids this pool handed out.
    fn issued(&self, id: AdvertId) -> bool {
        id.0 < self.next_id
    }
}

/// Shares each adapter's advertising slot among any number of requests
pub struct AdvertisementMultiplexer {
    manager: Arc<dyn AdvertisingManager>,
    path_prefix: ObjectPath,
    slots: Mutex<Slots>,
}

impl AdvertisementMultiplexer {
    pub fn new(ctx: &BusContext, config: &PeripheralConfig) -> Self {
        Self {
            manager: ctx.advertising.clone(),
            path_prefix: config.advert_path_prefix.clone(),
            slots: Mutex::new(Slots::default()),
        }
    }

    /// Queues `advert` on `adapter`, activating it at once if the adapter
    /// is idle.
    ///
    /// If that immediate activation is refused by the daemon the request is
    /// left Cancelled and the error returned.
    pub fn submit(
        &self,
        advert: Advertisement,
        adapter: &ObjectPath,
        now: Instant,
    ) -> Result<AdvertId> {
        let mut guard = lock(&self.slots);
        let slots = &mut *guard;

        let id = AdvertId(slots.next_id);
        slots.next_id += 1;
        let path = self.path_prefix.numbered(id.0);

        let busy = slots.active.contains_key(adapter);
        if busy {
            debug!("Queued {} behind the active advert on {}", path, adapter);
        }
        slots.by_path.insert(path.clone(), id);
        slots.entries.insert(
            id,
            Entry {
                advert,
                adapter: adapter.clone(),
                path,
                state: AdvertState::Pending,
                deadline: None,
            },
        );

        if busy {
            slots
                .queues
                .entry(adapter.clone())
                .or_default()
                .push_back(id);
        } else {
            self.activate(slots, id, now)?;
        }
        Ok(id)
    }

    /// Expires every active advertisement whose timeout has run out and
    /// promotes the next request on each freed adapter.
    ///
    /// Returns the expired advertisements.
    pub fn poll(&self, now: Instant) -> Vec<AdvertId> {
        let mut expired = Vec::new();
        let mut released = Vec::new();
        {
            let mut guard = lock(&self.slots);
            let slots = &mut *guard;

            let due: Vec<(ObjectPath, AdvertId)> = slots
                .active
                .iter()
                .filter(|(_, id)| {
                    slots
                        .entries
                        .get(*id)
                        .and_then(|entry| entry.deadline)
                        .is_some_and(|deadline| deadline <= now)
                })
                .map(|(adapter, id)| (adapter.clone(), *id))
                .collect();

            for (adapter, id) in due {
                slots.active.remove(&adapter);
                if let Some(entry) = slots.finish(id, AdvertState::Expired) {
                    info!("{} expired on {}", entry.path, adapter);
                    if let Err(err) = self.manager.unregister_advertisement(&adapter, &entry.path) {
                        warn!("Failed to unregister {}: {}", entry.path, err);
                    }
                    released.extend(entry.advert.release_callback());
                }
                expired.push(id);
                self.promote(slots, &adapter, now);
            }
        }

        notify_released(released);
        expired
    }

    /// Withdraws a request in any state. Cancelling the active advertisement
    /// promotes the next request on its adapter straight away.
    ///
    /// Cancelling a finished request does nothing. A failure to unregister
    /// from the daemon is returned after the local state has moved on.
    pub fn cancel(&self, id: AdvertId, now: Instant) -> Result<()> {
        let mut guard = lock(&self.slots);
        let slots = &mut *guard;

        let was_active = match slots.entries.get(&id) {
            Some(entry) => entry.state == AdvertState::Active,
            None if slots.issued(id) => return Ok(()),
            None => return Err(ConfigurationError::UnknownAdvertisement(id.0).into()),
        };
        let Some(entry) = slots.finish(id, AdvertState::Cancelled) else {
            return Ok(());
        };

        if !was_active {
            debug!("Cancelled pending {}", entry.path);
            if let Some(queue) = slots.queues.get_mut(&entry.adapter) {
                queue.retain(|queued| *queued != id);
            }
            return Ok(());
        }

        let result = self
            .manager
            .unregister_advertisement(&entry.adapter, &entry.path);
        info!("Cancelled {} on {}", entry.path, entry.adapter);

        slots.active.remove(&entry.adapter);
        self.promote(slots, &entry.adapter, now);
        result.map_err(Error::from)
    }

    /// Handles the daemon's `Release` of the advertisement at `path`: it
    /// leaves the pool as Expired and the next request takes the slot.
    ///
    /// Returns false if nothing is broadcasting at `path`.
    pub fn release(&self, path: &ObjectPath, now: Instant) -> bool {
        let released = {
            let mut guard = lock(&self.slots);
            let slots = &mut *guard;

            let broadcasting = slots.by_path.get(path).copied().filter(|id| {
                slots
                    .entries
                    .get(id)
                    .is_some_and(|entry| entry.state == AdvertState::Active)
            });
            let Some(entry) = broadcasting.and_then(|id| slots.finish(id, AdvertState::Expired))
            else {
                debug!("Release of {} which is not broadcasting", path);
                return false;
            };

            info!("Daemon released {}", path);
            slots.active.remove(&entry.adapter);
            self.promote(slots, &entry.adapter, now);
            entry.advert.release_callback()
        };

        notify_released(released);
        true
    }

    /// Withdraws every request on every adapter without promoting anything.
    /// Returns the first unregistration failure, if any.
    pub fn cancel_all(&self) -> Result<()> {
        let mut guard = lock(&self.slots);
        let slots = &mut *guard;
        slots.queues.clear();
        slots.active.clear();

        let mut first_err: Option<BusError> = None;
        let ids: Vec<AdvertId> = slots.entries.keys().copied().collect();
        for id in ids {
            let Some(entry) = slots.finish(id, AdvertState::Cancelled) else {
                continue;
            };
            if entry.state != AdvertState::Active {
                continue;
            }
            if let Err(err) = self
                .manager
                .unregister_advertisement(&entry.adapter, &entry.path)
            {
                warn!("Failed to unregister {}: {}", entry.path, err);
                first_err.get_or_insert(err);
            }
        }

        match first_err {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// State of a request. Finished requests are only remembered for a
    /// while; older ones report `None`.
    pub fn state(&self, id: AdvertId) -> Option<AdvertState> {
        let slots = lock(&self.slots);
        match slots.entries.get(&id) {
            Some(entry) => Some(entry.state),
            None => slots
                .finished
                .iter()
                .rev()
                .find(|(finished, _)| *finished == id)
                .map(|(_, state)| *state),
        }
    }

    /// Object path the advertisement is exported on.
    pub fn path(&self, id: AdvertId) -> Option<ObjectPath> {
        lock(&self.slots)
            .issued(id)
            .then(|| self.path_prefix.numbered(id.0))
    }

    /// Exported properties of the pending or active advertisement at `path`,
    /// for the transport to answer property queries with.
    pub fn properties(&self, path: &ObjectPath) -> Option<PropertyMap> {
        let slots = lock(&self.slots);
        slots
            .by_path
            .get(path)
            .and_then(|id| slots.entries.get(id))
            .map(|entry| entry.advert.properties())
    }

    /// Number of requests still pending or active.
    pub fn len(&self) -> usize {
        lock(&self.slots).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The advertisement currently holding `adapter`'s slot.
    pub fn active(&self, adapter: &ObjectPath) -> Option<AdvertId> {
        lock(&self.slots).active.get(adapter).copied()
    }

    /// Requests waiting for `adapter`, in the order they will activate.
    pub fn queued(&self, adapter: &ObjectPath) -> Vec<AdvertId> {
        lock(&self.slots)
            .queues
            .get(adapter)
            .map(|queue| queue.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Earliest moment [`poll`](Self::poll) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let slots = lock(&self.slots);
        slots
            .active
            .values()
            .filter_map(|id| slots.entries.get(id).and_then(|entry| entry.deadline))
            .min()
    }

    fn activate(
        &self,
        slots: &mut Slots,
        id: AdvertId,
        now: Instant,
    ) -> std::result::Result<(), BusError> {
        let Some(entry) = slots.entries.get_mut(&id) else {
            return Ok(());
        };

        let properties = entry.advert.properties();
        if let Err(err) = self
            .manager
            .register_advertisement(&entry.adapter, &entry.path, &properties)
        {
            warn!("Daemon refused {} on {}: {}", entry.path, entry.adapter, err);
            slots.finish(id, AdvertState::Cancelled);
            return Err(err);
        }

        entry.state = AdvertState::Active;
        entry.deadline = entry.advert.deadline_from(now);
        match entry.deadline {
            Some(_) => info!(
                "Advertising {} on {} for {:?}",
                entry.path,
                entry.adapter,
                entry.advert.timeout()
            ),
            None => info!("Advertising {} on {} until cancelled", entry.path, entry.adapter),
        }

        let adapter = entry.adapter.clone();
        slots.active.insert(adapter, id);
        Ok(())
    }

    /// Hands `adapter`'s free slot to the oldest pending request the daemon
    /// accepts.
    fn promote(&self, slots: &mut Slots, adapter: &ObjectPath, now: Instant) {
        while let Some(id) = slots.queues.get_mut(adapter).and_then(VecDeque::pop_front) {
            if self.activate(slots, id, now).is_ok() {
                return;
            }
        }
        slots.queues.remove(adapter);
        debug!("No adverts left on {}", adapter);
    }
}

impl fmt::Debug for AdvertisementMultiplexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvertisementMultiplexer")
            .field("path_prefix", &self.path_prefix)
            .finish_non_exhaustive()
    }
}

fn notify_released(callbacks: impl IntoIterator<Item = ReleaseCallback>) {
    for callback in callbacks {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback())) {
            error!(
                "Advertisement release callback panicked: {}",
                panic_message(payload.as_ref())
            );
        }
    }
}
