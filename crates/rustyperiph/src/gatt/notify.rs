//! Per-characteristic subscription state
//!
//! Tracks which remote devices listen to a characteristic, the last value
//! the characteristic exported, and for indications which subscribers still
//! owe an acknowledgement.

use crate::bus::{ChangeKind, DeviceId};
use std::collections::BTreeMap;

/// Whether anyone currently listens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribed,
}

#[derive(Debug, Default, Clone)]
struct Subscriber {
    /// An indication was sent and not yet acknowledged.
    awaiting_ack: bool,
    /// Latest value that arrived while `awaiting_ack`; later values replace it.
    queued: Option<Vec<u8>>,
}

/// Subscriber set plus the last known value of one characteristic
#[derive(Debug, Default)]
pub struct Subscription {
    subscribers: BTreeMap<DeviceId, Subscriber>,
    value: Vec<u8>,
}

impl Subscription {
    pub fn new(initial_value: Vec<u8>) -> Self {
        Self {
            subscribers: BTreeMap::new(),
            value: initial_value,
        }
    }

    pub fn state(&self) -> SubscriptionState {
        if self.subscribers.is_empty() {
            SubscriptionState::Unsubscribed
        } else {
            SubscriptionState::Subscribed
        }
    }

    pub fn is_subscribed(&self, device: &DeviceId) -> bool {
        self.subscribers.contains_key(device)
    }

    pub fn subscribers(&self) -> impl Iterator<Item = &DeviceId> {
        self.subscribers.keys()
    }

    /// Last known value, which also seeds new subscribers.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Vec<u8> {
        &mut self.value
    }

    /// Adds `device` and returns the value it starts from. Subscribing twice
    /// is a no-op.
    pub fn subscribe(&mut self, device: DeviceId) -> Vec<u8> {
        self.subscribers.entry(device).or_default();
        self.value.clone()
    }

    /// Returns true when `device` was subscribed.
    pub fn unsubscribe(&mut self, device: &DeviceId) -> bool {
        self.subscribers.remove(device).is_some()
    }

    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    /// Stores `value` and returns the devices it must be sent to now.
    ///
    /// For indications, subscribers still waiting to acknowledge an earlier
    /// value are skipped and keep only the newest value queued.
    pub fn record_change(&mut self, value: &[u8], kind: ChangeKind) -> Vec<DeviceId> {
        self.value = value.to_vec();

        match kind {
            ChangeKind::Notify => self.subscribers.keys().cloned().collect(),
            ChangeKind::Indicate => {
                let mut recipients = Vec::new();
                for (device, subscriber) in self.subscribers.iter_mut() {
                    if subscriber.awaiting_ack {
                        subscriber.queued = Some(value.to_vec());
                    } else {
                        subscriber.awaiting_ack = true;
                        recipients.push(device.clone());
                    }
                }
                recipients
            }
        }
    }

    /// Records the acknowledgement of `device`. Returns the queued value
    /// that must now be indicated to it, if any.
    pub fn acknowledge(&mut self, device: &DeviceId) -> Option<Vec<u8>> {
        let subscriber = self.subscribers.get_mut(device)?;
        match subscriber.queued.take() {
            Some(value) => Some(value),
            None => {
                subscriber.awaiting_ack = false;
                None
            }
        }
    }
}
