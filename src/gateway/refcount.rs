//! Reference-counted upstream channel subscriptions.
//!
//! Each channel gets a slot behind its own [`tokio::sync::Mutex`]. The
//! slot lock is held across the upstream subscribe/unsubscribe call, so
//! acquires and releases on one channel are serialized while different
//! channels proceed independently.
//!
//! A slot leaves the map when its count returns to zero (or its first
//! subscribe fails) and is marked `retired`; a caller that was queued on a
//! retired slot starts over with a fresh one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::NotificationFanout;
use crate::bus::{BusError, MessageHandler, NotificationBus};

#[derive(Debug, Default)]
struct ChannelSlot {
    refcount: usize,
    handler: Option<MessageHandler>,
    retired: bool,
}

type Slot = Arc<tokio::sync::Mutex<ChannelSlot>>;

/// A slot an `acquire` has inserted or joined. If the acquire is dropped
/// before the slot counts a reference, the empty slot is retired.
struct SlotClaim<'a> {
    counter: &'a SubscriptionRefCounter,
    channel: &'a str,
    slot: Slot,
}

impl Drop for SlotClaim<'_> {
    fn drop(&mut self) {
        // A held lock means another caller owns the slot and settles it.
        if let Ok(mut entry) = self.slot.try_lock() {
            if !entry.retired && entry.refcount == 0 {
                self.counter.retire(self.channel, &self.slot, &mut entry);
            }
        }
    }
}

/// Per-channel count of interested sessions; decides when the bus is asked
/// to subscribe or unsubscribe.
#[derive(Debug)]
pub struct SubscriptionRefCounter {
    bus: Arc<NotificationBus>,
    fanout: NotificationFanout,
    slots: Mutex<HashMap<String, Slot>>,
}

impl SubscriptionRefCounter {
    /// Creates a counter that subscribes through `bus` and routes bus
    /// messages into `fanout`.
    #[must_use]
    pub fn new(bus: Arc<NotificationBus>, fanout: NotificationFanout) -> Self {
        Self {
            bus,
            fanout,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Adds one reference to `channel` and returns the new count.
    ///
    /// The first reference subscribes upstream; the entry only counts once
    /// that call has succeeded.
    ///
    /// # Errors
    ///
    /// Returns the bus error if the first upstream subscribe fails. The
    /// count is left unchanged.
    pub async fn acquire(&self, channel: &str) -> Result<usize, BusError> {
        loop {
            let claim = SlotClaim {
                counter: self,
                channel,
                slot: self.slot_or_insert(channel),
            };
            let mut entry = claim.slot.lock().await;
            if entry.retired {
                continue;
            }
            if entry.refcount == 0 {
                let handler = self.handler_for(channel);
                if let Err(e) = self.bus.subscribe(channel, handler.clone()).await {
                    self.retire(channel, &claim.slot, &mut entry);
                    return Err(e);
                }
                entry.handler = Some(handler);
                tracing::debug!(channel, "channel subscribed upstream");
            }
            entry.refcount += 1;
            return Ok(entry.refcount);
        }
    }

    /// Drops one reference to `channel` and returns the remaining count.
    ///
    /// The last reference unsubscribes upstream and removes the entry.
    /// Releasing an unknown channel is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the bus error if the upstream unsubscribe fails. The entry is
    /// removed regardless.
    pub async fn release(&self, channel: &str) -> Result<usize, BusError> {
        loop {
            let Some(slot) = self.slot(channel) else {
                return Ok(0);
            };
            let mut entry = slot.lock().await;
            if entry.retired {
                continue;
            }
            if entry.refcount == 0 {
                return Ok(0);
            }
            entry.refcount -= 1;
            if entry.refcount > 0 {
                return Ok(entry.refcount);
            }

            let result = self.bus.unsubscribe(channel).await;
            entry.handler = None;
            self.retire(channel, &slot, &mut entry);
            tracing::debug!(channel, "channel released upstream");
            return result.map(|()| 0);
        }
    }

    /// Current reference count for `channel` (zero if absent).
    #[cfg(test)]
    pub(crate) async fn refcount(&self, channel: &str) -> usize {
        match self.slot(channel) {
            Some(slot) => {
                let entry = slot.lock().await;
                if entry.retired { 0 } else { entry.refcount }
            }
            None => 0,
        }
    }

    /// Channels with at least one reference.
    #[cfg(test)]
    pub(crate) async fn channels(&self) -> Vec<String> {
        let slots: Vec<(String, Slot)> = self
            .lock_slots()
            .iter()
            .map(|(name, slot)| (name.clone(), Arc::clone(slot)))
            .collect();
        let mut active = Vec::with_capacity(slots.len());
        for (name, slot) in slots {
            let entry = slot.lock().await;
            if !entry.retired && entry.refcount > 0 {
                active.push(name);
            }
        }
        active
    }

    fn handler_for(&self, channel: &str) -> MessageHandler {
        let fanout = self.fanout.clone();
        let channel = channel.to_string();
        MessageHandler::new(move |payload| {
            fanout.deliver(&channel, payload);
        })
    }

    fn slot(&self, channel: &str) -> Option<Slot> {
        self.lock_slots().get(channel).map(Arc::clone)
    }

    fn slot_or_insert(&self, channel: &str) -> Slot {
        let mut slots = self.lock_slots();
        Arc::clone(slots.entry(channel.to_string()).or_default())
    }

    fn retire(&self, channel: &str, slot: &Slot, entry: &mut ChannelSlot) {
        entry.retired = true;
        let mut slots = self.lock_slots();
        if slots.get(channel).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(channel);
        }
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
