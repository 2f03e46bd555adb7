//! PDO (Process Data Object) subscription registry and notification
//! dispatch (spec §4.6).
//!
//! Subscribing to a PDID registers an async channel that receives every
//! `CnRpdoNotification` carrying that PDID; an optional dedup mode drops
//! repeat notifications whose decoded value is unchanged from the last one
//! delivered.

use std::collections::HashMap;
use std::sync::Mutex;

use comfoconnect_wire::{TypeTag, Value};
use tokio::sync::mpsc;

use crate::error::DecodeError;

/// A decoded PDO sample delivered to a subscriber.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Sample {
    /// The PDID this sample is for.
    pub pdid: u32,
    /// The decoded value.
    pub value: Value,
}

struct Subscription {
    type_tag: TypeTag,
    dedup: bool,
    last_value: Option<Value>,
    sender: mpsc::UnboundedSender<Sample>,
}

/// Tracks live PDO subscriptions and routes incoming notifications.
pub struct PdoRegistry {
    subscriptions: Mutex<HashMap<u32, Subscription>>,
}

impl PdoRegistry {
    /// Construct an empty registry.
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Register interest in `pdid`, decoding notification payloads as
    /// `type_tag`. When `dedup` is set, consecutive notifications that
    /// decode to an unchanged value are not forwarded to the channel.
    ///
    /// Replaces any existing subscription for the same `pdid`.
    pub fn subscribe(
        &self,
        pdid: u32,
        type_tag: TypeTag,
        dedup: bool,
    ) -> mpsc::UnboundedReceiver<Sample> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscriptions = self.subscriptions.lock().expect("pdo registry mutex poisoned");
        subscriptions.insert(
            pdid,
            Subscription {
                type_tag,
                dedup,
                last_value: None,
                sender: tx,
            },
        );
        rx
    }

    /// Drop the subscription for `pdid`, if one exists.
    pub fn unsubscribe(&self, pdid: u32) {
        let mut subscriptions = self.subscriptions.lock().expect("pdo registry mutex poisoned");
        subscriptions.remove(&pdid);
    }

    /// The set of PDIDs currently subscribed.
    pub fn subscribed_pdids(&self) -> Vec<u32> {
        let subscriptions = self.subscriptions.lock().expect("pdo registry mutex poisoned");
        subscriptions.keys().copied().collect()
    }

    /// Every currently subscribed PDID together with its recorded type tag,
    /// for re-issuing `CnRpdoRequest` after a reconnect (spec §4.4 and
    /// scenario 6 in §8: subscriptions must survive unsolicited transport
    /// loss).
    pub fn subscribed(&self) -> Vec<(u32, TypeTag)> {
        let subscriptions = self.subscriptions.lock().expect("pdo registry mutex poisoned");
        subscriptions
            .iter()
            .map(|(&pdid, sub)| (pdid, sub.type_tag))
            .collect()
    }

    /// Decode and dispatch a notification payload for `pdid`.
    ///
    /// Returns `Ok(())` whether or not a subscriber was listening, a
    /// delivery was suppressed by dedup, or the receiver had already been
    /// dropped — those are not decode failures. Returns
    /// [`DecodeError::UnknownPdid`] when nothing is subscribed to `pdid`,
    /// which callers log at `debug` and otherwise ignore (spec §9 Open
    /// Question (c): unrecognized PDIDs are not an error).
    pub fn dispatch(&self, pdid: u32, payload: &[u8]) -> Result<(), DecodeError> {
        let mut subscriptions = self.subscriptions.lock().expect("pdo registry mutex poisoned");
        let subscription = subscriptions
            .get_mut(&pdid)
            .ok_or(DecodeError::UnknownPdid(pdid))?;

        let value = Value::decode(subscription.type_tag, payload)?;

        let should_send = if subscription.dedup {
            subscription.last_value.as_ref() != Some(&value)
        } else {
            true
        };

        if should_send {
            subscription.last_value = Some(value.clone());
            let _ = subscription.sender.send(Sample { pdid, value });
        }

        Ok(())
    }
}

impl Default for PdoRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_without_a_subscription_is_unknown_pdid() {
        let registry = PdoRegistry::new();

        let err = registry.dispatch(276, &[0x3c, 0x00]).unwrap_err();

        assert_eq!(err, DecodeError::UnknownPdid(276));
    }

    #[test]
    fn delivers_decoded_outdoor_temperature_sample() {
        let registry = PdoRegistry::new();
        let mut rx = registry.subscribe(276, TypeTag::I16, false);

        registry.dispatch(276, &[0x3c, 0x00]).unwrap();

        let sample = rx.try_recv().unwrap();
        assert_eq!(sample.pdid, 276);
        assert_eq!(sample.value, Value::I16(60));
    }

    #[test]
    fn dedup_suppresses_a_repeated_unchanged_value() {
        let registry = PdoRegistry::new();
        let mut rx = registry.subscribe(276, TypeTag::I16, true);

        registry.dispatch(276, &[0x3c, 0x00]).unwrap();
        registry.dispatch(276, &[0x3c, 0x00]).unwrap();

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dedup_still_forwards_a_changed_value() {
        let registry = PdoRegistry::new();
        let mut rx = registry.subscribe(276, TypeTag::I16, true);

        registry.dispatch(276, &[0x3c, 0x00]).unwrap();
        registry.dispatch(276, &[0x40, 0x00]).unwrap();

        assert_eq!(rx.try_recv().unwrap().value, Value::I16(60));
        assert_eq!(rx.try_recv().unwrap().value, Value::I16(64));
    }

    #[test]
    fn unsubscribe_removes_future_deliveries() {
        let registry = PdoRegistry::new();
        let mut rx = registry.subscribe(276, TypeTag::I16, false);
        registry.unsubscribe(276);

        let err = registry.dispatch(276, &[0x3c, 0x00]).unwrap_err();
        assert_eq!(err, DecodeError::UnknownPdid(276));
        assert!(rx.try_recv().is_err());
    }
}
