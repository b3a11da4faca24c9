//! Raw-sample routing from the serial collaborator to sessions.
//!
//! Subscriptions are keyed by `(port, pin)`; a session only ever sees the
//! stream of the input it is bound to. Channels are bounded so a stalled
//! session sheds samples instead of growing memory; dropped samples are
//! harmless because every session treats the stream as lossy.
use std::collections::HashMap;
use std::sync::Mutex;

use crossbeam_channel as xch;

use crate::types::{PinRef, RawSample};

/// Per-subscriber buffer; a 10-bit ADC bridge reports at most a few hundred Hz.
pub const SAMPLE_BUFFER: usize = 1024;

#[derive(Debug, Default)]
pub struct SampleBus {
    subscribers: Mutex<HashMap<PinRef, Vec<xch::Sender<RawSample>>>>,
}

impl SampleBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, pin: &PinRef) -> xch::Receiver<RawSample> {
        let (tx, rx) = xch::bounded(SAMPLE_BUFFER);
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.entry(pin.clone()).or_default().push(tx);
        }
        rx
    }

    /// Route one reading to the subscribers of its pin.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, sample: RawSample) -> usize {
        let key = PinRef::new(sample.port.clone(), sample.pin);
        let Ok(mut subs) = self.subscribers.lock() else {
            return 0;
        };
        let Some(list) = subs.get_mut(&key) else {
            return 0;
        };
        let mut delivered = 0;
        list.retain(|tx| match tx.try_send(sample.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(xch::TrySendError::Full(_)) => {
                tracing::debug!(pin = %key, "sample buffer full; reading dropped");
                true
            }
            Err(xch::TrySendError::Disconnected(_)) => false,
        });
        if list.is_empty() {
            subs.remove(&key);
        }
        delivered
    }

    /// Convenience for feeding a batch of readings for one pin.
    pub fn publish_all(&self, pin: &PinRef, values: impl IntoIterator<Item = i32>) -> usize {
        values
            .into_iter()
            .map(|v| self.publish(RawSample::new(pin, v)))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_only_to_matching_pin() {
        let bus = SampleBus::new();
        let a = PinRef::new("ttyACM0", 1);
        let b = PinRef::new("ttyACM0", 2);
        let rx_a = bus.subscribe(&a);
        let rx_b = bus.subscribe(&b);

        assert_eq!(bus.publish(RawSample::new(&a, 512)), 1);
        assert_eq!(rx_a.try_recv().map(|s| s.value).ok(), Some(512));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn unsubscribed_pins_are_ignored() {
        let bus = SampleBus::new();
        assert_eq!(bus.publish(RawSample::new(&PinRef::new("x", 0), 1)), 0);
    }

    #[test]
    fn disconnected_receivers_are_pruned() {
        let bus = SampleBus::new();
        let pin = PinRef::new("ttyACM0", 5);
        drop(bus.subscribe(&pin));
        assert_eq!(bus.publish_all(&pin, [1, 2, 3]), 0);
    }
}
