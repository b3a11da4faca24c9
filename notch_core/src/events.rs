//! Topic-scoped progress notifications.
//!
//! Each session publishes on the topic of the entity it calibrates: started,
//! zero or more progress events, then exactly one `Finished`. Subscribers get
//! unbounded crossbeam receivers so publishing never blocks a session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crossbeam_channel as xch;
use serde::Serialize;

use crate::hardware_session::HardwareProgress;
use crate::lever_session::LeverProgress;
use crate::mapping_session::MappingProgress;
use crate::types::{Calibration, InputId, LeverConfigId, Notch, NotchInputRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Topic {
    Input(InputId),
    Lever(LeverConfigId),
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topic::Input(id) => write!(f, "input:{id}"),
            Topic::Lever(id) => write!(f, "lever:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "session", rename_all = "snake_case")]
pub enum Progress {
    Hardware(HardwareProgress),
    Lever(LeverProgress),
    Mapping(MappingProgress),
}

/// Terminal result of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Calibrated(Calibration),
    NotchesSaved {
        lever_id: LeverConfigId,
        notches: Vec<Notch>,
    },
    RangesSaved {
        lever_id: LeverConfigId,
        ranges: Vec<NotchInputRange>,
    },
    Failed {
        reason: String,
    },
    Cancelled,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Failed { .. } | Outcome::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    Started(Progress),
    StepChanged(Progress),
    SampleUpdated(Progress),
    CaptureChanged(Progress),
    Finished(Outcome),
}

impl SessionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionEvent::Finished(_))
    }
}

#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<HashMap<Topic, Vec<xch::Sender<SessionEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: Topic) -> xch::Receiver<SessionEvent> {
        let (tx, rx) = xch::unbounded();
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.entry(topic).or_default().push(tx);
        }
        rx
    }

    /// Deliver `event` to every live subscriber of `topic`; dropped receivers
    /// are pruned.
    pub fn publish(&self, topic: Topic, event: SessionEvent) {
        let Ok(mut subs) = self.subscribers.lock() else {
            tracing::warn!(%topic, "event bus lock poisoned; event dropped");
            return;
        };
        if let Some(list) = subs.get_mut(&topic) {
            list.retain(|tx| tx.send(event.clone()).is_ok());
            if list.is_empty() {
                subs.remove(&topic);
            }
        }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.subscribers
            .lock()
            .map(|s| s.get(&topic).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

/// Per-session publishing handle enforcing the event sequence.
#[derive(Debug)]
pub struct Publisher {
    bus: Arc<EventBus>,
    topic: Topic,
    finished: bool,
}

impl Publisher {
    pub fn new(bus: Arc<EventBus>, topic: Topic) -> Self {
        Self {
            bus,
            topic,
            finished: false,
        }
    }

    pub fn emit(&self, event: SessionEvent) {
        if self.finished {
            tracing::warn!(topic = %self.topic, "event after terminal result dropped");
            return;
        }
        self.bus.publish(self.topic, event);
    }

    /// Publish the terminal result; later calls are ignored.
    pub fn finish(&mut self, outcome: Outcome) {
        if self.finished {
            return;
        }
        self.bus.publish(self.topic, SessionEvent::Finished(outcome));
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_stay_on_their_topic() {
        let bus = Arc::new(EventBus::new());
        let a = bus.subscribe(Topic::Input(1));
        let b = bus.subscribe(Topic::Input(2));
        bus.publish(Topic::Input(1), SessionEvent::Finished(Outcome::Cancelled));
        assert_eq!(a.try_recv().ok(), Some(SessionEvent::Finished(Outcome::Cancelled)));
        assert!(b.try_recv().is_err());
    }

    #[test]
    fn input_and_lever_topics_do_not_collide() {
        let bus = EventBus::new();
        let rx = bus.subscribe(Topic::Lever(1));
        bus.publish(Topic::Input(1), SessionEvent::Finished(Outcome::Cancelled));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe(Topic::Lever(9));
        assert_eq!(bus.subscriber_count(Topic::Lever(9)), 1);
        drop(rx);
        bus.publish(Topic::Lever(9), SessionEvent::Finished(Outcome::Cancelled));
        assert_eq!(bus.subscriber_count(Topic::Lever(9)), 0);
    }

    #[test]
    fn publisher_emits_one_terminal_result() {
        let bus = Arc::new(EventBus::new());
        let rx = bus.subscribe(Topic::Input(3));
        let mut p = Publisher::new(bus, Topic::Input(3));
        p.finish(Outcome::Cancelled);
        p.finish(Outcome::Failed {
            reason: "late".into(),
        });
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events, vec![SessionEvent::Finished(Outcome::Cancelled)]);
    }
}
