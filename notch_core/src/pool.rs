//! On-demand session spawner.
//!
//! At most one hardware calibration per input and one lever calibration plus
//! one notch mapping per lever config may run at a time. A second start is
//! rejected immediately with `AlreadyRunning`; it never queues and never
//! touches the running session.
//!
//! Registration happens before the thread is spawned and is released by a
//! guard the session thread owns, so every exit path (including a panic)
//! frees the key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use notch_traits::{Clock, Simulator};
use serde::Serialize;

use crate::config::{HardwareParams, LeverParams, MappingParams};
use crate::error::{CalibrationError, Result};
use crate::events::{EventBus, Publisher, Topic};
use crate::hardware_session::HardwareCalibration;
use crate::lever_session::LeverCalibrator;
use crate::mapping_session::NotchMapping;
use crate::runner::{self, HardwareHandle, LeverHandle, MappingHandle};
use crate::samples::SampleBus;
use crate::store::CalibrationStore;
use crate::types::{Calibration, InputId, LeverConfig, LeverConfigId, LeverEndpoints, PinRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SessionKey {
    Hardware(InputId),
    LeverCalibration(LeverConfigId),
    NotchMapping(LeverConfigId),
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionKey::Hardware(id) => write!(f, "hardware calibration for input {id}"),
            SessionKey::LeverCalibration(id) => write!(f, "lever calibration for lever {id}"),
            SessionKey::NotchMapping(id) => write!(f, "notch mapping for lever {id}"),
        }
    }
}

type Registry = Arc<Mutex<HashMap<SessionKey, u64>>>;

/// Releases a pool key when the owning session thread exits.
struct Registration {
    registry: Registry,
    key: SessionKey,
    generation: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        match self.registry.lock() {
            Ok(mut map) => {
                if map.get(&self.key) == Some(&self.generation) {
                    map.remove(&self.key);
                }
            }
            Err(_) => tracing::warn!(key = %self.key, "session registry poisoned"),
        }
    }
}

pub struct SessionPool {
    events: Arc<EventBus>,
    samples: Arc<SampleBus>,
    store: Arc<dyn CalibrationStore>,
    registry: Registry,
    generation: AtomicU64,
    hardware: HardwareParams,
    lever: LeverParams,
    mapping: MappingParams,
}

impl std::fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("active", &self.active_count())
            .finish_non_exhaustive()
    }
}

impl SessionPool {
    pub fn new(store: Arc<dyn CalibrationStore>) -> Self {
        Self {
            events: Arc::new(EventBus::new()),
            samples: Arc::new(SampleBus::new()),
            store,
            registry: Arc::default(),
            generation: AtomicU64::new(0),
            hardware: HardwareParams::default(),
            lever: LeverParams::default(),
            mapping: MappingParams::default(),
        }
    }

    pub fn with_hardware_params(mut self, params: HardwareParams) -> Self {
        self.hardware = params;
        self
    }

    pub fn with_lever_params(mut self, params: LeverParams) -> Self {
        self.lever = params;
        self
    }

    pub fn with_mapping_params(mut self, params: MappingParams) -> Self {
        self.mapping = params;
        self
    }

    /// Subscribe here before starting a session to see its `Started` event.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Feed raw samples from the serial collaborator here.
    pub fn samples(&self) -> &Arc<SampleBus> {
        &self.samples
    }

    pub fn is_running(&self, key: SessionKey) -> bool {
        self.registry
            .lock()
            .map(|m| m.contains_key(&key))
            .unwrap_or(false)
    }

    pub fn active_count(&self) -> usize {
        self.registry.lock().map(|m| m.len()).unwrap_or(0)
    }

    fn register(&self, key: SessionKey) -> Result<Registration> {
        let mut map = self
            .registry
            .lock()
            .map_err(|_| CalibrationError::Config("session registry poisoned".into()))?;
        if map.contains_key(&key) {
            tracing::warn!(%key, "start rejected; session already running");
            return Err(CalibrationError::AlreadyRunning(key.to_string()).into());
        }
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        map.insert(key, generation);
        Ok(Registration {
            registry: Arc::clone(&self.registry),
            key,
            generation,
        })
    }

    pub fn start_hardware_calibration(
        &self,
        input_id: InputId,
        pin: PinRef,
    ) -> Result<HardwareHandle> {
        let registration = self.register(SessionKey::Hardware(input_id))?;
        let samples = self.samples.subscribe(&pin);
        let session = HardwareCalibration::new(input_id, pin, self.hardware.clone());
        let publisher = Publisher::new(Arc::clone(&self.events), Topic::Input(input_id));
        Ok(runner::spawn_hardware(
            session,
            samples,
            Arc::clone(&self.store),
            publisher,
            move || drop(registration),
        ))
    }

    pub fn start_lever_calibration<S, C>(
        &self,
        lever_id: LeverConfigId,
        endpoints: LeverEndpoints,
        simulator: S,
        clock: C,
    ) -> Result<LeverHandle>
    where
        S: Simulator + Send + 'static,
        C: Clock + Send + 'static,
    {
        let registration = self.register(SessionKey::LeverCalibration(lever_id))?;
        let calibrator = LeverCalibrator::new(lever_id, endpoints, self.lever.clone(), simulator);
        let publisher = Publisher::new(Arc::clone(&self.events), Topic::Lever(lever_id));
        Ok(runner::spawn_lever(
            calibrator,
            clock,
            Arc::clone(&self.store),
            publisher,
            move || drop(registration),
        ))
    }

    pub fn start_notch_mapping(
        &self,
        lever: LeverConfig,
        pin: PinRef,
        calibration: Calibration,
    ) -> Result<MappingHandle> {
        let lever_id = lever.id;
        let registration = self.register(SessionKey::NotchMapping(lever_id))?;
        let samples = self.samples.subscribe(&pin);
        let session = NotchMapping::new(lever, pin, calibration, self.mapping.clone());
        let publisher = Publisher::new(Arc::clone(&self.events), Topic::Lever(lever_id));
        Ok(runner::spawn_mapping(
            session,
            samples,
            Arc::clone(&self.store),
            publisher,
            move || drop(registration),
        ))
    }
}
