//! Scripted device double for tuning unit tests

use crate::device::{DeviceApi, DeviceError, Sample};
use async_trait::async_trait;
use axetune_common::{Candidate, DeviceDefaults, TuningConfig};
use std::sync::Mutex;

type Behavior = Box<dyn Fn(Candidate, usize) -> Result<Sample, DeviceError> + Send + Sync>;

#[derive(Debug, Default)]
struct DeviceState {
    current: Option<Candidate>,
    applied: Vec<Candidate>,
    restarts: usize,
    reads_since_apply: usize,
}

/// Device whose telemetry is a function of (applied candidate, sample index
/// since the last apply)
pub struct ScriptedDevice {
    behavior: Behavior,
    defaults: DeviceDefaults,
    fail_apply: bool,
    state: Mutex<DeviceState>,
}

impl ScriptedDevice {
    pub fn new<F>(behavior: F) -> Self
    where
        F: Fn(Candidate, usize) -> Result<Sample, DeviceError> + Send + Sync + 'static,
    {
        Self {
            behavior: Box::new(behavior),
            defaults: test_defaults(),
            fail_apply: false,
            state: Mutex::new(DeviceState::default()),
        }
    }

    /// Every sample reports `hash_rate(candidate)` with healthy thermals
    pub fn steady<F>(hash_rate: F) -> Self
    where
        F: Fn(Candidate) -> f64 + Send + Sync + 'static,
    {
        Self::new(move |candidate, _| Ok(healthy_sample(hash_rate(candidate))))
    }

    pub fn failing_apply(mut self) -> Self {
        self.fail_apply = true;
        self
    }

    pub fn applied(&self) -> Vec<Candidate> {
        self.state.lock().unwrap().applied.clone()
    }

    pub fn restarts(&self) -> usize {
        self.state.lock().unwrap().restarts
    }
}

#[async_trait]
impl DeviceApi for ScriptedDevice {
    async fn read_status(&self) -> Result<Sample, DeviceError> {
        let (candidate, index) = {
            let mut state = self.state.lock().unwrap();
            let index = state.reads_since_apply;
            state.reads_since_apply += 1;
            (state.current.unwrap_or(self.defaults.candidate()), index)
        };
        (self.behavior)(candidate, index)
    }

    async fn fetch_defaults(&self) -> Result<DeviceDefaults, DeviceError> {
        Ok(self.defaults)
    }

    async fn apply_settings(&self, candidate: Candidate) -> Result<(), DeviceError> {
        if self.fail_apply {
            return Err(DeviceError::Http { status: 500 });
        }
        let mut state = self.state.lock().unwrap();
        state.current = Some(candidate);
        state.applied.push(candidate);
        state.reads_since_apply = 0;
        state.restarts += 1;
        Ok(())
    }

    async fn restart(&self) -> Result<(), DeviceError> {
        self.state.lock().unwrap().restarts += 1;
        Ok(())
    }
}

/// 1000 cores: expected hashrate in GH/s equals the frequency in MHz
pub fn test_defaults() -> DeviceDefaults {
    DeviceDefaults {
        core_voltage: 1150,
        frequency: 600,
        small_core_count: 1000,
        asic_count: 1,
    }
}

pub fn healthy_sample(hash_rate: f64) -> Sample {
    Sample {
        hash_rate: Some(hash_rate),
        temp: Some(60.0),
        vr_temp: Some(55.0),
        power: Some(80.0),
        input_voltage: Some(11_900.0),
    }
}

/// Default limits with a 10-sample, 1 ms-interval window and no settle wait
pub fn fast_config() -> TuningConfig {
    let mut config = TuningConfig::default();
    config.benchmark.duration_ms = 10;
    config.benchmark.sample_interval_ms = 1;
    config.benchmark.settle_ms = 0;
    config.benchmark.apply_pause_ms = 0;
    config
}
