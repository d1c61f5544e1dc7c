//! Telemetry signals and the composite risk score

use super::state::{Anomaly, RiskLevel, Severity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use thiserror::Error;

/// Per-signal contribution when the critical threshold is reached
pub const CRITICAL_SCORE: u32 = 95;
/// Per-signal contribution when the warning threshold is reached
pub const WARNING_SCORE: u32 = 75;
/// Per-signal contribution below both thresholds
pub const NOMINAL_SCORE: u32 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub value: f64,
    pub unit: String,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    pub location: String,
}

impl Signal {
    pub fn new(
        value: f64,
        unit: impl Into<String>,
        warning_threshold: f64,
        critical_threshold: f64,
        location: impl Into<String>,
    ) -> Self {
        Self {
            value,
            unit: unit.into(),
            warning_threshold,
            critical_threshold,
            location: location.into(),
        }
    }

    pub fn severity(&self) -> Option<Severity> {
        if self.value >= self.critical_threshold {
            Some(Severity::Critical)
        } else if self.value >= self.warning_threshold {
            Some(Severity::Warning)
        } else {
            None
        }
    }

    pub fn score(&self) -> u32 {
        match self.severity() {
            Some(Severity::Critical) => CRITICAL_SCORE,
            Some(Severity::Warning) => WARNING_SCORE,
            None => NOMINAL_SCORE,
        }
    }
}

/// Signal name → reading, ordered by name
pub type SignalSnapshot = BTreeMap<String, Signal>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("signal source unavailable: {0}")]
    Unavailable(String),

    #[error("signal {signal} is invalid: {reason}")]
    Invalid { signal: String, reason: String },
}

/// Output of scoring one snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub anomalies: Vec<Anomaly>,
}

/// Composite score: integer part of the mean per-signal score; 0 when empty.
pub fn score_signals(snapshot: &SignalSnapshot) -> Result<Assessment, SignalError> {
    let mut total: u64 = 0;
    let mut anomalies = Vec::new();

    for (name, signal) in snapshot {
        for (field, v) in [
            ("value", signal.value),
            ("warning_threshold", signal.warning_threshold),
            ("critical_threshold", signal.critical_threshold),
        ] {
            if !v.is_finite() {
                return Err(SignalError::Invalid {
                    signal: name.clone(),
                    reason: format!("{} is not a finite number", field),
                });
            }
        }

        total += u64::from(signal.score());
        if let Some(severity) = signal.severity() {
            let threshold = match severity {
                Severity::Critical => signal.critical_threshold,
                Severity::Warning => signal.warning_threshold,
            };
            anomalies.push(Anomaly {
                signal: name.clone(),
                value: signal.value,
                unit: signal.unit.clone(),
                threshold,
                severity,
                location: signal.location.clone(),
            });
        }
    }

    let risk_score = if snapshot.is_empty() {
        0
    } else {
        (total / snapshot.len() as u64) as u32
    };

    Ok(Assessment {
        risk_score,
        risk_level: RiskLevel::classify(risk_score),
        anomalies,
    })
}

/// Supplier of signal snapshots for Perceive.
#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn snapshot(&self) -> Result<SignalSnapshot, SignalError>;
}

/// Always returns the same snapshot.
#[derive(Debug, Clone, Default)]
pub struct StaticSignals {
    snapshot: SignalSnapshot,
}

impl StaticSignals {
    pub fn new(snapshot: SignalSnapshot) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl SignalSource for StaticSignals {
    async fn snapshot(&self) -> Result<SignalSnapshot, SignalError> {
        Ok(self.snapshot.clone())
    }
}

/// Replays recorded snapshots in order, repeating the last one when exhausted.
#[derive(Debug)]
pub struct ScriptedSignals {
    frames: Mutex<VecDeque<SignalSnapshot>>,
    last: Mutex<Option<SignalSnapshot>>,
}

impl ScriptedSignals {
    pub fn new(frames: impl IntoIterator<Item = SignalSnapshot>) -> Self {
        Self {
            frames: Mutex::new(frames.into_iter().collect()),
            last: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SignalSource for ScriptedSignals {
    async fn snapshot(&self) -> Result<SignalSnapshot, SignalError> {
        let next = self.frames.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(frame) = next {
            *last = Some(frame);
        }
        last.clone()
            .ok_or_else(|| SignalError::Unavailable("no recorded frames".to_string()))
    }
}

/// The four-sensor plant floor used in examples and tests
pub fn plant_floor(temperature: f64, vibration: f64, gas_h2s: f64, noise: f64) -> SignalSnapshot {
    SignalSnapshot::from([
        (
            "temperature".to_string(),
            Signal::new(temperature, "°C", 35.0, 42.0, "Zone A"),
        ),
        (
            "vibration".to_string(),
            Signal::new(vibration, "mm/s", 8.0, 12.0, "Compresseur P-101"),
        ),
        (
            "gas_h2s".to_string(),
            Signal::new(gas_h2s, "ppm", 10.0, 20.0, "Zone B"),
        ),
        ("noise".to_string(), Signal::new(noise, "dB", 85.0, 90.0, "Atelier")),
    ])
}
