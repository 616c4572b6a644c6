#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use practice_insights::practice::{ControlParameters, ControlUsage, EngineConfig, PracticeContext};
use practice_insights::{ManualClock, PracticeEngine};

/// Monday 2024-03-04 18:00 UTC.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 18, 0, 0).unwrap()
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        insight_delay_ms: 10,
        ..Default::default()
    }
}

pub fn create_engine() -> (PracticeEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start_time()));
    let engine = PracticeEngine::with_clock(test_config(), clock.clone()).unwrap();
    (engine, clock)
}

pub fn create_initialized_engine() -> (PracticeEngine, Arc<ManualClock>) {
    let (engine, clock) = create_engine();
    engine.initialize();
    (engine, clock)
}

pub fn tempo(bpm: f64) -> ControlUsage {
    ControlUsage::new(ControlParameters::tempo(bpm))
}

pub fn default_context() -> PracticeContext {
    PracticeContext::default()
}
