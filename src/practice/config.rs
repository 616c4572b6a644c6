use std::time::Duration;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::practice::error::EngineError;

/// Largest gap `chrono::Duration` can hold, in minutes.
const MAX_SEGMENT_GAP_MINUTES: i64 = i64::MAX / 60_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InteractionDefaults {
    pub response_time_ms: f64,
    pub accuracy: f64,
    pub confidence: f64,
    pub error_count: u32,
    pub success_rate: f64,
    /// Interactions inside this window from session start are tagged as warmup.
    pub warmup_window_minutes: i64,
}

impl Default for InteractionDefaults {
    fn default() -> Self {
        Self {
            response_time_ms: 1000.0,
            accuracy: 85.0,
            confidence: 80.0,
            error_count: 0,
            success_rate: 100.0,
            warmup_window_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionParams {
    pub max_history: usize,
    pub completion_threshold: f64,
    pub highlight_window: usize,
    pub highlight_min_delta: f64,
    pub top_controls: usize,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            max_history: 100,
            completion_threshold: 70.0,
            highlight_window: 5,
            highlight_min_delta: 5.0,
            top_controls: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TempoParams {
    pub window: usize,
    pub min_samples: usize,
    pub gradual_max_delta: f64,
    pub step_max_delta: f64,
    pub confidence_per_sample: f64,
    pub confidence_cap: f64,
}

impl Default for TempoParams {
    fn default() -> Self {
        Self {
            window: 50,
            min_samples: 10,
            gradual_max_delta: 5.0,
            step_max_delta: 15.0,
            confidence_per_sample: 5.0,
            confidence_cap: 95.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TranspositionParams {
    pub window: usize,
    pub min_samples: usize,
    pub small_max_semitones: u32,
    pub medium_max_semitones: u32,
    pub top_keys: usize,
    pub confidence_per_sample: f64,
    pub confidence_cap: f64,
}

impl Default for TranspositionParams {
    fn default() -> Self {
        Self {
            window: 50,
            min_samples: 5,
            small_max_semitones: 2,
            medium_max_semitones: 5,
            top_keys: 3,
            confidence_per_sample: 8.0,
            confidence_cap: 90.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoutineParams {
    pub window: usize,
    pub min_interactions: usize,
    pub segment_gap_minutes: i64,
    pub min_segments: usize,
    pub signature_length: usize,
    pub min_repeats: usize,
    pub confidence_per_segment: f64,
    pub confidence_cap: f64,
}

impl Default for RoutineParams {
    fn default() -> Self {
        Self {
            window: 200,
            min_interactions: 50,
            segment_gap_minutes: 30,
            min_segments: 3,
            signature_length: 5,
            min_repeats: 2,
            confidence_per_segment: 15.0,
            confidence_cap: 90.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LearningStyleParams {
    pub window: usize,
    pub min_samples: usize,
    pub dominance_ratio: f64,
    pub confidence_cap: f64,
}

impl Default for LearningStyleParams {
    fn default() -> Self {
        Self {
            window: 100,
            min_samples: 20,
            dominance_ratio: 0.5,
            confidence_cap: 95.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimingParams {
    pub window: usize,
    pub min_samples: usize,
    pub top_slots: usize,
    pub confidence_per_sample: f64,
    pub confidence_cap: f64,
}

impl Default for TimingParams {
    fn default() -> Self {
        Self {
            window: 20,
            min_samples: 5,
            top_slots: 3,
            confidence_per_sample: 5.0,
            confidence_cap: 90.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PatternParams {
    pub max_interaction_history: usize,
    /// Frequency change inside this band keeps a pattern's trend `stable`.
    pub trend_dead_band: f64,
    pub preference_confidence: f64,
    pub tempo: TempoParams,
    pub transposition: TranspositionParams,
    pub routine: RoutineParams,
    pub learning_style: LearningStyleParams,
    pub timing: TimingParams,
}

impl Default for PatternParams {
    fn default() -> Self {
        Self {
            max_interaction_history: 1000,
            trend_dead_band: 2.0,
            preference_confidence: 70.0,
            tempo: TempoParams::default(),
            transposition: TranspositionParams::default(),
            routine: RoutineParams::default(),
            learning_style: LearningStyleParams::default(),
            timing: TimingParams::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProgressParams {
    pub skill_history_len: usize,
    pub trend_threshold: f64,
    pub velocity_window: usize,
    pub trend_window: usize,
    pub trend_dead_band: f64,
    pub milestone_step: f64,
    pub milestone_sentinel_days: f64,
    pub strength_threshold: f64,
    pub weakness_threshold: f64,
    pub mastery_level: f64,
    pub session_milestones: Vec<usize>,
    pub streak_milestones: Vec<u32>,
}

impl Default for ProgressParams {
    fn default() -> Self {
        Self {
            skill_history_len: 20,
            trend_threshold: 5.0,
            velocity_window: 10,
            trend_window: 3,
            trend_dead_band: 2.0,
            milestone_step: 10.0,
            milestone_sentinel_days: 999.0,
            strength_threshold: 70.0,
            weakness_threshold: 60.0,
            mastery_level: 80.0,
            session_milestones: vec![10, 50, 100],
            streak_milestones: vec![3, 7, 30],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub interaction_defaults: InteractionDefaults,
    pub session: SessionParams,
    pub patterns: PatternParams,
    pub progress: ProgressParams,
    pub insight_delay_ms: u64,
    /// Offset applied before bucketing timestamps into calendar days and hours.
    pub utc_offset_minutes: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interaction_defaults: InteractionDefaults::default(),
            session: SessionParams::default(),
            patterns: PatternParams::default(),
            progress: ProgressParams::default(),
            insight_delay_ms: 100,
            utc_offset_minutes: 0,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `PRACTICE_*` variables, then validated.
    pub fn from_env() -> Result<Self, EngineError> {
        let mut config = Self::default();

        if let Some(val) = env_parse("PRACTICE_INSIGHT_DELAY_MS") {
            config.insight_delay_ms = val;
        }
        if let Some(val) = env_parse("PRACTICE_UTC_OFFSET_MINUTES") {
            config.utc_offset_minutes = val;
        }
        if let Some(val) = env_parse("PRACTICE_MAX_SESSION_HISTORY") {
            config.session.max_history = val;
        }
        if let Some(val) = env_parse("PRACTICE_MAX_INTERACTION_HISTORY") {
            config.patterns.max_interaction_history = val;
        }
        if let Some(val) = env_parse("PRACTICE_ROUTINE_GAP_MINUTES") {
            config.patterns.routine.segment_gap_minutes = val;
        }
        if let Some(val) = env_parse("PRACTICE_PATTERN_TREND_DEAD_BAND") {
            config.patterns.trend_dead_band = val;
        }
        if let Some(val) = env_parse("PRACTICE_TEMPO_GRADUAL_MAX") {
            config.patterns.tempo.gradual_max_delta = val;
        }
        if let Some(val) = env_parse("PRACTICE_TEMPO_STEP_MAX") {
            config.patterns.tempo.step_max_delta = val;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.session.max_history == 0 {
            return Err(EngineError::Config("session.maxHistory must be positive".into()));
        }
        if self.patterns.max_interaction_history == 0 {
            return Err(EngineError::Config(
                "patterns.maxInteractionHistory must be positive".into(),
            ));
        }
        if self.patterns.tempo.gradual_max_delta > self.patterns.tempo.step_max_delta {
            return Err(EngineError::Config(
                "tempo gradual bucket must not exceed the step bucket".into(),
            ));
        }
        let gap = self.patterns.routine.segment_gap_minutes;
        if !(1..=MAX_SEGMENT_GAP_MINUTES).contains(&gap) {
            return Err(EngineError::Config(format!(
                "patterns.routine.segmentGapMinutes must be in 1..={MAX_SEGMENT_GAP_MINUTES}, got {gap}"
            )));
        }
        if !(self.progress.milestone_step.is_finite() && self.progress.milestone_step > 0.0) {
            return Err(EngineError::Config("progress.milestoneStep must be positive".into()));
        }
        if self.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(EngineError::Config("utcOffsetMinutes out of range".into()));
        }
        Ok(())
    }

    pub fn insight_delay(&self) -> Duration {
        Duration::from_millis(self.insight_delay_ms)
    }

    pub fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    pub fn to_local(&self, ts: DateTime<Utc>) -> DateTime<FixedOffset> {
        ts.with_timezone(&self.local_offset())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
