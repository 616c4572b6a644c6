//! Behavior pattern recognition over the rolling interaction history.
//!
//! Each detector is a pure function of the history window and its parameters.
//! The recognizer owns the history and the keyed pattern store, runs every
//! detector on each new interaction and tags the trend against the previous
//! pattern of the same type.

pub mod learning_style;
pub mod routine;
pub mod tempo;
pub mod timing;
pub mod transposition;

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, FixedOffset, Utc};
use tracing::{debug, warn};

use crate::practice::config::PatternParams;
use crate::practice::error::{ensure_finite, AnalysisError, Component};
use crate::practice::stats::clamp_score;
use crate::practice::types::{
    BehaviorPattern, ControlInteraction, PatternCharacteristics, PatternTrend, PatternType,
    UserPreferences,
};

/// Raw detector output before it is stamped into a [`BehaviorPattern`].
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub confidence: f64,
    pub frequency: f64,
    pub characteristics: PatternCharacteristics,
}

#[derive(Debug, Clone, Default)]
pub struct PatternUpdate {
    pub detected: Vec<BehaviorPattern>,
    pub errors: Vec<AnalysisError>,
}

pub struct PatternRecognizer {
    params: PatternParams,
    offset: FixedOffset,
    history: VecDeque<ControlInteraction>,
    patterns: BTreeMap<PatternType, BehaviorPattern>,
}

impl PatternRecognizer {
    pub fn new(params: PatternParams, offset: FixedOffset) -> Self {
        let capacity = params.max_interaction_history.min(4096);
        Self {
            params,
            offset,
            history: VecDeque::with_capacity(capacity),
            patterns: BTreeMap::new(),
        }
    }

    /// Appends the interaction and re-runs all five detectors. A failing detector
    /// is reported in `errors` and leaves its stored pattern untouched.
    pub fn analyze(&mut self, interaction: ControlInteraction, now: DateTime<Utc>) -> PatternUpdate {
        self.history.push_back(interaction);
        while self.history.len() > self.params.max_interaction_history {
            self.history.pop_front();
        }

        let mut update = PatternUpdate::default();

        for pattern_type in PatternType::ALL {
            match self.run_detector(pattern_type) {
                Ok(Some(detection)) => match self.store(pattern_type, detection, now) {
                    Ok(pattern) => update.detected.push(pattern),
                    Err(e) => {
                        warn!(error = %e, pattern = pattern_type.as_str(), "pattern rejected");
                        update.errors.push(e);
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, pattern = pattern_type.as_str(), "pattern detector failed");
                    update.errors.push(e);
                }
            }
        }

        update
    }

    fn run_detector(&self, pattern_type: PatternType) -> Result<Option<Detection>, AnalysisError> {
        match pattern_type {
            PatternType::TempoProgression => tempo::detect(&self.history, &self.params.tempo),
            PatternType::TranspositionPreference => {
                transposition::detect(&self.history, &self.params.transposition)
            }
            PatternType::PracticeRoutine => routine::detect(&self.history, &self.params.routine),
            PatternType::LearningStyle => {
                learning_style::detect(&self.history, &self.params.learning_style)
            }
            PatternType::SessionTiming => {
                timing::detect(&self.history, &self.params.timing, self.offset)
            }
        }
    }

    fn store(
        &mut self,
        pattern_type: PatternType,
        detection: Detection,
        now: DateTime<Utc>,
    ) -> Result<BehaviorPattern, AnalysisError> {
        let component = Component::PatternRecognizer;
        let confidence = clamp_score(ensure_finite(
            component,
            &format!("{}.confidence", pattern_type.as_str()),
            detection.confidence,
        )?);
        let frequency = ensure_finite(
            component,
            &format!("{}.frequency", pattern_type.as_str()),
            detection.frequency,
        )?;

        let previous = self.patterns.get(&pattern_type);
        let trend = match previous {
            Some(prev) => classify_trend(frequency - prev.frequency, self.params.trend_dead_band),
            None => PatternTrend::Stable,
        };
        let id = previous
            .map(|p| p.id.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let pattern = BehaviorPattern {
            id,
            pattern_type,
            confidence,
            frequency,
            last_detected: now,
            characteristics: detection.characteristics,
            trend,
        };

        debug!(
            pattern = pattern_type.as_str(),
            confidence,
            frequency,
            "behavior pattern detected"
        );
        self.patterns.insert(pattern_type, pattern.clone());
        Ok(pattern)
    }

    pub fn patterns(&self) -> Vec<BehaviorPattern> {
        self.patterns.values().cloned().collect()
    }

    pub fn pattern(&self, pattern_type: PatternType) -> Option<&BehaviorPattern> {
        self.patterns.get(&pattern_type)
    }

    pub fn interaction_count(&self) -> usize {
        self.history.len()
    }

    pub fn extract_user_preferences(&self) -> UserPreferences {
        let mut prefs = UserPreferences::default();
        for pattern in self
            .patterns
            .values()
            .filter(|p| p.confidence > self.params.preference_confidence)
        {
            match &pattern.characteristics {
                PatternCharacteristics::TempoProgression(t) => prefs.tempo = Some(t.clone()),
                PatternCharacteristics::TranspositionPreference(t) => {
                    prefs.transposition = Some(t.clone())
                }
                PatternCharacteristics::PracticeRoutine(t) => prefs.routine = Some(t.clone()),
                PatternCharacteristics::LearningStyle(t) => prefs.learning_style = Some(t.clone()),
                PatternCharacteristics::SessionTiming(t) => prefs.timing = Some(t.clone()),
            }
        }
        prefs
    }
}

fn classify_trend(delta: f64, dead_band: f64) -> PatternTrend {
    if delta > dead_band {
        PatternTrend::Increasing
    } else if delta < -dead_band {
        PatternTrend::Decreasing
    } else {
        PatternTrend::Stable
    }
}

/// The newest `n` entries in chronological order.
pub(crate) fn recent<'a, F>(
    history: &'a VecDeque<ControlInteraction>,
    n: usize,
    keep: F,
) -> Vec<&'a ControlInteraction>
where
    F: Fn(&ControlInteraction) -> bool,
{
    let mut window: Vec<&ControlInteraction> =
        history.iter().rev().filter(|i| keep(i)).take(n).collect();
    window.reverse();
    window
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use chrono::Duration;

    fn recognizer() -> PatternRecognizer {
        PatternRecognizer::new(PatternParams::default(), FixedOffset::east_opt(0).unwrap())
    }

    #[test]
    fn interaction_history_is_capped() {
        let params = PatternParams {
            max_interaction_history: 5,
            ..Default::default()
        };
        let mut recognizer = PatternRecognizer::new(params, FixedOffset::east_opt(0).unwrap());
        for i in 0..8 {
            recognizer.analyze(tempo_at(i, 100.0), base_time());
        }
        assert_eq!(recognizer.interaction_count(), 5);
        assert_eq!(recognizer.history.front().unwrap().timestamp, base_time() + Duration::minutes(3));
    }

    #[test]
    fn repeated_small_ramps_are_gradual() {
        let mut recognizer = recognizer();
        let mut minute = 0;
        for _session in 0..3 {
            for bpm in [100.0, 103.0, 106.0, 109.0] {
                recognizer.analyze(tempo_at(minute, bpm), base_time());
                minute += 1;
            }
            minute += 60;
        }
        let pattern = recognizer.pattern(PatternType::TempoProgression).unwrap();
        assert_eq!(pattern.tempo().unwrap().preferred_style, crate::practice::types::TempoStyle::Gradual);
        assert!(pattern.confidence >= 0.0 && pattern.confidence <= 100.0);
    }

    #[test]
    fn first_detection_is_stable_then_trends() {
        let mut recognizer = recognizer();
        let mut updates = Vec::new();
        for i in 0..20 {
            updates.push(recognizer.analyze(tempo_at(i, 100.0 + i as f64), base_time()));
        }
        let first = updates
            .iter()
            .flat_map(|u| &u.detected)
            .find(|p| p.pattern_type == PatternType::TempoProgression)
            .unwrap();
        assert_eq!(first.trend, PatternTrend::Stable);

        // frequency grows by one per call, inside the dead band
        let latest = recognizer.pattern(PatternType::TempoProgression).unwrap();
        assert_eq!(latest.trend, PatternTrend::Stable);
        assert_eq!(latest.id, first.id);
    }

    #[test]
    fn trend_outside_dead_band() {
        assert_eq!(classify_trend(3.0, 2.0), PatternTrend::Increasing);
        assert_eq!(classify_trend(-2.5, 2.0), PatternTrend::Decreasing);
        assert_eq!(classify_trend(2.0, 2.0), PatternTrend::Stable);
    }

    #[test]
    fn faulty_detector_does_not_block_others() {
        let mut recognizer = recognizer();
        let mut last = PatternUpdate::default();
        for i in 0..25 {
            let bpm = if i == 12 { f64::NAN } else { 100.0 };
            last = recognizer.analyze(tempo_at(i, bpm), base_time());
        }
        assert!(last
            .errors
            .iter()
            .all(|e| e.component() == Component::PatternRecognizer));
        assert!(!last.errors.is_empty());
        assert!(recognizer.pattern(PatternType::LearningStyle).is_some());
    }

    #[test]
    fn preferences_only_include_confident_patterns() {
        let mut recognizer = recognizer();
        for i in 0..10 {
            recognizer.analyze(tempo_at(i, 100.0), base_time());
        }
        // ten samples at 5 points each -> confidence 50
        assert!(recognizer.extract_user_preferences().tempo.is_none());

        for i in 10..30 {
            recognizer.analyze(tempo_at(i, 100.0), base_time());
        }
        let prefs = recognizer.extract_user_preferences();
        assert!(prefs.tempo.is_some());
        assert!(prefs.transposition.is_none());
    }
}
