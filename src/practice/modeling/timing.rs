use std::collections::VecDeque;

use chrono::{Datelike, FixedOffset, Timelike};

use super::{recent, Detection};
use crate::practice::config::TimingParams;
use crate::practice::error::{ensure_finite, AnalysisError, Component};
use crate::practice::stats::{mean, top_indices, variance};
use crate::practice::types::{
    ControlInteraction, PatternCharacteristics, SessionPhase, SessionTimingTraits,
};

/// Hour-of-day and weekday habits, read from warmup interactions since those
/// mark when a session actually begins.
pub fn detect(
    history: &VecDeque<ControlInteraction>,
    params: &TimingParams,
    offset: FixedOffset,
) -> Result<Option<Detection>, AnalysisError> {
    let samples = recent(history, params.window, |i| {
        i.context.session_phase == SessionPhase::Warmup
    });
    if samples.len() < params.min_samples {
        return Ok(None);
    }

    let mut hour_counts = [0usize; 24];
    let mut weekday_counts = [0usize; 7];
    let mut hours = Vec::with_capacity(samples.len());
    let mut weekdays = Vec::with_capacity(samples.len());

    for interaction in &samples {
        let local = interaction.timestamp.with_timezone(&offset);
        let hour = local.hour();
        let weekday = local.weekday().num_days_from_monday();
        hour_counts[hour as usize] += 1;
        weekday_counts[weekday as usize] += 1;
        hours.push(hour as f64);
        weekdays.push(weekday as f64);
    }

    let hour_score = 100.0 / (1.0 + circular_hour_variance(&hours));
    let weekday_score = 100.0 / (1.0 + variance(&weekdays));
    let timing_consistency = ensure_finite(
        Component::PatternRecognizer,
        "session_timing.consistency",
        mean(&[hour_score, weekday_score]),
    )?;

    let count = samples.len() as f64;
    Ok(Some(Detection {
        confidence: (count * params.confidence_per_sample).min(params.confidence_cap),
        frequency: count,
        characteristics: PatternCharacteristics::SessionTiming(SessionTimingTraits {
            preferred_hours: top_indices(&hour_counts, params.top_slots)
                .into_iter()
                .map(|h| h as u32)
                .collect(),
            preferred_weekdays: top_indices(&weekday_counts, params.top_slots)
                .into_iter()
                .map(|d| d as u32)
                .collect(),
            timing_consistency,
        }),
    }))
}

/// Spread of clock hours on the 24-hour circle, in squared hours, so 23:00 and
/// 00:00 count as neighbours. Uses the circular standard deviation
/// `sqrt(-2 ln R)` where `R` is the mean resultant length.
fn circular_hour_variance(hours: &[f64]) -> f64 {
    if hours.is_empty() {
        return 0.0;
    }
    let radians_per_hour = std::f64::consts::TAU / 24.0;
    let n = hours.len() as f64;
    let (sin_sum, cos_sum) = hours.iter().fold((0.0, 0.0), |(s, c), h| {
        let angle = h * radians_per_hour;
        (s + angle.sin(), c + angle.cos())
    });
    let resultant = ((sin_sum / n).hypot(cos_sum / n)).min(1.0);
    if resultant <= 0.0 {
        return f64::INFINITY;
    }
    let spread_hours = (-2.0 * resultant.ln()).sqrt() / radians_per_hour;
    spread_hours * spread_hours
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::practice::modeling::test_support::*;
    use crate::practice::types::ControllerType;
    use chrono::Duration;

    fn warmup_at(day: i64, hour_shift: i64) -> ControlInteraction {
        let mut interaction = control_at(0, ControllerType::Playback);
        interaction.timestamp += Duration::days(day) + Duration::hours(hour_shift);
        interaction.context.session_phase = SessionPhase::Warmup;
        interaction
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn ignores_non_warmup_interactions() {
        let h: VecDeque<_> = (0..10).map(|i| control_at(i, ControllerType::Tempo)).collect();
        assert!(detect(&h, &TimingParams::default(), utc()).unwrap().is_none());
    }

    #[test]
    fn same_slot_every_day_is_fully_consistent_in_hours() {
        // base time is Monday 19:00 UTC
        let h: VecDeque<_> = (0..5).map(|d| warmup_at(d * 7, 0)).collect();
        let detection = detect(&h, &TimingParams::default(), utc()).unwrap().unwrap();
        let PatternCharacteristics::SessionTiming(t) = detection.characteristics else {
            panic!("wrong characteristics");
        };
        assert_eq!(t.preferred_hours, vec![19]);
        assert_eq!(t.preferred_weekdays, vec![0]);
        assert!((t.timing_consistency - 100.0).abs() < 1e-9);
        assert_eq!(detection.confidence, 25.0);
    }

    #[test]
    fn spread_lowers_consistency_and_ranks_slots() {
        let h: VecDeque<_> = [(0, 0), (1, 0), (2, 0), (3, -2), (4, -2), (5, 1)]
            .into_iter()
            .map(|(d, shift)| warmup_at(d, shift))
            .collect();
        let detection = detect(&h, &TimingParams::default(), utc()).unwrap().unwrap();
        let PatternCharacteristics::SessionTiming(t) = detection.characteristics else {
            panic!("wrong characteristics");
        };
        assert_eq!(t.preferred_hours, vec![19, 17, 20]);
        assert_eq!(t.preferred_weekdays.len(), 3);
        assert!(t.timing_consistency < 100.0);
        assert!(t.timing_consistency > 0.0);
    }

    #[test]
    fn offset_moves_hours_into_local_time() {
        let h: VecDeque<_> = (0..5).map(|d| warmup_at(d, 0)).collect();
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let detection = detect(&h, &TimingParams::default(), plus_two).unwrap().unwrap();
        let PatternCharacteristics::SessionTiming(t) = detection.characteristics else {
            panic!("wrong characteristics");
        };
        assert_eq!(t.preferred_hours, vec![21]);
    }

    #[test]
    fn hours_wrap_around_midnight() {
        // 23:00 and 00:00 alternate; base time is 19:00
        let wrapped: VecDeque<_> = (0..6).map(|d| warmup_at(d, 4 + (d % 2))).collect();
        let split: VecDeque<_> = (0..6).map(|d| warmup_at(d, -7 + (d % 2) * 12)).collect();

        let score = |h: &VecDeque<ControlInteraction>| {
            let detection = detect(h, &TimingParams::default(), utc()).unwrap().unwrap();
            let PatternCharacteristics::SessionTiming(t) = detection.characteristics else {
                panic!("wrong characteristics");
            };
            t.timing_consistency
        };
        assert!(score(&wrapped) > score(&split));
        assert!(circular_hour_variance(&[23.0, 0.0]) < 1.0);
        assert!(circular_hour_variance(&[7.0, 7.0, 7.0]) < 1e-9);
        assert!(circular_hour_variance(&[0.0, 12.0]) > 100.0);
    }
}
