use std::collections::{HashMap, VecDeque};

use chrono::Duration;

use super::{recent, Detection};
use crate::practice::config::RoutineParams;
use crate::practice::error::{ensure_finite, AnalysisError, Component};
use crate::practice::stats::mean;
use crate::practice::types::{
    ControlInteraction, PatternCharacteristics, PracticeRoutineTraits, RoutineSignature,
};

/// Splits chronologically ordered interactions wherever the gap to the previous
/// one is longer than `gap`.
pub fn segment<'a>(
    interactions: &[&'a ControlInteraction],
    gap: Duration,
) -> Vec<Vec<&'a ControlInteraction>> {
    let mut segments: Vec<Vec<&ControlInteraction>> = Vec::new();
    for &interaction in interactions {
        let continues = segments
            .last()
            .and_then(|seg| seg.last())
            .is_some_and(|prev| interaction.timestamp - prev.timestamp <= gap);

        if !continues {
            segments.push(Vec::new());
        }
        if let Some(current) = segments.last_mut() {
            current.push(interaction);
        }
    }
    segments
}

pub fn detect(
    history: &VecDeque<ControlInteraction>,
    params: &RoutineParams,
) -> Result<Option<Detection>, AnalysisError> {
    let window = recent(history, params.window, |_| true);
    if window.len() < params.min_interactions {
        return Ok(None);
    }

    let gap = Duration::try_minutes(params.segment_gap_minutes).ok_or_else(|| {
        AnalysisError::InvalidParameter {
            component: Component::PatternRecognizer,
            parameter: "routine.segment_gap_minutes".to_string(),
            value: params.segment_gap_minutes.to_string(),
        }
    })?;
    let segments = segment(&window, gap);
    if segments.len() < params.min_segments {
        return Ok(None);
    }

    // first-seen order breaks ties between equally common routines
    let mut order: Vec<Vec<String>> = Vec::new();
    let mut counts: HashMap<Vec<String>, usize> = HashMap::new();
    for seg in &segments {
        let steps: Vec<String> = seg
            .iter()
            .take(params.signature_length)
            .map(|i| i.signature())
            .collect();
        let count = counts.entry(steps.clone()).or_insert(0);
        if *count == 0 {
            order.push(steps);
        }
        *count += 1;
    }

    let mut common_routines: Vec<RoutineSignature> = order
        .into_iter()
        .filter_map(|steps| {
            let occurrences = counts.get(&steps).copied().unwrap_or(0);
            (occurrences >= params.min_repeats).then_some(RoutineSignature { steps, occurrences })
        })
        .collect();
    common_routines.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));

    let segment_count = segments.len();
    let routine_consistency = common_routines
        .first()
        .map(|r| r.occurrences as f64 / segment_count as f64 * 100.0)
        .unwrap_or(0.0);

    let lengths: Vec<f64> = segments
        .iter()
        .filter_map(|seg| {
            let first = seg.first()?;
            let last = seg.last()?;
            Some((last.timestamp - first.timestamp).num_milliseconds() as f64 / 60_000.0)
        })
        .collect();
    let average_segment_minutes = ensure_finite(
        Component::PatternRecognizer,
        "practice_routine.average_segment_minutes",
        mean(&lengths),
    )?;

    let count = segment_count as f64;
    Ok(Some(Detection {
        confidence: (count * params.confidence_per_segment).min(params.confidence_cap),
        frequency: count,
        characteristics: PatternCharacteristics::PracticeRoutine(PracticeRoutineTraits {
            segment_count,
            common_routines,
            routine_consistency,
            average_segment_minutes,
        }),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::practice::modeling::test_support::*;
    use crate::practice::types::ControllerType;

    const OPENING: [ControllerType; 5] = [
        ControllerType::Playback,
        ControllerType::Tempo,
        ControllerType::Tempo,
        ControllerType::Synchronization,
        ControllerType::Playback,
    ];

    /// `sessions` blocks of `per_session` interactions, two hours apart.
    fn history(
        sessions: i64,
        per_session: i64,
        opening: impl Fn(i64) -> [ControllerType; 5],
    ) -> VecDeque<ControlInteraction> {
        let mut h = VecDeque::new();
        for s in 0..sessions {
            let start = s * 120;
            let steps = opening(s);
            for i in 0..per_session {
                let controller = if (i as usize) < steps.len() {
                    steps[i as usize]
                } else {
                    ControllerType::State
                };
                h.push_back(control_at(start + i, controller));
            }
        }
        h
    }

    #[test]
    fn segments_split_on_long_gaps() {
        let h = history(3, 4, |_| OPENING);
        let all: Vec<&ControlInteraction> = h.iter().collect();
        let segments = segment(&all, Duration::minutes(30));
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.len() == 4));
    }

    #[test]
    fn needs_enough_interactions() {
        let h = history(4, 10, |_| OPENING);
        assert!(detect(&h, &RoutineParams::default()).unwrap().is_none());
    }

    #[test]
    fn needs_enough_segments() {
        let h = history(2, 30, |_| OPENING);
        assert!(detect(&h, &RoutineParams::default()).unwrap().is_none());
    }

    #[test]
    fn repeated_opening_is_a_routine() {
        let h = history(5, 12, |s| {
            if s == 2 {
                [ControllerType::State; 5]
            } else {
                OPENING
            }
        });
        let detection = detect(&h, &RoutineParams::default()).unwrap().unwrap();
        assert_eq!(detection.frequency, 5.0);
        assert_eq!(detection.confidence, 75.0);

        let PatternCharacteristics::PracticeRoutine(t) = detection.characteristics else {
            panic!("wrong characteristics");
        };
        assert_eq!(t.segment_count, 5);
        assert_eq!(t.common_routines.len(), 1);
        assert_eq!(t.common_routines[0].occurrences, 4);
        assert_eq!(t.common_routines[0].steps[0], "playback:play");
        assert!((t.routine_consistency - 80.0).abs() < 1e-9);
        assert!((t.average_segment_minutes - 11.0).abs() < 1e-9);
    }

    #[test]
    fn no_repeats_means_zero_consistency() {
        let variants = [
            OPENING,
            [ControllerType::State; 5],
            [ControllerType::Tempo; 5],
            [ControllerType::Synchronization; 5],
            [ControllerType::Transposition; 5],
        ];
        let h = history(5, 12, |s| variants[s as usize]);
        let detection = detect(&h, &RoutineParams::default()).unwrap().unwrap();
        let PatternCharacteristics::PracticeRoutine(t) = detection.characteristics else {
            panic!("wrong characteristics");
        };
        assert!(t.common_routines.is_empty());
        assert_eq!(t.routine_consistency, 0.0);
    }

    #[test]
    fn oversized_gap_is_reported_not_panicking() {
        let h = history(5, 12, |_| OPENING);
        let params = RoutineParams {
            segment_gap_minutes: i64::MAX,
            ..Default::default()
        };
        let err = detect(&h, &params).unwrap_err();
        assert_eq!(err.component(), Component::PatternRecognizer);
        assert!(matches!(err, AnalysisError::InvalidParameter { .. }));
    }
}
