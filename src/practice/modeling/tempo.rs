use std::collections::VecDeque;

use super::{recent, Detection};
use crate::practice::config::TempoParams;
use crate::practice::error::{ensure_finite, AnalysisError, Component};
use crate::practice::stats::mean;
use crate::practice::types::{
    ControlInteraction, ControllerType, PatternCharacteristics, TempoProgressionTraits, TempoStyle,
    ACTION_SET_TEMPO,
};

pub fn detect(
    history: &VecDeque<ControlInteraction>,
    params: &TempoParams,
) -> Result<Option<Detection>, AnalysisError> {
    let samples = recent(history, params.window, |i| {
        i.is_action(ControllerType::Tempo, ACTION_SET_TEMPO) && i.parameters.target_bpm().is_some()
    });
    if samples.len() < params.min_samples {
        return Ok(None);
    }

    let bpms: Vec<f64> = samples
        .iter()
        .filter_map(|i| i.parameters.target_bpm())
        .collect();
    let deltas: Vec<f64> = bpms.windows(2).map(|w| (w[1] - w[0]).abs()).collect();

    let (mut gradual, mut step, mut large) = (0usize, 0usize, 0usize);
    for delta in &deltas {
        if *delta <= params.gradual_max_delta {
            gradual += 1;
        } else if *delta <= params.step_max_delta {
            step += 1;
        } else {
            large += 1;
        }
    }

    let preferred_style = if gradual >= step && gradual >= large {
        TempoStyle::Gradual
    } else if step >= large {
        TempoStyle::Step
    } else {
        TempoStyle::Large
    };

    let component = Component::PatternRecognizer;
    let average_change = ensure_finite(component, "tempo.average_change", mean(&deltas))?;
    let min_bpm = ensure_finite(
        component,
        "tempo.min_bpm",
        bpms.iter().copied().fold(f64::INFINITY, f64::min),
    )?;
    let max_bpm = ensure_finite(
        component,
        "tempo.max_bpm",
        bpms.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    )?;

    let count = samples.len() as f64;
    Ok(Some(Detection {
        confidence: (count * params.confidence_per_sample).min(params.confidence_cap),
        frequency: count,
        characteristics: PatternCharacteristics::TempoProgression(TempoProgressionTraits {
            preferred_style,
            gradual_changes: gradual,
            step_changes: step,
            large_changes: large,
            average_change,
            min_bpm,
            max_bpm,
        }),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::practice::modeling::test_support::*;

    fn history(bpms: &[f64]) -> VecDeque<ControlInteraction> {
        bpms.iter()
            .enumerate()
            .map(|(i, bpm)| tempo_at(i as i64, *bpm))
            .collect()
    }

    fn traits(detection: Detection) -> TempoProgressionTraits {
        match detection.characteristics {
            PatternCharacteristics::TempoProgression(t) => t,
            other => panic!("unexpected characteristics {other:?}"),
        }
    }

    #[test]
    fn below_minimum_yields_nothing() {
        let h = history(&[100.0; 9]);
        assert!(detect(&h, &TempoParams::default()).unwrap().is_none());
    }

    #[test]
    fn buckets_follow_delta_size() {
        // deltas: 3, 10, 20, 4, 12, 30, 2, 15, 16
        let h = history(&[100.0, 103.0, 113.0, 133.0, 129.0, 141.0, 111.0, 113.0, 128.0, 144.0]);
        let detection = detect(&h, &TempoParams::default()).unwrap().unwrap();
        assert_eq!(detection.frequency, 10.0);
        assert_eq!(detection.confidence, 50.0);
        let t = traits(detection);
        assert_eq!((t.gradual_changes, t.step_changes, t.large_changes), (3, 3, 3));
        // ties resolve toward the smaller bucket
        assert_eq!(t.preferred_style, TempoStyle::Gradual);
        assert_eq!(t.min_bpm, 100.0);
        assert_eq!(t.max_bpm, 144.0);
    }

    #[test]
    fn large_jumps_dominate() {
        let h = history(&[80.0, 120.0, 80.0, 120.0, 80.0, 120.0, 80.0, 120.0, 80.0, 120.0]);
        let t = traits(detect(&h, &TempoParams::default()).unwrap().unwrap());
        assert_eq!(t.preferred_style, TempoStyle::Large);
        assert_eq!(t.average_change, 40.0);
    }

    #[test]
    fn confidence_caps() {
        let h = history(&[100.0; 40]);
        let detection = detect(&h, &TempoParams::default()).unwrap().unwrap();
        assert_eq!(detection.confidence, 95.0);
    }

    #[test]
    fn non_tempo_actions_are_ignored() {
        let mut h = history(&[100.0; 9]);
        h.push_back(control_at(20, ControllerType::Playback));
        assert!(detect(&h, &TempoParams::default()).unwrap().is_none());
    }

    #[test]
    fn nan_bpm_is_a_fault() {
        let mut bpms = vec![100.0; 10];
        bpms[4] = f64::NAN;
        let err = detect(&history(&bpms), &TempoParams::default()).unwrap_err();
        assert_eq!(err.component(), Component::PatternRecognizer);
    }
}
