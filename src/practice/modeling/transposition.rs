use std::collections::{HashMap, VecDeque};

use super::{recent, Detection};
use crate::practice::config::TranspositionParams;
use crate::practice::error::AnalysisError;
use crate::practice::stats::mean;
use crate::practice::types::{
    ControlInteraction, ControllerType, IntervalRange, PatternCharacteristics, TranspositionTraits,
    ACTION_TRANSPOSE,
};

pub fn detect(
    history: &VecDeque<ControlInteraction>,
    params: &TranspositionParams,
) -> Result<Option<Detection>, AnalysisError> {
    let samples = recent(history, params.window, |i| {
        i.is_action(ControllerType::Transposition, ACTION_TRANSPOSE)
            && i.parameters.semitones().is_some()
    });
    if samples.len() < params.min_samples {
        return Ok(None);
    }

    let intervals: Vec<u32> = samples
        .iter()
        .filter_map(|i| i.parameters.semitones())
        .map(i32::unsigned_abs)
        .collect();

    let (mut small, mut medium, mut large) = (0usize, 0usize, 0usize);
    for interval in &intervals {
        if *interval <= params.small_max_semitones {
            small += 1;
        } else if *interval <= params.medium_max_semitones {
            medium += 1;
        } else {
            large += 1;
        }
    }

    let preferred_range = if small >= medium && small >= large {
        IntervalRange::Small
    } else if medium >= large {
        IntervalRange::Medium
    } else {
        IntervalRange::Large
    };

    let average_interval = mean(&intervals.iter().map(|i| *i as f64).collect::<Vec<_>>());

    let mut key_counts: HashMap<&str, usize> = HashMap::new();
    for key in samples.iter().filter_map(|i| i.parameters.target_key()) {
        *key_counts.entry(key).or_insert(0) += 1;
    }
    let mut keys: Vec<(&str, usize)> = key_counts.into_iter().collect();
    keys.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    let favorite_keys = keys
        .into_iter()
        .take(params.top_keys)
        .map(|(k, _)| k.to_string())
        .collect();

    let count = samples.len() as f64;
    Ok(Some(Detection {
        confidence: (count * params.confidence_per_sample).min(params.confidence_cap),
        frequency: count,
        characteristics: PatternCharacteristics::TranspositionPreference(TranspositionTraits {
            preferred_range,
            small_shifts: small,
            medium_shifts: medium,
            large_shifts: large,
            average_interval,
            favorite_keys,
        }),
    }))
}
