use std::collections::VecDeque;

use super::{recent, Detection};
use crate::practice::config::LearningStyleParams;
use crate::practice::error::{ensure_finite, AnalysisError, Component};
use crate::practice::types::{
    ControlInteraction, ControllerType, LearningStyle, LearningStyleTraits, PatternCharacteristics,
};

#[derive(Debug, Default, Clone, Copy)]
struct StyleHits {
    visual: f64,
    auditory: f64,
    kinesthetic: f64,
}

impl StyleHits {
    fn add(&mut self, interaction: &ControlInteraction) {
        let m = interaction.modality;
        if m.any() {
            if m.visual_feedback {
                self.visual += 1.0;
            }
            if m.audio_feedback {
                self.auditory += 1.0;
            }
            if m.hands_on {
                self.kinesthetic += 1.0;
            }
            return;
        }

        match interaction.controller {
            ControllerType::Playback | ControllerType::Synchronization => self.auditory += 1.0,
            ControllerType::Tempo | ControllerType::Transposition => self.kinesthetic += 1.0,
            ControllerType::State => self.visual += 1.0,
        }
    }

    fn total(&self) -> f64 {
        self.visual + self.auditory + self.kinesthetic
    }
}

pub fn detect(
    history: &VecDeque<ControlInteraction>,
    params: &LearningStyleParams,
) -> Result<Option<Detection>, AnalysisError> {
    let samples = recent(history, params.window, |_| true);
    if samples.len() < params.min_samples {
        return Ok(None);
    }

    let mut hits = StyleHits::default();
    for interaction in &samples {
        hits.add(interaction);
    }

    let total = hits.total();
    let ratio = |v: f64| if total > 0.0 { v / total } else { 0.0 };
    let component = Component::PatternRecognizer;
    let visual_ratio = ensure_finite(component, "learning_style.visual_ratio", ratio(hits.visual))?;
    let auditory_ratio =
        ensure_finite(component, "learning_style.auditory_ratio", ratio(hits.auditory))?;
    let kinesthetic_ratio =
        ensure_finite(component, "learning_style.kinesthetic_ratio", ratio(hits.kinesthetic))?;

    let ranked = [
        (LearningStyle::Visual, visual_ratio),
        (LearningStyle::Auditory, auditory_ratio),
        (LearningStyle::Kinesthetic, kinesthetic_ratio),
    ];
    let (leader, max_ratio) = ranked
        .into_iter()
        .fold((LearningStyle::Mixed, 0.0), |best, (style, r)| {
            if r > best.1 {
                (style, r)
            } else {
                best
            }
        });

    let dominant_style = if max_ratio > params.dominance_ratio {
        leader
    } else {
        LearningStyle::Mixed
    };

    Ok(Some(Detection {
        confidence: (max_ratio * 100.0).min(params.confidence_cap),
        frequency: samples.len() as f64,
        characteristics: PatternCharacteristics::LearningStyle(LearningStyleTraits {
            dominant_style,
            visual_ratio,
            auditory_ratio,
            kinesthetic_ratio,
        }),
    }))
}
