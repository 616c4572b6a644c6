use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::practice::stats::clamp_score;
use crate::practice::types::{
    AdaptiveSettingsPlan, AutomationConfig, BehaviorPattern, IntervalRange, LearningStyle,
    PatternType, PracticeSuggestion, ProgressMetrics, SessionStructurePlan, SkillArea,
    SuggestionParameters, SuggestionPriority, SuggestionType, TempoProgressionPlan, TempoStyle,
    TranspositionPlan, UserPreferences,
};

const TEMPO_STRUGGLE_LEVEL: f64 = 70.0;
const TEMPO_READY_LEVEL: f64 = 80.0;
const TRANSPOSITION_EXPAND_LEVEL: f64 = 70.0;
const TRANSPOSITION_STRUGGLE_LEVEL: f64 = 60.0;
const ROUTINE_CONSISTENCY_FLOOR: f64 = 50.0;
const CRITICAL_WEAKNESS_LEVEL: f64 = 40.0;
const TIMING_HABIT_CONSISTENCY: f64 = 70.0;
const TRUSTED_PATTERN_CONFIDENCE: f64 = 70.0;
const AUTOMATION_READY_PROGRESS: f64 = 50.0;

const DEFAULT_KEY_SEQUENCE: [&str; 4] = ["C", "G", "D", "F"];
const DEFAULT_OPENING: [&str; 3] = ["playback:play", "tempo:setTempo", "state:saveState"];

/// Produces ranked suggestions and keeps the latest batch addressable by id.
#[derive(Default)]
pub struct SuggestionEngine {
    cache: Vec<PracticeSuggestion>,
    by_id: HashMap<String, usize>,
}

impl SuggestionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate_suggestions(
        &mut self,
        patterns: &[BehaviorPattern],
        progress: &ProgressMetrics,
    ) -> Vec<PracticeSuggestion> {
        let find = |t: PatternType| patterns.iter().find(|p| p.pattern_type == t);

        let mut suggestions = Vec::new();
        suggestions.extend(tempo_suggestions(find(PatternType::TempoProgression), progress));
        suggestions.extend(transposition_suggestions(
            find(PatternType::TranspositionPreference),
            progress,
        ));
        suggestions.extend(session_structure_suggestions(
            find(PatternType::PracticeRoutine),
            find(PatternType::SessionTiming),
            progress,
        ));
        suggestions.extend(automation_suggestions(
            find(PatternType::LearningStyle),
            find(PatternType::TempoProgression),
            progress,
        ));

        sort_suggestions(&mut suggestions);

        self.by_id = suggestions
            .iter()
            .enumerate()
            .map(|(idx, s)| (s.id.clone(), idx))
            .collect();
        self.cache = suggestions.clone();

        debug!(count = suggestions.len(), "practice suggestions generated");
        suggestions
    }

    pub fn cached_suggestions(&self) -> &[PracticeSuggestion] {
        &self.cache
    }

    pub fn suggestion(&self, id: &str) -> Option<&PracticeSuggestion> {
        self.by_id.get(id).and_then(|idx| self.cache.get(*idx))
    }

    /// Maps extracted preferences into a full plan; anything unknown keeps its default.
    pub fn generate_optimal_automation(
        &self,
        preferences: &UserPreferences,
        now: DateTime<Utc>,
    ) -> AutomationConfig {
        AutomationConfig {
            tempo_progression: tempo_plan(preferences),
            transposition_sequence: transposition_plan(preferences),
            session_structure: session_plan(preferences),
            adaptive_settings: adaptive_plan(preferences),
            generated_at: now,
        }
    }
}

/// Priority descending, then confidence descending.
pub fn sort_suggestions(suggestions: &mut [PracticeSuggestion]) {
    suggestions.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(b.confidence.total_cmp(&a.confidence))
    });
}

#[allow(clippy::too_many_arguments)]
fn create_suggestion(
    suggestion_type: SuggestionType,
    priority: SuggestionPriority,
    confidence: f64,
    title: &str,
    description: String,
    parameters: SuggestionParameters,
    expected_benefit: &str,
    estimated_impact: f64,
) -> PracticeSuggestion {
    PracticeSuggestion {
        id: uuid::Uuid::new_v4().to_string(),
        suggestion_type,
        priority,
        confidence: clamp_score(confidence),
        title: title.to_string(),
        description,
        actionable: !matches!(parameters, SuggestionParameters::None),
        parameters,
        expected_benefit: expected_benefit.to_string(),
        estimated_impact: clamp_score(estimated_impact),
    }
}

fn tempo_suggestions(
    pattern: Option<&BehaviorPattern>,
    progress: &ProgressMetrics,
) -> Vec<PracticeSuggestion> {
    let mut out = Vec::new();
    let Some((pattern, traits)) = pattern.and_then(|p| p.tempo().map(|t| (p, t))) else {
        return out;
    };
    let level = progress.level(SkillArea::TempoControl);

    if traits.preferred_style == TempoStyle::Large && level < TEMPO_STRUGGLE_LEVEL {
        out.push(create_suggestion(
            SuggestionType::TempoProgression,
            SuggestionPriority::High,
            pattern.confidence,
            "Try gradual tempo increases",
            format!(
                "You usually change tempo by about {:.0} BPM at a time while tempo control sits at {:.0}. Smaller steps build accuracy faster.",
                traits.average_change, level
            ),
            SuggestionParameters::TempoRamp {
                increment_bpm: 3.0,
                interval_minutes: 5,
            },
            "Steadier accuracy while speeding up",
            75.0,
        ));
    } else if traits.preferred_style == TempoStyle::Gradual && level >= TEMPO_READY_LEVEL {
        out.push(create_suggestion(
            SuggestionType::TempoProgression,
            SuggestionPriority::Medium,
            pattern.confidence * 0.9,
            "Ready for bigger tempo steps",
            format!(
                "Tempo control is at {level:.0} with small increments. Try larger jumps to reach target speed sooner."
            ),
            SuggestionParameters::TempoRamp {
                increment_bpm: 8.0,
                interval_minutes: 3,
            },
            "Reach performance tempo in fewer sessions",
            50.0,
        ));
    }

    out
}

fn transposition_suggestions(
    pattern: Option<&BehaviorPattern>,
    progress: &ProgressMetrics,
) -> Vec<PracticeSuggestion> {
    let mut out = Vec::new();
    let level = progress.level(SkillArea::Transposition);

    let Some((pattern, traits)) = pattern.and_then(|p| p.transposition().map(|t| (p, t))) else {
        let practiced = progress
            .skill(SkillArea::Transposition)
            .is_some_and(|s| s.last_practiced.is_some());
        if !practiced && progress.overall_progress > 0.0 {
            out.push(create_suggestion(
                SuggestionType::TranspositionPractice,
                SuggestionPriority::Low,
                50.0,
                "Explore transposition",
                "Playing the same material in a nearby key strengthens ear and hand independence."
                    .to_string(),
                SuggestionParameters::Transposition {
                    max_interval: 2,
                    keys: Vec::new(),
                },
                "Broader musical flexibility",
                30.0,
            ));
        }
        return out;
    };

    if traits.preferred_range == IntervalRange::Small && level >= TRANSPOSITION_EXPAND_LEVEL {
        let mut keys = traits.favorite_keys.clone();
        for key in DEFAULT_KEY_SEQUENCE {
            if keys.len() >= 4 {
                break;
            }
            if !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
        }
        out.push(create_suggestion(
            SuggestionType::TranspositionPractice,
            SuggestionPriority::Medium,
            pattern.confidence,
            "Expand your transposition range",
            format!(
                "You mostly shift by {:.1} semitones and handle it well. Try intervals up to a fourth.",
                traits.average_interval
            ),
            SuggestionParameters::Transposition {
                max_interval: 5,
                keys,
            },
            "Comfort in more keys",
            55.0,
        ));
    } else if traits.preferred_range == IntervalRange::Large
        && level < TRANSPOSITION_STRUGGLE_LEVEL
    {
        out.push(create_suggestion(
            SuggestionType::TranspositionPractice,
            SuggestionPriority::High,
            pattern.confidence,
            "Consolidate with smaller intervals",
            format!(
                "Large key changes are costing accuracy (transposition level {level:.0}). Work up in steps of one or two semitones."
            ),
            SuggestionParameters::Transposition {
                max_interval: 2,
                keys: traits.favorite_keys.clone(),
            },
            "Fewer errors after key changes",
            65.0,
        ));
    }

    out
}

fn session_structure_suggestions(
    routine: Option<&BehaviorPattern>,
    timing: Option<&BehaviorPattern>,
    progress: &ProgressMetrics,
) -> Vec<PracticeSuggestion> {
    let mut out = Vec::new();

    if let Some((pattern, traits)) = routine.and_then(|p| p.routine().map(|t| (p, t))) {
        if traits.routine_consistency < ROUTINE_CONSISTENCY_FLOOR {
            let steps = traits
                .common_routines
                .first()
                .map(|r| r.steps.clone())
                .unwrap_or_else(|| DEFAULT_OPENING.iter().map(|s| s.to_string()).collect());
            out.push(create_suggestion(
                SuggestionType::SessionStructure,
                SuggestionPriority::High,
                pattern.confidence,
                "Build a consistent practice routine",
                format!(
                    "Only {:.0}% of your last {} sessions opened the same way. A fixed warmup makes progress easier to measure.",
                    traits.routine_consistency, traits.segment_count
                ),
                SuggestionParameters::Routine {
                    steps,
                    warmup_minutes: 5,
                },
                "More focused sessions",
                70.0,
            ));
        }
    }

    if let Some((pattern, traits)) = timing.and_then(|p| p.timing().map(|t| (p, t))) {
        if traits.timing_consistency > TIMING_HABIT_CONSISTENCY && !traits.preferred_hours.is_empty()
        {
            out.push(create_suggestion(
                SuggestionType::SessionStructure,
                SuggestionPriority::Low,
                pattern.confidence,
                "Keep your practice time",
                format!(
                    "You usually start around {}:00. Scheduling sessions then helps the habit stick.",
                    traits.preferred_hours[0]
                ),
                SuggestionParameters::Schedule {
                    preferred_hours: traits.preferred_hours.clone(),
                },
                "A steadier practice streak",
                25.0,
            ));
        }
    }

    for area in &progress.weaknesses {
        let level = progress.level(*area);
        let priority = if level < CRITICAL_WEAKNESS_LEVEL {
            SuggestionPriority::Critical
        } else {
            SuggestionPriority::High
        };
        out.push(create_suggestion(
            SuggestionType::SkillFocus,
            priority,
            100.0 - level,
            &format!("Focus on {}", area.label().to_lowercase()),
            format!(
                "{} is at {level:.0}, your weakest area. Dedicate the first block of each session to it.",
                area.label()
            ),
            SuggestionParameters::SkillFocus {
                area: *area,
                target_level: (level + 15.0).min(100.0),
            },
            "Balanced skill development",
            80.0,
        ));
    }

    out
}

fn automation_suggestions(
    learning_style: Option<&BehaviorPattern>,
    tempo: Option<&BehaviorPattern>,
    progress: &ProgressMetrics,
) -> Vec<PracticeSuggestion> {
    let mut out = Vec::new();

    if let Some((pattern, traits)) = learning_style.and_then(|p| p.learning_style().map(|t| (p, t)))
    {
        if traits.dominant_style != LearningStyle::Mixed
            && pattern.confidence > TRUSTED_PATTERN_CONFIDENCE
        {
            let style = traits.dominant_style;
            out.push(create_suggestion(
                SuggestionType::Automation,
                SuggestionPriority::Medium,
                pattern.confidence,
                "Match feedback to how you learn",
                format!(
                    "Most of your practice leans {}. Switch feedback cues to match.",
                    style_label(style)
                ),
                SuggestionParameters::Feedback { style },
                "Faster feedback loops",
                45.0,
            ));
        }
    }

    if let Some((pattern, traits)) = tempo.and_then(|p| p.tempo().map(|t| (p, t))) {
        if pattern.confidence > TRUSTED_PATTERN_CONFIDENCE
            && progress.overall_progress >= AUTOMATION_READY_PROGRESS
        {
            let (increment_bpm, interval_minutes) = tempo_increment(traits.preferred_style);
            out.push(create_suggestion(
                SuggestionType::Automation,
                SuggestionPriority::Low,
                pattern.confidence * 0.8,
                "Automate tempo ramps",
                "Let the metronome raise the tempo for you using your usual step size.".to_string(),
                SuggestionParameters::TempoRamp {
                    increment_bpm,
                    interval_minutes,
                },
                "Less time spent adjusting controls",
                40.0,
            ));
        }
    }

    out
}

fn style_label(style: LearningStyle) -> &'static str {
    match style {
        LearningStyle::Visual => "visual",
        LearningStyle::Auditory => "auditory",
        LearningStyle::Kinesthetic => "hands-on",
        LearningStyle::Mixed => "mixed",
    }
}

fn tempo_increment(style: TempoStyle) -> (f64, u32) {
    match style {
        TempoStyle::Gradual => (3.0, 5),
        TempoStyle::Step => (8.0, 3),
        // large jumpers are steered toward medium steps
        TempoStyle::Large => (5.0, 4),
    }
}

fn tempo_plan(prefs: &UserPreferences) -> TempoProgressionPlan {
    match &prefs.tempo {
        Some(t) => {
            let (increment_bpm, increment_every_minutes) = tempo_increment(t.preferred_style);
            let (start_percentage, max_increase_per_session) = match t.preferred_style {
                TempoStyle::Gradual => (70.0, 15.0),
                TempoStyle::Step => (80.0, 25.0),
                TempoStyle::Large => (75.0, 20.0),
            };
            TempoProgressionPlan {
                enabled: true,
                style: t.preferred_style,
                increment_bpm,
                increment_every_minutes,
                start_percentage,
                max_increase_per_session,
            }
        }
        None => TempoProgressionPlan {
            enabled: false,
            style: TempoStyle::Gradual,
            increment_bpm: 3.0,
            increment_every_minutes: 5,
            start_percentage: 70.0,
            max_increase_per_session: 15.0,
        },
    }
}

fn transposition_plan(prefs: &UserPreferences) -> TranspositionPlan {
    let default_keys = || DEFAULT_KEY_SEQUENCE.iter().map(|k| k.to_string()).collect();
    match &prefs.transposition {
        Some(t) => TranspositionPlan {
            enabled: true,
            max_interval: match t.preferred_range {
                IntervalRange::Small => 2,
                IntervalRange::Medium => 5,
                IntervalRange::Large => 7,
            },
            key_sequence: if t.favorite_keys.is_empty() {
                default_keys()
            } else {
                t.favorite_keys.clone()
            },
            change_every_minutes: 10,
        },
        None => TranspositionPlan {
            enabled: false,
            max_interval: 2,
            key_sequence: default_keys(),
            change_every_minutes: 10,
        },
    }
}

fn session_plan(prefs: &UserPreferences) -> SessionStructurePlan {
    let mut plan = SessionStructurePlan {
        warmup_minutes: 5,
        focus_minutes: 20,
        review_minutes: 5,
        break_every_minutes: 25,
        opening_steps: DEFAULT_OPENING.iter().map(|s| s.to_string()).collect(),
        preferred_hours: Vec::new(),
    };

    if let Some(routine) = &prefs.routine {
        if routine.routine_consistency < ROUTINE_CONSISTENCY_FLOOR {
            plan.warmup_minutes = 10;
        }
        if let Some(top) = routine.common_routines.first() {
            plan.opening_steps = top.steps.clone();
        }
        let available = routine.average_segment_minutes
            - (plan.warmup_minutes + plan.review_minutes) as f64;
        plan.focus_minutes = available.round().clamp(15.0, 60.0) as u32;
    }

    if let Some(timing) = &prefs.timing {
        plan.preferred_hours = timing.preferred_hours.clone();
    }

    plan
}

fn adaptive_plan(prefs: &UserPreferences) -> AdaptiveSettingsPlan {
    let style = prefs
        .learning_style
        .as_ref()
        .map(|l| l.dominant_style)
        .unwrap_or_default();
    let mixed = style == LearningStyle::Mixed;

    AdaptiveSettingsPlan {
        feedback_style: style,
        visual_cues: mixed || style == LearningStyle::Visual,
        audio_cues: mixed || style == LearningStyle::Auditory,
        haptic_cues: mixed || style == LearningStyle::Kinesthetic,
        auto_slow_down: true,
        slow_down_error_threshold: 3,
        difficulty_adjustment: true,
    }
}
