use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ACTION_SET_TEMPO: &str = "setTempo";
pub const ACTION_TRANSPOSE: &str = "transpose";

// ============================================================================
// Controllers and interactions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerType {
    Playback,
    Tempo,
    Transposition,
    Synchronization,
    State,
}

impl ControllerType {
    pub const ALL: [ControllerType; 5] = [
        Self::Playback,
        Self::Tempo,
        Self::Transposition,
        Self::Synchronization,
        Self::State,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Playback => "playback",
            Self::Tempo => "tempo",
            Self::Transposition => "transposition",
            Self::Synchronization => "synchronization",
            Self::State => "state",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "playback" => Some(Self::Playback),
            "tempo" => Some(Self::Tempo),
            "transposition" => Some(Self::Transposition),
            "synchronization" | "sync" => Some(Self::Synchronization),
            "state" => Some(Self::State),
            _ => None,
        }
    }

    /// Action recorded when the caller does not name one.
    pub fn default_action(&self) -> &'static str {
        match self {
            Self::Playback => "play",
            Self::Tempo => ACTION_SET_TEMPO,
            Self::Transposition => ACTION_TRANSPOSE,
            Self::Synchronization => "sync",
            Self::State => "saveState",
        }
    }
}

/// Controller-specific payload of an interaction. The variant determines the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "controller", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ControlParameters {
    Playback {
        #[serde(default)]
        position_secs: Option<f64>,
        #[serde(default)]
        loop_enabled: bool,
    },
    Tempo {
        #[serde(default)]
        target_bpm: Option<f64>,
        #[serde(default)]
        previous_bpm: Option<f64>,
    },
    Transposition {
        #[serde(default)]
        semitones: Option<i32>,
        #[serde(default)]
        target_key: Option<String>,
    },
    Synchronization {
        #[serde(default)]
        offset_ms: Option<f64>,
    },
    State {
        #[serde(default)]
        label: Option<String>,
    },
}

impl ControlParameters {
    pub fn playback() -> Self {
        Self::Playback {
            position_secs: None,
            loop_enabled: false,
        }
    }

    pub fn tempo(target_bpm: f64) -> Self {
        Self::Tempo {
            target_bpm: Some(target_bpm),
            previous_bpm: None,
        }
    }

    pub fn transpose(semitones: i32, target_key: Option<&str>) -> Self {
        Self::Transposition {
            semitones: Some(semitones),
            target_key: target_key.map(str::to_string),
        }
    }

    pub fn sync(offset_ms: f64) -> Self {
        Self::Synchronization {
            offset_ms: Some(offset_ms),
        }
    }

    pub fn state(label: &str) -> Self {
        Self::State {
            label: Some(label.to_string()),
        }
    }

    pub fn controller(&self) -> ControllerType {
        match self {
            Self::Playback { .. } => ControllerType::Playback,
            Self::Tempo { .. } => ControllerType::Tempo,
            Self::Transposition { .. } => ControllerType::Transposition,
            Self::Synchronization { .. } => ControllerType::Synchronization,
            Self::State { .. } => ControllerType::State,
        }
    }

    pub fn target_bpm(&self) -> Option<f64> {
        match self {
            Self::Tempo { target_bpm, .. } => *target_bpm,
            _ => None,
        }
    }

    pub fn semitones(&self) -> Option<i32> {
        match self {
            Self::Transposition { semitones, .. } => *semitones,
            _ => None,
        }
    }

    pub fn target_key(&self) -> Option<&str> {
        match self {
            Self::Transposition { target_key, .. } => target_key.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum SessionPhase {
    Warmup,
    #[default]
    Practice,
    Review,
    Cooldown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

/// Feedback channels that were active when a control fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModalityFlags {
    pub visual_feedback: bool,
    pub audio_feedback: bool,
    pub hands_on: bool,
}

impl ModalityFlags {
    pub fn any(&self) -> bool {
        self.visual_feedback || self.audio_feedback || self.hands_on
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionContext {
    pub session_phase: SessionPhase,
    pub time_in_session_ms: i64,
    pub user_intent: Option<String>,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSnapshot {
    pub response_time_ms: f64,
    pub accuracy: f64,
    pub confidence: f64,
    pub error_count: u32,
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlInteraction {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub controller: ControllerType,
    pub action: String,
    pub parameters: ControlParameters,
    pub context: InteractionContext,
    pub performance: PerformanceSnapshot,
    pub modality: ModalityFlags,
}

impl ControlInteraction {
    /// `controller:action`, the unit of routine signatures and usage counts.
    pub fn signature(&self) -> String {
        format!("{}:{}", self.controller.as_str(), self.action)
    }

    pub fn is_action(&self, controller: ControllerType, action: &str) -> bool {
        self.controller == controller && self.action == action
    }
}

/// Inbound usage report from a controller. Absent fields are filled from
/// [`InteractionDefaults`](crate::practice::config::InteractionDefaults).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlUsage {
    pub parameters: ControlParameters,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub response_time_ms: Option<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub error_count: Option<u32>,
    #[serde(default)]
    pub success_rate: Option<f64>,
    #[serde(default)]
    pub modality: ModalityFlags,
    #[serde(default)]
    pub session_phase: Option<SessionPhase>,
    #[serde(default)]
    pub user_intent: Option<String>,
}

impl ControlUsage {
    pub fn new(parameters: ControlParameters) -> Self {
        Self {
            parameters,
            action: None,
            response_time_ms: None,
            accuracy: None,
            confidence: None,
            error_count: None,
            success_rate: None,
            modality: ModalityFlags::default(),
            session_phase: None,
            user_intent: None,
        }
    }

    pub fn controller(&self) -> ControllerType {
        self.parameters.controller()
    }

    pub fn with_action(mut self, action: &str) -> Self {
        self.action = Some(action.to_string());
        self
    }

    pub fn with_response_time(mut self, response_time_ms: f64) -> Self {
        self.response_time_ms = Some(response_time_ms);
        self
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn with_success_rate(mut self, success_rate: f64) -> Self {
        self.success_rate = Some(success_rate);
        self
    }

    pub fn with_errors(mut self, error_count: u32) -> Self {
        self.error_count = Some(error_count);
        self
    }

    pub fn with_phase(mut self, phase: SessionPhase) -> Self {
        self.session_phase = Some(phase);
        self
    }

    pub fn with_modality(mut self, modality: ModalityFlags) -> Self {
        self.modality = modality;
        self
    }
}

// ============================================================================
// Sessions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum SessionType {
    #[default]
    Practice,
    Performance,
    Lesson,
    Warmup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    #[default]
    Evening,
    Night,
}

impl TimeOfDay {
    pub const ALL: [TimeOfDay; 4] = [Self::Morning, Self::Afternoon, Self::Evening, Self::Night];

    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=21 => Self::Evening,
            _ => Self::Night,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeContext {
    pub session_type: SessionType,
    pub focus_area: Option<SkillArea>,
    pub goal: Option<String>,
    pub difficulty: Difficulty,
    pub time_of_day: Option<TimeOfDay>,
    pub environment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQualityMetrics {
    pub accuracy: f64,
    pub consistency: f64,
    pub engagement: f64,
    pub completion_rate: f64,
    pub error_rate: f64,
    pub focus: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSession {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: i64,
    pub control_interactions: Vec<ControlInteraction>,
    pub quality_metrics: SessionQualityMetrics,
    pub achievements: Vec<Achievement>,
    pub context: PracticeContext,
}

impl PracticeSession {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration_ms as f64 / 60_000.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlUsageCount {
    pub controller: ControllerType,
    pub action: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_sessions: usize,
    pub total_practice_minutes: f64,
    pub average_session_minutes: f64,
    pub streak_days: u32,
    pub favorite_time_of_day: TimeOfDay,
    pub most_used_controls: Vec<ControlUsageCount>,
    pub improvement_highlights: Vec<String>,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self {
            total_sessions: 0,
            total_practice_minutes: 0.0,
            average_session_minutes: 0.0,
            streak_days: 0,
            favorite_time_of_day: TimeOfDay::Evening,
            most_used_controls: Vec::new(),
            improvement_highlights: Vec::new(),
        }
    }
}

// ============================================================================
// Behavior patterns
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    TempoProgression,
    TranspositionPreference,
    PracticeRoutine,
    LearningStyle,
    SessionTiming,
}

impl PatternType {
    pub const ALL: [PatternType; 5] = [
        Self::TempoProgression,
        Self::TranspositionPreference,
        Self::PracticeRoutine,
        Self::LearningStyle,
        Self::SessionTiming,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TempoProgression => "tempo_progression",
            Self::TranspositionPreference => "transposition_preference",
            Self::PracticeRoutine => "practice_routine",
            Self::LearningStyle => "learning_style",
            Self::SessionTiming => "session_timing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum PatternTrend {
    Increasing,
    Decreasing,
    #[default]
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempoStyle {
    Gradual,
    Step,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalRange {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum LearningStyle {
    Visual,
    Auditory,
    Kinesthetic,
    #[default]
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempoProgressionTraits {
    pub preferred_style: TempoStyle,
    pub gradual_changes: usize,
    pub step_changes: usize,
    pub large_changes: usize,
    pub average_change: f64,
    pub min_bpm: f64,
    pub max_bpm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranspositionTraits {
    pub preferred_range: IntervalRange,
    pub small_shifts: usize,
    pub medium_shifts: usize,
    pub large_shifts: usize,
    pub average_interval: f64,
    pub favorite_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutineSignature {
    pub steps: Vec<String>,
    pub occurrences: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeRoutineTraits {
    pub segment_count: usize,
    pub common_routines: Vec<RoutineSignature>,
    pub routine_consistency: f64,
    pub average_segment_minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningStyleTraits {
    pub dominant_style: LearningStyle,
    pub visual_ratio: f64,
    pub auditory_ratio: f64,
    pub kinesthetic_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTimingTraits {
    /// Local hours of day, most frequent first.
    pub preferred_hours: Vec<u32>,
    /// Days from Monday (0) to Sunday (6), most frequent first.
    pub preferred_weekdays: Vec<u32>,
    pub timing_consistency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "traits", rename_all = "snake_case")]
pub enum PatternCharacteristics {
    TempoProgression(TempoProgressionTraits),
    TranspositionPreference(TranspositionTraits),
    PracticeRoutine(PracticeRoutineTraits),
    LearningStyle(LearningStyleTraits),
    SessionTiming(SessionTimingTraits),
}

impl PatternCharacteristics {
    pub fn pattern_type(&self) -> PatternType {
        match self {
            Self::TempoProgression(_) => PatternType::TempoProgression,
            Self::TranspositionPreference(_) => PatternType::TranspositionPreference,
            Self::PracticeRoutine(_) => PatternType::PracticeRoutine,
            Self::LearningStyle(_) => PatternType::LearningStyle,
            Self::SessionTiming(_) => PatternType::SessionTiming,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorPattern {
    pub id: String,
    pub pattern_type: PatternType,
    pub confidence: f64,
    pub frequency: f64,
    pub last_detected: DateTime<Utc>,
    pub characteristics: PatternCharacteristics,
    pub trend: PatternTrend,
}

impl BehaviorPattern {
    pub fn tempo(&self) -> Option<&TempoProgressionTraits> {
        match &self.characteristics {
            PatternCharacteristics::TempoProgression(t) => Some(t),
            _ => None,
        }
    }

    pub fn transposition(&self) -> Option<&TranspositionTraits> {
        match &self.characteristics {
            PatternCharacteristics::TranspositionPreference(t) => Some(t),
            _ => None,
        }
    }

    pub fn routine(&self) -> Option<&PracticeRoutineTraits> {
        match &self.characteristics {
            PatternCharacteristics::PracticeRoutine(t) => Some(t),
            _ => None,
        }
    }

    pub fn learning_style(&self) -> Option<&LearningStyleTraits> {
        match &self.characteristics {
            PatternCharacteristics::LearningStyle(t) => Some(t),
            _ => None,
        }
    }

    pub fn timing(&self) -> Option<&SessionTimingTraits> {
        match &self.characteristics {
            PatternCharacteristics::SessionTiming(t) => Some(t),
            _ => None,
        }
    }
}

/// Characteristics of every pattern trusted enough to personalize automation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub tempo: Option<TempoProgressionTraits>,
    pub transposition: Option<TranspositionTraits>,
    pub routine: Option<PracticeRoutineTraits>,
    pub learning_style: Option<LearningStyleTraits>,
    pub timing: Option<SessionTimingTraits>,
}

impl UserPreferences {
    pub fn is_empty(&self) -> bool {
        self.tempo.is_none()
            && self.transposition.is_none()
            && self.routine.is_none()
            && self.learning_style.is_none()
            && self.timing.is_none()
    }
}

// ============================================================================
// Progress and achievements
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillArea {
    TempoControl,
    Transposition,
    TimingAccuracy,
    Consistency,
    Technique,
}

impl SkillArea {
    pub const ALL: [SkillArea; 5] = [
        Self::TempoControl,
        Self::Transposition,
        Self::TimingAccuracy,
        Self::Consistency,
        Self::Technique,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TempoControl => "tempo_control",
            Self::Transposition => "transposition",
            Self::TimingAccuracy => "timing_accuracy",
            Self::Consistency => "consistency",
            Self::Technique => "technique",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::TempoControl => "Tempo control",
            Self::Transposition => "Transposition",
            Self::TimingAccuracy => "Timing accuracy",
            Self::Consistency => "Consistency",
            Self::Technique => "Technique",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum TrendDirection {
    Improving,
    #[default]
    Stable,
    Declining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum ImprovementTrend {
    Accelerating,
    #[default]
    Steady,
    Plateauing,
    Declining,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillAreaProgress {
    pub area: SkillArea,
    pub current_level: f64,
    pub previous_level: f64,
    pub improvement: f64,
    pub trend: TrendDirection,
    pub practice_minutes: f64,
    pub last_practiced: Option<DateTime<Utc>>,
}

impl SkillAreaProgress {
    pub fn empty(area: SkillArea) -> Self {
        Self {
            area,
            current_level: 0.0,
            previous_level: 0.0,
            improvement: 0.0,
            trend: TrendDirection::Stable,
            practice_minutes: 0.0,
            last_practiced: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressMetrics {
    pub skill_areas: Vec<SkillAreaProgress>,
    pub overall_progress: f64,
    pub learning_velocity: f64,
    pub consistency_score: f64,
    pub improvement_trend: ImprovementTrend,
    pub next_milestone: f64,
    pub time_to_next_milestone_days: f64,
    pub strengths: Vec<SkillArea>,
    pub weaknesses: Vec<SkillArea>,
}

impl ProgressMetrics {
    pub fn skill(&self, area: SkillArea) -> Option<&SkillAreaProgress> {
        self.skill_areas.iter().find(|s| s.area == area)
    }

    pub fn level(&self, area: SkillArea) -> f64 {
        self.skill(area).map(|s| s.current_level).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementType {
    FirstSession,
    SessionCount,
    Streak,
    ProgressMilestone,
    SkillMastery,
}

impl AchievementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstSession => "first_session",
            Self::SessionCount => "session_count",
            Self::Streak => "streak",
            Self::ProgressMilestone => "progress_milestone",
            Self::SkillMastery => "skill_mastery",
        }
    }

    /// Threshold-crossing achievements, announced as milestones as well.
    pub fn is_milestone(&self) -> bool {
        matches!(
            self,
            Self::SessionCount | Self::Streak | Self::ProgressMilestone
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AchievementCategory {
    Dedication,
    Consistency,
    Progress,
    Skill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    #[serde(rename = "type")]
    pub achievement_type: AchievementType,
    pub title: String,
    pub description: String,
    pub value: f64,
    pub category: AchievementCategory,
    pub rarity: Rarity,
    pub earned_at: DateTime<Utc>,
}

// ============================================================================
// Suggestions and automation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionType {
    TempoProgression,
    TranspositionPractice,
    SessionStructure,
    Automation,
    SkillFocus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionPriority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SuggestionParameters {
    TempoRamp {
        increment_bpm: f64,
        interval_minutes: u32,
    },
    Transposition {
        max_interval: i32,
        keys: Vec<String>,
    },
    Routine {
        steps: Vec<String>,
        warmup_minutes: u32,
    },
    Schedule {
        preferred_hours: Vec<u32>,
    },
    Feedback {
        style: LearningStyle,
    },
    SkillFocus {
        area: SkillArea,
        target_level: f64,
    },
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSuggestion {
    pub id: String,
    #[serde(rename = "type")]
    pub suggestion_type: SuggestionType,
    pub priority: SuggestionPriority,
    pub confidence: f64,
    pub title: String,
    pub description: String,
    pub actionable: bool,
    pub parameters: SuggestionParameters,
    pub expected_benefit: String,
    pub estimated_impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempoProgressionPlan {
    pub enabled: bool,
    pub style: TempoStyle,
    pub increment_bpm: f64,
    pub increment_every_minutes: u32,
    pub start_percentage: f64,
    pub max_increase_per_session: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranspositionPlan {
    pub enabled: bool,
    pub max_interval: i32,
    pub key_sequence: Vec<String>,
    pub change_every_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStructurePlan {
    pub warmup_minutes: u32,
    pub focus_minutes: u32,
    pub review_minutes: u32,
    pub break_every_minutes: u32,
    pub opening_steps: Vec<String>,
    pub preferred_hours: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveSettingsPlan {
    pub feedback_style: LearningStyle,
    pub visual_cues: bool,
    pub audio_cues: bool,
    pub haptic_cues: bool,
    pub auto_slow_down: bool,
    pub slow_down_error_threshold: u32,
    pub difficulty_adjustment: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationConfig {
    pub tempo_progression: TempoProgressionPlan,
    pub transposition_sequence: TranspositionPlan,
    pub session_structure: SessionStructurePlan,
    pub adaptive_settings: AdaptiveSettingsPlan,
    pub generated_at: DateTime<Utc>,
}

// ============================================================================
// Insights
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeTrends {
    pub accuracy_trend: TrendDirection,
    pub accuracy_change: f64,
    pub frequency_trend: TrendDirection,
    pub sessions_last_7_days: usize,
    pub sessions_prior_7_days: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeInsights {
    pub generated_at: DateTime<Utc>,
    pub sessions: Vec<PracticeSession>,
    pub patterns: Vec<BehaviorPattern>,
    pub progress: ProgressMetrics,
    pub suggestions: Vec<PracticeSuggestion>,
    pub session_stats: SessionStats,
    pub trends: PracticeTrends,
    pub achievements: Vec<Achievement>,
}
