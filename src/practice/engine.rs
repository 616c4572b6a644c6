use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::core::{Clock, EventBus, EventEnvelope, PracticeEvent, SystemClock};
use crate::practice::config::EngineConfig;
use crate::practice::error::{AnalysisError, EngineError};
use crate::practice::modeling::PatternRecognizer;
use crate::practice::progress::ProgressAnalyzer;
use crate::practice::session::SessionTracker;
use crate::practice::stats::{clamp_score, mean};
use crate::practice::suggestion::SuggestionEngine;
use crate::practice::types::{
    Achievement, AutomationConfig, BehaviorPattern, ControlInteraction, ControlUsage,
    InteractionContext, PerformanceSnapshot, PracticeContext, PracticeInsights, PracticeSession,
    PracticeSuggestion, PracticeTrends, ProgressMetrics, SessionPhase, SessionStats,
    TrendDirection, UserPreferences,
};

const RECENT_WINDOW_DAYS: i64 = 7;
const ACCURACY_TREND_WINDOW: usize = 5;

struct EngineState {
    initialized: bool,
    tracker: SessionTracker,
    recognizer: PatternRecognizer,
    progress: ProgressAnalyzer,
    suggestions: SuggestionEngine,
    completed_sessions: usize,
}

impl EngineState {
    fn new(config: &EngineConfig) -> Self {
        let offset = config.local_offset();
        Self {
            initialized: false,
            tracker: SessionTracker::new(config.session.clone(), offset),
            recognizer: PatternRecognizer::new(config.patterns.clone(), offset),
            progress: ProgressAnalyzer::new(config.progress.clone()),
            suggestions: SuggestionEngine::new(),
            completed_sessions: 0,
        }
    }

    fn ensure_initialized(&self) -> Result<(), EngineError> {
        if self.initialized {
            Ok(())
        } else {
            Err(EngineError::NotInitialized)
        }
    }

    fn history(&self) -> Vec<PracticeSession> {
        self.tracker.history().iter().cloned().collect()
    }
}

/// Public entry point. Cheap to clone; clones share state and the event bus.
#[derive(Clone)]
pub struct PracticeEngine {
    config: Arc<EngineConfig>,
    clock: Arc<dyn Clock>,
    bus: Arc<EventBus>,
    state: Arc<Mutex<EngineState>>,
}

impl PracticeEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Validates `config` before building any component.
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self, EngineError> {
        config.validate()?;
        let state = EngineState::new(&config);
        Ok(Self {
            bus: Arc::new(EventBus::with_clock(Arc::clone(&clock))),
            config: Arc::new(config),
            clock,
            state: Arc::new(Mutex::new(state)),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn initialize(&self) {
        let mut state = self.state.lock();
        if state.initialized {
            return;
        }
        state.initialized = true;
        debug!("practice engine initialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    pub fn start_practice_session(
        &self,
        context: PracticeContext,
    ) -> Result<PracticeSession, EngineError> {
        let now = self.clock.now();
        let (session, events, closed_previous) = {
            let mut state = self.state.lock();
            state.ensure_initialized()?;

            let started = state.tracker.start_session(context, now);
            let mut events = Vec::new();
            let closed_previous = started.closed.is_some();
            if let Some(closed) = started.closed {
                let (_, sealed_events) = self.seal_session(&mut state, closed, now);
                events.extend(sealed_events);
            }
            events.push(PracticeEvent::SessionStarted(started.session.clone()));
            (started.session, events, closed_previous)
        };

        self.publish_all(events);
        if closed_previous {
            self.schedule_insights();
        }
        Ok(session)
    }

    /// Closes the open session. `Ok(None)` when nothing was open.
    pub fn end_practice_session(&self) -> Result<Option<PracticeSession>, EngineError> {
        let now = self.clock.now();
        let (session, events) = {
            let mut state = self.state.lock();
            state.ensure_initialized()?;

            let Some(closed) = state.tracker.end_session(now) else {
                debug!("end requested with no open session");
                return Ok(None);
            };
            self.seal_session(&mut state, closed, now)
        };

        self.publish_all(events);
        self.schedule_insights();
        Ok(Some(session))
    }

    /// Records one control usage in the open session and feeds it to the
    /// pattern recognizer. Returns the stored interaction, or `None` when the
    /// engine is not initialized or no session is open.
    pub fn track_control_usage(&self, usage: ControlUsage) -> Option<ControlInteraction> {
        let now = self.clock.now();
        let mut events = Vec::new();
        let interaction = {
            let mut state = self.state.lock();
            if !state.initialized {
                warn!(
                    controller = usage.controller().as_str(),
                    "practice engine not initialized, control usage ignored"
                );
                return None;
            }

            let Some(session) = state.tracker.current_session() else {
                debug!(
                    controller = usage.controller().as_str(),
                    "no open session, control usage ignored"
                );
                return None;
            };
            let interaction = self.build_interaction(usage, session, now);

            state.tracker.record_interaction(interaction.clone());
            let update = state.recognizer.analyze(interaction.clone(), now);
            events.extend(update.detected.into_iter().map(PracticeEvent::PatternDetected));
            events.extend(update.errors.into_iter().map(component_error));
            interaction
        };

        self.publish_all(events);
        Some(interaction)
    }

    pub fn generate_practice_insights(&self) -> Result<PracticeInsights, EngineError> {
        let now = self.clock.now();
        let mut events = Vec::new();
        let insights = {
            let mut state = self.state.lock();
            state.ensure_initialized()?;

            let sessions = state.history();
            let patterns = state.recognizer.patterns();
            let progress = self.analyze_progress(&mut state, &sessions, &patterns, &mut events);
            let suggestions = state.suggestions.generate_suggestions(&patterns, &progress);
            let session_stats = state.tracker.session_stats();
            let trends = compute_trends(&sessions, now, self.config.progress.trend_threshold);

            PracticeInsights {
                generated_at: now,
                achievements: state.progress.achievements().to_vec(),
                sessions,
                patterns,
                progress,
                suggestions,
                session_stats,
                trends,
            }
        };

        debug!(
            sessions = insights.sessions.len(),
            patterns = insights.patterns.len(),
            suggestions = insights.suggestions.len(),
            "practice insights generated"
        );

        events.push(PracticeEvent::InsightsGenerated(Box::new(insights.clone())));
        self.publish_all(events);
        Ok(insights)
    }

    /// Builds an automation plan from the confident patterns seen so far.
    pub fn adapt_automation(&self) -> Result<AutomationConfig, EngineError> {
        let now = self.clock.now();
        let config = {
            let state = self.state.lock();
            state.ensure_initialized()?;
            let preferences = state.recognizer.extract_user_preferences();
            state
                .suggestions
                .generate_optimal_automation(&preferences, now)
        };

        self.bus
            .publish(PracticeEvent::AutomationConfigGenerated(config.clone()));
        Ok(config)
    }

    /// Records an achievement granted outside the engine, e.g. by a host
    /// integration. Returns `Ok(false)` when an achievement with the same id
    /// is already recorded.
    pub fn record_achievement(&self, achievement: Achievement) -> Result<bool, EngineError> {
        let recorded = {
            let mut state = self.state.lock();
            state.ensure_initialized()?;
            state.progress.record_achievement(achievement.clone())
        };

        if recorded {
            self.bus.publish(PracticeEvent::AchievementRecorded(achievement));
        } else {
            debug!(achievement_id = %achievement.id, "achievement already recorded");
        }
        Ok(recorded)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.bus.subscribe_global()
    }

    /// Subscribes to the given event types (see [`PracticeEvent::event_type`]).
    pub fn subscribe_filtered(
        &self,
        event_types: &[&str],
    ) -> (String, broadcast::Receiver<EventEnvelope>) {
        let types = event_types.iter().map(|t| t.to_string()).collect();
        self.bus.subscribe_filtered(None, Some(types))
    }

    pub fn unsubscribe(&self, subscriber_id: &str) {
        self.bus.unsubscribe(subscriber_id);
    }

    pub fn current_session(&self) -> Option<PracticeSession> {
        self.state.lock().tracker.current_session().cloned()
    }

    pub fn session_history(&self) -> Vec<PracticeSession> {
        self.state.lock().history()
    }

    pub fn session_stats(&self) -> SessionStats {
        self.state.lock().tracker.session_stats()
    }

    pub fn patterns(&self) -> Vec<BehaviorPattern> {
        self.state.lock().recognizer.patterns()
    }

    pub fn user_preferences(&self) -> UserPreferences {
        self.state.lock().recognizer.extract_user_preferences()
    }

    pub fn achievements(&self) -> Vec<Achievement> {
        self.state.lock().progress.achievements().to_vec()
    }

    pub fn cached_suggestions(&self) -> Vec<PracticeSuggestion> {
        self.state.lock().suggestions.cached_suggestions().to_vec()
    }

    fn build_interaction(
        &self,
        usage: ControlUsage,
        session: &PracticeSession,
        now: DateTime<Utc>,
    ) -> ControlInteraction {
        let defaults = &self.config.interaction_defaults;
        let controller = usage.controller();
        let time_in_session_ms = (now - session.start_time).num_milliseconds().max(0);

        let session_phase = usage.session_phase.unwrap_or_else(|| {
            if time_in_session_ms < defaults.warmup_window_minutes * 60_000 {
                SessionPhase::Warmup
            } else {
                SessionPhase::Practice
            }
        });

        ControlInteraction {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now,
            controller,
            action: usage
                .action
                .unwrap_or_else(|| controller.default_action().to_string()),
            parameters: usage.parameters,
            context: InteractionContext {
                session_phase,
                time_in_session_ms,
                user_intent: usage.user_intent,
                difficulty: session.context.difficulty,
            },
            performance: PerformanceSnapshot {
                response_time_ms: usage
                    .response_time_ms
                    .unwrap_or(defaults.response_time_ms)
                    .clamp(0.0, f64::INFINITY),
                accuracy: clamp_score(usage.accuracy.unwrap_or(defaults.accuracy)),
                confidence: clamp_score(usage.confidence.unwrap_or(defaults.confidence)),
                error_count: usage.error_count.unwrap_or(defaults.error_count),
                success_rate: clamp_score(usage.success_rate.unwrap_or(defaults.success_rate)),
            },
            modality: usage.modality,
        }
    }

    /// Post-seal bookkeeping: progress, achievements and the events announcing them.
    fn seal_session(
        &self,
        state: &mut EngineState,
        closed: PracticeSession,
        now: DateTime<Utc>,
    ) -> (PracticeSession, Vec<PracticeEvent>) {
        state.completed_sessions += 1;

        let mut events = Vec::new();
        let sessions = state.history();
        let patterns = state.recognizer.patterns();
        let metrics = self.analyze_progress(state, &sessions, &patterns, &mut events);
        let streak = state.tracker.streak_days();
        let earned = state
            .progress
            .check_achievements(state.completed_sessions, streak, &metrics, now);

        let session = if earned.is_empty() {
            closed
        } else {
            state
                .tracker
                .attach_achievements(&closed.id, &earned)
                .unwrap_or(closed)
        };

        events.push(PracticeEvent::SessionEnded(session.clone()));
        for achievement in earned {
            if achievement.achievement_type.is_milestone() {
                events.push(PracticeEvent::MilestoneAchieved(achievement.clone()));
            }
            events.push(PracticeEvent::AchievementRecorded(achievement));
        }

        (session, events)
    }

    fn analyze_progress(
        &self,
        state: &mut EngineState,
        sessions: &[PracticeSession],
        patterns: &[BehaviorPattern],
        events: &mut Vec<PracticeEvent>,
    ) -> ProgressMetrics {
        match state.progress.analyze_progress(sessions, patterns) {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!(error = %e, "progress analysis failed, using empty metrics");
                events.push(component_error(e));
                ProgressAnalyzer::empty_metrics(self.config.progress.milestone_step)
            }
        }
    }

    /// Runs insight generation after the configured delay on the ambient tokio
    /// runtime, or inline when there is none.
    fn schedule_insights(&self) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let engine = self.clone();
                let delay = self.config.insight_delay();
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    engine.run_deferred_insights();
                });
            }
            Err(_) => self.run_deferred_insights(),
        }
    }

    fn run_deferred_insights(&self) {
        if let Err(e) = self.generate_practice_insights() {
            warn!(error = %e, "deferred insight generation failed");
        }
    }

    fn publish_all(&self, events: Vec<PracticeEvent>) {
        for event in events {
            self.bus.publish(event);
        }
    }
}

fn component_error(error: AnalysisError) -> PracticeEvent {
    PracticeEvent::ComponentError(error.into())
}

/// Accuracy over the last five sessions against the five before them, and
/// session counts for the last seven days against the seven before.
pub fn compute_trends(
    sessions: &[PracticeSession],
    now: DateTime<Utc>,
    threshold: f64,
) -> PracticeTrends {
    let mut ordered: Vec<&PracticeSession> = sessions.iter().collect();
    ordered.sort_by_key(|s| s.start_time);

    let n = ordered.len();
    let recent_start = n.saturating_sub(ACCURACY_TREND_WINDOW);
    let prior_start = recent_start.saturating_sub(ACCURACY_TREND_WINDOW);
    let accuracy = |slice: &[&PracticeSession]| {
        mean(
            &slice
                .iter()
                .map(|s| s.quality_metrics.accuracy)
                .collect::<Vec<_>>(),
        )
    };

    let accuracy_change = if prior_start < recent_start {
        accuracy(&ordered[recent_start..]) - accuracy(&ordered[prior_start..recent_start])
    } else {
        0.0
    };
    let accuracy_trend = if accuracy_change > threshold {
        TrendDirection::Improving
    } else if accuracy_change < -threshold {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    };

    let week = Duration::days(RECENT_WINDOW_DAYS);
    let sessions_last_7_days = ordered
        .iter()
        .filter(|s| s.start_time > now - week && s.start_time <= now)
        .count();
    let sessions_prior_7_days = ordered
        .iter()
        .filter(|s| s.start_time > now - week * 2 && s.start_time <= now - week)
        .count();
    let frequency_trend = match sessions_last_7_days.cmp(&sessions_prior_7_days) {
        std::cmp::Ordering::Greater => TrendDirection::Improving,
        std::cmp::Ordering::Less => TrendDirection::Declining,
        std::cmp::Ordering::Equal => TrendDirection::Stable,
    };

    PracticeTrends {
        accuracy_trend,
        accuracy_change,
        frequency_trend,
        sessions_last_7_days,
        sessions_prior_7_days,
    }
}
