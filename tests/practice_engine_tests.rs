//! Integration tests for PracticeEngine: lifecycle, event delivery and the
//! end-to-end analytics pipeline.

mod common;

use std::time::Duration as StdDuration;

use chrono::Duration;
use tokio::sync::broadcast::Receiver;

use common::{create_engine, create_initialized_engine, default_context, tempo};
use practice_insights::core::EventEnvelope;
use practice_insights::practice::{
    AchievementType, Component, ControlParameters, ControlUsage, EngineConfig, EngineError,
    PatternType, PracticeContext, SessionType, SkillArea, TempoStyle, TimeOfDay,
};
use practice_insights::{ManualClock, PracticeEngine, PracticeEvent};

fn drain(receiver: &mut Receiver<EventEnvelope>) -> Vec<PracticeEvent> {
    let mut events = Vec::new();
    while let Ok(envelope) = receiver.try_recv() {
        events.push(envelope.event);
    }
    events
}

fn types(events: &[PracticeEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.event_type()).collect()
}

#[test]
fn insights_before_initialize_fail() {
    let (engine, _) = create_engine();
    assert!(matches!(
        engine.generate_practice_insights(),
        Err(EngineError::NotInitialized)
    ));
}

#[test]
fn tracking_before_initialize_returns_none() {
    let (engine, _) = create_engine();
    assert!(engine.track_control_usage(tempo(100.0)).is_none());
    assert!(engine.current_session().is_none());
}

#[test]
fn empty_engine_reports_default_stats() {
    let (engine, _) = create_initialized_engine();
    let stats = engine.session_stats();
    assert_eq!(stats.total_sessions, 0);
    assert_eq!(stats.streak_days, 0);
    assert_eq!(stats.favorite_time_of_day, TimeOfDay::Evening);
    assert!(stats.most_used_controls.is_empty());
    assert!(stats.improvement_highlights.is_empty());
}

#[test]
fn session_lifecycle_publishes_events_in_order() {
    let (engine, clock) = create_initialized_engine();
    let mut receiver = engine.subscribe();

    let session = engine.start_practice_session(default_context()).unwrap();
    assert_eq!(session.context.time_of_day, Some(TimeOfDay::Evening));
    for _ in 0..5 {
        engine
            .track_control_usage(ControlUsage::new(ControlParameters::playback()).with_accuracy(80.0))
            .unwrap();
    }
    clock.advance(Duration::minutes(20));
    let sealed = engine.end_practice_session().unwrap().unwrap();

    assert_eq!(sealed.id, session.id);
    assert_eq!(sealed.duration_ms, 20 * 60_000);
    assert_eq!(sealed.quality_metrics.accuracy, 80.0);
    assert_eq!(sealed.quality_metrics.consistency, 100.0);

    let events = drain(&mut receiver);
    let kinds = types(&events);
    assert_eq!(kinds[0], "SESSION_STARTED");
    let ended = kinds.iter().position(|k| *k == "SESSION_ENDED").unwrap();
    assert!(kinds[1..ended].iter().all(|k| *k == "PATTERN_DETECTED"));
    assert_eq!(kinds[ended + 1], "ACHIEVEMENT_RECORDED");
    assert!(events.iter().any(|e| matches!(
        e,
        PracticeEvent::AchievementRecorded(a) if a.achievement_type == AchievementType::FirstSession
    )));
    // no runtime here, so insights are produced inline right after the seal
    assert_eq!(kinds.last(), Some(&"INSIGHTS_GENERATED"));
}

#[tokio::test]
async fn insights_follow_session_end_after_delay() {
    let (engine, clock) = create_initialized_engine();
    let (_, mut receiver) = engine.subscribe_filtered(&["INSIGHTS_GENERATED"]);

    engine.start_practice_session(default_context()).unwrap();
    engine.track_control_usage(tempo(96.0)).unwrap();
    clock.advance(Duration::minutes(10));
    engine.end_practice_session().unwrap();

    let envelope = tokio::time::timeout(StdDuration::from_secs(2), receiver.recv())
        .await
        .expect("insights were not generated")
        .unwrap();
    match envelope.event {
        PracticeEvent::InsightsGenerated(insights) => {
            assert_eq!(insights.sessions.len(), 1);
            assert_eq!(insights.session_stats.total_sessions, 1);
        }
        other => panic!("unexpected event {}", other.event_type()),
    }
}

#[test]
fn tempo_progression_detected_across_sessions() {
    let (engine, clock) = create_initialized_engine();
    let mut receiver = engine.subscribe();
    let context = PracticeContext {
        session_type: SessionType::Practice,
        focus_area: Some(SkillArea::TempoControl),
        ..Default::default()
    };

    for _ in 0..3 {
        engine.start_practice_session(context.clone()).unwrap();
        for bpm in [100.0, 103.0, 106.0, 109.0] {
            engine.track_control_usage(tempo(bpm)).unwrap();
            clock.advance(Duration::minutes(2));
        }
        engine.end_practice_session().unwrap();
        clock.advance(Duration::hours(20));
    }

    let pattern = engine
        .patterns()
        .into_iter()
        .find(|p| p.pattern_type == PatternType::TempoProgression)
        .expect("tempo pattern");
    let traits = pattern.tempo().unwrap();
    assert_eq!(traits.preferred_style, TempoStyle::Gradual);
    assert_eq!(traits.min_bpm, 100.0);
    assert_eq!(traits.max_bpm, 109.0);
    assert!(pattern.confidence > 0.0 && pattern.confidence <= 100.0);

    let events = drain(&mut receiver);
    assert!(types(&events).contains(&"PATTERN_DETECTED"));
}

#[test]
fn streak_stops_at_first_gap() {
    let (engine, clock) = create_initialized_engine();
    for gap_days in [0, 1, 3] {
        clock.advance(Duration::days(gap_days));
        engine.start_practice_session(default_context()).unwrap();
        clock.advance(Duration::minutes(15));
        engine.end_practice_session().unwrap();
    }
    assert_eq!(engine.session_stats().streak_days, 2);
    assert_eq!(engine.session_stats().total_sessions, 3);
}

#[test]
fn starting_over_an_open_session_seals_it() {
    let (engine, clock) = create_initialized_engine();
    let mut receiver = engine.subscribe();

    let first = engine.start_practice_session(default_context()).unwrap();
    clock.advance(Duration::minutes(5));
    let second = engine.start_practice_session(default_context()).unwrap();

    assert_ne!(first.id, second.id);
    let history = engine.session_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, first.id);
    assert_eq!(engine.current_session().unwrap().id, second.id);

    let events = drain(&mut receiver);
    let ended = events
        .iter()
        .position(|e| matches!(e, PracticeEvent::SessionEnded(s) if s.id == first.id))
        .unwrap();
    let started = events
        .iter()
        .rposition(|e| matches!(e, PracticeEvent::SessionStarted(s) if s.id == second.id))
        .unwrap();
    assert!(ended < started);
}

#[test]
fn achievements_are_awarded_once() {
    let (engine, clock) = create_initialized_engine();
    for _ in 0..3 {
        engine.start_practice_session(default_context()).unwrap();
        clock.advance(Duration::minutes(15));
        engine.end_practice_session().unwrap();
        clock.advance(Duration::days(1));
    }

    let achievements = engine.achievements();
    let first_sessions = achievements
        .iter()
        .filter(|a| a.achievement_type == AchievementType::FirstSession)
        .count();
    assert_eq!(first_sessions, 1);
    assert!(achievements
        .iter()
        .any(|a| a.achievement_type == AchievementType::Streak && a.value == 3.0));
}

#[test]
fn automation_reflects_confident_tempo_pattern() {
    let (engine, clock) = create_initialized_engine();
    let (_, mut receiver) = engine.subscribe_filtered(&["AUTOMATION_CONFIG_GENERATED"]);

    let defaults = engine.adapt_automation().unwrap();
    assert!(!defaults.tempo_progression.enabled);
    assert_eq!(defaults.transposition_sequence.key_sequence.len(), 4);

    engine.start_practice_session(default_context()).unwrap();
    for step in 0..15 {
        engine.track_control_usage(tempo(90.0 + step as f64 * 2.0)).unwrap();
        clock.advance(Duration::minutes(1));
    }

    let config = engine.adapt_automation().unwrap();
    assert!(config.tempo_progression.enabled);
    assert_eq!(config.tempo_progression.style, TempoStyle::Gradual);
    assert!(engine.user_preferences().tempo.is_some());

    assert_eq!(drain(&mut receiver).len(), 2);
}

#[test]
fn insights_reuse_suggestion_cache() {
    let (engine, clock) = create_initialized_engine();
    engine.start_practice_session(default_context()).unwrap();
    for step in 0..12 {
        engine.track_control_usage(tempo(80.0 + step as f64 * 4.0)).unwrap();
        clock.advance(Duration::minutes(1));
    }
    engine.end_practice_session().unwrap();

    let insights = engine.generate_practice_insights().unwrap();
    assert_eq!(engine.cached_suggestions(), insights.suggestions);
    for pair in insights.suggestions.windows(2) {
        assert!(pair[0].priority >= pair[1].priority);
    }
}

#[test]
fn zero_milestone_step_is_rejected() {
    let config = EngineConfig {
        progress: practice_insights::practice::config::ProgressParams {
            milestone_step: 0.0,
            ..Default::default()
        },
        ..common::test_config()
    };
    let clock = std::sync::Arc::new(ManualClock::new(common::start_time()));
    assert!(matches!(
        PracticeEngine::with_clock(config, clock),
        Err(EngineError::Config(_))
    ));
}

#[test]
fn detector_fault_is_published_and_pipeline_continues() {
    let (engine, _) = create_initialized_engine();
    let mut receiver = engine.subscribe();

    engine.start_practice_session(default_context()).unwrap();
    for bpm in 100..109 {
        engine.track_control_usage(tempo(bpm as f64)).unwrap();
    }
    let faulty = engine.track_control_usage(tempo(f64::NAN));
    assert!(faulty.is_some());

    let events = drain(&mut receiver);
    let errors: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            PracticeEvent::ComponentError(payload) => Some(payload),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].component, Component::PatternRecognizer);
    assert!(errors[0].message.contains("tempo"));

    // the timing detector ran in the same pass as the failing tempo detector
    let error_at = events
        .iter()
        .position(|e| e.event_type() == "COMPONENT_ERROR")
        .unwrap();
    assert!(matches!(
        &events[error_at - 1],
        PracticeEvent::PatternDetected(p) if p.pattern_type == PatternType::SessionTiming
    ));

    assert_eq!(
        engine.current_session().unwrap().control_interactions.len(),
        10
    );
    let insights = engine.generate_practice_insights().unwrap();
    assert!(insights
        .patterns
        .iter()
        .any(|p| p.pattern_type == PatternType::SessionTiming));
    assert!(insights
        .patterns
        .iter()
        .all(|p| p.pattern_type != PatternType::TempoProgression));
}

#[test]
fn three_day_streak_is_announced_as_milestone() {
    let (engine, clock) = create_initialized_engine();
    let (_, mut receiver) = engine.subscribe_filtered(&["MILESTONE_ACHIEVED"]);

    for _ in 0..3 {
        engine.start_practice_session(default_context()).unwrap();
        clock.advance(Duration::minutes(15));
        engine.end_practice_session().unwrap();
        clock.advance(Duration::days(1));
    }

    let events = drain(&mut receiver);
    let streaks: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            PracticeEvent::MilestoneAchieved(a) if a.achievement_type == AchievementType::Streak => {
                Some(a.value)
            }
            _ => None,
        })
        .collect();
    assert_eq!(streaks, vec![3.0]);
}
