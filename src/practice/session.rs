use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Timelike, Utc};
use tracing::{debug, warn};

use crate::practice::config::SessionParams;
use crate::practice::stats::{clamp_score, mean, std_dev};
use crate::practice::types::{
    Achievement, ControlInteraction, ControlUsageCount, ControllerType, PracticeContext,
    PracticeSession, SessionQualityMetrics, SessionStats, TimeOfDay,
};

/// Result of opening a session: the new session and, if one was still open,
/// the session that was sealed to make room for it.
#[derive(Debug, Clone)]
pub struct StartedSession {
    pub session: PracticeSession,
    pub closed: Option<PracticeSession>,
}

pub struct SessionTracker {
    params: SessionParams,
    offset: FixedOffset,
    current: Option<PracticeSession>,
    history: VecDeque<PracticeSession>,
}

impl SessionTracker {
    pub fn new(params: SessionParams, offset: FixedOffset) -> Self {
        let capacity = params.max_history.min(1024);
        Self {
            params,
            offset,
            current: None,
            history: VecDeque::with_capacity(capacity),
        }
    }

    pub fn start_session(&mut self, mut context: PracticeContext, now: DateTime<Utc>) -> StartedSession {
        let closed = self.end_session(now);

        if context.time_of_day.is_none() {
            context.time_of_day = Some(TimeOfDay::from_hour(self.local_hour(now)));
        }

        let session = PracticeSession {
            id: uuid::Uuid::new_v4().to_string(),
            start_time: now,
            end_time: None,
            duration_ms: 0,
            control_interactions: Vec::new(),
            quality_metrics: SessionQualityMetrics::default(),
            achievements: Vec::new(),
            context,
        };

        debug!(session_id = %session.id, "practice session started");
        self.current = Some(session.clone());

        StartedSession { session, closed }
    }

    /// Seals the open session. Returns `None` when nothing is open.
    pub fn end_session(&mut self, now: DateTime<Utc>) -> Option<PracticeSession> {
        let mut session = self.current.take()?;

        let duration_ms = (now - session.start_time).num_milliseconds().max(0);
        session.end_time = Some(now);
        session.duration_ms = duration_ms;
        session.quality_metrics = compute_quality_metrics(
            &session.control_interactions,
            session.duration_minutes(),
            self.params.completion_threshold,
        );

        self.history.push_back(session.clone());
        while self.history.len() > self.params.max_history {
            if let Some(evicted) = self.history.pop_front() {
                debug!(session_id = %evicted.id, "evicted oldest session from history");
            }
        }

        debug!(
            session_id = %session.id,
            interactions = session.control_interactions.len(),
            duration_ms,
            "practice session ended"
        );

        Some(session)
    }

    /// Appends to the open session. Without one this is a no-op and returns `false`.
    pub fn record_interaction(&mut self, interaction: ControlInteraction) -> bool {
        match self.current.as_mut() {
            Some(session) => {
                session.control_interactions.push(interaction);
                true
            }
            None => {
                debug!(interaction_id = %interaction.id, "no open session, interaction dropped");
                false
            }
        }
    }

    /// Adds achievements earned at the end of an archived session.
    pub fn attach_achievements(
        &mut self,
        session_id: &str,
        achievements: &[Achievement],
    ) -> Option<PracticeSession> {
        let session = self.history.iter_mut().rev().find(|s| s.id == session_id)?;
        session.achievements.extend_from_slice(achievements);
        Some(session.clone())
    }

    pub fn current_session(&self) -> Option<&PracticeSession> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &VecDeque<PracticeSession> {
        &self.history
    }

    pub fn session_stats(&self) -> SessionStats {
        let total_sessions = self.history.len();
        if total_sessions == 0 {
            return SessionStats::default();
        }

        let total_practice_minutes: f64 = self.history.iter().map(|s| s.duration_minutes()).sum();

        SessionStats {
            total_sessions,
            total_practice_minutes,
            average_session_minutes: total_practice_minutes / total_sessions as f64,
            streak_days: self.streak_days(),
            favorite_time_of_day: self.favorite_time_of_day(),
            most_used_controls: self.most_used_controls(),
            improvement_highlights: self.improvement_highlights(),
        }
    }

    /// Walks practice days newest-first. A run grows while each older day is the
    /// calendar day right before the previous one; the walk stops at the first gap
    /// once the run spans two or more days. A lone newest day does not end the walk.
    pub fn streak_days(&self) -> u32 {
        let mut days: Vec<NaiveDate> = self
            .history
            .iter()
            .map(|s| s.start_time.with_timezone(&self.offset).date_naive())
            .collect();
        days.sort_unstable_by(|a, b| b.cmp(a));
        days.dedup();

        if days.is_empty() {
            return 0;
        }

        let mut run = 1u32;
        for pair in days.windows(2) {
            if pair[0] - pair[1] == Duration::days(1) {
                run += 1;
            } else if run >= 2 {
                break;
            } else {
                run = 1;
            }
        }
        run
    }

    fn favorite_time_of_day(&self) -> TimeOfDay {
        let mut counts: HashMap<TimeOfDay, usize> = HashMap::new();
        for session in &self.history {
            let bucket = session
                .context
                .time_of_day
                .unwrap_or_else(|| TimeOfDay::from_hour(self.local_hour(session.start_time)));
            *counts.entry(bucket).or_insert(0) += 1;
        }

        let mut favorite = TimeOfDay::Evening;
        let mut best = 0;
        for bucket in TimeOfDay::ALL {
            let count = counts.get(&bucket).copied().unwrap_or(0);
            if count > best {
                best = count;
                favorite = bucket;
            }
        }
        favorite
    }

    fn most_used_controls(&self) -> Vec<ControlUsageCount> {
        let mut counts: HashMap<(ControllerType, &str), usize> = HashMap::new();
        for interaction in self.history.iter().flat_map(|s| &s.control_interactions) {
            *counts
                .entry((interaction.controller, interaction.action.as_str()))
                .or_insert(0) += 1;
        }

        let mut usage: Vec<ControlUsageCount> = counts
            .into_iter()
            .map(|((controller, action), count)| ControlUsageCount {
                controller,
                action: action.to_string(),
                count,
            })
            .collect();
        usage.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then(a.controller.cmp(&b.controller))
                .then(a.action.cmp(&b.action))
        });
        usage.truncate(self.params.top_controls);
        usage
    }

    fn improvement_highlights(&self) -> Vec<String> {
        let window = self.params.highlight_window;
        let len = self.history.len();
        if window == 0 || len < window * 2 {
            return Vec::new();
        }

        let recent: Vec<&PracticeSession> = self.history.iter().skip(len - window).collect();
        let prior: Vec<&PracticeSession> =
            self.history.iter().skip(len - window * 2).take(window).collect();

        let avg = |sessions: &[&PracticeSession], f: fn(&SessionQualityMetrics) -> f64| {
            mean(&sessions.iter().map(|s| f(&s.quality_metrics)).collect::<Vec<_>>())
        };

        let mut highlights = Vec::new();

        let accuracy_delta = avg(&recent, |m| m.accuracy) - avg(&prior, |m| m.accuracy);
        if accuracy_delta > self.params.highlight_min_delta {
            highlights.push(format!(
                "Accuracy improved by {accuracy_delta:.1} points over your last {window} sessions"
            ));
        }

        let consistency_delta = avg(&recent, |m| m.consistency) - avg(&prior, |m| m.consistency);
        if consistency_delta > self.params.highlight_min_delta {
            highlights.push(format!(
                "Consistency improved by {consistency_delta:.1} points over your last {window} sessions"
            ));
        }

        highlights
    }

    fn local_hour(&self, ts: DateTime<Utc>) -> u32 {
        ts.with_timezone(&self.offset).hour()
    }
}

/// Six bounded scores summarizing a sealed session. An empty session scores 0 everywhere.
pub fn compute_quality_metrics(
    interactions: &[ControlInteraction],
    duration_minutes: f64,
    completion_threshold: f64,
) -> SessionQualityMetrics {
    if interactions.is_empty() {
        return SessionQualityMetrics::default();
    }

    let accuracies = finite(interactions.iter().map(|i| i.performance.accuracy));
    let response_times = finite(interactions.iter().map(|i| i.performance.response_time_ms));
    if accuracies.len() < interactions.len() || response_times.len() < interactions.len() {
        warn!("ignoring non-finite performance samples while scoring session");
    }

    let count = interactions.len() as f64;
    let accuracy = clamp_score(mean(&accuracies));

    let rt_mean = mean(&response_times);
    let consistency = if rt_mean > 0.0 {
        clamp_score(100.0 - (std_dev(&response_times) / rt_mean) * 100.0)
    } else {
        100.0
    };

    let engagement = if duration_minutes > 0.0 {
        clamp_score((count / duration_minutes) * 10.0)
    } else {
        100.0
    };

    let completed = interactions
        .iter()
        .filter(|i| i.performance.success_rate > completion_threshold)
        .count() as f64;
    let completion_rate = clamp_score(completed / count * 100.0);

    let total_errors: f64 = interactions
        .iter()
        .map(|i| i.performance.error_count as f64)
        .sum();
    let error_rate = clamp_score((total_errors / count) * 10.0);

    let focus = clamp_score(0.6 * consistency + 0.4 * engagement);

    SessionQualityMetrics {
        accuracy,
        consistency,
        engagement,
        completion_rate,
        error_rate,
        focus,
    }
}

fn finite(values: impl Iterator<Item = f64>) -> Vec<f64> {
    values.filter(|v| v.is_finite()).collect()
}
