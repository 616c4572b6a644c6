use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::practice::config::ProgressParams;
use crate::practice::error::{ensure_finite, AnalysisError, Component};
use crate::practice::stats::{clamp_score, mean, std_dev};
use crate::practice::types::{
    Achievement, AchievementCategory, AchievementType, BehaviorPattern, ControllerType,
    ImprovementTrend, PracticeSession, ProgressMetrics, Rarity, SkillArea, SkillAreaProgress,
    TrendDirection,
};

struct AreaSample {
    level: f64,
    practice_minutes: f64,
    last_practiced: Option<DateTime<Utc>>,
}

pub struct ProgressAnalyzer {
    params: ProgressParams,
    skill_history: HashMap<SkillArea, VecDeque<f64>>,
    /// Newest session id behind the last history entry.
    recorded_for: Option<String>,
    awarded: HashSet<String>,
    achievements: Vec<Achievement>,
}

impl ProgressAnalyzer {
    pub fn new(params: ProgressParams) -> Self {
        Self {
            params,
            skill_history: HashMap::new(),
            recorded_for: None,
            awarded: HashSet::new(),
            achievements: Vec::new(),
        }
    }

    /// Scores the five skill areas over `sessions`. Levels are appended to the
    /// per-area rolling history once per newest session; re-analyzing the same
    /// history replaces the last entry instead.
    pub fn analyze_progress(
        &mut self,
        sessions: &[PracticeSession],
        _patterns: &[BehaviorPattern],
    ) -> Result<ProgressMetrics, AnalysisError> {
        if sessions.is_empty() {
            return Ok(Self::empty_metrics(self.params.milestone_step));
        }

        let mut ordered: Vec<&PracticeSession> = sessions.iter().collect();
        ordered.sort_by_key(|s| s.start_time);

        let mut samples = Vec::with_capacity(SkillArea::ALL.len());
        for area in SkillArea::ALL {
            let sample = sample_area(area, &ordered);
            if let Some(s) = &sample {
                ensure_finite(
                    Component::ProgressAnalyzer,
                    &format!("{}.level", area.as_str()),
                    s.level,
                )?;
            }
            samples.push((area, sample));
        }

        let accuracies: Vec<f64> = ordered.iter().map(|s| s.quality_metrics.accuracy).collect();
        let learning_velocity = ensure_finite(
            Component::ProgressAnalyzer,
            "learning_velocity",
            self.learning_velocity(&ordered),
        )?;
        let consistency_score = clamp_score(100.0 - std_dev(&accuracies));
        let improvement_trend = self.improvement_trend(&accuracies);

        let newest = ordered.last().map(|s| s.id.clone());
        let repeat = newest.is_some() && newest == self.recorded_for;
        let mut skill_areas = Vec::with_capacity(samples.len());
        for (area, sample) in samples {
            skill_areas.push(self.track_area(area, sample, repeat));
        }
        self.recorded_for = newest;

        let overall_progress = clamp_score(mean(
            &skill_areas.iter().map(|s| s.current_level).collect::<Vec<_>>(),
        ));

        let step = self.params.milestone_step;
        let next_milestone = (((overall_progress / step).floor() + 1.0) * step).min(100.0);
        let time_to_next_milestone_days = if learning_velocity > 0.0 {
            ((next_milestone - overall_progress) / learning_velocity).max(0.0)
        } else {
            self.params.milestone_sentinel_days
        };

        let (strengths, weaknesses) = self.strengths_and_weaknesses(&skill_areas);

        debug!(
            overall_progress,
            learning_velocity,
            sessions = ordered.len(),
            "progress analyzed"
        );

        Ok(ProgressMetrics {
            skill_areas,
            overall_progress,
            learning_velocity,
            consistency_score,
            improvement_trend,
            next_milestone,
            time_to_next_milestone_days,
            strengths,
            weaknesses,
        })
    }

    pub fn empty_metrics(milestone_step: f64) -> ProgressMetrics {
        ProgressMetrics {
            skill_areas: SkillArea::ALL.into_iter().map(SkillAreaProgress::empty).collect(),
            overall_progress: 0.0,
            learning_velocity: 0.0,
            consistency_score: 0.0,
            improvement_trend: ImprovementTrend::Steady,
            next_milestone: milestone_step.min(100.0),
            time_to_next_milestone_days: 0.0,
            strengths: Vec::new(),
            weaknesses: Vec::new(),
        }
    }

    fn track_area(
        &mut self,
        area: SkillArea,
        sample: Option<AreaSample>,
        repeat: bool,
    ) -> SkillAreaProgress {
        let Some(sample) = sample else {
            return SkillAreaProgress::empty(area);
        };

        let current_level = clamp_score(sample.level);
        let history = self.skill_history.entry(area).or_default();
        if repeat {
            history.pop_back();
        }
        let previous_level = history.back().copied().unwrap_or(current_level);
        history.push_back(current_level);
        while history.len() > self.params.skill_history_len {
            history.pop_front();
        }

        let improvement = current_level - previous_level;
        let trend = if improvement > self.params.trend_threshold {
            TrendDirection::Improving
        } else if improvement < -self.params.trend_threshold {
            TrendDirection::Declining
        } else {
            TrendDirection::Stable
        };

        SkillAreaProgress {
            area,
            current_level,
            previous_level,
            improvement,
            trend,
            practice_minutes: sample.practice_minutes,
            last_practiced: sample.last_practiced,
        }
    }

    /// Accuracy points gained per day between the previous and the latest window of sessions.
    fn learning_velocity(&self, ordered: &[&PracticeSession]) -> f64 {
        let window = self.params.velocity_window.max(1);
        let n = ordered.len();
        let recent_start = n.saturating_sub(window);
        let prior_start = recent_start.saturating_sub(window);
        let recent = &ordered[recent_start..];
        let prior = &ordered[prior_start..recent_start];
        let (Some(first), Some(last)) = (prior.first(), recent.last()) else {
            return 0.0;
        };

        let acc = |s: &[&PracticeSession]| {
            mean(&s.iter().map(|x| x.quality_metrics.accuracy).collect::<Vec<_>>())
        };
        let days = ((last.start_time - first.start_time).num_milliseconds() as f64 / 86_400_000.0)
            .max(1.0);

        (acc(recent) - acc(prior)) / days
    }

    fn improvement_trend(&self, accuracies: &[f64]) -> ImprovementTrend {
        let w = self.params.trend_window.max(1);
        let n = accuracies.len();
        if n < w * 3 {
            return ImprovementTrend::Steady;
        }

        let older = mean(&accuracies[n - 3 * w..n - 2 * w]);
        let middle = mean(&accuracies[n - 2 * w..n - w]);
        let recent = mean(&accuracies[n - w..]);
        let earlier_gain = middle - older;
        let latest_gain = recent - middle;
        let band = self.params.trend_dead_band;

        if latest_gain > earlier_gain + band && latest_gain > 0.0 {
            ImprovementTrend::Accelerating
        } else if latest_gain > band {
            ImprovementTrend::Steady
        } else if latest_gain < -band {
            ImprovementTrend::Declining
        } else {
            ImprovementTrend::Plateauing
        }
    }

    fn strengths_and_weaknesses(
        &self,
        areas: &[SkillAreaProgress],
    ) -> (Vec<SkillArea>, Vec<SkillArea>) {
        let mut ranked: Vec<&SkillAreaProgress> =
            areas.iter().filter(|a| a.last_practiced.is_some()).collect();
        ranked.sort_by(|a, b| b.current_level.total_cmp(&a.current_level));

        let strengths = ranked
            .iter()
            .filter(|a| a.current_level > self.params.strength_threshold)
            .take(2)
            .map(|a| a.area)
            .collect();
        let weaknesses = ranked
            .iter()
            .rev()
            .filter(|a| a.current_level < self.params.weakness_threshold)
            .take(2)
            .map(|a| a.area)
            .collect();

        (strengths, weaknesses)
    }

    /// Awards every achievement whose threshold is met and that was not awarded before.
    pub fn check_achievements(
        &mut self,
        completed_sessions: usize,
        streak_days: u32,
        metrics: &ProgressMetrics,
        now: DateTime<Utc>,
    ) -> Vec<Achievement> {
        let mut earned = Vec::new();

        if completed_sessions >= 1 {
            self.award(&mut earned, now, "first_session".to_string(), || Draft {
                achievement_type: AchievementType::FirstSession,
                title: "First steps".to_string(),
                description: "Completed your first practice session".to_string(),
                value: 1.0,
                category: AchievementCategory::Dedication,
                rarity: Rarity::Common,
            });
        }

        let session_milestones = self.params.session_milestones.clone();
        for (idx, milestone) in session_milestones.into_iter().enumerate() {
            if completed_sessions >= milestone {
                self.award(&mut earned, now, format!("session_count:{milestone}"), || Draft {
                    achievement_type: AchievementType::SessionCount,
                    title: format!("{milestone} sessions"),
                    description: format!("Completed {milestone} practice sessions"),
                    value: milestone as f64,
                    category: AchievementCategory::Dedication,
                    rarity: tier_rarity(idx),
                });
            }
        }

        let streak_milestones = self.params.streak_milestones.clone();
        for (idx, days) in streak_milestones.into_iter().enumerate() {
            if streak_days >= days {
                self.award(&mut earned, now, format!("streak:{days}"), || Draft {
                    achievement_type: AchievementType::Streak,
                    title: format!("{days}-day streak"),
                    description: format!("Practiced {days} days in a row"),
                    value: days as f64,
                    category: AchievementCategory::Consistency,
                    rarity: tier_rarity(idx),
                });
            }
        }

        let step = self.params.milestone_step;
        let mut level = step;
        while level <= metrics.overall_progress && level <= 100.0 {
            self.award(&mut earned, now, format!("progress:{level}"), || Draft {
                achievement_type: AchievementType::ProgressMilestone,
                title: format!("{level:.0}% overall progress"),
                description: format!("Overall skill level reached {level:.0}%"),
                value: level,
                category: AchievementCategory::Progress,
                rarity: progress_rarity(level),
            });
            level += step;
        }

        for skill in &metrics.skill_areas {
            if skill.current_level >= self.params.mastery_level {
                let area = skill.area;
                self.award(&mut earned, now, format!("skill_mastery:{}", area.as_str()), || Draft {
                    achievement_type: AchievementType::SkillMastery,
                    title: format!("{} mastery", area.label()),
                    description: format!("{} level reached {:.0}", area.label(), skill.current_level),
                    value: skill.current_level,
                    category: AchievementCategory::Skill,
                    rarity: Rarity::Epic,
                });
            }
        }

        self.achievements.extend(earned.iter().cloned());
        earned
    }

    /// Stores an externally granted achievement unless its id is already known.
    pub fn record_achievement(&mut self, achievement: Achievement) -> bool {
        if !self.awarded.insert(format!("id:{}", achievement.id)) {
            return false;
        }
        self.achievements.push(achievement);
        true
    }

    pub fn achievements(&self) -> &[Achievement] {
        &self.achievements
    }

    fn award<F>(
        &mut self,
        earned: &mut Vec<Achievement>,
        now: DateTime<Utc>,
        key: String,
        draft: F,
    ) where
        F: FnOnce() -> Draft,
    {
        if self.awarded.contains(&key) {
            return;
        }
        let d = draft();
        debug!(key = %key, "achievement earned");
        self.awarded.insert(key);
        earned.push(Achievement {
            id: uuid::Uuid::new_v4().to_string(),
            achievement_type: d.achievement_type,
            title: d.title,
            description: d.description,
            value: d.value,
            category: d.category,
            rarity: d.rarity,
            earned_at: now,
        });
    }
}

struct Draft {
    achievement_type: AchievementType,
    title: String,
    description: String,
    value: f64,
    category: AchievementCategory,
    rarity: Rarity,
}

fn tier_rarity(idx: usize) -> Rarity {
    match idx {
        0 => Rarity::Uncommon,
        1 => Rarity::Rare,
        2 => Rarity::Epic,
        _ => Rarity::Legendary,
    }
}

fn progress_rarity(level: f64) -> Rarity {
    if level >= 100.0 {
        Rarity::Legendary
    } else if level >= 80.0 {
        Rarity::Epic
    } else if level >= 50.0 {
        Rarity::Rare
    } else if level >= 30.0 {
        Rarity::Uncommon
    } else {
        Rarity::Common
    }
}

fn sample_area(area: SkillArea, sessions: &[&PracticeSession]) -> Option<AreaSample> {
    let controller = match area {
        SkillArea::TempoControl => Some(ControllerType::Tempo),
        SkillArea::Transposition => Some(ControllerType::Transposition),
        SkillArea::TimingAccuracy => Some(ControllerType::Synchronization),
        SkillArea::Consistency | SkillArea::Technique => None,
    };

    match controller {
        Some(controller) => {
            let mut scores = Vec::new();
            let mut practice_minutes = 0.0;
            let mut last_practiced = None;
            for session in sessions {
                let mut hit = false;
                for i in session.control_interactions.iter().filter(|i| i.controller == controller) {
                    scores.push((i.performance.accuracy + i.performance.success_rate) / 2.0);
                    last_practiced = last_practiced.max(Some(i.timestamp));
                    hit = true;
                }
                if hit {
                    practice_minutes += session.duration_minutes();
                }
            }
            (!scores.is_empty()).then(|| AreaSample {
                level: mean(&scores),
                practice_minutes,
                last_practiced,
            })
        }
        None => {
            let active: Vec<&&PracticeSession> = sessions
                .iter()
                .filter(|s| !s.control_interactions.is_empty())
                .collect();
            if active.is_empty() {
                return None;
            }
            let scores: Vec<f64> = active
                .iter()
                .map(|s| {
                    let m = &s.quality_metrics;
                    if area == SkillArea::Consistency {
                        m.consistency
                    } else {
                        (m.accuracy + m.completion_rate) / 2.0
                    }
                })
                .collect();
            Some(AreaSample {
                level: mean(&scores),
                practice_minutes: active.iter().map(|s| s.duration_minutes()).sum(),
                last_practiced: active.iter().map(|s| s.end_time.unwrap_or(s.start_time)).max(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::practice::session::compute_quality_metrics;
    use crate::practice::types::{
        ControlInteraction, ControlParameters, Difficulty, InteractionContext, ModalityFlags,
        PerformanceSnapshot, PracticeContext, SessionPhase,
    };
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap()
    }

    fn session(day: i64, params: ControlParameters, accuracy: f64, count: usize) -> PracticeSession {
        let start = t0() + Duration::days(day);
        let interactions: Vec<ControlInteraction> = (0..count)
            .map(|i| ControlInteraction {
                id: format!("{day}-{i}"),
                timestamp: start + Duration::minutes(i as i64),
                controller: params.controller(),
                action: params.controller().default_action().to_string(),
                parameters: params.clone(),
                context: InteractionContext {
                    session_phase: SessionPhase::Practice,
                    time_in_session_ms: 0,
                    user_intent: None,
                    difficulty: Difficulty::Medium,
                },
                performance: PerformanceSnapshot {
                    response_time_ms: 500.0,
                    accuracy,
                    confidence: 80.0,
                    error_count: 0,
                    success_rate: accuracy,
                },
                modality: ModalityFlags::default(),
            })
            .collect();
        PracticeSession {
            id: format!("s{day}"),
            start_time: start,
            end_time: Some(start + Duration::minutes(30)),
            duration_ms: 30 * 60_000,
            quality_metrics: compute_quality_metrics(&interactions, 30.0, 70.0),
            control_interactions: interactions,
            achievements: Vec::new(),
            context: PracticeContext::default(),
        }
    }

    fn analyzer() -> ProgressAnalyzer {
        ProgressAnalyzer::new(ProgressParams::default())
    }

    #[test]
    fn empty_history_gives_zeroed_metrics() {
        let metrics = analyzer().analyze_progress(&[], &[]).unwrap();
        assert_eq!(metrics.skill_areas.len(), 5);
        assert!(metrics.skill_areas.iter().all(|s| s.current_level == 0.0));
        assert_eq!(metrics.overall_progress, 0.0);
        assert_eq!(metrics.learning_velocity, 0.0);
        assert!(metrics.strengths.is_empty());
        assert!(metrics.weaknesses.is_empty());
    }

    #[test]
    fn levels_come_from_matching_controllers() {
        let sessions = vec![
            session(0, ControlParameters::tempo(100.0), 90.0, 4),
            session(1, ControlParameters::transpose(2, Some("D")), 50.0, 4),
        ];
        let metrics = analyzer().analyze_progress(&sessions, &[]).unwrap();
        assert!((metrics.level(SkillArea::TempoControl) - 90.0).abs() < 1e-9);
        assert!((metrics.level(SkillArea::Transposition) - 50.0).abs() < 1e-9);
        assert_eq!(metrics.level(SkillArea::TimingAccuracy), 0.0);
        assert!(metrics.skill(SkillArea::TimingAccuracy).unwrap().last_practiced.is_none());
        // consistency 100, tempo 90, technique 60, transposition 50
        assert_eq!(
            metrics.strengths,
            vec![SkillArea::Consistency, SkillArea::TempoControl]
        );
        assert_eq!(metrics.weaknesses, vec![SkillArea::Transposition]);
    }

    #[test]
    fn trend_compares_with_previous_analysis() {
        let mut analyzer = analyzer();
        let mut sessions = vec![session(0, ControlParameters::tempo(100.0), 60.0, 4)];
        let first = analyzer.analyze_progress(&sessions, &[]).unwrap();
        assert_eq!(first.skill(SkillArea::TempoControl).unwrap().trend, TrendDirection::Stable);

        sessions.push(session(1, ControlParameters::tempo(100.0), 100.0, 4));
        let second = analyzer.analyze_progress(&sessions, &[]).unwrap();
        let tempo = second.skill(SkillArea::TempoControl).unwrap();
        assert_eq!(tempo.previous_level, 60.0);
        assert_eq!(tempo.current_level, 80.0);
        assert_eq!(tempo.trend, TrendDirection::Improving);
    }

    #[test]
    fn skill_history_is_bounded() {
        let mut analyzer = analyzer();
        for day in 0..30 {
            let sessions = vec![session(day, ControlParameters::tempo(100.0), 70.0, 2)];
            analyzer.analyze_progress(&sessions, &[]).unwrap();
        }
        assert_eq!(analyzer.skill_history[&SkillArea::TempoControl].len(), 20);
    }

    #[test]
    fn reanalyzing_same_history_keeps_trend() {
        let mut analyzer = analyzer();
        let mut sessions = vec![session(0, ControlParameters::tempo(100.0), 60.0, 4)];
        analyzer.analyze_progress(&sessions, &[]).unwrap();
        sessions.push(session(1, ControlParameters::tempo(100.0), 100.0, 4));

        let first = analyzer.analyze_progress(&sessions, &[]).unwrap();
        let again = analyzer.analyze_progress(&sessions, &[]).unwrap();
        assert_eq!(first.skill_areas, again.skill_areas);
        assert_eq!(
            again.skill(SkillArea::TempoControl).unwrap().trend,
            TrendDirection::Improving
        );
        assert_eq!(analyzer.skill_history[&SkillArea::TempoControl].len(), 2);
    }

    #[test]
    fn velocity_and_milestone_projection() {
        let mut sessions = Vec::new();
        for day in 0..20 {
            let accuracy = if day < 10 { 60.0 } else { 80.0 };
            sessions.push(session(day, ControlParameters::tempo(100.0), accuracy, 3));
        }
        let metrics = analyzer().analyze_progress(&sessions, &[]).unwrap();
        // 20 points over 19 days
        assert!((metrics.learning_velocity - 20.0 / 19.0).abs() < 1e-9);
        assert!(metrics.next_milestone > metrics.overall_progress);
        assert!(metrics.time_to_next_milestone_days < 999.0);
    }

    #[test]
    fn falling_accuracy_uses_sentinel() {
        let mut sessions = Vec::new();
        for day in 0..12 {
            let accuracy = if day < 6 {
                90.0
            } else {
                90.0 - (day - 5) as f64 * 5.0
            };
            sessions.push(session(day, ControlParameters::tempo(100.0), accuracy, 3));
        }
        let metrics = analyzer().analyze_progress(&sessions, &[]).unwrap();
        assert!(metrics.learning_velocity < 0.0);
        assert_eq!(metrics.time_to_next_milestone_days, 999.0);
        assert_eq!(metrics.improvement_trend, ImprovementTrend::Declining);
    }

    #[test]
    fn improvement_trend_classes() {
        let analyzer = analyzer();
        let flat = [70.0; 9];
        assert_eq!(analyzer.improvement_trend(&flat), ImprovementTrend::Plateauing);
        let speeding = [50.0, 50.0, 50.0, 52.0, 52.0, 52.0, 65.0, 65.0, 65.0];
        assert_eq!(analyzer.improvement_trend(&speeding), ImprovementTrend::Accelerating);
        let linear = [50.0, 50.0, 50.0, 60.0, 60.0, 60.0, 70.0, 70.0, 70.0];
        assert_eq!(analyzer.improvement_trend(&linear), ImprovementTrend::Steady);
        assert_eq!(analyzer.improvement_trend(&[80.0; 4]), ImprovementTrend::Steady);
    }

    #[test]
    fn non_finite_level_is_reported() {
        let sessions = vec![session(0, ControlParameters::tempo(100.0), f64::NAN, 2)];
        let err = analyzer().analyze_progress(&sessions, &[]).unwrap_err();
        assert_eq!(err.component(), Component::ProgressAnalyzer);
    }

    #[test]
    fn achievements_are_awarded_once() {
        let mut analyzer = analyzer();
        let sessions = vec![session(0, ControlParameters::tempo(100.0), 95.0, 3)];
        let metrics = analyzer.analyze_progress(&sessions, &[]).unwrap();

        let first = analyzer.check_achievements(1, 3, &metrics, t0());
        assert!(first.iter().any(|a| a.achievement_type == AchievementType::FirstSession));
        assert!(first
            .iter()
            .any(|a| a.achievement_type == AchievementType::Streak && a.value == 3.0));
        assert!(first
            .iter()
            .any(|a| a.achievement_type == AchievementType::SkillMastery));
        assert!(first.iter().all(|a| a.earned_at == t0()));

        let again = analyzer.check_achievements(1, 3, &metrics, t0());
        assert!(again.is_empty());
        assert_eq!(analyzer.achievements().len(), first.len());
    }

    #[test]
    fn progress_milestones_follow_overall_level() {
        let mut analyzer = analyzer();
        let mut metrics = ProgressAnalyzer::empty_metrics(10.0);
        metrics.overall_progress = 34.0;
        let earned = analyzer.check_achievements(0, 0, &metrics, t0());
        let levels: Vec<f64> = earned
            .iter()
            .filter(|a| a.achievement_type == AchievementType::ProgressMilestone)
            .map(|a| a.value)
            .collect();
        assert_eq!(levels, vec![10.0, 20.0, 30.0]);
        assert!(earned.iter().all(|a| a.achievement_type.is_milestone()));
    }

    #[test]
    fn recorded_achievements_are_deduplicated_by_id() {
        let mut analyzer = analyzer();
        let achievement = Achievement {
            id: "custom".to_string(),
            achievement_type: AchievementType::SessionCount,
            title: "Imported".to_string(),
            description: String::new(),
            value: 5.0,
            category: AchievementCategory::Dedication,
            rarity: Rarity::Common,
            earned_at: t0(),
        };
        assert!(analyzer.record_achievement(achievement.clone()));
        assert!(!analyzer.record_achievement(achievement));
        assert_eq!(analyzer.achievements().len(), 1);
    }
}
