use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::core::clock::{Clock, SystemClock};
use crate::practice::error::{AnalysisError, Component};
use crate::practice::types::{
    Achievement, AutomationConfig, BehaviorPattern, PracticeInsights, PracticeSession,
};

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum PracticeEvent {
    #[serde(rename = "SESSION_STARTED")]
    SessionStarted(PracticeSession),

    #[serde(rename = "SESSION_ENDED")]
    SessionEnded(PracticeSession),

    #[serde(rename = "PATTERN_DETECTED")]
    PatternDetected(BehaviorPattern),

    #[serde(rename = "MILESTONE_ACHIEVED")]
    MilestoneAchieved(Achievement),

    #[serde(rename = "ACHIEVEMENT_RECORDED")]
    AchievementRecorded(Achievement),

    #[serde(rename = "INSIGHTS_GENERATED")]
    InsightsGenerated(Box<PracticeInsights>),

    #[serde(rename = "AUTOMATION_CONFIG_GENERATED")]
    AutomationConfigGenerated(AutomationConfig),

    #[serde(rename = "COMPONENT_ERROR")]
    ComponentError(ComponentErrorPayload),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentErrorPayload {
    pub component: Component,
    pub message: String,
    pub error: AnalysisError,
}

impl From<AnalysisError> for ComponentErrorPayload {
    fn from(error: AnalysisError) -> Self {
        Self {
            component: error.component(),
            message: error.to_string(),
            error,
        }
    }
}

impl PracticeEvent {
    pub const ALL_TYPES: [&'static str; 8] = [
        "SESSION_STARTED",
        "SESSION_ENDED",
        "PATTERN_DETECTED",
        "MILESTONE_ACHIEVED",
        "ACHIEVEMENT_RECORDED",
        "INSIGHTS_GENERATED",
        "AUTOMATION_CONFIG_GENERATED",
        "COMPONENT_ERROR",
    ];

    pub fn event_type(&self) -> &'static str {
        match self {
            PracticeEvent::SessionStarted(_) => "SESSION_STARTED",
            PracticeEvent::SessionEnded(_) => "SESSION_ENDED",
            PracticeEvent::PatternDetected(_) => "PATTERN_DETECTED",
            PracticeEvent::MilestoneAchieved(_) => "MILESTONE_ACHIEVED",
            PracticeEvent::AchievementRecorded(_) => "ACHIEVEMENT_RECORDED",
            PracticeEvent::InsightsGenerated(_) => "INSIGHTS_GENERATED",
            PracticeEvent::AutomationConfigGenerated(_) => "AUTOMATION_CONFIG_GENERATED",
            PracticeEvent::ComponentError(_) => "COMPONENT_ERROR",
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            PracticeEvent::SessionStarted(s) | PracticeEvent::SessionEnded(s) => Some(&s.id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub id: String,
    pub event: PracticeEvent,
    pub created_at: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: PracticeEvent, created_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event,
            created_at,
        }
    }
}

type SubscriberId = String;

struct Subscriber {
    session_id: Option<String>,
    event_types: Option<Vec<String>>,
    sender: broadcast::Sender<EventEnvelope>,
}

impl Subscriber {
    fn matches(&self, envelope: &EventEnvelope) -> bool {
        if let Some(ref session_id) = self.session_id {
            if envelope.event.session_id() != Some(session_id.as_str()) {
                return false;
            }
        }

        if let Some(ref event_types) = self.event_types {
            if !event_types.iter().any(|t| t == envelope.event.event_type()) {
                return false;
            }
        }

        true
    }
}

/// Fan-out of engine events. Every subscriber owns a bounded channel, so a slow
/// or dropped receiver only loses its own messages.
pub struct EventBus {
    clock: Arc<dyn Clock>,
    global_sender: broadcast::Sender<EventEnvelope>,
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    event_count: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let (global_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            clock,
            global_sender,
            subscribers: RwLock::new(HashMap::new()),
            event_count: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: PracticeEvent) {
        let envelope = EventEnvelope::new(event, self.clock.now());
        let event_type = envelope.event.event_type();

        self.event_count.fetch_add(1, Ordering::Relaxed);

        let mut sent_count = 0usize;
        let mut closed = Vec::new();
        {
            let subscribers = self.subscribers.read();
            for (id, subscriber) in subscribers.iter() {
                if subscriber.matches(&envelope) {
                    match subscriber.sender.send(envelope.clone()) {
                        Ok(_) => sent_count += 1,
                        Err(_) => closed.push(id.clone()),
                    }
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.subscribers.write();
            for id in &closed {
                subscribers.remove(id);
            }
            debug!(removed = closed.len(), "Dropped closed subscriptions");
        }

        if self.global_sender.send(envelope).is_err() {
            debug!(event_type, "No global subscribers for event");
        }

        debug!(event_type, sent_to = sent_count, "Event published");
    }

    pub fn subscribe_global(&self) -> broadcast::Receiver<EventEnvelope> {
        self.global_sender.subscribe()
    }

    pub fn subscribe_filtered(
        &self,
        session_id: Option<String>,
        event_types: Option<Vec<String>>,
    ) -> (SubscriberId, broadcast::Receiver<EventEnvelope>) {
        let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
        let subscriber_id = uuid::Uuid::new_v4().to_string();

        let subscriber = Subscriber {
            session_id,
            event_types,
            sender,
        };

        self.subscribers
            .write()
            .insert(subscriber_id.clone(), subscriber);

        debug!(subscriber_id = %subscriber_id, "New filtered subscription created");

        (subscriber_id, receiver)
    }

    pub fn unsubscribe(&self, subscriber_id: &str) {
        if self.subscribers.write().remove(subscriber_id).is_some() {
            debug!(subscriber_id = %subscriber_id, "Subscription removed");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len() + self.global_sender.receiver_count()
    }

    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> EventBusStats {
        EventBusStats {
            total_events: self.event_count(),
            subscriber_count: self.subscriber_count(),
            global_subscribers: self.global_sender.receiver_count(),
            filtered_subscribers: self.subscribers.read().len(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBusStats {
    pub total_events: u64,
    pub subscriber_count: usize,
    pub global_subscribers: usize,
    pub filtered_subscribers: usize,
}
