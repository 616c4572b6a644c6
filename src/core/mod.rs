mod clock;
mod event_bus;

pub use clock::{Clock, ManualClock, SystemClock};
pub use event_bus::{ComponentErrorPayload, EventBus, EventBusStats, EventEnvelope, PracticeEvent};
