pub mod core;
pub mod logging;
pub mod practice;

pub use crate::core::{Clock, EventBus, EventEnvelope, ManualClock, PracticeEvent, SystemClock};
pub use practice::{EngineConfig, EngineError, PracticeEngine};
