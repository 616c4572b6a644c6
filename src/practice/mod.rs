pub mod config;
pub mod engine;
pub mod error;
pub mod modeling;
pub mod progress;
pub mod session;
pub mod stats;
pub mod suggestion;
pub mod types;

pub use config::EngineConfig;
pub use engine::PracticeEngine;
pub use error::{AnalysisError, Component, EngineError};
pub use modeling::PatternRecognizer;
pub use progress::ProgressAnalyzer;
pub use session::SessionTracker;
pub use suggestion::SuggestionEngine;
pub use types::*;
