use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("practice engine is not initialized; call initialize() first")]
    NotInitialized,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    SessionTracker,
    PatternRecognizer,
    ProgressAnalyzer,
    SuggestionEngine,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionTracker => "session_tracker",
            Self::PatternRecognizer => "pattern_recognizer",
            Self::ProgressAnalyzer => "progress_analyzer",
            Self::SuggestionEngine => "suggestion_engine",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fault raised inside a single analyzer. Caught at the component boundary and
/// published as a `ComponentError` event instead of aborting the pipeline.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum AnalysisError {
    #[error("{component} produced a non-finite {metric}")]
    NonFinite { component: Component, metric: String },

    #[error("{component} has no data for {metric}")]
    MissingData { component: Component, metric: String },

    #[error("{component} cannot use {parameter} = {value}")]
    InvalidParameter {
        component: Component,
        parameter: String,
        value: String,
    },
}

impl AnalysisError {
    pub fn component(&self) -> Component {
        match self {
            Self::NonFinite { component, .. }
            | Self::MissingData { component, .. }
            | Self::InvalidParameter { component, .. } => *component,
        }
    }
}

pub(crate) fn ensure_finite(
    component: Component,
    metric: &str,
    value: f64,
) -> Result<f64, AnalysisError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AnalysisError::NonFinite {
            component,
            metric: metric.to_string(),
        })
    }
}
