//! Parsing of textual model configuration
//!
//! Services receive hyperparameters and drop-lists as plain form fields.
//! This module turns them into typed values and rejects anything malformed
//! with [`PipelineError::ConfigError`].

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name -> JSON value mapping of estimator hyperparameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hyperparameters(Map<String, Value>);

impl Hyperparameters {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Set a parameter, replacing any previous value
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    /// Fail on any parameter name outside `allowed`.
    pub fn reject_unknown(&self, model: &str, allowed: &[&str]) -> Result<()> {
        if let Some(unknown) = self.names().find(|name| !allowed.contains(name)) {
            return Err(PipelineError::TrainingError(format!(
                "{} got an unexpected parameter '{}' (accepted: {})",
                model,
                unknown,
                allowed.join(", ")
            )));
        }
        Ok(())
    }

    /// Non-negative integer parameter. Integral floats such as `100.0` are accepted.
    pub fn usize(&self, name: &str) -> Result<Option<usize>> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => as_usize(value)
                .map(Some)
                .ok_or_else(|| type_error(name, "a non-negative integer", value)),
        }
    }

    /// Integer parameter that may be explicitly `null` (e.g. `max_depth`).
    ///
    /// Returns `None` when absent, `Some(None)` when null.
    pub fn nullable_usize(&self, name: &str) -> Result<Option<Option<usize>>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Null) => Ok(Some(None)),
            Some(value) => as_usize(value)
                .map(|v| Some(Some(v)))
                .ok_or_else(|| type_error(name, "a non-negative integer or null", value)),
        }
    }

    pub fn f64(&self, name: &str) -> Result<Option<f64>> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| type_error(name, "a number", value)),
        }
    }

    pub fn bool(&self, name: &str) -> Result<Option<bool>> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => value
                .as_bool()
                .map(Some)
                .ok_or_else(|| type_error(name, "a boolean", value)),
        }
    }

    pub fn str(&self, name: &str) -> Result<Option<&str>> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => value
                .as_str()
                .map(Some)
                .ok_or_else(|| type_error(name, "a string", value)),
        }
    }
}

impl From<Map<String, Value>> for Hyperparameters {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn as_usize(value: &Value) -> Option<usize> {
    if let Some(v) = value.as_u64() {
        return usize::try_from(v).ok();
    }
    match value.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= usize::MAX as f64 => Some(f as usize),
        _ => None,
    }
}

fn type_error(name: &str, expected: &str, got: &Value) -> PipelineError {
    PipelineError::TrainingError(format!(
        "parameter '{}' must be {}, got {}",
        name, expected, got
    ))
}

/// Parse a JSON object literal into hyperparameters.
///
/// Callers pass `"{}"` when no parameters were supplied.
pub fn parse_model_params(text: &str) -> Result<Hyperparameters> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| PipelineError::ConfigError(format!("invalid model_params JSON: {}", e)))?;

    match value {
        Value::Object(map) => Ok(Hyperparameters(map)),
        other => Err(PipelineError::ConfigError(format!(
            "model_params must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Parse the list of columns to exclude before processing.
///
/// Accepts a JSON array of strings or comma-separated names. Absent or
/// blank input yields `None`, which is distinct from an explicit empty list.
pub fn parse_columns_to_drop(text: Option<&str>) -> Result<Option<Vec<String>>> {
    let text = match text.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(t) => t,
    };

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(PipelineError::ConfigError(format!(
                    "columns_to_drop entries must be strings, got {}",
                    json_kind(&other)
                ))),
            })
            .collect::<Result<Vec<_>>>()
            .map(Some),
        Ok(other) => Err(PipelineError::ConfigError(format!(
            "columns_to_drop must be a JSON array of strings, got {}",
            json_kind(&other)
        ))),
        Err(e) if text.starts_with('[') || text.starts_with('{') => Err(
            PipelineError::ConfigError(format!("invalid columns_to_drop JSON: {}", e)),
        ),
        Err(_) => Ok(Some(
            text.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
