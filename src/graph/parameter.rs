//! Typed operator parameters with optional bounds and option sets.

use crate::graph::port::DataKind;
use crate::graph::value::Value;

/// A parameter value together with its declared constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    value: Value,
    default: Value,
    min: Option<f64>,
    max: Option<f64>,
    options: Vec<Value>,
    pub description: String,
}

impl Parameter {
    /// Declare a parameter; its kind is the kind of `default`.
    pub fn new(default: impl Into<Value>) -> Self {
        let default = default.into();
        Self {
            value: default.clone(),
            default,
            min: None,
            max: None,
            options: Vec::new(),
            description: String::new(),
        }
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_options(mut self, options: impl IntoIterator<Item = Value>) -> Self {
        self.options = options.into_iter().collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn kind(&self) -> DataKind {
        self.default.kind()
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn options(&self) -> &[Value] {
        &self.options
    }

    /// Check a candidate value against kind, bounds and options.
    pub fn check(&self, candidate: &Value) -> Result<(), String> {
        if matches!(candidate, Value::Image(_)) {
            return Err("image values cannot be used as parameters".to_string());
        }
        if candidate.kind() != self.kind() {
            return Err(format!(
                "expected {:?} value, got {:?}",
                self.kind(),
                candidate.kind()
            ));
        }
        if let Some(number) = candidate.as_f64() {
            if let Some(min) = self.min {
                if number < min {
                    return Err(format!("{} is below minimum {}", number, min));
                }
            }
            if let Some(max) = self.max {
                if number > max {
                    return Err(format!("{} is above maximum {}", number, max));
                }
            }
        }
        if !self.options.is_empty() && !self.options.contains(candidate) {
            return Err(format!("{:?} is not one of the allowed options", candidate));
        }
        Ok(())
    }

    /// Problem with the currently stored value, if any.
    pub fn violation(&self) -> Option<String> {
        self.check(&self.value).err()
    }

    /// Set a new value after checking it.
    pub fn set(&mut self, value: Value) -> Result<(), String> {
        self.check(&value)?;
        self.value = value;
        Ok(())
    }

    /// Store a value without checking it (import layers restoring saved graphs).
    pub fn set_unchecked(&mut self, value: Value) {
        self.value = value;
    }

    pub fn reset(&mut self) {
        self.value = self.default.clone();
    }
}
