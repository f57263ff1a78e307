//! Port descriptors for the node system.
//!
//! Each node declares its ports (inputs/outputs) with a name unique per
//! direction and a [`DataKind`]. The validator uses these to check
//! connections; the scheduler uses defaults to fill unconnected inputs.

use crate::graph::value::Value;
use serde::{Deserialize, Serialize};

/// The kind of data flowing through a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    Image,
    Scalar,
    Boolean,
    String,
    Geometry,
    /// Accepts or produces any kind.
    Any,
}

impl DataKind {
    /// Connection rule: equal kinds, or either side is `Any`.
    pub fn is_compatible_with(self, other: DataKind) -> bool {
        self == other || self == DataKind::Any || other == DataKind::Any
    }

    /// Whether a concrete value can be delivered to a port of this kind.
    pub fn accepts(self, value: &Value) -> bool {
        self.is_compatible_with(value.kind())
    }
}

/// Whether a port is an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
}

/// Descriptor for a node's port.
#[derive(Debug, Clone, PartialEq)]
pub struct PortDescriptor {
    pub name: String,
    pub direction: PortDirection,
    pub kind: DataKind,
    /// Inputs only: execution needs a value on this port.
    pub required: bool,
    /// Inputs only: value used when nothing is connected.
    pub default: Option<Value>,
}

impl PortDescriptor {
    /// A required input without default.
    pub fn input(name: impl Into<String>, kind: DataKind) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Input,
            kind,
            required: true,
            default: None,
        }
    }

    /// An input that may stay empty.
    pub fn optional_input(name: impl Into<String>, kind: DataKind) -> Self {
        Self {
            required: false,
            ..Self::input(name, kind)
        }
    }

    pub fn output(name: impl Into<String>, kind: DataKind) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Output,
            kind,
            required: false,
            default: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Whether an unconnected input can still be fed.
    pub fn has_usable_default(&self) -> bool {
        self.default
            .as_ref()
            .is_some_and(|value| self.kind.accepts(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_compatibility() {
        assert!(DataKind::Image.is_compatible_with(DataKind::Image));
        assert!(DataKind::Image.is_compatible_with(DataKind::Any));
        assert!(DataKind::Any.is_compatible_with(DataKind::Boolean));
        assert!(!DataKind::Image.is_compatible_with(DataKind::Scalar));
    }

    #[test]
    fn test_default_must_match_kind() {
        let port = PortDescriptor::input("threshold", DataKind::Scalar).with_default(128.0);
        assert!(port.has_usable_default());

        let bad = PortDescriptor::input("threshold", DataKind::Scalar).with_default("high");
        assert!(!bad.has_usable_default());
    }

    #[test]
    fn test_optional_input_not_required() {
        let port = PortDescriptor::optional_input("mask", DataKind::Image);
        assert!(!port.required);
        assert_eq!(port.direction, PortDirection::Input);
    }
}
