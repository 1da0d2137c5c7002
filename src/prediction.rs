//! Decision rules that turn one raw model output into actuator statuses.
//!
//! The trained artifact is not held to a single output shape. Every result is
//! decoded into [`RawPrediction`] right after inference and the rules below
//! match on it exhaustively.

use std::fmt;

use crate::types::ActuatorDecision;

/// Label vocabulary shared with the training side. A text label switches an
/// actuator on when it contains the marker; a missing marker means off.
pub const FAN_ON_MARKER: &str = "fan_on";
pub const PUMP_ON_MARKER: &str = "pump_on";

/// One element of an indicator pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Indicator {
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Non-numeric element (string, nested list, ...).
    Other,
}

impl Indicator {
    /// True when the element equals the integer 1.
    pub fn is_one(&self) -> bool {
        match *self {
            Indicator::Int(v) => v == 1,
            Indicator::Float(v) => v == 1.0,
            Indicator::Bool(v) => v,
            Indicator::Other => false,
        }
    }
}

/// A single row of model output, decoded by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPrediction {
    /// e.g. `"fan_on_pump_off"`
    TextLabel(String),
    /// Multi-output binary classification, `[fan, pump]`.
    IndicatorPair([Indicator; 2]),
    /// Any other shape; carries a description for logs.
    Unrecognized(String),
}

impl fmt::Display for RawPrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawPrediction::TextLabel(s) => write!(f, "label {:?}", s),
            RawPrediction::IndicatorPair([a, b]) => write!(f, "pair [{:?}, {:?}]", a, b),
            RawPrediction::Unrecognized(desc) => write!(f, "unrecognized {}", desc),
        }
    }
}

impl ActuatorDecision {
    /// Unrecognized shapes yield `unknown` for both actuators rather than an error.
    pub fn from_raw(raw: &RawPrediction) -> Self {
        match raw {
            RawPrediction::TextLabel(label) => ActuatorDecision::new(
                label.contains(FAN_ON_MARKER),
                label.contains(PUMP_ON_MARKER),
            ),
            RawPrediction::IndicatorPair([fan, pump]) => {
                ActuatorDecision::new(fan.is_one(), pump.is_one())
            }
            RawPrediction::Unrecognized(_) => ActuatorDecision::UNKNOWN,
        }
    }
}
