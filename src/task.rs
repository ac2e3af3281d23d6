//! The unit of work exchanged between the orchestrator and agents.
//!
//! # Invariants
//! - `id` is unique within one orchestrator process and strictly increasing
//!   in allocation order
//! - A task exists only once both of its operands are known

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::expr::Operator;

/// Identifier of a dispatched task.
pub type TaskId = u64;

/// One binary operation ready to be computed by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(with = "wire_f64")]
    pub arg1: f64,
    #[serde(with = "wire_f64")]
    pub arg2: f64,
    pub operation: Operator,
    /// Simulated compute cost in milliseconds.
    pub operation_time: u64,
}

impl Task {
    /// Compute the arithmetic result without any simulated delay.
    pub fn compute(&self) -> f64 {
        self.operation.apply(self.arg1, self.arg2)
    }

    pub fn simulated_duration(&self) -> Duration {
        Duration::from_millis(self.operation_time)
    }
}

/// Result of a task, as reported by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub id: TaskId,
    #[serde(with = "wire_f64")]
    pub result: f64,
}

/// JSON encoding for `f64` that survives non-finite values.
///
/// `serde_json` writes `inf`/`NaN` as `null`, which cannot be read back into an
/// `f64`. Finite values stay plain numbers; non-finite ones become the strings
/// `"inf"`, `"-inf"` and `"NaN"`.
pub mod wire_f64 {
    use serde::de::{self, Deserializer};
    use serde::{Deserialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => from_text(&text)
                .ok_or_else(|| de::Error::custom(format!("invalid number: {}", text))),
        }
    }

    fn from_text(text: &str) -> Option<f64> {
        match text {
            "inf" | "+inf" | "Infinity" => Some(f64::INFINITY),
            "-inf" | "-Infinity" => Some(f64::NEG_INFINITY),
            "NaN" | "nan" => Some(f64::NAN),
            _ => None,
        }
    }

    /// Same encoding for optional values; `None` stays `null`.
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        #[derive(Deserialize)]
        struct Wrapped(#[serde(with = "super")] f64);

        pub fn serialize<S: Serializer>(
            value: &Option<f64>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<f64>, D::Error> {
            Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|w| w.0))
        }
    }
}
