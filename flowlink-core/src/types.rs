use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ─── Scalar aliases ───────────────────────────────────────────

/// Process-instance identifier as the engine reports it.
pub type InstanceId = String;

/// Node-instance identifier (one execution of one node).
pub type NodeInstanceId = String;

/// Work-item identifier for a human task.
pub type TaskId = String;

/// Process variables keyed by unique name.
pub type Variables = BTreeMap<String, Value>;

// ─── Process state codes ──────────────────────────────────────

/// Integer-coded lifecycle state of a process instance, as exposed to
/// downstream consumers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum ProcessStateCode {
    Pending = 0,
    Active = 1,
    Completed = 2,
    Aborted = 3,
    Suspended = 4,
    Error = 5,
}

impl From<ProcessStateCode> for i32 {
    fn from(state: ProcessStateCode) -> i32 {
        state as i32
    }
}

impl TryFrom<i32> for ProcessStateCode {
    type Error = UnknownStateCode;

    fn try_from(code: i32) -> Result<Self, UnknownStateCode> {
        Ok(match code {
            0 => ProcessStateCode::Pending,
            1 => ProcessStateCode::Active,
            2 => ProcessStateCode::Completed,
            3 => ProcessStateCode::Aborted,
            4 => ProcessStateCode::Suspended,
            5 => ProcessStateCode::Error,
            other => return Err(UnknownStateCode(other)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown process state code {0}")]
pub struct UnknownStateCode(pub i32);

// ─── Instance error info ──────────────────────────────────────

/// Error details captured from an instance in the `Error` state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceError {
    /// Definition id of the node the instance faulted on.
    pub node_definition_id: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_code_round_trip() {
        for code in 0..=5 {
            let state = ProcessStateCode::try_from(code).unwrap();
            assert_eq!(i32::from(state), code);
        }
        assert_eq!(ProcessStateCode::try_from(42), Err(UnknownStateCode(42)));
    }
}
