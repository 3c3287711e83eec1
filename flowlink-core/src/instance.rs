use crate::types::{InstanceError, ProcessStateCode, Variables};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Read-only view of a live process instance held by the engine.
///
/// The collector reads through this trait when it lazily derives the base
/// snapshot for an instance on first touch. Implementations must return a
/// consistent picture as of call time; nothing here mutates engine state.
pub trait InstanceView: Send + Sync {
    fn id(&self) -> &str;

    /// Parent instance id, absent for top-level instances.
    fn parent_instance_id(&self) -> Option<&str>;

    /// Root instance id, absent for top-level instances.
    fn root_instance_id(&self) -> Option<&str>;

    fn process_id(&self) -> &str;

    fn root_process_id(&self) -> Option<&str>;

    fn process_name(&self) -> Option<&str>;

    fn start_date(&self) -> Option<DateTime<Utc>>;

    fn end_date(&self) -> Option<DateTime<Utc>>;

    fn state(&self) -> ProcessStateCode;

    fn business_key(&self) -> Option<&str>;

    fn variables(&self) -> Variables;

    /// Security-roles metadata as a single comma-separated string, the way
    /// the engine stores it on the process definition.
    fn roles_metadata(&self) -> Option<&str>;

    /// Milestone names reached so far. Most definitions have none.
    fn milestones(&self) -> Vec<String> {
        Vec::new()
    }

    /// Fault details. Only meaningful while `state()` is `Error`.
    fn error(&self) -> Option<InstanceError>;
}

/// One execution of a single node, as reported by the engine alongside a
/// node lifecycle event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeInstance {
    /// Node-instance id — unique per execution, not per definition.
    pub id: String,
    pub node_id: String,
    pub node_definition_id: String,
    pub name: String,
    pub node_type: String,
    pub trigger_time: DateTime<Utc>,
    /// Set once the node has been left.
    pub leave_time: Option<DateTime<Utc>>,
}

/// A human-task work item, as reported alongside a task lifecycle event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Work-item id — the task's identity downstream.
    pub id: String,
    /// Only human tasks are consolidated; system work items are skipped.
    pub human: bool,
    pub name: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub reference_name: Option<String>,
    pub state: String,
    pub actual_owner: Option<String>,
    pub potential_users: BTreeSet<String>,
    pub potential_groups: BTreeSet<String>,
    pub excluded_users: BTreeSet<String>,
    pub admin_users: BTreeSet<String>,
    pub admin_groups: BTreeSet<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub inputs: Variables,
    pub outputs: Variables,
}
