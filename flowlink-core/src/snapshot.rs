use crate::instance::{InstanceView, NodeInstance, WorkItem};
use crate::types::{InstanceError, ProcessStateCode, Variables};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

// ─── NodeSnapshot ─────────────────────────────────────────────

/// Consolidated view of one node execution within a flush cycle.
///
/// Identity is the node-instance id alone: equality and hashing ignore every
/// other field, so a re-built snapshot for the same execution always matches
/// the one already held.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: String,
    pub node_id: String,
    pub node_definition_id: String,
    pub name: String,
    pub node_type: String,
    pub trigger_time: DateTime<Utc>,
    pub leave_time: Option<DateTime<Utc>>,
}

impl From<&NodeInstance> for NodeSnapshot {
    fn from(node: &NodeInstance) -> Self {
        Self {
            id: node.id.clone(),
            node_id: node.node_id.clone(),
            node_definition_id: node.node_definition_id.clone(),
            name: node.name.clone(),
            node_type: node.node_type.clone(),
            trigger_time: node.trigger_time,
            leave_time: node.leave_time,
        }
    }
}

impl PartialEq for NodeSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NodeSnapshot {}

impl Hash for NodeSnapshot {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// ─── ProcessSnapshot ──────────────────────────────────────────

/// Consolidated current state of one process instance.
///
/// Built once per flush cycle from the live instance, then mutated only
/// through `complete` and the node-set operations below. Identity is the
/// instance id alone.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub id: String,
    pub parent_instance_id: Option<String>,
    pub root_instance_id: Option<String>,
    pub process_id: String,
    pub root_process_id: Option<String>,
    pub process_name: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub state: ProcessStateCode,
    pub business_key: Option<String>,
    pub variables: Variables,
    pub error: Option<InstanceError>,
    /// Security roles, in definition order.
    pub roles: Vec<String>,
    pub milestones: BTreeSet<String>,
    /// Node executions touched this cycle, keyed by node-instance id in
    /// first-seen order.
    pub nodes: IndexMap<String, NodeSnapshot>,
}

impl ProcessSnapshot {
    /// Capture the base snapshot from the live instance. Error details are
    /// read only when the instance is actually faulted.
    pub fn from_instance(instance: &dyn InstanceView) -> Self {
        let state = instance.state();
        let error = if state == ProcessStateCode::Error {
            instance.error()
        } else {
            None
        };
        Self {
            id: instance.id().to_string(),
            parent_instance_id: instance.parent_instance_id().map(str::to_string),
            root_instance_id: instance.root_instance_id().map(str::to_string),
            process_id: instance.process_id().to_string(),
            root_process_id: instance.root_process_id().map(str::to_string),
            process_name: instance.process_name().map(str::to_string),
            start_date: instance.start_date(),
            end_date: instance.end_date(),
            state,
            business_key: instance.business_key().map(str::to_string),
            variables: instance.variables(),
            error,
            roles: split_roles(instance.roles_metadata()),
            milestones: instance.milestones().into_iter().collect(),
            nodes: IndexMap::new(),
        }
    }

    /// Insert a node snapshot unless one with the same id is already held.
    /// Duplicate triggers for one execution collapse to the first.
    pub fn add_node(&mut self, node: NodeSnapshot) {
        if !self.nodes.contains_key(&node.id) {
            self.nodes.insert(node.id.clone(), node);
        }
    }

    /// Drop any held snapshot with the same id, then insert the new one.
    /// The latest view of an execution always wins, so a trigger followed by
    /// a leave within one cycle collapses to a single entry carrying both
    /// timestamps.
    pub fn replace_node(&mut self, node: NodeSnapshot) {
        self.nodes.shift_remove(&node.id);
        self.nodes.insert(node.id.clone(), node);
    }

    /// Record completion. Unconditional overwrite; the last completion
    /// processed in a cycle wins.
    pub fn complete(&mut self, end_date: DateTime<Utc>, state: ProcessStateCode) {
        self.end_date = Some(end_date);
        self.state = state;
    }
}

impl PartialEq for ProcessSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ProcessSnapshot {}

impl Hash for ProcessSnapshot {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

fn split_roles(metadata: Option<&str>) -> Vec<String> {
    metadata
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|role| !role.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// ─── TaskSnapshot ─────────────────────────────────────────────

/// Consolidated view of one human task. Identity is the work-item id alone.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: String,
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
    // Denormalized parent-process identifiers for routing without a join.
    pub process_instance_id: String,
    pub root_instance_id: Option<String>,
    pub process_id: String,
    pub root_process_id: Option<String>,
}

impl TaskSnapshot {
    pub fn from_work_item(item: &WorkItem, instance: &dyn InstanceView) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            description: item.description.clone(),
            priority: item.priority.clone(),
            reference_name: item.reference_name.clone(),
            state: item.state.clone(),
            actual_owner: item.actual_owner.clone(),
            potential_users: item.potential_users.clone(),
            potential_groups: item.potential_groups.clone(),
            excluded_users: item.excluded_users.clone(),
            admin_users: item.admin_users.clone(),
            admin_groups: item.admin_groups.clone(),
            started_at: item.started_at,
            completed_at: item.completed_at,
            inputs: item.inputs.clone(),
            outputs: item.outputs.clone(),
            process_instance_id: instance.id().to_string(),
            root_instance_id: instance.root_instance_id().map(str::to_string),
            process_id: instance.process_id().to_string(),
            root_process_id: instance.root_process_id().map(str::to_string),
        }
    }
}

impl PartialEq for TaskSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TaskSnapshot {}

impl Hash for TaskSnapshot {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
