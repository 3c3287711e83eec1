use crate::instance::{InstanceView, NodeInstance, WorkItem};
use crate::snapshot::{ProcessSnapshot, TaskSnapshot};
use crate::types::ProcessStateCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

// ─── Raw lifecycle events (engine → collector) ────────────────

/// Fine-grained lifecycle events raised by the engine during one unit of
/// work. Each carries the live instance it was raised for; the collector
/// reads the base snapshot through it on first touch. Instances live only
/// for the duration of one flush cycle and are never persisted here.
#[derive(Clone)]
pub enum RawLifecycleEvent {
    NodeTriggered {
        instance: Arc<dyn InstanceView>,
        node: NodeInstance,
    },
    NodeLeft {
        instance: Arc<dyn InstanceView>,
        node: NodeInstance,
    },
    ProcessCompleted {
        instance: Arc<dyn InstanceView>,
        end_date: DateTime<Utc>,
        state: ProcessStateCode,
    },
    TaskTransitioned {
        instance: Arc<dyn InstanceView>,
        work_item: WorkItem,
        transitioned: bool,
    },
    /// Raised on every variable write. Not consolidated — variables are
    /// re-read from the live instance when its base snapshot is captured.
    VariableUpdated {
        instance: Arc<dyn InstanceView>,
        name: String,
        value: Value,
    },
}

impl RawLifecycleEvent {
    /// The live instance this event was raised for.
    pub fn instance(&self) -> &Arc<dyn InstanceView> {
        match self {
            RawLifecycleEvent::NodeTriggered { instance, .. }
            | RawLifecycleEvent::NodeLeft { instance, .. }
            | RawLifecycleEvent::ProcessCompleted { instance, .. }
            | RawLifecycleEvent::TaskTransitioned { instance, .. }
            | RawLifecycleEvent::VariableUpdated { instance, .. } => instance,
        }
    }
}

// ─── Metadata keys (contract with downstream consumers) ───────

/// Entity kind of the event body. Always present.
pub const META_KIND: &str = "kind";
/// Process-instance id. Always present.
pub const META_INSTANCE_ID: &str = "processInstanceId";
/// Parent instance id. Absent for top-level instances.
pub const META_PARENT_INSTANCE_ID: &str = "parentInstanceId";
/// Root instance id. Absent for top-level instances.
pub const META_ROOT_INSTANCE_ID: &str = "rootInstanceId";
/// Process definition id. Always present.
pub const META_PROCESS_ID: &str = "processId";
/// Root process definition id. Absent for top-level instances.
pub const META_ROOT_PROCESS_ID: &str = "rootProcessId";
/// Integer state code of the owning instance. Always present.
pub const META_STATE: &str = "state";

/// `META_KIND` value for process-state events.
pub const KIND_PROCESS_INSTANCE: &str = "process-instance";
/// `META_KIND` value for task-state events.
pub const KIND_USER_TASK: &str = "user-task";

// ─── State events (collector → publishers) ────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StateEventBody {
    #[serde(rename = "process-instance")]
    Process(ProcessSnapshot),
    #[serde(rename = "user-task")]
    Task(TaskSnapshot),
}

/// One consolidated, externally-publishable state event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateEvent {
    /// Routing id derived from the process id and service name; downstream
    /// consumers partition on it.
    pub route: String,
    /// Addons descriptor of the emitting service, when configured.
    pub addons: Option<String>,
    /// Materialization time; consumers order on it within one batch.
    pub time: DateTime<Utc>,
    /// Routing metadata, see the `META_*` keys.
    pub metadata: BTreeMap<String, String>,
    pub body: StateEventBody,
}

impl StateEvent {
    pub fn process(route: String, addons: Option<String>, snapshot: ProcessSnapshot) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(META_KIND.to_string(), KIND_PROCESS_INSTANCE.to_string());
        metadata.insert(META_INSTANCE_ID.to_string(), snapshot.id.clone());
        if let Some(parent) = &snapshot.parent_instance_id {
            metadata.insert(META_PARENT_INSTANCE_ID.to_string(), parent.clone());
        }
        if let Some(root) = &snapshot.root_instance_id {
            metadata.insert(META_ROOT_INSTANCE_ID.to_string(), root.clone());
        }
        metadata.insert(META_PROCESS_ID.to_string(), snapshot.process_id.clone());
        if let Some(root) = &snapshot.root_process_id {
            metadata.insert(META_ROOT_PROCESS_ID.to_string(), root.clone());
        }
        metadata.insert(META_STATE.to_string(), i32::from(snapshot.state).to_string());
        Self {
            route,
            addons,
            time: Utc::now(),
            metadata,
            body: StateEventBody::Process(snapshot),
        }
    }

    pub fn task(
        route: String,
        addons: Option<String>,
        snapshot: TaskSnapshot,
        state: ProcessStateCode,
    ) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(META_KIND.to_string(), KIND_USER_TASK.to_string());
        metadata.insert(
            META_INSTANCE_ID.to_string(),
            snapshot.process_instance_id.clone(),
        );
        if let Some(root) = &snapshot.root_instance_id {
            metadata.insert(META_ROOT_INSTANCE_ID.to_string(), root.clone());
        }
        metadata.insert(META_PROCESS_ID.to_string(), snapshot.process_id.clone());
        if let Some(root) = &snapshot.root_process_id {
            metadata.insert(META_ROOT_PROCESS_ID.to_string(), root.clone());
        }
        metadata.insert(META_STATE.to_string(), i32::from(state).to_string());
        Self {
            route,
            addons,
            time: Utc::now(),
            metadata,
            body: StateEventBody::Task(snapshot),
        }
    }
}
