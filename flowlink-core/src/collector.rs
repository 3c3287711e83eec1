use crate::events::{RawLifecycleEvent, StateEvent};
use crate::snapshot::{NodeSnapshot, ProcessSnapshot, TaskSnapshot};
use crate::types::ProcessStateCode;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// One flush cycle's worth of accumulated events, materialized on demand.
///
/// Single-use: `append` on the unit-of-work thread, `materialize` once at
/// flush. Not designed for concurrent appends.
pub trait EventBatch {
    fn append(&mut self, event: RawLifecycleEvent);
    fn materialize(self) -> Vec<StateEvent>;
}

/// Configuration stamped onto every event a collector emits.
#[derive(Clone, Debug, Default)]
pub struct CollectorConfig {
    /// Service name, used as the routing-id prefix for un-namespaced
    /// process ids.
    pub service: String,
    /// Addons descriptor forwarded to consumers, when configured.
    pub addons: Option<String>,
}

/// Accumulates raw lifecycle events for one flush cycle and merges them
/// into minimal current-state snapshots per instance and per task.
pub struct EventCollector {
    config: CollectorConfig,
    events: Vec<RawLifecycleEvent>,
}

impl EventCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self {
            config,
            events: Vec::new(),
        }
    }

    /// Routing id for a process id: the leaf of a namespaced id, otherwise
    /// the service-qualified id.
    fn route(&self, process_id: &str) -> String {
        match process_id.rfind('.') {
            Some(dot) => process_id[dot + 1..].to_string(),
            None => format!("{}/{}", self.config.service, process_id),
        }
    }
}

impl EventBatch for EventCollector {
    /// Store a consolidatable event. Kinds this layer does not consolidate
    /// are dropped without error.
    fn append(&mut self, event: RawLifecycleEvent) {
        if let RawLifecycleEvent::VariableUpdated { name, .. } = &event {
            trace!(variable = %name, "skipping non-consolidated event");
            return;
        }
        self.events.push(event);
    }

    /// Single deterministic pass in append order.
    ///
    /// The base snapshot for an instance is captured from the live instance
    /// on first touch and not re-derived later in the cycle; the only
    /// updates after that are the per-kind merges below. Emits one process
    /// event per touched instance, then one task event per touched task,
    /// both in first-seen order.
    fn materialize(mut self) -> Vec<StateEvent> {
        let mut processes: IndexMap<String, ProcessSnapshot> = IndexMap::new();
        let mut tasks: IndexMap<String, TaskSnapshot> = IndexMap::new();

        for event in std::mem::take(&mut self.events) {
            let instance = Arc::clone(event.instance());
            let snapshot = processes
                .entry(instance.id().to_string())
                .or_insert_with(|| ProcessSnapshot::from_instance(instance.as_ref()));

            match event {
                RawLifecycleEvent::NodeTriggered { node, .. } => {
                    snapshot.add_node(NodeSnapshot::from(&node));
                }
                RawLifecycleEvent::NodeLeft { node, .. } => {
                    snapshot.replace_node(NodeSnapshot::from(&node));
                }
                RawLifecycleEvent::ProcessCompleted {
                    end_date, state, ..
                } => {
                    snapshot.complete(end_date, state);
                }
                RawLifecycleEvent::TaskTransitioned {
                    work_item,
                    transitioned,
                    ..
                } => {
                    // First event for a task id wins; later transitions in
                    // the same cycle do not overwrite it.
                    if work_item.human
                        && transitioned
                        && !tasks.contains_key(&work_item.id)
                    {
                        tasks.insert(
                            work_item.id.clone(),
                            TaskSnapshot::from_work_item(&work_item, instance.as_ref()),
                        );
                    }
                }
                // Filtered at append.
                RawLifecycleEvent::VariableUpdated { .. } => {}
            }
        }

        debug!(
            processes = processes.len(),
            tasks = tasks.len(),
            "materializing batch"
        );

        let states: HashMap<String, ProcessStateCode> = processes
            .iter()
            .map(|(id, snapshot)| (id.clone(), snapshot.state))
            .collect();

        let mut out = Vec::with_capacity(processes.len() + tasks.len());
        for (_, snapshot) in processes {
            let route = self.route(&snapshot.process_id);
            out.push(StateEvent::process(
                route,
                self.config.addons.clone(),
                snapshot,
            ));
        }
        for (_, snapshot) in tasks {
            let route = self.route(&snapshot.process_id);
            // The owning instance was materialized above; a miss here is a
            // broken engine contract.
            let state = states[&snapshot.process_instance_id];
            out.push(StateEvent::task(
                route,
                self.config.addons.clone(),
                snapshot,
                state,
            ));
        }
        out
    }
}
