use crate::correlation::{
    AttributeResolver, CorrelationResolver, Message, PayloadResolver, ReferenceIdResolver,
    ATTR_SOURCE, ATTR_TYPE,
};
use crate::types::ProcessStateCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

// ─── ProcessService collaborator ──────────────────────────────

/// Identity of a process instance as returned by the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRef {
    pub id: String,
    pub business_key: Option<String>,
    pub state: ProcessStateCode,
}

/// Failure surfaced by the engine while routing a message. This layer adds
/// no retry; redelivery policy belongs to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("process instance {instance_id} not found")]
    InstanceNotFound { instance_id: String },
    #[error("message rejected by process {process_id}: {reason}")]
    Rejected { process_id: String, reason: String },
    #[error("engine failure: {0}")]
    Engine(String),
}

/// Engine operations the dispatcher executes its decisions against.
#[async_trait]
pub trait ProcessService: Send + Sync {
    /// Look up a running instance. A miss is `Ok(None)`, not an error.
    async fn find_instance(
        &self,
        process_id: &str,
        instance_id: &str,
    ) -> Result<Option<InstanceRef>, ServiceError>;

    /// Signal a running instance on the named channel.
    async fn signal(
        &self,
        process_id: &str,
        instance_id: &str,
        payload: Value,
        reason: &str,
    ) -> Result<InstanceRef, ServiceError>;

    /// Start a new instance. `reference_id` records provenance when the
    /// message carried one.
    #[allow(clippy::too_many_arguments)]
    async fn create_instance(
        &self,
        process_id: &str,
        business_key: Option<&str>,
        model: Value,
        from_node: Option<&str>,
        trigger: &str,
        reference_id: Option<&str>,
    ) -> Result<InstanceRef, ServiceError>;
}

// ─── Dispatcher ───────────────────────────────────────────────

/// Converts the message payload into the process's typed variables. When
/// absent the raw payload is used as-is.
pub type ModelConverter = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Routes inbound messages into running or new process instances.
///
/// The correlation decision per message: a resolvable reference id that
/// matches a running instance means signal; anything else means start. The
/// decision executes on the injected worker pool; the caller gets the
/// spawned handle back immediately and owns redelivery on failure. Two
/// concurrent dispatches to the same instance are not serialized here.
pub struct CorrelationDispatcher {
    process_id: String,
    service: Arc<dyn ProcessService>,
    pool: Handle,
    model_converter: Option<ModelConverter>,
    reference_resolver: ReferenceIdResolver,
    type_resolver: AttributeResolver,
    source_resolver: AttributeResolver,
    payload_resolver: PayloadResolver,
}

impl CorrelationDispatcher {
    pub fn new(
        process_id: impl Into<String>,
        service: Arc<dyn ProcessService>,
        pool: Handle,
    ) -> Self {
        Self {
            process_id: process_id.into(),
            service,
            pool,
            model_converter: None,
            reference_resolver: ReferenceIdResolver,
            type_resolver: AttributeResolver::new(ATTR_TYPE),
            source_resolver: AttributeResolver::new(ATTR_SOURCE),
            payload_resolver: PayloadResolver,
        }
    }

    pub fn with_model_converter(mut self, converter: ModelConverter) -> Self {
        self.model_converter = Some(converter);
        self
    }

    /// Message-type filter. Resolves type and source but admits every
    /// message.
    // TODO: compare type/source against an ignored-messages configuration
    // once one exists.
    fn is_ignored(&self, message: &Message) -> bool {
        let message_type = self.type_resolver.resolve(message);
        let source = self.source_resolver.resolve(message);
        trace!(
            message_type = message_type.as_string().unwrap_or(""),
            source = source.as_string().unwrap_or(""),
            "message admitted"
        );
        false
    }

    /// Resolve correlation on the calling thread, then execute the
    /// signal-or-start decision on the worker pool.
    ///
    /// The returned handle carries the routing outcome: `None` when the
    /// message was filtered out, otherwise the signalled or started
    /// instance. Cancelling the handle before the task runs cancels that
    /// one dispatch only.
    pub fn dispatch(
        &self,
        trigger: &str,
        message: Message,
    ) -> JoinHandle<Result<Option<InstanceRef>, ServiceError>> {
        let reference = self
            .reference_resolver
            .resolve(&message)
            .as_string()
            .map(str::to_string);
        if self.is_ignored(&message) {
            return self
                .pool
                .spawn(async { Ok::<Option<InstanceRef>, ServiceError>(None) });
        }

        let service = Arc::clone(&self.service);
        let process_id = self.process_id.clone();
        let converter = self.model_converter.clone();
        let payload_resolver = self.payload_resolver;
        let trigger = trigger.to_string();

        self.pool.spawn(async move {
            match reference {
                Some(instance_id) => {
                    let found = service.find_instance(&process_id, &instance_id).await?;
                    if found.is_some() {
                        debug!(instance = %instance_id, trigger = %trigger, "signalling running instance");
                        let payload = payload_resolver.resolve(&message).into_value();
                        let outcome = service
                            .signal(
                                &process_id,
                                &instance_id,
                                payload,
                                &format!("Message-{trigger}"),
                            )
                            .await?;
                        Ok(Some(outcome))
                    } else {
                        debug!(instance = %instance_id, trigger = %trigger, "reference id has no running instance, starting new");
                        start_instance(
                            service.as_ref(),
                            &process_id,
                            &payload_resolver,
                            converter.as_ref(),
                            &trigger,
                            Some(&instance_id),
                            &message,
                        )
                        .await
                        .map(Some)
                    }
                }
                None => {
                    debug!(trigger = %trigger, "no reference id, starting new instance");
                    start_instance(
                        service.as_ref(),
                        &process_id,
                        &payload_resolver,
                        converter.as_ref(),
                        &trigger,
                        None,
                        &message,
                    )
                    .await
                    .map(Some)
                }
            }
        })
    }
}

async fn start_instance(
    service: &dyn ProcessService,
    process_id: &str,
    payload_resolver: &PayloadResolver,
    converter: Option<&ModelConverter>,
    trigger: &str,
    reference_id: Option<&str>,
    message: &Message,
) -> Result<InstanceRef, ServiceError> {
    let payload = payload_resolver.resolve(message).into_value();
    let model = match converter {
        Some(convert) => convert(payload),
        None => payload,
    };
    service
        .create_instance(process_id, None, model, None, trigger, reference_id)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::ATTR_REFERENCE_ID;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Debug, PartialEq)]
    enum Call {
        Find {
            instance_id: String,
        },
        Signal {
            instance_id: String,
            reason: String,
            payload: Value,
        },
        Start {
            trigger: String,
            reference_id: Option<String>,
            model: Value,
        },
    }

    #[derive(Default)]
    struct MemoryProcessService {
        running: HashSet<String>,
        fail_signal: bool,
        calls: Mutex<Vec<Call>>,
    }

    impl MemoryProcessService {
        fn with_running(ids: &[&str]) -> Self {
            Self {
                running: ids.iter().map(|id| id.to_string()).collect(),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().drain(..).collect()
        }
    }

    #[async_trait]
    impl ProcessService for MemoryProcessService {
        async fn find_instance(
            &self,
            _process_id: &str,
            instance_id: &str,
        ) -> Result<Option<InstanceRef>, ServiceError> {
            self.calls.lock().unwrap().push(Call::Find {
                instance_id: instance_id.to_string(),
            });
            Ok(self.running.contains(instance_id).then(|| InstanceRef {
                id: instance_id.to_string(),
                business_key: None,
                state: ProcessStateCode::Active,
            }))
        }

        async fn signal(
            &self,
            process_id: &str,
            instance_id: &str,
            payload: Value,
            reason: &str,
        ) -> Result<InstanceRef, ServiceError> {
            if self.fail_signal {
                return Err(ServiceError::Rejected {
                    process_id: process_id.to_string(),
                    reason: "validation failed".to_string(),
                });
            }
            self.calls.lock().unwrap().push(Call::Signal {
                instance_id: instance_id.to_string(),
                reason: reason.to_string(),
                payload,
            });
            Ok(InstanceRef {
                id: instance_id.to_string(),
                business_key: None,
                state: ProcessStateCode::Active,
            })
        }

        async fn create_instance(
            &self,
            _process_id: &str,
            _business_key: Option<&str>,
            model: Value,
            _from_node: Option<&str>,
            trigger: &str,
            reference_id: Option<&str>,
        ) -> Result<InstanceRef, ServiceError> {
            self.calls.lock().unwrap().push(Call::Start {
                trigger: trigger.to_string(),
                reference_id: reference_id.map(str::to_string),
                model,
            });
            Ok(InstanceRef {
                id: "pi-new".to_string(),
                business_key: None,
                state: ProcessStateCode::Active,
            })
        }
    }

    fn message_with_reference(reference: &str) -> Message {
        Message::from_payload(json!({"orderId": "o-1"}))
            .with_attribute(ATTR_REFERENCE_ID, json!(reference))
    }

    fn dispatcher(service: Arc<MemoryProcessService>) -> CorrelationDispatcher {
        CorrelationDispatcher::new("orders", service, Handle::current())
    }

    #[tokio::test]
    async fn matching_reference_signals_instance() {
        let service = Arc::new(MemoryProcessService::with_running(&["PI-1"]));
        let outcome = dispatcher(service.clone())
            .dispatch("replies", message_with_reference("PI-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.unwrap().id, "PI-1");

        let calls = service.calls();
        assert_eq!(
            calls[0],
            Call::Find {
                instance_id: "PI-1".to_string()
            }
        );
        assert_eq!(
            calls[1],
            Call::Signal {
                instance_id: "PI-1".to_string(),
                reason: "Message-replies".to_string(),
                payload: json!({"orderId": "o-1"}),
            }
        );
    }

    #[tokio::test]
    async fn unknown_reference_falls_back_to_start() {
        let service = Arc::new(MemoryProcessService::with_running(&["PI-1"]));
        let outcome = dispatcher(service.clone())
            .dispatch("replies", message_with_reference("PI-404"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.unwrap().id, "pi-new");

        let calls = service.calls();
        assert_eq!(
            calls[1],
            Call::Start {
                trigger: "replies".to_string(),
                reference_id: Some("PI-404".to_string()),
                model: json!({"orderId": "o-1"}),
            }
        );
    }

    #[tokio::test]
    async fn missing_reference_always_starts() {
        let service = Arc::new(MemoryProcessService::default());
        dispatcher(service.clone())
            .dispatch("orders", Message::from_payload(json!({"orderId": "o-2"})))
            .await
            .unwrap()
            .unwrap();

        let calls = service.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0],
            Call::Start {
                trigger: "orders".to_string(),
                reference_id: None,
                model: json!({"orderId": "o-2"}),
            }
        );
    }

    #[tokio::test]
    async fn model_converter_shapes_start_input() {
        let service = Arc::new(MemoryProcessService::default());
        let converter: ModelConverter = Arc::new(|payload| json!({ "order": payload }));
        let dispatcher = dispatcher(service.clone()).with_model_converter(converter);
        dispatcher
            .dispatch("orders", Message::from_payload(json!({"orderId": "o-3"})))
            .await
            .unwrap()
            .unwrap();

        let calls = service.calls();
        assert_eq!(
            calls[0],
            Call::Start {
                trigger: "orders".to_string(),
                reference_id: None,
                model: json!({"order": {"orderId": "o-3"}}),
            }
        );
    }

    #[tokio::test]
    async fn signal_failure_surfaces_through_handle() {
        let service = Arc::new(MemoryProcessService {
            running: ["PI-1".to_string()].into_iter().collect(),
            fail_signal: true,
            calls: Mutex::new(Vec::new()),
        });
        let result = dispatcher(service)
            .dispatch("replies", message_with_reference("PI-1"))
            .await
            .unwrap();
        assert!(matches!(result, Err(ServiceError::Rejected { .. })));
    }
}
