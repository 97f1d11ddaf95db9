//! Type registries and remote registration
//!
//! Workflows and activities are looked up by `(name, version)`. Registration
//! against the service is opt-in at worker start: each type is registered
//! with its configured defaults, and a type that already exists is checked
//! field by field against the registered configuration. Any divergence is a
//! fatal registration fault, surfaced to the bootstrap layer.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use meander_engine::codec::{self, CodecError, InputCodec, JsonCodec, ResultCodec};
use meander_engine::config::{ExecutionConfig, RegistrationDefaults};
use meander_engine::runner::WorkflowRun;
use meander_transport::{
    RegisterActivityType, RegisterWorkflowType, SwfTransport, TransportError,
};

use crate::activity::ActivityRun;

/// Fatal faults from the registration protocol. The worker must not start
/// deciding against a service whose registered defaults diverge from its own.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("invalid configuration for {name} v{version}: {source}")]
    Config {
        name: String,
        version: String,
        #[source]
        source: CodecError,
    },

    #[error("could not register {name} v{version}: {source}")]
    Transport {
        name: String,
        version: String,
        #[source]
        source: TransportError,
    },

    #[error(
        "registered {kind} {name} v{version} has a different default {field}: \
         {registered:?} != {configured:?}"
    )]
    Incompatible {
        kind: &'static str,
        name: String,
        version: String,
        field: &'static str,
        registered: Option<String>,
        configured: Option<String>,
    },
}

fn ensure_matches(
    kind: &'static str,
    name: &str,
    version: &str,
    field: &'static str,
    registered: Option<String>,
    configured: Option<String>,
) -> Result<(), RegistrationError> {
    if registered == configured {
        Ok(())
    } else {
        Err(RegistrationError::Incompatible {
            kind,
            name: name.to_string(),
            version: version.to_string(),
            field,
            registered,
            configured,
        })
    }
}

/// Creates a fresh workflow instance for each decision task.
pub type WorkflowFactory = Box<dyn Fn() -> Box<dyn WorkflowRun> + Send + Sync>;

/// One registered workflow type.
pub struct RegisteredWorkflow {
    config: ExecutionConfig,
    factory: WorkflowFactory,
}

impl RegisteredWorkflow {
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn instantiate(&self) -> Box<dyn WorkflowRun> {
        (self.factory)()
    }
}

/// All workflow types this worker can decide for.
#[derive(Default)]
pub struct WorkflowRegistry {
    entries: HashMap<(String, String), RegisteredWorkflow>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workflow factory under a `(name, version)` pair.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        version: impl Into<String>,
        config: ExecutionConfig,
        factory: F,
    ) where
        F: Fn() -> Box<dyn WorkflowRun> + Send + Sync + 'static,
    {
        self.entries.insert(
            (name.into(), version.into()),
            RegisteredWorkflow {
                config,
                factory: Box::new(factory),
            },
        );
    }

    pub fn get(&self, name: &str, version: &str) -> Option<&RegisteredWorkflow> {
        self.entries.get(&(name.to_string(), version.to_string()))
    }

    pub fn contains(&self, name: &str, version: &str) -> bool {
        self.get(name, version).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register every workflow type remotely, or verify compatibility when
    /// the type already exists.
    pub async fn register_remote(
        &self,
        transport: &dyn SwfTransport,
        domain: &str,
    ) -> Result<(), RegistrationError> {
        for ((name, version), workflow) in &self.entries {
            let defaults = workflow.config.registration_defaults().map_err(|source| {
                RegistrationError::Config {
                    name: name.clone(),
                    version: version.clone(),
                    source,
                }
            })?;
            let request = RegisterWorkflowType {
                name: name.clone(),
                version: version.clone(),
                task_list: defaults.task_list.clone(),
                workflow_duration: defaults.workflow_duration.clone(),
                decision_duration: defaults.decision_duration.clone(),
                child_policy: defaults.child_policy.clone(),
            };
            match transport.register_workflow_type(domain, request).await {
                Ok(()) => {
                    info!(%name, %version, "registered workflow type");
                }
                Err(error) if error.is_type_already_exists() => {
                    warn!(%name, %version, "workflow type already registered; checking compatibility");
                    check_workflow_compatible(transport, domain, name, version, &defaults).await?;
                }
                Err(source) => {
                    return Err(RegistrationError::Transport {
                        name: name.clone(),
                        version: version.clone(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("types", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

async fn check_workflow_compatible(
    transport: &dyn SwfTransport,
    domain: &str,
    name: &str,
    version: &str,
    defaults: &RegistrationDefaults,
) -> Result<(), RegistrationError> {
    let registered = transport
        .describe_workflow_type(domain, name, version)
        .await
        .map_err(|source| RegistrationError::Transport {
            name: name.to_string(),
            version: version.to_string(),
            source,
        })?;

    ensure_matches(
        "workflow",
        name,
        version,
        "task list",
        registered.default_task_list.map(|t| t.name),
        defaults.task_list.clone(),
    )?;
    ensure_matches(
        "workflow",
        name,
        version,
        "workflow duration",
        registered.default_execution_start_to_close_timeout,
        defaults.workflow_duration.clone(),
    )?;
    ensure_matches(
        "workflow",
        name,
        version,
        "decision duration",
        registered.default_task_start_to_close_timeout,
        defaults.decision_duration.clone(),
    )?;
    ensure_matches(
        "workflow",
        name,
        version,
        "child policy",
        registered.default_child_policy,
        defaults.child_policy.clone(),
    )
}

/// Configuration of one activity type, with the registered timeout defaults.
#[derive(Clone)]
pub struct ActivityConfig {
    task_list: Option<String>,
    heartbeat: Option<u64>,
    schedule_to_close: Option<u64>,
    schedule_to_start: Option<u64>,
    start_to_close: Option<u64>,
    input_codec: Arc<dyn InputCodec>,
    result_codec: Arc<dyn ResultCodec>,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            task_list: None,
            heartbeat: Some(60),
            schedule_to_close: Some(420),
            schedule_to_start: Some(120),
            start_to_close: Some(300),
            input_codec: Arc::new(JsonCodec),
            result_codec: Arc::new(JsonCodec),
        }
    }
}

impl ActivityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.task_list = Some(task_list.into());
        self
    }

    pub fn with_heartbeat(mut self, seconds: u64) -> Self {
        self.heartbeat = Some(seconds);
        self
    }

    pub fn with_schedule_to_close(mut self, seconds: u64) -> Self {
        self.schedule_to_close = Some(seconds);
        self
    }

    pub fn with_schedule_to_start(mut self, seconds: u64) -> Self {
        self.schedule_to_start = Some(seconds);
        self
    }

    pub fn with_start_to_close(mut self, seconds: u64) -> Self {
        self.start_to_close = Some(seconds);
        self
    }

    pub fn with_input_codec(mut self, codec: Arc<dyn InputCodec>) -> Self {
        self.input_codec = codec;
        self
    }

    pub fn with_result_codec(mut self, codec: Arc<dyn ResultCodec>) -> Self {
        self.result_codec = codec;
        self
    }

    pub fn input_codec(&self) -> &Arc<dyn InputCodec> {
        &self.input_codec
    }

    pub fn result_codec(&self) -> &Arc<dyn ResultCodec> {
        &self.result_codec
    }

    fn wire_defaults(
        &self,
    ) -> Result<(Option<String>, Option<String>, Option<String>, Option<String>), CodecError> {
        Ok((
            codec::encode_duration(self.heartbeat, "heartbeat")?,
            codec::encode_duration(self.schedule_to_close, "schedule_to_close")?,
            codec::encode_duration(self.schedule_to_start, "schedule_to_start")?,
            codec::encode_duration(self.start_to_close, "start_to_close")?,
        ))
    }
}

impl fmt::Debug for ActivityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityConfig")
            .field("task_list", &self.task_list)
            .field("heartbeat", &self.heartbeat)
            .field("schedule_to_close", &self.schedule_to_close)
            .field("schedule_to_start", &self.schedule_to_start)
            .field("start_to_close", &self.start_to_close)
            .finish()
    }
}

/// One registered activity type.
pub struct RegisteredActivity {
    config: ActivityConfig,
    runner: Arc<dyn ActivityRun>,
}

impl RegisteredActivity {
    pub fn config(&self) -> &ActivityConfig {
        &self.config
    }

    pub fn runner(&self) -> &Arc<dyn ActivityRun> {
        &self.runner
    }
}

/// All activity types this worker can execute.
#[derive(Default)]
pub struct ActivityRegistry {
    entries: HashMap<(String, String), RegisteredActivity>,
}

impl ActivityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        version: impl Into<String>,
        config: ActivityConfig,
        runner: Arc<dyn ActivityRun>,
    ) {
        self.entries.insert(
            (name.into(), version.into()),
            RegisteredActivity { config, runner },
        );
    }

    pub fn get(&self, name: &str, version: &str) -> Option<&RegisteredActivity> {
        self.entries.get(&(name.to_string(), version.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register every activity type remotely, or verify compatibility.
    pub async fn register_remote(
        &self,
        transport: &dyn SwfTransport,
        domain: &str,
    ) -> Result<(), RegistrationError> {
        for ((name, version), activity) in &self.entries {
            let (heartbeat, schedule_to_close, schedule_to_start, start_to_close) = activity
                .config
                .wire_defaults()
                .map_err(|source| RegistrationError::Config {
                    name: name.clone(),
                    version: version.clone(),
                    source,
                })?;
            let request = RegisterActivityType {
                name: name.clone(),
                version: version.clone(),
                task_list: activity.config.task_list.clone(),
                heartbeat_timeout: heartbeat.clone(),
                schedule_to_close_timeout: schedule_to_close.clone(),
                schedule_to_start_timeout: schedule_to_start.clone(),
                start_to_close_timeout: start_to_close.clone(),
            };
            match transport.register_activity_type(domain, request).await {
                Ok(()) => {
                    info!(%name, %version, "registered activity type");
                }
                Err(error) if error.is_type_already_exists() => {
                    warn!(%name, %version, "activity type already registered; checking compatibility");
                    let registered = transport
                        .describe_activity_type(domain, name, version)
                        .await
                        .map_err(|source| RegistrationError::Transport {
                            name: name.clone(),
                            version: version.clone(),
                            source,
                        })?;
                    ensure_matches(
                        "activity",
                        name,
                        version,
                        "task list",
                        registered.default_task_list.map(|t| t.name),
                        activity.config.task_list.clone(),
                    )?;
                    ensure_matches(
                        "activity",
                        name,
                        version,
                        "heartbeat",
                        registered.default_task_heartbeat_timeout,
                        heartbeat,
                    )?;
                    ensure_matches(
                        "activity",
                        name,
                        version,
                        "schedule-to-close",
                        registered.default_task_schedule_to_close_timeout,
                        schedule_to_close,
                    )?;
                    ensure_matches(
                        "activity",
                        name,
                        version,
                        "schedule-to-start",
                        registered.default_task_schedule_to_start_timeout,
                        schedule_to_start,
                    )?;
                    ensure_matches(
                        "activity",
                        name,
                        version,
                        "start-to-close",
                        registered.default_task_start_to_close_timeout,
                        start_to_close,
                    )?;
                }
                Err(source) => {
                    return Err(RegistrationError::Transport {
                        name: name.clone(),
                        version: version.clone(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ActivityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityRegistry")
            .field("types", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meander_engine::context::DecisionContext;
    use meander_engine::task::Interruption;
    use meander_transport::types::{TaskListRef, WorkflowTypeConfiguration};
    use meander_transport::MockTransport;
    use serde_json::{json, Value};

    struct Nop;

    impl WorkflowRun for Nop {
        fn run(&self, _ctx: &mut DecisionContext, _args: Vec<Value>) -> Result<Value, Interruption> {
            Ok(json!(null))
        }
    }

    fn registry() -> WorkflowRegistry {
        let mut registry = WorkflowRegistry::new();
        registry.register(
            "order",
            "3",
            ExecutionConfig::new()
                .with_task_list("main")
                .with_workflow_duration(3600)
                .with_decision_duration(60)
                .with_child_policy("terminate"),
            || Box::new(Nop),
        );
        registry
    }

    #[test]
    fn test_lookup_and_instantiate() {
        let registry = registry();
        assert!(registry.contains("order", "3"));
        assert!(!registry.contains("order", "4"));

        let entry = registry.get("order", "3").expect("registered");
        let workflow = entry.instantiate();
        let mut ctx = DecisionContext::new(
            "tok",
            meander_engine::history::StartedAttributes::default(),
            meander_engine::projection::DecisionState::default(),
            None,
            None,
        );
        assert!(workflow.run(&mut ctx, vec![]).is_ok());
    }

    #[tokio::test]
    async fn test_remote_registration_of_new_type() {
        let transport = MockTransport::new();
        registry()
            .register_remote(&transport, "dom")
            .await
            .expect("registers");

        let registered = transport.registered_workflows();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].name, "order");
        assert_eq!(registered[0].workflow_duration.as_deref(), Some("3600"));
        assert_eq!(registered[0].child_policy.as_deref(), Some("TERMINATE"));
    }

    #[tokio::test]
    async fn test_existing_compatible_type_passes() {
        let transport = MockTransport::new();
        transport.seed_workflow_type(
            "order",
            "3",
            WorkflowTypeConfiguration {
                default_task_list: Some(TaskListRef::new("main")),
                default_execution_start_to_close_timeout: Some("3600".to_string()),
                default_task_start_to_close_timeout: Some("60".to_string()),
                default_child_policy: Some("TERMINATE".to_string()),
            },
        );

        registry()
            .register_remote(&transport, "dom")
            .await
            .expect("compatible");
    }

    #[tokio::test]
    async fn test_existing_incompatible_type_is_fatal() {
        let transport = MockTransport::new();
        transport.seed_workflow_type(
            "order",
            "3",
            WorkflowTypeConfiguration {
                default_task_list: Some(TaskListRef::new("other")),
                default_execution_start_to_close_timeout: Some("3600".to_string()),
                default_task_start_to_close_timeout: Some("60".to_string()),
                default_child_policy: Some("TERMINATE".to_string()),
            },
        );

        let err = registry()
            .register_remote(&transport, "dom")
            .await
            .expect_err("incompatible");
        assert!(matches!(
            err,
            RegistrationError::Incompatible {
                field: "task list",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_register_transport_failure_is_fatal() {
        let transport = MockTransport::new();
        transport.enqueue_register_failure(meander_transport::TransportError::Connection(
            "refused".to_string(),
        ));

        let err = registry()
            .register_remote(&transport, "dom")
            .await
            .expect_err("transport fault");
        assert!(matches!(err, RegistrationError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_invalid_config_is_fatal() {
        let mut registry = WorkflowRegistry::new();
        registry.register(
            "order",
            "3",
            ExecutionConfig::new().with_workflow_duration(0),
            || Box::new(Nop),
        );

        let transport = MockTransport::new();
        let err = registry
            .register_remote(&transport, "dom")
            .await
            .expect_err("invalid duration");
        assert!(matches!(err, RegistrationError::Config { .. }));
    }

    #[tokio::test]
    async fn test_activity_registration_round() {
        struct Echo;

        #[async_trait::async_trait]
        impl ActivityRun for Echo {
            async fn run(
                &self,
                args: Vec<Value>,
                _heartbeat: &crate::activity::Heartbeat<'_>,
            ) -> Result<Value, crate::activity::ActivityFailure> {
                Ok(Value::Array(args))
            }
        }

        let mut registry = ActivityRegistry::new();
        registry.register(
            "resize",
            "2",
            ActivityConfig::new().with_task_list("images"),
            Arc::new(Echo),
        );

        let transport = MockTransport::new();
        registry
            .register_remote(&transport, "dom")
            .await
            .expect("registers");

        let registered = transport.registered_activities();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].heartbeat_timeout.as_deref(), Some("60"));
        assert_eq!(registered[0].start_to_close_timeout.as_deref(), Some("300"));

        // Re-running against the now-registered type verifies compatibility.
        registry
            .register_remote(&transport, "dom")
            .await
            .expect("compatible");
    }
}
