//! Workflow starter
//!
//! Small helper to kick off a new execution. Enforces the client-side caps
//! before anything reaches the wire: input truncated to the payload limit,
//! tags deduplicated and capped, durations strictly positive, child policy
//! normalized to upper-case.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use meander_engine::codec::{
    self, truncate_bytes, CodecError, InputCodec, JsonCodec, INPUT_SIZE,
};
use meander_transport::{StartWorkflowExecution, SwfTransport, TransportError};

/// Faults from starting an execution.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("invalid start request: {0}")]
    Config(#[from] CodecError),

    #[error("could not start workflow: {0}")]
    Transport(#[from] TransportError),
}

/// One execution to start.
#[derive(Debug, Clone, Default)]
pub struct StartRequest {
    name: String,
    version: String,
    args: Vec<Value>,
    workflow_id: Option<String>,
    task_list: Option<String>,
    workflow_duration: Option<u64>,
    decision_duration: Option<u64>,
    tags: Option<Vec<String>>,
    child_policy: Option<String>,
}

impl StartRequest {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Pin the workflow id instead of generating one.
    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn with_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.task_list = Some(task_list.into());
        self
    }

    pub fn with_workflow_duration(mut self, seconds: u64) -> Self {
        self.workflow_duration = Some(seconds);
        self
    }

    pub fn with_decision_duration(mut self, seconds: u64) -> Self {
        self.decision_duration = Some(seconds);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_child_policy(mut self, policy: impl Into<String>) -> Self {
        self.child_policy = Some(policy.into());
        self
    }
}

/// Starts workflow executions in one domain.
pub struct WorkflowStarter {
    transport: Arc<dyn SwfTransport>,
    domain: String,
    input_codec: Arc<dyn InputCodec>,
}

impl WorkflowStarter {
    pub fn new(transport: Arc<dyn SwfTransport>, domain: impl Into<String>) -> Self {
        Self {
            transport,
            domain: domain.into(),
            input_codec: Arc::new(JsonCodec),
        }
    }

    pub fn with_input_codec(mut self, codec: Arc<dyn InputCodec>) -> Self {
        self.input_codec = codec;
        self
    }

    /// Start the execution; returns the service-assigned run id.
    pub async fn start(&self, request: StartRequest) -> Result<String, StartError> {
        let input = self.input_codec.encode(&request.args)?;
        let input = truncate_bytes(&input, INPUT_SIZE).to_string();
        let workflow_id = request
            .workflow_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let wire_request = StartWorkflowExecution {
            workflow_id: workflow_id.clone(),
            name: request.name.clone(),
            version: request.version.clone(),
            task_list: request.task_list,
            workflow_duration: codec::encode_duration(
                request.workflow_duration,
                "workflow_duration",
            )?,
            decision_duration: codec::encode_duration(
                request.decision_duration,
                "decision_duration",
            )?,
            input: Some(input),
            tag_list: codec::normalize_tags(request.tags.as_deref()),
            child_policy: codec::normalize_child_policy(request.child_policy.as_deref())?,
        };

        let run_id = self
            .transport
            .start_workflow_execution(&self.domain, wire_request)
            .await?;
        info!(
            name = %request.name,
            version = %request.version,
            %workflow_id,
            %run_id,
            "started workflow execution"
        );
        Ok(run_id)
    }
}
