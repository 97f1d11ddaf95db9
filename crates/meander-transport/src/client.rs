//! The transport trait
//!
//! One method per service endpoint the engine and workers consume. A real
//! implementation wraps an HTTP client; tests use
//! [`MockTransport`](crate::MockTransport). The trait object is shared behind
//! an `Arc` and is only ever used by one in-flight decision at a time.

use async_trait::async_trait;

use crate::decision::Decision;
use crate::error::TransportError;
use crate::types::{
    ActivityTaskPage, ActivityTypeConfiguration, DecisionTaskPage, WorkflowTypeConfiguration,
};

/// Parameters for `register_workflow_type`.
///
/// All durations are decimal-second strings, absent when unset, matching the
/// wire encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterWorkflowType {
    pub name: String,
    pub version: String,
    pub task_list: Option<String>,
    pub workflow_duration: Option<String>,
    pub decision_duration: Option<String>,
    pub child_policy: Option<String>,
}

/// Parameters for `register_activity_type`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterActivityType {
    pub name: String,
    pub version: String,
    pub task_list: Option<String>,
    pub heartbeat_timeout: Option<String>,
    pub schedule_to_close_timeout: Option<String>,
    pub schedule_to_start_timeout: Option<String>,
    pub start_to_close_timeout: Option<String>,
}

/// Parameters for `start_workflow_execution`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartWorkflowExecution {
    pub workflow_id: String,
    pub name: String,
    pub version: String,
    pub task_list: Option<String>,
    pub workflow_duration: Option<String>,
    pub decision_duration: Option<String>,
    pub input: Option<String>,
    pub tag_list: Option<Vec<String>>,
    pub child_policy: Option<String>,
}

/// Request/response client for the workflow service.
#[async_trait]
pub trait SwfTransport: Send + Sync {
    /// Register a workflow type; fails with
    /// [`TransportError::TypeAlreadyExists`] when the name/version pair is
    /// taken.
    async fn register_workflow_type(
        &self,
        domain: &str,
        request: RegisterWorkflowType,
    ) -> Result<(), TransportError>;

    /// Read the registered defaults of a workflow type.
    async fn describe_workflow_type(
        &self,
        domain: &str,
        name: &str,
        version: &str,
    ) -> Result<WorkflowTypeConfiguration, TransportError>;

    /// Register an activity type.
    async fn register_activity_type(
        &self,
        domain: &str,
        request: RegisterActivityType,
    ) -> Result<(), TransportError>;

    /// Read the registered defaults of an activity type.
    async fn describe_activity_type(
        &self,
        domain: &str,
        name: &str,
        version: &str,
    ) -> Result<ActivityTypeConfiguration, TransportError>;

    /// Long-poll for a decision task, or fetch a further history page when
    /// `next_page_token` is set.
    async fn poll_for_decision_task(
        &self,
        domain: &str,
        task_list: &str,
        identity: Option<&str>,
        next_page_token: Option<&str>,
    ) -> Result<DecisionTaskPage, TransportError>;

    /// Submit a decision batch for one task.
    async fn respond_decision_task_completed(
        &self,
        task_token: &str,
        decisions: Vec<Decision>,
        execution_context: Option<String>,
    ) -> Result<(), TransportError>;

    /// Long-poll for an activity task.
    async fn poll_for_activity_task(
        &self,
        domain: &str,
        task_list: &str,
        identity: Option<&str>,
    ) -> Result<ActivityTaskPage, TransportError>;

    /// Report an activity's successful completion.
    async fn respond_activity_task_completed(
        &self,
        task_token: &str,
        result: Option<String>,
    ) -> Result<(), TransportError>;

    /// Report an activity's failure.
    async fn respond_activity_task_failed(
        &self,
        task_token: &str,
        reason: Option<String>,
    ) -> Result<(), TransportError>;

    /// Report that an activity is still making progress.
    async fn record_activity_task_heartbeat(&self, task_token: &str)
        -> Result<(), TransportError>;

    /// Start a new workflow execution; returns the run id.
    async fn start_workflow_execution(
        &self,
        domain: &str,
        request: StartWorkflowExecution,
    ) -> Result<String, TransportError>;
}
