//! Per-workflow-type execution configuration
//!
//! Defaults registered with the service for a workflow type, plus the
//! decision-time knobs (rate limit, workflow input/result codecs). A `None`
//! default is unset and must be supplied by the starter.

use std::fmt;
use std::sync::Arc;

use crate::codec::{self, CodecError, InputCodec, JsonCodec, ResultCodec};

/// The service default of 64 concurrent schedule decisions per run.
pub const DEFAULT_RATE_LIMIT: u32 = 64;

/// Wire-encoded registration defaults, validated and normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationDefaults {
    pub task_list: Option<String>,
    pub workflow_duration: Option<String>,
    pub decision_duration: Option<String>,
    pub child_policy: Option<String>,
}

/// Configuration of one workflow type.
#[derive(Clone)]
pub struct ExecutionConfig {
    default_task_list: Option<String>,
    default_workflow_duration: Option<u64>,
    default_decision_duration: Option<u64>,
    default_child_policy: Option<String>,
    rate_limit: Option<u32>,
    input_codec: Arc<dyn InputCodec>,
    result_codec: Arc<dyn ResultCodec>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_task_list: None,
            default_workflow_duration: None,
            default_decision_duration: None,
            default_child_policy: None,
            rate_limit: Some(DEFAULT_RATE_LIMIT),
            input_codec: Arc::new(JsonCodec),
            result_codec: Arc::new(JsonCodec),
        }
    }
}

impl ExecutionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default task list for executions of this type.
    pub fn with_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.default_task_list = Some(task_list.into());
        self
    }

    /// Set the default total execution duration, in seconds.
    pub fn with_workflow_duration(mut self, seconds: u64) -> Self {
        self.default_workflow_duration = Some(seconds);
        self
    }

    /// Set the default per-decision duration, in seconds.
    pub fn with_decision_duration(mut self, seconds: u64) -> Self {
        self.default_decision_duration = Some(seconds);
        self
    }

    /// Set the default child policy; normalized to upper-case at use.
    pub fn with_child_policy(mut self, policy: impl Into<String>) -> Self {
        self.default_child_policy = Some(policy.into());
        self
    }

    /// Cap the schedule decisions emitted per decision run; `None` lifts the
    /// cap entirely.
    pub fn with_rate_limit(mut self, limit: Option<u32>) -> Self {
        self.rate_limit = limit;
        self
    }

    /// Replace the workflow input codec.
    pub fn with_input_codec(mut self, codec: Arc<dyn InputCodec>) -> Self {
        self.input_codec = codec;
        self
    }

    /// Replace the workflow result codec.
    pub fn with_result_codec(mut self, codec: Arc<dyn ResultCodec>) -> Self {
        self.result_codec = codec;
        self
    }

    pub fn rate_limit(&self) -> Option<u32> {
        self.rate_limit
    }

    pub fn input_codec(&self) -> &Arc<dyn InputCodec> {
        &self.input_codec
    }

    pub fn result_codec(&self) -> &Arc<dyn ResultCodec> {
        &self.result_codec
    }

    /// Convert the defaults to their wire encoding, validating durations and
    /// the child policy.
    pub fn registration_defaults(&self) -> Result<RegistrationDefaults, CodecError> {
        Ok(RegistrationDefaults {
            task_list: self.default_task_list.clone(),
            workflow_duration: codec::encode_duration(
                self.default_workflow_duration,
                "default_workflow_duration",
            )?,
            decision_duration: codec::encode_duration(
                self.default_decision_duration,
                "default_decision_duration",
            )?,
            child_policy: codec::normalize_child_policy(self.default_child_policy.as_deref())?,
        })
    }
}

impl fmt::Debug for ExecutionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionConfig")
            .field("default_task_list", &self.default_task_list)
            .field("default_workflow_duration", &self.default_workflow_duration)
            .field("default_decision_duration", &self.default_decision_duration)
            .field("default_child_policy", &self.default_child_policy)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}
