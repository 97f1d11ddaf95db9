//! Decision context
//!
//! [`DecisionContext`] is the mutable surface one decision run works against:
//! pure queries over the projected state, schedule operations that accumulate
//! outgoing decisions in call order, and the terminal operations that close
//! the decision with a single decision. It does no I/O; the worker submits
//! the [`DecisionBatch`] it yields.
//!
//! [`PersistedContext`] is the decider-private state piggybacked on each
//! completed decision's `executionContext` field, since the service offers no
//! other storage for it. On the wire it is the length-prefixed concatenation
//! of a versioned JSON record and the opaque user-visible global context.

use std::collections::HashMap;

use meander_transport::Decision;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::codec::{
    self, truncate_bytes, CodecError, INPUT_SIZE, REASON_SIZE, RESULT_SIZE,
};
use crate::history::StartedAttributes;
use crate::keys::{subworkflow_id, timer_key};
use crate::projection::DecisionState;

/// Version tag of the persisted context record.
pub const CONTEXT_VERSION: u32 = 1;

/// Decider-private state carried across decisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedContext {
    pub version: u32,
    #[serde(default)]
    pub event_to_call: HashMap<u64, String>,
    #[serde(default)]
    pub call_contexts: HashMap<String, String>,
}

impl PersistedContext {
    pub fn new(
        event_to_call: HashMap<u64, String>,
        call_contexts: HashMap<String, String>,
    ) -> Self {
        Self {
            version: CONTEXT_VERSION,
            event_to_call,
            call_contexts,
        }
    }

    /// Serialize into the wire blob, appending the opaque global context.
    pub fn encode(&self, global_context: Option<&str>) -> Result<String, CodecError> {
        let record =
            serde_json::to_string(self).map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(codec::concat(&record, global_context))
    }

    /// Parse a wire blob back into the record and the global context.
    pub fn decode(blob: &str) -> Result<(Self, Option<String>), CodecError> {
        let (record, global_context) = codec::deconcat(blob)?;
        let context =
            serde_json::from_str(&record).map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok((context, global_context))
    }
}

/// The decisions produced by one decision run, ready for submission.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionBatch {
    pub token: String,
    pub decisions: Vec<Decision>,
    pub execution_context: Option<String>,
}

/// Descending schedule budget; `None` means unlimited.
#[derive(Debug, Clone, Copy)]
struct RateBudget {
    remaining: Option<u32>,
}

impl RateBudget {
    fn new(limit: Option<u32>) -> Self {
        Self { remaining: limit }
    }

    fn consume(&mut self) -> bool {
        match self.remaining {
            None => true,
            Some(0) => false,
            Some(n) => {
                self.remaining = Some(n - 1);
                true
            }
        }
    }
}

/// Per-decision mutable surface handed (via proxies) to user code.
#[derive(Debug)]
pub struct DecisionContext {
    token: String,
    started: StartedAttributes,
    state: DecisionState,
    call_contexts: HashMap<String, String>,
    global_context: Option<String>,
    next_call: u32,
    budget: RateBudget,
    decisions: Vec<Decision>,
    closed: bool,
}

impl DecisionContext {
    pub fn new(
        token: impl Into<String>,
        started: StartedAttributes,
        state: DecisionState,
        restored: Option<(PersistedContext, Option<String>)>,
        rate_limit: Option<u32>,
    ) -> Self {
        let (call_contexts, global_context) = match restored {
            Some((context, global)) => (context.call_contexts, global),
            None => (HashMap::new(), None),
        };
        Self {
            token: token.into(),
            started,
            state,
            call_contexts,
            global_context,
            next_call: 0,
            budget: RateBudget::new(rate_limit),
            decisions: Vec::new(),
            closed: false,
        }
    }

    /// The attributes of the execution's started event.
    pub fn started(&self) -> &StartedAttributes {
        &self.started
    }

    /// The next call-key in construction order. Deterministic: the i-th call
    /// of a run always receives the same key across replays.
    pub(crate) fn next_call_key(&mut self) -> String {
        let key = self.next_call.to_string();
        self.next_call += 1;
        key
    }

    pub(crate) fn consume_budget(&mut self) -> bool {
        self.budget.consume()
    }

    // Queries over projected state.

    pub fn is_running(&self, call_key: &str) -> bool {
        self.state.is_running(call_key)
    }

    pub fn is_result(&self, call_key: &str) -> bool {
        self.state.is_result(call_key)
    }

    pub fn is_error(&self, call_key: &str) -> bool {
        self.state.is_error(call_key)
    }

    pub fn is_timeout(&self, call_key: &str) -> bool {
        self.state.is_timeout(call_key)
    }

    pub fn timer_ready(&self, call_key: &str) -> bool {
        self.state.timer_ready(call_key)
    }

    pub fn timer_running(&self, call_key: &str) -> bool {
        self.state.timer_running(call_key)
    }

    pub fn result(&self, call_key: &str) -> Option<(Option<&str>, usize)> {
        self.state.result(call_key)
    }

    pub fn error(&self, call_key: &str) -> Option<(&str, usize)> {
        self.state.error(call_key)
    }

    pub fn timeout(&self, call_key: &str) -> Option<usize> {
        self.state.timeout(call_key)
    }

    pub fn attempts(&self, call_key: &str) -> u32 {
        self.state.attempts(call_key)
    }

    // User-visible context strings.

    /// The global context set by an earlier decision, if any.
    pub fn global_context(&self) -> Option<&str> {
        self.global_context.as_deref()
    }

    /// Replace the global context carried to later decisions.
    pub fn set_global_context(&mut self, context: impl Into<String>) {
        self.global_context = Some(context.into());
    }

    /// A per-call context string set when the call was scheduled.
    pub fn call_context(&self, call_key: &str) -> Option<&str> {
        self.call_contexts.get(call_key).map(String::as_str)
    }

    /// Attach a context string to a call-key.
    pub fn set_call_context(&mut self, call_key: impl Into<String>, context: impl Into<String>) {
        self.call_contexts.insert(call_key.into(), context.into());
    }

    // Schedule operations, in user-code order.

    /// Start the retry timer paired with `call_key`.
    pub fn schedule_timer(&mut self, call_key: &str, delay: u64) {
        if self.closed {
            return;
        }
        self.decisions
            .push(Decision::start_timer(timer_key(call_key), delay.to_string()));
    }

    /// Queue one activity task under `call_key`.
    #[allow(clippy::too_many_arguments)]
    pub fn schedule_activity(
        &mut self,
        call_key: &str,
        name: &str,
        version: &str,
        input: String,
        task_list: Option<&str>,
        heartbeat: Option<u64>,
        schedule_to_close: Option<u64>,
        schedule_to_start: Option<u64>,
        start_to_close: Option<u64>,
    ) {
        if self.closed {
            return;
        }
        self.decisions.push(Decision::schedule_activity_task(
            call_key,
            name,
            version,
            Some(input),
            task_list.map(str::to_string),
            heartbeat.map(|v| v.to_string()),
            schedule_to_close.map(|v| v.to_string()),
            schedule_to_start.map(|v| v.to_string()),
            start_to_close.map(|v| v.to_string()),
        ));
    }

    /// Queue one child workflow under `call_key`, wrapped into a globally
    /// unique workflow id.
    pub fn schedule_workflow(
        &mut self,
        call_key: &str,
        name: &str,
        version: &str,
        input: String,
        task_list: Option<&str>,
        workflow_duration: Option<u64>,
        decision_duration: Option<u64>,
    ) {
        if self.closed {
            return;
        }
        self.decisions.push(Decision::start_child_workflow_execution(
            name,
            version,
            subworkflow_id(call_key),
            Some(input),
            task_list.map(str::to_string),
            workflow_duration.map(|v| v.to_string()),
            decision_duration.map(|v| v.to_string()),
        ));
    }

    // Terminal operations. Each overwrites the accumulated batch with a
    // single decision and closes the context; later calls are no-ops.

    /// Fail the execution.
    pub fn fail(&mut self, reason: &str) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.decisions = vec![Decision::fail_workflow_execution(Some(
            truncate_bytes(reason, REASON_SIZE).to_string(),
        ))];
    }

    /// Complete the execution with a result.
    pub fn finish(&mut self, result: &str) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.decisions = vec![Decision::complete_workflow_execution(Some(
            truncate_bytes(result, RESULT_SIZE).to_string(),
        ))];
    }

    /// Restart the execution in place, propagating the task list, durations,
    /// child policy, and tags of the started event.
    pub fn restart(&mut self, input: &str) -> Result<(), CodecError> {
        if self.closed {
            return Ok(());
        }
        let child_policy = codec::normalize_child_policy(self.started.child_policy.as_deref())?;
        let tag_list = codec::normalize_tags(self.started.tag_list.as_deref());
        self.closed = true;
        self.decisions = vec![Decision::continue_as_new_workflow_execution(
            Some(truncate_bytes(input, INPUT_SIZE).to_string()),
            self.started.task_list.clone(),
            self.started.workflow_duration.clone(),
            self.started.decision_duration.clone(),
            tag_list,
            child_policy,
        )];
        Ok(())
    }

    /// Whether a terminal operation already closed this decision.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Finish the decision round: the accumulated decisions plus, for
    /// non-terminal rounds, the serialized decider context.
    pub fn into_batch(mut self) -> DecisionBatch {
        let execution_context = if self.closed {
            None
        } else {
            let record = PersistedContext::new(
                self.state.take_event_to_call(),
                std::mem::take(&mut self.call_contexts),
            );
            match record.encode(self.global_context.as_deref()) {
                Ok(blob) => Some(blob),
                Err(error) => {
                    warn!(%error, "failed to encode decider context; dropping it");
                    None
                }
            }
        };
        DecisionBatch {
            token: self.token,
            decisions: self.decisions,
            execution_context,
        }
    }
}
