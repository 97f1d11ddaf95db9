//! Proxy / future model
//!
//! A proxy stands in for one declared dependency of a workflow: an activity
//! type or a sub-workflow type. User code invokes the proxy like a function;
//! the invocation deterministically takes the next call-key from the decision
//! context and either resolves against projected state or emits a schedule
//! decision, returning a [`TaskHandle`].
//!
//! Reading an unresolved handle raises [`TaskError::Suspended`], which
//! converts into [`Interruption::Suspended`]; `?` in user code unwinds the
//! run cleanly so the engine can flush the accumulated schedules. The next
//! decision re-runs the workflow from the top and the same call site finds
//! its result in the history.
//!
//! Failures are terminal for a call. The retry schedule paces re-attempts
//! after *timeouts*: entry `i` is the delay in seconds before attempt `i + 1`,
//! counted down on a service timer under the call's `<k>:t` key.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::codec::{InputCodec, JsonCodec, ResultCodec};
use crate::context::DecisionContext;

/// Default retry schedule: three attempts, no delay between them.
pub const DEFAULT_RETRY: [u64; 3] = [0, 0, 0];

/// Errors surfaced when user code reads a [`TaskHandle`].
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TaskError {
    /// The call has not resolved yet in this decision run.
    #[error("task is not ready")]
    Suspended,

    /// The call failed remotely; carries the service-reported reason.
    #[error("{0}")]
    Failed(String),

    /// The call timed out and its retry schedule is exhausted.
    #[error("task timed out")]
    TimedOut,

    /// The stored result payload did not decode.
    #[error("failed to decode task result: {0}")]
    BadResult(String),
}

/// Why a workflow run stopped before producing a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interruption {
    /// Pending tasks remain; flush the accumulated schedules.
    Suspended,

    /// Fail the execution with this reason.
    Failed(String),

    /// Restart the execution in place with this input payload.
    Restarted(String),
}

impl From<TaskError> for Interruption {
    fn from(error: TaskError) -> Self {
        match error {
            TaskError::Suspended => Interruption::Suspended,
            TaskError::Failed(reason) => Interruption::Failed(reason),
            TaskError::TimedOut => Interruption::Failed("task timed out".to_string()),
            TaskError::BadResult(message) => Interruption::Failed(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum HandleState {
    Pending,
    Ready { value: Value, order: usize },
    DecodeFailed { message: String, order: usize },
    Failed { reason: String, order: usize },
    TimedOut { order: usize },
}

/// The result handle returned by a proxy invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskHandle {
    state: HandleState,
}

impl TaskHandle {
    fn pending() -> Self {
        Self {
            state: HandleState::Pending,
        }
    }

    /// The decoded result. Unresolved, failed, and timed-out handles raise
    /// the corresponding [`TaskError`]; propagating it with `?` suspends or
    /// fails the run.
    pub fn result(&self) -> Result<Value, TaskError> {
        match &self.state {
            HandleState::Pending => Err(TaskError::Suspended),
            HandleState::Ready { value, .. } => Ok(value.clone()),
            HandleState::DecodeFailed { message, .. } => {
                Err(TaskError::BadResult(message.clone()))
            }
            HandleState::Failed { reason, .. } => Err(TaskError::Failed(reason.clone())),
            HandleState::TimedOut { .. } => Err(TaskError::TimedOut),
        }
    }

    /// Whether a result is available to read.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, HandleState::Ready { .. })
    }

    /// The failure reason, when the call failed.
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            HandleState::Failed { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Index in the termination order, for tie-breaking between resolved
    /// calls; smallest finished first. `None` while pending.
    pub fn order(&self) -> Option<usize> {
        match &self.state {
            HandleState::Pending => None,
            HandleState::Ready { order, .. }
            | HandleState::DecodeFailed { order, .. }
            | HandleState::Failed { order, .. }
            | HandleState::TimedOut { order } => Some(*order),
        }
    }
}

enum Disposition {
    Resolved(TaskHandle),
    Pending,
    Delay(u64),
    Schedule,
}

/// Resolve a call against projected state, or decide how to (re)schedule it.
fn disposition(
    ctx: &DecisionContext,
    call_key: &str,
    retry: &[u64],
    result_codec: &Arc<dyn ResultCodec>,
) -> Disposition {
    if let Some((payload, order)) = ctx.result(call_key) {
        let handle = match payload {
            Some(raw) => match result_codec.decode(raw) {
                Ok(value) => TaskHandle {
                    state: HandleState::Ready { value, order },
                },
                Err(error) => TaskHandle {
                    state: HandleState::DecodeFailed {
                        message: error.to_string(),
                        order,
                    },
                },
            },
            None => TaskHandle {
                state: HandleState::Ready {
                    value: Value::Null,
                    order,
                },
            },
        };
        return Disposition::Resolved(handle);
    }

    if let Some((reason, order)) = ctx.error(call_key) {
        return Disposition::Resolved(TaskHandle {
            state: HandleState::Failed {
                reason: reason.to_string(),
                order,
            },
        });
    }

    let attempts = ctx.attempts(call_key) as usize;
    if let Some(order) = ctx.timeout(call_key) {
        if attempts >= retry.len() {
            return Disposition::Resolved(TaskHandle {
                state: HandleState::TimedOut { order },
            });
        }
        // Retries remain; fall through to the schedule path.
    } else if ctx.is_running(call_key) || ctx.timer_running(call_key) {
        return Disposition::Pending;
    }

    let delay = retry.get(attempts).copied().unwrap_or(0);
    if delay > 0 && !ctx.timer_ready(call_key) {
        return Disposition::Delay(delay);
    }
    Disposition::Schedule
}

/// Proxy for one activity dependency.
#[derive(Clone)]
pub struct ActivityProxy {
    name: String,
    version: String,
    task_list: Option<String>,
    heartbeat: Option<u64>,
    schedule_to_close: Option<u64>,
    schedule_to_start: Option<u64>,
    start_to_close: Option<u64>,
    retry: Vec<u64>,
    input_codec: Arc<dyn InputCodec>,
    result_codec: Arc<dyn ResultCodec>,
}

impl ActivityProxy {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            task_list: None,
            heartbeat: None,
            schedule_to_close: None,
            schedule_to_start: None,
            start_to_close: None,
            retry: DEFAULT_RETRY.to_vec(),
            input_codec: Arc::new(JsonCodec),
            result_codec: Arc::new(JsonCodec),
        }
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

    /// Replace the retry schedule; entry `i` delays attempt `i + 1`.
    pub fn with_retry(mut self, retry: impl Into<Vec<u64>>) -> Self {
        self.retry = retry.into();
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

    /// Invoke the dependency with the given arguments.
    pub fn call(&self, ctx: &mut DecisionContext, args: Vec<Value>) -> TaskHandle {
        let call_key = ctx.next_call_key();
        match disposition(ctx, &call_key, &self.retry, &self.result_codec) {
            Disposition::Resolved(handle) => handle,
            Disposition::Pending => TaskHandle::pending(),
            Disposition::Delay(delay) => {
                if ctx.consume_budget() {
                    ctx.schedule_timer(&call_key, delay);
                }
                TaskHandle::pending()
            }
            Disposition::Schedule => {
                if !ctx.consume_budget() {
                    return TaskHandle::pending();
                }
                match self.input_codec.encode(&args) {
                    Ok(input) => {
                        ctx.schedule_activity(
                            &call_key,
                            &self.name,
                            &self.version,
                            input,
                            self.task_list.as_deref(),
                            self.heartbeat,
                            self.schedule_to_close,
                            self.schedule_to_start,
                            self.start_to_close,
                        );
                        TaskHandle::pending()
                    }
                    Err(error) => {
                        // Unrecoverable under deterministic replay.
                        ctx.fail(&error.to_string());
                        TaskHandle::pending()
                    }
                }
            }
        }
    }
}

impl fmt::Debug for ActivityProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityProxy")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("task_list", &self.task_list)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Proxy for one sub-workflow dependency.
#[derive(Clone)]
pub struct WorkflowProxy {
    name: String,
    version: String,
    task_list: Option<String>,
    workflow_duration: Option<u64>,
    decision_duration: Option<u64>,
    retry: Vec<u64>,
    input_codec: Arc<dyn InputCodec>,
    result_codec: Arc<dyn ResultCodec>,
}

impl WorkflowProxy {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            task_list: None,
            workflow_duration: None,
            decision_duration: None,
            retry: DEFAULT_RETRY.to_vec(),
            input_codec: Arc::new(JsonCodec),
            result_codec: Arc::new(JsonCodec),
        }
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

    pub fn with_retry(mut self, retry: impl Into<Vec<u64>>) -> Self {
        self.retry = retry.into();
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

    /// Invoke the sub-workflow with the given arguments.
    pub fn call(&self, ctx: &mut DecisionContext, args: Vec<Value>) -> TaskHandle {
        let call_key = ctx.next_call_key();
        match disposition(ctx, &call_key, &self.retry, &self.result_codec) {
            Disposition::Resolved(handle) => handle,
            Disposition::Pending => TaskHandle::pending(),
            Disposition::Delay(delay) => {
                if ctx.consume_budget() {
                    ctx.schedule_timer(&call_key, delay);
                }
                TaskHandle::pending()
            }
            Disposition::Schedule => {
                if !ctx.consume_budget() {
                    return TaskHandle::pending();
                }
                match self.input_codec.encode(&args) {
                    Ok(input) => {
                        ctx.schedule_workflow(
                            &call_key,
                            &self.name,
                            &self.version,
                            input,
                            self.task_list.as_deref(),
                            self.workflow_duration,
                            self.decision_duration,
                        );
                        TaskHandle::pending()
                    }
                    Err(error) => {
                        ctx.fail(&error.to_string());
                        TaskHandle::pending()
                    }
                }
            }
        }
    }
}

impl fmt::Debug for WorkflowProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowProxy")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("task_list", &self.task_list)
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use serde_json::json;

    use crate::codec::CodecError;
    use crate::event::DecisionEvent;
    use crate::history::StartedAttributes;
    use crate::projection::project;

    fn context_from(events: &[DecisionEvent]) -> DecisionContext {
        let state = project(events, HashMap::new()).expect("projects");
        DecisionContext::new("tok", StartedAttributes::default(), state, None, Some(64))
    }

    fn scheduled(event_id: u64, call_key: &str) -> DecisionEvent {
        DecisionEvent::ActivityScheduled {
            event_id,
            call_key: call_key.to_string(),
        }
    }

    #[test]
    fn test_first_call_schedules_immediately() {
        let mut ctx = context_from(&[]);
        let handle = ActivityProxy::new("A", "1").call(&mut ctx, vec![json!(7)]);

        assert_eq!(handle.result(), Err(TaskError::Suspended));
        let batch = ctx.into_batch();
        assert_eq!(batch.decisions.len(), 1);
        let attrs = batch.decisions[0]
            .schedule_activity_task_decision_attributes
            .as_ref()
            .expect("schedule attributes");
        assert_eq!(attrs.activity_id, "0");
        assert_eq!(attrs.activity_type.name, "A");
        assert_eq!(attrs.input.as_deref(), Some("[[7],{}]"));
    }

    #[test]
    fn test_call_keys_follow_call_order() {
        let mut ctx = context_from(&[]);
        let a = ActivityProxy::new("A", "1");
        let b = ActivityProxy::new("B", "1");
        a.call(&mut ctx, vec![]);
        b.call(&mut ctx, vec![]);

        let batch = ctx.into_batch();
        let ids: Vec<&str> = batch
            .decisions
            .iter()
            .filter_map(|d| d.schedule_activity_task_decision_attributes.as_ref())
            .map(|a| a.activity_id.as_str())
            .collect();
        assert_eq!(ids, vec!["0", "1"]);
    }

    #[test]
    fn test_resolved_result_is_decoded() {
        let events = vec![
            scheduled(5, "0"),
            DecisionEvent::ActivityCompleted {
                scheduled_id: 5,
                result: Some("14".to_string()),
            },
        ];
        let mut ctx = context_from(&events);
        let handle = ActivityProxy::new("A", "1").call(&mut ctx, vec![json!(7)]);

        assert!(handle.is_ready());
        assert_eq!(handle.result(), Ok(json!(14)));
        assert_eq!(handle.order(), Some(0));
        assert!(ctx.into_batch().decisions.is_empty());
    }

    #[test]
    fn test_result_decode_failure_surfaces_on_read_only() {
        let events = vec![
            scheduled(5, "0"),
            DecisionEvent::ActivityCompleted {
                scheduled_id: 5,
                result: Some("not json".to_string()),
            },
        ];
        let mut ctx = context_from(&events);
        let handle = ActivityProxy::new("A", "1").call(&mut ctx, vec![]);

        assert!(matches!(handle.result(), Err(TaskError::BadResult(_))));
        // No decision was emitted and the context is still open.
        assert!(!ctx.is_closed());
    }

    #[test]
    fn test_failure_is_terminal_despite_retries() {
        let events = vec![
            scheduled(5, "0"),
            DecisionEvent::ActivityFailed {
                scheduled_id: 5,
                reason: "boom".to_string(),
            },
        ];
        let mut ctx = context_from(&events);
        let handle = ActivityProxy::new("A", "1")
            .with_retry(vec![0, 5, 10])
            .call(&mut ctx, vec![]);

        assert_eq!(handle.error(), Some("boom"));
        assert_eq!(handle.result(), Err(TaskError::Failed("boom".to_string())));
        assert!(ctx.into_batch().decisions.is_empty());
    }

    #[test]
    fn test_timeout_with_retries_starts_delay_timer() {
        let events = vec![scheduled(5, "0"), DecisionEvent::ActivityTimedOut { scheduled_id: 5 }];
        let mut ctx = context_from(&events);
        let handle = ActivityProxy::new("A", "1")
            .with_retry(vec![0, 5, 10])
            .call(&mut ctx, vec![]);

        assert_eq!(handle.result(), Err(TaskError::Suspended));
        let batch = ctx.into_batch();
        let attrs = batch.decisions[0]
            .start_timer_decision_attributes
            .as_ref()
            .expect("timer attributes");
        assert_eq!(attrs.timer_id, "0:t");
        assert_eq!(attrs.start_to_fire_timeout, "5");
    }

    #[test]
    fn test_fired_timer_reschedules_same_call_key() {
        let events = vec![
            scheduled(5, "0"),
            DecisionEvent::ActivityTimedOut { scheduled_id: 5 },
            DecisionEvent::TimerStarted {
                timer_id: "0:t".to_string(),
            },
            DecisionEvent::TimerFired {
                timer_id: "0:t".to_string(),
            },
        ];
        let mut ctx = context_from(&events);
        ActivityProxy::new("A", "1")
            .with_retry(vec![0, 5, 10])
            .call(&mut ctx, vec![json!(7)]);

        let batch = ctx.into_batch();
        let attrs = batch.decisions[0]
            .schedule_activity_task_decision_attributes
            .as_ref()
            .expect("schedule attributes");
        assert_eq!(attrs.activity_id, "0");
    }

    #[test]
    fn test_running_delay_timer_stays_pending() {
        let events = vec![
            scheduled(5, "0"),
            DecisionEvent::ActivityTimedOut { scheduled_id: 5 },
            DecisionEvent::TimerStarted {
                timer_id: "0:t".to_string(),
            },
        ];
        let mut ctx = context_from(&events);
        let handle = ActivityProxy::new("A", "1")
            .with_retry(vec![0, 5, 10])
            .call(&mut ctx, vec![]);

        assert_eq!(handle.result(), Err(TaskError::Suspended));
        assert!(ctx.into_batch().decisions.is_empty());
    }

    #[test]
    fn test_exhausted_retries_resolve_timed_out() {
        let events = vec![
            scheduled(5, "0"),
            DecisionEvent::ActivityTimedOut { scheduled_id: 5 },
            scheduled(7, "0"),
            DecisionEvent::ActivityTimedOut { scheduled_id: 7 },
        ];
        let mut ctx = context_from(&events);
        let handle = ActivityProxy::new("A", "1")
            .with_retry(vec![0, 0])
            .call(&mut ctx, vec![]);

        assert_eq!(handle.result(), Err(TaskError::TimedOut));
        assert!(ctx.into_batch().decisions.is_empty());
    }

    #[test]
    fn test_in_flight_call_stays_pending() {
        let events = vec![scheduled(5, "0")];
        let mut ctx = context_from(&events);
        let handle = ActivityProxy::new("A", "1").call(&mut ctx, vec![]);

        assert!(!handle.is_ready());
        assert!(ctx.into_batch().decisions.is_empty());
    }

    #[test]
    fn test_rate_limit_caps_new_schedules() {
        let state = project(&[], HashMap::new()).expect("projects");
        let mut ctx =
            DecisionContext::new("tok", StartedAttributes::default(), state, None, Some(1));
        let proxy = ActivityProxy::new("A", "1");
        proxy.call(&mut ctx, vec![]);
        proxy.call(&mut ctx, vec![]);

        // Only the first call fit the budget; the second retries next round.
        assert_eq!(ctx.into_batch().decisions.len(), 1);
    }

    #[test]
    fn test_input_codec_failure_fails_the_execution() {
        struct BrokenCodec;
        impl InputCodec for BrokenCodec {
            fn encode(&self, _args: &[Value]) -> Result<String, CodecError> {
                Err(CodecError::Encode("cycle".to_string()))
            }
            fn decode(&self, _raw: &str) -> Result<Vec<Value>, CodecError> {
                Ok(vec![])
            }
        }

        let mut ctx = context_from(&[]);
        ActivityProxy::new("A", "1")
            .with_input_codec(Arc::new(BrokenCodec))
            .call(&mut ctx, vec![json!(1)]);

        assert!(ctx.is_closed());
        let batch = ctx.into_batch();
        assert_eq!(batch.decisions[0].decision_type, "FailWorkflowExecution");
    }

    #[test]
    fn test_workflow_proxy_wraps_the_call_key() {
        let mut ctx = context_from(&[]);
        WorkflowProxy::new("Child", "2")
            .with_workflow_duration(120)
            .call(&mut ctx, vec![json!("x")]);

        let batch = ctx.into_batch();
        let attrs = batch.decisions[0]
            .start_child_workflow_execution_decision_attributes
            .as_ref()
            .expect("child attributes");
        assert!(attrs.workflow_id.ends_with("-0"));
        assert_eq!(attrs.workflow_type.name, "Child");
        assert_eq!(attrs.execution_start_to_close_timeout.as_deref(), Some("120"));
    }

    #[test]
    fn test_resolved_child_workflow_result() {
        let events = vec![
            DecisionEvent::ChildWorkflowInitiated {
                call_key: "0".to_string(),
            },
            DecisionEvent::ChildWorkflowCompleted {
                call_key: "0".to_string(),
                result: Some("\"done\"".to_string()),
            },
        ];
        let mut ctx = context_from(&events);
        let handle = WorkflowProxy::new("Child", "2").call(&mut ctx, vec![]);

        assert_eq!(handle.result(), Ok(json!("done")));
    }
}
