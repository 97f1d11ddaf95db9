//! End-to-end decider scenarios against the scripted transport: one decision
//! round each, from poll through history projection and replay to the
//! submitted batch.

use serde_json::{json, Value};

use meander_engine::config::ExecutionConfig;
use meander_engine::context::{DecisionContext, PersistedContext};
use meander_engine::runner::WorkflowRun;
use meander_engine::task::{ActivityProxy, Interruption};
use meander_transport::mock::{events, CompletedDecisionTask};
use meander_transport::types::{DecisionTaskPage, HistoryEvent};
use meander_transport::{MockTransport, TransportError};
use meander_worker::registry::WorkflowRegistry;
use meander_worker::worker::dispatch_next_decision;

struct Immediate;

impl WorkflowRun for Immediate {
    fn run(&self, _ctx: &mut DecisionContext, _args: Vec<Value>) -> Result<Value, Interruption> {
        Ok(json!(42))
    }
}

/// Calls activity `A v1` with the constant `7` and returns its result.
struct SingleActivity {
    a: ActivityProxy,
}

impl SingleActivity {
    fn new() -> Self {
        Self {
            a: ActivityProxy::new("A", "1"),
        }
    }

    fn with_retry(retry: Vec<u64>) -> Self {
        Self {
            a: ActivityProxy::new("A", "1").with_retry(retry),
        }
    }
}

impl WorkflowRun for SingleActivity {
    fn run(&self, ctx: &mut DecisionContext, _args: Vec<Value>) -> Result<Value, Interruption> {
        let result = self.a.call(ctx, vec![json!(7)]).result()?;
        Ok(result)
    }
}

/// Feeds the result of `first` into `second`.
struct Sequential {
    first: ActivityProxy,
    second: ActivityProxy,
}

impl Sequential {
    fn new() -> Self {
        Self {
            first: ActivityProxy::new("First", "1"),
            second: ActivityProxy::new("Second", "1"),
        }
    }
}

impl WorkflowRun for Sequential {
    fn run(&self, ctx: &mut DecisionContext, _args: Vec<Value>) -> Result<Value, Interruption> {
        let intermediate = self.first.call(ctx, vec![json!(2)]).result()?;
        let result = self.second.call(ctx, vec![intermediate]).result()?;
        Ok(result)
    }
}

fn registry() -> WorkflowRegistry {
    let mut registry = WorkflowRegistry::new();
    registry.register("simple", "1", ExecutionConfig::default(), || {
        Box::new(Immediate)
    });
    registry.register("single", "1", ExecutionConfig::default(), || {
        Box::new(SingleActivity::new())
    });
    registry.register("retrying", "1", ExecutionConfig::default(), || {
        Box::new(SingleActivity::with_retry(vec![0, 5, 10]))
    });
    registry.register("sequential", "1", ExecutionConfig::default(), || {
        Box::new(Sequential::new())
    });
    registry
}

fn page(token: &str, history: Vec<HistoryEvent>) -> DecisionTaskPage {
    DecisionTaskPage {
        task_token: Some(token.to_string()),
        events: history,
        ..DecisionTaskPage::default()
    }
}

async fn decide(transport: &MockTransport) -> CompletedDecisionTask {
    let registry = registry();
    dispatch_next_decision(transport, "dom", "main", Some("w-1"), &registry)
        .await
        .expect("dispatches")
        .expect("workflow is registered");
    transport
        .completed_decisions()
        .last()
        .cloned()
        .expect("a batch was submitted")
}

// S1: a workflow that returns immediately completes on its first decision.
#[tokio::test]
async fn immediate_return_completes_the_execution() {
    let transport = MockTransport::new();
    transport.enqueue_decision_page(page(
        "tok-1",
        vec![events::workflow_started(1, "simple", "1", Some("[[], {}]"))],
    ));

    let batch = decide(&transport).await;
    assert_eq!(batch.decisions.len(), 1);
    let result = batch.decisions[0]
        .complete_workflow_execution_decision_attributes
        .as_ref()
        .and_then(|a| a.result.as_deref());
    assert_eq!(result, Some("42"));
    assert!(batch.execution_context.is_none());
}

// S2: the first decision of a workflow with one dependency schedules it.
#[tokio::test]
async fn first_decision_schedules_the_activity() {
    let transport = MockTransport::new();
    transport.enqueue_decision_page(page(
        "tok-1",
        vec![events::workflow_started(1, "single", "1", Some("[[], {}]"))],
    ));

    let batch = decide(&transport).await;
    assert_eq!(batch.decisions.len(), 1);
    let attrs = batch.decisions[0]
        .schedule_activity_task_decision_attributes
        .as_ref()
        .expect("schedule attributes");
    assert_eq!(attrs.activity_id, "0");
    assert_eq!(attrs.activity_type.name, "A");
    assert_eq!(attrs.activity_type.version, "1");
    assert_eq!(attrs.input.as_deref(), Some("[[7],{}]"));
    // Non-terminal decisions piggyback the decider context.
    assert!(batch.execution_context.is_some());
}

// S3: once the activity completed, its result becomes the workflow result.
#[tokio::test]
async fn completed_activity_result_completes_the_execution() {
    let transport = MockTransport::new();
    transport.enqueue_decision_page(page(
        "tok-2",
        vec![
            events::workflow_started(1, "single", "1", Some("[[], {}]")),
            events::activity_scheduled(5, "0"),
            events::activity_completed(6, 5, Some("14")),
        ],
    ));

    let batch = decide(&transport).await;
    let result = batch.decisions[0]
        .complete_workflow_execution_decision_attributes
        .as_ref()
        .and_then(|a| a.result.as_deref());
    assert_eq!(result, Some("14"));
}

// S4: a failed activity propagates out of the workflow and fails the
// execution with the original reason.
#[tokio::test]
async fn failed_activity_fails_the_execution() {
    let transport = MockTransport::new();
    transport.enqueue_decision_page(page(
        "tok-2",
        vec![
            events::workflow_started(1, "single", "1", Some("[[], {}]")),
            events::activity_scheduled(5, "0"),
            events::activity_failed(6, 5, "boom"),
        ],
    ));

    let batch = decide(&transport).await;
    assert_eq!(batch.decisions.len(), 1);
    let reason = batch.decisions[0]
        .fail_workflow_execution_decision_attributes
        .as_ref()
        .and_then(|a| a.reason.as_deref());
    assert_eq!(reason, Some("boom"));
}

// S5: with a retry schedule of [0, 5, 10], the first timeout starts a delay
// timer instead of rescheduling, and the fired timer reschedules the same
// call-key.
#[tokio::test]
async fn timed_out_activity_retries_through_a_delay_timer() {
    let transport = MockTransport::new();
    transport.enqueue_decision_page(page(
        "tok-2",
        vec![
            events::workflow_started(1, "retrying", "1", Some("[[], {}]")),
            events::activity_scheduled(5, "0"),
            events::activity_timed_out(6, 5),
        ],
    ));

    let batch = decide(&transport).await;
    assert_eq!(batch.decisions.len(), 1);
    let timer = batch.decisions[0]
        .start_timer_decision_attributes
        .as_ref()
        .expect("timer attributes");
    assert_eq!(timer.timer_id, "0:t");
    assert_eq!(timer.start_to_fire_timeout, "5");

    // Next decision: the timer fired; the same call-key is rescheduled. The
    // context blob submitted above rides back in as it would via the service.
    let context = batch.execution_context.as_deref().expect("context blob");
    transport.enqueue_decision_page(page(
        "tok-3",
        vec![
            events::workflow_started(1, "retrying", "1", Some("[[], {}]")),
            events::activity_scheduled(5, "0"),
            events::activity_timed_out(6, 5),
            events::decision_completed(7, Some(context), 4),
            events::timer_started(8, "0:t"),
            events::timer_fired(9, "0:t"),
        ],
    ));

    let batch = decide(&transport).await;
    let attrs = batch.decisions[0]
        .schedule_activity_task_decision_attributes
        .as_ref()
        .expect("schedule attributes");
    assert_eq!(attrs.activity_id, "0");
}

// S6: when a history page stays unreachable through all retries, the task is
// abandoned without decisions and polling resumes cleanly.
#[tokio::test]
async fn pagination_exhaustion_abandons_the_task_without_decisions() {
    let transport = MockTransport::new();
    transport.enqueue_decision_page(DecisionTaskPage {
        task_token: Some("tok-doomed".to_string()),
        next_page_token: Some("p2".to_string()),
        events: vec![events::workflow_started(1, "single", "1", Some("[[], {}]"))],
        ..DecisionTaskPage::default()
    });
    for _ in 0..meander_engine::history::PAGE_RETRIES {
        transport.enqueue_decision_error(TransportError::Connection("flaky".to_string()));
    }
    transport.enqueue_decision_page(page(
        "tok-fresh",
        vec![events::workflow_started(1, "simple", "1", Some("[[], {}]"))],
    ));

    let batch = decide(&transport).await;
    // Exactly one batch went out, for the fresh task only.
    assert_eq!(transport.completed_decisions().len(), 1);
    assert_eq!(batch.task_token, "tok-fresh");
    assert_eq!(batch.decisions[0].decision_type, "CompleteWorkflowExecution");
}

// A two-step workflow driven across three decisions, with the context blob
// round-tripping through the scripted service like it would in production.
#[tokio::test]
async fn sequential_activities_complete_over_three_decisions() {
    let transport = MockTransport::new();

    // Decision 1: schedule `First`.
    transport.enqueue_decision_page(page(
        "tok-1",
        vec![events::workflow_started(1, "sequential", "1", Some("[[], {}]"))],
    ));
    let batch = decide(&transport).await;
    let first = batch.decisions[0]
        .schedule_activity_task_decision_attributes
        .as_ref()
        .expect("first schedule");
    assert_eq!(first.activity_type.name, "First");
    assert_eq!(first.activity_id, "0");
    let context_1 = batch.execution_context.clone().expect("context");

    // Decision 2: `First` returned 4; schedule `Second` with it.
    transport.enqueue_decision_page(page(
        "tok-2",
        vec![
            events::workflow_started(1, "sequential", "1", Some("[[], {}]")),
            events::activity_scheduled(5, "0"),
            events::decision_completed(6, Some(&context_1), 4),
            events::activity_completed(7, 5, Some("4")),
        ],
    ));
    let batch = decide(&transport).await;
    let second = batch.decisions[0]
        .schedule_activity_task_decision_attributes
        .as_ref()
        .expect("second schedule");
    assert_eq!(second.activity_type.name, "Second");
    assert_eq!(second.activity_id, "1");
    assert_eq!(second.input.as_deref(), Some("[[4],{}]"));

    // The persisted context carries the scheduling-event map forward.
    let context_2 = batch.execution_context.clone().expect("context");
    let (record, _) = PersistedContext::decode(&context_2).expect("decodes");
    assert_eq!(record.event_to_call.get(&5).map(String::as_str), Some("0"));

    // Decision 3: `Second` returned 8; the execution completes.
    transport.enqueue_decision_page(page(
        "tok-3",
        vec![
            events::workflow_started(1, "sequential", "1", Some("[[], {}]")),
            events::activity_scheduled(5, "0"),
            events::decision_completed(6, Some(&context_1), 4),
            events::activity_completed(7, 5, Some("4")),
            events::activity_scheduled(9, "1"),
            events::decision_completed(10, Some(&context_2), 8),
            events::activity_completed(11, 9, Some("8")),
        ],
    ));
    let batch = decide(&transport).await;
    let result = batch.decisions[0]
        .complete_workflow_execution_decision_attributes
        .as_ref()
        .and_then(|a| a.result.as_deref());
    assert_eq!(result, Some("8"));
}

// A schedule rejection (unknown activity type) surfaces as an error reading
// the future and fails the execution.
#[tokio::test]
async fn rejected_schedule_fails_the_execution() {
    let transport = MockTransport::new();
    transport.enqueue_decision_page(page(
        "tok-2",
        vec![
            events::workflow_started(1, "single", "1", Some("[[], {}]")),
            events::schedule_activity_failed(5, "0", "ACTIVITY_TYPE_DOES_NOT_EXIST"),
        ],
    ));

    let batch = decide(&transport).await;
    let reason = batch.decisions[0]
        .fail_workflow_execution_decision_attributes
        .as_ref()
        .and_then(|a| a.reason.as_deref());
    assert_eq!(reason, Some("ACTIVITY_TYPE_DOES_NOT_EXIST"));
}
