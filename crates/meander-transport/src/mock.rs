//! Scripted in-memory transport
//!
//! [`MockTransport`] answers poll calls from a queue of scripted responses and
//! records every request it receives, so tests can drive a full decision round
//! and then assert on the submitted batch. Registered type configurations are
//! held in maps keyed by `(name, version)`; registering an existing pair
//! returns [`TransportError::TypeAlreadyExists`] just like the service.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::{
    RegisterActivityType, RegisterWorkflowType, StartWorkflowExecution, SwfTransport,
};
use crate::decision::Decision;
use crate::error::TransportError;
use crate::types::{
    ActivityTaskPage, ActivityTypeConfiguration, DecisionTaskPage, WorkflowTypeConfiguration,
};

/// A recorded `respond_decision_task_completed` call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedDecisionTask {
    pub task_token: String,
    pub decisions: Vec<Decision>,
    pub execution_context: Option<String>,
}

#[derive(Default)]
struct MockState {
    decision_polls: VecDeque<Result<DecisionTaskPage, TransportError>>,
    activity_polls: VecDeque<Result<ActivityTaskPage, TransportError>>,
    workflow_types: HashMap<(String, String), WorkflowTypeConfiguration>,
    activity_types: HashMap<(String, String), ActivityTypeConfiguration>,
    register_failures: VecDeque<TransportError>,
    decision_poll_tokens: Vec<Option<String>>,
    completed_decisions: Vec<CompletedDecisionTask>,
    completed_activities: Vec<(String, Option<String>)>,
    failed_activities: Vec<(String, Option<String>)>,
    heartbeats: Vec<String>,
    started_executions: Vec<StartWorkflowExecution>,
    registered_workflows: Vec<RegisterWorkflowType>,
    registered_activities: Vec<RegisterActivityType>,
}

/// Scripted transport double.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Queue the next decision poll response.
    pub fn enqueue_decision_page(&self, page: DecisionTaskPage) {
        self.lock().decision_polls.push_back(Ok(page));
    }

    /// Queue a decision poll failure.
    pub fn enqueue_decision_error(&self, error: TransportError) {
        self.lock().decision_polls.push_back(Err(error));
    }

    /// Queue the next activity poll response.
    pub fn enqueue_activity_page(&self, page: ActivityTaskPage) {
        self.lock().activity_polls.push_back(Ok(page));
    }

    /// Queue an activity poll failure.
    pub fn enqueue_activity_error(&self, error: TransportError) {
        self.lock().activity_polls.push_back(Err(error));
    }

    /// Fail the next register call (workflow or activity) with this error.
    pub fn enqueue_register_failure(&self, error: TransportError) {
        self.lock().register_failures.push_back(error);
    }

    /// Pre-register a workflow type so register calls report a conflict.
    pub fn seed_workflow_type(
        &self,
        name: &str,
        version: &str,
        configuration: WorkflowTypeConfiguration,
    ) {
        self.lock()
            .workflow_types
            .insert((name.to_string(), version.to_string()), configuration);
    }

    /// Pre-register an activity type.
    pub fn seed_activity_type(
        &self,
        name: &str,
        version: &str,
        configuration: ActivityTypeConfiguration,
    ) {
        self.lock()
            .activity_types
            .insert((name.to_string(), version.to_string()), configuration);
    }

    /// All recorded decision batch submissions.
    pub fn completed_decisions(&self) -> Vec<CompletedDecisionTask> {
        self.lock().completed_decisions.clone()
    }

    /// The `next_page_token` argument of each decision poll, in call order.
    pub fn decision_poll_tokens(&self) -> Vec<Option<String>> {
        self.lock().decision_poll_tokens.clone()
    }

    /// All recorded activity completions as `(token, result)`.
    pub fn completed_activities(&self) -> Vec<(String, Option<String>)> {
        self.lock().completed_activities.clone()
    }

    /// All recorded activity failures as `(token, reason)`.
    pub fn failed_activities(&self) -> Vec<(String, Option<String>)> {
        self.lock().failed_activities.clone()
    }

    /// Tokens that sent a heartbeat.
    pub fn heartbeats(&self) -> Vec<String> {
        self.lock().heartbeats.clone()
    }

    /// All recorded execution starts.
    pub fn started_executions(&self) -> Vec<StartWorkflowExecution> {
        self.lock().started_executions.clone()
    }

    /// Successful workflow type registrations, in call order.
    pub fn registered_workflows(&self) -> Vec<RegisterWorkflowType> {
        self.lock().registered_workflows.clone()
    }

    /// Successful activity type registrations, in call order.
    pub fn registered_activities(&self) -> Vec<RegisterActivityType> {
        self.lock().registered_activities.clone()
    }
}

#[async_trait]
impl SwfTransport for MockTransport {
    async fn register_workflow_type(
        &self,
        _domain: &str,
        request: RegisterWorkflowType,
    ) -> Result<(), TransportError> {
        let mut state = self.lock();
        if let Some(error) = state.register_failures.pop_front() {
            return Err(error);
        }
        let key = (request.name.clone(), request.version.clone());
        if state.workflow_types.contains_key(&key) {
            return Err(TransportError::TypeAlreadyExists {
                name: request.name,
                version: request.version,
            });
        }
        state.workflow_types.insert(
            key,
            WorkflowTypeConfiguration {
                default_task_list: request.task_list.clone().map(crate::types::TaskListRef::new),
                default_execution_start_to_close_timeout: request.workflow_duration.clone(),
                default_task_start_to_close_timeout: request.decision_duration.clone(),
                default_child_policy: request.child_policy.clone(),
            },
        );
        state.registered_workflows.push(request);
        Ok(())
    }

    async fn describe_workflow_type(
        &self,
        _domain: &str,
        name: &str,
        version: &str,
    ) -> Result<WorkflowTypeConfiguration, TransportError> {
        self.lock()
            .workflow_types
            .get(&(name.to_string(), version.to_string()))
            .cloned()
            .ok_or_else(|| TransportError::Service {
                code: "UnknownResourceFault".to_string(),
                message: format!("workflow type {name} v{version} is not registered"),
            })
    }

    async fn register_activity_type(
        &self,
        _domain: &str,
        request: RegisterActivityType,
    ) -> Result<(), TransportError> {
        let mut state = self.lock();
        if let Some(error) = state.register_failures.pop_front() {
            return Err(error);
        }
        let key = (request.name.clone(), request.version.clone());
        if state.activity_types.contains_key(&key) {
            return Err(TransportError::TypeAlreadyExists {
                name: request.name,
                version: request.version,
            });
        }
        state.activity_types.insert(
            key,
            ActivityTypeConfiguration {
                default_task_list: request.task_list.clone().map(crate::types::TaskListRef::new),
                default_task_heartbeat_timeout: request.heartbeat_timeout.clone(),
                default_task_schedule_to_close_timeout: request.schedule_to_close_timeout.clone(),
                default_task_schedule_to_start_timeout: request.schedule_to_start_timeout.clone(),
                default_task_start_to_close_timeout: request.start_to_close_timeout.clone(),
            },
        );
        state.registered_activities.push(request);
        Ok(())
    }

    async fn describe_activity_type(
        &self,
        _domain: &str,
        name: &str,
        version: &str,
    ) -> Result<ActivityTypeConfiguration, TransportError> {
        self.lock()
            .activity_types
            .get(&(name.to_string(), version.to_string()))
            .cloned()
            .ok_or_else(|| TransportError::Service {
                code: "UnknownResourceFault".to_string(),
                message: format!("activity type {name} v{version} is not registered"),
            })
    }

    async fn poll_for_decision_task(
        &self,
        _domain: &str,
        _task_list: &str,
        _identity: Option<&str>,
        next_page_token: Option<&str>,
    ) -> Result<DecisionTaskPage, TransportError> {
        let mut state = self.lock();
        state
            .decision_poll_tokens
            .push(next_page_token.map(str::to_string));
        state
            .decision_polls
            .pop_front()
            .unwrap_or_else(|| Ok(DecisionTaskPage::default()))
    }

    async fn respond_decision_task_completed(
        &self,
        task_token: &str,
        decisions: Vec<Decision>,
        execution_context: Option<String>,
    ) -> Result<(), TransportError> {
        self.lock().completed_decisions.push(CompletedDecisionTask {
            task_token: task_token.to_string(),
            decisions,
            execution_context,
        });
        Ok(())
    }

    async fn poll_for_activity_task(
        &self,
        _domain: &str,
        _task_list: &str,
        _identity: Option<&str>,
    ) -> Result<ActivityTaskPage, TransportError> {
        self.lock()
            .activity_polls
            .pop_front()
            .unwrap_or_else(|| Ok(ActivityTaskPage::default()))
    }

    async fn respond_activity_task_completed(
        &self,
        task_token: &str,
        result: Option<String>,
    ) -> Result<(), TransportError> {
        self.lock()
            .completed_activities
            .push((task_token.to_string(), result));
        Ok(())
    }

    async fn respond_activity_task_failed(
        &self,
        task_token: &str,
        reason: Option<String>,
    ) -> Result<(), TransportError> {
        self.lock()
            .failed_activities
            .push((task_token.to_string(), reason));
        Ok(())
    }

    async fn record_activity_task_heartbeat(
        &self,
        task_token: &str,
    ) -> Result<(), TransportError> {
        self.lock().heartbeats.push(task_token.to_string());
        Ok(())
    }

    async fn start_workflow_execution(
        &self,
        _domain: &str,
        request: StartWorkflowExecution,
    ) -> Result<String, TransportError> {
        let mut state = self.lock();
        let run_id = format!("run-{}", state.started_executions.len() + 1);
        state.started_executions.push(request);
        Ok(run_id)
    }
}

/// History event constructors for scripting test histories.
pub mod events {
    use crate::types::*;

    /// A `WorkflowExecutionStarted` event with common defaults (task list
    /// `main`, 3600/60 second durations, `TERMINATE` child policy).
    pub fn workflow_started(
        event_id: u64,
        name: &str,
        version: &str,
        input: Option<&str>,
    ) -> HistoryEvent {
        HistoryEvent {
            event_id,
            event_type: "WorkflowExecutionStarted".to_string(),
            workflow_execution_started_event_attributes: Some(
                WorkflowExecutionStartedAttributes {
                    workflow_type: Some(WorkflowTypeRef::new(name, version)),
                    input: input.map(str::to_string),
                    task_list: Some(TaskListRef::new("main")),
                    execution_start_to_close_timeout: Some("3600".to_string()),
                    task_start_to_close_timeout: Some("60".to_string()),
                    child_policy: Some("TERMINATE".to_string()),
                    tag_list: None,
                },
            ),
            ..HistoryEvent::default()
        }
    }

    pub fn decision_completed(
        event_id: u64,
        execution_context: Option<&str>,
        started_event_id: u64,
    ) -> HistoryEvent {
        HistoryEvent {
            event_id,
            event_type: "DecisionTaskCompleted".to_string(),
            decision_task_completed_event_attributes: Some(DecisionTaskCompletedAttributes {
                execution_context: execution_context.map(str::to_string),
                started_event_id,
            }),
            ..HistoryEvent::default()
        }
    }

    pub fn activity_scheduled(event_id: u64, activity_id: &str) -> HistoryEvent {
        HistoryEvent {
            event_id,
            event_type: "ActivityTaskScheduled".to_string(),
            activity_task_scheduled_event_attributes: Some(ActivityTaskScheduledAttributes {
                activity_id: activity_id.to_string(),
                activity_type: None,
            }),
            ..HistoryEvent::default()
        }
    }

    pub fn activity_completed(
        event_id: u64,
        scheduled_event_id: u64,
        result: Option<&str>,
    ) -> HistoryEvent {
        HistoryEvent {
            event_id,
            event_type: "ActivityTaskCompleted".to_string(),
            activity_task_completed_event_attributes: Some(ActivityTaskCompletedAttributes {
                scheduled_event_id,
                result: result.map(str::to_string),
            }),
            ..HistoryEvent::default()
        }
    }

    pub fn activity_failed(event_id: u64, scheduled_event_id: u64, reason: &str) -> HistoryEvent {
        HistoryEvent {
            event_id,
            event_type: "ActivityTaskFailed".to_string(),
            activity_task_failed_event_attributes: Some(ActivityTaskFailedAttributes {
                scheduled_event_id,
                reason: Some(reason.to_string()),
            }),
            ..HistoryEvent::default()
        }
    }

    pub fn activity_timed_out(event_id: u64, scheduled_event_id: u64) -> HistoryEvent {
        HistoryEvent {
            event_id,
            event_type: "ActivityTaskTimedOut".to_string(),
            activity_task_timed_out_event_attributes: Some(ActivityTaskTimedOutAttributes {
                scheduled_event_id,
                timeout_type: Some("START_TO_CLOSE".to_string()),
            }),
            ..HistoryEvent::default()
        }
    }

    pub fn schedule_activity_failed(event_id: u64, activity_id: &str, cause: &str) -> HistoryEvent {
        HistoryEvent {
            event_id,
            event_type: "ScheduleActivityTaskFailed".to_string(),
            schedule_activity_task_failed_event_attributes: Some(
                ScheduleActivityTaskFailedAttributes {
                    activity_id: activity_id.to_string(),
                    cause: Some(cause.to_string()),
                },
            ),
            ..HistoryEvent::default()
        }
    }

    pub fn child_initiated(event_id: u64, workflow_id: &str) -> HistoryEvent {
        HistoryEvent {
            event_id,
            event_type: "StartChildWorkflowExecutionInitiated".to_string(),
            start_child_workflow_execution_initiated_event_attributes: Some(
                StartChildWorkflowExecutionInitiatedAttributes {
                    workflow_id: workflow_id.to_string(),
                    workflow_type: None,
                },
            ),
            ..HistoryEvent::default()
        }
    }

    pub fn child_completed(event_id: u64, workflow_id: &str, result: Option<&str>) -> HistoryEvent {
        HistoryEvent {
            event_id,
            event_type: "ChildWorkflowExecutionCompleted".to_string(),
            child_workflow_execution_completed_event_attributes: Some(
                ChildWorkflowExecutionCompletedAttributes {
                    workflow_execution: Some(WorkflowExecutionRef {
                        workflow_id: workflow_id.to_string(),
                        run_id: None,
                    }),
                    result: result.map(str::to_string),
                },
            ),
            ..HistoryEvent::default()
        }
    }

    pub fn child_failed(event_id: u64, workflow_id: &str, reason: &str) -> HistoryEvent {
        HistoryEvent {
            event_id,
            event_type: "ChildWorkflowExecutionFailed".to_string(),
            child_workflow_execution_failed_event_attributes: Some(
                ChildWorkflowExecutionFailedAttributes {
                    workflow_execution: Some(WorkflowExecutionRef {
                        workflow_id: workflow_id.to_string(),
                        run_id: None,
                    }),
                    reason: Some(reason.to_string()),
                },
            ),
            ..HistoryEvent::default()
        }
    }

    pub fn child_timed_out(event_id: u64, workflow_id: &str) -> HistoryEvent {
        HistoryEvent {
            event_id,
            event_type: "ChildWorkflowExecutionTimedOut".to_string(),
            child_workflow_execution_timed_out_event_attributes: Some(
                ChildWorkflowExecutionTimedOutAttributes {
                    workflow_execution: Some(WorkflowExecutionRef {
                        workflow_id: workflow_id.to_string(),
                        run_id: None,
                    }),
                    timeout_type: Some("START_TO_CLOSE".to_string()),
                },
            ),
            ..HistoryEvent::default()
        }
    }

    pub fn start_child_failed(event_id: u64, workflow_id: &str, cause: &str) -> HistoryEvent {
        HistoryEvent {
            event_id,
            event_type: "StartChildWorkflowExecutionFailed".to_string(),
            start_child_workflow_execution_failed_event_attributes: Some(
                StartChildWorkflowExecutionFailedAttributes {
                    workflow_id: workflow_id.to_string(),
                    cause: Some(cause.to_string()),
                },
            ),
            ..HistoryEvent::default()
        }
    }

    pub fn timer_started(event_id: u64, timer_id: &str) -> HistoryEvent {
        HistoryEvent {
            event_id,
            event_type: "TimerStarted".to_string(),
            timer_started_event_attributes: Some(TimerStartedAttributes {
                timer_id: timer_id.to_string(),
                start_to_fire_timeout: None,
            }),
            ..HistoryEvent::default()
        }
    }

    pub fn timer_fired(event_id: u64, timer_id: &str) -> HistoryEvent {
        HistoryEvent {
            event_id,
            event_type: "TimerFired".to_string(),
            timer_fired_event_attributes: Some(TimerFiredAttributes {
                timer_id: timer_id.to_string(),
            }),
            ..HistoryEvent::default()
        }
    }
}
