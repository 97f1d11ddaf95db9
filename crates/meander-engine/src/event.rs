//! Event model
//!
//! The tagged subset of history events the engine consumes. Everything else
//! the service records (decision task scheduling, markers, signals outside
//! this model) is dropped silently during decoding.

use meander_transport::types::WorkflowExecutionStartedAttributes;
use meander_transport::HistoryEvent;

use crate::keys::subworkflow_call_key;

/// One history event, reduced to what the projector needs.
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionEvent {
    /// The execution started; carries the raw started attributes.
    WorkflowExecutionStarted {
        attributes: WorkflowExecutionStartedAttributes,
    },

    /// A previous decision completed, with the decider's piggybacked context.
    DecisionTaskCompleted {
        execution_context: Option<String>,
        started_event_id: u64,
    },

    /// An activity task entered the queue under a call-key.
    ActivityScheduled { event_id: u64, call_key: String },

    /// An activity finished; `scheduled_id` points at its scheduling event.
    ActivityCompleted {
        scheduled_id: u64,
        result: Option<String>,
    },

    /// An activity failed.
    ActivityFailed { scheduled_id: u64, reason: String },

    /// An activity timed out.
    ActivityTimedOut { scheduled_id: u64 },

    /// The service rejected a schedule decision; the activity never ran.
    ScheduleActivityFailed { call_key: String, cause: String },

    /// A child workflow was initiated; the call-key is recovered from the
    /// wrapped workflow id.
    ChildWorkflowInitiated { call_key: String },

    /// A child workflow completed.
    ChildWorkflowCompleted {
        call_key: String,
        result: Option<String>,
    },

    /// A child workflow failed.
    ChildWorkflowFailed { call_key: String, reason: String },

    /// A child workflow timed out.
    ChildWorkflowTimedOut { call_key: String },

    /// The service rejected a start-child decision.
    StartChildWorkflowFailed { call_key: String, cause: String },

    /// A timer started; `timer_id` carries the `<k>:t` namespace key.
    TimerStarted { timer_id: String },

    /// A timer fired.
    TimerFired { timer_id: String },
}

impl DecisionEvent {
    /// Decode a raw history event; `None` for kinds the engine ignores or
    /// events missing their attribute block.
    pub fn from_history(event: &HistoryEvent) -> Option<Self> {
        match event.event_type.as_str() {
            "WorkflowExecutionStarted" => {
                let attrs = event.workflow_execution_started_event_attributes.as_ref()?;
                Some(Self::WorkflowExecutionStarted {
                    attributes: attrs.clone(),
                })
            }
            "DecisionTaskCompleted" => {
                let attrs = event.decision_task_completed_event_attributes.as_ref()?;
                Some(Self::DecisionTaskCompleted {
                    execution_context: attrs.execution_context.clone(),
                    started_event_id: attrs.started_event_id,
                })
            }
            "ActivityTaskScheduled" => {
                let attrs = event.activity_task_scheduled_event_attributes.as_ref()?;
                Some(Self::ActivityScheduled {
                    event_id: event.event_id,
                    call_key: attrs.activity_id.clone(),
                })
            }
            "ActivityTaskCompleted" => {
                let attrs = event.activity_task_completed_event_attributes.as_ref()?;
                Some(Self::ActivityCompleted {
                    scheduled_id: attrs.scheduled_event_id,
                    result: attrs.result.clone(),
                })
            }
            "ActivityTaskFailed" => {
                let attrs = event.activity_task_failed_event_attributes.as_ref()?;
                Some(Self::ActivityFailed {
                    scheduled_id: attrs.scheduled_event_id,
                    reason: attrs.reason.clone().unwrap_or_default(),
                })
            }
            "ActivityTaskTimedOut" => {
                let attrs = event.activity_task_timed_out_event_attributes.as_ref()?;
                Some(Self::ActivityTimedOut {
                    scheduled_id: attrs.scheduled_event_id,
                })
            }
            "ScheduleActivityTaskFailed" => {
                let attrs = event.schedule_activity_task_failed_event_attributes.as_ref()?;
                Some(Self::ScheduleActivityFailed {
                    call_key: attrs.activity_id.clone(),
                    cause: attrs.cause.clone().unwrap_or_default(),
                })
            }
            "StartChildWorkflowExecutionInitiated" => {
                let attrs = event
                    .start_child_workflow_execution_initiated_event_attributes
                    .as_ref()?;
                Some(Self::ChildWorkflowInitiated {
                    call_key: subworkflow_call_key(&attrs.workflow_id),
                })
            }
            "ChildWorkflowExecutionCompleted" => {
                let attrs = event
                    .child_workflow_execution_completed_event_attributes
                    .as_ref()?;
                let execution = attrs.workflow_execution.as_ref()?;
                Some(Self::ChildWorkflowCompleted {
                    call_key: subworkflow_call_key(&execution.workflow_id),
                    result: attrs.result.clone(),
                })
            }
            "ChildWorkflowExecutionFailed" => {
                let attrs = event
                    .child_workflow_execution_failed_event_attributes
                    .as_ref()?;
                let execution = attrs.workflow_execution.as_ref()?;
                Some(Self::ChildWorkflowFailed {
                    call_key: subworkflow_call_key(&execution.workflow_id),
                    reason: attrs.reason.clone().unwrap_or_default(),
                })
            }
            "ChildWorkflowExecutionTimedOut" => {
                let attrs = event
                    .child_workflow_execution_timed_out_event_attributes
                    .as_ref()?;
                let execution = attrs.workflow_execution.as_ref()?;
                Some(Self::ChildWorkflowTimedOut {
                    call_key: subworkflow_call_key(&execution.workflow_id),
                })
            }
            "StartChildWorkflowExecutionFailed" => {
                let attrs = event
                    .start_child_workflow_execution_failed_event_attributes
                    .as_ref()?;
                Some(Self::StartChildWorkflowFailed {
                    call_key: subworkflow_call_key(&attrs.workflow_id),
                    cause: attrs.cause.clone().unwrap_or_default(),
                })
            }
            "TimerStarted" => {
                let attrs = event.timer_started_event_attributes.as_ref()?;
                Some(Self::TimerStarted {
                    timer_id: attrs.timer_id.clone(),
                })
            }
            "TimerFired" => {
                let attrs = event.timer_fired_event_attributes.as_ref()?;
                Some(Self::TimerFired {
                    timer_id: attrs.timer_id.clone(),
                })
            }
            _ => None,
        }
    }
}
