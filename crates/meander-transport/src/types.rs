//! Service wire shapes
//!
//! These mirror the JSON the service speaks (camelCase fields, string-encoded
//! durations). Every attribute block on [`HistoryEvent`] is optional; exactly
//! one is populated for a given event kind, keyed by `event_type`.

use serde::{Deserialize, Serialize};

/// Reference to a workflow type by name and version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTypeRef {
    pub name: String,
    pub version: String,
}

impl WorkflowTypeRef {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Reference to an activity type by name and version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityTypeRef {
    pub name: String,
    pub version: String,
}

impl ActivityTypeRef {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// A named task queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskListRef {
    pub name: String,
}

impl TaskListRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Reference to a workflow execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowExecutionRef {
    pub workflow_id: String,
    pub run_id: Option<String>,
}

/// One page of a decision task long-poll response.
///
/// An absent `task_token` means the long poll expired without work.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DecisionTaskPage {
    pub task_token: Option<String>,
    pub workflow_type: Option<WorkflowTypeRef>,
    pub previous_started_event_id: Option<u64>,
    pub next_page_token: Option<String>,
    pub events: Vec<HistoryEvent>,
}

/// One activity task long-poll response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityTaskPage {
    pub task_token: Option<String>,
    pub activity_type: Option<ActivityTypeRef>,
    pub activity_id: Option<String>,
    pub input: Option<String>,
}

/// A single history event as delivered by the service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryEvent {
    pub event_id: u64,
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_execution_started_event_attributes: Option<WorkflowExecutionStartedAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_task_completed_event_attributes: Option<DecisionTaskCompletedAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_task_scheduled_event_attributes: Option<ActivityTaskScheduledAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_task_completed_event_attributes: Option<ActivityTaskCompletedAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_task_failed_event_attributes: Option<ActivityTaskFailedAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_task_timed_out_event_attributes: Option<ActivityTaskTimedOutAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_activity_task_failed_event_attributes: Option<ScheduleActivityTaskFailedAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_child_workflow_execution_initiated_event_attributes:
        Option<StartChildWorkflowExecutionInitiatedAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_workflow_execution_completed_event_attributes:
        Option<ChildWorkflowExecutionCompletedAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_workflow_execution_failed_event_attributes:
        Option<ChildWorkflowExecutionFailedAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_workflow_execution_timed_out_event_attributes:
        Option<ChildWorkflowExecutionTimedOutAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_child_workflow_execution_failed_event_attributes:
        Option<StartChildWorkflowExecutionFailedAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_started_event_attributes: Option<TimerStartedAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_fired_event_attributes: Option<TimerFiredAttributes>,
}

/// Attributes of the `WorkflowExecutionStarted` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowExecutionStartedAttributes {
    pub workflow_type: Option<WorkflowTypeRef>,
    pub input: Option<String>,
    pub task_list: Option<TaskListRef>,
    pub execution_start_to_close_timeout: Option<String>,
    pub task_start_to_close_timeout: Option<String>,
    pub child_policy: Option<String>,
    pub tag_list: Option<Vec<String>>,
}

/// Attributes of the `DecisionTaskCompleted` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DecisionTaskCompletedAttributes {
    pub execution_context: Option<String>,
    pub started_event_id: u64,
}

/// Attributes of the `ActivityTaskScheduled` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityTaskScheduledAttributes {
    pub activity_id: String,
    pub activity_type: Option<ActivityTypeRef>,
}

/// Attributes of the `ActivityTaskCompleted` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityTaskCompletedAttributes {
    pub scheduled_event_id: u64,
    pub result: Option<String>,
}

/// Attributes of the `ActivityTaskFailed` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityTaskFailedAttributes {
    pub scheduled_event_id: u64,
    pub reason: Option<String>,
}

/// Attributes of the `ActivityTaskTimedOut` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityTaskTimedOutAttributes {
    pub scheduled_event_id: u64,
    pub timeout_type: Option<String>,
}

/// Attributes of the `ScheduleActivityTaskFailed` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleActivityTaskFailedAttributes {
    pub activity_id: String,
    pub cause: Option<String>,
}

/// Attributes of the `StartChildWorkflowExecutionInitiated` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StartChildWorkflowExecutionInitiatedAttributes {
    pub workflow_id: String,
    pub workflow_type: Option<WorkflowTypeRef>,
}

/// Attributes of the `ChildWorkflowExecutionCompleted` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ChildWorkflowExecutionCompletedAttributes {
    pub workflow_execution: Option<WorkflowExecutionRef>,
    pub result: Option<String>,
}

/// Attributes of the `ChildWorkflowExecutionFailed` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ChildWorkflowExecutionFailedAttributes {
    pub workflow_execution: Option<WorkflowExecutionRef>,
    pub reason: Option<String>,
}

/// Attributes of the `ChildWorkflowExecutionTimedOut` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ChildWorkflowExecutionTimedOutAttributes {
    pub workflow_execution: Option<WorkflowExecutionRef>,
    pub timeout_type: Option<String>,
}

/// Attributes of the `StartChildWorkflowExecutionFailed` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StartChildWorkflowExecutionFailedAttributes {
    pub workflow_id: String,
    pub cause: Option<String>,
}

/// Attributes of the `TimerStarted` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerStartedAttributes {
    pub timer_id: String,
    pub start_to_fire_timeout: Option<String>,
}

/// Attributes of the `TimerFired` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerFiredAttributes {
    pub timer_id: String,
}

/// Registered defaults of a workflow type, as returned by describe.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowTypeConfiguration {
    pub default_task_list: Option<TaskListRef>,
    pub default_execution_start_to_close_timeout: Option<String>,
    pub default_task_start_to_close_timeout: Option<String>,
    pub default_child_policy: Option<String>,
}

/// Registered defaults of an activity type, as returned by describe.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityTypeConfiguration {
    pub default_task_list: Option<TaskListRef>,
    pub default_task_heartbeat_timeout: Option<String>,
    pub default_task_schedule_to_close_timeout: Option<String>,
    pub default_task_schedule_to_start_timeout: Option<String>,
    pub default_task_start_to_close_timeout: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_task_page_deserialization() {
        let json = r#"{
            "taskToken": "tok-1",
            "workflowType": {"name": "order", "version": "3"},
            "previousStartedEventId": 0,
            "events": [
                {
                    "eventId": 1,
                    "eventType": "WorkflowExecutionStarted",
                    "workflowExecutionStartedEventAttributes": {
                        "workflowType": {"name": "order", "version": "3"},
                        "input": "[[], {}]",
                        "taskList": {"name": "main"},
                        "executionStartToCloseTimeout": "3600",
                        "taskStartToCloseTimeout": "60",
                        "childPolicy": "TERMINATE"
                    }
                }
            ]
        }"#;

        let page: DecisionTaskPage = serde_json::from_str(json).expect("should parse");
        assert_eq!(page.task_token.as_deref(), Some("tok-1"));
        assert_eq!(page.events.len(), 1);

        let started = page.events[0]
            .workflow_execution_started_event_attributes
            .as_ref()
            .expect("started attributes");
        assert_eq!(started.input.as_deref(), Some("[[], {}]"));
        assert_eq!(started.task_list.as_ref().map(|t| t.name.as_str()), Some("main"));
    }

    #[test]
    fn test_unknown_event_kind_still_parses() {
        let json = r#"{"eventId": 9, "eventType": "MarkerRecorded"}"#;
        let event: HistoryEvent = serde_json::from_str(json).expect("should parse");
        assert_eq!(event.event_type, "MarkerRecorded");
        assert!(event.activity_task_scheduled_event_attributes.is_none());
    }

    #[test]
    fn test_empty_poll_response() {
        let page: DecisionTaskPage = serde_json::from_str("{}").expect("should parse");
        assert!(page.task_token.is_none());
        assert!(page.events.is_empty());
    }
}
