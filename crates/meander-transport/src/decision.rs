//! Outgoing decisions
//!
//! A decision batch is submitted with `respond_decision_task_completed`. Each
//! [`Decision`] carries the wire `decisionType` tag plus exactly one populated
//! attribute block, mirroring the service's JSON layout.

use serde::{Deserialize, Serialize};

use crate::types::{ActivityTypeRef, TaskListRef, WorkflowTypeRef};

/// One outgoing decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Decision {
    pub decision_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_activity_task_decision_attributes: Option<ScheduleActivityTaskAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_timer_decision_attributes: Option<StartTimerAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_child_workflow_execution_decision_attributes:
        Option<StartChildWorkflowExecutionAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complete_workflow_execution_decision_attributes:
        Option<CompleteWorkflowExecutionAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_workflow_execution_decision_attributes: Option<FailWorkflowExecutionAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continue_as_new_workflow_execution_decision_attributes:
        Option<ContinueAsNewWorkflowExecutionAttributes>,
}

/// Attributes for `ScheduleActivityTask`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleActivityTaskAttributes {
    pub activity_type: ActivityTypeRef,
    pub activity_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub task_list: Option<TaskListRef>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub heartbeat_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schedule_to_close_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schedule_to_start_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub start_to_close_timeout: Option<String>,
}

/// Attributes for `StartTimer`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartTimerAttributes {
    pub timer_id: String,
    pub start_to_fire_timeout: String,
}

/// Attributes for `StartChildWorkflowExecution`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartChildWorkflowExecutionAttributes {
    pub workflow_type: WorkflowTypeRef,
    pub workflow_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub task_list: Option<TaskListRef>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub execution_start_to_close_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub task_start_to_close_timeout: Option<String>,
}

/// Attributes for `CompleteWorkflowExecution`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CompleteWorkflowExecutionAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

/// Attributes for `FailWorkflowExecution`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FailWorkflowExecutionAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Attributes for `ContinueAsNewWorkflowExecution`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ContinueAsNewWorkflowExecutionAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_list: Option<TaskListRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_start_to_close_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_start_to_close_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_policy: Option<String>,
}

impl Decision {
    fn tagged(decision_type: &str) -> Self {
        Self {
            decision_type: decision_type.to_string(),
            ..Self::default()
        }
    }

    /// Schedule one activity task.
    #[allow(clippy::too_many_arguments)]
    pub fn schedule_activity_task(
        activity_id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        input: Option<String>,
        task_list: Option<String>,
        heartbeat_timeout: Option<String>,
        schedule_to_close_timeout: Option<String>,
        schedule_to_start_timeout: Option<String>,
        start_to_close_timeout: Option<String>,
    ) -> Self {
        let mut decision = Self::tagged("ScheduleActivityTask");
        decision.schedule_activity_task_decision_attributes = Some(ScheduleActivityTaskAttributes {
            activity_type: ActivityTypeRef::new(name, version),
            activity_id: activity_id.into(),
            input,
            task_list: task_list.map(TaskListRef::new),
            heartbeat_timeout,
            schedule_to_close_timeout,
            schedule_to_start_timeout,
            start_to_close_timeout,
        });
        decision
    }

    /// Start a timer that fires after `start_to_fire_timeout` seconds.
    pub fn start_timer(
        timer_id: impl Into<String>,
        start_to_fire_timeout: impl Into<String>,
    ) -> Self {
        let mut decision = Self::tagged("StartTimer");
        decision.start_timer_decision_attributes = Some(StartTimerAttributes {
            timer_id: timer_id.into(),
            start_to_fire_timeout: start_to_fire_timeout.into(),
        });
        decision
    }

    /// Start a child workflow execution.
    pub fn start_child_workflow_execution(
        name: impl Into<String>,
        version: impl Into<String>,
        workflow_id: impl Into<String>,
        input: Option<String>,
        task_list: Option<String>,
        execution_start_to_close_timeout: Option<String>,
        task_start_to_close_timeout: Option<String>,
    ) -> Self {
        let mut decision = Self::tagged("StartChildWorkflowExecution");
        decision.start_child_workflow_execution_decision_attributes =
            Some(StartChildWorkflowExecutionAttributes {
                workflow_type: WorkflowTypeRef::new(name, version),
                workflow_id: workflow_id.into(),
                input,
                task_list: task_list.map(TaskListRef::new),
                execution_start_to_close_timeout,
                task_start_to_close_timeout,
            });
        decision
    }

    /// Close the execution successfully.
    pub fn complete_workflow_execution(result: Option<String>) -> Self {
        let mut decision = Self::tagged("CompleteWorkflowExecution");
        decision.complete_workflow_execution_decision_attributes =
            Some(CompleteWorkflowExecutionAttributes { result });
        decision
    }

    /// Close the execution as failed.
    pub fn fail_workflow_execution(reason: Option<String>) -> Self {
        let mut decision = Self::tagged("FailWorkflowExecution");
        decision.fail_workflow_execution_decision_attributes =
            Some(FailWorkflowExecutionAttributes { reason });
        decision
    }

    /// Restart the execution in place with a new input.
    pub fn continue_as_new_workflow_execution(
        input: Option<String>,
        task_list: Option<String>,
        execution_start_to_close_timeout: Option<String>,
        task_start_to_close_timeout: Option<String>,
        tag_list: Option<Vec<String>>,
        child_policy: Option<String>,
    ) -> Self {
        let mut decision = Self::tagged("ContinueAsNewWorkflowExecution");
        decision.continue_as_new_workflow_execution_decision_attributes =
            Some(ContinueAsNewWorkflowExecutionAttributes {
                input,
                task_list: task_list.map(TaskListRef::new),
                execution_start_to_close_timeout,
                task_start_to_close_timeout,
                tag_list,
                child_policy,
            });
        decision
    }

    /// Whether this decision closes the execution.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.decision_type.as_str(),
            "CompleteWorkflowExecution" | "FailWorkflowExecution" | "ContinueAsNewWorkflowExecution"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_activity_wire_shape() {
        let decision = Decision::schedule_activity_task(
            "0",
            "Resize",
            "2",
            Some("[[7], {}]".to_string()),
            Some("images".to_string()),
            None,
            None,
            None,
            Some("300".to_string()),
        );

        let json = serde_json::to_value(&decision).expect("serialize");
        assert_eq!(json["decisionType"], "ScheduleActivityTask");
        let attrs = &json["scheduleActivityTaskDecisionAttributes"];
        assert_eq!(attrs["activityId"], "0");
        assert_eq!(attrs["activityType"]["name"], "Resize");
        assert_eq!(attrs["taskList"]["name"], "images");
        assert_eq!(attrs["startToCloseTimeout"], "300");
        assert!(attrs.get("heartbeatTimeout").is_none());
    }

    #[test]
    fn test_timer_wire_shape() {
        let decision = Decision::start_timer("0:t", "5");
        let json = serde_json::to_value(&decision).expect("serialize");
        assert_eq!(json["decisionType"], "StartTimer");
        assert_eq!(json["startTimerDecisionAttributes"]["timerId"], "0:t");
        assert_eq!(
            json["startTimerDecisionAttributes"]["startToFireTimeout"],
            "5"
        );
    }

    #[test]
    fn test_terminal_predicate() {
        assert!(Decision::complete_workflow_execution(Some("42".to_string())).is_terminal());
        assert!(Decision::fail_workflow_execution(Some("boom".to_string())).is_terminal());
        assert!(Decision::continue_as_new_workflow_execution(None, None, None, None, None, None)
            .is_terminal());
        assert!(!Decision::start_timer("0:t", "1").is_terminal());
    }
}
