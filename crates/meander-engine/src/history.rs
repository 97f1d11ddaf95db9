//! History pager
//!
//! Pulls exactly one decision task and its full paginated history from the
//! transport. The first poll repeats indefinitely (a worker may outlast the
//! service); later pages get a bounded number of retries, and exhausting them
//! abandons the task. The service times the abandoned decision out and
//! redelivers it, which is safe because the decider is a pure function of
//! the history.

use meander_transport::types::DecisionTaskPage;
use meander_transport::SwfTransport;
use tracing::{debug, warn};

use crate::event::DecisionEvent;

/// Attempts per history page fetch before the task is abandoned.
pub const PAGE_RETRIES: usize = 7;

/// Faults raised while assembling a decision task.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum HistoryError {
    /// A history page stayed unreachable through all retries. Handled
    /// internally by abandoning the task and polling again.
    #[error("history page fetch exhausted its retries")]
    Pagination,

    /// The history does not begin with a well-formed
    /// `WorkflowExecutionStarted` event. Indicates a corrupted history.
    #[error("decision task history does not begin with WorkflowExecutionStarted")]
    MissingStartedEvent,
}

/// Attributes of the execution's started event, carried through the decision
/// verbatim (durations stay wire-encoded strings so a restart can propagate
/// them unchanged).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartedAttributes {
    pub input: Option<String>,
    pub task_list: Option<String>,
    pub workflow_duration: Option<String>,
    pub decision_duration: Option<String>,
    pub child_policy: Option<String>,
    pub tag_list: Option<Vec<String>>,
}

/// One decision task with its collapsed history.
#[derive(Debug, Clone, PartialEq)]
pub struct PolledDecisionTask {
    pub token: String,
    pub name: String,
    pub version: String,
    pub started: StartedAttributes,
    pub events: Vec<DecisionEvent>,
}

/// Poll until a decision task arrives and collapse its history pages.
pub async fn poll_next_decision(
    transport: &dyn SwfTransport,
    domain: &str,
    task_list: &str,
    identity: Option<&str>,
) -> Result<PolledDecisionTask, HistoryError> {
    loop {
        let first = poll_first_page(transport, domain, task_list, identity).await;
        match collect_task(transport, domain, task_list, identity, first).await {
            Ok(task) => return Ok(task),
            Err(HistoryError::Pagination) => {
                warn!("abandoning decision task; the service will redeliver it");
                continue;
            }
            Err(other) => return Err(other),
        }
    }
}

async fn poll_first_page(
    transport: &dyn SwfTransport,
    domain: &str,
    task_list: &str,
    identity: Option<&str>,
) -> DecisionTaskPage {
    loop {
        match transport
            .poll_for_decision_task(domain, task_list, identity, None)
            .await
        {
            Ok(page) => {
                if page.task_token.as_deref().is_some_and(|t| !t.is_empty()) {
                    return page;
                }
                debug!("decision poll expired without a task");
            }
            Err(error) => warn!(%error, "error while polling for decisions"),
        }
    }
}

async fn poll_page(
    transport: &dyn SwfTransport,
    domain: &str,
    task_list: &str,
    identity: Option<&str>,
    page_token: &str,
) -> Result<DecisionTaskPage, HistoryError> {
    for _ in 0..PAGE_RETRIES {
        match transport
            .poll_for_decision_task(domain, task_list, identity, Some(page_token))
            .await
        {
            Ok(page) => return Ok(page),
            Err(error) => warn!(%error, "error while fetching a history page"),
        }
    }
    Err(HistoryError::Pagination)
}

async fn collect_task(
    transport: &dyn SwfTransport,
    domain: &str,
    task_list: &str,
    identity: Option<&str>,
    first: DecisionTaskPage,
) -> Result<PolledDecisionTask, HistoryError> {
    let token = first.task_token.clone().unwrap_or_default();
    let mut raw_events = first.events;
    let mut next_page_token = first.next_page_token;

    while let Some(page_token) = next_page_token {
        let page = poll_page(transport, domain, task_list, identity, &page_token).await?;
        raw_events.extend(page.events);
        next_page_token = page.next_page_token;
    }

    // The first event may land on a later page when the first page is empty;
    // after collapsing, it must be the execution's started event.
    let started_event = raw_events.first().ok_or(HistoryError::MissingStartedEvent)?;
    if started_event.event_type != "WorkflowExecutionStarted" {
        return Err(HistoryError::MissingStartedEvent);
    }
    let attributes = started_event
        .workflow_execution_started_event_attributes
        .as_ref()
        .ok_or(HistoryError::MissingStartedEvent)?;
    let workflow_type = attributes
        .workflow_type
        .as_ref()
        .ok_or(HistoryError::MissingStartedEvent)?;

    let started = StartedAttributes {
        input: attributes.input.clone(),
        task_list: attributes.task_list.as_ref().map(|t| t.name.clone()),
        workflow_duration: attributes.execution_start_to_close_timeout.clone(),
        decision_duration: attributes.task_start_to_close_timeout.clone(),
        child_policy: attributes.child_policy.clone(),
        tag_list: attributes.tag_list.clone(),
    };

    let events = raw_events
        .iter()
        .filter_map(DecisionEvent::from_history)
        .collect();

    Ok(PolledDecisionTask {
        token,
        name: workflow_type.name.clone(),
        version: workflow_type.version.clone(),
        started,
        events,
    })
}
