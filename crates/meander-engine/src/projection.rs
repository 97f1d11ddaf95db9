//! History projector
//!
//! Folds one execution's event stream into the per-decision state the proxies
//! query. The fold maintains these invariants at the end of every history:
//!
//! - a call-key is in at most one of running / results / errors / timedout;
//! - `order` is a permutation of the resolved call-keys, in termination order;
//! - every resolution removed its key from `running` (schedule rejections are
//!   the one exception: the task never started).
//!
//! A call-key may be scheduled again after a retry timer (same key, new
//! attempt). Re-scheduling *re-arms* the key: the stale resolution and its
//! `order` slot are dropped and the fired retry timer is consumed, so the
//! final state always reflects the latest attempt. Timed-out resolutions are
//! counted in `attempts`, which drives the proxies' retry schedule.

use std::collections::{HashMap, HashSet};

use crate::event::DecisionEvent;
use crate::keys::timer_key;

/// Faults that indicate a corrupted history or an engine bug. Fatal for the
/// worker; the task is never answered.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("resolution references unknown scheduled event {scheduled_id}")]
    UnknownScheduledEvent { scheduled_id: u64 },

    #[error("call {call_key} resolved while not running")]
    NotRunning { call_key: String },
}

/// The projected state of one execution at decision time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecisionState {
    running: HashSet<String>,
    results: HashMap<String, Option<String>>,
    errors: HashMap<String, String>,
    timedout: HashSet<String>,
    fired: HashSet<String>,
    order: Vec<String>,
    event_to_call: HashMap<u64, String>,
    attempts: HashMap<String, u32>,
}

impl DecisionState {
    pub fn is_running(&self, call_key: &str) -> bool {
        self.running.contains(call_key)
    }

    pub fn is_result(&self, call_key: &str) -> bool {
        self.results.contains_key(call_key)
    }

    pub fn is_error(&self, call_key: &str) -> bool {
        self.errors.contains_key(call_key)
    }

    pub fn is_timeout(&self, call_key: &str) -> bool {
        self.timedout.contains(call_key)
    }

    /// The stored result payload and its termination-order index.
    pub fn result(&self, call_key: &str) -> Option<(Option<&str>, usize)> {
        let payload = self.results.get(call_key)?;
        let index = self.order_index(call_key)?;
        Some((payload.as_deref(), index))
    }

    /// The stored failure reason and its termination-order index.
    pub fn error(&self, call_key: &str) -> Option<(&str, usize)> {
        let reason = self.errors.get(call_key)?;
        let index = self.order_index(call_key)?;
        Some((reason.as_str(), index))
    }

    /// The termination-order index of a timed-out call.
    pub fn timeout(&self, call_key: &str) -> Option<usize> {
        if self.timedout.contains(call_key) {
            self.order_index(call_key)
        } else {
            None
        }
    }

    /// Whether the retry timer paired with `call_key` has fired.
    pub fn timer_ready(&self, call_key: &str) -> bool {
        self.fired.contains(&timer_key(call_key))
    }

    /// Whether the retry timer paired with `call_key` is still counting down.
    pub fn timer_running(&self, call_key: &str) -> bool {
        self.running.contains(&timer_key(call_key))
    }

    /// Position of a resolved call in the termination sequence. Consumers
    /// wanting "first ready" pick the smallest index.
    pub fn order_index(&self, call_key: &str) -> Option<usize> {
        self.order.iter().position(|key| key.as_str() == call_key)
    }

    /// How many times this call has timed out so far.
    pub fn attempts(&self, call_key: &str) -> u32 {
        self.attempts.get(call_key).copied().unwrap_or(0)
    }

    /// The scheduling-event map, for persisting into the decider context.
    pub fn event_to_call(&self) -> &HashMap<u64, String> {
        &self.event_to_call
    }

    pub(crate) fn take_event_to_call(&mut self) -> HashMap<u64, String> {
        std::mem::take(&mut self.event_to_call)
    }

    fn resolve(&self, scheduled_id: u64) -> Result<String, ProjectionError> {
        self.event_to_call
            .get(&scheduled_id)
            .cloned()
            .ok_or(ProjectionError::UnknownScheduledEvent { scheduled_id })
    }

    fn stop_running(&mut self, call_key: &str) -> Result<(), ProjectionError> {
        if self.running.remove(call_key) {
            Ok(())
        } else {
            Err(ProjectionError::NotRunning {
                call_key: call_key.to_string(),
            })
        }
    }

    /// Forget a stale resolution before the key goes back in flight.
    fn rearm(&mut self, call_key: &str) {
        if let Some(index) = self.order_index(call_key) {
            self.order.remove(index);
        }
        self.results.remove(call_key);
        self.errors.remove(call_key);
        self.timedout.remove(call_key);
        self.fired.remove(&timer_key(call_key));
    }

    fn record_result(&mut self, call_key: String, payload: Option<String>) {
        self.results.insert(call_key.clone(), payload);
        self.order.push(call_key);
    }

    fn record_error(&mut self, call_key: String, reason: String) {
        self.errors.insert(call_key.clone(), reason);
        self.order.push(call_key);
    }

    fn record_timeout(&mut self, call_key: String) {
        *self.attempts.entry(call_key.clone()).or_insert(0) += 1;
        self.timedout.insert(call_key.clone());
        self.order.push(call_key);
    }
}

/// The execution context piggybacked on the most recent completed decision,
/// if any.
pub fn latest_execution_context(events: &[DecisionEvent]) -> Option<&str> {
    events
        .iter()
        .rev()
        .find_map(|event| match event {
            DecisionEvent::DecisionTaskCompleted {
                execution_context, ..
            } => execution_context.as_deref(),
            _ => None,
        })
}

/// Fold an event stream into [`DecisionState`].
///
/// `seed_event_to_call` restores the scheduling-event map carried over from
/// the previous decision's persisted context; events folded here override it.
pub fn project(
    events: &[DecisionEvent],
    seed_event_to_call: HashMap<u64, String>,
) -> Result<DecisionState, ProjectionError> {
    let mut state = DecisionState {
        event_to_call: seed_event_to_call,
        ..DecisionState::default()
    };

    for event in events {
        match event {
            DecisionEvent::ActivityScheduled { event_id, call_key } => {
                state.event_to_call.insert(*event_id, call_key.clone());
                state.rearm(call_key);
                state.running.insert(call_key.clone());
            }
            DecisionEvent::ActivityCompleted {
                scheduled_id,
                result,
            } => {
                let call_key = state.resolve(*scheduled_id)?;
                state.stop_running(&call_key)?;
                state.record_result(call_key, result.clone());
            }
            DecisionEvent::ActivityFailed {
                scheduled_id,
                reason,
            } => {
                let call_key = state.resolve(*scheduled_id)?;
                state.stop_running(&call_key)?;
                state.record_error(call_key, reason.clone());
            }
            DecisionEvent::ActivityTimedOut { scheduled_id } => {
                let call_key = state.resolve(*scheduled_id)?;
                state.stop_running(&call_key)?;
                state.record_timeout(call_key);
            }
            DecisionEvent::ScheduleActivityFailed { call_key, cause } => {
                // Rejected before it started; the key was never running.
                state.rearm(call_key);
                state.record_error(call_key.clone(), cause.clone());
            }
            DecisionEvent::ChildWorkflowInitiated { call_key } => {
                state.rearm(call_key);
                state.running.insert(call_key.clone());
            }
            DecisionEvent::ChildWorkflowCompleted { call_key, result } => {
                state.stop_running(call_key)?;
                state.record_result(call_key.clone(), result.clone());
            }
            DecisionEvent::ChildWorkflowFailed { call_key, reason } => {
                state.stop_running(call_key)?;
                state.record_error(call_key.clone(), reason.clone());
            }
            DecisionEvent::ChildWorkflowTimedOut { call_key } => {
                state.stop_running(call_key)?;
                state.record_timeout(call_key.clone());
            }
            DecisionEvent::StartChildWorkflowFailed { call_key, cause } => {
                state.rearm(call_key);
                state.record_error(call_key.clone(), cause.clone());
            }
            DecisionEvent::TimerStarted { timer_id } => {
                state.fired.remove(timer_id);
                state.running.insert(timer_id.clone());
            }
            DecisionEvent::TimerFired { timer_id } => {
                state.stop_running(timer_id)?;
                state.fired.insert(timer_id.clone());
            }
            DecisionEvent::WorkflowExecutionStarted { .. }
            | DecisionEvent::DecisionTaskCompleted { .. } => {}
        }
    }

    Ok(state)
}
