//! Workflow runner
//!
//! Drives one decision task end to end: restore the persisted decider
//! context, project the history, rebuild the decision context, re-run the
//! user workflow from the top, and map its outcome onto a terminal decision
//! or the accumulated schedules.

use meander_transport::SwfTransport;
use serde_json::Value;
use tracing::{debug, warn};

use crate::codec::CodecError;
use crate::config::ExecutionConfig;
use crate::context::{DecisionBatch, DecisionContext, PersistedContext};
use crate::history::PolledDecisionTask;
use crate::projection::{self, ProjectionError};
use crate::task::Interruption;

/// A user workflow implementation.
///
/// `run` is re-executed from the top on every decision of the execution. It
/// must be deterministic with respect to history: the same projected state
/// must produce the same sequence of proxy calls, in the same order, so every
/// call site keeps its call-key across replays. Wall-clock reads, randomness,
/// and external I/O inside `run` violate that contract; conditional branches
/// must branch on projected state only.
pub trait WorkflowRun: Send + Sync {
    fn run(&self, ctx: &mut DecisionContext, args: Vec<Value>) -> Result<Value, Interruption>;
}

/// Fatal decision-time faults. Anything here leaves the task unanswered so
/// the service redelivers it to a healthy worker.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RunnerError {
    #[error("history projection failed: {0}")]
    Projection(#[from] ProjectionError),

    #[error("persisted decider context is corrupted: {0}")]
    Context(CodecError),
}

/// Run one decision task against a workflow implementation.
pub fn run_decision(
    task: &PolledDecisionTask,
    workflow: &dyn WorkflowRun,
    config: &ExecutionConfig,
) -> Result<DecisionBatch, RunnerError> {
    let restored = match projection::latest_execution_context(&task.events) {
        Some(blob) if !blob.is_empty() => {
            Some(PersistedContext::decode(blob).map_err(RunnerError::Context)?)
        }
        _ => None,
    };
    let seed = restored
        .as_ref()
        .map(|(context, _)| context.event_to_call.clone())
        .unwrap_or_default();
    let state = projection::project(&task.events, seed)?;
    let mut ctx = DecisionContext::new(
        task.token.clone(),
        task.started.clone(),
        state,
        restored,
        config.rate_limit(),
    );

    let raw_input = task.started.input.as_deref().unwrap_or("[[], {}]");
    let args = match config.input_codec().decode(raw_input) {
        Ok(args) => args,
        Err(error) => {
            warn!(%error, "workflow input failed to decode");
            ctx.fail(&error.to_string());
            return Ok(ctx.into_batch());
        }
    };

    let outcome =
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| workflow.run(&mut ctx, args)))
        {
            Ok(outcome) => outcome,
            Err(panic) => {
                let reason = panic_reason(panic);
                warn!(%reason, "workflow panicked during replay");
                Err(Interruption::Failed(reason))
            }
        };

    // A proxy may already have closed the decision (input serialization
    // failure); the recorded terminal decision wins over the run's outcome.
    if !ctx.is_closed() {
        match outcome {
            Ok(value) => match config.result_codec().encode(&value) {
                Ok(result) => ctx.finish(&result),
                Err(error) => ctx.fail(&error.to_string()),
            },
            Err(Interruption::Suspended) => {
                debug!("decision suspended with pending tasks");
            }
            Err(Interruption::Failed(reason)) => ctx.fail(&reason),
            Err(Interruption::Restarted(input)) => {
                if let Err(error) = ctx.restart(&input) {
                    ctx.fail(&error.to_string());
                }
            }
        }
    }

    Ok(ctx.into_batch())
}

fn panic_reason(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "workflow panicked".to_string()
    }
}

/// Submit a decision batch, swallowing transport failures: the service times
/// the unanswered task out and redelivers it.
pub async fn flush_batch(transport: &dyn SwfTransport, batch: DecisionBatch) {
    if let Err(error) = transport
        .respond_decision_task_completed(&batch.token, batch.decisions, batch.execution_context)
        .await
    {
        warn!(%error, "failed to submit decisions; the task will be redelivered");
    }
}
