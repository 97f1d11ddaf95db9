//! # Decision engine
//!
//! Client-side decider for an event-sourced workflow service. The service
//! persists every event of a workflow execution; this engine polls for a
//! decision task, folds the history into an in-memory state, re-runs the
//! workflow code against that state, and emits a batch of new decisions.
//!
//! ## Architecture
//!
//! ```text
//! transport ──▶ history pager ──▶ history projector ──▶ DecisionContext
//!                                                           ▲      │
//!                                                       proxies    │
//!                                                           ▲      ▼
//!                                                    user workflow code
//!                                                           │
//!                                              outgoing decisions ──▶ transport
//! ```
//!
//! The engine holds no durable local state and needs no locks: one decision
//! task is processed at a time, and the service is the source of truth. User
//! workflow code must be deterministic with respect to history: the i-th
//! proxy call of a run always receives the same call-key, which is how a
//! re-run finds the results of work scheduled by earlier decisions.

pub mod codec;
pub mod config;
pub mod context;
pub mod event;
pub mod history;
pub mod keys;
pub mod projection;
pub mod runner;
pub mod task;

pub use codec::{CodecError, InputCodec, JsonCodec, ResultCodec};
pub use config::ExecutionConfig;
pub use context::{DecisionBatch, DecisionContext, PersistedContext};
pub use event::DecisionEvent;
pub use history::{poll_next_decision, HistoryError, PolledDecisionTask, StartedAttributes};
pub use projection::{DecisionState, ProjectionError};
pub use runner::{flush_batch, run_decision, RunnerError, WorkflowRun};
pub use task::{ActivityProxy, Interruption, TaskError, TaskHandle, WorkflowProxy};
