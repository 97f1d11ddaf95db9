//! # Workers
//!
//! Everything a worker process needs around the decision engine: registries
//! keyed by `(name, version)` with the remote registration and compatibility
//! protocol, the endless decision and activity polling loops, the execution
//! starter, and the clap argument surface for worker binaries.
//!
//! A worker binary links its workflows into a [`WorkflowRegistry`], provides
//! a transport, and hands both to [`cli::run_worker`] (or drives
//! [`worker::run_decision_worker`] directly). Registration faults are fatal
//! at bootstrap; everything transient is logged and retried.

pub mod activity;
pub mod cli;
pub mod registry;
pub mod starter;
pub mod worker;

pub use activity::{run_activity_worker, ActivityFailure, ActivityRun, Heartbeat};
pub use cli::{run_worker, WorkerArgs};
pub use registry::{
    ActivityConfig, ActivityRegistry, RegistrationError, WorkflowRegistry,
};
pub use starter::{StartError, StartRequest, WorkflowStarter};
pub use worker::{dispatch_next_decision, init_tracing, run_decision_worker, WorkerConfig, WorkerError};
