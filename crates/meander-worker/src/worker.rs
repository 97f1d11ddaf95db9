//! Decision worker loop
//!
//! Single-threaded: one decision task at a time, from poll to submission.
//! Parallelism comes from running more worker processes; they coordinate only
//! through the service's task queue. An unrecognized workflow type is logged
//! and skipped, so the task times out server-side and another worker (perhaps
//! a newer deployment) picks it up.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use meander_engine::codec::{default_identity, truncate_bytes_tail, IDENTITY_SIZE};
use meander_engine::history::{poll_next_decision, HistoryError};
use meander_engine::runner::{flush_batch, run_decision, RunnerError};
use meander_transport::SwfTransport;

use crate::registry::{RegistrationError, WorkflowRegistry};

/// Where and how a worker polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub domain: String,
    pub task_list: String,
    pub identity: Option<String>,
    pub register_remote: bool,
}

impl WorkerConfig {
    pub fn new(domain: impl Into<String>, task_list: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            task_list: task_list.into(),
            identity: None,
            register_remote: true,
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn with_register_remote(mut self, register: bool) -> Self {
        self.register_remote = register;
        self
    }
}

/// Faults that stop the worker. Everything transient is retried inside the
/// loop and never reaches this type.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("registration failed: {0}")]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Runner(#[from] RunnerError),
}

/// Resolve the worker identity, applying the trailing-bytes cap.
pub(crate) fn resolve_identity(identity: Option<&str>) -> String {
    match identity {
        Some(identity) => truncate_bytes_tail(identity, IDENTITY_SIZE).to_string(),
        None => default_identity(),
    }
}

/// Install a default tracing subscriber reading `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Poll one decision task and decide it.
///
/// Returns the `(name, version)` that was dispatched, or `None` when no
/// matching workflow is registered (the task is left to time out).
pub async fn dispatch_next_decision(
    transport: &dyn SwfTransport,
    domain: &str,
    task_list: &str,
    identity: Option<&str>,
    registry: &WorkflowRegistry,
) -> Result<Option<(String, String)>, WorkerError> {
    let task = poll_next_decision(transport, domain, task_list, identity).await?;
    let Some(entry) = registry.get(&task.name, &task.version) else {
        warn!(
            name = %task.name,
            version = %task.version,
            "no workflow registered for decision task; leaving it to time out"
        );
        return Ok(None);
    };

    debug!(name = %task.name, version = %task.version, events = task.events.len(), "deciding");
    let workflow = entry.instantiate();
    let batch = run_decision(&task, workflow.as_ref(), entry.config())?;
    let key = (task.name, task.version);
    flush_batch(transport, batch).await;
    Ok(Some(key))
}

/// Run the endless decision worker loop until shutdown is signalled.
#[instrument(skip_all, fields(domain = %config.domain, task_list = %config.task_list))]
pub async fn run_decision_worker(
    transport: Arc<dyn SwfTransport>,
    config: WorkerConfig,
    registry: WorkflowRegistry,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), WorkerError> {
    let identity = resolve_identity(config.identity.as_deref());

    if config.register_remote {
        registry
            .register_remote(transport.as_ref(), &config.domain)
            .await?;
    }

    info!(%identity, workflows = registry.len(), "decision worker started");

    loop {
        if *shutdown.borrow() {
            info!("decision worker stopping");
            return Ok(());
        }
        tokio::select! {
            _ = shutdown.changed() => {
                info!("decision worker stopping");
                return Ok(());
            }
            dispatched = dispatch_next_decision(
                transport.as_ref(),
                &config.domain,
                &config.task_list,
                Some(&identity),
                &registry,
            ) => {
                dispatched?;
            }
        }
    }
}
