//! Worker binary surface
//!
//! A worker binary links its workflows into a registry, parses [`WorkerArgs`],
//! and hands off to [`run_worker`]:
//!
//! ```ignore
//! #[tokio::main]
//! async fn main() -> std::process::ExitCode {
//!     let args = WorkerArgs::parse();
//!     let transport = Arc::new(MyTransport::connect());
//!     let mut registry = WorkflowRegistry::new();
//!     registry.register("order", "3", ExecutionConfig::default(), || Box::new(OrderWorkflow::new()));
//!     run_worker(args, transport, registry).await
//! }
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::error;

use meander_transport::SwfTransport;

use crate::registry::WorkflowRegistry;
use crate::worker::{init_tracing, run_decision_worker, WorkerConfig, WorkerError};

/// Arguments of a decision worker binary.
#[derive(Debug, Clone, Parser)]
#[command(about = "Poll a task list and decide workflow executions")]
pub struct WorkerArgs {
    /// Service domain to poll
    pub domain: String,

    /// Decision task list to poll
    pub task_list: String,

    /// Worker identity shown in the service console (defaults to <fqdn>-<pid>)
    #[arg(long)]
    pub identity: Option<String>,

    /// Assume workflow types exist remotely instead of registering them
    #[arg(long)]
    pub no_register: bool,

    /// Skip installing the default tracing subscriber
    #[arg(long)]
    pub no_log_setup: bool,
}

impl WorkerArgs {
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            domain: self.domain.clone(),
            task_list: self.task_list.clone(),
            identity: self.identity.clone(),
            register_remote: !self.no_register,
        }
    }
}

/// Run the decision worker until interrupted. Exit code 0 on a clean
/// interrupt; nonzero on a registration fault or a fatal decision error.
pub async fn run_worker(
    args: WorkerArgs,
    transport: Arc<dyn SwfTransport>,
    registry: WorkflowRegistry,
) -> ExitCode {
    if !args.no_log_setup {
        init_tracing();
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    match run_decision_worker(transport, args.worker_config(), registry, shutdown_rx).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(WorkerError::Registration(error)) => {
            error!(%error, "not all workflows could be registered");
            eprintln!("not all workflows could be registered: {error}");
            ExitCode::FAILURE
        }
        Err(error) => {
            error!(%error, "decision worker failed");
            eprintln!("decision worker failed: {error}");
            ExitCode::FAILURE
        }
    }
}
