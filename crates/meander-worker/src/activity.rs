//! Activity worker loop
//!
//! The symmetric sibling of the decision loop: poll an activity task, run the
//! registered activity, report the result or the failure. Activities are
//! plain async functions of their arguments; long-running ones report
//! progress through the [`Heartbeat`] handle.

use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use meander_engine::codec::{truncate_bytes, REASON_SIZE, RESULT_SIZE};
use meander_transport::types::ActivityTaskPage;
use meander_transport::SwfTransport;

use crate::registry::ActivityRegistry;
use crate::worker::{resolve_identity, WorkerConfig, WorkerError};

/// A failed activity, reported to the service as the failure reason.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct ActivityFailure {
    pub reason: String,
}

impl ActivityFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Progress reporter for one in-flight activity task.
pub struct Heartbeat<'a> {
    transport: &'a dyn SwfTransport,
    token: &'a str,
}

impl Heartbeat<'_> {
    /// Report progress. `false` means the beat did not reach the service; an
    /// activity past its heartbeat timeout should stop doing work.
    pub async fn beat(&self) -> bool {
        match self.transport.record_activity_task_heartbeat(self.token).await {
            Ok(()) => true,
            Err(error) => {
                warn!(%error, "activity heartbeat failed");
                false
            }
        }
    }
}

/// A user activity implementation.
#[async_trait::async_trait]
pub trait ActivityRun: Send + Sync {
    async fn run(
        &self,
        args: Vec<Value>,
        heartbeat: &Heartbeat<'_>,
    ) -> Result<Value, ActivityFailure>;
}

async fn poll_next_activity(
    transport: &dyn SwfTransport,
    domain: &str,
    task_list: &str,
    identity: Option<&str>,
) -> ActivityTaskPage {
    loop {
        match transport
            .poll_for_activity_task(domain, task_list, identity)
            .await
        {
            Ok(page) => {
                if page.task_token.as_deref().is_some_and(|t| !t.is_empty()) {
                    return page;
                }
                debug!("activity poll expired without a task");
            }
            Err(error) => warn!(%error, "error while polling for activities"),
        }
    }
}

async fn report_failure(transport: &dyn SwfTransport, token: &str, reason: &str) {
    let reason = truncate_bytes(reason, REASON_SIZE).to_string();
    if let Err(error) = transport
        .respond_activity_task_failed(token, Some(reason))
        .await
    {
        warn!(%error, "could not report activity failure; the task will time out");
    }
}

/// Poll one activity task and run it.
///
/// Returns the `(name, version)` that was executed, or `None` when the task
/// matched no registered activity and was left to time out.
pub async fn dispatch_next_activity(
    transport: &dyn SwfTransport,
    domain: &str,
    task_list: &str,
    identity: Option<&str>,
    registry: &ActivityRegistry,
) -> Result<Option<(String, String)>, WorkerError> {
    let task = poll_next_activity(transport, domain, task_list, identity).await;
    let token = task.task_token.unwrap_or_default();
    let Some(activity_type) = task.activity_type else {
        warn!("activity task carries no type; leaving it to time out");
        return Ok(None);
    };
    let Some(entry) = registry.get(&activity_type.name, &activity_type.version) else {
        warn!(
            name = %activity_type.name,
            version = %activity_type.version,
            "no activity registered for task; leaving it to time out"
        );
        return Ok(None);
    };
    let key = (activity_type.name.clone(), activity_type.version.clone());

    let args = match entry
        .config()
        .input_codec()
        .decode(task.input.as_deref().unwrap_or("[[], {}]"))
    {
        Ok(args) => args,
        Err(error) => {
            report_failure(transport, &token, &error.to_string()).await;
            return Ok(Some(key));
        }
    };

    let heartbeat = Heartbeat {
        transport,
        token: &token,
    };
    let outcome = std::panic::AssertUnwindSafe(entry.runner().run(args, &heartbeat))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(value)) => match entry.config().result_codec().encode(&value) {
            Ok(result) => {
                let result = truncate_bytes(&result, RESULT_SIZE).to_string();
                if let Err(error) = transport
                    .respond_activity_task_completed(&token, Some(result))
                    .await
                {
                    warn!(%error, "could not report activity completion; the task will time out");
                }
            }
            Err(error) => report_failure(transport, &token, &error.to_string()).await,
        },
        Ok(Err(failure)) => report_failure(transport, &token, &failure.reason).await,
        Err(_) => {
            warn!(name = %key.0, version = %key.1, "activity panicked");
            report_failure(transport, &token, "activity panicked").await;
        }
    }

    Ok(Some(key))
}

/// Run the endless activity worker loop until shutdown is signalled.
#[instrument(skip_all, fields(domain = %config.domain, task_list = %config.task_list))]
pub async fn run_activity_worker(
    transport: Arc<dyn SwfTransport>,
    config: WorkerConfig,
    registry: ActivityRegistry,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), WorkerError> {
    let identity = resolve_identity(config.identity.as_deref());

    if config.register_remote {
        registry
            .register_remote(transport.as_ref(), &config.domain)
            .await?;
    }

    info!(%identity, "activity worker started");

    loop {
        if *shutdown.borrow() {
            info!("activity worker stopping");
            return Ok(());
        }
        tokio::select! {
            _ = shutdown.changed() => {
                info!("activity worker stopping");
                return Ok(());
            }
            dispatched = dispatch_next_activity(
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
