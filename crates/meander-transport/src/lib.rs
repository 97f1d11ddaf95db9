//! Wire interface to the remote workflow service.
//!
//! The decision engine never talks to the network directly; it consumes the
//! [`SwfTransport`] trait, a thin request/response surface over the service's
//! poll / register / respond / start endpoints. The DTOs in [`types`] mirror
//! the service's camelCase JSON shapes, and [`Decision`] carries one outgoing
//! decision in a batch.
//!
//! [`MockTransport`] is the scripted in-memory implementation used by unit
//! and integration tests across the workspace.

pub mod client;
pub mod decision;
pub mod error;
pub mod mock;
pub mod types;

pub use client::{RegisterActivityType, RegisterWorkflowType, StartWorkflowExecution, SwfTransport};
pub use decision::Decision;
pub use error::TransportError;
pub use mock::MockTransport;
pub use types::{
    ActivityTaskPage, ActivityTypeConfiguration, ActivityTypeRef, DecisionTaskPage, HistoryEvent,
    TaskListRef, WorkflowTypeConfiguration, WorkflowTypeRef,
};
