// Domain models for the orchestration subsystem

mod container;
mod network;
mod notification;
mod server;
mod settings;

pub use container::{ContainerBrief, ContainerState, ContainerStatsSample};
pub use network::{PortMapping, Protocol, Transport};
pub use notification::{AlertKind, Notification, Severity};
pub use server::{ServerRecord, ServerStatus};
pub use settings::{DEFAULT_POOL_END, DEFAULT_POOL_START, OrchestratorSettings};
