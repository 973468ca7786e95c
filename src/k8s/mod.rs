/// Kubernetes cluster operations
pub mod exec;
pub mod manifest;
pub mod pods;
pub mod session;

#[cfg(test)]
pub(crate) mod mock;

pub use manifest::DebugPod;
pub use pods::PodManager;
pub use session::{SessionContext, SessionOptions};
