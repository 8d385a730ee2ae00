//! Provisioning steps and the registry that orders them.

mod registry;
mod types;

pub use registry::Registry;
pub use types::{Action, CommandSpec, FailurePolicy, PackageManager, Precondition, Step};
