//! Read-only host probes.
//!
//! Shared by the idempotency guard and the version report:
//!
//! - `find_executable`: PATH lookup with fallbacks for user-local installs
//! - `query_version`: run a version command with a timeout
//! - `parse_version`: regex-based version extraction from CLI output

mod parser;
mod path_finder;
mod version;

pub use parser::parse_version;
pub(crate) use parser::first_line;
pub use path_finder::find_executable;
pub use version::{query_version, ProbeError};
