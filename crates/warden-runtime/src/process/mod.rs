//! Managed OS processes.
//!
//! - `handle`: one launched child with liveness checks and stop escalation
//! - `shutdown`: signal delivery for children and for bare PIDs
//! - `stream`: draining child stdout/stderr into tracing

mod handle;
pub mod shutdown;
mod stream;

pub use handle::ProcessHandle;
pub use stream::spawn_stream_reader;
