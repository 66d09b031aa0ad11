//! Domain types shared by every warden component.

mod process;

pub use process::{LaunchSpec, LifecycleState, ProcessStatus, StopOutcome};
