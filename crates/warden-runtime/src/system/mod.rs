//! External commands and dependency checks.
//!
//! - `commands`: the tokio implementation of `CommandRunner`
//! - `deps`: Java and database client checks built on top of it

mod commands;
pub mod deps;

pub use commands::SystemCommandRunner;
