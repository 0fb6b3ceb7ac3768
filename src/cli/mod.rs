//! CLI module
//!
//! The admin shell: a rustyline REPL over a [`Store`](crate::store::Store)
//! for inspecting tables and caches.

pub mod commands;
pub mod repl;

// Re-exports
pub use commands::Session;
pub use repl::Repl;
