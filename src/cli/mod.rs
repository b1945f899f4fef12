//! CLI module
//!
//! Command-line interface for running harvests.
//!
//! # Commands
//!
//! - `fetch` - Retrieve result sets and write them to disk
//! - `validate` - Check field names against the source schema
//! - `describe` - Show the fields a source accepts
//! - `sources` - List built-in sources

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::Runner;
