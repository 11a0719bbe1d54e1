//! CLI module for agentic-rag
//!
//! Handles command-line argument parsing and terminal rendering.

pub mod args;
pub mod output;

pub use args::{Args, Commands};
