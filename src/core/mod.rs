//! Core domain models for stagerun
//!
//! This module defines the fundamental data structures that represent
//! pipelines, stages, commands, and their configuration.

pub mod command;
pub mod config;
pub mod pipeline;
pub mod stage;
pub mod state;

pub use command::*;
pub use pipeline::*;
pub use stage::*;
pub use state::*;
