//! Task Dispatch — pull-based arithmetic job registry.

pub mod config;
pub mod error;
pub mod tasks;
