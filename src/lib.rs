//! Hierarchical configuration aggregator.
//!
//! Merges tier files, process environment overrides and live connectors into a
//! single queryable tree. See [`config`] for the loading pipeline and
//! [`Config`] for the entry point.

pub mod cli;
pub mod config;
pub mod error;
pub mod facade;
pub mod format;
pub mod logging;

pub use facade::{AutoReloadHandle, Config, ConfigOptions};
