//! Trend Common - shared plumbing for the trend selector workspace.
//!
//! This crate provides:
//! - Configuration directory resolution, JSON loading and env overrides
//! - Configuration validation primitives
//! - Error types and context helpers
//! - Logging setup with noise filtering

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod validation;

pub use config::{config_dir, ObservabilityConfig};
pub use error::{Error, Result, ResultExt};
pub use validation::{Validate, ValidationError, ValidationResult};
