//! Shared types for DeployPilot: the analysis-step taxonomy, intent
//! classification results, the error enum, and configuration.

pub mod config;
pub mod error;
pub mod step;
