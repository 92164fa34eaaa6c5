//! DeployPilot gateway: the HTTP surface and per-turn runtime over the
//! smart-contract analysis workflow.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod state;
