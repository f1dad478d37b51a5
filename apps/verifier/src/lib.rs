//! End-to-end verification of a backend's REST entity endpoints.
//!
//! The library drives a fixed create → update → get → list → delete sequence
//! through [`entity_client::EntityClient`] and fails on the first deviation.
//! The `entity-verify` binary wraps it with configuration, logging and a CLI.

pub mod config;
pub mod error;
pub mod logging;
pub mod scenario;

pub use crate::config::Config;
pub use error::{Result, VerifyError};
pub use scenario::{
    run_entity_scenario, ApiMode, ScenarioOptions, ScenarioOutcome, ScenarioReport, StepRecord,
};
