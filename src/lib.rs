//! Natural-language system automation behind risk-tiered human confirmation.
//!
//! A [`pipeline::Pipeline`] takes a request through planning, safety analysis,
//! tiered confirmation and fail-fast execution, and writes one audit line per
//! request whatever the outcome.

pub mod audit;
pub mod config;
pub mod confirm;
pub mod error;
pub mod executor;
pub mod logging;
pub mod ollama;
pub mod pipeline;
pub mod planner;
pub mod safety;
pub mod session;
pub mod tools;
pub mod types;
pub mod ui;
