//! Racing bar chart simulation over per-minute attention series.
//!
//! Core: `sampler`, `trend`, `color`, `clock`, `ranking`, `bars`, `sim`,
//! `scheduler`. Tooling around it: `data`, `curve`, `capture`, `retry`.

pub mod bars;
pub mod capture;
pub mod clock;
pub mod color;
pub mod config;
pub mod curve;
pub mod data;
pub mod format;
pub mod logging;
pub mod ranking;
pub mod retry;
pub mod sampler;
pub mod scheduler;
pub mod sim;
pub mod trend;
