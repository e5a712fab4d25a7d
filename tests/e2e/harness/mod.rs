//! E2E test harness for the findings stores.
//!
//! Not every builder, step and assertion is used by the current scenarios.

#![allow(dead_code)]

pub mod clock;
pub mod runner;
pub mod scenario;

pub use assertions::Assertion;
pub use scenario::{Capture, Scenario};
