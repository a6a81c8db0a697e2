//! Scenario tests for the classifier SDK
//!
//! Unit tests live next to the code; these exercise several modules together.

pub mod fake_backend;
pub mod pipeline_tests;
