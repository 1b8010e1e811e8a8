//! Test utilities for HTTP and use-case testing.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - In-memory repository implementations for mocking persistence
//! - `TestAppStateBuilder` for constructing an `AppState` without a database

mod app_state_builder;
mod factories;
mod payment_mocks;

pub use app_state_builder::*;
pub use factories::*;
pub use payment_mocks::*;
