//! API Tests
//!
//! End-to-end tests driving the fully assembled application.

mod error_boundary_tests;
mod middleware_tests;
mod realtime_tests;
mod startup_tests;
