// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Functional tests for the FenceAgentsRemediation reconciliation pass.
//!
//! These tests drive the real orchestrator against an in-memory cluster and
//! a scripted fence agent executor, WITHOUT requiring a live Kubernetes
//! cluster.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run specific test
//! cargo test --test functional test_concrete_ipmilan_scenario
//! ```
//!
//! ## Test Categories
//!
//! - **Remediation tests**: first pass, idempotence, parameter validation,
//!   executor failures, response validation and optimistic-concurrency
//!   conflicts
//! - **Lifecycle tests**: finalizer attach and deletion cleanup

mod fake_cluster;
mod lifecycle_tests;

pub use fake_cluster::*;
