//! Controller module for fence-agents-remediation.
//!
//! Contains the reconciliation loop, its phase table, finalizer lifecycle,
//! taint gate, fence agent parameter building, error handling and status
//! management.

pub mod common;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod parameters;
pub mod reconciler;
pub mod state_machine;
pub mod status;
pub mod taint;
