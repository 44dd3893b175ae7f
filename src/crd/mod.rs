//! Custom Resource Definitions for fence-agents-remediation.
//!
//! - `FenceAgentsRemediation`: request to fence a single node with a fence agent

mod fence_agents_remediation;

pub use fence_agents_remediation::*;
