//! Fence agent argument assembly.
//!
//! Merges the shared and per-node parameter maps of a FenceAgentsRemediation
//! into the ordered argument list passed to the agent. The agent name itself
//! is prepended by the caller.

use crate::controller::error::Error;
use crate::crd::{FenceAgentsRemediationSpec, NodeParameters, SharedParameters};

/// Build the fence agent arguments for `node_name`.
///
/// Shared parameters come first, then node parameters, each in map order.
/// A parameter with an empty value is emitted as a bare flag.
pub fn build_fence_agent_params(
    shared_parameters: Option<&SharedParameters>,
    node_parameters: Option<&NodeParameters>,
    node_name: &str,
) -> Result<Vec<String>, Error> {
    let (Some(shared), Some(per_node)) = (shared_parameters, node_parameters) else {
        return Err(Error::MissingParameters);
    };

    let mut params = Vec::with_capacity(shared.len() + per_node.len());
    for (name, value) in shared {
        params.push(format_param(name, value));
    }

    for (name, node_values) in per_node {
        let value = node_values
            .get(node_name)
            .ok_or_else(|| Error::MissingNodeParameter {
                parameter: name.clone(),
                node: node_name.to_string(),
            })?;
        params.push(format_param(name, value));
    }

    Ok(params)
}

/// Build the full command (`[agent] ++ arguments`) for a remediation spec.
pub fn build_fence_agent_command(
    spec: &FenceAgentsRemediationSpec,
    node_name: &str,
) -> Result<Vec<String>, Error> {
    let params = build_fence_agent_params(
        spec.shared_parameters.as_ref(),
        spec.node_parameters.as_ref(),
        node_name,
    )?;

    let mut command = Vec::with_capacity(params.len() + 1);
    command.push(spec.agent.clone());
    command.extend(params);
    Ok(command)
}

fn format_param(name: &str, value: &str) -> String {
    if value.is_empty() {
        name.to_string()
    } else {
        format!("{name}={value}")
    }
}
