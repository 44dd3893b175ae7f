//! Operator configuration.
//!
//! Built once at startup from command-line flags (each flag can also be set
//! through the environment) and passed to the controller through its
//! [`Context`](crate::controller::context::Context).

use std::time::Duration;

use clap::Parser;

use crate::controller::error::Error;

/// Default label selector of the pod that ships the fence agents.
pub const DEFAULT_AGENT_POD_SELECTOR: &str = "app=fence-agents-remediation-operator";

/// Default lease used for leader election.
pub const DEFAULT_LEASE_NAME: &str = "fence-agents-remediation-leader";

/// Command-line flags for the operator binary.
#[derive(Parser, Debug, Clone)]
#[command(name = "fence-agents-remediation", version, about)]
pub struct Args {
    /// Only watch FenceAgentsRemediations in this namespace (default: all namespaces)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// Namespace of the pod that runs the fence agents
    #[arg(long, env = "DEPLOYMENT_NAMESPACE", default_value = "default")]
    pub agent_pod_namespace: String,

    /// Label selector of the pod that runs the fence agents
    #[arg(long, env = "AGENT_POD_SELECTOR", default_value = DEFAULT_AGENT_POD_SELECTOR)]
    pub agent_pod_selector: String,

    /// Container to exec into (default: the pod's first container)
    #[arg(long, env = "AGENT_CONTAINER")]
    pub agent_container: Option<String>,

    /// Seconds a fence agent may run before the exec session is abandoned
    #[arg(long, env = "FENCE_AGENT_TIMEOUT_SECONDS", default_value_t = 60)]
    pub fence_agent_timeout_secs: u64,

    /// Port for the health and metrics server
    #[arg(long, env = "HEALTH_PORT", default_value_t = 8081)]
    pub health_port: u16,

    /// Acquire a Lease before running the controller
    #[arg(long, env = "LEADER_ELECT", default_value_t = false)]
    pub leader_elect: bool,

    /// Name of the leader election Lease
    #[arg(long, env = "LEASE_NAME", default_value = DEFAULT_LEASE_NAME)]
    pub lease_name: String,
}

/// Validated runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    pub watch_namespace: Option<String>,
    pub agent_pod_namespace: String,
    pub agent_pod_selector: String,
    pub agent_container: Option<String>,
    pub fence_agent_timeout: Duration,
    pub health_port: u16,
    pub leader_elect: bool,
    pub lease_name: String,
    pub lease_ttl: Duration,
    pub lease_renew_interval: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            agent_pod_namespace: "default".to_string(),
            agent_pod_selector: DEFAULT_AGENT_POD_SELECTOR.to_string(),
            agent_container: None,
            fence_agent_timeout: Duration::from_secs(60),
            health_port: 8081,
            leader_elect: false,
            lease_name: DEFAULT_LEASE_NAME.to_string(),
            lease_ttl: Duration::from_secs(15),
            lease_renew_interval: Duration::from_secs(5),
        }
    }
}

impl TryFrom<Args> for OperatorConfig {
    type Error = Error;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let config = Self {
            watch_namespace: args.watch_namespace.filter(|ns| !ns.is_empty()),
            agent_pod_namespace: args.agent_pod_namespace,
            agent_pod_selector: args.agent_pod_selector,
            agent_container: args.agent_container.filter(|c| !c.is_empty()),
            fence_agent_timeout: Duration::from_secs(args.fence_agent_timeout_secs),
            health_port: args.health_port,
            leader_elect: args.leader_elect,
            lease_name: args.lease_name,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }
}

impl OperatorConfig {
    /// Check the configuration for values the controller cannot work with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.agent_pod_namespace.is_empty() {
            return Err(Error::Config("agent pod namespace must not be empty".to_string()));
        }
        if self.agent_pod_selector.is_empty() || !self.agent_pod_selector.contains('=') {
            return Err(Error::Config(format!(
                "agent pod selector must be of the form key=value, got `{}`",
                self.agent_pod_selector
            )));
        }
        if self.fence_agent_timeout.is_zero() {
            return Err(Error::Config(
                "fence agent timeout must be greater than zero".to_string(),
            ));
        }
        if self.leader_elect && self.lease_renew_interval >= self.lease_ttl {
            return Err(Error::Config(
                "lease renew interval must be shorter than the lease TTL".to_string(),
            ));
        }
        Ok(())
    }
}
