//! [`FenceAgentExecutor`] using the Kubernetes pod exec subresource.

use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::AttachParams;
use kube::{Api, Client, ResourceExt};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

use super::{ExecOutput, FenceAgentExecutor};
use crate::controller::error::Error;

/// Logged after a command finishes without a transport error.
pub const SUCCESS_COMMAND_LOG: &str = "command completed successfully";

/// Runs fence agents in the agent pod over a websocket exec session.
#[derive(Clone)]
pub struct PodExecutor {
    client: Client,
    container: Option<String>,
    timeout: Duration,
}

impl PodExecutor {
    /// Create an executor; `container` selects the container to exec into.
    pub fn new(client: Client, container: Option<String>, timeout: Duration) -> Self {
        Self {
            client,
            container,
            timeout,
        }
    }

    fn attach_params(&self) -> AttachParams {
        let params = AttachParams::default()
            .stdin(false)
            .stdout(true)
            .stderr(true);
        match &self.container {
            Some(container) => params.container(container.clone()),
            None => params,
        }
    }

    async fn run(
        &self,
        pods: &Api<Pod>,
        pod_name: &str,
        command: &[String],
    ) -> Result<ExecOutput, Error> {
        let mut process = pods
            .exec(pod_name, command.to_vec(), &self.attach_params())
            .await?;

        let stdout_reader = process.stdout();
        let stderr_reader = process.stderr();
        let status = process.take_status();

        let (stdout, stderr) = tokio::try_join!(
            read_stream(stdout_reader),
            read_stream(stderr_reader)
        )
        .map_err(|e| Error::Execution(format!("failed to read command output: {e}")))?;

        if let Some(status) = status {
            if let Some(status) = status.await {
                if status.status.as_deref() == Some("Failure") {
                    return Err(Error::Execution(format!(
                        "command exited with failure: {} (stderr: {})",
                        status.message.unwrap_or_default(),
                        stderr.trim()
                    )));
                }
            }
        }

        process
            .join()
            .await
            .map_err(|e| Error::Execution(format!("exec session failed: {e}")))?;

        Ok(ExecOutput { stdout, stderr })
    }
}

async fn read_stream<R: AsyncRead + Unpin>(reader: Option<R>) -> std::io::Result<String> {
    let mut buf = String::new();
    if let Some(mut reader) = reader {
        reader.read_to_string(&mut buf).await?;
    }
    Ok(buf)
}

#[async_trait]
impl FenceAgentExecutor for PodExecutor {
    async fn execute(&self, pod: &Pod, command: &[String]) -> Result<ExecOutput, Error> {
        let pod_name = pod.name_any();
        let namespace = pod.namespace().unwrap_or_else(|| "default".to_string());
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &namespace);

        // Arguments may carry credentials, log the agent only
        debug!(
            pod = %pod_name,
            namespace = %namespace,
            agent = ?command.first(),
            args = command.len().saturating_sub(1),
            "Executing command in pod"
        );

        match tokio::time::timeout(self.timeout, self.run(&pods, &pod_name, command)).await {
            Ok(Ok(output)) => {
                info!(pod = %pod_name, "{}", SUCCESS_COMMAND_LOG);
                Ok(output)
            }
            Ok(Err(e)) => {
                warn!(pod = %pod_name, error = %e, "Command execution failed");
                Err(e)
            }
            Err(_) => Err(Error::Execution(format!(
                "command did not finish within {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}
