//! The three outbound agent transports (§6): in-process callable,
//! newline-delimited-JSON subprocess, and JSON-over-HTTP.

use async_trait::async_trait;
use contracts::{AgentInvocationRequest, AgentInvocationResponse, InvocationHandle, RouterError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

/// An in-process callable, registered by name and looked up at
/// invocation time via `InvocationHandle::InProcess`.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(
        &self,
        request: AgentInvocationRequest,
    ) -> Result<AgentInvocationResponse, RouterError>;
}

pub async fn invoke_http(
    url: &str,
    request: &AgentInvocationRequest,
) -> Result<AgentInvocationResponse, RouterError> {
    let client = reqwest::Client::new();
    let response = client
        .post(url)
        .json(request)
        .send()
        .await
        .map_err(|e| RouterError::Transient { target: url.to_string(), cause: e.to_string() })?;

    let status = response.status();
    if !status.is_success() {
        let transient = status.is_server_error();
        let body = response.text().await.unwrap_or_default();
        let cause = format!("http {status}: {body}");
        return Err(if transient {
            RouterError::Transient { target: url.to_string(), cause }
        } else {
            RouterError::Permanent { target: url.to_string(), cause }
        });
    }

    response
        .json::<AgentInvocationResponse>()
        .await
        .map_err(|e| RouterError::Permanent { target: url.to_string(), cause: e.to_string() })
}

pub async fn invoke_subprocess(
    command: &str,
    args: &[String],
    request: &AgentInvocationRequest,
) -> Result<AgentInvocationResponse, RouterError> {
    let mut child = Command::new(command)
        .args(args)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| RouterError::Transient { target: command.to_string(), cause: e.to_string() })?;

    let payload = serde_json::to_string(request)
        .map_err(|e| RouterError::Permanent { target: command.to_string(), cause: e.to_string() })?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| RouterError::Internal("subprocess stdin unavailable".to_string()))?;
    stdin
        .write_all(format!("{payload}\n").as_bytes())
        .await
        .map_err(|e| RouterError::Transient { target: command.to_string(), cause: e.to_string() })?;
    drop(stdin);

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| RouterError::Internal("subprocess stdout unavailable".to_string()))?;
    let mut reader = BufReader::new(stdout);
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .await
        .map_err(|e| RouterError::Transient { target: command.to_string(), cause: e.to_string() })?;

    let status = child
        .wait()
        .await
        .map_err(|e| RouterError::Transient { target: command.to_string(), cause: e.to_string() })?;
    if !status.success() {
        return Err(RouterError::Permanent {
            target: command.to_string(),
            cause: format!("subprocess exited with {status}"),
        });
    }

    serde_json::from_str(line.trim())
        .map_err(|e| RouterError::Permanent { target: command.to_string(), cause: e.to_string() })
}

pub async fn invoke_handle(
    handle: &InvocationHandle,
    request: AgentInvocationRequest,
    in_process: &std::collections::HashMap<String, std::sync::Arc<dyn AgentInvoker>>,
) -> Result<AgentInvocationResponse, RouterError> {
    match handle {
        InvocationHandle::InProcess { callable } => {
            let invoker = in_process
                .get(callable)
                .ok_or_else(|| RouterError::Internal(format!("no in-process callable '{callable}'")))?;
            invoker.invoke(request).await
        }
        InvocationHandle::Subprocess { command, args } => {
            invoke_subprocess(command, args, &request).await
        }
        InvocationHandle::Http { url } => invoke_http(url, &request).await,
    }
}
