use crate::executor::{ContractExecutor, ExecuteRequest, ExecutorError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8000";

/// Executes contract functions through a wallet gateway's HTTP API.
///
/// `POST {gateway}/v1/contracts/{address}/execute` carries the method name,
/// the encoded arguments and their BLAKE3 digest. The gateway owns signing
/// and submission; this type only moves bytes.
#[derive(Clone, Debug)]
pub struct HttpContractExecutor {
    client: reqwest::Client,
    base_url: String,
    session_token: Option<String>,
    timeout: Option<Duration>,
}

#[derive(Debug, Serialize)]
struct ExecuteBody<'a> {
    method_name: &'a str,
    method_args: &'a str,
    args_digest: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status")]
enum ExecuteReply {
    Ok { value: String },
    Err { error: String },
}

impl HttpContractExecutor {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            session_token: None,
            timeout: None,
        }
    }

    /// Reads `MEMDB_GATEWAY_URL`, `MEMDB_SESSION_TOKEN` and
    /// `MEMDB_TIMEOUT_SECS`; blank values are ignored.
    pub fn from_env() -> Self {
        let base_url = env_value("MEMDB_GATEWAY_URL")
            .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string());
        let mut executor = Self::new(base_url);
        if let Some(token) = env_value("MEMDB_SESSION_TOKEN") {
            executor = executor.with_session_token(token);
        }
        if let Some(secs) = env_value("MEMDB_TIMEOUT_SECS").and_then(|value| value.parse().ok()) {
            executor = executor.with_timeout(Duration::from_secs(secs));
        }
        executor
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/v1/contracts/{address}/execute`, with the address encoded as a
    /// single path segment.
    fn execute_url(&self, contract_address: &str) -> Result<reqwest::Url, ExecutorError> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|err| {
            ExecutorError::Backend(format!("invalid gateway url '{}': {err}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                ExecutorError::Backend(format!("gateway url '{}' cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .extend(["v1", "contracts", contract_address, "execute"]);
        Ok(url)
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

pub fn args_digest(method_args: &str) -> String {
    blake3::hash(method_args.as_bytes()).to_hex().to_string()
}

#[async_trait]
impl ContractExecutor for HttpContractExecutor {
    async fn execute(&self, request: ExecuteRequest) -> Result<String, ExecutorError> {
        let body = ExecuteBody {
            method_name: &request.method_name,
            method_args: &request.method_args,
            args_digest: args_digest(&request.method_args),
        };

        let url = self.execute_url(&request.contract_address)?;
        let mut builder = self.client.post(url).json(&body);
        if let Some(token) = &self.session_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| ExecutorError::Unreachable(format!("http post failed: {err}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| ExecutorError::Backend(format!("http read body failed: {err}")))?;
        if !status.is_success() {
            tracing::warn!(
                method = %request.method_name,
                status = status.as_u16(),
                "gateway rejected contract execution"
            );
            return Err(map_http_status(status, text));
        }

        parse_reply(&text)
    }
}

fn parse_reply(text: &str) -> Result<String, ExecutorError> {
    let reply: ExecuteReply = serde_json::from_str(text)
        .map_err(|err| ExecutorError::Backend(format!("gateway reply decode failed: {err}")))?;
    match reply {
        ExecuteReply::Ok { value } => Ok(value),
        ExecuteReply::Err { error } => Err(ExecutorError::Reverted(error)),
    }
}

fn map_http_status(status: reqwest::StatusCode, body: String) -> ExecutorError {
    match status {
        reqwest::StatusCode::BAD_GATEWAY
        | reqwest::StatusCode::SERVICE_UNAVAILABLE
        | reqwest::StatusCode::GATEWAY_TIMEOUT => {
            ExecutorError::Unreachable(format!("gateway returned {status}: {body}"))
        }
        _ => ExecutorError::Rejected {
            status: status.as_u16(),
            body,
        },
    }
}
