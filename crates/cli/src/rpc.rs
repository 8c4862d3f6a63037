//! JSON-RPC client for the daemon

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<RpcError>,
}

/// Error object returned by the daemon
#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Option<RpcErrorData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RpcErrorData {
    #[serde(default)]
    pub stable: bool,
    #[serde(default)]
    pub output: Option<String>,
}

impl RpcError {
    pub fn output(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.output.as_deref())
            .filter(|o| !o.trim().is_empty())
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RPC error ({}): {}", self.code, self.message)?;
        if let Some(output) = self.output() {
            write!(f, "\n--- host output ---\n{}", output.trim_end())?;
        }
        Ok(())
    }
}

impl std::error::Error for RpcError {}

pub struct RpcClient {
    url: String,
    http: reqwest::Client,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Call `method` and decode its result into `T`.
    ///
    /// # Errors
    /// - The daemon is unreachable or answered with something other than
    ///   JSON-RPC
    /// - The daemon returned an error object (`RpcError`, host output included)
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        let response: JsonRpcResponse = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .context("Failed to connect to daemon")?
            .json()
            .await
            .context("Failed to parse response")?;

        decode(response)
    }
}

fn decode<T: DeserializeOwned>(response: JsonRpcResponse) -> Result<T> {
    if let Some(error) = response.error {
        return Err(error.into());
    }
    let result = response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))?;
    serde_json::from_value(result).context("Unexpected result shape")
}
