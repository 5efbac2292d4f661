//! Transport for the `notes.*` RPC contract.
//!
//! `NoteBackend` is the seam the lifecycle client talks through;
//! `HttpRpcBackend` is the production implementation. There are no retries:
//! a failed call is reported once and the caller decides what to do.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::models::rpc::{RpcRequest, RpcResponse};

pub const RPC_PATH: &str = "/api/v1/rpc";

pub const HEADER_USER_ID: &str = "x-user-id";
pub const HEADER_USER_NAME: &str = "x-user-name";
pub const HEADER_AGENT_OR_ASSET_ID: &str = "x-agent-or-asset-id";
pub const HEADER_AGENT_ID: &str = "x-agent-id";
pub const HEADER_PERMISSIONS: &str = "x-permissions";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[async_trait]
pub trait NoteBackend: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> Result<RpcResponse<Value>, BackendError>;
}

/// Who the calls are made on behalf of. Sent as headers on every request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallerIdentity {
    pub user_id: String,
    pub user_name: Option<String>,
    pub agent_or_asset_id: String,
    pub agent_id: Option<String>,
    pub permissions: Vec<String>,
}

#[derive(Clone)]
pub struct HttpRpcBackend {
    client: Client,
    endpoint: String,
    identity: CallerIdentity,
}

impl HttpRpcBackend {
    pub fn new(base_url: &str, identity: CallerIdentity) -> Result<Self, BackendError> {
        Ok(Self {
            client: Client::builder().build()?,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), RPC_PATH),
            identity,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl NoteBackend for HttpRpcBackend {
    async fn call(&self, method: &str, params: Value) -> Result<RpcResponse<Value>, BackendError> {
        let body = RpcRequest {
            method: method.to_string(),
            params,
        };

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(HEADER_USER_ID, &self.identity.user_id)
            .header(HEADER_AGENT_OR_ASSET_ID, &self.identity.agent_or_asset_id)
            .json(&body);
        if let Some(name) = &self.identity.user_name {
            request = request.header(HEADER_USER_NAME, name);
        }
        if let Some(agent_id) = &self.identity.agent_id {
            request = request.header(HEADER_AGENT_ID, agent_id);
        }
        if !self.identity.permissions.is_empty() {
            request = request.header(HEADER_PERMISSIONS, self.identity.permissions.join(","));
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        // Errors carry the same envelope as successes; only fall back to a
        // transport error when the body is not one.
        match serde_json::from_str::<RpcResponse<Value>>(&text) {
            Ok(envelope) => {
                debug!(method, success = envelope.success, "rpc call finished");
                Ok(envelope)
            }
            Err(e) if status.is_success() => Err(BackendError::Parse(e)),
            Err(_) => Err(BackendError::Api {
                status: status.as_u16(),
                message: text,
            }),
        }
    }
}
