use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

use crate::client::backend::{
    HEADER_AGENT_ID, HEADER_AGENT_OR_ASSET_ID, HEADER_PERMISSIONS, HEADER_USER_ID, HEADER_USER_NAME,
};
use crate::errors::AppError;

/// Permissions that allow modifying any note of an agent/asset.
pub const MANAGER_PERMISSIONS: &[&str] = &["MANAGE_AGENT", "COMPANY_ADMIN"];

/// The user and agent/asset a request is made for. Supplied by the platform
/// in front of this service as request headers.
#[derive(Debug, Clone, PartialEq)]
pub struct CallerContext {
    pub user_id: String,
    pub user_name: Option<String>,
    pub agent_or_asset_id: String,
    pub agent_id: Option<String>,
    pub permissions: Vec<String>,
}

impl CallerContext {
    /// Notes may be filed against the asset or the agent behind it.
    pub fn owner_ids(&self) -> Vec<String> {
        let mut ids = vec![self.agent_or_asset_id.clone()];
        if let Some(agent_id) = &self.agent_id {
            if agent_id != &self.agent_or_asset_id {
                ids.push(agent_id.clone());
            }
        }
        ids
    }

    pub fn is_manager(&self) -> bool {
        self.permissions
            .iter()
            .any(|p| MANAGER_PERMISSIONS.contains(&p.as_str()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let (Some(user_id), Some(agent_or_asset_id)) =
            (header(HEADER_USER_ID), header(HEADER_AGENT_OR_ASSET_ID))
        else {
            return Err(AppError::MissingContext);
        };

        let permissions = header(HEADER_PERMISSIONS)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(CallerContext {
            user_id,
            user_name: header(HEADER_USER_NAME),
            agent_or_asset_id,
            agent_id: header(HEADER_AGENT_ID),
            permissions,
        })
    }
}
