use anyhow::{Context, Result};

use crate::client::backend::CallerIdentity;
use crate::logbook::filter::Visibility;
use crate::logbook::form::FormContext;
use crate::logbook::projection::{CategoryMap, ProjectionContext, UserDirectory};
use crate::logbook::stack_count::StackCountResolver;
use crate::notes::caller::MANAGER_PERMISSIONS;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Without a database the service keeps notes in memory.
    pub database_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// Configuration of the `logbook` command-line client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub identity: CallerIdentity,
    pub asset_name: Option<String>,
    pub categories: CategoryMap,
    pub users: UserDirectory,
    pub visibility_gate: bool,
    pub stack_counts: StackCountResolver,
    pub rust_log: String,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let categories = match optional_env("LOGBOOK_CATEGORIES") {
            Some(raw) => {
                CategoryMap::from_json(&raw).context("LOGBOOK_CATEGORIES must be a JSON array")?
            }
            None => CategoryMap::default(),
        };
        let users = match optional_env("LOGBOOK_USERS") {
            Some(raw) => UserDirectory::from_json(&raw).context("LOGBOOK_USERS must be a JSON object")?,
            None => UserDirectory::default(),
        };
        let stack_counts = match optional_env("LOGBOOK_STACK_PATTERNS") {
            Some(raw) => StackCountResolver::parse(&raw)?,
            None => StackCountResolver::default(),
        };
        let visibility_gate = match optional_env("LOGBOOK_VISIBILITY_GATE") {
            Some(raw) => parse_bool(&raw)
                .with_context(|| format!("LOGBOOK_VISIBILITY_GATE must be a boolean, got '{raw}'"))?,
            None => false,
        };

        Ok(ClientConfig {
            api_url: require_env("LOGBOOK_API_URL")?,
            identity: CallerIdentity {
                user_id: require_env("LOGBOOK_USER_ID")?,
                user_name: optional_env("LOGBOOK_USER_NAME"),
                agent_or_asset_id: require_env("LOGBOOK_AGENT_OR_ASSET_ID")?,
                agent_id: optional_env("LOGBOOK_AGENT_ID"),
                permissions: optional_env("LOGBOOK_PERMISSIONS")
                    .map(|raw| split_list(&raw))
                    .unwrap_or_default(),
            },
            asset_name: optional_env("LOGBOOK_ASSET_NAME"),
            categories,
            users,
            visibility_gate,
            stack_counts,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn visibility(&self) -> Visibility {
        Visibility {
            gate_active: self.visibility_gate,
            privileged: self
                .identity
                .permissions
                .iter()
                .any(|p| MANAGER_PERMISSIONS.contains(&p.as_str())),
        }
    }

    pub fn projection_context(&self) -> ProjectionContext {
        ProjectionContext {
            categories: self.categories.clone(),
            users: self.users.clone(),
        }
    }

    pub fn form_context(&self) -> FormContext {
        FormContext {
            categories: self.categories.clone(),
            stack_counts: self.stack_counts.clone(),
            asset_name: self.asset_name.clone(),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
