use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::note::Note;

pub const METHOD_GET: &str = "notes.get";
pub const METHOD_ADD: &str = "notes.add";
pub const METHOD_EDIT: &str = "notes.edit";
pub const METHOD_REMOVE: &str = "notes.remove";
pub const METHOD_EXPORT: &str = "notes.export";
pub const METHOD_IMPORT: &str = "notes.import";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Envelope returned by every RPC method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> RpcResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Full note collection plus export metadata, as returned by `notes.export`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub notes: Vec<Note>,
    pub exported_on: i64,
    #[serde(default)]
    pub exported_by: Option<String>,
    #[serde(default)]
    pub agent_or_asset_id: Option<String>,
    #[serde(default)]
    pub note_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    pub notes: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}
