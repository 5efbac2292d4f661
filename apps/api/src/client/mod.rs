//! Note lifecycle client: keeps an in-memory copy of an asset's notes in step
//! with the user's add/edit/remove actions and the backend's answers.
//!
//! Calls are plain request/response with no timeout, retry or cancellation.
//! Nothing here is atomic across interleaved calls; the last write to the
//! local list wins.

pub mod backend;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::logbook::export::ImportBatch;
use crate::models::note::{Note, NoteEdit, NotePatch, NotePayload};
use crate::models::rpc::{
    ExportBundle, ImportSummary, RpcResponse, METHOD_ADD, METHOD_EDIT, METHOD_EXPORT, METHOD_GET,
    METHOD_IMPORT, METHOD_REMOVE,
};

pub use backend::{BackendError, CallerIdentity, HttpRpcBackend, NoteBackend};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Backend rejected {method}: {message}")]
    Rejected { method: &'static str, message: String },

    #[error("Backend returned no data for {0}")]
    MissingData(&'static str),

    #[error("Unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
}

pub struct NotesClient<B> {
    backend: B,
    notes: Vec<Note>,
    loaded: bool,
}

impl<B: NoteBackend> NotesClient<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            notes: Vec::new(),
            loaded: false,
        }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// False until the first load has finished, successfully or not.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Replaces the local list with the backend's. The list is left alone on
    /// failure, but the client counts as loaded either way.
    pub async fn load(&mut self) -> Result<(), ClientError> {
        let result = self.request::<Vec<Note>>(METHOD_GET, json!({})).await;
        self.loaded = true;

        let notes = result?;
        debug!(count = notes.len(), "notes loaded");
        self.notes = notes;
        Ok(())
    }

    /// Prepends the backend's stored copy of the new note.
    pub async fn add(&mut self, payload: &NotePayload) -> Result<&Note, ClientError> {
        let note: Note = self.request(METHOD_ADD, serde_json::to_value(payload)?).await?;
        info!(note_id = %note.id, "note added");
        self.notes.insert(0, note);
        Ok(&self.notes[0])
    }

    /// Sends the patch, merges the answer into the local copy, then reloads
    /// the whole list whether or not the edit went through. Fields left out of
    /// the patch keep their stored values. The returned result reports the
    /// edit call only; a failed reload is logged.
    pub async fn edit(&mut self, note_id: &str, patch: &NotePatch) -> Result<(), ClientError> {
        let params = serde_json::to_value(NoteEdit {
            note_id: note_id.to_string(),
            patch: patch.clone(),
        })?;
        let outcome = self.request::<Note>(METHOD_EDIT, params).await;

        if let Ok(updated) = &outcome {
            if let Some(local) = self.notes.iter_mut().find(|n| n.id == updated.id) {
                *local = updated.clone();
            }
        }

        if let Err(e) = self.load().await {
            warn!(note_id, error = %e, "reload after edit failed");
        }

        outcome.map(|_| ())
    }

    /// Drops the note locally straight away, then tells the backend. A failed
    /// backend call is logged and not rolled back.
    pub async fn remove(&mut self, note_id: &str) {
        self.notes.retain(|n| n.id != note_id);

        match self.backend.call(METHOD_REMOVE, json!({ "note_id": note_id })).await {
            Ok(response) if response.success => info!(note_id, "note removed"),
            Ok(response) => warn!(
                note_id,
                message = response.message.as_deref().unwrap_or_default(),
                "backend did not remove note"
            ),
            Err(e) => warn!(note_id, error = %e, "remove call failed"),
        }
    }

    pub async fn export_data(&self) -> Result<ExportBundle, ClientError> {
        self.request(METHOD_EXPORT, json!({})).await
    }

    /// Hands the batch to the backend as-is; what import means is up to the
    /// backend.
    pub async fn import_data(&self, batch: &ImportBatch) -> Result<ImportSummary, ClientError> {
        let summary: ImportSummary = self
            .request(METHOD_IMPORT, json!({ "notes": batch.notes }))
            .await?;
        info!(imported = summary.imported, skipped = summary.skipped, "notes imported");
        Ok(summary)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> Result<T, ClientError> {
        let response = self.backend.call(method, params).await?;
        unwrap_response(method, response)
    }
}

fn unwrap_response<T: DeserializeOwned>(
    method: &'static str,
    response: RpcResponse<Value>,
) -> Result<T, ClientError> {
    if !response.success {
        return Err(ClientError::Rejected {
            method,
            message: response
                .message
                .unwrap_or_else(|| "An unexpected error occurred".to_string()),
        });
    }
    let data = response.data.ok_or(ClientError::MissingData(method))?;
    Ok(serde_json::from_value(data)?)
}
