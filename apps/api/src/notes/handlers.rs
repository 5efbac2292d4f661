use axum::{body::Bytes, extract::State, Json};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use crate::errors::AppError;
use crate::models::note::{NoteEdit, NotePayload, NoteRemove};
use crate::models::rpc::{
    ImportRequest, RpcRequest, RpcResponse, METHOD_ADD, METHOD_EDIT, METHOD_EXPORT, METHOD_GET,
    METHOD_IMPORT, METHOD_REMOVE,
};
use crate::notes::caller::CallerContext;
use crate::notes::service;
use crate::notes::store::NoteStore;
use crate::state::AppState;

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, AppError> {
    serde_json::from_value(params).map_err(|e| AppError::InvalidParams(e.to_string()))
}

fn to_data<T: serde::Serialize>(value: &T) -> Result<Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.into()))
}

/// Routes one RPC call to the note service.
pub async fn dispatch(
    store: &dyn NoteStore,
    caller: &CallerContext,
    method: &str,
    params: Value,
) -> Result<RpcResponse<Value>, AppError> {
    debug!(method, user_id = %caller.user_id, "rpc call");

    match method {
        METHOD_GET => {
            let notes = service::list_notes(store, caller).await?;
            Ok(RpcResponse::ok(to_data(&notes)?))
        }
        METHOD_ADD => {
            let payload: NotePayload = parse_params(params)?;
            let note = service::add_note(store, caller, &payload).await?;
            let message = format!("Added Note #{}", note.id);
            Ok(RpcResponse::ok(to_data(&note)?).with_message(message))
        }
        METHOD_EDIT => {
            let edit: NoteEdit = parse_params(params)?;
            let note = service::edit_note(store, caller, &edit).await?;
            let message = format!("Updated Note #{}", note.id);
            Ok(RpcResponse::ok(to_data(&note)?).with_message(message))
        }
        METHOD_REMOVE => {
            let remove: NoteRemove = parse_params(params)?;
            service::remove_note(store, caller, &remove.note_id).await?;
            Ok(RpcResponse::ok(json!({ "note_id": remove.note_id })))
        }
        METHOD_EXPORT => {
            let bundle = service::export_notes(store, caller).await?;
            Ok(RpcResponse::ok(to_data(&bundle)?))
        }
        METHOD_IMPORT => {
            let request: ImportRequest = parse_params(params)?;
            let summary = service::import_notes(store, caller, request.notes).await?;
            Ok(RpcResponse::ok(to_data(&summary)?))
        }
        other => Err(AppError::UnknownMethod(other.to_string())),
    }
}

/// POST /api/v1/rpc
///
/// Malformed bodies are answered with the envelope too.
pub async fn handle_rpc(
    State(state): State<AppState>,
    caller: CallerContext,
    body: Bytes,
) -> Result<Json<RpcResponse<Value>>, AppError> {
    let request: RpcRequest =
        serde_json::from_slice(&body).map_err(|e| AppError::InvalidParams(e.to_string()))?;
    let response = dispatch(state.store.as_ref(), &caller, &request.method, request.params).await?;
    Ok(Json(response))
}
