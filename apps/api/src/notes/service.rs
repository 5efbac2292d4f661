use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::note::{Note, NoteEdit, NotePayload};
use crate::models::rpc::{ExportBundle, ImportSummary};
use crate::notes::caller::CallerContext;
use crate::notes::store::NoteStore;

const NOT_MODIFIED: &str = "Note not modified";
const NOT_REMOVED: &str = "Note not removed";

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Managers may modify any note; everyone else only the notes they wrote.
pub fn can_modify(caller: &CallerContext, note: &Note) -> bool {
    caller.is_manager()
        || note.user.as_deref() == Some(caller.user_id.as_str())
        || note.author_id.as_deref() == Some(caller.user_id.as_str())
}

/// Newest first.
pub async fn list_notes(
    store: &dyn NoteStore,
    caller: &CallerContext,
) -> Result<Vec<Note>, AppError> {
    let mut notes = store.list(&caller.owner_ids()).await?;
    notes.sort_by(|a, b| b.created_on.cmp(&a.created_on));
    Ok(notes)
}

pub async fn add_note(
    store: &dyn NoteStore,
    caller: &CallerContext,
    payload: &NotePayload,
) -> Result<Note, AppError> {
    payload.validate()?;

    let mut note = Note {
        id: Uuid::new_v4().to_string(),
        user: None,
        text: String::new(),
        created_on: now_millis(),
        author_id: Some(caller.user_id.clone()),
        author_name: caller.user_name.clone(),
        editor_id: None,
        editor_name: None,
        updated_on: None,
        subject: None,
        category_id: None,
        note_category: None,
        external: false,
        fields: Default::default(),
    };
    note.apply(payload);

    if !store.insert(&caller.agent_or_asset_id, &note).await? {
        return Err(AppError::Internal(anyhow::anyhow!(
            "generated note id {} is already taken",
            note.id
        )));
    }
    info!(note_id = %note.id, owner = %caller.agent_or_asset_id, "note added");
    Ok(note)
}

pub async fn edit_note(
    store: &dyn NoteStore,
    caller: &CallerContext,
    edit: &NoteEdit,
) -> Result<Note, AppError> {
    let owners = caller.owner_ids();
    let mut note = store
        .find(&owners, &edit.note_id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_MODIFIED.to_string()))?;

    if !can_modify(caller, &note) {
        warn!(note_id = %note.id, user_id = %caller.user_id, "edit refused");
        return Err(AppError::Forbidden(NOT_MODIFIED.to_string()));
    }
    note.merge(&edit.patch);
    note.payload().validate()?;

    note.editor_id = Some(caller.user_id.clone());
    note.editor_name = caller.user_name.clone();
    note.updated_on = Some(now_millis());

    if !store.update(&owners, &note).await? {
        return Err(AppError::NotFound(NOT_MODIFIED.to_string()));
    }
    info!(note_id = %note.id, "note updated");
    Ok(note)
}

pub async fn remove_note(
    store: &dyn NoteStore,
    caller: &CallerContext,
    note_id: &str,
) -> Result<(), AppError> {
    let owners = caller.owner_ids();
    let note = store
        .find(&owners, note_id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_REMOVED.to_string()))?;

    if !can_modify(caller, &note) {
        warn!(note_id, user_id = %caller.user_id, "remove refused");
        return Err(AppError::Forbidden(NOT_REMOVED.to_string()));
    }

    if !store.delete(&owners, note_id).await? {
        return Err(AppError::NotFound(NOT_REMOVED.to_string()));
    }
    info!(note_id, "note removed");
    Ok(())
}

pub async fn export_notes(
    store: &dyn NoteStore,
    caller: &CallerContext,
) -> Result<ExportBundle, AppError> {
    let notes = list_notes(store, caller).await?;
    Ok(ExportBundle {
        note_count: notes.len(),
        notes,
        exported_on: now_millis(),
        exported_by: Some(
            caller
                .user_name
                .clone()
                .unwrap_or_else(|| caller.user_id.clone()),
        ),
        agent_or_asset_id: Some(caller.agent_or_asset_id.clone()),
    })
}

/// Inserts every record not already filed for the caller. Records whose id
/// belongs to another agent/asset are copied under a fresh id. Records that do
/// not deserialize as a note are skipped along with duplicates.
pub async fn import_notes(
    store: &dyn NoteStore,
    caller: &CallerContext,
    records: Vec<Value>,
) -> Result<ImportSummary, AppError> {
    if !caller.is_manager() {
        return Err(AppError::Forbidden("Notes not imported".to_string()));
    }

    let owners = caller.owner_ids();
    let mut summary = ImportSummary::default();

    for mut record in records {
        if let Value::Object(map) = &mut record {
            if !map.contains_key("_id") && !map.contains_key("id") {
                map.insert("_id".into(), Value::String(Uuid::new_v4().to_string()));
            }
            map.entry("created_on").or_insert_with(|| now_millis().into());
        }

        let mut note: Note = match serde_json::from_value(record) {
            Ok(note) => note,
            Err(e) => {
                warn!(error = %e, "skipping malformed import record");
                summary.skipped += 1;
                continue;
            }
        };

        if store.find(&owners, &note.id).await?.is_some() {
            summary.skipped += 1;
            continue;
        }
        if store.exists(&note.id).await? {
            let fresh = Uuid::new_v4().to_string();
            debug!(original = %note.id, fresh = %fresh, "note id taken by another owner");
            note.id = fresh;
        }

        if store.insert(&caller.agent_or_asset_id, &note).await? {
            summary.imported += 1;
        } else {
            summary.skipped += 1;
        }
    }

    info!(
        imported = summary.imported,
        skipped = summary.skipped,
        "import finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::note::{CategoryFields, NotePatch};
    use crate::models::stack::StackTensioning;
    use crate::notes::store::MemoryNoteStore;
    use serde_json::json;

    fn caller(user_id: &str, permissions: &[&str]) -> CallerContext {
        CallerContext {
            user_id: user_id.to_string(),
            user_name: Some("Test User".into()),
            agent_or_asset_id: "asset0000000".into(),
            agent_id: Some("agent0000000".into()),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn payload(text: &str) -> NotePayload {
        NotePayload {
            text: text.into(),
            ..Default::default()
        }
    }

    fn edit(note_id: &str, text: &str) -> NoteEdit {
        NoteEdit {
            note_id: note_id.into(),
            patch: NotePatch {
                text: Some(text.into()),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_add_stamps_author() {
        let store = MemoryNoteStore::default();
        let author = caller("user00000001", &[]);

        let note = add_note(&store, &author, &payload("New note text")).await.unwrap();

        assert_eq!(note.text, "New note text");
        assert_eq!(note.author_id.as_deref(), Some("user00000001"));
        assert_eq!(note.author_name.as_deref(), Some("Test User"));
        assert!(note.created_on > 0);
        assert!(Uuid::parse_str(&note.id).is_ok());
        assert_eq!(list_notes(&store, &author).await.unwrap(), vec![note]);
    }

    #[tokio::test]
    async fn test_add_rejects_invalid_payload() {
        let store = MemoryNoteStore::default();
        let bad = NotePayload {
            text: "t".into(),
            note_category: Some("Stack tensioning".into()),
            fields: CategoryFields {
                stack_tensioning: Some(vec![]),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = add_note(&store, &caller("u1", &[]), &bad).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_author_can_edit_and_author_is_kept() {
        let store = MemoryNoteStore::default();
        let author = caller("user00000001", &[]);
        let note = add_note(&store, &author, &payload("draft")).await.unwrap();

        let updated = edit_note(&store, &author, &edit(&note.id, "Updated note text"))
            .await
            .unwrap();

        assert_eq!(updated.text, "Updated note text");
        assert_eq!(updated.author_id, note.author_id);
        assert_eq!(updated.created_on, note.created_on);
        assert_eq!(updated.editor_id.as_deref(), Some("user00000001"));
        assert!(updated.updated_on.is_some());
    }

    #[tokio::test]
    async fn test_other_user_needs_permission_to_edit() {
        let store = MemoryNoteStore::default();
        let note = add_note(&store, &caller("user00000001", &[]), &payload("original"))
            .await
            .unwrap();

        let err = edit_note(&store, &caller("user00000002", &[]), &edit(&note.id, "nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref m) if m == "Note not modified"));

        let manager = caller("user00000002", &["MANAGE_AGENT"]);
        let updated = edit_note(&store, &manager, &edit(&note.id, "managed"))
            .await
            .unwrap();
        assert_eq!(updated.editor_id.as_deref(), Some("user00000002"));
        assert_eq!(updated.author_id.as_deref(), Some("user00000001"));
    }

    #[tokio::test]
    async fn test_legacy_user_field_grants_edit() {
        let store = MemoryNoteStore::default();
        let legacy: Note = serde_json::from_value(json!({
            "_id": "legacy1",
            "user": "user00000003",
            "text": "old",
            "created_on": 1
        }))
        .unwrap();
        store.insert("asset0000000", &legacy).await.unwrap();

        assert!(edit_note(&store, &caller("user00000003", &[]), &edit("legacy1", "new"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_edit_merges_only_sent_fields() {
        let store = MemoryNoteStore::default();
        let author = caller("u1", &[]);
        let calibration = NotePayload {
            text: "Calibrated".into(),
            subject: Some("FT-101 check".into()),
            category_id: Some(7),
            note_category: Some("Calibration".into()),
            external: true,
            fields: CategoryFields {
                tag_numbers: Some(vec!["FT-101".into()]),
                ..Default::default()
            },
        };
        let note = add_note(&store, &author, &calibration).await.unwrap();

        let updated = edit_note(&store, &author, &edit(&note.id, "Calibrated again"))
            .await
            .unwrap();

        assert_eq!(updated.text, "Calibrated again");
        assert_eq!(updated.subject.as_deref(), Some("FT-101 check"));
        assert_eq!(updated.category_id, Some(7));
        assert_eq!(updated.note_category.as_deref(), Some("Calibration"));
        assert!(updated.external);
        assert_eq!(updated.fields.tag_numbers, Some(vec!["FT-101".to_string()]));
    }

    #[tokio::test]
    async fn test_recategorize_must_null_previous_fields() {
        let store = MemoryNoteStore::default();
        let author = caller("u1", &[]);
        let tensioned = NotePayload {
            text: "Retensioned".into(),
            note_category: Some("Stack tensioning".into()),
            fields: CategoryFields {
                stack_tensioning: Some(vec![StackTensioning {
                    identifier: "a".into(),
                    torque: "40".into(),
                    retensioned: true,
                }]),
                ..Default::default()
            },
            ..Default::default()
        };
        let note = add_note(&store, &author, &tensioned).await.unwrap();

        let only_category: NoteEdit = serde_json::from_value(json!({
            "note_id": note.id, "note_category": "General"
        }))
        .unwrap();
        let err = edit_note(&store, &author, &only_category).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut target = note.payload();
        target.note_category = Some("General".into());
        target.fields = CategoryFields::default();
        let explicit = NoteEdit {
            note_id: note.id.clone(),
            patch: NotePatch::changes(&note, &target),
        };
        let updated = edit_note(&store, &author, &explicit).await.unwrap();
        assert_eq!(updated.note_category.as_deref(), Some("General"));
        assert_eq!(updated.fields, CategoryFields::default());
        assert_eq!(updated.text, "Retensioned");
    }

    #[tokio::test]
    async fn test_edit_missing_note() {
        let store = MemoryNoteStore::default();
        let err = edit_note(&store, &caller("u1", &["COMPANY_ADMIN"]), &edit("ghost", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Note not modified"));
    }

    #[tokio::test]
    async fn test_remove_requires_permission() {
        let store = MemoryNoteStore::default();
        let note = add_note(&store, &caller("user00000001", &[]), &payload("keep"))
            .await
            .unwrap();

        let err = remove_note(&store, &caller("user00000002", &[]), &note.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref m) if m == "Note not removed"));

        remove_note(&store, &caller("user00000001", &[]), &note.id)
            .await
            .unwrap();
        assert!(list_notes(&store, &caller("user00000001", &[]))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_list_sorted_newest_first_across_owners() {
        let store = MemoryNoteStore::default();
        for (owner, id, created_on) in [
            ("asset0000000", "old", 100),
            ("agent0000000", "new", 300),
            ("asset0000000", "mid", 200),
            ("elsewhere", "hidden", 400),
        ] {
            let note: Note = serde_json::from_value(json!({
                "_id": id, "text": id, "created_on": created_on
            }))
            .unwrap();
            store.insert(owner, &note).await.unwrap();
        }

        let ids: Vec<String> = list_notes(&store, &caller("u1", &[]))
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_import_requires_manager() {
        let store = MemoryNoteStore::default();
        let err = import_notes(&store, &caller("u1", &[]), vec![json!({"text": "x"})])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_import_skips_existing_and_malformed() {
        let store = MemoryNoteStore::default();
        let manager = caller("u1", &["COMPANY_ADMIN"]);
        let existing = add_note(&store, &manager, &payload("present")).await.unwrap();

        let summary = import_notes(
            &store,
            &manager,
            vec![
                serde_json::to_value(&existing).unwrap(),
                json!({"text": "fresh", "note_category": "General"}),
                json!({"_id": "kept-id", "text": "with id", "created_on": 5}),
                json!({"subject": "no text"}),
                json!("not an object"),
            ],
        )
        .await
        .unwrap();

        assert_eq!(summary, ImportSummary { imported: 2, skipped: 3 });
        let notes = list_notes(&store, &manager).await.unwrap();
        assert_eq!(notes.len(), 3);
        assert!(notes.iter().any(|n| n.id == "kept-id" && n.created_on == 5));
    }

    #[tokio::test]
    async fn test_import_copies_notes_owned_elsewhere() {
        let store = MemoryNoteStore::default();
        let foreign: Note = serde_json::from_value(json!({
            "_id": "n1", "text": "from asset A", "created_on": 10
        }))
        .unwrap();
        store.insert("assetA", &foreign).await.unwrap();

        let manager = caller("u1", &["MANAGE_AGENT"]);
        let summary = import_notes(
            &store,
            &manager,
            vec![serde_json::to_value(&foreign).unwrap()],
        )
        .await
        .unwrap();
        assert_eq!(summary, ImportSummary { imported: 1, skipped: 0 });

        let notes = list_notes(&store, &manager).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_ne!(notes[0].id, "n1");
        assert_eq!(notes[0].text, "from asset A");
        assert_eq!(notes[0].created_on, 10);
        assert!(store.find(&["assetA".to_string()], "n1").await.unwrap().is_some());

        let again = import_notes(&store, &manager, vec![serde_json::to_value(&notes[0]).unwrap()])
            .await
            .unwrap();
        assert_eq!(again, ImportSummary { imported: 0, skipped: 1 });
    }

    #[tokio::test]
    async fn test_export_bundle_metadata() {
        let store = MemoryNoteStore::default();
        let author = caller("u1", &[]);
        add_note(&store, &author, &payload("one")).await.unwrap();

        let bundle = export_notes(&store, &author).await.unwrap();
        assert_eq!(bundle.note_count, 1);
        assert_eq!(bundle.exported_by.as_deref(), Some("Test User"));
        assert_eq!(bundle.agent_or_asset_id.as_deref(), Some("asset0000000"));
        assert!(bundle.exported_on > 0);
    }
}
