use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use crate::errors::AppError;
use crate::models::note::{CategoryFields, Note};
use crate::notes::store::NoteStore;

const SELECT_COLUMNS: &str = "id, user_id, text, created_on, author_id, author_name, \
     editor_id, editor_name, updated_on, subject, category_id, note_category, external, fields";

#[derive(Debug, FromRow)]
struct NoteRow {
    id: String,
    user_id: Option<String>,
    text: String,
    created_on: i64,
    author_id: Option<String>,
    author_name: Option<String>,
    editor_id: Option<String>,
    editor_name: Option<String>,
    updated_on: Option<i64>,
    subject: Option<String>,
    category_id: Option<i64>,
    note_category: Option<String>,
    external: bool,
    fields: Json<CategoryFields>,
}

impl From<NoteRow> for Note {
    fn from(row: NoteRow) -> Self {
        Note {
            id: row.id,
            user: row.user_id,
            text: row.text,
            created_on: row.created_on,
            author_id: row.author_id,
            author_name: row.author_name,
            editor_id: row.editor_id,
            editor_name: row.editor_name,
            updated_on: row.updated_on,
            subject: row.subject,
            category_id: row.category_id,
            note_category: row.note_category,
            external: row.external,
            fields: row.fields.0,
        }
    }
}

/// PostgreSQL-backed note store. One row per note, category-specific fields
/// in a JSONB column.
#[derive(Clone)]
pub struct PgNoteStore {
    pool: PgPool,
}

impl PgNoteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NoteStore for PgNoteStore {
    async fn list(&self, owner_ids: &[String]) -> Result<Vec<Note>, AppError> {
        let rows = sqlx::query_as::<_, NoteRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM notes WHERE owner_id = ANY($1)"
        ))
        .bind(owner_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Note::from).collect())
    }

    async fn find(&self, owner_ids: &[String], note_id: &str) -> Result<Option<Note>, AppError> {
        let row = sqlx::query_as::<_, NoteRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM notes WHERE id = $1 AND owner_id = ANY($2)"
        ))
        .bind(note_id)
        .bind(owner_ids)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Note::from))
    }

    async fn exists(&self, note_id: &str) -> Result<bool, AppError> {
        let found: Option<(String,)> = sqlx::query_as("SELECT id FROM notes WHERE id = $1")
            .bind(note_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn insert(&self, owner_id: &str, note: &Note) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO notes
                (id, owner_id, user_id, text, created_on, author_id, author_name,
                 editor_id, editor_name, updated_on, subject, category_id,
                 note_category, external, fields)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&note.id)
        .bind(owner_id)
        .bind(&note.user)
        .bind(&note.text)
        .bind(note.created_on)
        .bind(&note.author_id)
        .bind(&note.author_name)
        .bind(&note.editor_id)
        .bind(&note.editor_name)
        .bind(note.updated_on)
        .bind(&note.subject)
        .bind(note.category_id)
        .bind(&note.note_category)
        .bind(note.external)
        .bind(Json(&note.fields))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update(&self, owner_ids: &[String], note: &Note) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notes SET
                text = $1, subject = $2, category_id = $3, note_category = $4,
                external = $5, fields = $6, editor_id = $7, editor_name = $8,
                updated_on = $9
            WHERE id = $10 AND owner_id = ANY($11)
            "#,
        )
        .bind(&note.text)
        .bind(&note.subject)
        .bind(note.category_id)
        .bind(&note.note_category)
        .bind(note.external)
        .bind(Json(&note.fields))
        .bind(&note.editor_id)
        .bind(&note.editor_name)
        .bind(note.updated_on)
        .bind(&note.id)
        .bind(owner_ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, owner_ids: &[String], note_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1 AND owner_id = ANY($2)")
            .bind(note_id)
            .bind(owner_ids)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
