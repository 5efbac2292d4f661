use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::logbook::render::{plain_text, render_body};
use crate::models::note::{Note, NoteCategory};

pub const UNKNOWN_USER: &str = "Unknown user";
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// Numeric category id → display name/colour, loaded once from configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryMap {
    categories: Vec<CategoryConfig>,
}

impl CategoryMap {
    pub fn new(categories: Vec<CategoryConfig>) -> Self {
        Self { categories }
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(raw)?))
    }

    pub fn get(&self, id: i64) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn id_for_name(&self, name: &str) -> Option<i64> {
        self.categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
            .map(|c| c.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategoryConfig> {
        self.categories.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Public user id → display name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserDirectory {
    names: HashMap<String, String>,
}

impl UserDirectory {
    pub fn new(names: HashMap<String, String>) -> Self {
        Self { names }
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(raw)?))
    }

    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }
}

/// Read-only lookups needed to turn a stored note into its display form.
#[derive(Debug, Clone, Default)]
pub struct ProjectionContext {
    pub categories: CategoryMap,
    pub users: UserDirectory,
}

/// A note together with everything derived from it for display and search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedNote {
    pub note: Note,
    pub body_html: String,
    pub body_text: String,
    pub author_name: String,
    pub editor_name: String,
    pub category_label: String,
    pub category_color: Option<String>,
}

pub fn project_note(note: &Note, ctx: &ProjectionContext) -> ProjectedNote {
    let body_html = render_body(&note.text);
    let body_text = plain_text(&body_html);
    let (category_label, category_color) = resolve_category(note, &ctx.categories);

    ProjectedNote {
        author_name: resolve_author(note, &ctx.users),
        editor_name: resolve_editor(note, &ctx.users),
        body_html,
        body_text,
        category_label,
        category_color,
        note: note.clone(),
    }
}

pub fn project_all(notes: &[Note], ctx: &ProjectionContext) -> Vec<ProjectedNote> {
    notes.iter().map(|n| project_note(n, ctx)).collect()
}

/// Directory lookup, then the embedded snapshot, then the legacy `user`
/// field, then a placeholder.
pub fn resolve_author(note: &Note, users: &UserDirectory) -> String {
    note.author_id
        .as_deref()
        .and_then(|id| users.name_of(id))
        .or(note.author_name.as_deref())
        .or_else(|| note.user.as_deref().map(|u| users.name_of(u).unwrap_or(u)))
        .unwrap_or(UNKNOWN_USER)
        .to_string()
}

/// Same precedence as the author, minus the legacy field; empty when the note
/// was never edited.
pub fn resolve_editor(note: &Note, users: &UserDirectory) -> String {
    note.editor_id
        .as_deref()
        .and_then(|id| users.name_of(id))
        .or(note.editor_name.as_deref())
        .unwrap_or_default()
        .to_string()
}

fn resolve_category(note: &Note, categories: &CategoryMap) -> (String, Option<String>) {
    let color = note
        .category_id
        .and_then(|id| categories.get(id))
        .and_then(|c| c.color.clone());

    if let Some(name) = note.note_category.as_deref().filter(|n| !n.trim().is_empty()) {
        let label = NoteCategory::parse(name)
            .map(|c| c.display_label().to_string())
            .unwrap_or_else(|| name.to_string());
        return (label, color);
    }

    match note.category_id.and_then(|id| categories.get(id)) {
        Some(category) => (category.name.clone(), color),
        None => (UNCATEGORIZED.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> ProjectionContext {
        ProjectionContext {
            categories: CategoryMap::new(vec![
                CategoryConfig {
                    id: 1,
                    name: "Calibration".into(),
                    color: Some("#00aa00".into()),
                },
                CategoryConfig {
                    id: 2,
                    name: "Inspection".into(),
                    color: None,
                },
            ]),
            users: UserDirectory::new(HashMap::from([("u1".to_string(), "Dana Ruiz".to_string())])),
        }
    }

    fn note(value: serde_json::Value) -> Note {
        let mut base = json!({"_id": "n", "text": "body", "created_on": 0});
        if let (Some(base), Some(extra)) = (base.as_object_mut(), value.as_object()) {
            base.extend(extra.clone());
        }
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn test_author_prefers_directory() {
        let n = note(json!({"author_id": "u1", "author_name": "Old Name"}));
        assert_eq!(project_note(&n, &ctx()).author_name, "Dana Ruiz");
    }

    #[test]
    fn test_author_falls_back_to_snapshot_then_legacy_then_placeholder() {
        let ctx = ctx();
        let n = note(json!({"author_id": "u9", "author_name": "Snapshot"}));
        assert_eq!(resolve_author(&n, &ctx.users), "Snapshot");

        let n = note(json!({"user": "u1"}));
        assert_eq!(resolve_author(&n, &ctx.users), "Dana Ruiz");

        let n = note(json!({"user": "legacy42"}));
        assert_eq!(resolve_author(&n, &ctx.users), "legacy42");

        let n = note(json!({}));
        assert_eq!(resolve_author(&n, &ctx.users), UNKNOWN_USER);
    }

    #[test]
    fn test_editor_empty_when_absent() {
        let ctx = ctx();
        assert_eq!(resolve_editor(&note(json!({})), &ctx.users), "");
        assert_eq!(
            resolve_editor(&note(json!({"editor_id": "u1"})), &ctx.users),
            "Dana Ruiz"
        );
    }

    #[test]
    fn test_category_label_resolution() {
        let ctx = ctx();
        let by_name = project_note(&note(json!({"note_category": "Service workorder", "category_id": 2})), &ctx);
        assert_eq!(by_name.category_label, "Service visit");

        let by_id = project_note(&note(json!({"category_id": 1})), &ctx);
        assert_eq!(by_id.category_label, "Calibration");
        assert_eq!(by_id.category_color.as_deref(), Some("#00aa00"));

        let unknown_id = project_note(&note(json!({"category_id": 77})), &ctx);
        assert_eq!(unknown_id.category_label, UNCATEGORIZED);

        let none = project_note(&note(json!({})), &ctx);
        assert_eq!(none.category_label, UNCATEGORIZED);
    }

    #[test]
    fn test_body_projection() {
        let projected = project_note(&note(json!({"text": "Swapped *fan* on stack c"})), &ctx());
        assert_eq!(projected.body_html.trim(), "<p>Swapped <em>fan</em> on stack c</p>");
        assert_eq!(projected.body_text, "Swapped fan on stack c");
    }

    #[test]
    fn test_category_map_name_lookup() {
        assert_eq!(ctx().categories.id_for_name(" calibration "), Some(1));
        assert_eq!(ctx().categories.id_for_name("Other"), None);
    }
}
