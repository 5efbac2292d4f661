//! Turns what an add/edit dialog collected into a [`NotePayload`].
//!
//! Only the fields owned by the selected business category are copied over.
//! Stack rows are limited to the stacks the asset actually has and to rows
//! with content.

use serde::{Deserialize, Serialize};

use crate::logbook::codec::select_entries;
use crate::logbook::projection::CategoryMap;
use crate::logbook::stack_count::StackCountResolver;
use crate::models::note::{CategoryFields, Note, NoteCategory, NotePayload, ValidationError};
use crate::models::stack::{StackInspection, StackInstall, StackReplacement, StackTensioning};

/// Raw dialog values. Anything not relevant to `note_category` is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoteForm {
    pub text: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub note_category: Option<String>,
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub tag_numbers: Vec<String>,
    #[serde(default)]
    pub software_version: Option<String>,
    #[serde(default)]
    pub software_type: Option<String>,
    #[serde(default)]
    pub workorder_id: Option<String>,
    #[serde(default)]
    pub stack_replacements: Vec<StackReplacement>,
    #[serde(default)]
    pub stack_inspections: Vec<StackInspection>,
    #[serde(default)]
    pub stack_tensioning: Vec<StackTensioning>,
    #[serde(default)]
    pub stack_installs: Vec<StackInstall>,
}

/// Lookups a form needs: the category map and the asset it is filed against.
#[derive(Debug, Clone, Default)]
pub struct FormContext {
    pub categories: CategoryMap,
    pub stack_counts: StackCountResolver,
    pub asset_name: Option<String>,
}

impl FormContext {
    pub fn stack_count(&self) -> usize {
        self.stack_counts.resolve(self.asset_name.as_deref())
    }
}

pub fn build_payload(form: &NoteForm, ctx: &FormContext) -> Result<NotePayload, ValidationError> {
    let category = match form.note_category.as_deref().map(str::trim) {
        Some("") | None => None,
        Some(name) => Some(
            NoteCategory::parse(name).ok_or_else(|| ValidationError::UnknownCategory(name.to_string()))?,
        ),
    };

    let category_id = form.category_id.or_else(|| {
        category.and_then(|c| ctx.categories.id_for_name(c.as_str()))
    });

    let fields = match category {
        Some(category) => category_fields(form, category, ctx.stack_count())?,
        None => CategoryFields::default(),
    };

    let payload = NotePayload {
        text: form.text.clone(),
        subject: form.subject.clone().filter(|s| !s.trim().is_empty()),
        category_id,
        note_category: category.map(|c| c.as_str().to_string()),
        external: form.external,
        fields,
    };
    payload.validate()?;
    Ok(payload)
}

/// Starting form for editing an existing note.
pub fn form_from_note(note: &Note) -> NoteForm {
    let fields = &note.fields;
    NoteForm {
        text: note.text.clone(),
        subject: note.subject.clone(),
        category_id: note.category_id,
        note_category: note.note_category.clone(),
        external: note.external,
        tag_numbers: fields.tag_numbers.clone().unwrap_or_default(),
        software_version: fields.software_version.clone(),
        software_type: fields.software_type.clone(),
        workorder_id: fields.workorder_id.clone(),
        stack_replacements: fields.stack_replacements.clone().unwrap_or_default(),
        stack_inspections: fields.stack_inspections.clone().unwrap_or_default(),
        stack_tensioning: fields.stack_tensioning.clone().unwrap_or_default(),
        stack_installs: fields.stack_installs.clone().unwrap_or_default(),
    }
}

/// Payload for moving an existing note to another category. Fields owned by
/// the previous category are dropped; the new category's fields come from
/// `form`.
pub fn recategorize_payload(
    note: &Note,
    category: Option<NoteCategory>,
    form: &NoteForm,
    ctx: &FormContext,
) -> Result<NotePayload, ValidationError> {
    let mut moved = note.clone();
    moved.recategorize(category);

    let mut next = form_from_note(&moved);
    next.note_category = category.map(|c| c.as_str().to_string());
    next.category_id = category.and_then(|c| ctx.categories.id_for_name(c.as_str()));
    next.tag_numbers = form.tag_numbers.clone();
    next.software_version = form.software_version.clone();
    next.software_type = form.software_type.clone();
    next.workorder_id = form.workorder_id.clone();
    next.stack_replacements = form.stack_replacements.clone();
    next.stack_inspections = form.stack_inspections.clone();
    next.stack_tensioning = form.stack_tensioning.clone();
    next.stack_installs = form.stack_installs.clone();

    build_payload(&next, ctx)
}

fn category_fields(
    form: &NoteForm,
    category: NoteCategory,
    stack_count: usize,
) -> Result<CategoryFields, ValidationError> {
    let mut fields = CategoryFields::default();
    match category {
        NoteCategory::Calibration => {
            let tags: Vec<String> = form
                .tag_numbers
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            fields.tag_numbers = (!tags.is_empty()).then_some(tags);
        }
        NoteCategory::StackReplacements => {
            fields.stack_replacements =
                Some(required(select_entries(&form.stack_replacements, stack_count), category)?);
        }
        NoteCategory::StackInspections => {
            fields.stack_inspections =
                Some(required(select_entries(&form.stack_inspections, stack_count), category)?);
        }
        NoteCategory::StackTensioning => {
            fields.stack_tensioning =
                Some(required(select_entries(&form.stack_tensioning, stack_count), category)?);
        }
        NoteCategory::StackInstalls => {
            fields.stack_installs =
                Some(required(select_entries(&form.stack_installs, stack_count), category)?);
        }
        NoteCategory::SoftwareUpdate => {
            fields.software_version = non_blank(&form.software_version);
            fields.software_type = non_blank(&form.software_type);
        }
        NoteCategory::ServiceWorkorder => {
            fields.workorder_id = non_blank(&form.workorder_id);
        }
        NoteCategory::General => {}
    }
    Ok(fields)
}

fn required<T>(entries: Vec<T>, category: NoteCategory) -> Result<Vec<T>, ValidationError> {
    if entries.is_empty() {
        Err(ValidationError::MissingStackEntries(category))
    } else {
        Ok(entries)
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logbook::projection::CategoryConfig;

    fn ctx(asset_name: &str) -> FormContext {
        FormContext {
            categories: CategoryMap::new(vec![
                CategoryConfig {
                    id: 10,
                    name: "Calibration".into(),
                    color: None,
                },
                CategoryConfig {
                    id: 20,
                    name: "Stack replacements".into(),
                    color: None,
                },
            ]),
            stack_counts: StackCountResolver::default(),
            asset_name: Some(asset_name.to_string()),
        }
    }

    fn replacement(id: &str, removed: &str) -> StackReplacement {
        StackReplacement {
            identifier: id.into(),
            removed: removed.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_only_owned_fields_are_copied() {
        let form = NoteForm {
            text: "Calibrated".into(),
            note_category: Some("Calibration".into()),
            tag_numbers: vec!["T1".into(), " ".into(), "T2".into()],
            workorder_id: Some("WO-9".into()),
            software_version: Some("1.0".into()),
            ..Default::default()
        };
        let payload = build_payload(&form, &ctx("Plant")).unwrap();

        assert_eq!(payload.category_id, Some(10));
        assert_eq!(payload.fields.tag_numbers, Some(vec!["T1".to_string(), "T2".to_string()]));
        assert_eq!(payload.fields.workorder_id, None);
        assert_eq!(payload.fields.software_version, None);
    }

    #[test]
    fn test_explicit_category_id_wins() {
        let form = NoteForm {
            text: "x".into(),
            category_id: Some(99),
            note_category: Some("Calibration".into()),
            ..Default::default()
        };
        assert_eq!(build_payload(&form, &ctx("Plant")).unwrap().category_id, Some(99));
    }

    #[test]
    fn test_stack_rows_limited_to_stack_count() {
        let form = NoteForm {
            text: "Swapped".into(),
            note_category: Some("Stack replacements".into()),
            stack_replacements: vec![
                replacement("a", "S1"),
                replacement("b", ""),
                replacement("c", "S3"),
            ],
            ..Default::default()
        };

        let twin = build_payload(&form, &ctx("Unit Twin")).unwrap();
        assert_eq!(twin.fields.stack_replacements, Some(vec![replacement("a", "S1")]));

        let full = build_payload(&form, &ctx("Plant")).unwrap();
        assert_eq!(
            full.fields.stack_replacements,
            Some(vec![replacement("a", "S1"), replacement("c", "S3")])
        );
    }

    #[test]
    fn test_zero_stack_rows_rejected() {
        let form = NoteForm {
            text: "Swapped".into(),
            note_category: Some("Stack replacements".into()),
            stack_replacements: vec![replacement("a", ""), replacement("d", "S4")],
            ..Default::default()
        };
        assert_eq!(
            build_payload(&form, &ctx("single stack")),
            Err(ValidationError::MissingStackEntries(NoteCategory::StackReplacements))
        );
    }

    #[test]
    fn test_unknown_category_rejected() {
        let form = NoteForm {
            text: "x".into(),
            note_category: Some("Painting".into()),
            ..Default::default()
        };
        assert_eq!(
            build_payload(&form, &ctx("Plant")),
            Err(ValidationError::UnknownCategory("Painting".into()))
        );
    }

    #[test]
    fn test_recategorize_drops_previous_fields() {
        let note: Note = serde_json::from_value(serde_json::json!({
            "_id": "n1", "text": "Calibrated", "created_on": 1,
            "category_id": 10, "note_category": "Calibration", "tag_numbers": ["T1"]
        }))
        .unwrap();
        let form = NoteForm {
            stack_replacements: vec![replacement("b", "S2")],
            ..Default::default()
        };

        let payload =
            recategorize_payload(&note, Some(NoteCategory::StackReplacements), &form, &ctx("Plant")).unwrap();

        assert_eq!(payload.text, "Calibrated");
        assert_eq!(payload.category_id, Some(20));
        assert_eq!(payload.note_category.as_deref(), Some("Stack replacements"));
        assert_eq!(payload.fields.tag_numbers, None);
        assert_eq!(payload.fields.stack_replacements, Some(vec![replacement("b", "S2")]));
    }

    #[test]
    fn test_form_round_trips_existing_note() {
        let note: Note = serde_json::from_value(serde_json::json!({
            "_id": "n1", "text": "Firmware", "created_on": 1, "subject": "FW",
            "note_category": "Software update", "software_version": "2.0", "software_type": "PLC"
        }))
        .unwrap();
        let payload = build_payload(&form_from_note(&note), &FormContext::default()).unwrap();
        assert_eq!(payload.fields.software_version.as_deref(), Some("2.0"));
        assert_eq!(payload.subject.as_deref(), Some("FW"));
    }
}
