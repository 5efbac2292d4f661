use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::logbook::codec::StackTuple;
use crate::models::stack::{
    deserialize_entries, StackInspection, StackInstall, StackReplacement, StackTensioning,
    STACK_IDS,
};

/// Fixed set of business categories a note can be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteCategory {
    Calibration,
    StackReplacements,
    StackInspections,
    StackTensioning,
    StackInstalls,
    SoftwareUpdate,
    ServiceWorkorder,
    General,
}

impl NoteCategory {
    pub const ALL: [NoteCategory; 8] = [
        NoteCategory::Calibration,
        NoteCategory::StackReplacements,
        NoteCategory::StackInspections,
        NoteCategory::StackTensioning,
        NoteCategory::StackInstalls,
        NoteCategory::SoftwareUpdate,
        NoteCategory::ServiceWorkorder,
        NoteCategory::General,
    ];

    /// Stored name, as written into `note_category`.
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteCategory::Calibration => "Calibration",
            NoteCategory::StackReplacements => "Stack replacements",
            NoteCategory::StackInspections => "Stack inspections",
            NoteCategory::StackTensioning => "Stack tensioning",
            NoteCategory::StackInstalls => "Stack installs",
            NoteCategory::SoftwareUpdate => "Software update",
            NoteCategory::ServiceWorkorder => "Service workorder",
            NoteCategory::General => "General",
        }
    }

    /// Label shown to users. Only differs from the stored name where the
    /// internal name reads poorly.
    pub fn display_label(&self) -> &'static str {
        match self {
            NoteCategory::ServiceWorkorder => "Service visit",
            other => other.as_str(),
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(name))
    }

    pub fn has_stack_entries(&self) -> bool {
        matches!(
            self,
            NoteCategory::StackReplacements
                | NoteCategory::StackInspections
                | NoteCategory::StackTensioning
                | NoteCategory::StackInstalls
        )
    }
}

impl std::fmt::Display for NoteCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category-specific payload. Each field belongs to exactly one
/// [`NoteCategory`]; see [`CategoryFields::owned_by`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_numbers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workorder_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_entries",
        skip_serializing_if = "Option::is_none"
    )]
    pub stack_replacements: Option<Vec<StackReplacement>>,
    #[serde(
        default,
        deserialize_with = "deserialize_entries",
        skip_serializing_if = "Option::is_none"
    )]
    pub stack_inspections: Option<Vec<StackInspection>>,
    #[serde(
        default,
        deserialize_with = "deserialize_entries",
        skip_serializing_if = "Option::is_none"
    )]
    pub stack_tensioning: Option<Vec<StackTensioning>>,
    #[serde(
        default,
        deserialize_with = "deserialize_entries",
        skip_serializing_if = "Option::is_none"
    )]
    pub stack_installs: Option<Vec<StackInstall>>,
}

impl CategoryFields {
    /// Names of the fields currently set.
    pub fn present(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.tag_numbers.is_some() {
            names.push("tag_numbers");
        }
        if self.software_version.is_some() {
            names.push("software_version");
        }
        if self.software_type.is_some() {
            names.push("software_type");
        }
        if self.workorder_id.is_some() {
            names.push("workorder_id");
        }
        if self.stack_replacements.is_some() {
            names.push("stack_replacements");
        }
        if self.stack_inspections.is_some() {
            names.push("stack_inspections");
        }
        if self.stack_tensioning.is_some() {
            names.push("stack_tensioning");
        }
        if self.stack_installs.is_some() {
            names.push("stack_installs");
        }
        names
    }

    /// Field names owned by a category.
    pub fn owned_by(category: NoteCategory) -> &'static [&'static str] {
        match category {
            NoteCategory::Calibration => &["tag_numbers"],
            NoteCategory::StackReplacements => &["stack_replacements"],
            NoteCategory::StackInspections => &["stack_inspections"],
            NoteCategory::StackTensioning => &["stack_tensioning"],
            NoteCategory::StackInstalls => &["stack_installs"],
            NoteCategory::SoftwareUpdate => &["software_version", "software_type"],
            NoteCategory::ServiceWorkorder => &["workorder_id"],
            NoteCategory::General => &[],
        }
    }

    /// Nulls every field owned by `category`.
    pub fn clear_for(&mut self, category: NoteCategory) {
        match category {
            NoteCategory::Calibration => self.tag_numbers = None,
            NoteCategory::StackReplacements => self.stack_replacements = None,
            NoteCategory::StackInspections => self.stack_inspections = None,
            NoteCategory::StackTensioning => self.stack_tensioning = None,
            NoteCategory::StackInstalls => self.stack_installs = None,
            NoteCategory::SoftwareUpdate => {
                self.software_version = None;
                self.software_type = None;
            }
            NoteCategory::ServiceWorkorder => self.workorder_id = None,
            NoteCategory::General => {}
        }
    }

    /// Stack identifiers of every structured entry present.
    fn stack_identifiers(&self) -> impl Iterator<Item = &str> {
        let replacements = self.stack_replacements.iter().flatten().map(|e| e.identifier.as_str());
        let inspections = self.stack_inspections.iter().flatten().map(|e| e.identifier.as_str());
        let tensioning = self.stack_tensioning.iter().flatten().map(|e| e.identifier.as_str());
        let installs = self.stack_installs.iter().flatten().map(|e| e.identifier.as_str());
        replacements.chain(inspections).chain(tensioning).chain(installs)
    }

    fn stack_entry_count(&self, category: NoteCategory) -> usize {
        match category {
            NoteCategory::StackReplacements => self.stack_replacements.as_ref().map_or(0, Vec::len),
            NoteCategory::StackInspections => self.stack_inspections.as_ref().map_or(0, Vec::len),
            NoteCategory::StackTensioning => self.stack_tensioning.as_ref().map_or(0, Vec::len),
            NoteCategory::StackInstalls => self.stack_installs.as_ref().map_or(0, Vec::len),
            _ => 0,
        }
    }
}

/// A persisted logbook entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    /// Single-author field written by older clients.
    #[serde(default)]
    pub user: Option<String>,
    pub text: String,
    pub created_on: i64,

    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,

    #[serde(default)]
    pub editor_id: Option<String>,
    #[serde(default)]
    pub editor_name: Option<String>,
    #[serde(default)]
    pub updated_on: Option<i64>,

    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, alias = "category")]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub note_category: Option<String>,
    #[serde(default)]
    pub external: bool,

    #[serde(flatten)]
    pub fields: CategoryFields,
}

impl Note {
    pub fn category(&self) -> Option<NoteCategory> {
        self.note_category.as_deref().and_then(NoteCategory::parse)
    }

    /// Moves the note to another business category, dropping every field that
    /// belonged to the previous one.
    pub fn recategorize(&mut self, category: Option<NoteCategory>) {
        if let Some(previous) = self.category() {
            if Some(previous) != category {
                self.fields.clear_for(previous);
            }
        }
        self.note_category = category.map(|c| c.as_str().to_string());
    }

    /// The user-editable part of the note.
    pub fn payload(&self) -> NotePayload {
        NotePayload {
            text: self.text.clone(),
            subject: self.subject.clone(),
            category_id: self.category_id,
            note_category: self.note_category.clone(),
            external: self.external,
            fields: self.fields.clone(),
        }
    }

    /// Merges the keys present in `patch`; everything else is left as stored.
    pub fn merge(&mut self, patch: &NotePatch) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut self.text, &patch.text);
        set(&mut self.subject, &patch.subject);
        set(&mut self.category_id, &patch.category_id);
        set(&mut self.note_category, &patch.note_category);
        set(&mut self.external, &patch.external);

        let fields = &mut self.fields;
        set(&mut fields.tag_numbers, &patch.tag_numbers);
        set(&mut fields.software_version, &patch.software_version);
        set(&mut fields.software_type, &patch.software_type);
        set(&mut fields.workorder_id, &patch.workorder_id);
        set(&mut fields.stack_replacements, &patch.stack_replacements);
        set(&mut fields.stack_inspections, &patch.stack_inspections);
        set(&mut fields.stack_tensioning, &patch.stack_tensioning);
        set(&mut fields.stack_installs, &patch.stack_installs);
    }

    /// Overwrites the user-editable fields with a payload.
    pub fn apply(&mut self, payload: &NotePayload) {
        self.text = payload.text.clone();
        self.subject = payload.subject.clone();
        self.category_id = payload.category_id;
        self.note_category = payload.note_category.clone();
        self.external = payload.external;
        self.fields = payload.fields.clone();
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Unknown note category '{0}'")]
    UnknownCategory(String),

    #[error("Field '{field}' does not belong to category '{category}'")]
    FieldNotAllowed {
        field: &'static str,
        category: String,
    },

    #[error("At least one stack entry is required for '{0}'")]
    MissingStackEntries(NoteCategory),

    #[error("Unknown stack identifier '{0}'")]
    UnknownStack(String),
}

/// The user-editable part of a note, as sent with `notes.add`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotePayload {
    pub text: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, alias = "category")]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub note_category: Option<String>,
    #[serde(default)]
    pub external: bool,
    #[serde(flatten)]
    pub fields: CategoryFields,
}

impl NotePayload {
    /// Checks that only fields owned by the chosen category are set and that
    /// structured fields carry at least one known stack entry.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let category = match self.note_category.as_deref() {
            Some(name) => Some(
                NoteCategory::parse(name)
                    .ok_or_else(|| ValidationError::UnknownCategory(name.to_string()))?,
            ),
            None => None,
        };

        let allowed = category.map_or(&[][..], CategoryFields::owned_by);
        if let Some(field) = self.fields.present().into_iter().find(|f| !allowed.contains(f)) {
            return Err(ValidationError::FieldNotAllowed {
                field,
                category: self
                    .note_category
                    .clone()
                    .unwrap_or_else(|| "none".to_string()),
            });
        }

        if let Some(category) = category.filter(NoteCategory::has_stack_entries) {
            if self.fields.stack_entry_count(category) == 0 {
                return Err(ValidationError::MissingStackEntries(category));
            }
        }

        if let Some(unknown) = self.fields.stack_identifiers().find(|id| !STACK_IDS.contains(id)) {
            return Err(ValidationError::UnknownStack(unknown.to_string()));
        }

        Ok(())
    }
}

/// Present key with any value, `null` included.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn present_entries<'de, D, T>(deserializer: D) -> Result<Option<Option<Vec<T>>>, D::Error>
where
    D: Deserializer<'de>,
    T: StackTuple + Deserialize<'de>,
{
    deserialize_entries(deserializer).map(Some)
}

/// Partial update sent with `notes.edit`.
///
/// An absent key keeps the stored value. For nullable fields `Some(None)` is an
/// explicit `null` and clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub subject: Option<Option<String>>,
    #[serde(
        default,
        alias = "category",
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub category_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub note_category: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<bool>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub tag_numbers: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub software_version: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub software_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub workorder_id: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "present_entries",
        skip_serializing_if = "Option::is_none"
    )]
    pub stack_replacements: Option<Option<Vec<StackReplacement>>>,
    #[serde(
        default,
        deserialize_with = "present_entries",
        skip_serializing_if = "Option::is_none"
    )]
    pub stack_inspections: Option<Option<Vec<StackInspection>>>,
    #[serde(
        default,
        deserialize_with = "present_entries",
        skip_serializing_if = "Option::is_none"
    )]
    pub stack_tensioning: Option<Option<Vec<StackTensioning>>>,
    #[serde(
        default,
        deserialize_with = "present_entries",
        skip_serializing_if = "Option::is_none"
    )]
    pub stack_installs: Option<Option<Vec<StackInstall>>>,
}

impl NotePatch {
    /// The keys whose value differs between `note` and `target`. Fields the
    /// target drops come out as explicit nulls.
    pub fn changes(note: &Note, target: &NotePayload) -> Self {
        fn diff<T: Clone + PartialEq>(current: &T, next: &T) -> Option<T> {
            (current != next).then(|| next.clone())
        }

        let (old, new) = (&note.fields, &target.fields);
        NotePatch {
            text: diff(&note.text, &target.text),
            subject: diff(&note.subject, &target.subject),
            category_id: diff(&note.category_id, &target.category_id),
            note_category: diff(&note.note_category, &target.note_category),
            external: diff(&note.external, &target.external),
            tag_numbers: diff(&old.tag_numbers, &new.tag_numbers),
            software_version: diff(&old.software_version, &new.software_version),
            software_type: diff(&old.software_type, &new.software_type),
            workorder_id: diff(&old.workorder_id, &new.workorder_id),
            stack_replacements: diff(&old.stack_replacements, &new.stack_replacements),
            stack_inspections: diff(&old.stack_inspections, &new.stack_inspections),
            stack_tensioning: diff(&old.stack_tensioning, &new.stack_tensioning),
            stack_installs: diff(&old.stack_installs, &new.stack_installs),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == NotePatch::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteEdit {
    pub note_id: String,
    #[serde(flatten)]
    pub patch: NotePatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteRemove {
    pub note_id: String,
}
