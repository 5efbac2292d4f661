use serde::{Deserialize, Deserializer, Serialize};

use crate::logbook::codec::{self, StackTuple};

/// Physical stack identifiers, in the order the codec and the forms walk them.
pub const STACK_IDS: [&str; 5] = ["a", "b", "c", "d", "e"];

pub const MAX_STACKS: usize = STACK_IDS.len();

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackReplacement {
    pub identifier: String,
    #[serde(default)]
    pub removed: String,
    #[serde(default)]
    pub added: String,
    #[serde(default)]
    pub symptom: String,
    #[serde(default)]
    pub confirmed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackInspection {
    pub identifier: String,
    #[serde(default)]
    pub symptom: String,
    #[serde(default)]
    pub insight: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackTensioning {
    pub identifier: String,
    #[serde(default)]
    pub torque: String,
    #[serde(default)]
    pub retensioned: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackInstall {
    pub identifier: String,
    #[serde(default)]
    pub serial: String,
}

impl StackTuple for StackReplacement {
    // (removed, added, symptom, confirmed), then the pre-confirmation shape.
    const SHAPES: &'static [usize] = &[4, 3];

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn sub_values(&self) -> Vec<String> {
        vec![
            self.removed.clone(),
            self.added.clone(),
            self.symptom.clone(),
            codec::encode_flag(self.confirmed).to_string(),
        ]
    }

    fn from_sub_values(identifier: &str, values: &[&str]) -> Option<Self> {
        let confirmed = match values.get(3) {
            Some(flag) => codec::decode_flag(flag)?,
            None => false,
        };
        match values {
            [removed, added, symptom, ..] => Some(Self {
                identifier: identifier.to_string(),
                removed: removed.to_string(),
                added: added.to_string(),
                symptom: symptom.to_string(),
                confirmed,
            }),
            _ => None,
        }
    }

    fn has_content(&self) -> bool {
        !self.removed.is_empty()
            || !self.added.is_empty()
            || !self.symptom.is_empty()
            || self.confirmed
    }
}

impl StackTuple for StackInspection {
    const SHAPES: &'static [usize] = &[2];

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn sub_values(&self) -> Vec<String> {
        vec![self.symptom.clone(), self.insight.clone()]
    }

    fn from_sub_values(identifier: &str, values: &[&str]) -> Option<Self> {
        match values {
            [symptom, insight] => Some(Self {
                identifier: identifier.to_string(),
                symptom: symptom.to_string(),
                insight: insight.to_string(),
            }),
            _ => None,
        }
    }

    fn has_content(&self) -> bool {
        !self.symptom.is_empty() || !self.insight.is_empty()
    }
}

impl StackTuple for StackTensioning {
    // (torque, retensioned), then torque only.
    const SHAPES: &'static [usize] = &[2, 1];

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn sub_values(&self) -> Vec<String> {
        vec![
            self.torque.clone(),
            codec::encode_flag(self.retensioned).to_string(),
        ]
    }

    fn from_sub_values(identifier: &str, values: &[&str]) -> Option<Self> {
        let retensioned = match values.get(1) {
            Some(flag) => codec::decode_flag(flag)?,
            None => false,
        };
        let torque = values.first()?;
        Some(Self {
            identifier: identifier.to_string(),
            torque: torque.to_string(),
            retensioned,
        })
    }

    fn has_content(&self) -> bool {
        !self.torque.is_empty() || self.retensioned
    }
}

impl StackTuple for StackInstall {
    const SHAPES: &'static [usize] = &[1];

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn sub_values(&self) -> Vec<String> {
        vec![self.serial.clone()]
    }

    fn from_sub_values(identifier: &str, values: &[&str]) -> Option<Self> {
        match values {
            [serial] => Some(Self {
                identifier: identifier.to_string(),
                serial: serial.to_string(),
            }),
            _ => None,
        }
    }

    fn has_content(&self) -> bool {
        !self.serial.is_empty()
    }
}

/// Accepts a structured multi-entry field either as a JSON array of entries or
/// as a legacy packed tuple string, migrating the latter through the codec.
pub(crate) fn deserialize_entries<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: StackTuple + Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw<T> {
        Entries(Vec<T>),
        Packed(String),
    }

    Ok(match Option::<Raw<T>>::deserialize(deserializer)? {
        None => None,
        Some(Raw::Entries(entries)) => Some(entries),
        Some(Raw::Packed(packed)) => {
            let entries = codec::decode::<T>(Some(&packed));
            if entries.is_empty() {
                None
            } else {
                Some(entries)
            }
        }
    })
}
