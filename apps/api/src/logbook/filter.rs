//! Visible-list computation over projected notes.
//!
//! Order of evaluation: visibility gate, category, free-text query. All steps
//! are conjunctive and the relative order of the input is preserved.

use serde::{Deserialize, Serialize};

use crate::logbook::codec::{encode, encode_flag};
use crate::logbook::projection::ProjectedNote;
use crate::models::stack::MAX_STACKS;

/// Who is looking at the list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visibility {
    /// Deployment restricts non-privileged viewers to external notes.
    pub gate_active: bool,
    pub privileged: bool,
}

impl Visibility {
    fn externals_only(&self) -> bool {
        self.gate_active && !self.privileged
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub category_id: Option<i64>,
    pub query: Option<String>,
}

pub fn filter_notes<'a>(
    notes: &'a [ProjectedNote],
    criteria: &FilterCriteria,
    visibility: Visibility,
) -> Vec<&'a ProjectedNote> {
    let query = criteria
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase);

    notes
        .iter()
        .filter(|n| !visibility.externals_only() || n.note.external)
        .filter(|n| match criteria.category_id {
            Some(id) => n.note.category_id == Some(id),
            None => true,
        })
        .filter(|n| match &query {
            Some(q) => matches_query(n, q),
            None => true,
        })
        .collect()
}

/// `query` must already be lowercased.
fn matches_query(projected: &ProjectedNote, query: &str) -> bool {
    search_haystack(projected)
        .iter()
        .any(|field| field.to_lowercase().contains(query))
}

fn search_haystack(projected: &ProjectedNote) -> Vec<String> {
    let note = &projected.note;
    let fields = &note.fields;
    let mut haystack = vec![projected.author_name.clone(), projected.body_text.clone()];

    haystack.extend(note.subject.clone());
    haystack.extend(note.note_category.clone());
    haystack.extend(fields.tag_numbers.iter().flatten().cloned());
    haystack.extend(fields.software_version.clone());

    if let Some(entries) = &fields.stack_replacements {
        haystack.extend(encode(entries, MAX_STACKS));
        for entry in entries {
            haystack.push(entry.symptom.clone());
            haystack.push(encode_flag(entry.confirmed).to_string());
        }
    }
    if let Some(entries) = &fields.stack_inspections {
        haystack.extend(encode(entries, MAX_STACKS));
    }
    if let Some(entries) = &fields.stack_tensioning {
        haystack.extend(encode(entries, MAX_STACKS));
    }
    if let Some(entries) = &fields.stack_installs {
        haystack.extend(encode(entries, MAX_STACKS));
    }

    haystack
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logbook::projection::{project_all, ProjectionContext};
    use crate::models::note::Note;
    use proptest::prelude::*;
    use serde_json::json;

    fn notes() -> Vec<ProjectedNote> {
        let raw: Vec<Note> = serde_json::from_value(json!([
            {
                "_id": "1", "text": "Calibrated flow meter", "created_on": 3,
                "author_name": "Ana", "category_id": 10, "note_category": "Calibration",
                "tag_numbers": ["FT-101", "PT-202"], "external": true
            },
            {
                "_id": "2", "text": "Replaced stack", "created_on": 2,
                "author_name": "Ben", "category_id": 20, "note_category": "Stack replacements",
                "stack_replacements": "('a','S100','S200','membrane crossover','true');"
            },
            {
                "_id": "3", "text": "Firmware bumped", "created_on": 1, "subject": "Upgrade",
                "author_name": "Cas", "category_id": 30, "note_category": "Software update",
                "software_version": "4.2.0", "external": true
            },
            {
                "_id": "4", "text": "<p>Looked at <b>stack d</b></p>", "created_on": 0,
                "author_name": "Ana", "category_id": 20, "note_category": "Stack inspections",
                "stack_inspections": [{"identifier": "d", "symptom": "hotspot", "insight": "IR scan"}]
            }
        ]))
        .unwrap();
        project_all(&raw, &ProjectionContext::default())
    }

    fn ids(result: &[&ProjectedNote]) -> Vec<String> {
        result.iter().map(|n| n.note.id.clone()).collect()
    }

    fn query(q: &str) -> FilterCriteria {
        FilterCriteria {
            category_id: None,
            query: Some(q.to_string()),
        }
    }

    #[test]
    fn test_no_criteria_returns_everything_in_order() {
        let notes = notes();
        let result = filter_notes(&notes, &FilterCriteria::default(), Visibility::default());
        assert_eq!(ids(&result), vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn test_visibility_gate_for_non_privileged() {
        let notes = notes();
        let gate = Visibility {
            gate_active: true,
            privileged: false,
        };
        let result = filter_notes(&notes, &FilterCriteria::default(), gate);
        assert_eq!(ids(&result), vec!["1", "3"]);
        assert!(result.iter().all(|n| n.note.external));

        let privileged = Visibility {
            gate_active: true,
            privileged: true,
        };
        assert_eq!(filter_notes(&notes, &FilterCriteria::default(), privileged).len(), 4);
    }

    #[test]
    fn test_category_filter_is_exact_id_match() {
        let notes = notes();
        let criteria = FilterCriteria {
            category_id: Some(20),
            query: None,
        };
        assert_eq!(ids(&filter_notes(&notes, &criteria, Visibility::default())), vec!["2", "4"]);
    }

    #[test]
    fn test_category_filter_never_grows_result() {
        let notes = notes();
        let base = filter_notes(&notes, &query("a"), Visibility::default());
        for id in [10, 20, 30, 99] {
            let narrowed = FilterCriteria {
                category_id: Some(id),
                query: Some("a".into()),
            };
            assert!(filter_notes(&notes, &narrowed, Visibility::default()).len() <= base.len());
        }
    }

    #[test]
    fn test_query_matches_symptom_inside_packed_field() {
        let notes = notes();
        assert_eq!(ids(&filter_notes(&notes, &query("CROSSOVER"), Visibility::default())), vec!["2"]);
        assert_eq!(ids(&filter_notes(&notes, &query("'S200'"), Visibility::default())), vec!["2"]);
    }

    #[test]
    fn test_query_matches_top_level_fields() {
        let notes = notes();
        let v = Visibility::default();
        assert_eq!(ids(&filter_notes(&notes, &query("pt-202"), v)), vec!["1"]);
        assert_eq!(ids(&filter_notes(&notes, &query("4.2"), v)), vec!["3"]);
        assert_eq!(ids(&filter_notes(&notes, &query("upgrade"), v)), vec!["3"]);
        assert_eq!(ids(&filter_notes(&notes, &query("ana"), v)), vec!["1", "4"]);
        assert_eq!(ids(&filter_notes(&notes, &query("hotspot"), v)), vec!["4"]);
        assert_eq!(ids(&filter_notes(&notes, &query("software"), v)), vec!["3"]);
    }

    #[test]
    fn test_query_searches_plain_text_not_markup() {
        let notes = notes();
        let v = Visibility::default();
        assert_eq!(ids(&filter_notes(&notes, &query("looked at stack d"), v)), vec!["4"]);
        assert!(filter_notes(&notes, &query("<b>"), v).is_empty());
    }

    #[test]
    fn test_blank_query_is_ignored() {
        let notes = notes();
        assert_eq!(filter_notes(&notes, &query("   "), Visibility::default()).len(), 4);
    }

    #[test]
    fn test_query_is_trimmed() {
        let notes = notes();
        let v = Visibility::default();
        assert_eq!(
            ids(&filter_notes(&notes, &query("  Stack \t"), v)),
            ids(&filter_notes(&notes, &query("stack"), v))
        );
        assert_eq!(ids(&filter_notes(&notes, &query(" bumped "), v)), vec!["3"]);
    }

    #[test]
    fn test_identical_inputs_identical_output() {
        let notes = notes();
        let criteria = query("stack");
        let first = ids(&filter_notes(&notes, &criteria, Visibility::default()));
        let second = ids(&filter_notes(&notes, &criteria, Visibility::default()));
        assert_eq!(first, second);
    }

    fn generated_notes(specs: &[(bool, Option<i64>, String)]) -> Vec<ProjectedNote> {
        let raw: Vec<Note> = specs
            .iter()
            .enumerate()
            .map(|(i, (external, category_id, text))| {
                serde_json::from_value(json!({
                    "_id": i.to_string(), "text": text, "created_on": i,
                    "category_id": category_id, "external": external
                }))
                .unwrap()
            })
            .collect();
        project_all(&raw, &ProjectionContext::default())
    }

    fn is_subsequence(narrow: &[String], wide: &[String]) -> bool {
        let mut wide = wide.iter();
        narrow.iter().all(|id| wide.any(|w| w == id))
    }

    fn note_specs() -> impl Strategy<Value = Vec<(bool, Option<i64>, String)>> {
        prop::collection::vec(
            (any::<bool>(), prop::option::of(0i64..4), "[a-c ]{0,8}"),
            0..12,
        )
    }

    proptest! {
        #[test]
        fn prop_each_criterion_only_narrows(
            specs in note_specs(),
            category_id in prop::option::of(0i64..4),
            q in prop::option::of("[a-c ]{0,3}"),
            gate_active in any::<bool>(),
            privileged in any::<bool>(),
        ) {
            let notes = generated_notes(&specs);
            let v = Visibility { gate_active, privileged };
            let run = |criteria: FilterCriteria| ids(&filter_notes(&notes, &criteria, v));

            let everything = run(FilterCriteria::default());
            let by_category = run(FilterCriteria { category_id, query: None });
            let by_query = run(FilterCriteria { category_id: None, query: q.clone() });
            let both = run(FilterCriteria { category_id, query: q });

            prop_assert!(everything.len() <= notes.len());
            prop_assert!(is_subsequence(&by_category, &everything));
            prop_assert!(is_subsequence(&by_query, &everything));
            prop_assert!(is_subsequence(&both, &by_category));
            prop_assert!(is_subsequence(&both, &by_query));
        }

        #[test]
        fn prop_gate_shows_only_external_to_non_privileged(
            specs in note_specs(),
            category_id in prop::option::of(0i64..4),
            q in prop::option::of("[a-c ]{0,3}"),
        ) {
            let notes = generated_notes(&specs);
            let gate = Visibility { gate_active: true, privileged: false };
            let criteria = FilterCriteria { category_id, query: q };

            let visible = filter_notes(&notes, &criteria, gate);
            prop_assert!(visible.iter().all(|n| n.note.external));

            let expected = specs.iter().filter(|(external, _, _)| *external).count();
            prop_assert_eq!(filter_notes(&notes, &FilterCriteria::default(), gate).len(), expected);
        }
    }
}
