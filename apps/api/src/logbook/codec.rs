//! Packed tuple codec for structured multi-entry fields.
//!
//! Grammar: `('a','v1','v2');('b','v1','v2');`, one parenthesised tuple per
//! stack, every value single-quoted, values comma separated, each tuple
//! terminated by `;`. Values are not escaped, so apostrophes and semicolons
//! inside a value do not survive a round trip.
//!
//! Notes are stored and exchanged with typed entry arrays. This codec only
//! migrates legacy packed strings on input and renders the packed form for
//! search and interoperability.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::stack::{MAX_STACKS, STACK_IDS};

static TUPLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\(\s*'[^']*'(?:\s*,\s*'[^']*')*\s*\)$").expect("valid regex")
});

static QUOTED_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'([^']*)'").expect("valid regex"));

/// A fixed-shape per-stack record that can be packed into a tuple.
pub trait StackTuple: Sized {
    /// Accepted sub-value counts (identifier excluded), full shape first,
    /// then legacy shapes in the order they are tried.
    const SHAPES: &'static [usize];

    fn identifier(&self) -> &str;

    /// Sub-values in tuple order, identifier excluded.
    fn sub_values(&self) -> Vec<String>;

    /// Builds a record from one of the accepted shapes; `None` when the values
    /// do not fit.
    fn from_sub_values(identifier: &str, values: &[&str]) -> Option<Self>;

    /// Whether any editable sub-value is set. Records without content are
    /// never emitted.
    fn has_content(&self) -> bool;
}

pub fn encode_flag(flag: bool) -> &'static str {
    if flag {
        "true"
    } else {
        "false"
    }
}

pub fn decode_flag(raw: &str) -> Option<bool> {
    match raw {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Picks the records that would be emitted for `stack_count` stacks: one per
/// known identifier in `a`..`e` order, only when it has content.
pub fn select_entries<T: StackTuple + Clone>(records: &[T], stack_count: usize) -> Vec<T> {
    let stack_count = stack_count.clamp(1, MAX_STACKS);

    STACK_IDS
        .iter()
        .take(stack_count)
        .filter_map(|id| records.iter().find(|r| r.identifier() == *id))
        .filter(|r| r.has_content())
        .cloned()
        .collect()
}

/// Packs records into the tuple grammar. Returns `None` when nothing would be
/// emitted, never an empty string.
pub fn encode<T: StackTuple + Clone>(records: &[T], stack_count: usize) -> Option<String> {
    let selected = select_entries(records, stack_count);
    if selected.is_empty() {
        return None;
    }

    let mut packed = String::new();
    for record in &selected {
        let quoted: Vec<String> = std::iter::once(record.identifier().to_string())
            .chain(record.sub_values())
            .map(|v| format!("'{v}'"))
            .collect();
        packed.push('(');
        packed.push_str(&quoted.join(","));
        packed.push_str(");");
    }
    Some(packed)
}

/// Unpacks a tuple string. Segments that match no known shape are dropped.
pub fn decode<T: StackTuple>(field: Option<&str>) -> Vec<T> {
    let Some(field) = field else {
        return Vec::new();
    };

    field
        .split(';')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .filter_map(decode_segment)
        .collect()
}

fn decode_segment<T: StackTuple>(segment: &str) -> Option<T> {
    if !TUPLE_PATTERN.is_match(segment) {
        tracing::debug!(segment, "dropping malformed stack tuple");
        return None;
    }

    let values: Vec<&str> = QUOTED_VALUE
        .captures_iter(segment)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    let (identifier, sub_values) = values.split_first()?;

    T::SHAPES
        .iter()
        .filter(|&&shape| shape == sub_values.len())
        .find_map(|_| T::from_sub_values(identifier, sub_values))
}
