use anyhow::{bail, Context, Result};
use regex::Regex;

use crate::models::stack::MAX_STACKS;

const DEFAULT_PATTERNS: &[(&str, usize)] = &[
    ("single", 1),
    ("duo", 2),
    ("twin", 2),
    ("trio", 3),
    ("quad", 4),
];

/// Maps an agent/asset display name to the number of physical stacks it has,
/// by case-insensitive match against known model-name fragments. A fragment
/// only matches where it is not flanked by other letters, so "quad" finds
/// "Quad400" but not "Squadron".
#[derive(Debug, Clone)]
pub struct StackCountResolver {
    patterns: Vec<StackPattern>,
}

#[derive(Debug, Clone)]
struct StackPattern {
    matcher: Regex,
    count: usize,
}

impl StackPattern {
    fn new(fragment: &str, count: usize) -> Result<Self> {
        let pattern = format!(
            r"(?i)(?:^|[^[:alpha:]]){}(?:[^[:alpha:]]|$)",
            regex::escape(fragment)
        );
        let matcher = Regex::new(&pattern)
            .with_context(|| format!("stack pattern '{fragment}' is not a usable name fragment"))?;
        Ok(Self {
            matcher,
            count: count.clamp(1, MAX_STACKS),
        })
    }
}

impl Default for StackCountResolver {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS
                .iter()
                .filter_map(|(fragment, count)| StackPattern::new(fragment, *count).ok())
                .collect(),
        }
    }
}

impl StackCountResolver {
    /// Empty fragments are dropped. Counts are clamped to `1..=MAX_STACKS`.
    pub fn new(patterns: Vec<(String, usize)>) -> Result<Self> {
        let patterns = patterns
            .iter()
            .filter(|(fragment, _)| !fragment.trim().is_empty())
            .map(|(fragment, count)| StackPattern::new(fragment.trim(), *count))
            .collect::<Result<_>>()?;
        Ok(Self { patterns })
    }

    /// Parses `fragment=count,fragment=count`.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut patterns = Vec::new();
        for pair in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((fragment, count)) = pair.split_once('=') else {
                bail!("stack pattern '{pair}' must look like fragment=count");
            };
            let count: usize = count
                .trim()
                .parse()
                .with_context(|| format!("stack pattern '{pair}' has a non-numeric count"))?;
            patterns.push((fragment.trim().to_string(), count));
        }
        Self::new(patterns)
    }

    /// First matching pattern wins; unknown or unmatched names get every stack.
    pub fn resolve(&self, asset_name: Option<&str>) -> usize {
        let Some(name) = asset_name else {
            return MAX_STACKS;
        };
        self.patterns
            .iter()
            .find(|pattern| pattern.matcher.is_match(name))
            .map(|pattern| pattern.count)
            .unwrap_or(MAX_STACKS)
    }
}
