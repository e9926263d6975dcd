//! Tag aggregation over comma-separated property values.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use pagemeta_core::MetadataEntry;

/// Output ordering of aggregated tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TagSort {
    /// Ascending by tag, ignoring case.
    #[default]
    Alphabetical,
    /// Descending by count, alphabetical on ties.
    CountSort,
}

impl fmt::Display for TagSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagSort::Alphabetical => f.write_str("ALPHABETICAL"),
            TagSort::CountSort => f.write_str("COUNT_SORT"),
        }
    }
}

impl FromStr for TagSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "ALPHABETICAL" | "ALPHA" => Ok(TagSort::Alphabetical),
            "COUNT_SORT" | "COUNT" => Ok(TagSort::CountSort),
            other => Err(format!("Invalid tag sort: {}", other)),
        }
    }
}

/// A distinct tag and the number of times it occurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    /// First-seen casing, trimmed.
    pub tag: String,
    pub count: u64,
}

/// Count the comma-separated tokens of `property` across `entries`.
///
/// Tokens are trimmed and empty ones dropped. Tokens differing only in case
/// count as one tag displayed with the casing first encountered.
pub fn aggregate_tags<'a, I>(entries: I, property: &str, sort: TagSort) -> Vec<TagCount>
where
    I: IntoIterator<Item = &'a MetadataEntry>,
{
    // lowercase -> (display, count)
    let mut counts: HashMap<String, (String, u64)> = HashMap::new();

    for entry in entries {
        for value in entry.property_values(property) {
            for token in value.as_text().split(',') {
                let token = token.trim();
                if token.is_empty() {
                    continue;
                }
                counts
                    .entry(token.to_lowercase())
                    .or_insert_with(|| (token.to_string(), 0))
                    .1 += 1;
            }
        }
    }

    let mut tags: Vec<(String, TagCount)> = counts
        .into_iter()
        .map(|(key, (tag, count))| (key, TagCount { tag, count }))
        .collect();

    match sort {
        TagSort::Alphabetical => tags.sort_by(|(a, _), (b, _)| a.cmp(b)),
        TagSort::CountSort => {
            tags.sort_by(|(ka, a), (kb, b)| b.count.cmp(&a.count).then_with(|| ka.cmp(kb)))
        }
    }

    tags.into_iter().map(|(_, tag)| tag).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagemeta_core::MetadataProperty;

    const REFS: &str = "dcterms:references";

    fn tagged(path: &str, values: &[&str]) -> MetadataEntry {
        MetadataEntry::new(path)
            .with_properties(values.iter().map(|v| MetadataProperty::string(REFS, *v)))
    }

    fn sample() -> Vec<MetadataEntry> {
        vec![
            tagged("/a", &[" PEpe", "jb"]),
            tagged("/b", &["bar", "jb"]),
            tagged("/c", &["jb"]),
        ]
    }

    #[test]
    fn test_alphabetical_mode() {
        let tags = aggregate_tags(&sample(), REFS, TagSort::Alphabetical);
        let names: Vec<_> = tags.iter().map(|t| t.tag.as_str()).collect();
        assert_eq!(names, vec!["bar", "jb", "PEpe"]);
    }

    #[test]
    fn test_count_sort_mode() {
        let tags = aggregate_tags(&sample(), REFS, TagSort::CountSort);
        assert_eq!(tags[0], TagCount { tag: "jb".into(), count: 3 });
        // Ties fall back to alphabetical
        assert_eq!(tags[1].tag, "bar");
        assert_eq!(tags[2].tag, "PEpe");
    }

    #[test]
    fn test_comma_splitting_and_case_folding() {
        let entries = vec![
            tagged("/a", &["Rust, async,,", "  "]),
            tagged("/b", &["rust"]),
            tagged("/c", &["ASYNC,Tokio"]),
        ];
        let tags = aggregate_tags(&entries, REFS, TagSort::Alphabetical);
        assert_eq!(
            tags,
            vec![
                TagCount { tag: "async".into(), count: 2 },
                TagCount { tag: "Rust".into(), count: 2 },
                TagCount { tag: "Tokio".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_empty_input_yields_empty_list() {
        let entries: Vec<MetadataEntry> = Vec::new();
        assert!(aggregate_tags(&entries, REFS, TagSort::CountSort).is_empty());
        let untagged = vec![MetadataEntry::new("/a")];
        assert!(aggregate_tags(&untagged, REFS, TagSort::Alphabetical).is_empty());
    }

    #[test]
    fn test_tag_sort_parse() {
        assert_eq!("count_sort".parse::<TagSort>().unwrap(), TagSort::CountSort);
        assert_eq!("".parse::<TagSort>().unwrap(), TagSort::Alphabetical);
        assert!("random".parse::<TagSort>().is_err());
    }
}
