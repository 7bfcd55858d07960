use std::collections::HashSet;

use crate::types::{RawValue, TagList};

/// Separator of tags inside a single delimited string.
pub const TAG_SEPARATOR: char = ',';

/// Title-cases `value`.
///
/// A cased character is upper-cased when it follows an uncased character or starts the
/// string, and lower-cased otherwise. Applying the function twice yields the same result.
pub fn title_case(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut previous_cased = false;

    for c in value.chars() {
        let cased = c.is_uppercase() || c.is_lowercase();
        if cased && !previous_cased {
            let mut upper = c.to_uppercase();
            if let Some(first) = upper.next() {
                result.push(first);
            }
            // Multi-character mappings keep only their first character upper-cased.
            for rest in upper {
                result.extend(rest.to_lowercase());
            }
        } else if cased {
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
        previous_cased = cased;
    }

    result
}

/// Builds a tag list from candidate labels: trimmed, title-cased, empty ones dropped and
/// duplicates removed keeping the first occurrence.
fn collect_tags<'a>(labels: impl Iterator<Item = &'a str>) -> TagList {
    let mut seen = HashSet::new();
    let mut tags = Vec::new();

    for label in labels {
        let label = label.trim();
        if label.is_empty() {
            continue;
        }

        let tag = title_case(label);
        if seen.insert(tag.to_lowercase()) {
            tags.push(tag);
        }
    }

    TagList::from_normalized(tags)
}

/// Parses a comma-separated string such as `"Python, python , JAVA"`.
pub fn parse_tag_text(value: &str) -> TagList {
    collect_tags(value.split(TAG_SEPARATOR))
}

/// Normalizes a list of values, keeping string elements only.
pub fn parse_tag_values(values: &[RawValue]) -> TagList {
    collect_tags(values.iter().filter_map(|value| match value {
        RawValue::String(label) => Some(label.as_str()),
        _ => None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_case_matches_word_boundaries() {
        assert_eq!(title_case("remoto"), "Remoto");
        assert_eq!(title_case("TRABAJO HÍBRIDO"), "Trabajo Híbrido");
        assert_eq!(title_case("node.js"), "Node.Js");
        assert_eq!(title_case("c#"), "C#");
        assert_eq!(title_case("aws-lambda 2go"), "Aws-Lambda 2Go");
    }

    #[test]
    fn title_case_is_idempotent() {
        for value in ["straße", "ǆemal", "JavaScript", "  mixed CASE  ", "ß"] {
            let once = title_case(value);
            assert_eq!(title_case(&once), once, "value {value:?}");
        }
    }

    #[test]
    fn delimited_text_is_split_and_deduplicated() {
        let tags = parse_tag_text("Python, python , JAVA,Python");

        assert_eq!(tags.as_slice(), ["Python", "Java"]);
    }

    #[test]
    fn empty_segments_are_dropped() {
        assert!(parse_tag_text("").is_empty());
        assert!(parse_tag_text(" , ,").is_empty());
        assert_eq!(parse_tag_text("sql,,  ").as_slice(), ["Sql"]);
    }

    #[test]
    fn list_values_keep_strings_only() {
        let tags = parse_tag_values(&[
            RawValue::from("react"),
            RawValue::from(3_i64),
            RawValue::from(" React "),
            RawValue::from("angular"),
        ]);

        assert_eq!(tags.as_slice(), ["React", "Angular"]);
    }
}
