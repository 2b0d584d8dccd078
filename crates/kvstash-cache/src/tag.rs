//! Tag membership lists.
//!
//! A tag record stores its members as one comma-joined string of mapped
//! cache identifiers. Each identifier is percent-encoded first so a `,`
//! inside a cache name cannot split it into two members.

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

/// Bytes escaped inside a stored member list.
const MEMBER_ESCAPE: &AsciiSet = &CONTROLS.add(b',').add(b'%');

/// Cache names passed to [`Cache::tag`](crate::Cache::tag).
///
/// Built from a comma-separated string or from a list of names. Blank
/// entries are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagKeys(Vec<String>);

impl TagKeys {
    /// The cache names, in the order given.
    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Whether no names were given.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn collect<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            items
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }
}

impl From<&str> for TagKeys {
    fn from(value: &str) -> Self {
        Self::collect(value.split(','))
    }
}

impl From<String> for TagKeys {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Vec<String>> for TagKeys {
    fn from(value: Vec<String>) -> Self {
        Self::collect(value)
    }
}

impl From<Vec<&str>> for TagKeys {
    fn from(value: Vec<&str>) -> Self {
        Self::collect(value)
    }
}

impl From<&[&str]> for TagKeys {
    fn from(value: &[&str]) -> Self {
        Self::collect(value.iter())
    }
}

impl<const N: usize> From<[&str; N]> for TagKeys {
    fn from(value: [&str; N]) -> Self {
        Self::collect(value)
    }
}

/// Join member identifiers into the stored form.
pub fn join_members(members: &[String]) -> String {
    members
        .iter()
        .map(|m| utf8_percent_encode(m, MEMBER_ESCAPE).to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Split a stored member list back into identifiers.
pub fn parse_members(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter(|s| !s.is_empty())
        .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
        .collect()
}

/// Append `added` to `existing`, skipping identifiers already present.
pub fn merge_members(mut existing: Vec<String>, added: Vec<String>) -> Vec<String> {
    for member in added {
        if !existing.contains(&member) {
            existing.push(member);
        }
    }
    existing
}

/// Deduplicate a member list, keeping first occurrences.
pub fn dedup_members(members: Vec<String>) -> Vec<String> {
    merge_members(Vec::with_capacity(members.len()), members)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_keys_from_comma_string() {
        let keys = TagKeys::from("a, b,,c");
        assert_eq!(keys.names(), ["a", "b", "c"]);
        assert!(TagKeys::from("").is_empty());
    }

    #[test]
    fn test_tag_keys_from_lists() {
        assert_eq!(TagKeys::from(["a", "b"]).names(), ["a", "b"]);
        assert_eq!(TagKeys::from(vec!["x".to_string()]).names(), ["x"]);
        let slice: &[&str] = &["p", " "];
        assert_eq!(TagKeys::from(slice).names(), ["p"]);
    }

    #[test]
    fn test_merge_keeps_order_and_dedupes() {
        let merged = merge_members(
            vec!["a".into(), "b".into()],
            vec!["b".into(), "c".into()],
        );
        assert_eq!(merged, ["a", "b", "c"]);
        assert_eq!(dedup_members(vec!["x".into(), "x".into()]), ["x"]);
    }

    #[test]
    fn test_parse_members() {
        assert_eq!(parse_members("a,b"), ["a", "b"]);
        assert!(parse_members("").is_empty());
    }

    #[test]
    fn test_member_with_comma_stays_whole() {
        let members = vec!["a,b".to_string(), "x%2Cy".to_string(), "c".to_string()];
        let raw = join_members(&members);
        assert_eq!(raw, "a%2Cb,x%252Cy,c");
        assert_eq!(parse_members(&raw), members);
    }
}
