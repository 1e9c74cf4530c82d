use std::collections::BTreeMap;

use serde::Serialize;

use crate::sanitize_sheet_name;

/// One old-title → new-title pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MappingEntry {
    pub old_name: String,
    pub new_name: String,
}

/// Old sheet title → proposed new title, kept in sheet order.
///
/// New titles are passed through [`sanitize_sheet_name`] on insertion, so every stored value is
/// at most 31 characters. Uniqueness of new titles is *not* enforced here; see
/// [`RenameMapping::collisions`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RenameMapping {
    entries: Vec<MappingEntry>,
}

impl RenameMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map every title to itself.
    pub fn identity<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        titles
            .into_iter()
            .map(|title| {
                let title = title.as_ref();
                (title.to_string(), title.to_string())
            })
            .collect()
    }

    /// Insert a pair, replacing the new title if `old_name` is already present.
    ///
    /// Returns the previous (sanitized) new title, if any.
    pub fn insert(&mut self, old_name: impl Into<String>, new_name: &str) -> Option<String> {
        let old_name = old_name.into();
        let new_name = sanitize_sheet_name(new_name);
        match self.entries.iter_mut().find(|e| e.old_name == old_name) {
            Some(entry) => Some(std::mem::replace(&mut entry.new_name, new_name)),
            None => {
                self.entries.push(MappingEntry { old_name, new_name });
                None
            }
        }
    }

    /// Replace the new title of an existing entry. Returns `false` if `old_name` is unknown.
    pub fn set_new_name(&mut self, old_name: &str, new_name: &str) -> bool {
        match self.entries.iter_mut().find(|e| e.old_name == old_name) {
            Some(entry) => {
                entry.new_name = sanitize_sheet_name(new_name);
                true
            }
            None => false,
        }
    }

    /// Apply explicit per-sheet edits on top of this mapping. Edits for unknown titles are ignored.
    pub fn with_overrides<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (old_name, new_name) in overrides {
            self.set_new_name(old_name.as_ref(), new_name.as_ref());
        }
        self
    }

    /// New title for `old_name`.
    pub fn get(&self, old_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.old_name == old_name)
            .map(|e| e.new_name.as_str())
    }

    pub fn contains_old_name(&self, old_name: &str) -> bool {
        self.entries.iter().any(|e| e.old_name == old_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|e| (e.old_name.as_str(), e.new_name.as_str()))
    }

    pub fn old_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.old_name.as_str())
    }

    pub fn new_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.new_name.as_str())
    }

    /// Returns `true` if every title maps to itself.
    pub fn is_identity(&self) -> bool {
        self.entries.iter().all(|e| e.old_name == e.new_name)
    }

    /// New titles claimed by more than one sheet, in first-seen order.
    ///
    /// The rename engine does not reject such mappings; callers that want unique titles should
    /// check this first.
    pub fn collisions(&self) -> Vec<&str> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for name in self.new_names() {
            *counts.entry(name).or_default() += 1;
        }
        let mut out = Vec::new();
        for name in self.new_names() {
            if counts.get(name).is_some_and(|n| *n > 1) && !out.contains(&name) {
                out.push(name);
            }
        }
        out
    }
}

impl<K, V> FromIterator<(K, V)> for RenameMapping
where
    K: Into<String>,
    V: AsRef<str>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut mapping = RenameMapping::new();
        for (old_name, new_name) in iter {
            mapping.insert(old_name, new_name.as_ref());
        }
        mapping
    }
}

/// Default proposal used by the batch tool.
///
/// With a non-empty `prefix`, sheet `i` (0-based) becomes `"<prefix>.<i+1 as two digits> <title>"`,
/// truncated to 31 characters. Without a prefix every title maps to itself.
pub fn build_default_mapping<I, S>(titles: I, prefix: &str) -> RenameMapping
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if prefix.is_empty() {
        return RenameMapping::identity(titles);
    }
    titles
        .into_iter()
        .enumerate()
        .map(|(idx, title)| {
            let title = title.as_ref();
            (title.to_string(), format!("{prefix}.{:02} {title}", idx + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn insert_sanitizes_and_replaces() {
        let mut mapping = RenameMapping::new();
        assert_eq!(mapping.insert("Data", &"x".repeat(40)), None);
        assert_eq!(mapping.get("Data"), Some("x".repeat(31).as_str()));

        assert_eq!(mapping.insert("Data", "Other"), Some("x".repeat(31)));
        assert_eq!(mapping.get("Data"), Some("Other"));
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn keeps_insertion_order() {
        let mapping: RenameMapping = [("b", "1"), ("a", "2"), ("c", "3")].into_iter().collect();
        assert_eq!(mapping.old_names().collect::<Vec<_>>(), vec!["b", "a", "c"]);
    }

    #[test]
    fn set_new_name_ignores_unknown_titles() {
        let mut mapping = RenameMapping::identity(["A"]);
        assert!(mapping.set_new_name("A", "Alpha"));
        assert!(!mapping.set_new_name("Z", "Zulu"));
        assert_eq!(mapping.get("A"), Some("Alpha"));
        assert!(!mapping.contains_old_name("Z"));
    }

    #[test]
    fn overrides_apply_over_default_mapping() {
        let mapping = build_default_mapping(["Data", "Notes"], "Q1")
            .with_overrides([("Notes", "Remarks"), ("Missing", "Ignored")]);
        assert_eq!(
            mapping.iter().collect::<Vec<_>>(),
            vec![("Data", "Q1.01 Data"), ("Notes", "Remarks")]
        );
    }

    #[test]
    fn reports_collisions_once_each() {
        let mapping: RenameMapping = [("a", "X"), ("b", "Y"), ("c", "X"), ("d", "X")]
            .into_iter()
            .collect();
        assert_eq!(mapping.collisions(), vec!["X"]);
        assert!(RenameMapping::identity(["a", "b"]).collisions().is_empty());
    }

    #[test]
    fn collisions_are_detected_after_truncation() {
        let shared = "y".repeat(31);
        let mapping: RenameMapping = [
            ("a", format!("{shared}1")),
            ("b", format!("{shared}2")),
        ]
        .into_iter()
        .collect();
        assert_eq!(mapping.collisions(), vec![shared.as_str()]);
    }

    #[test]
    fn default_mapping_without_prefix_is_identity() {
        let mapping = build_default_mapping(["A", "B"], "");
        assert_eq!(mapping.iter().collect::<Vec<_>>(), vec![("A", "A"), ("B", "B")]);
        assert!(mapping.is_identity());
    }

    #[test]
    fn default_mapping_with_prefix_numbers_sheets() {
        let mapping = build_default_mapping(["Data", "Summary"], "Q1");
        assert_eq!(
            mapping.iter().collect::<Vec<_>>(),
            vec![("Data", "Q1.01 Data"), ("Summary", "Q1.02 Summary")]
        );
    }

    #[test]
    fn default_mapping_truncates_long_results() {
        let mapping = build_default_mapping(["A very long worksheet title here"], "FY2024");
        let new_name = mapping.get("A very long worksheet title here");
        assert_eq!(new_name, Some("FY2024.01 A very long worksheet"));
        assert_eq!(new_name.map(|n| n.chars().count()), Some(31));
    }

    #[test]
    fn serializes_as_entry_list() {
        let mapping = build_default_mapping(["Data"], "Q1");
        let json = serde_json::to_string(&mapping).unwrap();
        assert_eq!(json, r#"[{"old_name":"Data","new_name":"Q1.01 Data"}]"#);
    }
}
