//! Encoding-independent configuration tree.

use serde_yaml::Value;

/// Key under which a standalone `@include` line is held until it is spliced.
pub(crate) const SPLICE_KEY: &str = "@include";

/// A normalized map/sequence/scalar tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConfigNode {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<ConfigNode>),
    Map(ConfigMap),
}

/// An insertion-ordered map with case-preserved string keys.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigMap {
    entries: Vec<(String, ConfigNode)>,
}

impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ConfigNode> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Looks a key up ignoring case, `_`, `-` and spaces, so `Core_Belief`,
    /// `coreBelief` and `core-belief` are the same field.
    pub fn get_loose(&self, key: &str) -> Option<&ConfigNode> {
        let wanted = loose_key(key);
        self.entries
            .iter()
            .find(|(k, _)| loose_key(k) == wanted)
            .map(|(_, v)| v)
    }

    /// First present key among `keys`, compared loosely.
    pub fn get_any(&self, keys: &[&str]) -> Option<&ConfigNode> {
        keys.iter().find_map(|key| self.get_loose(key))
    }

    /// Inserts or replaces a value. A replaced key keeps its original
    /// position and the previous value is returned.
    pub fn insert(&mut self, key: impl Into<String>, value: ConfigNode) -> Option<ConfigNode> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Appends without de-duplication; used for splice markers.
    pub(crate) fn push_raw(&mut self, key: impl Into<String>, value: ConfigNode) {
        self.entries.push((key.into(), value));
    }

    pub fn remove(&mut self, key: &str) -> Option<ConfigNode> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigNode)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl IntoIterator for ConfigMap {
    type Item = (String, ConfigNode);
    type IntoIter = std::vec::IntoIter<(String, ConfigNode)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(String, ConfigNode)> for ConfigMap {
    fn from_iter<I: IntoIterator<Item = (String, ConfigNode)>>(iter: I) -> Self {
        let mut map = ConfigMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

pub(crate) fn loose_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

impl ConfigNode {
    pub fn as_map(&self) -> Option<&ConfigMap> {
        match self {
            ConfigNode::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[ConfigNode]> {
        match self {
            ConfigNode::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigNode::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigNode::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value; numeric strings are accepted.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigNode::Integer(i) => Some(*i as f64),
            ConfigNode::Float(f) => Some(*f),
            ConfigNode::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfigNode::Null)
    }

    pub fn get(&self, key: &str) -> Option<&ConfigNode> {
        self.as_map().and_then(|map| map.get(key))
    }

    pub fn get_loose(&self, key: &str) -> Option<&ConfigNode> {
        self.as_map().and_then(|map| map.get_loose(key))
    }

    /// Scalar rendered as text; `None` for maps, sequences and null.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            ConfigNode::Bool(b) => Some(b.to_string()),
            ConfigNode::Integer(i) => Some(i.to_string()),
            ConfigNode::Float(f) => Some(f.to_string()),
            ConfigNode::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Scalars as text, sequences of scalars joined with `separator`.
    pub fn joined_text(&self, separator: &str) -> Option<String> {
        match self {
            ConfigNode::Sequence(items) => {
                let parts: Vec<String> = items.iter().filter_map(ConfigNode::scalar_text).collect();
                (!parts.is_empty()).then(|| parts.join(separator))
            }
            other => other.scalar_text(),
        }
    }

    /// A sequence of scalars, or a single scalar split on `separators`.
    pub fn string_list(&self, separators: &[&str]) -> Vec<String> {
        match self {
            ConfigNode::Sequence(items) => items
                .iter()
                .filter_map(ConfigNode::scalar_text)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            other => match other.scalar_text() {
                Some(text) => split_any(&text, separators),
                None => Vec::new(),
            },
        }
    }

    /// Finds `key` at the top level, then inside each top-level map
    /// (header sections of a hybrid document).
    pub fn find_section(&self, key: &str) -> Option<&ConfigNode> {
        let map = self.as_map()?;
        map.get(key).or_else(|| {
            map.iter()
                .filter_map(|(_, value)| value.as_map())
                .find_map(|section| section.get(key))
        })
    }

    /// Depth-first search for the first map key accepted by `matches`.
    pub fn find_key_where<F>(&self, matches: &F) -> Option<(&str, &ConfigNode)>
    where
        F: Fn(&str) -> bool,
    {
        match self {
            ConfigNode::Map(map) => map.iter().find_map(|(key, value)| {
                if matches(key) {
                    Some((key, value))
                } else {
                    value.find_key_where(matches)
                }
            }),
            ConfigNode::Sequence(items) => items.iter().find_map(|item| item.find_key_where(matches)),
            _ => None,
        }
    }

    /// The target token of an `@include` value, if this is one.
    pub fn include_target(&self) -> Option<&str> {
        let text = self.as_str()?.trim();
        let rest = text.strip_prefix("@include")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        rest.split_whitespace().next()
    }
}

pub(crate) fn split_any(text: &str, separators: &[&str]) -> Vec<String> {
    let mut parts = vec![text.to_string()];
    for separator in separators {
        parts = parts
            .iter()
            .flat_map(|part| part.split(separator).map(str::to_string).collect::<Vec<_>>())
            .collect();
    }
    parts
        .into_iter()
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

impl From<Value> for ConfigNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ConfigNode::Null,
            Value::Bool(b) => ConfigNode::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ConfigNode::Integer(i),
                None => ConfigNode::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => ConfigNode::String(s),
            Value::Sequence(items) => {
                ConfigNode::Sequence(items.into_iter().map(ConfigNode::from).collect())
            }
            Value::Mapping(mapping) => ConfigNode::Map(
                mapping
                    .into_iter()
                    .map(|(key, value)| (key_text(key), ConfigNode::from(value)))
                    .collect(),
            ),
            Value::Tagged(tagged) => ConfigNode::from(tagged.value),
        }
    }
}

fn key_text(key: Value) -> String {
    match ConfigNode::from(key) {
        ConfigNode::Null => "null".to_string(),
        node => node.scalar_text().unwrap_or_else(|| format!("{node:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(yaml: &str) -> ConfigNode {
        ConfigNode::from(serde_yaml::from_str::<Value>(yaml).expect("Failed to parse YAML"))
    }

    #[test]
    fn test_loose_lookup() {
        let root = node("Core_Belief: systems evolve\nprimaryQuestion: why\n");
        let map = root.as_map().expect("Expected a map");

        assert_eq!(map.get_loose("coreBelief").and_then(ConfigNode::as_str), Some("systems evolve"));
        assert_eq!(map.get_loose("primary_question").and_then(ConfigNode::as_str), Some("why"));
        assert!(map.get("core_belief").is_none());
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut map = ConfigMap::new();
        map.insert("a", ConfigNode::Integer(1));
        map.insert("b", ConfigNode::Integer(2));
        let previous = map.insert("a", ConfigNode::Integer(3));

        assert_eq!(previous, Some(ConfigNode::Integer(1)));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(map.get("a"), Some(&ConfigNode::Integer(3)));
    }

    #[test]
    fn test_string_list_splits_scalars() {
        let root = node("caps: \"docs | search |  \"\nlist: [a, b]\n");
        assert_eq!(root.get("caps").map(|n| n.string_list(&["|"])), Some(vec!["docs".to_string(), "search".to_string()]));
        assert_eq!(root.get("list").map(|n| n.string_list(&["|"])), Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_find_section_searches_one_level_down() {
        let root = node("Intro:\n  All_Personas:\n    architect: {}\n");
        assert!(root.find_section("All_Personas").is_some());
        assert!(root.find_section("architect").is_none());
    }

    #[test]
    fn test_include_target() {
        assert_eq!(
            ConfigNode::String("@include shared/a.yml#Section".to_string()).include_target(),
            Some("shared/a.yml#Section")
        );
        assert_eq!(ConfigNode::String("@includes".to_string()).include_target(), None);
        assert_eq!(ConfigNode::String("plain".to_string()).include_target(), None);
    }

    #[test]
    fn test_non_string_keys_are_stringified() {
        let root = node("1: one\ntrue: yes\n");
        let keys: Vec<&str> = root.as_map().map(|m| m.keys().collect()).unwrap_or_default();
        assert_eq!(keys, vec!["1", "true"]);
    }
}
