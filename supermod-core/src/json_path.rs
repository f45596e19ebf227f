use serde_json::Value;
use thiserror::Error;

use crate::path_match::Key;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("key '{0}' not found")]
    KeyNotFound(String),

    #[error("index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Shape of one document node as seen by the path walker.
pub enum Node<'a, D> {
    Mapping(Vec<(&'a str, &'a D)>),
    Sequence(&'a [D]),
    Scalar,
}

/// A nested mapping/sequence document that paths can be walked through.
pub trait Document: Sized {
    fn node(&self) -> Node<'_, Self>;

    fn child(&self, key: &Key) -> Result<&Self, PathError>;

    fn child_mut(&mut self, key: &Key) -> Result<&mut Self, PathError>;

    /// Stores `value` directly under `key`. Mappings insert or overwrite;
    /// sequences only overwrite an existing index.
    fn put(&mut self, key: &Key, value: Self) -> Result<(), PathError>;
}

impl Document for Value {
    fn node(&self) -> Node<'_, Self> {
        match self {
            Value::Object(map) => Node::Mapping(map.iter().map(|(k, v)| (k.as_str(), v)).collect()),
            Value::Array(items) => Node::Sequence(items),
            _ => Node::Scalar,
        }
    }

    fn child(&self, key: &Key) -> Result<&Self, PathError> {
        match (self, key) {
            (Value::Object(map), Key::Name(name)) => {
                map.get(name).ok_or_else(|| PathError::KeyNotFound(name.clone()))
            }
            (Value::Array(items), Key::Index(index)) => items.get(*index).ok_or(PathError::IndexOutOfRange {
                index: *index,
                len: items.len(),
            }),
            _ => Err(PathError::KeyNotFound(key.to_string())),
        }
    }

    fn child_mut(&mut self, key: &Key) -> Result<&mut Self, PathError> {
        match (self, key) {
            (Value::Object(map), Key::Name(name)) => {
                map.get_mut(name).ok_or_else(|| PathError::KeyNotFound(name.clone()))
            }
            (Value::Array(items), Key::Index(index)) => {
                let len = items.len();
                items
                    .get_mut(*index)
                    .ok_or(PathError::IndexOutOfRange { index: *index, len })
            }
            _ => Err(PathError::KeyNotFound(key.to_string())),
        }
    }

    fn put(&mut self, key: &Key, value: Self) -> Result<(), PathError> {
        match (self, key) {
            (Value::Object(map), Key::Name(name)) => {
                map.insert(name.clone(), value);
                Ok(())
            }
            (Value::Array(items), Key::Index(index)) => {
                let len = items.len();
                let slot = items
                    .get_mut(*index)
                    .ok_or(PathError::IndexOutOfRange { index: *index, len })?;
                *slot = value;
                Ok(())
            }
            _ => Err(PathError::KeyNotFound(key.to_string())),
        }
    }
}

/// Every path reachable in `doc`, starting with the empty path for the root.
/// Mapping keys come out in document order, sequence indices ascending.
pub fn enumerate_paths<D: Document>(doc: &D) -> Vec<Vec<Key>> {
    let mut out = Vec::new();
    let mut prefix = Vec::new();
    walk(doc, &mut prefix, &mut out);
    out
}

fn walk<D: Document>(doc: &D, prefix: &mut Vec<Key>, out: &mut Vec<Vec<Key>>) {
    out.push(prefix.clone());
    match doc.node() {
        Node::Mapping(entries) => {
            for (name, child) in entries {
                prefix.push(Key::Name(name.to_string()));
                walk(child, prefix, out);
                prefix.pop();
            }
        }
        Node::Sequence(items) => {
            for (index, child) in items.iter().enumerate() {
                prefix.push(Key::Index(index));
                walk(child, prefix, out);
                prefix.pop();
            }
        }
        Node::Scalar => {}
    }
}

pub fn get<'a, D: Document>(doc: &'a D, path: &[Key]) -> Result<&'a D, PathError> {
    path.iter().try_fold(doc, |node, key| node.child(key))
}

/// Replaces the value at `path`. The empty path replaces the root itself.
pub fn set<D: Document>(root: &mut D, path: &[Key], value: D) -> Result<(), PathError> {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut node = root;
    for key in parents {
        node = node.child_mut(key)?;
    }
    node.put(last, value)
}

pub fn format_path(path: &[Key]) -> String {
    path.iter().map(|key| key.to_string()).collect::<Vec<_>>().join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "parent": "block/cube",
            "elements": [
                { "from": [0, 0, 0], "to": [16, 16, 16] },
                { "from": [1, 2, 3], "rotation": { "angle": 45, "axis": "y" } }
            ]
        })
    }

    #[test]
    fn scalar_has_only_root_path() {
        assert_eq!(enumerate_paths(&json!(42)), vec![Vec::<Key>::new()]);
        assert_eq!(enumerate_paths(&json!("text")), vec![Vec::<Key>::new()]);
        assert_eq!(enumerate_paths(&json!(null)), vec![Vec::<Key>::new()]);
    }

    #[test]
    fn enumerates_mappings_and_sequences_in_order() {
        let doc = json!({ "b": [true, { "c": 1 }], "a": 2 });
        let paths: Vec<String> = enumerate_paths(&doc).iter().map(|p| format_path(p)).collect();
        assert_eq!(paths, vec!["", "b", "b/0", "b/1", "b/1/c", "a"]);
    }

    #[test]
    fn every_enumerated_path_is_readable() {
        let doc = sample();
        let paths = enumerate_paths(&doc);
        assert!(paths.contains(&Vec::new()));
        assert_eq!(paths.len(), 20);
        for path in &paths {
            assert!(get(&doc, path).is_ok(), "unreadable path {}", format_path(path));
        }
    }

    #[test]
    fn get_reports_missing_keys_and_indices() {
        let doc = sample();
        assert_eq!(
            get(&doc, &[Key::from("missing")]),
            Err(PathError::KeyNotFound("missing".to_string()))
        );
        assert_eq!(
            get(&doc, &[Key::from("elements"), Key::from(5)]),
            Err(PathError::IndexOutOfRange { index: 5, len: 2 })
        );
        assert_eq!(
            get(&doc, &[Key::from("parent"), Key::from("x")]),
            Err(PathError::KeyNotFound("x".to_string()))
        );
        assert_eq!(get(&doc, &[Key::from(0)]), Err(PathError::KeyNotFound("0".to_string())));
    }

    #[test]
    fn set_with_own_value_is_identity() {
        let original = sample();
        for path in enumerate_paths(&original) {
            let mut doc = original.clone();
            let value = get(&doc, &path).unwrap().clone();
            set(&mut doc, &path, value).unwrap();
            assert_eq!(doc, original, "set changed document at {}", format_path(&path));
        }
    }

    #[test]
    fn set_replaces_nested_value() {
        let mut doc = sample();
        let path = [Key::from("elements"), Key::from(1), Key::from("from")];
        set(&mut doc, &path, json!([9, 9, 9])).unwrap();
        assert_eq!(doc["elements"][1]["from"], json!([9, 9, 9]));
        assert_eq!(doc["elements"][0]["from"], json!([0, 0, 0]));
    }

    #[test]
    fn set_on_empty_path_replaces_root() {
        let mut doc = sample();
        set(&mut doc, &[], json!({ "fresh": true })).unwrap();
        assert_eq!(doc, json!({ "fresh": true }));
    }

    #[test]
    fn set_inserts_missing_mapping_key_but_not_missing_parent() {
        let mut doc = sample();
        set(&mut doc, &[Key::from("ambientocclusion")], json!(false)).unwrap();
        assert_eq!(doc["ambientocclusion"], json!(false));

        let err = set(&mut doc, &[Key::from("display"), Key::from("gui")], json!({})).unwrap_err();
        assert_eq!(err, PathError::KeyNotFound("display".to_string()));

        let err = set(&mut doc, &[Key::from("elements"), Key::from(7)], json!({})).unwrap_err();
        assert_eq!(err, PathError::IndexOutOfRange { index: 7, len: 2 });
    }
}
