use serde_yaml::{Mapping, Value as YamlValue};

use crate::store::Value;

/// Nested section tree shared by the store backends.
#[derive(Debug, Default, Clone)]
pub struct Tree {
    root: Mapping,
}

fn key_str(key: &YamlValue) -> Option<String> {
    match key {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn find_key(map: &Mapping, segment: &str) -> Option<YamlValue> {
    map.iter()
        .map(|(k, _)| k)
        .find(|k| key_str(k).as_deref() == Some(segment))
        .cloned()
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|s| !s.is_empty())
}

fn to_scalar(value: &YamlValue) -> Option<Value> {
    match value {
        YamlValue::Bool(v) => Some(Value::Bool(*v)),
        YamlValue::Number(n) => n.as_i64().map(Value::Int),
        YamlValue::String(s) => Some(Value::Text(s.clone())),
        _ => None,
    }
}

fn to_yaml(value: Value) -> YamlValue {
    match value {
        Value::Bool(v) => YamlValue::Bool(v),
        Value::Int(v) => YamlValue::Number(v.into()),
        Value::Text(v) => YamlValue::String(v),
    }
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree from a decoded document. Anything but a mapping at the
    /// top level is treated as empty.
    pub fn from_yaml(doc: YamlValue) -> Self {
        match doc {
            YamlValue::Mapping(root) => Self { root },
            _ => Self::default(),
        }
    }

    pub fn to_yaml(&self) -> YamlValue {
        YamlValue::Mapping(self.root.clone())
    }

    fn node(&self, path: &str) -> Option<&YamlValue> {
        let mut parts = segments(path);
        let first = parts.next()?;

        let mut current = self.root.get(&find_key(&self.root, first)?)?;
        for part in parts {
            let map = current.as_mapping()?;
            current = map.get(&find_key(map, part)?)?;
        }
        Some(current)
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.node(path).and_then(to_scalar)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.node(path).is_some()
    }

    pub fn keys(&self, path: &str) -> Vec<String> {
        let map = if segments(path).next().is_none() {
            Some(&self.root)
        } else {
            self.node(path).and_then(YamlValue::as_mapping)
        };

        match map {
            None => Vec::new(),
            Some(m) => m.iter().filter_map(|(k, _)| key_str(k)).collect(),
        }
    }

    /// Writes a scalar, creating sections along the way. A scalar sitting
    /// where a section is needed gets replaced.
    pub fn set(&mut self, path: &str, value: Value) {
        let parts: Vec<&str> = segments(path).collect();
        let (last, parents) = match parts.split_last() {
            None => return,
            Some(v) => v,
        };

        let mut map = &mut self.root;
        for part in parents {
            let key = find_key(map, part).unwrap_or_else(|| YamlValue::String((*part).to_owned()));
            let entry = map.entry(key).or_insert_with(|| YamlValue::Mapping(Mapping::new()));
            if !entry.is_mapping() {
                *entry = YamlValue::Mapping(Mapping::new());
            }
            map = match entry {
                YamlValue::Mapping(m) => m,
                _ => return,
            };
        }

        let key = find_key(map, last).unwrap_or_else(|| YamlValue::String((*last).to_owned()));
        map.insert(key, to_yaml(value));
    }

    pub fn delete(&mut self, path: &str) -> bool {
        let parts: Vec<&str> = segments(path).collect();
        let (last, parents) = match parts.split_last() {
            None => return false,
            Some(v) => v,
        };

        let mut map = &mut self.root;
        for part in parents {
            let key = match find_key(map, part) {
                None => return false,
                Some(k) => k,
            };
            map = match map.get_mut(&key) {
                Some(YamlValue::Mapping(m)) => m,
                _ => return false,
            };
        }

        match find_key(map, last) {
            None => false,
            Some(key) => map.remove(&key).is_some(),
        }
    }
}
