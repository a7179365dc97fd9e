// The gateway config document: one JSON object threaded through the overlay steps.

use serde_json::{Map, Value};
use thiserror::Error;

/// Port the gateway always listens on inside the sandbox.
pub const GATEWAY_PORT: u16 = 18789;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("config document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("config document root must be a JSON object, found {0}")]
    NotAnObject(&'static str),
}

/// In-memory gateway configuration.
///
/// Keys are kept in sorted order, so serialization is stable for a given
/// content regardless of the order in which steps inserted them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDocument {
    root: Map<String, Value>,
}

impl ConfigDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document. The root must be an object.
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(root) => Ok(Self { root }),
            other => Err(DocumentError::NotAnObject(value_kind(&other))),
        }
    }

    /// Parse a document, falling back to an empty one on any error.
    ///
    /// Returns the error alongside so callers can log it.
    pub fn parse_lenient(text: &str) -> (Self, Option<DocumentError>) {
        match Self::parse(text) {
            Ok(doc) => (doc, None),
            Err(error) => (Self::new(), Some(error)),
        }
    }

    /// The document written when neither a backup nor a template exists.
    pub fn initial(workspace: &str) -> Self {
        let mut doc = Self::new();
        doc.object_at(&["agents", "defaults"])
            .insert("workspace".into(), Value::String(workspace.to_string()));
        let gateway = doc.object_at(&["gateway"]);
        gateway.insert("port".into(), Value::from(GATEWAY_PORT));
        gateway.insert("mode".into(), Value::String("local".into()));
        doc
    }

    pub fn to_pretty_string(&self) -> String {
        // Serializing a map of JSON values cannot fail.
        let mut text = serde_json::to_string_pretty(&self.root).unwrap_or_else(|_| "{}".into());
        text.push('\n');
        text
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.root)
    }

    /// Look up a value by key path.
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.root.get(*first)?;
        for key in rest {
            current = current.as_object()?.get(*key)?;
        }
        Some(current)
    }

    pub fn get_str(&self, path: &[&str]) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Return the object at `path`, creating empty objects for every missing
    /// segment. Non-object values along the way are replaced.
    pub fn object_at(&mut self, path: &[&str]) -> &mut Map<String, Value> {
        let mut current = &mut self.root;
        for key in path {
            let slot = current
                .entry((*key).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            current = slot.as_object_mut().expect("non-object slot was replaced above");
        }
        current
    }

    /// Set `path` to `value`, creating parents as needed.
    pub fn set(&mut self, path: &[&str], value: Value) {
        let Some((last, parents)) = path.split_last() else {
            return;
        };
        self.object_at(parents).insert((*last).to_string(), value);
    }

    /// Remove the entry at `path` if every parent exists. Returns the removed value.
    pub fn remove(&mut self, path: &[&str]) -> Option<Value> {
        let (last, parents) = path.split_last()?;
        let mut current = &mut self.root;
        for key in parents {
            current = current.get_mut(*key)?.as_object_mut()?;
        }
        current.remove(*last)
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
