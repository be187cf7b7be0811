use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload key holding the originating file path.
pub const SOURCE_PATH_KEY: &str = "source_path";
/// Payload key of the soft-delete flag.
pub const IS_DELETED_KEY: &str = "is_deleted";

/// One point written to the downstream index.
///
/// `id` is deterministic so that re-writing the same input overwrites rather
/// than duplicates. `payload` is schema-less on purpose; the store only
/// interprets [`SOURCE_PATH_KEY`] and [`IS_DELETED_KEY`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Value,
}

impl VectorRecord {
    pub fn new(id: impl Into<String>, vector: Vec<f32>, payload: Value) -> Self {
        Self {
            id: id.into(),
            vector,
            payload,
        }
    }

    #[must_use]
    pub fn source_path(&self) -> Option<&str> {
        self.payload.get(SOURCE_PATH_KEY).and_then(Value::as_str)
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.payload
            .get(IS_DELETED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Flip the soft-delete flag; returns `true` if it changed.
    pub fn mark_deleted(&mut self) -> bool {
        if self.is_deleted() {
            return false;
        }
        match self.payload.as_object_mut() {
            Some(map) => {
                map.insert(IS_DELETED_KEY.to_string(), Value::Bool(true));
                true
            }
            None => false,
        }
    }
}
