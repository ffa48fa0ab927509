//! The execution context: everything later nodes can see.
//!
//! A context value is never mutated in place. Each step folds its output into
//! a new snapshot, so a step's view of the context is exactly what existed
//! when it ran.

use serde_json::{json, Map, Value};

/// Key holding the trigger payload.
pub const TRIGGER_DATA_KEY: &str = "trigger_data";
/// Key holding the most recent condition node's result.
pub const CONDITION_RESULT_KEY: &str = "condition_result";
/// Keys the engine writes itself; node IDs may not use them.
pub const RESERVED_KEYS: [&str; 2] = [TRIGGER_DATA_KEY, CONDITION_RESULT_KEY];

/// Immutable snapshot of a run's accumulated state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionContext {
    entries: Map<String, Value>,
}

impl ExecutionContext {
    pub fn new(trigger_data: Value) -> Self {
        let mut entries = Map::new();
        entries.insert(TRIGGER_DATA_KEY.to_owned(), trigger_data);
        Self { entries }
    }

    /// A new snapshot with `output` stored under `node_id`.
    ///
    /// A node visited again (in a cycle) replaces its previous output; no
    /// key is ever removed.
    pub fn with_output(&self, node_id: &str, output: Value) -> Self {
        let mut entries = self.entries.clone();
        entries.insert(node_id.to_owned(), output);
        Self { entries }
    }

    /// A new snapshot with `condition_result` set.
    pub fn with_condition_result(&self, result: bool) -> Self {
        self.with_output(CONDITION_RESULT_KEY, Value::Bool(result))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn condition_result(&self) -> Option<bool> {
        self.get(CONDITION_RESULT_KEY).and_then(Value::as_bool)
    }

    /// Visible keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// What a step records as its input: the visible keys, not the values.
    pub fn input_summary(&self) -> Value {
        json!({ "context_keys": self.keys() })
    }

    /// The flat map condition expressions are evaluated against.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_trigger_payload_only() {
        let ctx = ExecutionContext::new(json!({ "amount": 10 }));
        assert_eq!(ctx.keys(), vec![TRIGGER_DATA_KEY]);
        assert_eq!(ctx.get(TRIGGER_DATA_KEY), Some(&json!({ "amount": 10 })));
        assert_eq!(ctx.condition_result(), None);
    }

    #[test]
    fn folding_leaves_the_previous_snapshot_untouched() {
        let first = ExecutionContext::new(json!({}));
        let second = first.with_output("send", json!({ "message_sent": true }));
        let third = second.with_condition_result(true);

        assert!(first.get("send").is_none());
        assert_eq!(second.get("send"), Some(&json!({ "message_sent": true })));
        assert_eq!(second.condition_result(), None);
        assert_eq!(third.condition_result(), Some(true));
        assert_eq!(third.keys().len(), 3);
    }

    #[test]
    fn input_summary_lists_keys_only() {
        let ctx = ExecutionContext::new(json!({ "secret": "s3cr3t" }))
            .with_output("n1", json!({ "big": "payload" }));
        let summary = ctx.input_summary();
        assert_eq!(summary, json!({ "context_keys": ["n1", "trigger_data"] }));
        assert!(!summary.to_string().contains("s3cr3t"));
    }
}
