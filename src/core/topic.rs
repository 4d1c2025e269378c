use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Sub-task identifier, unique only within its parent topic.
///
/// Millisecond timestamp at creation time.
pub type SubtaskId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: SubtaskId,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

/// A free-form topic under `topics/{uid}/{id}` with its embedded sub-tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    #[serde(skip)]
    pub id: String,
    pub title: String,
    #[serde(rename = "todos", default, deserialize_with = "subtasks_from_value")]
    pub subtasks: Vec<Subtask>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,
}

impl Topic {
    pub fn subtask(&self, id: SubtaskId) -> Option<&Subtask> {
        self.subtasks.iter().find(|s| s.id == id)
    }

    /// Flip one sub-task. Returns the new value, or `None` if it is not here.
    pub fn toggle_subtask(&mut self, id: SubtaskId) -> Option<bool> {
        let subtask = self.subtasks.iter_mut().find(|s| s.id == id)?;
        subtask.completed = !subtask.completed;
        Some(subtask.completed)
    }

    pub fn completed_count(&self) -> usize {
        self.subtasks.iter().filter(|s| s.completed).count()
    }
}

/// Pick an id for a new sub-task: `now_ms`, bumped past any id already used.
pub fn next_subtask_id(existing: &[Subtask], now_ms: SubtaskId) -> SubtaskId {
    let max = existing.iter().map(|s| s.id).max();
    match max {
        Some(max) if max >= now_ms => max + 1,
        _ => now_ms,
    }
}

/// The realtime database turns arrays into `{"0": .., "1": ..}` objects and
/// leaves `null` holes after deletes. Accept all of those shapes.
fn subtasks_from_value<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Subtask>, D::Error> {
    let raw = Option::<Value>::deserialize(d)?;
    let items: Vec<Value> = match raw {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(Value::Object(map)) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by_key(|(k, _)| k.parse::<u64>().unwrap_or(u64::MAX));
            entries.into_iter().map(|(_, v)| v).collect()
        }
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected sub-task list, got {}",
                other
            )));
        }
    };

    items
        .into_iter()
        .filter(|v| !v.is_null())
        .map(|v| serde_json::from_value(v).map_err(serde::de::Error::custom))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_array_with_holes() {
        let topic: Topic = serde_json::from_value(json!({
            "title": "Trip",
            "todos": [
                { "id": 1, "text": "Passport", "completed": true },
                null,
                { "id": 3, "text": "Tickets" }
            ]
        }))
        .unwrap();
        assert_eq!(topic.subtasks.len(), 2);
        assert!(topic.subtasks[0].completed);
        assert!(!topic.subtasks[1].completed);
    }

    #[test]
    fn decodes_index_keyed_object_in_order() {
        let topic: Topic = serde_json::from_value(json!({
            "title": "Trip",
            "todos": {
                "10": { "id": 30, "text": "c" },
                "2": { "id": 20, "text": "b" },
                "0": { "id": 10, "text": "a" }
            }
        }))
        .unwrap();
        let texts: Vec<&str> = topic.subtasks.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn missing_list_is_empty() {
        let topic: Topic = serde_json::from_value(json!({ "title": "Empty" })).unwrap();
        assert!(topic.subtasks.is_empty());
    }

    #[test]
    fn serializes_subtasks_as_todos_array() {
        let topic = Topic {
            id: "t1".into(),
            title: "Garden".into(),
            subtasks: vec![Subtask { id: 5, text: "Dig".into(), completed: false }],
            user_id: "u".into(),
        };
        let value = serde_json::to_value(&topic).unwrap();
        assert_eq!(
            value,
            json!({
                "title": "Garden",
                "todos": [{ "id": 5, "text": "Dig", "completed": false }],
                "userId": "u"
            })
        );
    }

    #[test]
    fn subtask_ids_stay_unique() {
        let existing = vec![
            Subtask { id: 100, text: "a".into(), completed: false },
            Subtask { id: 101, text: "b".into(), completed: false },
        ];
        assert_eq!(next_subtask_id(&existing, 100), 102);
        assert_eq!(next_subtask_id(&existing, 500), 500);
        assert_eq!(next_subtask_id(&[], 7), 7);
    }

    #[test]
    fn toggle_subtask_flips_only_target() {
        let mut topic = Topic {
            id: "t".into(),
            title: "x".into(),
            subtasks: vec![
                Subtask { id: 1, text: "a".into(), completed: false },
                Subtask { id: 2, text: "b".into(), completed: false },
            ],
            user_id: String::new(),
        };
        assert_eq!(topic.toggle_subtask(2), Some(true));
        assert_eq!(topic.completed_count(), 1);
        assert!(!topic.subtask(1).unwrap().completed);
        assert_eq!(topic.toggle_subtask(9), None);
    }
}
