//! Server-sent events from the realtime database's streaming endpoint.
//!
//! The stream is a sequence of blocks separated by a blank line, each with an
//! `event:` and a `data:` line. `put` replaces the value at a relative path,
//! `patch` merges keys into it.

use serde_json::Value;

use super::StorePath;
use super::tree::{merge_at, set_at};

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Put { path: StorePath, data: Value },
    Patch { path: StorePath, data: Value },
    KeepAlive,
    /// The server stopped the stream, usually because the rules now deny
    /// reading it.
    Cancel(String),
    /// The credential on the stream expired or was revoked.
    AuthRevoked,
    Unknown(String),
}

impl StreamEvent {
    /// Apply to the cached value of the subscribed location. Returns whether
    /// the cache may have changed.
    pub fn apply(&self, cache: &mut Value) -> bool {
        match self {
            Self::Put { path, data } => {
                set_at(cache, path, data.clone());
                true
            }
            Self::Patch { path, data } => {
                if let Some(partial) = data.as_object() {
                    merge_at(cache, path, partial);
                    true
                } else {
                    log::warn!("Ignoring patch at /{} with non-object data", path);
                    false
                }
            }
            _ => false,
        }
    }
}

/// Incremental parser: feed it chunks as they arrive, collect whole events.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &str) -> Vec<StreamEvent> {
        self.buffer.push_str(&chunk.replace("\r\n", "\n"));

        let mut events = Vec::new();
        while let Some(end) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..end + 2).collect();
            if let Some(event) = parse_block(&block) {
                events.push(event);
            }
        }
        events
    }
}

fn parse_block(block: &str) -> Option<StreamEvent> {
    let mut name = None;
    let mut data = String::new();
    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => name = Some(value.to_string()),
            "data" => {
                if !data.is_empty() {
                    data.push('\n');
                }
                data.push_str(value);
            }
            _ => {}
        }
    }

    let name = name?;
    let event = match name.as_str() {
        "put" | "patch" => {
            let (path, payload) = match parse_payload(&data) {
                Ok(parsed) => parsed,
                Err(e) => {
                    log::warn!("Dropping malformed {} event: {}", name, e);
                    return None;
                }
            };
            if name == "put" {
                StreamEvent::Put {
                    path,
                    data: payload,
                }
            } else {
                StreamEvent::Patch {
                    path,
                    data: payload,
                }
            }
        }
        "keep-alive" => StreamEvent::KeepAlive,
        "cancel" => StreamEvent::Cancel(data.trim().trim_matches('"').to_string()),
        "auth_revoked" => StreamEvent::AuthRevoked,
        _ => StreamEvent::Unknown(name),
    };
    Some(event)
}

fn parse_payload(data: &str) -> Result<(StorePath, Value), String> {
    let mut payload: Value = serde_json::from_str(data).map_err(|e| e.to_string())?;
    let path = payload
        .get("path")
        .and_then(Value::as_str)
        .ok_or("missing path")?;
    let path = StorePath::from_segments(
        path.split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    );
    let data = payload
        .get_mut("data")
        .map(Value::take)
        .unwrap_or(Value::Null);
    Ok((path, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_events_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed("event: put\ndata: {\"path\":\"/\",").is_empty());
        let events = parser.feed("\"data\":{\"a\":{\"text\":\"x\"}}}\n\nevent: keep-alive\ndata: null\n\n");
        assert_eq!(
            events,
            vec![
                StreamEvent::Put {
                    path: StorePath::root(),
                    data: json!({ "a": { "text": "x" } }),
                },
                StreamEvent::KeepAlive,
            ]
        );
    }

    #[test]
    fn handles_crlf_and_control_events() {
        let mut parser = SseParser::new();
        let events = parser.feed(
            "event: cancel\r\ndata: \"Permission denied\"\r\n\r\nevent: auth_revoked\r\ndata: credential is no longer valid\r\n\r\n",
        );
        assert_eq!(
            events,
            vec![
                StreamEvent::Cancel("Permission denied".into()),
                StreamEvent::AuthRevoked
            ]
        );
    }

    #[test]
    fn malformed_payload_is_dropped() {
        let mut parser = SseParser::new();
        let events = parser.feed("event: put\ndata: not json\n\nevent: rules_debug\ndata: x\n\n");
        assert_eq!(events, vec![StreamEvent::Unknown("rules_debug".into())]);
    }

    #[test]
    fn put_and_patch_update_cache() {
        let mut cache = Value::Null;
        let mut parser = SseParser::new();
        let events = parser.feed(concat!(
            "event: put\ndata: {\"path\":\"/\",\"data\":{\"t1\":{\"text\":\"a\",\"completed\":false}}}\n\n",
            "event: patch\ndata: {\"path\":\"/t1\",\"data\":{\"completed\":true}}\n\n",
            "event: put\ndata: {\"path\":\"/t2\",\"data\":{\"text\":\"b\"}}\n\n",
            "event: put\ndata: {\"path\":\"/t1\",\"data\":null}\n\n",
        ));
        for event in &events {
            assert!(event.apply(&mut cache));
        }
        assert_eq!(cache, json!({ "t2": { "text": "b" } }));
    }
}
