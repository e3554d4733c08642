use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use crate::protocol::QueryParams;

#[derive(Debug)]
pub enum MessageLogMode {
    Full,
    /// First response per endpoint in full, afterwards only changed paths.
    Diffed,
}

pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous: HashMap<String, Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous: HashMap::new(),
        })
    }

    /// `params` must not contain credentials.
    pub fn log_request(&mut self, path: &str, params: &QueryParams) {
        let params: serde_json::Map<String, Value> = params
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "method": "GET",
            "path": path,
            "params": params,
        });
        self.write_line(&entry);
    }

    pub fn log_command(&mut self, action: &str, relay: Option<u64>) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "cmd",
            "action": action,
            "relay": relay,
        });
        self.write_line(&entry);
    }

    pub fn log_response(&mut self, path: &str, body: &Value) {
        let entry = match (&self.mode, self.previous.get(path)) {
            (MessageLogMode::Full, _) => json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": "resp",
                "path": path,
                "body": body,
            }),
            (MessageLogMode::Diffed, None) => json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": "resp",
                "path": path,
                "full": true,
                "body": body,
            }),
            (MessageLogMode::Diffed, Some(prev)) => {
                let mut changes = Vec::new();
                diff_json(prev, body, "", &mut changes);
                let changes: Vec<Value> = changes
                    .into_iter()
                    .map(|(path, old, new)| json!({ "path": path, "old": old, "new": new }))
                    .collect();
                json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": "resp",
                    "path": path,
                    "changes": changes,
                })
            }
        };
        self.write_line(&entry);

        if let MessageLogMode::Diffed = self.mode {
            self.previous.insert(path.to_string(), body.clone());
        }
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}

/// Collect `(path, old, new)` for every leaf that differs. Arrays are
/// compared element-wise by index.
fn diff_json(
    previous: &Value,
    current: &Value,
    prefix: &str,
    changes: &mut Vec<(String, Value, Value)>,
) {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    };
    match (previous, current) {
        (Value::Object(prev), Value::Object(curr)) => {
            for (key, curr_val) in curr {
                let prev_val = prev.get(key).unwrap_or(&Value::Null);
                diff_json(prev_val, curr_val, &join(key), changes);
            }
            for (key, prev_val) in prev {
                if !curr.contains_key(key) {
                    changes.push((join(key), prev_val.clone(), Value::Null));
                }
            }
        }
        (Value::Array(prev), Value::Array(curr)) => {
            for i in 0..prev.len().max(curr.len()) {
                let p = prev.get(i).unwrap_or(&Value::Null);
                let c = curr.get(i).unwrap_or(&Value::Null);
                diff_json(p, c, &join(&i.to_string()), changes);
            }
        }
        (p, c) if p != c => changes.push((prefix.to_string(), p.clone(), c.clone())),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn read_lines(path: &str) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn log_request_writes_ndjson() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        logger.log_request(
            "get_sched_json.php",
            &vec![("controller_id".to_string(), "9".to_string())],
        );

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "req");
        assert_eq!(lines[0]["method"], "GET");
        assert_eq!(lines[0]["params"]["controller_id"], "9");
        assert!(lines[0]["ts"].as_str().is_some());
    }

    #[test]
    fn log_command_captures_relay() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        logger.log_command("run", Some(3));
        logger.log_command("stopall", None);

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "cmd");
        assert_eq!(lines[0]["action"], "run");
        assert_eq!(lines[0]["relay"], 3);
        assert!(lines[1]["relay"].is_null());
    }

    #[test]
    fn diffed_mode_logs_full_first_then_changes() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, path).unwrap();

        let body1 = json!({"time": 100, "relays": [{"relay_id": 1, "time": 60}]});
        let body2 = json!({"time": 130, "relays": [{"relay_id": 1, "time": 30}]});
        logger.log_response("statusschedule.php", &body1);
        logger.log_response("statusschedule.php", &body2);

        let lines = read_lines(path);
        assert_eq!(lines[0]["full"], true);
        assert!(lines[0]["body"].is_object());
        let changes = lines[1]["changes"].as_array().unwrap();
        let paths: Vec<&str> = changes.iter().map(|c| c["path"].as_str().unwrap()).collect();
        assert!(paths.contains(&"time"));
        assert!(paths.contains(&"relays.0.time"));
    }

    #[test]
    fn diffed_mode_tracks_each_endpoint_separately() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, path).unwrap();

        logger.log_response("statusschedule.php", &json!({"time": 1}));
        logger.log_response("setzone.php", &json!({"message": "ok"}));
        logger.log_response("statusschedule.php", &json!({"time": 1}));

        let lines = read_lines(path);
        assert_eq!(lines[1]["full"], true);
        assert_eq!(lines[2]["changes"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn full_mode_always_writes_body() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        let body = json!({"relays": []});
        logger.log_response("get_sched_json.php", &body);
        logger.log_response("get_sched_json.php", &body);

        let lines = read_lines(path);
        assert_eq!(lines.len(), 2);
        assert!(lines[1]["body"].is_object());
        assert!(lines[1].get("changes").is_none());
    }

    #[test]
    fn diff_reports_removed_keys() {
        let mut changes = Vec::new();
        diff_json(&json!({"a": 1, "b": 2}), &json!({"a": 1}), "", &mut changes);
        assert_eq!(changes, vec![("b".to_string(), json!(2), Value::Null)]);
    }
}
