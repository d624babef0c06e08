use crate::skill::SkillPath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Lifecycle state of a task.
///
/// The router only ever sets `Pending`; the execution side owns the
/// `Running -> Complete | Failed` transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Complete,
    Failed,
}

impl TaskStatus {
    /// True for `Complete` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Complete => write!(f, "complete"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// What a task needs from the agent that will run it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskRequirement {
    #[serde(rename = "path")]
    pub skill_path: SkillPath,
    pub action: String,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

impl TaskRequirement {
    /// Requirement for `action` at `skill_path`.
    pub fn new(skill_path: impl Into<SkillPath>, action: impl Into<String>) -> Self {
        Self {
            skill_path: skill_path.into(),
            action: action.into(),
            parameters: HashMap::new(),
        }
    }
}

/// A unit of work routed to exactly one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Generated when absent on the wire.
    #[serde(default = "new_task_id")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub task_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub requirements: TaskRequirement,
    /// Raw request body; base64 on the wire.
    #[serde(default, with = "payload_base64")]
    pub payload: Vec<u8>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn new_task_id() -> String {
    Uuid::new_v4().to_string()
}

impl Task {
    /// A pending task with a fresh UUID.
    pub fn new(title: impl Into<String>, requirements: TaskRequirement) -> Self {
        let now = Utc::now();
        Self {
            id: new_task_id(),
            task_type: String::new(),
            title: title.into(),
            description: String::new(),
            requirements,
            payload: Vec::new(),
            status: TaskStatus::Pending,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attach a raw payload.
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Attach a JSON payload.
    pub fn with_json_payload(mut self, payload: &serde_json::Value) -> Self {
        self.payload = payload.to_string().into_bytes();
        self
    }

    /// Move to `status` and bump `updated_at`.
    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Outcome reported by the execution side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub task_id: String,
    pub success: bool,
    #[serde(default, with = "payload_base64")]
    pub output: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl TaskResult {
    /// A successful result carrying `output`.
    pub fn success(task_id: impl Into<String>, output: Vec<u8>) -> Self {
        Self {
            task_id: task_id.into(),
            success: true,
            output,
            error: None,
            finished_at: Utc::now(),
        }
    }

    /// A failed result carrying `error`.
    pub fn failure(task_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            success: false,
            output: Vec::new(),
            error: Some(error.into()),
            finished_at: Utc::now(),
        }
    }
}

mod payload_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        match encoded {
            Some(s) => STANDARD.decode(s).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn requirement() -> TaskRequirement {
        TaskRequirement::new(SkillPath::new(["Development", "Backend"]), "generateCode")
    }

    #[test]
    fn test_task_creation() {
        let task = Task::new("Write a handler", requirement());
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 0);
        assert!(task.payload.is_empty());
        assert!(Uuid::parse_str(&task.id).is_ok());
    }

    #[test]
    fn test_payload_is_base64_on_the_wire() {
        let task = Task::new("t", requirement()).with_payload(b"{\"a\":1}".to_vec());
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["payload"], "eyJhIjoxfQ==");
        assert_eq!(json["requirements"]["path"][0], "Development");
        assert_eq!(json["retryCount"], 0);

        let back: Task = serde_json::from_value(json).unwrap();
        assert_eq!(back.payload, b"{\"a\":1}");
    }

    #[test]
    fn test_null_payload_deserializes_empty() {
        let json = serde_json::json!({
            "id": "t-1",
            "requirements": {"path": ["Development"], "action": "x"},
            "payload": null,
            "status": "running"
        });
        let task: Task = serde_json::from_value(json).unwrap();
        assert!(task.payload.is_empty());
        assert_eq!(task.status, TaskStatus::Running);
    }

    #[test]
    fn test_missing_id_is_generated() {
        let json = serde_json::json!({
            "title": "from a file",
            "requirements": {"path": ["Development"], "action": "x"}
        });
        let task: Task = serde_json::from_value(json).unwrap();
        assert!(Uuid::parse_str(&task.id).is_ok());
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn test_set_status_bumps_updated_at() {
        let mut task = Task::new("t", requirement());
        let before = task.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        task.set_status(TaskStatus::Running);
        assert_eq!(task.status, TaskStatus::Running);
        assert!(task.updated_at > before);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Complete.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert_eq!(TaskStatus::Complete.to_string(), "complete");
    }
}
