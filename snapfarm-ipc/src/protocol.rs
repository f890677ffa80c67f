//! Control-plane message types
//!
//! Wire shape: every message is a JSON object with a `type` discriminant;
//! task fields use camelCase to match the render-task request surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Control-plane protocol version for compatibility checking
pub const CONTROL_PROTOCOL_VERSION: u32 = 1;

/// Kind of render task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Open a URL, render it and store the capture
    Snapshot,
    /// Open a URL and report whether it loads
    Validate,
}

/// Viewport dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

/// Clipping rectangle applied to the rendered page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipRect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

/// Cookie installed before the page is opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Caller-supplied render request, shared verbatim between the RPC intake
/// and the task sent to a worker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    pub url: String,

    /// Storage path relative to the configured base; derived from the URL
    /// when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,

    /// Image format used when `storage_path` carries no extension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Render quality, engine-specific scale; negative means engine default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport_size: Option<ViewportSize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_rect: Option<ClipRect>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom_factor: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    #[serde(default = "default_true")]
    pub javascript_enabled: bool,

    #[serde(default = "default_true")]
    pub load_images: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cookies: Vec<Cookie>,

    /// Milliseconds to wait after load before rendering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_render: Option<u64>,

    /// Extract `{title, description}` from the page alongside the capture
    #[serde(default)]
    pub get_summary: bool,
}

impl TaskRequest {
    /// Minimal request for the given URL, everything else defaulted
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            storage_path: None,
            format: None,
            quality: None,
            viewport_size: None,
            clip_rect: None,
            zoom_factor: None,
            user_agent: None,
            javascript_enabled: true,
            load_images: true,
            cookies: Vec::new(),
            delay_render: None,
            get_summary: false,
        }
    }
}

/// A dispatched task as it travels master -> worker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    /// Unique, monotonically increasing per master-process lifetime
    pub id: u64,
    pub kind: TaskKind,
    #[serde(flatten)]
    pub request: TaskRequest,
    pub created_at: DateTime<Utc>,
}

impl TaskSpec {
    pub fn new(id: u64, kind: TaskKind, request: TaskRequest) -> Self {
        Self {
            id,
            kind,
            request,
            created_at: Utc::now(),
        }
    }
}

/// Terminal task status as reported to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Engine opened and captured the page
    Success,
    /// Engine could not open the resource
    Fail,
    /// Deadline elapsed (worker execution deadline or master dispatch timeout)
    Timeout,
}

/// Extracted page summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub title: String,
    pub description: String,
}

/// Snapshot result payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotData {
    /// Path relative to the configured storage base
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<PageSummary>,
}

/// Task outcome as it travels worker -> master and on to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub id: u64,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SnapshotData>,
}

impl TaskReport {
    /// Synthetic outcome used when no worker result arrives in time
    pub fn timeout(id: u64) -> Self {
        Self {
            id,
            status: TaskStatus::Timeout,
            data: None,
        }
    }
}

/// Messages sent from the master to worker processes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerBound {
    /// Run exactly one task
    Task { task: TaskSpec },
}

/// Messages sent from worker processes to the master
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MasterBound {
    /// Sent once the worker's control connection opens; the master
    /// registers (or replaces) the connection for this slot id
    #[serde(rename_all = "camelCase")]
    Connected { worker_id: usize },

    /// Task outcome; `idle` reports whether the worker's local backlog is
    /// now empty
    #[serde(rename_all = "camelCase")]
    Result {
        worker_id: usize,
        task: TaskReport,
        idle: bool,
    },
}

/// Message envelope for all control-plane communications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope<T> {
    pub protocol_version: u32,
    pub timestamp: DateTime<Utc>,
    pub message: T,
}

impl<T> MessageEnvelope<T> {
    /// Create a new message envelope
    pub fn new(message: T) -> Self {
        Self {
            protocol_version: CONTROL_PROTOCOL_VERSION,
            timestamp: Utc::now(),
            message,
        }
    }

    /// Check if protocol version is compatible
    pub fn is_compatible(&self) -> bool {
        self.protocol_version == CONTROL_PROTOCOL_VERSION
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connected_wire_shape() {
        let msg = MasterBound::Connected { worker_id: 3 };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"type": "connected", "workerId": 3}));
    }

    #[test]
    fn test_result_wire_shape() {
        let msg = MasterBound::Result {
            worker_id: 0,
            task: TaskReport {
                id: 7,
                status: TaskStatus::Success,
                data: Some(SnapshotData {
                    path: "example.jpg".to_string(),
                    summary: None,
                }),
            },
            idle: true,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "result");
        assert_eq!(json["workerId"], 0);
        assert_eq!(json["idle"], true);
        assert_eq!(json["task"]["status"], "success");
        assert_eq!(json["task"]["data"]["path"], "example.jpg");
    }

    #[test]
    fn test_task_spec_flattens_request() {
        let spec = TaskSpec::new(1, TaskKind::Snapshot, TaskRequest::for_url("http://example.com/"));
        let json = serde_json::to_value(WorkerBound::Task { task: spec }).unwrap();
        assert_eq!(json["type"], "task");
        assert_eq!(json["task"]["id"], 1);
        assert_eq!(json["task"]["kind"], "snapshot");
        // Request fields sit at the task's top level, camelCased
        assert_eq!(json["task"]["url"], "http://example.com/");
        assert_eq!(json["task"]["javascriptEnabled"], true);
    }

    #[test]
    fn test_task_request_defaults() {
        let req: TaskRequest = serde_json::from_str(r#"{"url": "http://example.com/"}"#).unwrap();
        assert!(req.javascript_enabled);
        assert!(req.load_images);
        assert!(!req.get_summary);
        assert!(req.cookies.is_empty());
    }

    #[test]
    fn test_status_wire_strings() {
        assert_eq!(serde_json::to_string(&TaskStatus::Success).unwrap(), r#""success""#);
        assert_eq!(serde_json::to_string(&TaskStatus::Fail).unwrap(), r#""fail""#);
        assert_eq!(serde_json::to_string(&TaskStatus::Timeout).unwrap(), r#""timeout""#);
    }

    #[test]
    fn test_message_envelope() {
        let envelope = MessageEnvelope::new(MasterBound::Connected { worker_id: 0 });
        assert_eq!(envelope.protocol_version, CONTROL_PROTOCOL_VERSION);
        assert!(envelope.is_compatible());

        let json = serde_json::to_string(&envelope).unwrap();
        let deserialized: MessageEnvelope<MasterBound> = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.protocol_version, envelope.protocol_version);
    }
}
