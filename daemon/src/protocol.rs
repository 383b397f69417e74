//! IPC protocol definitions (JSON messages)

use crate::config::Thresholds;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    Ping,
    StartTracking,
    StopTracking,
    GetStatus,
    GetConfig,
    UpdateConfig { params: UpdateConfigParams },
    SessionLoaded,
    ReportSubject { params: ReportSubjectParams },
    ClearSubject,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateConfigParams {
    #[serde(default)]
    pub shake_threshold: Option<f64>,
    #[serde(default)]
    pub range_limit: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSubjectParams {
    pub container: String,
    pub item: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong,
    Response { id: Option<String>, data: serde_json::Value },
    Status { data: StatusData },
    Config { data: ConfigData },
    Disconnect { data: DisconnectData },
    Info { data: InfoData },
}

impl Response {
    pub fn ok() -> Self {
        Response::Response {
            id: None,
            data: serde_json::json!({"success": true}),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Response {
            id: None,
            data: serde_json::json!({"error": message.into()}),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusData {
    pub running: bool,
    pub subject: Option<String>,
    pub disconnect_count: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfigData {
    pub shake_threshold: f64,
    pub range_limit: f64,
}

impl From<Thresholds> for ConfigData {
    fn from(t: Thresholds) -> Self {
        Self {
            shake_threshold: t.shake_threshold,
            range_limit: t.range_limit,
        }
    }
}

/// Command for the editor: drop every link on this node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectData {
    pub container: String,
    pub item: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoData {
    pub message: String,
}
