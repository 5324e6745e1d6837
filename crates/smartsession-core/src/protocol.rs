//! JSON wire messages exchanged with the SmartSession server.
//!
//! Every message is a JSON object tagged by its `type` field:
//!
//! ```text
//! student → server   {"type":"frame", "studentId", "name", "image", "timestamp"}
//! server  → student  {"type":"feedback", "payload": {"state", "message"}}
//!                    {"type":"peer_update", "peers": [...]}
//!                    {"type":"teacher_status", "status": "ONLINE" | "OFFLINE"}
//! server  → teacher  {"type":"telemetry_update", "data": {...}}
//!                    {"type":"student_frame", "studentId", "image"}
//! ```
//!
//! Unrecognised `type` values decode to the `Unknown` variant and are ignored
//! by the reducers.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::ProtocolError;
use crate::types::{Feedback, StudentIdentity};

/// State value that removes a student from the teacher roster.
pub const OFFLINE_STATE: &str = "OFFLINE";

// ── Outbound (student → server) ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StudentOutbound {
    Frame(FrameMessage),
}

/// One captured frame, encoded as a JPEG data URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMessage {
    #[serde(rename = "studentId")]
    pub student_id: String,
    pub name: String,
    /// `data:image/jpeg;base64,...`
    pub image: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl FrameMessage {
    pub fn new(identity: &StudentIdentity, image: String, timestamp: u64) -> Self {
        Self {
            student_id: identity.id.clone(),
            name: identity.name.clone(),
            image,
            timestamp,
        }
    }

    /// Wrap into the tagged outbound envelope.
    pub fn into_outbound(self) -> StudentOutbound {
        StudentOutbound::Frame(self)
    }
}

// ── Inbound (server → student) ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StudentInbound {
    Feedback { payload: Feedback },
    PeerUpdate {
        #[serde(default, deserialize_with = "null_as_default")]
        peers: Vec<String>,
    },
    /// A missing or null `status` reads as offline.
    TeacherStatus {
        #[serde(default, deserialize_with = "null_as_default")]
        status: String,
    },
    #[serde(other)]
    Unknown,
}

// ── Inbound (server → teacher) ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TeacherInbound {
    TelemetryUpdate { data: TelemetryData },
    StudentFrame {
        #[serde(rename = "studentId")]
        student_id: String,
        /// Bare base64 JPEG (no data-URI prefix).
        image: String,
    },
    #[serde(other)]
    Unknown,
}

/// Per-student telemetry snapshot broadcast to teachers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryData {
    #[serde(rename = "studentId")]
    pub student_id: String,
    #[serde(default = "unknown_name")]
    pub name: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_state: Option<String>,
    #[serde(default)]
    pub engagement_score: f64,
    #[serde(default)]
    pub confusion_index: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gaze: Option<String>,
    /// Server clock, seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn unknown_name() -> String {
    "Unknown".to_owned()
}

impl TelemetryData {
    pub fn is_offline(&self) -> bool {
        self.state == OFFLINE_STATE
    }

    /// Label used for colour and badge: the raw classifier state when the
    /// server sent one, otherwise the normalised state.
    pub fn display_state(&self) -> &str {
        self.raw_state.as_deref().unwrap_or(&self.state)
    }
}

/// Parse one text frame into a typed inbound message.
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}
