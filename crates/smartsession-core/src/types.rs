use serde::{Deserialize, Serialize};

// MARK: - Role

/// Which side of the classroom a client connects as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    /// Path segment used in the WebSocket endpoint.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path_segment())
    }
}

// MARK: - StudentIdentity

const ID_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ID_LEN: usize = 5;

/// Locally generated student identity. Not validated by the server and not
/// guaranteed unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentIdentity {
    pub id: String,
    pub name: String,
}

impl StudentIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }

    /// Random 5-character base-36 id and a `"Student N"` display name.
    pub fn generate() -> Self {
        let mut bits = uuid::Uuid::new_v4().as_u128();
        let mut id = String::with_capacity(ID_LEN);
        for _ in 0..ID_LEN {
            id.push(ID_ALPHABET[(bits % 36) as usize] as char);
            bits /= 36;
        }
        let number = bits % 100;
        Self { id, name: format!("Student {number}") }
    }
}

// MARK: - FeedbackState

/// Attention label produced by the server-side classifier.
///
/// Only used for styling; unknown labels are carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FeedbackState {
    Happy,
    LookingAway,
    Distracted,
    NoFace,
    MultipleFaces,
    Focused,
    Confused,
    NoFrame,
    Neutral,
    Error,
    Other(String),
}

impl FeedbackState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Happy         => "Happy",
            Self::LookingAway   => "Looking Away",
            Self::Distracted    => "Distracted",
            Self::NoFace        => "No Face",
            Self::MultipleFaces => "Multiple Faces",
            Self::Focused       => "Focused",
            Self::Confused      => "Confused",
            Self::NoFrame       => "No Frame",
            Self::Neutral       => "NEUTRAL",
            Self::Error         => "ERROR",
            Self::Other(s)      => s.as_str(),
        }
    }
}

impl From<&str> for FeedbackState {
    fn from(s: &str) -> Self {
        match s {
            "Happy"          => Self::Happy,
            "Looking Away"   => Self::LookingAway,
            "Distracted"     => Self::Distracted,
            "No Face"        => Self::NoFace,
            "Multiple Faces" => Self::MultipleFaces,
            "Focused"        => Self::Focused,
            "Confused"       => Self::Confused,
            "No Frame"       => Self::NoFrame,
            "NEUTRAL"        => Self::Neutral,
            "ERROR"          => Self::Error,
            other            => Self::Other(other.to_owned()),
        }
    }
}

impl From<String> for FeedbackState {
    fn from(s: String) -> Self {
        match Self::from(s.as_str()) {
            Self::Other(_) => Self::Other(s),
            known => known,
        }
    }
}

impl From<FeedbackState> for String {
    fn from(state: FeedbackState) -> Self {
        match state {
            FeedbackState::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

impl std::fmt::Display for FeedbackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// MARK: - Feedback

pub const CAMERA_DENIED_MESSAGE: &str = "Camera access denied. Please allow camera permissions.";

/// Classifier feedback shown on the student self-view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub state: FeedbackState,
    #[serde(default)]
    pub message: String,
}

impl Default for Feedback {
    fn default() -> Self {
        Self { state: FeedbackState::Neutral, message: "Initializing...".to_owned() }
    }
}

impl Feedback {
    /// Static state shown when the camera cannot be opened.
    pub fn camera_denied() -> Self {
        Self { state: FeedbackState::Error, message: CAMERA_DENIED_MESSAGE.to_owned() }
    }
}

// MARK: - ConnectionStatus

/// Connection lifecycle shared by both roles.
///
/// `Connecting → Connected → Disconnected`, or `Connecting → Error` when the
/// connection cannot even be constructed. There is no way back to
/// `Connecting`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Connected,
    Disconnected,
    Error(String),
}

impl ConnectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Connecting   => "CONNECTING",
            Self::Connected    => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
            Self::Error(_)     => "CONNECTION ERROR",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Error(_))
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: &ConnectionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Connected)
                | (Self::Connecting, Self::Disconnected)
                | (Self::Connecting, Self::Error(_))
                | (Self::Connected, Self::Disconnected)
        )
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// MARK: - TeacherPresence

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TeacherPresence {
    Online,
    #[default]
    Offline,
}

impl TeacherPresence {
    /// Anything other than `"ONLINE"` counts as offline.
    pub fn from_status(status: &str) -> Self {
        if status == "ONLINE" {
            Self::Online
        } else {
            Self::Offline
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}
