use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::SessionError;
use crate::types::Role;

pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8000/ws";
pub const DEFAULT_CLASS_ID: &str = "CLASS_A";

/// Client configuration shared by the student and teacher views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    #[serde(alias = "serverUrl")]
    pub server_url: String,
    #[serde(alias = "classId")]
    pub class_id: String,
    #[serde(alias = "captureIntervalMs")]
    pub capture_interval_ms: u64,
    /// JPEG quality, 1..=100.
    #[serde(alias = "jpegQuality")]
    pub jpeg_quality: u8,
    #[serde(alias = "captureWidth")]
    pub capture_width: u32,
    #[serde(alias = "captureHeight")]
    pub capture_height: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_owned(),
            class_id: DEFAULT_CLASS_ID.to_owned(),
            capture_interval_ms: 250,
            jpeg_quality: 60,
            capture_width: 640,
            capture_height: 480,
        }
    }
}

impl ClientConfig {
    /// Defaults, overridden by `SMARTSESSION_SERVER_URL`,
    /// `SMARTSESSION_CLASS_ID` and `SMARTSESSION_JPEG_QUALITY` when set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        if let Some(url) = lookup("SMARTSESSION_SERVER_URL") {
            cfg.server_url = url.trim_end_matches('/').to_owned();
        }
        if let Some(class_id) = lookup("SMARTSESSION_CLASS_ID") {
            cfg.class_id = class_id;
        }
        if let Some(quality) = lookup("SMARTSESSION_JPEG_QUALITY") {
            match quality.parse::<u8>() {
                Ok(q) => cfg.jpeg_quality = q,
                Err(_) => warn!("Ignoring SMARTSESSION_JPEG_QUALITY={:?}: not a number", quality),
            }
        }
        cfg
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        let invalid = |reason: &str| SessionError::ConfigurationInvalid { reason: reason.to_owned() };
        if self.server_url.is_empty() {
            return Err(invalid("server_url is empty"));
        }
        if !(self.server_url.starts_with("ws://") || self.server_url.starts_with("wss://")) {
            return Err(invalid("server_url must use the ws:// or wss:// scheme"));
        }
        if self.capture_interval_ms == 0 {
            return Err(invalid("capture_interval_ms must be greater than zero"));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(invalid("jpeg_quality must be within 1..=100"));
        }
        Ok(())
    }

    /// Capture cadence as a `Duration`.
    pub fn capture_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.capture_interval_ms)
    }

    pub fn student_endpoint(&self, student_id: &str) -> Endpoint {
        Endpoint::new(&self.server_url, Role::Student, student_id)
    }

    pub fn teacher_endpoint(&self) -> Endpoint {
        Endpoint::new(&self.server_url, Role::Teacher, &self.class_id)
    }
}

// MARK: - Endpoint

/// Role-scoped WebSocket endpoint, e.g. `ws://localhost:8000/ws/student/AB12C`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub role: Role,
    pub scope: String,
    url: String,
}

impl Endpoint {
    pub fn new(base: &str, role: Role, scope: &str) -> Self {
        let url = format!("{}/{}/{}", base.trim_end_matches('/'), role.path_segment(), scope);
        Self { role, scope: scope.to_owned(), url }
    }

    pub fn student(base: &str, student_id: &str) -> Self {
        Self::new(base, Role::Student, student_id)
    }

    pub fn teacher(base: &str, class_id: &str) -> Self {
        Self::new(base, Role::Teacher, class_id)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoints_match_server_routes() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.student_endpoint("AB12C").url(), "ws://localhost:8000/ws/student/AB12C");
        assert_eq!(cfg.teacher_endpoint().url(), "ws://localhost:8000/ws/teacher/CLASS_A");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserializes_camel_case_fields() {
        let json = r#"{
            "serverUrl": "wss://proctor.example/ws",
            "classId": "CLASS_B",
            "jpegQuality": 80
        }"#;
        let cfg: ClientConfig = serde_json::from_str(json).expect("valid camelCase config");
        assert_eq!(cfg.server_url, "wss://proctor.example/ws");
        assert_eq!(cfg.class_id, "CLASS_B");
        assert_eq!(cfg.jpeg_quality, 80);
        assert_eq!(cfg.capture_interval_ms, 250);
    }

    #[test]
    fn env_overrides_apply() {
        let cfg = ClientConfig::from_lookup(|key| match key {
            "SMARTSESSION_SERVER_URL" => Some("ws://10.0.0.5:9000/ws/".to_owned()),
            "SMARTSESSION_JPEG_QUALITY" => Some("abc".to_owned()),
            _ => None,
        });
        assert_eq!(cfg.server_url, "ws://10.0.0.5:9000/ws");
        assert_eq!(cfg.jpeg_quality, 60);
        assert_eq!(cfg.student_endpoint("X").url(), "ws://10.0.0.5:9000/ws/student/X");
    }

    #[test]
    fn rejects_bad_values() {
        let mut cfg = ClientConfig::default();
        cfg.jpeg_quality = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = ClientConfig::default();
        cfg.server_url = "http://localhost:8000/ws".into();
        assert!(cfg.validate().is_err());

        let mut cfg = ClientConfig::default();
        cfg.capture_interval_ms = 0;
        assert!(cfg.validate().is_err());
    }
}
