//! Teacher-side roster of active students.

use std::collections::BTreeMap;

use bytes::Bytes;
use tracing::{debug, info};

use crate::protocol::TelemetryData;
use crate::types::ConnectionStatus;

/// Decoded RGBA thumbnail of the latest forwarded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    /// Bumped on every replacement so the GUI knows when to re-upload.
    pub seq:    u64,
    pub width:  u32,
    pub height: u32,
    pub rgba:   Bytes,
}

/// Telemetry keyed by student id, iterated in id order.
#[derive(Debug, Clone, Default)]
pub struct TeacherRoster {
    pub status: ConnectionStatus,
    students:   BTreeMap<String, TelemetryData>,
    thumbnails: BTreeMap<String, Thumbnail>,
    next_seq:   u64,
}

impl TeacherRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a record, or drop it when the state is `OFFLINE`.
    pub fn apply_telemetry(&mut self, data: TelemetryData) {
        if data.is_offline() {
            if self.students.remove(&data.student_id).is_some() {
                info!("Student {} went offline", data.student_id);
            }
            self.thumbnails.remove(&data.student_id);
            return;
        }
        if !self.students.contains_key(&data.student_id) {
            info!("Student {} ({}) joined", data.student_id, data.name);
        }
        self.students.insert(data.student_id.clone(), data);
    }

    /// Store the latest frame for `student_id`.
    pub fn set_thumbnail(&mut self, student_id: &str, width: u32, height: u32, rgba: Bytes) {
        self.next_seq += 1;
        debug!("Thumbnail #{} for {} ({}x{})", self.next_seq, student_id, width, height);
        self.thumbnails.insert(
            student_id.to_owned(),
            Thumbnail { seq: self.next_seq, width, height, rgba },
        );
    }

    /// Move the connection lifecycle forward; illegal transitions are ignored.
    pub fn set_status(&mut self, next: ConnectionStatus) -> bool {
        if self.status.can_transition_to(&next) {
            self.status = next;
            true
        } else {
            false
        }
    }

    pub fn get(&self, student_id: &str) -> Option<&TelemetryData> {
        self.students.get(student_id)
    }

    pub fn thumbnail(&self, student_id: &str) -> Option<&Thumbnail> {
        self.thumbnails.get(student_id)
    }

    pub fn students(&self) -> impl Iterator<Item = &TelemetryData> {
        self.students.values()
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{decode, TeacherInbound};

    fn telemetry(json: &str) -> TelemetryData {
        match decode::<TeacherInbound>(json).unwrap() {
            TeacherInbound::TelemetryUpdate { data } => data,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn offline_removes_student() {
        let mut roster = TeacherRoster::new();
        roster.apply_telemetry(telemetry(
            r#"{"type":"telemetry_update","data":{"studentId":"S1","name":"Ana","state":"Happy","engagement_score":0.8}}"#,
        ));
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.get("S1").unwrap().engagement_score, 0.8);

        roster.apply_telemetry(telemetry(
            r#"{"type":"telemetry_update","data":{"studentId":"S1","state":"OFFLINE"}}"#,
        ));
        assert!(roster.is_empty());
        assert!(roster.get("S1").is_none());
    }

    #[test]
    fn update_replaces_record() {
        let mut roster = TeacherRoster::new();
        roster.apply_telemetry(telemetry(
            r#"{"type":"telemetry_update","data":{"studentId":"S1","name":"Ana","state":"ENGAGED","raw_state":"Happy","engagement_score":0.9}}"#,
        ));
        roster.apply_telemetry(telemetry(
            r#"{"type":"telemetry_update","data":{"studentId":"S1","name":"Ana","state":"NOT_PRESENT","raw_state":"No Face","engagement_score":0}}"#,
        ));
        let rec = roster.get("S1").unwrap();
        assert_eq!(rec.display_state(), "No Face");
        assert_eq!(rec.engagement_score, 0.0);
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn students_iterate_in_id_order() {
        let mut roster = TeacherRoster::new();
        for id in ["ZZ", "AA", "MM"] {
            roster.apply_telemetry(telemetry(&format!(
                r#"{{"type":"telemetry_update","data":{{"studentId":"{id}","state":"FOCUSED"}}}}"#
            )));
        }
        let ids: Vec<_> = roster.students().map(|s| s.student_id.as_str()).collect();
        assert_eq!(ids, ["AA", "MM", "ZZ"]);
    }

    #[test]
    fn thumbnails_follow_student_lifetime() {
        let mut roster = TeacherRoster::new();
        roster.set_thumbnail("S1", 2, 1, Bytes::from_static(&[0; 8]));
        roster.set_thumbnail("S1", 2, 1, Bytes::from_static(&[1; 8]));
        assert_eq!(roster.thumbnail("S1").unwrap().seq, 2);

        roster.apply_telemetry(telemetry(
            r#"{"type":"telemetry_update","data":{"studentId":"S1","state":"OFFLINE"}}"#,
        ));
        assert!(roster.thumbnail("S1").is_none());
    }
}
