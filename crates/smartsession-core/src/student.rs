//! Student self-view state and the reducer that applies inbound messages.

use tracing::debug;

use crate::protocol::StudentInbound;
use crate::types::{ConnectionStatus, Feedback, StudentIdentity, TeacherPresence};
use crate::view::StatusTone;

#[derive(Debug, Clone, PartialEq)]
pub struct StudentView {
    pub identity: StudentIdentity,
    pub status:   ConnectionStatus,
    pub feedback: Feedback,
    /// Replaced wholesale by every `peer_update`.
    pub peers:    Vec<String>,
    pub teacher:  TeacherPresence,
}

impl StudentView {
    pub fn new(identity: StudentIdentity) -> Self {
        Self {
            identity,
            status:   ConnectionStatus::default(),
            feedback: Feedback::default(),
            peers:    Vec::new(),
            teacher:  TeacherPresence::default(),
        }
    }

    /// Apply one inbound message. Returns `true` if anything visible changed.
    pub fn apply(&mut self, msg: StudentInbound) -> bool {
        match msg {
            StudentInbound::Feedback { payload } => {
                let changed = self.feedback != payload;
                self.feedback = payload;
                changed
            }
            StudentInbound::PeerUpdate { peers } => {
                let changed = self.peers != peers;
                self.peers = peers;
                changed
            }
            StudentInbound::TeacherStatus { status } => {
                let presence = TeacherPresence::from_status(&status);
                let changed = self.teacher != presence;
                self.teacher = presence;
                changed
            }
            StudentInbound::Unknown => {
                debug!("Ignoring message with unknown type");
                false
            }
        }
    }

    /// Move the connection lifecycle forward; illegal transitions are ignored.
    pub fn set_status(&mut self, next: ConnectionStatus) -> bool {
        if self.status.can_transition_to(&next) {
            self.status = next;
            true
        } else {
            debug!("Ignoring status transition {} -> {}", self.status, next);
            false
        }
    }

    /// Camera could not be opened: show the static error state.
    pub fn camera_failed(&mut self) {
        self.feedback = Feedback::camera_denied();
    }

    /// Border colour of the self-view, keyed on the feedback state.
    pub fn border_tone(&self) -> StatusTone {
        StatusTone::for_state(self.feedback.state.as_str())
    }

    /// Roster entry as displayed; the local student shows as "Me".
    pub fn peer_label<'a>(&self, peer_id: &'a str) -> &'a str {
        if peer_id == self.identity.id {
            "Me"
        } else {
            peer_id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode;
    use crate::types::FeedbackState;

    fn view() -> StudentView {
        StudentView::new(StudentIdentity::new("ME001", "Student 1"))
    }

    #[test]
    fn starts_neutral_and_offline() {
        let v = view();
        assert_eq!(v.status, ConnectionStatus::Connecting);
        assert_eq!(v.feedback.state, FeedbackState::Neutral);
        assert_eq!(v.feedback.message, "Initializing...");
        assert_eq!(v.teacher, TeacherPresence::Offline);
        assert_eq!(v.border_tone(), StatusTone::Neutral);
    }

    #[test]
    fn peer_update_replaces_roster() {
        let mut v = view();
        v.apply(StudentInbound::PeerUpdate { peers: vec!["A".into(), "B".into()] });
        v.apply(StudentInbound::PeerUpdate { peers: vec!["C".into()] });
        assert_eq!(v.peers, vec!["C".to_owned()]);
    }

    #[test]
    fn null_peer_list_clears_roster() {
        let mut v = view();
        v.apply(StudentInbound::PeerUpdate { peers: vec!["A".into()] });
        let msg = decode(r#"{"type":"peer_update","peers":null}"#).unwrap();
        assert!(v.apply(msg));
        assert!(v.peers.is_empty());
    }

    #[test]
    fn teacher_status_without_value_is_offline() {
        let mut v = view();
        v.apply(StudentInbound::TeacherStatus { status: "ONLINE".into() });
        let msg = decode(r#"{"type":"teacher_status","status":null}"#).unwrap();
        assert!(v.apply(msg));
        assert_eq!(v.teacher, TeacherPresence::Offline);

        v.apply(StudentInbound::TeacherStatus { status: "ONLINE".into() });
        assert!(v.apply(decode(r#"{"type":"teacher_status"}"#).unwrap()));
        assert!(!v.teacher.is_online());
    }

    #[test]
    fn feedback_drives_border_tone() {
        let mut v = view();
        let msg = decode(r#"{"type":"feedback","payload":{"state":"Looking Away","message":"Eyes on screen"}}"#).unwrap();
        assert!(v.apply(msg));
        assert_eq!(v.border_tone(), StatusTone::Caution);
        assert_eq!(v.feedback.message, "Eyes on screen");
    }

    #[test]
    fn teacher_status_toggles_presence() {
        let mut v = view();
        assert!(v.apply(StudentInbound::TeacherStatus { status: "ONLINE".into() }));
        assert!(v.teacher.is_online());
        assert!(!v.apply(StudentInbound::TeacherStatus { status: "ONLINE".into() }));
        v.apply(StudentInbound::TeacherStatus { status: "OFFLINE".into() });
        assert!(!v.teacher.is_online());
    }

    #[test]
    fn camera_failure_is_static_error() {
        let mut v = view();
        v.camera_failed();
        assert_eq!(v.feedback.state, FeedbackState::Error);
        assert_eq!(v.border_tone(), StatusTone::Neutral);
    }

    #[test]
    fn lifecycle_is_one_way() {
        let mut v = view();
        assert!(v.set_status(ConnectionStatus::Connected));
        assert!(v.set_status(ConnectionStatus::Disconnected));
        assert!(!v.set_status(ConnectionStatus::Connected));
        assert_eq!(v.status, ConnectionStatus::Disconnected);
    }

    #[test]
    fn self_shows_as_me() {
        let v = view();
        assert_eq!(v.peer_label("ME001"), "Me");
        assert_eq!(v.peer_label("XY999"), "XY999");
    }
}
