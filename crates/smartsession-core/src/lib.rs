pub mod config;
pub mod errors;
pub mod protocol;
pub mod roster;
pub mod sink;
pub mod student;
pub mod types;
pub mod view;

pub use config::{ClientConfig, Endpoint};
pub use errors::{ProtocolError, SessionError};
pub use protocol::{FrameMessage, StudentInbound, TeacherInbound, TelemetryData};
pub use roster::{TeacherRoster, Thumbnail};
pub use sink::FrameSink;
pub use student::StudentView;
pub use types::*;
pub use view::StatusTone;
