use serde::de::DeserializeOwned;
use smartsession_core::protocol;
use tracing::warn;

/// Decode one text frame. Malformed payloads are logged and dropped so a bad
/// message never ends the session.
pub fn decode_inbound<T: DeserializeOwned>(text: &str) -> Option<T> {
    match protocol::decode::<T>(text) {
        Ok(msg) => Some(msg),
        Err(e) => {
            let preview: String = text.chars().take(80).collect();
            warn!("Dropping malformed message ({}): {:?}", e, preview);
            None
        }
    }
}
