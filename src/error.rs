use serde::Serialize;
use thiserror::Error;

use crate::session::SessionState;

#[derive(Debug, Error)]
pub enum GeoSessionError {
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
}

// Hosts receive errors as plain strings
impl Serialize for GeoSessionError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GeoSessionError>;
