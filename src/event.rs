//! Inbound push-channel events.
//!
//! Every payload on the session channel deserializes into one flat
//! [`SessionEvent`]. Any subset of fields may be present; an absent field
//! requests no change. Interpretation and ordering of the fields lives in
//! [`crate::reconcile`].

use serde::Deserialize;

use crate::session::{SessionStatus, Slide};

#[cfg(test)]
#[path = "event_test.rs"]
mod tests;

/// Recognized values of the optional `type` discriminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Slide-change event; implies a session start when the session is
    /// still in `INIT`.
    CurrentSlide,
    /// Server-signaled error; `message` carries the text.
    Error,
    /// Anything else. Carried for logging, otherwise ignored.
    Other(String),
}

/// One inbound session event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionEvent {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub status: Option<SessionStatus>,
    pub current_slide_index: Option<i64>,
    pub slide_data: Option<Slide>,
    pub message: Option<String>,
}

impl SessionEvent {
    /// Decode a raw channel payload.
    ///
    /// # Errors
    ///
    /// Returns the underlying serde error for malformed payloads; callers log
    /// and drop the event, leaving the snapshot unchanged.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Classify the `type` discriminator, if present.
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        self.event_type.as_deref().map(|t| match t {
            "CURRENT_SLIDE" => EventKind::CurrentSlide,
            "ERROR" => EventKind::Error,
            other => EventKind::Other(other.to_owned()),
        })
    }
}
