//! Session snapshot store.
//!
//! ARCHITECTURE
//! ============
//! `SessionSnapshot` is the locally cached, authoritative view of one live
//! session. It is single-writer: only the reconciler, driven by the
//! connection task's message delivery, mutates it, while any number of render
//! consumers read clones through a watch channel. Derived state
//! (`current_slide`) is re-resolved on every mutation that could invalidate
//! it, so index and materialized slide never disagree after an event has been
//! fully processed.

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

/// Server-declared lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Init,
    Live,
    Started,
    Paused,
    Ended,
    Cancelled,
}

impl SessionStatus {
    /// Terminal statuses end the session; no later event may change state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Cancelled)
    }
}

/// Health of the push channel, written only by the connection task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// A channel open request is in flight.
    Connecting,
    /// The channel is live and the heartbeat is running.
    Connected,
    /// Waiting out the back-off delay before retry number `attempt`.
    Reconnecting { attempt: u32 },
    /// Caller-initiated teardown, or the session reached a terminal status.
    Disconnected,
    /// Retry budget exhausted, or identity was incomplete at connect time.
    Error,
}

/// What a slide displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlideKind {
    /// Question with options; payload in `question`.
    Quiz,
    /// Freeform drawing; content addressed by `canvas_ref`.
    Canvas,
    /// Anything this client version does not render specially.
    #[default]
    Other,
}

/// Kinds this client does not know still carry a displayable slide, so
/// unknown wire values map to `Other` instead of rejecting the payload.
impl<'de> Deserialize<'de> for SlideKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let kind = String::deserialize(deserializer)?;
        Ok(match kind.as_str() {
            "quiz" => Self::Quiz,
            "canvas" => Self::Canvas,
            _ => Self::Other,
        })
    }
}

/// One unit of displayed content within a session.
///
/// `id` is the stable identity; `order` is the position in the deck and may
/// change independently of the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    pub id: String,
    pub order: i64,
    #[serde(default)]
    pub kind: SlideKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Question payload for quiz slides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<serde_json::Value>,
    /// Content reference for canvas slides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas_ref: Option<String>,
}

/// Slide list envelope as the detail endpoint ships it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlideBundle {
    #[serde(default)]
    pub added_slides: Vec<Slide>,
}

/// Full session detail payload from the REST bootstrap / re-fetch endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionDetail {
    pub session_id: String,
    #[serde(default)]
    pub invite_code: Option<String>,
    #[serde(default = "SessionDetail::default_status")]
    pub status: SessionStatus,
    #[serde(default)]
    pub slides: SlideBundle,
    #[serde(default)]
    pub current_slide_index: i64,
}

impl SessionDetail {
    fn default_status() -> SessionStatus {
        SessionStatus::Init
    }
}

/// Locally cached view of a learner's live session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub invite_code: String,
    pub username: String,
    pub status: SessionStatus,
    /// Slides unique by `id`, addressable by `order`.
    pub slides: Vec<Slide>,
    /// Pointer into the `order` space; may not resolve to a slide in `slides`.
    pub current_slide_index: i64,
    /// Cache of the slide matching `current_slide_index`. Absent when the
    /// index refers to a slide not yet synced locally.
    pub current_slide: Option<Slide>,
    pub connection: ConnectionState,
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    /// Build the initial snapshot from an already-fetched session detail.
    #[must_use]
    pub fn from_detail(detail: &SessionDetail, invite_code: &str, username: &str) -> Self {
        let invite_code = if invite_code.is_empty() {
            detail.invite_code.clone().unwrap_or_default()
        } else {
            invite_code.to_owned()
        };
        let mut snapshot = Self {
            session_id: detail.session_id.clone(),
            invite_code,
            username: username.to_owned(),
            status: detail.status,
            slides: dedupe_by_id(detail.slides.added_slides.clone()),
            current_slide_index: detail.current_slide_index,
            current_slide: None,
            connection: ConnectionState::Connecting,
            last_error: None,
        };
        snapshot.resolve_current_slide();
        snapshot
    }

    /// Look up the slide whose `order` matches, if any.
    #[must_use]
    pub fn slide_at_order(&self, order: i64) -> Option<&Slide> {
        self.slides.iter().find(|slide| slide.order == order)
    }

    /// Re-derive `current_slide` from `current_slide_index`.
    pub(crate) fn resolve_current_slide(&mut self) {
        self.current_slide = self.slide_at_order(self.current_slide_index).cloned();
    }

    /// Replace a slide matching by `id`. Returns `false` when no slide with
    /// that id exists (the list is left unchanged).
    pub(crate) fn upsert_slide(&mut self, slide: &Slide) -> bool {
        let Some(existing) = self.slides.iter_mut().find(|s| s.id == slide.id) else {
            return false;
        };
        *existing = slide.clone();
        true
    }

    /// Wholesale slide-list replacement from a detail re-fetch. A no-op once
    /// the session is terminal.
    pub(crate) fn replace_slides(&mut self, slides: Vec<Slide>, current_slide_index: i64) {
        if self.status.is_terminal() {
            return;
        }
        self.slides = dedupe_by_id(slides);
        self.current_slide_index = current_slide_index;
        self.resolve_current_slide();
    }
}

/// Keep the last occurrence of each slide id, preserving arrival order.
fn dedupe_by_id(slides: Vec<Slide>) -> Vec<Slide> {
    let mut out: Vec<Slide> = Vec::with_capacity(slides.len());
    for slide in slides {
        if let Some(existing) = out.iter_mut().find(|s| s.id == slide.id) {
            *existing = slide;
        } else {
            out.push(slide);
        }
    }
    out
}
