//! Push-event reconciler.
//!
//! DESIGN
//! ======
//! `apply` folds one inbound event into the snapshot and reports the side
//! effects the connection task must execute. It is deterministic and free of
//! I/O, so the rule ordering is testable without a live channel.
//!
//! Rules run in a fixed order because later rules are gated by earlier ones:
//! the implicit start-on-first-slide must precede the explicit status
//! overwrite (some deployments send the first slide-change before any status
//! transition), and a full slide replacement must win over whatever the index
//! navigation resolved.

use tracing::debug;

use crate::event::{EventKind, SessionEvent};
use crate::session::{SessionSnapshot, SessionStatus};

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod tests;

/// User-facing notification raised while folding events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// The push channel came up (first connect or reconnect).
    Connected,
    /// The session left `INIT`, explicitly or via the first slide-change.
    SessionStarted,
    /// The session reached `ENDED` or `CANCELLED`.
    SessionEnded,
}

/// Effects requested by one applied event.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Applied {
    pub notices: Vec<Notice>,
    /// Terminal status reached: close the push channel and stop the heartbeat.
    pub close_channel: bool,
}

/// Fold one event into the snapshot.
///
/// Once the session is terminal every further event is a complete no-op; the
/// terminal event is the last one accepted.
pub fn apply(snapshot: &mut SessionSnapshot, event: &SessionEvent) -> Applied {
    let mut applied = Applied::default();

    if snapshot.status.is_terminal() {
        return applied;
    }

    let kind = event.kind();
    let mut started_notified = false;
    let mut state_resolved = false;

    // Rule 1: implicit start on the first slide-change.
    if kind == Some(EventKind::CurrentSlide) && snapshot.status == SessionStatus::Init {
        snapshot.status = SessionStatus::Started;
        applied.notices.push(Notice::SessionStarted);
        started_notified = true;
        state_resolved = true;
    }

    // Rule 2: explicit status overwrite.
    if let Some(status) = event.status {
        let previous = snapshot.status;
        snapshot.status = status;
        state_resolved = true;
        if status.is_terminal() {
            applied.notices.push(Notice::SessionEnded);
            applied.close_channel = true;
        } else if status == SessionStatus::Started
            && previous == SessionStatus::Init
            && !started_notified
        {
            applied.notices.push(Notice::SessionStarted);
        }
    }

    // Rule 3: slide-index navigation. An index with no matching slide leaves
    // `current_slide` absent — a valid transient while slides catch up.
    if let Some(index) = event.current_slide_index
        && !snapshot.slides.is_empty()
    {
        snapshot.current_slide_index = index;
        snapshot.resolve_current_slide();
        state_resolved = true;
    }

    // Rule 4: full slide replacement wins over whatever rule 3 resolved.
    if let Some(slide) = &event.slide_data {
        if !snapshot.upsert_slide(slide) {
            // Upstream quirk, preserved: an unknown id is displayed without
            // joining the slide list, so navigation never offers it.
            debug!(slide_id = %slide.id, "slide replacement for unknown id; list unchanged");
        }
        snapshot.current_slide = Some(slide.clone());
        state_resolved = true;
    }

    // Rule 5: server-signaled error. Non-fatal, does not undo earlier rules.
    if kind == Some(EventKind::Error) {
        snapshot.last_error = event.message.clone();
    } else if state_resolved && !snapshot.status.is_terminal() {
        // A successfully resolved state clears any stale error banner. The
        // terminal event leaves it alone; its message is informational.
        snapshot.last_error = None;
    }

    applied
}
