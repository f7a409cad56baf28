//! Push-channel lifecycle.
//!
//! ARCHITECTURE
//! ============
//! One spawned connection task owns the channel, its reconnect schedule, and
//! the heartbeat — no module-level timers or globals, so several sessions can
//! run side by side (and under test) without cross-contamination. Inbound
//! payloads are folded into the snapshot strictly in arrival order; readers
//! observe the result through a watch channel and never block the task.
//!
//! ERROR HANDLING
//! ==============
//! Channel failures are retried with exponential back-off up to a bound and
//! never surface to callers as errors — only as connection-state transitions
//! on the snapshot. Malformed payloads are logged and dropped. Heartbeat
//! failures are logged and never affect channel state.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::event::SessionEvent;
use crate::reconcile::{self, Notice};
use crate::session::{ConnectionState, SessionDetail, SessionSnapshot};
use crate::sse::{SseDecoder, SseEvent};

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;

/// Channel names multiplexed over the push stream.
const CHANNEL_SESSION: &str = "session";
const CHANNEL_HEARTBEAT: &str = "heartbeat";
const CHANNEL_UPDATE: &str = "update";

const NOTICE_BUFFER: usize = 64;

/// Starts the live push channel for one session.
pub struct ConnectionManager;

impl ConnectionManager {
    /// Build the initial snapshot from the bootstrap detail and spawn the
    /// owned connection task.
    ///
    /// Missing identity (blank session id or username) parks the session in
    /// the `Error` connection state with a descriptive `last_error`; no
    /// connection attempt is made.
    ///
    /// # Errors
    ///
    /// `ClientError::InvalidBaseUrl` / `ClientError::Http` when the transport
    /// cannot be constructed.
    pub fn start(
        config: ClientConfig,
        detail: &SessionDetail,
        invite_code: &str,
        username: &str,
    ) -> Result<SessionHandle, ClientError> {
        let api = Arc::new(ApiClient::new(&config)?);
        let snapshot = SessionSnapshot::from_detail(detail, invite_code, username);

        let (snapshot_tx, snapshot_rx) = watch::channel(snapshot);
        let (notice_tx, notice_rx) = mpsc::channel(NOTICE_BUFFER);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let run = tokio::spawn(run_connection(config, api, snapshot_tx, notice_tx, shutdown_rx));

        Ok(SessionHandle {
            snapshot: snapshot_rx,
            notices: notice_rx,
            shutdown: shutdown_tx,
            run,
        })
    }
}

/// Owned handle to a running session connection.
///
/// Dropping the handle tears the connection down just like [`stop`]; the
/// channel is closed, not left to linger server-side.
///
/// [`stop`]: SessionHandle::stop
pub struct SessionHandle {
    snapshot: watch::Receiver<SessionSnapshot>,
    notices: mpsc::Receiver<Notice>,
    shutdown: watch::Sender<bool>,
    run: JoinHandle<()>,
}

impl SessionHandle {
    /// Clone of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch receiver for render consumers; resolves whenever the snapshot
    /// changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Receive the next user-facing notice. `None` once the connection task
    /// has finished.
    pub async fn notice(&mut self) -> Option<Notice> {
        self.notices.recv().await
    }

    /// Caller-initiated teardown: close the channel, stop the heartbeat, and
    /// clear any pending reconnect timer.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.run.await;
    }

    /// Wait for the connection task to finish on its own (terminal session
    /// status or exhausted retries).
    pub async fn closed(&mut self) {
        let _ = (&mut self.run).await;
    }
}

/// How one connected stretch of the channel ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelEnd {
    /// Caller asked for teardown.
    Shutdown,
    /// The session reached a terminal status.
    Terminal,
    /// The stream failed or closed server-side.
    Dropped,
}

/// Everything a connected stretch needs, minus the pieces that must be
/// borrowed mutably in the select loop (stream, decoder, shutdown).
struct ChannelCtx<'a> {
    api: &'a Arc<ApiClient>,
    snapshot: &'a watch::Sender<SessionSnapshot>,
    notices: &'a mpsc::Sender<Notice>,
    session_id: &'a str,
    username: &'a str,
}

async fn run_connection(
    config: ClientConfig,
    api: Arc<ApiClient>,
    snapshot: watch::Sender<SessionSnapshot>,
    notices: mpsc::Sender<Notice>,
    mut shutdown: watch::Receiver<bool>,
) {
    let (session_id, username) = {
        let current = snapshot.borrow();
        (current.session_id.clone(), current.username.clone())
    };

    if session_id.trim().is_empty() {
        fail(&snapshot, &ClientError::MissingSessionId);
        return;
    }
    if username.trim().is_empty() {
        fail(&snapshot, &ClientError::MissingUsername);
        return;
    }

    let ctx = ChannelCtx {
        api: &api,
        snapshot: &snapshot,
        notices: &notices,
        session_id: &session_id,
        username: &username,
    };

    let mut attempt: u32 = 0;
    loop {
        if *shutdown.borrow() {
            set_connection(&snapshot, ConnectionState::Disconnected);
            return;
        }

        set_connection(&snapshot, ConnectionState::Connecting);
        let end = match api.open_events(&session_id, &username).await {
            Ok(response) => {
                attempt = 0;
                on_connected(&ctx);
                drive_channel(&ctx, config.heartbeat_interval, &mut shutdown, response).await
            }
            Err(error) => {
                warn!(error = %error, session_id = %session_id, "push channel open failed");
                ChannelEnd::Dropped
            }
        };

        match end {
            ChannelEnd::Shutdown | ChannelEnd::Terminal => {
                set_connection(&snapshot, ConnectionState::Disconnected);
                return;
            }
            ChannelEnd::Dropped => {
                attempt += 1;
                let Some(delay) = backoff_delay(attempt, &config) else {
                    fail(&snapshot, &ClientError::RetriesExhausted { attempts: attempt });
                    return;
                };
                set_connection(&snapshot, ConnectionState::Reconnecting { attempt });
                debug!(attempt, delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "reconnect scheduled");
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    _ = shutdown.wait_for(|stop| *stop) => {
                        set_connection(&snapshot, ConnectionState::Disconnected);
                        return;
                    }
                }
            }
        }
    }
}

/// Read the channel until it drops, the session ends, or teardown.
///
/// The heartbeat interval lives inside this loop, so it provably runs only
/// while connected: the first tick fires immediately, then on the configured
/// cadence. Each tick spawns the POST so a slow liveness endpoint never
/// delays event processing.
async fn drive_channel(
    ctx: &ChannelCtx<'_>,
    heartbeat_interval: Duration,
    shutdown: &mut watch::Receiver<bool>,
    response: reqwest::Response,
) -> ChannelEnd {
    let mut stream = response.bytes_stream();
    let mut decoder = SseDecoder::new();
    let mut heartbeat = tokio::time::interval(heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = async { let _ = shutdown.wait_for(|stop| *stop).await; } => return ChannelEnd::Shutdown,
            _ = heartbeat.tick() => spawn_heartbeat(ctx),
            chunk = stream.next() => match chunk {
                Some(Ok(bytes)) => {
                    for event in decoder.push(&bytes) {
                        if dispatch(ctx, &event).await == Dispatch::Terminal {
                            return ChannelEnd::Terminal;
                        }
                    }
                }
                Some(Err(error)) => {
                    warn!(error = %error, session_id = %ctx.session_id, "push channel read failed");
                    return ChannelEnd::Dropped;
                }
                None => {
                    info!(session_id = %ctx.session_id, "push channel closed by server");
                    return ChannelEnd::Dropped;
                }
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    Continue,
    Terminal,
}

async fn dispatch(ctx: &ChannelCtx<'_>, event: &SseEvent) -> Dispatch {
    match event.name.as_str() {
        // Liveness only; the payload is not interpreted.
        CHANNEL_HEARTBEAT => Dispatch::Continue,
        CHANNEL_UPDATE => {
            refetch_detail(ctx).await;
            Dispatch::Continue
        }
        CHANNEL_SESSION | "message" => apply_session_event(ctx, &event.data),
        other => {
            debug!(channel = other, "ignoring unknown event channel");
            Dispatch::Continue
        }
    }
}

fn apply_session_event(ctx: &ChannelCtx<'_>, raw: &str) -> Dispatch {
    let event = match SessionEvent::parse(raw) {
        Ok(event) => event,
        Err(error) => {
            warn!(error = %error, "dropping malformed session event");
            return Dispatch::Continue;
        }
    };

    let mut applied = reconcile::Applied::default();
    ctx.snapshot
        .send_modify(|current| applied = reconcile::apply(current, &event));

    for notice in &applied.notices {
        notify(ctx.notices, *notice);
    }
    if applied.close_channel {
        info!("session reached terminal status; closing push channel");
        Dispatch::Terminal
    } else {
        Dispatch::Continue
    }
}

/// Update-signal path: re-fetch the full detail and replace the slide list
/// wholesale. Failures are logged; the next signal will try again.
async fn refetch_detail(ctx: &ChannelCtx<'_>) {
    match ctx.api.session_detail(ctx.session_id).await {
        Ok(detail) => {
            ctx.snapshot.send_modify(|current| {
                current.replace_slides(detail.slides.added_slides, detail.current_slide_index);
            });
            debug!(session_id = %ctx.session_id, "session detail refreshed from update signal");
        }
        Err(error) => {
            warn!(error = %error, session_id = %ctx.session_id, "update-signal refetch failed");
        }
    }
}

fn spawn_heartbeat(ctx: &ChannelCtx<'_>) {
    let api = Arc::clone(ctx.api);
    let session_id = ctx.session_id.to_owned();
    let username = ctx.username.to_owned();
    tokio::spawn(async move {
        if let Err(error) = api.heartbeat(&session_id, &username).await {
            warn!(error = %error, session_id = %session_id, "heartbeat failed");
        }
    });
}

fn on_connected(ctx: &ChannelCtx<'_>) {
    ctx.snapshot.send_modify(|current| {
        current.connection = ConnectionState::Connected;
        current.last_error = None;
    });
    notify(ctx.notices, Notice::Connected);
    info!(session_id = %ctx.session_id, "push channel connected");
}

fn set_connection(snapshot: &watch::Sender<SessionSnapshot>, state: ConnectionState) {
    snapshot.send_modify(|current| current.connection = state);
}

fn fail(snapshot: &watch::Sender<SessionSnapshot>, error: &ClientError) {
    warn!(error = %error, "push channel failed");
    snapshot.send_modify(|current| {
        current.connection = ConnectionState::Error;
        current.last_error = Some(error.to_string());
    });
}

/// Best-effort notice delivery; a slow consumer drops notices rather than
/// stalling event processing.
fn notify(notices: &mpsc::Sender<Notice>, notice: Notice) {
    match notices.try_send(notice) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(notice)) => {
            warn!(?notice, "notice buffer full; dropping");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {}
    }
}

/// Delay before reconnect attempt number `attempt` (1-based), or `None` once
/// the retry budget is spent: `min(base * 2^attempt, cap)`.
fn backoff_delay(attempt: u32, config: &ClientConfig) -> Option<Duration> {
    if attempt >= config.max_reconnect_attempts {
        return None;
    }
    let base_ms = u64::try_from(config.reconnect_base_delay.as_millis()).unwrap_or(u64::MAX);
    let cap_ms = u64::try_from(config.reconnect_max_delay.as_millis()).unwrap_or(u64::MAX);
    let delay_ms = base_ms
        .saturating_mul(1_u64.checked_shl(attempt).unwrap_or(u64::MAX))
        .min(cap_ms);
    Some(Duration::from_millis(delay_ms))
}
