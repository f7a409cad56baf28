//! Per-slide canvas viewer state.
//!
//! DESIGN
//! ======
//! The viewer owns the ephemeral content of the slide currently displayed —
//! it is not part of the session snapshot. Loads are generation-guarded:
//! navigating to another slide invalidates any in-flight fetch, so stale
//! content can never overwrite a newer slide's view. The resize debounce and
//! post-load settle timers are owned handles, cleared on `close` and replaced
//! on re-arm, never free-floating.
//!
//! ERROR HANDLING
//! ==============
//! A missing drawing is an empty state, not an error. Fetch or decode
//! failures are scoped to the one slide being viewed and recovered by
//! navigating away and back; there is no automatic retry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::session::Slide;

use super::content::{self, CanvasContent};
use super::view::{Bounds, Camera, Viewport, fit_camera};

#[cfg(test)]
#[path = "viewer_test.rs"]
mod tests;

/// Padding around fitted content, in CSS pixels.
const FIT_PADDING: f64 = 32.0;

/// What the slide's display area should show.
#[derive(Debug, Clone, Default)]
pub enum SlideDisplay {
    /// Nothing to display (non-canvas slide, or after `close`).
    #[default]
    Empty,
    /// Content fetch in flight.
    Loading,
    /// Drawing loaded and normalized.
    Content(CanvasContent),
    /// The slide has no drawing yet.
    NoContent,
    /// Slide-local failure message.
    Failed(String),
}

struct ViewerState {
    /// Bumped on every navigation; in-flight loads compare against it.
    generation: u64,
    slide_id: Option<String>,
    display: SlideDisplay,
    camera: Camera,
    viewport: Viewport,
    resize_timer: Option<JoinHandle<()>>,
    settle_timer: Option<JoinHandle<()>>,
}

/// Fetches and presents canvas content for the slide being viewed.
#[derive(Clone)]
pub struct SlideViewer {
    api: Arc<ApiClient>,
    resize_debounce: Duration,
    settle_delay: Duration,
    state: Arc<Mutex<ViewerState>>,
}

impl SlideViewer {
    #[must_use]
    pub fn new(api: Arc<ApiClient>, config: &ClientConfig, viewport: Viewport) -> Self {
        Self {
            api,
            resize_debounce: config.resize_debounce,
            settle_delay: config.recenter_settle_delay,
            state: Arc::new(Mutex::new(ViewerState {
                generation: 0,
                slide_id: None,
                display: SlideDisplay::Empty,
                camera: Camera::default(),
                viewport,
                resize_timer: None,
                settle_timer: None,
            })),
        }
    }

    /// Display a slide, fetching and normalizing its canvas content.
    ///
    /// If navigation moves on while the fetch is in flight, the result is
    /// discarded on arrival and the newer slide's view is left untouched.
    pub async fn show_slide(&self, slide: &Slide) {
        let generation = {
            let mut state = self.state.lock().await;
            state.generation += 1;
            state.slide_id = Some(slide.id.clone());
            if let Some(timer) = state.settle_timer.take() {
                timer.abort();
            }
            state.display = if slide.canvas_ref.is_some() {
                SlideDisplay::Loading
            } else {
                SlideDisplay::Empty
            };
            state.generation
        };

        let Some(content_ref) = &slide.canvas_ref else {
            return;
        };

        let fetched = self.api.canvas_content(content_ref).await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            debug!(slide_id = %slide.id, "discarding stale canvas content");
            return;
        }

        match fetched {
            Ok(Some(raw)) => match content::normalize(&raw) {
                Some(content) => {
                    let auto_fit = content.auto_fit;
                    state.display = SlideDisplay::Content(content);
                    if auto_fit {
                        recenter_locked(&mut state);
                        self.arm_settle_timer(&mut state);
                    }
                }
                None => state.display = SlideDisplay::NoContent,
            },
            Ok(None) => state.display = SlideDisplay::NoContent,
            Err(error) => {
                let title = slide.title.clone().unwrap_or_else(|| slide.id.clone());
                warn!(error = %error, slide_id = %slide.id, title = %title, "canvas content load failed");
                state.display = SlideDisplay::Failed(format!("could not load drawing \"{title}\""));
            }
        }
    }

    /// Recompute the bounding viewport fit. A no-op with zero elements; safe
    /// to call repeatedly. `animate` is forwarded to the renderer via the
    /// returned camera — the fit itself is identical either way.
    pub async fn recenter(&self, animate: bool) -> Option<Camera> {
        let mut state = self.state.lock().await;
        let camera = recenter_locked(&mut state);
        if camera.is_some() {
            debug!(animate, "canvas recentered");
        }
        camera
    }

    /// Record a viewport resize and schedule a debounced recenter. Bursts of
    /// resizes within the debounce window collapse into one fit.
    pub async fn viewport_resized(&self, viewport: Viewport) {
        let mut state = self.state.lock().await;
        state.viewport = viewport;
        if let Some(timer) = state.resize_timer.take() {
            timer.abort();
        }
        let viewer = self.clone();
        let debounce = self.resize_debounce;
        state.resize_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            viewer.recenter(false).await;
        }));
    }

    /// Tear down: cancel pending timers and drop the displayed content.
    /// In-flight loads discard their result on arrival.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.generation += 1;
        state.slide_id = None;
        state.display = SlideDisplay::Empty;
        if let Some(timer) = state.resize_timer.take() {
            timer.abort();
        }
        if let Some(timer) = state.settle_timer.take() {
            timer.abort();
        }
    }

    /// Current display state for the slide area.
    pub async fn display(&self) -> SlideDisplay {
        self.state.lock().await.display.clone()
    }

    /// Current camera.
    pub async fn camera(&self) -> Camera {
        self.state.lock().await.camera
    }

    /// Id of the slide being displayed, if any.
    pub async fn slide_id(&self) -> Option<String> {
        self.state.lock().await.slide_id.clone()
    }

    /// One extra recenter shortly after load, once the rendering surface has
    /// finished its own layout pass.
    fn arm_settle_timer(&self, state: &mut ViewerState) {
        if let Some(timer) = state.settle_timer.take() {
            timer.abort();
        }
        let viewer = self.clone();
        let delay = self.settle_delay;
        state.settle_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            viewer.recenter(true).await;
        }));
    }
}

fn recenter_locked(state: &mut ViewerState) -> Option<Camera> {
    let SlideDisplay::Content(content) = &state.display else {
        return None;
    };
    let bounds = Bounds::of_elements(&content.elements)?;
    let camera = fit_camera(bounds, state.viewport, FIT_PADDING);
    state.camera = camera;
    Some(camera)
}
