//! Viewport fit math for canvas slides.

use super::content::CanvasElement;

#[cfg(test)]
#[path = "view_test.rs"]
mod tests;

const MIN_ZOOM: f64 = 0.1;
const MAX_ZOOM: f64 = 10.0;

/// A point in either screen or world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Camera state for the canvas viewport.
///
/// `pan_x` / `pan_y` are in CSS pixels; `zoom` is a scale factor
/// (1.0 = no zoom).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self { pan_x: 0.0, pan_y: 0.0, zoom: 1.0 }
    }
}

impl Camera {
    /// Convert a screen-space point (CSS pixels) to world coordinates.
    #[must_use]
    pub fn screen_to_world(&self, screen: Point) -> Point {
        Point {
            x: (screen.x - self.pan_x) / self.zoom,
            y: (screen.y - self.pan_y) / self.zoom,
        }
    }

    /// Convert a world-space point to screen coordinates (CSS pixels).
    #[must_use]
    pub fn world_to_screen(&self, world: Point) -> Point {
        Point {
            x: world.x * self.zoom + self.pan_x,
            y: world.y * self.zoom + self.pan_y,
        }
    }
}

/// Viewport dimensions in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width: width.max(1.0), height: height.max(1.0) }
    }
}

/// Axis-aligned bounding box over drawing elements, in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Accumulate the bounding box of elements. `None` when empty.
    ///
    /// Width/height may be authored negative (dragged up-left), so both
    /// corners are folded independently.
    #[must_use]
    pub fn of_elements(elements: &[CanvasElement]) -> Option<Self> {
        let mut bounds: Option<Self> = None;
        for element in elements {
            let (x0, x1) = ordered(element.x, element.x + element.width);
            let (y0, y1) = ordered(element.y, element.y + element.height);
            bounds = Some(match bounds {
                None => Self { min_x: x0, min_y: y0, max_x: x1, max_y: y1 },
                Some(b) => Self {
                    min_x: b.min_x.min(x0),
                    min_y: b.min_y.min(y0),
                    max_x: b.max_x.max(x1),
                    max_y: b.max_y.max(y1),
                },
            });
        }
        bounds
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new((self.min_x + self.max_x) * 0.5, (self.min_y + self.max_y) * 0.5)
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Compute the camera that fits `bounds` centred in `viewport` with
/// `padding` CSS pixels on every side.
///
/// Zoom is clamped so a single dot does not explode to infinity and a vast
/// drawing stays legible. The pan offsets are derived from the world centre
/// and zoom so the visible centre matches the bounds centre exactly.
#[must_use]
pub fn fit_camera(bounds: Bounds, viewport: Viewport, padding: f64) -> Camera {
    let usable_w = (viewport.width - padding * 2.0).max(1.0);
    let usable_h = (viewport.height - padding * 2.0).max(1.0);
    let zoom = (usable_w / bounds.width().max(f64::EPSILON))
        .min(usable_h / bounds.height().max(f64::EPSILON))
        .clamp(MIN_ZOOM, MAX_ZOOM);

    let center = bounds.center();
    Camera {
        pan_x: (viewport.width * 0.5) - (center.x * zoom),
        pan_y: (viewport.height * 0.5) - (center.y * zoom),
        zoom,
    }
}
