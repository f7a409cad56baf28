//! Canvas payload normalization.
//!
//! Whiteboard content is authored externally and arrives as a JSON document:
//! an `elements` array of drawing primitives, an `app_state` bag of display
//! attributes, and a `files` map of binary attachments. Normalization fills
//! the display attributes a renderer needs, so downstream code never handles
//! a half-specified payload.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

#[cfg(test)]
#[path = "content_test.rs"]
mod tests;

/// Background when the author saved none.
pub const DEFAULT_BACKGROUND: &str = "#ffffff";

/// Font-family token applied when display state does not carry one.
pub const DEFAULT_FONT_FAMILY: &str = "hand-drawn";

/// One drawing primitive. Geometry is typed for bounds computation; every
/// other authoring attribute rides along untouched in `extra`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CanvasElement {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Renderer-ready canvas content for one slide.
#[derive(Debug, Clone)]
pub struct CanvasContent {
    /// Live drawing primitives, in author order.
    pub elements: Vec<CanvasElement>,
    pub background_color: String,
    pub font_family: String,
    /// Binary attachments keyed by file id.
    pub files: Map<String, Value>,
    /// Presence of other participants on the canvas.
    pub collaborators: HashMap<String, Value>,
    /// The first render should center all elements in the viewport.
    pub auto_fit: bool,
}

/// Normalize a raw canvas payload.
///
/// Returns `None` when the payload carries no usable `elements` array — the
/// slide has no drawing yet, which is not a failure. Elements flagged
/// `is_deleted` and entries that are not objects are dropped.
#[must_use]
pub fn normalize(raw: &Value) -> Option<CanvasContent> {
    let elements = raw.get("elements")?.as_array()?;
    let elements: Vec<CanvasElement> = elements
        .iter()
        .filter_map(|element| serde_json::from_value::<CanvasElement>(element.clone()).ok())
        .filter(|element| !element.is_deleted)
        .collect();

    let app_state = raw.get("app_state");
    let background_color = app_state
        .and_then(|s| s.get("view_background_color"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_BACKGROUND)
        .to_owned();
    let font_family = app_state
        .and_then(|s| s.get("font_family"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_FONT_FAMILY)
        .to_owned();
    let collaborators = app_state
        .and_then(|s| s.get("collaborators"))
        .and_then(Value::as_object)
        .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();
    let files = raw
        .get("files")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    Some(CanvasContent {
        elements,
        background_color,
        font_family,
        files,
        collaborators,
        auto_fit: true,
    })
}
