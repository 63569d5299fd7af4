//! Plain geometry shared by the store, the viewport math and the interaction
//! controllers.
//!
//! All coordinates are `f32` to match Slint's logical lengths. "Flow" space
//! is the untransformed canvas space nodes live in; "renderer" space is the
//! pane after the viewport transform has been applied.

use serde::{Deserialize, Serialize};

/// A point in flow or renderer space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct XYPosition {
    pub x: f32,
    pub y: f32,
}

impl XYPosition {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: XYPosition) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f32,
    pub height: f32,
}

impl Dimensions {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Both sides are non-zero.
    pub fn is_measured(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Axis-aligned rectangle (x, y, width, height).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_position(position: XYPosition, dimensions: Dimensions) -> Self {
        Self::new(position.x, position.y, dimensions.width, dimensions.height)
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn center(&self) -> XYPosition {
        XYPosition::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub(crate) fn to_box(self) -> Box2 {
        Box2 {
            x: self.x,
            y: self.y,
            x2: self.x + self.width,
            y2: self.y + self.height,
        }
    }
}

/// Rectangle expressed by its two corners. Used while accumulating bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Box2 {
    pub x: f32,
    pub y: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Box2 {
    pub const EMPTY: Box2 = Box2 {
        x: f32::INFINITY,
        y: f32::INFINITY,
        x2: f32::NEG_INFINITY,
        y2: f32::NEG_INFINITY,
    };

    pub fn union(self, other: Box2) -> Box2 {
        Box2 {
            x: self.x.min(other.x),
            y: self.y.min(other.y),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    pub fn to_rect(self) -> Rect {
        Rect::new(self.x, self.y, self.x2 - self.x, self.y2 - self.y)
    }
}

/// `[[min_x, min_y], [max_x, max_y]]` bounds for node positions and panning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordinateExtent {
    pub min: XYPosition,
    pub max: XYPosition,
}

impl CoordinateExtent {
    pub const INFINITE: CoordinateExtent = CoordinateExtent {
        min: XYPosition::new(f32::NEG_INFINITY, f32::NEG_INFINITY),
        max: XYPosition::new(f32::INFINITY, f32::INFINITY),
    };

    pub const fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min: XYPosition::new(min_x, min_y),
            max: XYPosition::new(max_x, max_y),
        }
    }

    pub fn is_infinite(&self) -> bool {
        *self == Self::INFINITE
    }

    /// Shift the extent by an offset (used for parent-relative extents).
    pub fn translate(&self, offset: XYPosition) -> Self {
        Self::new(
            self.min.x + offset.x,
            self.min.y + offset.y,
            self.max.x + offset.x,
            self.max.y + offset.y,
        )
    }
}

impl Default for CoordinateExtent {
    fn default() -> Self {
        Self::INFINITE
    }
}

/// The viewport transform: renderer = flow * zoom + (x, y).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub zoom: f32,
}

impl Viewport {
    pub const fn new(x: f32, y: f32, zoom: f32) -> Self {
        Self { x, y, zoom }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

/// Fraction of a node's size its `position` refers to: `[0, 0]` is the top
/// left corner, `[0.5, 0.5]` the center.
pub type NodeOrigin = [f32; 2];

/// Grid cell size used when snapping.
pub type SnapGrid = [f32; 2];

/// `min(max(val, min), max)`. Unlike `f32::clamp` this never panics when
/// `max < min`; `max` wins.
pub fn clamp(val: f32, min: f32, max: f32) -> f32 {
    val.max(min).min(max)
}

/// Keep a node of the given size inside an extent.
pub fn clamp_position(
    position: XYPosition,
    extent: &CoordinateExtent,
    dimensions: Dimensions,
) -> XYPosition {
    XYPosition {
        x: clamp(position.x, extent.min.x, extent.max.x - dimensions.width),
        y: clamp(position.y, extent.min.y, extent.max.y - dimensions.height),
    }
}

pub fn snap_position(position: XYPosition, snap_grid: SnapGrid) -> XYPosition {
    XYPosition {
        x: snap_grid[0] * (position.x / snap_grid[0]).round(),
        y: snap_grid[1] * (position.y / snap_grid[1]).round(),
    }
}

/// Convert a pane-relative point to flow space.
pub fn point_to_renderer_point(
    point: XYPosition,
    viewport: Viewport,
    snap_to_grid: bool,
    snap_grid: SnapGrid,
) -> XYPosition {
    let position = XYPosition {
        x: (point.x - viewport.x) / viewport.zoom,
        y: (point.y - viewport.y) / viewport.zoom,
    };
    if snap_to_grid {
        snap_position(position, snap_grid)
    } else {
        position
    }
}

/// Convert a flow-space point to pane-relative coordinates.
pub fn renderer_point_to_point(point: XYPosition, viewport: Viewport) -> XYPosition {
    XYPosition {
        x: point.x * viewport.zoom + viewport.x,
        y: point.y * viewport.zoom + viewport.y,
    }
}

pub fn get_overlapping_area(a: &Rect, b: &Rect) -> f32 {
    let x_overlap = ((a.x + a.width).min(b.x + b.width) - a.x.max(b.x)).max(0.0);
    let y_overlap = ((a.y + a.height).min(b.y + b.height) - a.y.max(b.y)).max(0.0);
    x_overlap * y_overlap
}

/// Strict intersection test; rects that only touch do not intersect.
pub fn is_rect_intersecting(a: &Rect, b: &Rect) -> bool {
    a.x < b.x + b.width && a.x + a.width > b.x && a.y < b.y + b.height && a.y + a.height > b.y
}

pub fn get_bounds_of_rects(a: &Rect, b: &Rect) -> Rect {
    a.to_box().union(b.to_box()).to_rect()
}

/// Viewport that centers `bounds` in a `width` x `height` pane with
/// `padding` (fraction of the bounds) around it.
pub fn get_viewport_for_bounds(
    bounds: &Rect,
    width: f32,
    height: f32,
    min_zoom: f32,
    max_zoom: f32,
    padding: f32,
) -> Viewport {
    let x_zoom = width / (bounds.width * (1.0 + padding));
    let y_zoom = height / (bounds.height * (1.0 + padding));
    let zoom = clamp(x_zoom.min(y_zoom), min_zoom, max_zoom);
    let center = bounds.center();

    Viewport {
        x: width / 2.0 - center.x * zoom,
        y: height / 2.0 - center.y * zoom,
        zoom,
    }
}
