//! Measurement tracking for the rendering surface.
//!
//! This module provides [`MeasurementTracker`], the store's view of what
//! Slint actually laid out: node sizes, handle rects and the pane bounds.
//! The store asks it for measurements through the [`Surface`] trait when
//! `update_node_internals` runs.
//!
//! # Example
//!
//! ```ignore
//! use slint_flow::MeasurementTracker;
//!
//! let tracker = MeasurementTracker::new();
//!
//! // Wire up callbacks (one-time setup)
//! window.on_node_size_changed(tracker.node_size_callback());
//! window.on_handle_reported(tracker.handle_callback());
//!
//! store.attach_surface(Rc::new(tracker.clone()));
//! ```

use crate::geometry::{Dimensions, Rect};
use crate::lookup::NodeMeasurement;
use crate::nodes::{HandleBounds, HandleElement, HandleType, Position};
use indexmap::IndexMap;
use slint::SharedString;
use std::cell::RefCell;
use std::rc::Rc;

/// The mounted surface a store measures nodes on.
pub trait Surface {
    /// Pane rect in window coordinates.
    fn bounds(&self) -> Rect;

    /// Current size and handles of a node, in flow units. `None` while the
    /// node has not been laid out.
    fn measure_node(&self, id: &str) -> Option<NodeMeasurement>;
}

#[derive(Debug, Default)]
struct MeasurementCache {
    bounds: Rect,
    zoom: f32,
    sizes: IndexMap<String, Dimensions>,
    handles: IndexMap<String, Vec<HandleElement>>,
}

impl MeasurementCache {
    fn to_flow(&self, length: f32) -> f32 {
        if self.zoom > 0.0 {
            length / self.zoom
        } else {
            length
        }
    }
}

/// Shared cache of reported measurements with ready-to-use Slint callbacks.
///
/// Sizes and handle rects arrive in screen pixels (the nodes are rendered
/// scaled by the viewport zoom) and are stored in flow units. Keep the zoom
/// current with [`set_zoom`](Self::set_zoom).
#[derive(Clone)]
pub struct MeasurementTracker {
    cache: Rc<RefCell<MeasurementCache>>,
}

impl Default for MeasurementTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementTracker {
    pub fn new() -> Self {
        Self {
            cache: Rc::new(RefCell::new(MeasurementCache {
                zoom: 1.0,
                ..MeasurementCache::default()
            })),
        }
    }

    pub fn set_zoom(&self, zoom: f32) {
        self.cache.borrow_mut().zoom = zoom;
    }

    pub fn set_bounds(&self, bounds: Rect) {
        self.cache.borrow_mut().bounds = bounds;
    }

    /// Record a node's rendered size.
    pub fn report_node_size(&self, id: &str, width: f32, height: f32) {
        let mut cache = self.cache.borrow_mut();
        let dimensions = Dimensions::new(cache.to_flow(width), cache.to_flow(height));
        cache.sizes.insert(id.to_string(), dimensions);
    }

    /// Record a handle. `x`/`y` are relative to the node's top left corner.
    /// A handle with the same node, type and id replaces the previous one.
    pub fn report_handle(&self, mut handle: HandleElement) {
        let mut cache = self.cache.borrow_mut();
        handle.x = cache.to_flow(handle.x);
        handle.y = cache.to_flow(handle.y);
        handle.width = cache.to_flow(handle.width);
        handle.height = cache.to_flow(handle.height);

        let handles = cache.handles.entry(handle.node_id.clone()).or_default();
        match handles
            .iter_mut()
            .find(|h| h.handle_type == handle.handle_type && h.id == handle.id)
        {
            Some(existing) => *existing = handle,
            None => handles.push(handle),
        }
    }

    /// Forget a node that is no longer rendered.
    pub fn remove_node(&self, id: &str) {
        let mut cache = self.cache.borrow_mut();
        cache.sizes.shift_remove(id);
        cache.handles.shift_remove(id);
    }

    pub fn clear(&self) {
        let mut cache = self.cache.borrow_mut();
        cache.sizes.clear();
        cache.handles.clear();
    }

    /// Get a callback for node size reports.
    ///
    /// The callback signature is `(node_id, width, height)`.
    pub fn node_size_callback(&self) -> impl Fn(SharedString, f32, f32) + Clone {
        let tracker = self.clone();
        move |id, width, height| tracker.report_node_size(id.as_str(), width, height)
    }

    /// Get a callback for handle reports.
    ///
    /// The callback signature is
    /// `(node_id, handle_id, handle_type, position, x, y, width, height)`.
    /// `handle_type` is 0 for source and 1 for target; `position` is 0..=3
    /// for left, top, right, bottom. An empty `handle_id` means the handle
    /// has no id.
    #[allow(clippy::type_complexity)]
    pub fn handle_callback(
        &self,
    ) -> impl Fn(SharedString, SharedString, i32, i32, f32, f32, f32, f32) + Clone {
        let tracker = self.clone();
        move |node_id, handle_id, handle_type, position, x, y, width, height| {
            tracker.report_handle(HandleElement {
                id: (!handle_id.is_empty()).then(|| handle_id.to_string()),
                node_id: node_id.to_string(),
                handle_type: handle_type_from_index(handle_type),
                position: position_from_index(position),
                x,
                y,
                width,
                height,
            });
        }
    }
}

impl Surface for MeasurementTracker {
    fn bounds(&self) -> Rect {
        self.cache.borrow().bounds
    }

    fn measure_node(&self, id: &str) -> Option<NodeMeasurement> {
        let cache = self.cache.borrow();
        let dimensions = *cache.sizes.get(id)?;
        let mut handle_bounds = HandleBounds::default();
        for handle in cache.handles.get(id).into_iter().flatten() {
            match handle.handle_type {
                HandleType::Source => handle_bounds.source.push(handle.clone()),
                HandleType::Target => handle_bounds.target.push(handle.clone()),
            }
        }
        Some(NodeMeasurement {
            dimensions,
            handle_bounds,
        })
    }
}

fn handle_type_from_index(index: i32) -> HandleType {
    if index == 0 {
        HandleType::Source
    } else {
        HandleType::Target
    }
}

fn position_from_index(index: i32) -> Position {
    match index {
        0 => Position::Left,
        2 => Position::Right,
        3 => Position::Bottom,
        _ => Position::Top,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreported_node_is_not_measured() {
        let tracker = MeasurementTracker::new();
        assert!(tracker.measure_node("a").is_none());
    }

    #[test]
    fn test_node_size_callback_updates_cache() {
        let tracker = MeasurementTracker::new();
        let callback = tracker.node_size_callback();

        callback("a".into(), 100.0, 50.0);

        let measurement = tracker.measure_node("a").unwrap();
        assert_eq!(measurement.dimensions, Dimensions::new(100.0, 50.0));
        assert!(measurement.handle_bounds.source.is_empty());
    }

    #[test]
    fn test_sizes_are_converted_to_flow_units() {
        let tracker = MeasurementTracker::new();
        tracker.set_zoom(2.0);
        tracker.report_node_size("a", 100.0, 50.0);

        assert_eq!(tracker.measure_node("a").unwrap().dimensions, Dimensions::new(50.0, 25.0));
    }

    #[test]
    fn test_handle_callback_groups_by_type() {
        let tracker = MeasurementTracker::new();
        let handle = tracker.handle_callback();
        tracker.report_node_size("a", 100.0, 50.0);

        handle("a".into(), "out".into(), 0, 2, 95.0, 20.0, 10.0, 10.0);
        handle("a".into(), "".into(), 1, 0, -5.0, 20.0, 10.0, 10.0);

        let bounds = tracker.measure_node("a").unwrap().handle_bounds;
        assert_eq!(bounds.source.len(), 1);
        assert_eq!(bounds.source[0].id.as_deref(), Some("out"));
        assert_eq!(bounds.source[0].position, Position::Right);
        assert_eq!(bounds.target.len(), 1);
        assert_eq!(bounds.target[0].id, None);
        assert_eq!(bounds.target[0].position, Position::Left);
    }

    #[test]
    fn test_reported_handle_replaces_previous() {
        let tracker = MeasurementTracker::new();
        let handle = tracker.handle_callback();
        tracker.report_node_size("a", 100.0, 50.0);

        handle("a".into(), "out".into(), 0, 2, 95.0, 20.0, 10.0, 10.0);
        handle("a".into(), "out".into(), 0, 2, 95.0, 30.0, 10.0, 10.0);

        let bounds = tracker.measure_node("a").unwrap().handle_bounds;
        assert_eq!(bounds.source.len(), 1);
        assert_eq!(bounds.source[0].y, 30.0);
    }

    #[test]
    fn test_remove_node_forgets_everything() {
        let tracker = MeasurementTracker::new();
        tracker.report_node_size("a", 10.0, 10.0);
        tracker.handle_callback()("a".into(), "".into(), 0, 3, 0.0, 0.0, 1.0, 1.0);

        tracker.remove_node("a");
        assert!(tracker.measure_node("a").is_none());
    }

    #[test]
    fn test_clones_share_the_cache() {
        let tracker = MeasurementTracker::new();
        let other = tracker.clone();
        other.set_bounds(Rect::new(10.0, 20.0, 300.0, 200.0));
        other.report_node_size("a", 1.0, 1.0);

        assert_eq!(tracker.bounds(), Rect::new(10.0, 20.0, 300.0, 200.0));
        assert!(tracker.measure_node("a").is_some());
    }
}
