//! Pan/zoom constraints and the viewport helper.
//!
//! The store never moves the viewport by itself: it asks the attached
//! [`PanZoom`] implementation, which applies the zoom and translate extents
//! and answers with the viewport actually reached. [`PanZoomController`] is
//! the stock implementation; hosts with their own gesture handling can plug
//! in another one.

use crate::geometry::{
    clamp, get_viewport_for_bounds, point_to_renderer_point, renderer_point_to_point,
    CoordinateExtent, Rect, Viewport, XYPosition,
};
use crate::lookup::NodeLookup;
use crate::nodes::{ElementData, InternalNode};
use crate::store::FlowStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_FIT_VIEW_PADDING: f32 = 0.1;

/// Step used by `zoom_in` / `zoom_out`.
pub const ZOOM_STEP: f32 = 1.2;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FitViewOptions {
    /// Fraction of the bounds left free around them.
    pub padding: f32,
    #[serde(alias = "includeHiddenNodes")]
    pub include_hidden: bool,
    pub min_zoom: Option<f32>,
    pub max_zoom: Option<f32>,
    /// Restrict fitting to these node ids.
    pub nodes: Option<Vec<String>>,
}

impl Default for FitViewOptions {
    fn default() -> Self {
        Self {
            padding: DEFAULT_FIT_VIEW_PADDING,
            include_hidden: false,
            min_zoom: None,
            max_zoom: None,
            nodes: None,
        }
    }
}

impl FitViewOptions {
    pub fn with_padding(mut self, padding: f32) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_nodes<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nodes = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn include_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }
}

/// Nodes a fit-view should frame: measured, visible unless hidden ones are
/// requested, and in the id filter when one is given.
pub fn get_fit_view_nodes<'a, D>(
    lookup: &'a NodeLookup<D>,
    options: &FitViewOptions,
) -> Vec<&'a InternalNode<D>> {
    lookup
        .values()
        .filter(|node| {
            let in_filter = options
                .nodes
                .as_ref()
                .map_or(true, |ids| ids.iter().any(|id| *id == node.id));
            in_filter && node.is_measured() && (options.include_hidden || !node.hidden)
        })
        .collect()
}

/// The pan/zoom behaviour attached to a mounted flow.
pub trait PanZoom {
    fn viewport(&self) -> Viewport;

    /// Move to `viewport`, constrained by the extents. Returns the viewport
    /// actually reached.
    fn set_viewport(&mut self, viewport: Viewport) -> Viewport;

    fn set_scale_extent(&mut self, min_zoom: f32, max_zoom: f32);

    fn set_translate_extent(&mut self, extent: CoordinateExtent);

    fn set_pane_size(&mut self, width: f32, height: f32);

    /// Zoom to `zoom` around the pane center.
    fn scale_to(&mut self, zoom: f32) -> Viewport;

    fn scale_by(&mut self, factor: f32) -> Viewport {
        let zoom = self.viewport().zoom * factor;
        self.scale_to(zoom)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PanZoomController {
    viewport: Viewport,
    min_zoom: f32,
    max_zoom: f32,
    translate_extent: CoordinateExtent,
    width: f32,
    height: f32,
}

impl Default for PanZoomController {
    fn default() -> Self {
        Self::new(0.5, 2.0, CoordinateExtent::INFINITE)
    }
}

impl PanZoomController {
    pub fn new(min_zoom: f32, max_zoom: f32, translate_extent: CoordinateExtent) -> Self {
        Self {
            viewport: Viewport::default(),
            min_zoom,
            max_zoom,
            translate_extent,
            width: 0.0,
            height: 0.0,
        }
    }

    pub fn with_pane_size(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Clamp the zoom, then translate until the visible pane lies inside the
    /// translate extent, centering it when the extent is smaller than the
    /// pane.
    pub fn constrain(&self, viewport: Viewport) -> Viewport {
        let zoom = clamp(viewport.zoom, self.min_zoom, self.max_zoom);
        let extent = &self.translate_extent;
        if extent.is_infinite() {
            return Viewport::new(viewport.x, viewport.y, zoom);
        }

        let offset = |translate: f32, pane: f32, min: f32, max: f32| -> f32 {
            let d0 = -translate / zoom - min;
            let d1 = (pane - translate) / zoom - max;
            if d1 > d0 {
                (d0 + d1) / 2.0
            } else if d0 < 0.0 {
                d0
            } else {
                d1.max(0.0)
            }
        };

        let dx = offset(viewport.x, self.width, extent.min.x, extent.max.x);
        let dy = offset(viewport.y, self.height, extent.min.y, extent.max.y);
        Viewport::new(viewport.x + dx * zoom, viewport.y + dy * zoom, zoom)
    }
}

impl PanZoom for PanZoomController {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Viewport {
        self.viewport = self.constrain(viewport);
        self.viewport
    }

    fn set_scale_extent(&mut self, min_zoom: f32, max_zoom: f32) {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
    }

    fn set_translate_extent(&mut self, extent: CoordinateExtent) {
        self.translate_extent = extent;
    }

    fn set_pane_size(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    fn scale_to(&mut self, zoom: f32) -> Viewport {
        let current = self.viewport;
        let zoom = clamp(zoom, self.min_zoom, self.max_zoom);
        // Keep the flow point under the pane center in place
        let center = XYPosition::new(self.width / 2.0, self.height / 2.0);
        let anchor = point_to_renderer_point(center, current, false, [1.0, 1.0]);
        self.set_viewport(Viewport::new(
            center.x - anchor.x * zoom,
            center.y - anchor.y * zoom,
            zoom,
        ))
    }
}

/// Viewport operations bound to a store.
#[derive(Clone)]
pub struct ViewportHelper<ND = Value, ED = Value> {
    store: FlowStore<ND, ED>,
}

pub fn use_viewport_helper<ND: ElementData, ED: ElementData>(
    store: &FlowStore<ND, ED>,
) -> ViewportHelper<ND, ED> {
    ViewportHelper {
        store: store.clone(),
    }
}

impl<ND: ElementData, ED: ElementData> ViewportHelper<ND, ED> {
    pub fn viewport_initialized(&self) -> bool {
        self.store.read(|s| s.viewport_initialized)
    }

    pub fn zoom_in(&self) -> bool {
        self.store.zoom_in()
    }

    pub fn zoom_out(&self) -> bool {
        self.store.zoom_out()
    }

    pub fn zoom_to(&self, zoom: f32) -> bool {
        self.store.zoom_to(zoom)
    }

    pub fn get_zoom(&self) -> f32 {
        self.store.read(|s| s.viewport.zoom)
    }

    pub fn set_viewport(&self, viewport: Viewport) -> bool {
        self.store.set_viewport(viewport)
    }

    pub fn get_viewport(&self) -> Viewport {
        self.store.read(|s| s.viewport)
    }

    pub fn fit_view(&self, options: &FitViewOptions) -> bool {
        self.store.fit_view(options)
    }

    /// Center the pane on a flow point. `zoom` defaults to the max zoom.
    pub fn set_center(&self, x: f32, y: f32, zoom: Option<f32>) -> bool {
        let (width, height, max_zoom) = self.store.read(|s| (s.width, s.height, s.max_zoom));
        let zoom = zoom.unwrap_or(max_zoom);
        self.store.set_viewport(Viewport::new(
            width / 2.0 - x * zoom,
            height / 2.0 - y * zoom,
            zoom,
        ))
    }

    pub fn fit_bounds(&self, bounds: &Rect, padding: Option<f32>) -> bool {
        let viewport = self.store.read(|s| {
            get_viewport_for_bounds(
                bounds,
                s.width,
                s.height,
                s.min_zoom,
                s.max_zoom,
                padding.unwrap_or(DEFAULT_FIT_VIEW_PADDING),
            )
        });
        self.store.set_viewport(viewport)
    }

    /// Window coordinates to flow coordinates, snapped when the store snaps.
    pub fn screen_to_flow_position(&self, position: XYPosition) -> XYPosition {
        let bounds = self.store.surface_bounds();
        self.store.read(|s| {
            point_to_renderer_point(
                XYPosition::new(position.x - bounds.x, position.y - bounds.y),
                s.viewport,
                s.snap_to_grid,
                s.snap_grid,
            )
        })
    }

    pub fn flow_to_screen_position(&self, position: XYPosition) -> XYPosition {
        let bounds = self.store.surface_bounds();
        let point = renderer_point_to_point(position, self.get_viewport());
        XYPosition::new(point.x + bounds.x, point.y + bounds.y)
    }
}
