//! Nodes as the host supplies them and as the store keeps them.

use crate::geometry::{
    get_overlapping_area, point_to_renderer_point, Box2, CoordinateExtent, Dimensions, NodeOrigin,
    Rect, Viewport, XYPosition,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Bound shared by node and edge payloads.
pub trait ElementData: Clone + PartialEq + fmt::Debug + 'static {}

impl<T> ElementData for T where T: Clone + PartialEq + fmt::Debug + 'static {}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Where a node may be placed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeExtent {
    /// Stay inside the parent node.
    Parent,
    /// Stay inside a fixed extent, relative to the parent if there is one.
    Coordinate(CoordinateExtent),
}

/// Which side of a node a handle sits on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Position {
    Left,
    #[default]
    Top,
    Right,
    Bottom,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HandleType {
    Source,
    Target,
}

impl HandleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Target => "target",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Source => Self::Target,
            Self::Target => Self::Source,
        }
    }
}

impl fmt::Display for HandleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A measured handle. `x`/`y` are relative to the node's top left corner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleElement {
    pub id: Option<String>,
    pub node_id: String,
    #[serde(rename = "type")]
    pub handle_type: HandleType,
    pub position: Position,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl HandleElement {
    /// Anchor point of the handle in flow space. With `center` the middle
    /// of the handle is used, otherwise the middle of the side it sits on.
    pub fn absolute_position(&self, node_position: XYPosition, center: bool) -> XYPosition {
        let x = node_position.x + self.x;
        let y = node_position.y + self.y;
        if center {
            return XYPosition::new(x + self.width / 2.0, y + self.height / 2.0);
        }
        match self.position {
            Position::Top => XYPosition::new(x + self.width / 2.0, y),
            Position::Right => XYPosition::new(x + self.width, y + self.height / 2.0),
            Position::Bottom => XYPosition::new(x + self.width / 2.0, y + self.height),
            Position::Left => XYPosition::new(x, y + self.height / 2.0),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HandleBounds {
    pub source: Vec<HandleElement>,
    pub target: Vec<HandleElement>,
}

impl HandleBounds {
    pub fn of_type(&self, handle_type: HandleType) -> &[HandleElement] {
        match handle_type {
            HandleType::Source => &self.source,
            HandleType::Target => &self.target,
        }
    }

    /// Find a handle by type and id. `None` as id matches the first handle
    /// of that type.
    pub fn find(&self, handle_type: HandleType, id: Option<&str>) -> Option<&HandleElement> {
        let handles = self.of_type(handle_type);
        match id {
            Some(id) => handles.iter().find(|h| h.id.as_deref() == Some(id)),
            None => handles.first(),
        }
    }
}

/// A node as supplied by the host application.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node<D = Value> {
    pub id: String,
    pub position: XYPosition,
    pub data: D,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub selected: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub dragging: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub resizing: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draggable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connectable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletable: Option<bool>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub expand_parent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extent: Option<NodeExtent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<NodeOrigin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_height: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measured: Option<Dimensions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
}

impl<D> Node<D> {
    pub fn new(id: impl Into<String>, position: XYPosition, data: D) -> Self {
        Self {
            id: id.into(),
            position,
            data,
            kind: None,
            parent_id: None,
            selected: false,
            dragging: false,
            resizing: false,
            hidden: false,
            draggable: None,
            selectable: None,
            connectable: None,
            deletable: None,
            expand_parent: false,
            extent: None,
            origin: None,
            width: None,
            height: None,
            initial_width: None,
            initial_height: None,
            measured: None,
            z_index: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_measured(mut self, width: f32, height: f32) -> Self {
        self.measured = Some(Dimensions::new(width, height));
        self
    }

    pub fn with_expand_parent(mut self, expand_parent: bool) -> Self {
        self.expand_parent = expand_parent;
        self
    }

    pub fn with_extent(mut self, extent: NodeExtent) -> Self {
        self.extent = Some(extent);
        self
    }

    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = Some(z_index);
        self
    }

    pub fn with_draggable(mut self, draggable: bool) -> Self {
        self.draggable = Some(draggable);
        self
    }

    pub fn with_deletable(mut self, deletable: bool) -> Self {
        self.deletable = Some(deletable);
        self
    }

    pub fn is_draggable(&self, nodes_draggable: bool) -> bool {
        self.draggable.unwrap_or(nodes_draggable)
    }

    pub fn is_selectable(&self, elements_selectable: bool) -> bool {
        self.selectable.unwrap_or(elements_selectable)
    }

    pub fn is_connectable(&self, nodes_connectable: bool) -> bool {
        self.connectable.unwrap_or(nodes_connectable)
    }

    pub fn is_deletable(&self) -> bool {
        self.deletable.unwrap_or(true)
    }
}

/// Best known size: measured, then explicit, then initial, then zero.
pub fn get_node_dimensions<D>(node: &Node<D>) -> Dimensions {
    Dimensions {
        width: node
            .measured
            .map(|m| m.width)
            .or(node.width)
            .or(node.initial_width)
            .unwrap_or(0.0),
        height: node
            .measured
            .map(|m| m.height)
            .or(node.height)
            .or(node.initial_height)
            .unwrap_or(0.0),
    }
}

/// Whether the node has a size from any source.
pub fn node_has_dimensions<D>(node: &Node<D>) -> bool {
    node.measured.is_some()
        || (node.width.or(node.initial_width).is_some()
            && node.height.or(node.initial_height).is_some())
}

/// Top left corner of the node once its origin is taken into account.
pub fn get_node_position_with_origin<D>(node: &Node<D>, node_origin: NodeOrigin) -> XYPosition {
    let Dimensions { width, height } = get_node_dimensions(node);
    let origin = node.origin.unwrap_or(node_origin);
    XYPosition::new(
        node.position.x - width * origin[0],
        node.position.y - height * origin[1],
    )
}

/// Store-side data derived from a node.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeInternals<D = Value> {
    pub position_absolute: XYPosition,
    pub z: i32,
    pub handle_bounds: Option<HandleBounds>,
    /// The node exactly as the host supplied it.
    pub user_node: Node<D>,
}

/// The store's representation of a node: a working copy of the user node
/// plus derived internals. Derefs to the working copy.
#[derive(Clone, Debug, PartialEq)]
pub struct InternalNode<D = Value> {
    pub node: Node<D>,
    pub internals: NodeInternals<D>,
}

impl<D: Clone> InternalNode<D> {
    pub(crate) fn from_user_node(user_node: &Node<D>, position_absolute: XYPosition, z: i32) -> Self {
        Self {
            node: user_node.clone(),
            internals: NodeInternals {
                position_absolute,
                z,
                handle_bounds: None,
                user_node: user_node.clone(),
            },
        }
    }
}

impl<D> InternalNode<D> {
    pub fn dimensions(&self) -> Dimensions {
        get_node_dimensions(&self.node)
    }

    /// Bounding rect in flow space.
    pub fn rect(&self) -> Rect {
        Rect::from_position(self.internals.position_absolute, self.dimensions())
    }

    pub fn is_measured(&self) -> bool {
        self.node
            .measured
            .map(|m| m.is_measured())
            .unwrap_or(false)
    }
}

impl<D> Deref for InternalNode<D> {
    type Target = Node<D>;

    fn deref(&self) -> &Self::Target {
        &self.node
    }
}

impl<D> DerefMut for InternalNode<D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.node
    }
}

/// Bounding rect of a set of internal nodes. Empty input yields a zero rect.
pub fn get_internal_nodes_bounds<'a, D, I>(nodes: I) -> Rect
where
    D: 'a,
    I: IntoIterator<Item = &'a InternalNode<D>>,
{
    let mut bounds = Box2::EMPTY;
    let mut any = false;
    for node in nodes {
        bounds = bounds.union(node.rect().to_box());
        any = true;
    }
    if any {
        bounds.to_rect()
    } else {
        Rect::default()
    }
}

/// Nodes whose rect lies inside a pane-relative `rect`.
///
/// With `partially` any overlap counts. Nodes that have never been measured
/// are always included so they get a chance to render and report a size.
/// Dragged nodes are always included.
pub fn get_nodes_inside<'a, D, I>(
    nodes: I,
    rect: Rect,
    viewport: Viewport,
    partially: bool,
    exclude_non_selectable: bool,
) -> Vec<&'a InternalNode<D>>
where
    D: 'a,
    I: IntoIterator<Item = &'a InternalNode<D>>,
{
    let origin = point_to_renderer_point(
        XYPosition::new(rect.x, rect.y),
        viewport,
        false,
        [1.0, 1.0],
    );
    let pane_rect = Rect::new(
        origin.x,
        origin.y,
        rect.width / viewport.zoom,
        rect.height / viewport.zoom,
    );

    nodes
        .into_iter()
        .filter(|node| {
            if node.hidden || (exclude_non_selectable && !node.is_selectable(true)) {
                return false;
            }
            let overlapping_area = get_overlapping_area(&pane_rect, &node.rect());
            let force_initial_render = node.internals.handle_bounds.is_none();
            let visible = force_initial_render
                || (partially && overlapping_area > 0.0)
                || overlapping_area >= node.rect().area();
            visible || node.dragging
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn internal(id: &str, x: f32, y: f32, w: f32, h: f32) -> InternalNode<()> {
        let node = Node::new(id, XYPosition::new(x, y), ()).with_measured(w, h);
        let mut internal = InternalNode::from_user_node(&node, XYPosition::new(x, y), 0);
        internal.internals.handle_bounds = Some(HandleBounds::default());
        internal
    }

    #[test]
    fn test_dimensions_fallback_order() {
        let node = Node::new("a", XYPosition::default(), ()).with_size(10.0, 20.0);
        assert_eq!(get_node_dimensions(&node), Dimensions::new(10.0, 20.0));

        let node = node.with_measured(30.0, 40.0);
        assert_eq!(get_node_dimensions(&node), Dimensions::new(30.0, 40.0));

        let bare = Node::new("b", XYPosition::default(), ());
        assert_eq!(get_node_dimensions(&bare), Dimensions::default());
        assert!(!node_has_dimensions(&bare));
    }

    #[test]
    fn test_position_with_origin() {
        let mut node = Node::new("a", XYPosition::new(100.0, 100.0), ()).with_size(50.0, 20.0);
        assert_eq!(get_node_position_with_origin(&node, [0.5, 0.5]), XYPosition::new(75.0, 90.0));
        node.origin = Some([0.0, 0.0]);
        assert_eq!(get_node_position_with_origin(&node, [0.5, 0.5]), XYPosition::new(100.0, 100.0));
    }

    #[test]
    fn test_handle_anchor_per_side() {
        let handle = HandleElement {
            id: None,
            node_id: "a".into(),
            handle_type: HandleType::Source,
            position: Position::Right,
            x: 90.0,
            y: 20.0,
            width: 10.0,
            height: 10.0,
        };
        let origin = XYPosition::new(100.0, 100.0);
        assert_eq!(handle.absolute_position(origin, false), XYPosition::new(200.0, 125.0));
        assert_eq!(handle.absolute_position(origin, true), XYPosition::new(195.0, 125.0));
    }

    #[test]
    fn test_internal_nodes_bounds() {
        let nodes = [internal("a", 0.0, 0.0, 10.0, 10.0), internal("b", 90.0, 40.0, 10.0, 10.0)];
        assert_eq!(get_internal_nodes_bounds(nodes.iter()), Rect::new(0.0, 0.0, 100.0, 50.0));
        assert_eq!(get_internal_nodes_bounds(std::iter::empty::<&InternalNode<()>>()), Rect::default());
    }

    #[test]
    fn test_nodes_inside_fully_and_partially() {
        let nodes = [internal("in", 10.0, 10.0, 20.0, 20.0), internal("edge", 90.0, 90.0, 20.0, 20.0)];
        let rect = Rect::new(0.0, 0.0, 100.0, 100.0);

        let full: Vec<_> = get_nodes_inside(nodes.iter(), rect, Viewport::default(), false, false)
            .into_iter()
            .map(|n| n.id.clone())
            .collect();
        assert_eq!(full, vec!["in".to_string()]);

        let partial = get_nodes_inside(nodes.iter(), rect, Viewport::default(), true, false);
        assert_eq!(partial.len(), 2);
    }

    #[test]
    fn test_nodes_inside_respects_viewport() {
        let nodes = [internal("a", 200.0, 200.0, 10.0, 10.0)];
        let rect = Rect::new(0.0, 0.0, 100.0, 100.0);
        // Pane shows flow space [200, 300) after translating by -200.
        let viewport = Viewport::new(-200.0, -200.0, 1.0);
        assert_eq!(get_nodes_inside(nodes.iter(), rect, viewport, false, false).len(), 1);
        assert!(get_nodes_inside(nodes.iter(), rect, Viewport::default(), true, false).is_empty());
    }

    #[test]
    fn test_unmeasured_nodes_are_always_inside() {
        let node = Node::new("new", XYPosition::new(5000.0, 5000.0), ());
        let internal = InternalNode::from_user_node(&node, node.position, 0);
        let found = get_nodes_inside([&internal], Rect::new(0.0, 0.0, 10.0, 10.0), Viewport::default(), true, false);
        assert_eq!(found.len(), 1);
    }
}
