//! Node adoption and the derived lookups.
//!
//! These routines keep the node lookup, the parent lookup and every node's
//! absolute position consistent with the user nodes. The store calls them
//! at each structural change; drag code uses [`calculate_node_position`].

use crate::changes::{Change, NodeChange};
use crate::errors::FlowError;
use crate::geometry::{
    clamp_position, get_bounds_of_rects, CoordinateExtent, Dimensions, NodeOrigin, Rect, XYPosition,
};
use crate::nodes::{
    get_node_dimensions, get_node_position_with_origin, ElementData, HandleBounds, InternalNode, Node,
    NodeExtent,
};
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

pub type NodeLookup<D = Value> = IndexMap<String, InternalNode<D>>;

/// Parent id -> child ids, in adoption order.
pub type ParentLookup = IndexMap<String, IndexSet<String>>;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdoptOptions {
    pub node_origin: NodeOrigin,
    pub node_extent: CoordinateExtent,
    pub elevate_nodes_on_select: bool,
    /// Keep the internal node when the user node is unchanged.
    pub check_equality: bool,
}

impl Default for AdoptOptions {
    fn default() -> Self {
        Self {
            node_origin: [0.0, 0.0],
            node_extent: CoordinateExtent::INFINITE,
            elevate_nodes_on_select: true,
            check_equality: true,
        }
    }
}

const SELECTED_NODE_Z: i32 = 1000;

fn calculate_z<D>(node: &Node<D>, selected_z: i32) -> i32 {
    node.z_index.unwrap_or(0) + if node.selected { selected_z } else { 0 }
}

/// Rebuild `lookup` and `parent_lookup` from `nodes`.
///
/// Children are resolved after every node is known, so a parent may come
/// after its children. A child whose parent is missing is kept as a root
/// and reported through `on_error`. Returns whether every visible node has
/// been measured.
pub fn adopt_user_nodes<D: ElementData>(
    nodes: &[Node<D>],
    lookup: &mut NodeLookup<D>,
    parent_lookup: &mut ParentLookup,
    options: &AdoptOptions,
    on_error: &mut dyn FnMut(FlowError),
) -> bool {
    let mut previous = std::mem::take(lookup);
    parent_lookup.clear();

    let selected_z = if options.elevate_nodes_on_select {
        SELECTED_NODE_Z
    } else {
        0
    };
    let mut nodes_initialized = true;

    for user_node in nodes {
        let existing = previous.swap_remove(&user_node.id);
        let internal = match existing {
            Some(existing) if options.check_equality && existing.internals.user_node == *user_node => {
                existing
            }
            existing => {
                let position = get_node_position_with_origin(user_node, options.node_origin);
                let extent = match user_node.extent {
                    Some(NodeExtent::Coordinate(extent)) => extent,
                    _ => options.node_extent,
                };
                let clamped = clamp_position(position, &extent, get_node_dimensions(user_node));
                let mut internal =
                    InternalNode::from_user_node(user_node, clamped, calculate_z(user_node, selected_z));
                if let Some(existing) = existing {
                    internal.internals.handle_bounds = existing.internals.handle_bounds;
                    if internal.node.measured.is_none() {
                        internal.node.measured = existing.node.measured;
                    }
                }
                internal
            }
        };

        if !internal.hidden && !internal.is_measured() {
            nodes_initialized = false;
        }
        lookup.insert(user_node.id.clone(), internal);
    }

    update_child_nodes(lookup, parent_lookup, options.node_origin, options.node_extent, selected_z, Some(on_error));

    nodes_initialized
}

/// Recompute the absolute position and z of every child node.
pub fn update_absolute_positions<D>(
    lookup: &mut NodeLookup<D>,
    parent_lookup: &mut ParentLookup,
    node_origin: NodeOrigin,
    node_extent: CoordinateExtent,
    elevate_nodes_on_select: bool,
) {
    let selected_z = if elevate_nodes_on_select {
        SELECTED_NODE_Z
    } else {
        0
    };
    update_child_nodes(lookup, parent_lookup, node_origin, node_extent, selected_z, None);
}

/// Number of resolvable ancestors, `None` for a parent cycle.
fn parent_depth<D>(lookup: &NodeLookup<D>, id: &str) -> Option<usize> {
    let mut depth = 0;
    let mut current = lookup.get(id)?;
    while let Some(parent) = current.parent_id.as_deref().and_then(|pid| lookup.get(pid)) {
        depth += 1;
        if depth > lookup.len() {
            return None;
        }
        current = parent;
    }
    Some(depth)
}

fn update_child_nodes<D>(
    lookup: &mut NodeLookup<D>,
    parent_lookup: &mut ParentLookup,
    node_origin: NodeOrigin,
    node_extent: CoordinateExtent,
    selected_z: i32,
    mut on_error: Option<&mut dyn FnMut(FlowError)>,
) {
    let mut children: Vec<(usize, String)> = Vec::new();
    for (id, node) in lookup.iter() {
        let Some(parent_id) = node.parent_id.as_deref() else {
            continue;
        };
        if !lookup.contains_key(parent_id) {
            if let Some(on_error) = on_error.as_deref_mut() {
                on_error(FlowError::ParentNotFound {
                    id: id.clone(),
                    parent_id: parent_id.to_string(),
                });
            }
            continue;
        }
        match parent_depth(lookup, id) {
            Some(depth) => children.push((depth, id.clone())),
            None => tracing::warn!(node = %id, "flow: parent cycle, node treated as root"),
        }
    }
    // Parents before children
    children.sort_by_key(|(depth, _)| *depth);

    for (_, id) in children {
        update_child_node(&id, lookup, parent_lookup, node_origin, node_extent, selected_z);
    }
}

fn update_child_node<D>(
    id: &str,
    lookup: &mut NodeLookup<D>,
    parent_lookup: &mut ParentLookup,
    node_origin: NodeOrigin,
    node_extent: CoordinateExtent,
    selected_z: i32,
) {
    let Some(child) = lookup.get(id) else {
        return;
    };
    let Some(parent_id) = child.parent_id.clone() else {
        return;
    };
    let Some(parent) = lookup.get(&parent_id) else {
        return;
    };

    let position = get_node_position_with_origin(&child.node, node_origin);
    let dimensions = child.dimensions();
    let clamped = match child.extent {
        Some(NodeExtent::Coordinate(extent)) => clamp_position(position, &extent, dimensions),
        _ => position,
    };
    let parent_absolute = parent.internals.position_absolute;
    let mut position_absolute = clamp_position(
        XYPosition::new(parent_absolute.x + clamped.x, parent_absolute.y + clamped.y),
        &node_extent,
        dimensions,
    );
    if child.extent == Some(NodeExtent::Parent) {
        position_absolute = clamp_position_to_parent(position_absolute, dimensions, parent);
    }

    let child_z = calculate_z(&child.node, selected_z);
    let parent_z = parent.internals.z;
    let z = if parent_z >= child_z { parent_z + 1 } else { child_z };

    parent_lookup
        .entry(parent_id)
        .or_default()
        .insert(id.to_string());

    if let Some(child) = lookup.get_mut(id) {
        child.internals.position_absolute = position_absolute;
        child.internals.z = z;
    }
}

/// Keep a child of the given size inside its parent's rect.
pub fn clamp_position_to_parent<D>(
    position: XYPosition,
    dimensions: Dimensions,
    parent: &InternalNode<D>,
) -> XYPosition {
    let origin = parent.internals.position_absolute;
    let size = parent.dimensions();
    let extent = CoordinateExtent::new(origin.x, origin.y, origin.x + size.width, origin.y + size.height);
    clamp_position(position, &extent, dimensions)
}

/// A node's freshly measured size and handles.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeMeasurement {
    pub dimensions: Dimensions,
    pub handle_bounds: HandleBounds,
}

/// One entry of an `update_node_internals` request.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeUpdate {
    pub id: String,
    /// `None` when the surface could not measure the node.
    pub measurement: Option<NodeMeasurement>,
    pub force: bool,
}

/// A child whose rect may require its parent to grow.
#[derive(Clone, Debug, PartialEq)]
pub struct ParentExpandChild {
    pub id: String,
    pub parent_id: String,
    pub rect: Rect,
}

/// Write measurements into the lookup.
///
/// Hidden nodes lose their handle bounds. A node is updated when its
/// measured size is non-zero and either changed, its handle bounds are
/// missing, or the update is forced. Returns the `Dimensions` changes (plus
/// parent expansion changes) and whether any internals changed.
pub fn update_node_internals<D: Clone>(
    updates: &[NodeUpdate],
    lookup: &mut NodeLookup<D>,
    parent_lookup: &mut ParentLookup,
    node_origin: NodeOrigin,
    node_extent: CoordinateExtent,
) -> (Vec<NodeChange<D>>, bool) {
    let mut changes = Vec::new();
    let mut updated_internals = false;
    let mut expand_children = Vec::new();

    for update in updates {
        let Some(node) = lookup.get(&update.id) else {
            continue;
        };
        if node.hidden {
            if let Some(node) = lookup.get_mut(&update.id) {
                node.internals.handle_bounds = None;
            }
            updated_internals = true;
            continue;
        }
        let Some(measurement) = &update.measurement else {
            continue;
        };

        let dimensions = measurement.dimensions;
        let dimension_changed = node.measured != Some(dimensions);
        let do_update = dimensions.is_measured()
            && (dimension_changed || node.internals.handle_bounds.is_none() || update.force);
        if !do_update {
            continue;
        }

        let parent = node.parent_id.as_deref().and_then(|pid| lookup.get(pid));
        let mut position_absolute = node.internals.position_absolute;
        match (parent, node.extent) {
            (Some(parent), Some(NodeExtent::Parent)) => {
                position_absolute = clamp_position_to_parent(position_absolute, dimensions, parent);
            }
            (_, Some(NodeExtent::Coordinate(extent))) => {
                position_absolute = clamp_position(position_absolute, &extent, dimensions);
            }
            _ => {
                position_absolute = clamp_position(position_absolute, &node_extent, dimensions);
            }
        }

        let expand = match (&node.parent_id, node.expand_parent) {
            (Some(parent_id), true) => Some(parent_id.clone()),
            _ => None,
        };

        if let Some(node) = lookup.get_mut(&update.id) {
            node.node.measured = Some(dimensions);
            node.internals.position_absolute = position_absolute;
            node.internals.handle_bounds = Some(measurement.handle_bounds.clone());
        }
        updated_internals = true;

        if dimension_changed {
            changes.push(Change::dimensions(update.id.clone(), dimensions));
            if let Some(parent_id) = expand {
                expand_children.push(ParentExpandChild {
                    id: update.id.clone(),
                    parent_id,
                    rect: Rect::from_position(position_absolute, dimensions),
                });
            }
        }
    }

    if !expand_children.is_empty() {
        changes.extend(handle_expand_parent(&expand_children, lookup, parent_lookup, node_origin));
    }

    (changes, updated_internals)
}

/// Changes that grow each parent to contain its expanding children.
///
/// A parent that has to grow to the left or top is moved, and its other
/// children are moved the opposite way so they keep their absolute place.
pub fn handle_expand_parent<D>(
    children: &[ParentExpandChild],
    lookup: &NodeLookup<D>,
    parent_lookup: &ParentLookup,
    node_origin: NodeOrigin,
) -> Vec<NodeChange<D>> {
    let mut changes = Vec::new();
    let mut expansions: IndexMap<&str, Rect> = IndexMap::new();

    for child in children {
        let Some(parent) = lookup.get(&child.parent_id) else {
            continue;
        };
        let parent_rect = expansions
            .get(child.parent_id.as_str())
            .copied()
            .unwrap_or_else(|| parent.rect());
        expansions.insert(child.parent_id.as_str(), get_bounds_of_rects(&parent_rect, &child.rect));
    }

    for (parent_id, expanded) in expansions {
        let Some(parent) = lookup.get(parent_id) else {
            continue;
        };
        let position_absolute = parent.internals.position_absolute;
        let dimensions = parent.dimensions();
        let origin = parent.origin.unwrap_or(node_origin);

        let x_change = if expanded.x < position_absolute.x {
            (position_absolute.x - expanded.x).abs().round()
        } else {
            0.0
        };
        let y_change = if expanded.y < position_absolute.y {
            (position_absolute.y - expanded.y).abs().round()
        } else {
            0.0
        };
        let new_width = dimensions.width.max(expanded.width.round());
        let new_height = dimensions.height.max(expanded.height.round());
        let width_change = (new_width - dimensions.width) * origin[0];
        let height_change = (new_height - dimensions.height) * origin[1];

        if x_change > 0.0 || y_change > 0.0 || width_change != 0.0 || height_change != 0.0 {
            changes.push(Change::position(
                parent_id,
                XYPosition::new(
                    parent.position.x - x_change + width_change,
                    parent.position.y - y_change + height_change,
                ),
            ));

            if let Some(siblings) = parent_lookup.get(parent_id) {
                for sibling_id in siblings {
                    if children.iter().any(|child| &child.id == sibling_id) {
                        continue;
                    }
                    if let Some(sibling) = lookup.get(sibling_id) {
                        changes.push(Change::position(
                            sibling_id.clone(),
                            XYPosition::new(sibling.position.x + x_change, sibling.position.y + y_change),
                        ));
                    }
                }
            }
        }

        if dimensions.width < expanded.width
            || dimensions.height < expanded.height
            || x_change > 0.0
            || y_change > 0.0
        {
            let width = new_width
                + if x_change > 0.0 {
                    origin[0] * x_change - width_change
                } else {
                    0.0
                };
            let height = new_height
                + if y_change > 0.0 {
                    origin[1] * y_change - height_change
                } else {
                    0.0
                };
            changes.push(Change::Dimensions {
                id: parent_id.to_string(),
                dimensions: Some(Dimensions::new(width, height)),
                resizing: None,
                set_attributes: true,
            });
        }
    }

    changes
}

/// Resolved position of a node being moved.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodePosition {
    /// Relative to the parent, origin applied.
    pub position: XYPosition,
    pub position_absolute: XYPosition,
}

/// Where `node_id` ends up when asked to move to the absolute
/// `next_position`, honoring parent and coordinate extents.
pub fn calculate_node_position<D>(
    node_id: &str,
    next_position: XYPosition,
    lookup: &NodeLookup<D>,
    node_origin: NodeOrigin,
    node_extent: CoordinateExtent,
    on_error: &mut dyn FnMut(FlowError),
) -> Option<NodePosition> {
    let node = lookup.get(node_id)?;
    let parent = node.parent_id.as_deref().and_then(|pid| lookup.get(pid));
    let parent_position = parent
        .map(|p| p.internals.position_absolute)
        .unwrap_or_default();
    let origin = node.origin.unwrap_or(node_origin);

    let mut extent = node_extent;
    match node.extent {
        Some(NodeExtent::Parent) if !node.expand_parent => match parent {
            None => on_error(FlowError::ParentExtentWithoutParent { id: node_id.to_string() }),
            Some(parent) => {
                if let Some(measured) = parent.measured.filter(|m| m.is_measured()) {
                    extent = CoordinateExtent::new(
                        parent_position.x,
                        parent_position.y,
                        parent_position.x + measured.width,
                        parent_position.y + measured.height,
                    );
                }
            }
        },
        Some(NodeExtent::Coordinate(coordinate)) => extent = coordinate.translate(parent_position),
        _ => {}
    }

    let measured = node.measured.unwrap_or_default();
    if node.measured.is_none() {
        on_error(FlowError::NodeNotMeasured { id: node_id.to_string() });
    }
    let position_absolute = clamp_position(next_position, &extent, measured);

    Some(NodePosition {
        position: XYPosition::new(
            position_absolute.x - parent_position.x + measured.width * origin[0],
            position_absolute.y - parent_position.y + measured.height * origin[1],
        ),
        position_absolute,
    })
}
