//! The change-list reducer and the diff computer.
//!
//! A [`Change`] describes one mutation of one element. Interaction code and
//! the store produce change lists; [`apply_changes`] folds a list into a
//! collection and [`get_elements_diff_changes`] computes the list that turns
//! a lookup into a given collection.

use crate::edges::Edge;
use crate::geometry::{Dimensions, XYPosition};
use crate::nodes::{InternalNode, Node};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// A single mutation of a node or edge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Change<T> {
    Select {
        id: String,
        selected: bool,
    },
    Position {
        id: String,
        position: Option<XYPosition>,
        dragging: Option<bool>,
    },
    Dimensions {
        id: String,
        dimensions: Option<Dimensions>,
        resizing: Option<bool>,
        #[serde(default)]
        set_attributes: bool,
    },
    Add {
        item: T,
        index: Option<usize>,
    },
    Remove {
        id: String,
    },
    Replace {
        id: String,
        item: T,
    },
}

pub type NodeChange<D = Value> = Change<Node<D>>;
pub type EdgeChange<D = Value> = Change<Edge<D>>;

impl<T> Change<T> {
    /// Target id. `Add` carries none.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Select { id, .. }
            | Self::Position { id, .. }
            | Self::Dimensions { id, .. }
            | Self::Remove { id }
            | Self::Replace { id, .. } => Some(id),
            Self::Add { .. } => None,
        }
    }

    pub fn position(id: impl Into<String>, position: XYPosition) -> Self {
        Self::Position {
            id: id.into(),
            position: Some(position),
            dragging: None,
        }
    }

    pub fn dimensions(id: impl Into<String>, dimensions: Dimensions) -> Self {
        Self::Dimensions {
            id: id.into(),
            dimensions: Some(dimensions),
            resizing: None,
            set_attributes: false,
        }
    }

    pub fn remove(id: impl Into<String>) -> Self {
        Self::Remove { id: id.into() }
    }

    pub fn add(item: T) -> Self {
        Self::Add { item, index: None }
    }

    pub fn add_at(item: T, index: usize) -> Self {
        Self::Add {
            item,
            index: Some(index),
        }
    }
}

/// An element the reducer can mutate.
pub trait Changeable: Clone {
    fn element_id(&self) -> &str;

    fn is_selected(&self) -> bool;

    fn set_selected(&mut self, selected: bool);

    /// Ignored by elements without a position.
    fn apply_position(&mut self, _position: Option<XYPosition>, _dragging: Option<bool>) {}

    /// Ignored by elements without a size.
    fn apply_dimensions(
        &mut self,
        _dimensions: Option<Dimensions>,
        _resizing: Option<bool>,
        _set_attributes: bool,
    ) {
    }
}

impl<D: Clone> Changeable for Node<D> {
    fn element_id(&self) -> &str {
        &self.id
    }

    fn is_selected(&self) -> bool {
        self.selected
    }

    fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    fn apply_position(&mut self, position: Option<XYPosition>, dragging: Option<bool>) {
        if let Some(position) = position {
            self.position = position;
        }
        if let Some(dragging) = dragging {
            self.dragging = dragging;
        }
    }

    fn apply_dimensions(
        &mut self,
        dimensions: Option<Dimensions>,
        resizing: Option<bool>,
        set_attributes: bool,
    ) {
        if let Some(dimensions) = dimensions {
            self.measured = Some(dimensions);
            if set_attributes {
                self.width = Some(dimensions.width);
                self.height = Some(dimensions.height);
            }
        }
        if let Some(resizing) = resizing {
            self.resizing = resizing;
        }
    }
}

impl<D: Clone> Changeable for InternalNode<D> {
    fn element_id(&self) -> &str {
        &self.node.id
    }

    fn is_selected(&self) -> bool {
        self.node.selected
    }

    fn set_selected(&mut self, selected: bool) {
        self.node.selected = selected;
    }

    fn apply_position(&mut self, position: Option<XYPosition>, dragging: Option<bool>) {
        self.node.apply_position(position, dragging);
    }

    fn apply_dimensions(
        &mut self,
        dimensions: Option<Dimensions>,
        resizing: Option<bool>,
        set_attributes: bool,
    ) {
        self.node.apply_dimensions(dimensions, resizing, set_attributes);
    }
}

impl<D: Clone> Changeable for Edge<D> {
    fn element_id(&self) -> &str {
        &self.id
    }

    fn is_selected(&self) -> bool {
        self.selected
    }

    fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }
}

/// Lookup entries that wrap the element the host supplied.
pub trait UserElement<T> {
    fn user_element(&self) -> &T;
}

impl<D> UserElement<Node<D>> for InternalNode<D> {
    fn user_element(&self) -> &Node<D> {
        &self.internals.user_node
    }
}

impl<D> UserElement<Edge<D>> for Edge<D> {
    fn user_element(&self) -> &Edge<D> {
        self
    }
}

/// Apply `changes` to `elements`.
///
/// Unaffected elements keep their relative order. For one id, a `Remove`
/// wins over everything else in the batch, a `Replace` wins over field
/// changes, and the last `Replace` wins. Changes for unknown ids do nothing.
/// Added items are inserted after all other changes, in the order given.
pub fn apply_changes<T: Changeable>(changes: &[Change<T>], elements: Vec<T>) -> Vec<T> {
    let mut adds = Vec::new();
    let mut by_id: HashMap<&str, Vec<&Change<T>>> = HashMap::new();

    for change in changes {
        match change {
            Change::Add { item, index } => adds.push((item, *index)),
            other => {
                if let Some(id) = other.id() {
                    by_id.entry(id).or_default().push(other);
                }
            }
        }
    }

    let mut updated = Vec::with_capacity(elements.len() + adds.len());

    for mut element in elements {
        let Some(element_changes) = by_id.get(element.element_id()) else {
            updated.push(element);
            continue;
        };

        if element_changes
            .iter()
            .any(|change| matches!(change, Change::Remove { .. }))
        {
            continue;
        }

        let replacement = element_changes.iter().rev().find_map(|change| match change {
            Change::Replace { item, .. } => Some(item),
            _ => None,
        });
        if let Some(item) = replacement {
            updated.push(item.clone());
            continue;
        }

        for change in element_changes {
            apply_change(change, &mut element);
        }
        updated.push(element);
    }

    for (item, index) in adds {
        match index {
            Some(index) => updated.insert(index.min(updated.len()), item.clone()),
            None => updated.push(item.clone()),
        }
    }

    updated
}

fn apply_change<T: Changeable>(change: &Change<T>, element: &mut T) {
    match change {
        Change::Select { selected, .. } => element.set_selected(*selected),
        Change::Position {
            position, dragging, ..
        } => element.apply_position(*position, *dragging),
        Change::Dimensions {
            dimensions,
            resizing,
            set_attributes,
            ..
        } => element.apply_dimensions(*dimensions, *resizing, *set_attributes),
        Change::Add { .. } | Change::Remove { .. } | Change::Replace { .. } => {}
    }
}

pub fn apply_node_changes<D: Clone>(changes: &[NodeChange<D>], nodes: Vec<Node<D>>) -> Vec<Node<D>> {
    apply_changes(changes, nodes)
}

pub fn apply_edge_changes<D: Clone>(changes: &[EdgeChange<D>], edges: Vec<Edge<D>>) -> Vec<Edge<D>> {
    apply_changes(changes, edges)
}

/// Changes that bring `lookup` in line with `items`.
///
/// Per item in order: `Add` (with its index) when unknown, `Replace` when
/// the user element differs, nothing when equal. Then `Remove` for every
/// lookup id missing from `items`.
pub fn get_elements_diff_changes<T, L>(items: &[T], lookup: &IndexMap<String, L>) -> Vec<Change<T>>
where
    T: Changeable + PartialEq,
    L: UserElement<T>,
{
    let mut changes = Vec::new();
    let mut item_ids: HashSet<&str> = HashSet::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let id = item.element_id();
        item_ids.insert(id);
        match lookup.get(id) {
            None => changes.push(Change::Add {
                item: item.clone(),
                index: Some(index),
            }),
            Some(existing) if existing.user_element() != item => changes.push(Change::Replace {
                id: id.to_string(),
                item: item.clone(),
            }),
            Some(_) => {}
        }
    }

    for id in lookup.keys() {
        if !item_ids.contains(id.as_str()) {
            changes.push(Change::remove(id.clone()));
        }
    }

    changes
}

pub fn element_to_remove_change<T: Changeable, U>(item: &T) -> Change<U> {
    Change::remove(item.element_id())
}
