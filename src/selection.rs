use crate::changes::{Change, Changeable};
use crate::edges::Edge;
use crate::nodes::Node;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashSet;

pub fn create_selection_change<T>(id: impl Into<String>, selected: bool) -> Change<T> {
    Change::Select {
        id: id.into(),
        selected,
    }
}

/// Select changes that make exactly `selected_ids` selected in `lookup`.
///
/// Only elements whose flag actually flips produce a change. With `mutate`
/// the lookup entries are updated in place as well.
pub fn get_selection_changes<L, T>(
    lookup: &mut IndexMap<String, L>,
    selected_ids: &HashSet<String>,
    mutate: bool,
) -> Vec<Change<T>>
where
    L: Changeable,
{
    let mut changes = Vec::new();
    for (id, item) in lookup.iter_mut() {
        let will_be_selected = selected_ids.contains(id);
        if item.is_selected() != will_be_selected {
            if mutate {
                item.set_selected(will_be_selected);
            }
            changes.push(create_selection_change(id.clone(), will_be_selected));
        }
    }
    changes
}

/// Ids of the selected nodes and edges, in lookup order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionSnapshot {
    pub nodes: Vec<String>,
    pub edges: Vec<String>,
}

impl SelectionSnapshot {
    pub fn capture<'a, N, E>(
        nodes: impl IntoIterator<Item = &'a N>,
        edges: impl IntoIterator<Item = &'a E>,
    ) -> Self
    where
        N: Changeable + 'a,
        E: Changeable + 'a,
    {
        Self {
            nodes: nodes
                .into_iter()
                .filter(|n| n.is_selected())
                .map(|n| n.element_id().to_string())
                .collect(),
            edges: edges
                .into_iter()
                .filter(|e| e.is_selected())
                .map(|e| e.element_id().to_string())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Payload of the selection-change event: the selected elements themselves.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionChange<ND = Value, ED = Value> {
    pub nodes: Vec<Node<ND>>,
    pub edges: Vec<Edge<ED>>,
}
