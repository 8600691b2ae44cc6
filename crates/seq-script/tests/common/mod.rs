//! Common test utilities for the sequence engine
//!
//! Scripted items, conditions and triggers that record what ran, in order,
//! into a shared [`Journal`].

#![allow(dead_code)]

mod journal;
mod mock_automation;
mod mock_item;

pub use journal::*;
pub use mock_automation::*;
pub use mock_item::*;

use seq_model::{Container, EntityInfo, NodeId, SequenceTree};

/// Root container with the given strategy
pub fn sequence(container: Container) -> SequenceTree {
    SequenceTree::new(EntityInfo::new("Root"), container)
}

/// Append scripted items to `parent`, returning their IDs
pub fn add_items(tree: &mut SequenceTree, parent: NodeId, items: Vec<ScriptedItem>) -> Vec<NodeId> {
    items
        .into_iter()
        .map(|item| {
            let name = item.label().to_string();
            tree.add_item(parent, EntityInfo::new(name), Box::new(item))
                .unwrap()
        })
        .collect()
}
