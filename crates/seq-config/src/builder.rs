//! Conversion between documents and sequence trees

use seq_model::{ConditionSlot, Container, NodeId, NodeKind, SequenceTree, TriggerSlot};
use tracing::{debug, warn};

use crate::document::{EntityDocument, CONTAINER_KIND};
use crate::error::DocumentResult;
use crate::registry::Registry;

impl Registry {
    /// Build a sequence tree from a document.
    ///
    /// The root may be a container or a single item; the latter produces a
    /// one-node template that can be attached elsewhere.
    pub fn build_tree(&self, doc: &EntityDocument) -> DocumentResult<SequenceTree> {
        if !doc.is_container() {
            let item = self.create_item(&doc.kind, &item_params(doc)?)?;
            return Ok(SequenceTree::from_item(doc.info(), item));
        }

        let mut tree = SequenceTree::new(doc.info(), self.build_container(doc)?);
        let root = tree.root();
        for child in &doc.children {
            self.build_node(&mut tree, root, child)?;
        }

        debug!(name = %doc.name, nodes = tree.len(), "Built sequence from document");
        Ok(tree)
    }

    fn build_node(
        &self,
        tree: &mut SequenceTree,
        parent: NodeId,
        doc: &EntityDocument,
    ) -> DocumentResult<()> {
        if !doc.is_container() {
            if !doc.children.is_empty() {
                warn!(entity = %doc.name, kind = %doc.kind, "Ignoring children of an item");
            }
            let item = self.create_item(&doc.kind, &item_params(doc)?)?;
            tree.add_item(parent, doc.info(), item)?;
            return Ok(());
        }

        let id = tree.add_container(parent, doc.info(), self.build_container(doc)?)?;
        for child in &doc.children {
            self.build_node(tree, id, child)?;
        }
        Ok(())
    }

    /// Container shell with its conditions and triggers, but no children
    fn build_container(&self, doc: &EntityDocument) -> DocumentResult<Container> {
        let mut container = Container::new(doc.strategy.unwrap_or_default());
        container.target = doc.target.clone();

        for condition in &doc.conditions {
            let built = self.create_condition(&condition.kind, &condition.params_value())?;
            container.add_condition(ConditionSlot::new(condition.info(), built));
        }

        for trigger in &doc.triggers {
            let built = self.create_trigger(&trigger.kind, &trigger.params_value())?;
            let mut slot = TriggerSlot::new(trigger.info(), built);
            if let Some(sequence) = &trigger.sequence {
                slot = slot.with_sequence(self.build_tree(sequence)?);
            }
            container.add_trigger(slot);
        }

        Ok(container)
    }
}

/// Item parameters, with a `target` key restored from the shared field
fn item_params(doc: &EntityDocument) -> DocumentResult<serde_json::Value> {
    let mut params = doc.params.clone();
    if let Some(target) = &doc.target {
        params.insert("target".to_string(), serde_json::to_value(target)?);
    }
    Ok(serde_json::Value::Object(params))
}

/// Serialize the whole tree
pub fn tree_to_document(tree: &SequenceTree) -> DocumentResult<EntityDocument> {
    subtree_to_document(tree, tree.root())
}

/// Serialize the subtree rooted at `id`
pub fn subtree_to_document(tree: &SequenceTree, id: NodeId) -> DocumentResult<EntityDocument> {
    let node = tree.node(id)?;

    let mut doc = match node.kind() {
        NodeKind::Item(item) => {
            let mut doc = EntityDocument::new(item.kind(), "");
            let mut params = item.params();
            // Items that take a target report it as a parameter; it shares
            // the container field on disk.
            if let Some(target) = params.as_object_mut().and_then(|map| map.remove("target")) {
                doc.target = Some(serde_json::from_value(target)?);
            }
            doc.set_params(params);
            doc
        }
        NodeKind::Container(container) => {
            let mut doc = EntityDocument::new(CONTAINER_KIND, "");
            doc.strategy = Some(container.strategy);
            doc.target = container.target.clone();

            for slot in container.conditions() {
                let mut entry = EntityDocument::new(slot.condition.kind(), "");
                entry.set_info(&slot.info);
                entry.set_params(slot.condition.params());
                doc.conditions.push(entry);
            }
            for slot in container.triggers() {
                let mut entry = EntityDocument::new(slot.trigger.kind(), "");
                entry.set_info(&slot.info);
                entry.set_params(slot.trigger.params());
                if let Some(sequence) = &slot.sequence {
                    entry.sequence = Some(Box::new(tree_to_document(sequence)?));
                }
                doc.triggers.push(entry);
            }
            for child in container.children() {
                doc.children.push(subtree_to_document(tree, *child)?);
            }
            doc
        }
    };

    doc.set_info(node.info());
    Ok(doc)
}
