//! Arena-backed sequence tree
//!
//! Nodes live in a flat arena and refer to each other by [`NodeId`]. The
//! parent link is a plain index, never an owning reference: ownership flows
//! top-down through each container's child list only. Removed slots are never
//! reused, so a stale ID resolves to [`TreeError::NodeNotFound`] instead of
//! silently pointing at a different entity.
//!
//! Every structural change keeps the child list and the back-reference in
//! step, then notifies the moved subtree (`after_parent_changed`) and
//! re-validates it.

use seq_core::{EntityState, InvalidTransition, StateHandle, Status};
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

use crate::container::Container;
use crate::entity::{EntityInfo, ParentContext, SequenceItem};

/// Tree errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Node {0} is not a container")]
    NotAContainer(NodeId),

    #[error("The root node cannot be detached or moved")]
    RootNode,

    #[error("Cannot move node {node} under its own descendant {parent}")]
    Cycle { node: NodeId, parent: NodeId },

    #[error("Index {index} out of range for container with {len} children")]
    IndexOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

/// Result type for tree operations
pub type TreeResult<T> = Result<T, TreeError>;

/// Index of a node inside its tree's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a node is
pub enum NodeKind {
    Item(Box<dyn SequenceItem>),
    Container(Container),
}

/// A single entity in the tree
pub struct Node {
    info: EntityInfo,
    state: StateHandle,
    parent: Option<NodeId>,
    kind: NodeKind,
}

impl Node {
    fn new(info: EntityInfo, kind: NodeKind) -> Self {
        Self {
            info,
            state: EntityState::handle(),
            parent: None,
            kind,
        }
    }

    pub fn info(&self) -> &EntityInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut EntityInfo {
        &mut self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Shared status/issue handle, safe to read from other tasks
    pub fn state(&self) -> &StateHandle {
        &self.state
    }

    pub fn status(&self) -> Status {
        self.state.status()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Discriminator of the node's variant
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Item(item) => item.kind(),
            NodeKind::Container(_) => "container",
        }
    }

    pub fn as_item(&self) -> Option<&dyn SequenceItem> {
        match &self.kind {
            NodeKind::Item(item) => Some(item.as_ref()),
            NodeKind::Container(_) => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match &self.kind {
            NodeKind::Container(container) => Some(container),
            NodeKind::Item(_) => None,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Container(_))
    }

    /// Copy with a fresh `Created` state and no parent; children not copied
    fn duplicate_shell(&self) -> Self {
        let kind = match &self.kind {
            NodeKind::Item(item) => NodeKind::Item(item.clone_item()),
            NodeKind::Container(container) => NodeKind::Container(container.duplicate_shell()),
        };
        Node::new(self.info.clone(), kind)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.info.name)
            .field("kind", &self.kind_name())
            .field("status", &self.status())
            .field("parent", &self.parent)
            .finish()
    }
}

/// A sequence: an arena of entities with a single root
pub struct SequenceTree {
    nodes: Vec<Option<Node>>,
    root: NodeId,
}

impl SequenceTree {
    /// Create a tree whose root is the given container
    pub fn new(info: EntityInfo, container: Container) -> Self {
        let mut container = container;
        container.children.clear();
        Self {
            nodes: vec![Some(Node::new(info, NodeKind::Container(container)))],
            root: NodeId(0),
        }
    }

    /// Create a tree holding a single item
    pub fn from_item(info: EntityInfo, item: Box<dyn SequenceItem>) -> Self {
        Self {
            nodes: vec![Some(Node::new(info, NodeKind::Item(item)))],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.0), Some(Some(_)))
    }

    pub fn node(&self, id: NodeId) -> TreeResult<&Node> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(TreeError::NodeNotFound(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> TreeResult<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(TreeError::NodeNotFound(id))
    }

    pub fn parent(&self, id: NodeId) -> TreeResult<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    pub fn state(&self, id: NodeId) -> TreeResult<StateHandle> {
        Ok(self.node(id)?.state.clone())
    }

    pub fn status(&self, id: NodeId) -> TreeResult<Status> {
        Ok(self.node(id)?.status())
    }

    pub fn container(&self, id: NodeId) -> TreeResult<&Container> {
        self.node(id)?
            .as_container()
            .ok_or(TreeError::NotAContainer(id))
    }

    /// Mutable access to a container's strategy, target, conditions and
    /// triggers. Children are managed through the tree only.
    pub fn container_mut(&mut self, id: NodeId) -> TreeResult<&mut Container> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Container(container) => Ok(container),
            NodeKind::Item(_) => Err(TreeError::NotAContainer(id)),
        }
    }

    pub fn children(&self, id: NodeId) -> TreeResult<&[NodeId]> {
        Ok(self.container(id)?.children())
    }

    /// Ancestors of `id`, nearest first
    pub fn ancestors(&self, id: NodeId) -> TreeResult<Vec<NodeId>> {
        let mut ancestors = Vec::new();
        let mut current = self.node(id)?.parent;
        while let Some(parent) = current {
            ancestors.push(parent);
            current = self.node(parent)?.parent;
        }
        Ok(ancestors)
    }

    /// `id` and all of its descendants in depth-first pre-order
    pub fn descendants(&self, id: NodeId) -> TreeResult<Vec<NodeId>> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node(current)?;
            out.push(current);
            if let Some(container) = node.as_container() {
                stack.extend(container.children.iter().rev().copied());
            }
        }
        Ok(out)
    }

    /// First node with the given name, in depth-first order
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .ok()?
            .into_iter()
            .find(|id| matches!(self.node(*id), Ok(node) if node.info.name == name))
    }

    /// Path of names from the root down to `id`, joined with `/`
    pub fn path(&self, id: NodeId) -> TreeResult<String> {
        let mut names = vec![self.node(id)?.info.name.clone()];
        for ancestor in self.ancestors(id)? {
            names.push(self.node(ancestor)?.info.name.clone());
        }
        names.reverse();
        Ok(names.join("/"))
    }

    // --- Structural changes ---

    /// Append an item to a container
    pub fn add_item(
        &mut self,
        parent: NodeId,
        info: EntityInfo,
        item: Box<dyn SequenceItem>,
    ) -> TreeResult<NodeId> {
        let len = self.children(parent)?.len();
        self.insert_item(parent, len, info, item)
    }

    pub fn insert_item(
        &mut self,
        parent: NodeId,
        index: usize,
        info: EntityInfo,
        item: Box<dyn SequenceItem>,
    ) -> TreeResult<NodeId> {
        self.insert_node(parent, index, Node::new(info, NodeKind::Item(item)))
    }

    /// Append an (empty) container to a container
    pub fn add_container(
        &mut self,
        parent: NodeId,
        info: EntityInfo,
        container: Container,
    ) -> TreeResult<NodeId> {
        let len = self.children(parent)?.len();
        self.insert_container(parent, len, info, container)
    }

    pub fn insert_container(
        &mut self,
        parent: NodeId,
        index: usize,
        info: EntityInfo,
        container: Container,
    ) -> TreeResult<NodeId> {
        let mut container = container;
        container.children.clear();
        self.insert_node(
            parent,
            index,
            Node::new(info, NodeKind::Container(container)),
        )
    }

    fn insert_node(&mut self, parent: NodeId, index: usize, node: Node) -> TreeResult<NodeId> {
        self.check_insert_index(parent, index)?;

        let id = NodeId(self.nodes.len());
        let mut node = node;
        node.parent = Some(parent);
        self.nodes.push(Some(node));
        self.container_mut(parent)?.children.insert(index, id);

        debug!(node = %id, parent = %parent, index, "Attached entity");
        self.parent_changed(id)?;
        Ok(id)
    }

    fn check_insert_index(&self, parent: NodeId, index: usize) -> TreeResult<()> {
        let len = self.children(parent)?.len();
        if index > len {
            return Err(TreeError::IndexOutOfRange { index, len });
        }
        Ok(())
    }

    /// Graft another tree under `parent`, at `index` or at the end.
    ///
    /// Node IDs of the grafted tree are reassigned; the returned ID is the new
    /// ID of its root.
    pub fn attach(
        &mut self,
        parent: NodeId,
        index: Option<usize>,
        subtree: SequenceTree,
    ) -> TreeResult<NodeId> {
        let len = self.children(parent)?.len();
        let index = index.unwrap_or(len);
        self.check_insert_index(parent, index)?;

        let mut subtree = subtree;
        let source_root = subtree.root;
        let id = self.adopt(&mut subtree, source_root, Some(parent))?;
        self.container_mut(parent)?.children.insert(index, id);

        debug!(node = %id, parent = %parent, index, "Attached subtree");
        self.parent_changed(id)?;
        Ok(id)
    }

    /// Remove `id` and its descendants, returning them as a standalone tree
    pub fn detach(&mut self, id: NodeId) -> TreeResult<SequenceTree> {
        if id == self.root {
            return Err(TreeError::RootNode);
        }
        let parent = self.node(id)?.parent.ok_or(TreeError::RootNode)?;
        self.container_mut(parent)?.children.retain(|child| *child != id);

        let mut detached = SequenceTree {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        detached.root = detached.adopt(self, id, None)?;

        debug!(node = %id, parent = %parent, "Detached subtree");
        let root = detached.root;
        detached.parent_changed(root)?;
        Ok(detached)
    }

    /// Remove and drop `id` and its descendants
    pub fn remove(&mut self, id: NodeId) -> TreeResult<()> {
        self.detach(id).map(drop)
    }

    /// Move `id` under `new_parent` at `index`, keeping node IDs stable
    pub fn move_node(&mut self, id: NodeId, new_parent: NodeId, index: usize) -> TreeResult<()> {
        if id == self.root {
            return Err(TreeError::RootNode);
        }
        self.container(new_parent)?;
        if self.descendants(id)?.contains(&new_parent) {
            return Err(TreeError::Cycle {
                node: id,
                parent: new_parent,
            });
        }

        let old_parent = self.node(id)?.parent.ok_or(TreeError::RootNode)?;
        let old_index = self
            .children(old_parent)?
            .iter()
            .position(|child| *child == id)
            .ok_or(TreeError::NodeNotFound(id))?;

        self.container_mut(old_parent)?.children.remove(old_index);
        if let Err(err) = self.check_insert_index(new_parent, index) {
            self.container_mut(old_parent)?
                .children
                .insert(old_index, id);
            return Err(err);
        }
        self.container_mut(new_parent)?.children.insert(index, id);
        self.node_mut(id)?.parent = Some(new_parent);

        debug!(node = %id, from = %old_parent, to = %new_parent, index, "Moved entity");
        self.parent_changed(id)
    }

    /// Move the node at `id` (and its subtree) out of `other` into `self`
    fn adopt(
        &mut self,
        other: &mut SequenceTree,
        id: NodeId,
        parent: Option<NodeId>,
    ) -> TreeResult<NodeId> {
        let mut node = other
            .nodes
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(TreeError::NodeNotFound(id))?;

        let new_id = NodeId(self.nodes.len());
        self.nodes.push(None);
        node.parent = parent;

        if let NodeKind::Container(container) = &mut node.kind {
            let children = std::mem::take(&mut container.children);
            for child in children {
                let adopted = self.adopt(other, child, Some(new_id))?;
                container.children.push(adopted);
            }
        }

        self.nodes[new_id.0] = Some(node);
        Ok(new_id)
    }

    /// Context an entity inherits from its ancestors
    pub fn parent_context(&self, id: NodeId) -> TreeResult<ParentContext> {
        let mut context = ParentContext::default();
        for ancestor in self.ancestors(id)? {
            if let Some(target) = self.container(ancestor).ok().and_then(|c| c.target.as_ref()) {
                context.target = Some(target.clone());
                break;
            }
        }
        Ok(context)
    }

    /// Let a freshly attached subtree re-resolve context, then re-validate it
    fn parent_changed(&mut self, id: NodeId) -> TreeResult<()> {
        for node_id in self.descendants(id)? {
            let context = self.parent_context(node_id)?;
            if let NodeKind::Item(item) = &mut self.node_mut(node_id)?.kind {
                trace!(node = %node_id, ?context.target, "After parent changed");
                item.after_parent_changed(&context);
            }
        }
        self.validate(id).map(drop)
    }

    // --- Cloning ---

    /// Deep copy of `id` and its descendants as a new standalone tree.
    ///
    /// Every copy starts `Created`, without a parent, sharing no state with
    /// the original.
    pub fn clone_subtree(&self, id: NodeId) -> TreeResult<SequenceTree> {
        let source = self.node(id)?;
        let mut copy = SequenceTree {
            nodes: vec![Some(source.duplicate_shell())],
            root: NodeId(0),
        };
        self.copy_children(id, &mut copy, NodeId(0))?;

        let root = copy.root;
        copy.parent_changed(root)?;
        Ok(copy)
    }

    /// Deep copy of the whole tree
    pub fn duplicate(&self) -> SequenceTree {
        match self.clone_subtree(self.root) {
            Ok(copy) => copy,
            // The root always exists; an empty tree copies to an empty tree.
            Err(_) => SequenceTree {
                nodes: Vec::new(),
                root: NodeId(0),
            },
        }
    }

    fn copy_children(
        &self,
        source: NodeId,
        copy: &mut SequenceTree,
        target: NodeId,
    ) -> TreeResult<()> {
        let children = match self.node(source)?.as_container() {
            Some(container) => container.children.clone(),
            None => return Ok(()),
        };

        for child in children {
            let mut node = self.node(child)?.duplicate_shell();
            node.parent = Some(target);
            let new_id = NodeId(copy.nodes.len());
            copy.nodes.push(Some(node));
            copy.container_mut(target)?.children.push(new_id);
            self.copy_children(child, copy, new_id)?;
        }
        Ok(())
    }

    // --- Run bookkeeping ---

    /// Reset `id` and its descendants to `Created`, including triggers and
    /// their nested sequences.
    pub fn reset(&self, id: NodeId) -> TreeResult<()> {
        for node_id in self.descendants(id)? {
            let node = self.node(node_id)?;
            node.state.reset()?;
            if let Some(container) = node.as_container() {
                for slot in container.triggers() {
                    slot.state().reset()?;
                    slot.trigger.reset();
                    if let Some(sequence) = &slot.sequence {
                        sequence.reset(sequence.root())?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Reset only the statuses of `id` and its descendants.
    ///
    /// Trigger state carries over, so counters keep running across loop
    /// passes of the same run.
    pub fn reset_status(&self, id: NodeId) -> TreeResult<()> {
        for node_id in self.descendants(id)? {
            self.node(node_id)?.state.reset()?;
        }
        Ok(())
    }
}

impl fmt::Debug for SequenceTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceTree")
            .field("root", &self.root)
            .field("len", &self.len())
            .finish()
    }
}
