//! Structural tests for the sequence tree: attach/detach/move, deep cloning,
//! target inheritance, validation and duration estimates.

use async_trait::async_trait;
use seq_core::{Coordinates, Issue, Status, Target};
use seq_model::{
    ConditionContext, ConditionSlot, Container, EntityInfo, ItemContext, ItemOutcome,
    ParentContext, SequenceCondition, SequenceItem, SequenceTree, Strategy, TreeError,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Test entities
// ============================================================================

/// Item with a fixed duration that remembers the last target it inherited
#[derive(Clone, Default)]
struct Stub {
    seconds: u64,
    issues: Vec<Issue>,
    target: Arc<Mutex<Option<String>>>,
}

impl Stub {
    fn lasting(seconds: u64) -> Box<Self> {
        Box::new(Self {
            seconds,
            ..Default::default()
        })
    }

    fn broken(issue: Issue) -> Box<Self> {
        Box::new(Self {
            issues: vec![issue],
            ..Default::default()
        })
    }
}

#[async_trait]
impl SequenceItem for Stub {
    fn kind(&self) -> &'static str {
        "probe"
    }

    fn validate(&self) -> Vec<Issue> {
        self.issues.clone()
    }

    async fn execute(&self, _ctx: &ItemContext<'_>) -> ItemOutcome {
        ItemOutcome::Completed
    }

    fn estimated_duration(&self) -> Duration {
        Duration::from_secs(self.seconds)
    }

    fn after_parent_changed(&mut self, parent: &ParentContext) {
        *self.target.lock().unwrap() = parent.target.as_ref().map(|t| t.name.clone());
    }

    fn clone_item(&self) -> Box<dyn SequenceItem> {
        Box::new(Stub {
            seconds: self.seconds,
            issues: self.issues.clone(),
            target: Arc::new(Mutex::new(self.target.lock().unwrap().clone())),
        })
    }

    fn params(&self) -> serde_json::Value {
        json!({ "seconds": self.seconds })
    }
}

#[derive(Clone)]
struct Passes(Option<u32>);

impl SequenceCondition for Passes {
    fn kind(&self) -> &'static str {
        "passes"
    }

    fn check(&self, ctx: &ConditionContext<'_>) -> bool {
        self.0.map_or(true, |limit| ctx.completed_iterations < limit)
    }

    fn iteration_hint(&self) -> Option<u32> {
        self.0
    }

    fn clone_condition(&self) -> Box<dyn SequenceCondition> {
        Box::new(self.clone())
    }

    fn params(&self) -> serde_json::Value {
        json!({ "passes": self.0 })
    }
}

fn passes(limit: Option<u32>) -> ConditionSlot {
    ConditionSlot::new(EntityInfo::new("passes"), Box::new(Passes(limit)))
}

fn m31() -> Target {
    Target {
        name: "M31".to_string(),
        coordinates: Coordinates::new(0.712, 41.27),
    }
}

fn sequence() -> SequenceTree {
    SequenceTree::new(EntityInfo::new("Root"), Container::sequential())
}

// ============================================================================
// Structure
// ============================================================================

#[test]
fn test_add_keeps_parent_and_order() {
    let mut tree = sequence();
    let root = tree.root();
    let a = tree.add_item(root, EntityInfo::new("A"), Stub::lasting(1)).unwrap();
    let c = tree.add_item(root, EntityInfo::new("C"), Stub::lasting(1)).unwrap();
    let b = tree
        .insert_item(root, 1, EntityInfo::new("B"), Stub::lasting(1))
        .unwrap();

    assert_eq!(tree.children(root).unwrap(), &[a, b, c]);
    assert_eq!(tree.parent(b).unwrap(), Some(root));
    assert_eq!(tree.path(b).unwrap(), "Root/B");
    assert_eq!(tree.find("C"), Some(c));
    assert_eq!(tree.len(), 4);
}

#[test]
fn test_insert_out_of_range() {
    let mut tree = sequence();
    let root = tree.root();
    let err = tree
        .insert_item(root, 2, EntityInfo::new("A"), Stub::lasting(1))
        .unwrap_err();
    assert_eq!(err, TreeError::IndexOutOfRange { index: 2, len: 0 });
}

#[test]
fn test_item_is_not_a_container() {
    let mut tree = sequence();
    let root = tree.root();
    let a = tree.add_item(root, EntityInfo::new("A"), Stub::lasting(1)).unwrap();
    let err = tree
        .add_item(a, EntityInfo::new("B"), Stub::lasting(1))
        .unwrap_err();
    assert_eq!(err, TreeError::NotAContainer(a));
}

#[test]
fn test_detach_and_reattach() {
    let mut tree = sequence();
    let root = tree.root();
    let group = tree
        .add_container(root, EntityInfo::new("Group"), Container::sequential())
        .unwrap();
    let leaf = tree.add_item(group, EntityInfo::new("Leaf"), Stub::lasting(3)).unwrap();

    let detached = tree.detach(group).unwrap();
    assert!(!tree.contains(group));
    assert!(!tree.contains(leaf));
    assert!(tree.children(root).unwrap().is_empty());
    assert_eq!(detached.len(), 2);
    assert_eq!(detached.parent(detached.root()).unwrap(), None);

    let new_group = tree.attach(root, None, detached).unwrap();
    let new_leaf = tree.children(new_group).unwrap()[0];
    assert_eq!(tree.parent(new_leaf).unwrap(), Some(new_group));
    assert_eq!(tree.path(new_leaf).unwrap(), "Root/Group/Leaf");
}

#[test]
fn test_root_cannot_be_detached() {
    let mut tree = sequence();
    let root = tree.root();
    assert_eq!(tree.detach(root).unwrap_err(), TreeError::RootNode);
}

#[test]
fn test_move_between_containers() {
    let mut tree = sequence();
    let root = tree.root();
    let first = tree
        .add_container(root, EntityInfo::new("First"), Container::sequential())
        .unwrap();
    let second = tree
        .add_container(root, EntityInfo::new("Second"), Container::sequential())
        .unwrap();
    let item = tree.add_item(first, EntityInfo::new("Item"), Stub::lasting(1)).unwrap();

    tree.move_node(item, second, 0).unwrap();
    assert!(tree.children(first).unwrap().is_empty());
    assert_eq!(tree.children(second).unwrap(), &[item]);
    assert_eq!(tree.parent(item).unwrap(), Some(second));
}

#[test]
fn test_move_under_own_descendant_is_rejected() {
    let mut tree = sequence();
    let root = tree.root();
    let outer = tree
        .add_container(root, EntityInfo::new("Outer"), Container::sequential())
        .unwrap();
    let inner = tree
        .add_container(outer, EntityInfo::new("Inner"), Container::sequential())
        .unwrap();

    let err = tree.move_node(outer, inner, 0).unwrap_err();
    assert_eq!(
        err,
        TreeError::Cycle {
            node: outer,
            parent: inner
        }
    );
    assert_eq!(tree.parent(outer).unwrap(), Some(root));
}

#[test]
fn test_move_bad_index_restores_position() {
    let mut tree = sequence();
    let root = tree.root();
    let group = tree
        .add_container(root, EntityInfo::new("Group"), Container::sequential())
        .unwrap();
    let item = tree.add_item(root, EntityInfo::new("Item"), Stub::lasting(1)).unwrap();

    assert!(tree.move_node(item, group, 5).is_err());
    assert_eq!(tree.children(root).unwrap(), &[group, item]);
    assert_eq!(tree.parent(item).unwrap(), Some(root));
}

// ============================================================================
// Parent context
// ============================================================================

#[test]
fn test_items_inherit_nearest_target() {
    let mut tree = sequence();
    let root = tree.root();
    let targeted = tree
        .add_container(
            root,
            EntityInfo::new("Target"),
            Container::sequential().with_target(m31()),
        )
        .unwrap();
    let inner = tree
        .add_container(targeted, EntityInfo::new("Inner"), Container::sequential())
        .unwrap();

    let probe = Stub::lasting(1);
    let seen = probe.target.clone();
    let item = tree.add_item(inner, EntityInfo::new("Slew"), probe).unwrap();
    assert_eq!(seen.lock().unwrap().as_deref(), Some("M31"));

    tree.move_node(item, root, 0).unwrap();
    assert_eq!(*seen.lock().unwrap(), None);
}

// ============================================================================
// Cloning
// ============================================================================

#[test]
fn test_clone_is_independent() {
    let mut tree = sequence();
    let root = tree.root();
    let group = tree
        .add_container(root, EntityInfo::new("Group"), Container::sequential())
        .unwrap();
    let leaf = tree.add_item(group, EntityInfo::new("Leaf"), Stub::lasting(2)).unwrap();

    tree.state(leaf).unwrap().transition(Status::Running).unwrap();
    tree.state(leaf).unwrap().transition(Status::Finished).unwrap();

    let mut copy = tree.clone_subtree(group).unwrap();
    let copy_root = copy.root();
    let copy_leaf = copy.children(copy_root).unwrap()[0];

    assert_eq!(copy.parent(copy_root).unwrap(), None);
    assert_eq!(copy.status(copy_leaf).unwrap(), Status::Created);
    assert_eq!(copy.node(copy_leaf).unwrap().name(), "Leaf");

    copy.node_mut(copy_leaf).unwrap().info_mut().name = "Renamed".to_string();
    copy.add_item(copy_root, EntityInfo::new("Extra"), Stub::lasting(1))
        .unwrap();

    assert_eq!(tree.node(leaf).unwrap().name(), "Leaf");
    assert_eq!(tree.children(group).unwrap().len(), 1);
    assert_eq!(tree.status(leaf).unwrap(), Status::Finished);
}

#[test]
fn test_reset_returns_subtree_to_created() {
    let mut tree = sequence();
    let root = tree.root();
    let leaf = tree.add_item(root, EntityInfo::new("Leaf"), Stub::lasting(2)).unwrap();
    let state = tree.state(leaf).unwrap();
    state.transition(Status::Skipped).unwrap();

    tree.reset(root).unwrap();
    assert_eq!(tree.status(leaf).unwrap(), Status::Created);
}

#[test]
fn test_reset_status_returns_subtree_to_created() {
    let mut tree = sequence();
    let root = tree.root();
    let leaf = tree.add_item(root, EntityInfo::new("Leaf"), Stub::lasting(2)).unwrap();
    tree.state(leaf).unwrap().transition(Status::Skipped).unwrap();

    tree.reset_status(root).unwrap();
    assert_eq!(tree.status(leaf).unwrap(), Status::Created);
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_validation_collects_descendant_issues() {
    let mut tree = sequence();
    let root = tree.root();
    let group = tree
        .add_container(root, EntityInfo::new("Group"), Container::sequential())
        .unwrap();
    let bad = tree
        .add_item(group, EntityInfo::new("Bad"), Stub::broken(Issue::NoTarget))
        .unwrap();
    tree.add_item(root, EntityInfo::new("Good"), Stub::lasting(1))
        .unwrap();

    let report = tree.validate_all().unwrap();
    assert!(!report.is_valid());
    assert_eq!(report.len(), 1);
    assert_eq!(report.entries()[0].node, bad);
    assert_eq!(report.entries()[0].entity, "Root/Group/Bad");
    assert_eq!(tree.state(bad).unwrap().issues(), vec![Issue::NoTarget]);

    let group_report = tree.validate(group).unwrap();
    assert_eq!(group_report.entries()[0].entity, "Group/Bad");
}

#[test]
fn test_disabled_entities_are_not_validated() {
    let mut tree = sequence();
    let root = tree.root();
    let group = tree
        .add_container(
            root,
            EntityInfo::new("Group").disabled(),
            Container::sequential(),
        )
        .unwrap();
    tree.add_item(group, EntityInfo::new("Bad"), Stub::broken(Issue::NoTarget))
        .unwrap();

    assert!(tree.validate_all().unwrap().is_valid());
}

#[test]
fn test_loop_without_conditions_is_invalid() {
    let mut tree = sequence();
    let root = tree.root();
    let looping = tree
        .add_container(root, EntityInfo::new("Loop"), Container::repeat_while())
        .unwrap();

    let report = tree.validate_all().unwrap();
    assert_eq!(report.issues().collect::<Vec<_>>(), vec![&Issue::NoLoopConditions]);

    tree.container_mut(looping)
        .unwrap()
        .add_condition(passes(Some(2)));
    assert!(tree.validate_all().unwrap().is_valid());
}

#[test]
fn test_loop_with_only_disabled_conditions_is_invalid() {
    let mut tree = sequence();
    let root = tree.root();
    let mut off = passes(Some(2));
    off.info = off.info.disabled();
    tree.add_container(
        root,
        EntityInfo::new("Loop"),
        Container::repeat_while().with_condition(off),
    )
    .unwrap();

    let report = tree.validate_all().unwrap();
    assert_eq!(report.issues().collect::<Vec<_>>(), vec![&Issue::NoLoopConditions]);
}

#[test]
fn test_validation_is_rebuilt_each_pass() {
    let mut tree = sequence();
    let root = tree.root();
    let bad = tree
        .add_item(root, EntityInfo::new("Bad"), Stub::broken(Issue::NoTarget))
        .unwrap();
    assert!(!tree.state(bad).unwrap().is_valid());

    tree.node_mut(bad).unwrap().info_mut().enabled = false;
    tree.validate_all().unwrap();
    assert!(tree.state(bad).unwrap().is_valid());
}

// ============================================================================
// Estimates
// ============================================================================

#[test]
fn test_estimate_sums_children() {
    let mut tree = sequence();
    let root = tree.root();
    tree.add_item(root, EntityInfo::new("A"), Stub::lasting(10)).unwrap();
    tree.add_item(root, EntityInfo::new("B"), Stub::lasting(5)).unwrap();
    tree.add_item(root, EntityInfo::new("Off").disabled(), Stub::lasting(100))
        .unwrap();

    assert_eq!(
        tree.total_estimated_duration().unwrap(),
        Duration::from_secs(15)
    );
}

#[test]
fn test_estimate_multiplies_by_smallest_hint() {
    let mut tree = sequence();
    let root = tree.root();
    let looping = tree
        .add_container(
            root,
            EntityInfo::new("Loop"),
            Container::new(Strategy::RepeatWhile)
                .with_condition(passes(Some(5)))
                .with_condition(passes(Some(3)))
                .with_condition(passes(None)),
        )
        .unwrap();
    tree.add_item(looping, EntityInfo::new("A"), Stub::lasting(10))
        .unwrap();

    assert_eq!(
        tree.estimated_duration(looping).unwrap(),
        Duration::from_secs(30)
    );
}

#[test]
fn test_estimate_loop_without_hint_counts_once() {
    let mut tree = sequence();
    let root = tree.root();
    let looping = tree
        .add_container(
            root,
            EntityInfo::new("Loop"),
            Container::repeat_while().with_condition(passes(None)),
        )
        .unwrap();
    tree.add_item(looping, EntityInfo::new("A"), Stub::lasting(7))
        .unwrap();

    assert_eq!(
        tree.total_estimated_duration().unwrap(),
        Duration::from_secs(7)
    );
}
