//! Recursive validation
//!
//! Every entity reports its own issues; a container is valid only when all of
//! its enabled descendants are. Issues are stored on each node's shared state
//! so observers can display them, and rebuilt from scratch on every pass.

use seq_core::{Issue, IssueFormatter};
use tracing::debug;

use crate::container::{Container, Strategy};
use crate::tree::{NodeId, NodeKind, SequenceTree, TreeResult};

/// One issue, attributed to the entity that raised it
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationEntry {
    pub node: NodeId,
    /// Path of entity names from the validated root
    pub entity: String,
    pub issue: Issue,
}

/// Outcome of a validation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    entries: Vec<ValidationEntry>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ValidationEntry] {
        &self.entries
    }

    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.entries.iter().map(|entry| &entry.issue)
    }

    /// Human-readable lines, `entity: message`
    pub fn messages(&self, formatter: &dyn IssueFormatter) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| format!("{}: {}", entry.entity, formatter.format(&entry.issue)))
            .collect()
    }
}

/// Issues a container raises about itself, its conditions and its triggers
fn container_issues(container: &Container) -> Vec<Issue> {
    let mut issues = Vec::new();

    if container.strategy == Strategy::RepeatWhile
        && !container.conditions().iter().any(|slot| slot.info.enabled)
    {
        issues.push(Issue::NoLoopConditions);
    }
    for slot in container.conditions() {
        if slot.info.enabled {
            issues.extend(slot.condition.validate());
        }
    }
    for slot in container.triggers() {
        if slot.info.enabled {
            issues.extend(slot.trigger.validate());
        }
    }
    if let Some(target) = &container.target {
        issues.extend(target.coordinates.issues());
    }

    issues
}

impl SequenceTree {
    /// Validate `id` and its enabled descendants.
    ///
    /// Disabled entities never run, so their subtrees are cleared and not
    /// checked.
    pub fn validate(&self, id: NodeId) -> TreeResult<ValidationReport> {
        let mut report = ValidationReport::default();
        let prefix_len = self.path(id)?.len() - self.node(id)?.name().len();
        self.validate_node(id, prefix_len, &mut report)?;

        if !report.is_valid() {
            debug!(root = %id, issues = report.len(), "Validation found issues");
        }
        Ok(report)
    }

    /// Validate the whole tree
    pub fn validate_all(&self) -> TreeResult<ValidationReport> {
        self.validate(self.root())
    }

    fn validate_node(
        &self,
        id: NodeId,
        prefix_len: usize,
        report: &mut ValidationReport,
    ) -> TreeResult<()> {
        let node = self.node(id)?;
        if !node.info().enabled {
            for node_id in self.descendants(id)? {
                self.node(node_id)?.state().set_issues(Vec::new());
            }
            return Ok(());
        }

        let entity = self.path(id)?[prefix_len..].to_string();
        let mut issues = match node.kind() {
            NodeKind::Item(item) => item.validate(),
            NodeKind::Container(container) => container_issues(container),
        };
        for issue in &issues {
            report.entries.push(ValidationEntry {
                node: id,
                entity: entity.clone(),
                issue: issue.clone(),
            });
        }

        if let Some(container) = node.as_container() {
            let enabled = container.triggers().iter().filter(|slot| slot.info.enabled);
            for slot in enabled {
                let Some(sequence) = &slot.sequence else {
                    continue;
                };
                for entry in sequence.validate(sequence.root())?.entries {
                    issues.push(entry.issue.clone());
                    report.entries.push(ValidationEntry {
                        node: id,
                        entity: format!("{entity} [{}] {}", slot.info.name, entry.entity),
                        issue: entry.issue,
                    });
                }
            }
            node.state().set_issues(issues);

            for child in container.children() {
                self.validate_node(*child, prefix_len, report)?;
            }
        } else {
            node.state().set_issues(issues);
        }
        Ok(())
    }
}
