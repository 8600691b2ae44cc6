//! Duration estimation

use std::time::Duration;

use crate::container::Container;
use crate::tree::{NodeId, NodeKind, SequenceTree, TreeResult};

/// Number of passes a container is expected to make.
///
/// Non-looping containers run once. A looping container runs as many passes
/// as its most restrictive condition allows, or once when no condition can
/// say.
pub fn expected_passes(container: &Container) -> u32 {
    if !container.strategy.is_looping() {
        return 1;
    }
    container
        .conditions()
        .iter()
        .filter(|slot| slot.info.enabled)
        .filter_map(|slot| slot.condition.iteration_hint())
        .min()
        .unwrap_or(1)
}

impl SequenceTree {
    /// Estimated wall time of `id`, excluding trigger sequences.
    ///
    /// Disabled entities contribute nothing.
    pub fn estimated_duration(&self, id: NodeId) -> TreeResult<Duration> {
        let node = self.node(id)?;
        if !node.info().enabled {
            return Ok(Duration::ZERO);
        }

        match node.kind() {
            NodeKind::Item(item) => Ok(item.estimated_duration()),
            NodeKind::Container(container) => {
                let mut pass = Duration::ZERO;
                for child in container.children() {
                    pass = pass.saturating_add(self.estimated_duration(*child)?);
                }
                Ok(pass.saturating_mul(expected_passes(container)))
            }
        }
    }

    /// Estimated wall time of the whole tree
    pub fn total_estimated_duration(&self) -> TreeResult<Duration> {
        self.estimated_duration(self.root())
    }
}
