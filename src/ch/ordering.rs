use crate::types::NodeId;

/// Contraction order: the node contracted at each level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeOrderingProvider {
    order: Vec<NodeId>,
}

impl NodeOrderingProvider {
    pub(crate) fn new(order: Vec<NodeId>) -> Self {
        Self { order }
    }

    pub fn node_for_level(&self, level: u32) -> NodeId {
        self.order[level as usize]
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Nodes from lowest to highest level
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.order.iter().copied()
    }
}
