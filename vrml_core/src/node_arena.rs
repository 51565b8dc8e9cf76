use crate::Node;
use std::sync::Arc;
use vrml_ids::NodeID;

/// Slot storage for live nodes. Index 0 is never handed out, so a nil
/// `NodeID` never resolves; removal bumps the slot's generation, so stale
/// IDs held after collection stop resolving as well.
pub(crate) struct NodeArena {
    nodes: Vec<Option<Arc<Node>>>,
    generations: Vec<u32>,
    free_indices: Vec<usize>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self {
            nodes: vec![None],
            generations: vec![0],
            free_indices: Vec::new(),
        }
    }

    fn slot(&self, id: NodeID) -> Option<usize> {
        let index = id.index() as usize;
        if id.is_nil()
            || index == 0
            || index >= self.nodes.len()
            || self.generations[index] != id.generation()
        {
            return None;
        }
        Some(index)
    }

    /// Allocate a slot and build the node with its final ID.
    /// `None` once the 32-bit index space is exhausted.
    pub fn insert_with(&mut self, make: impl FnOnce(NodeID) -> Node) -> Option<Arc<Node>> {
        let index = match self.free_indices.pop() {
            Some(index) => index,
            None => {
                let index = self.nodes.len();
                if index > u32::MAX as usize {
                    return None;
                }
                self.nodes.push(None);
                self.generations.push(0);
                index
            }
        };
        let id = NodeID::from_parts(index as u32, self.generations[index]);
        let node = Arc::new(make(id));
        self.nodes[index] = Some(Arc::clone(&node));
        Some(node)
    }

    pub fn get(&self, id: NodeID) -> Option<&Arc<Node>> {
        self.slot(id).and_then(|index| self.nodes[index].as_ref())
    }

    pub fn remove(&mut self, id: NodeID) -> Option<Arc<Node>> {
        let index = self.slot(id)?;
        let removed = self.nodes[index].take();
        if removed.is_some() {
            self.generations[index] = self.generations[index].wrapping_add(1);
            self.free_indices.push(index);
        }
        removed
    }

    pub fn contains(&self, id: NodeID) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.nodes.iter().skip(1).flatten()
    }

    pub fn len(&self) -> usize {
        self.nodes.len() - 1 - self.free_indices.len()
    }
}
