use crate::node_arena::NodeArena;
use crate::sync::{lock, read, write};
use crate::{Lifecycle, Node, NodeBody, NodeError, NodeType, RouteTarget, Scope};
use ahash::AHashSet;
use indexmap::IndexSet;
use std::sync::{Arc, Mutex, RwLock};
use vrml_field::FieldValue;
use vrml_ids::NodeID;

/// Owns every node of a browser and moves events along routes.
pub struct NodeGraph {
    arena: RwLock<NodeArena>,
    /// Nodes with eventOuts waiting to fire, in the order they were written.
    pending: Mutex<IndexSet<NodeID, ahash::RandomState>>,
}

impl NodeGraph {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            arena: RwLock::new(NodeArena::new()),
            pending: Mutex::new(IndexSet::default()),
        })
    }

    pub(crate) fn insert(
        self: &Arc<Self>,
        node_type: Arc<NodeType>,
        scope: Option<Arc<Scope>>,
        body: Box<dyn NodeBody>,
    ) -> Result<Arc<Node>, NodeError> {
        let graph = Arc::downgrade(self);
        write(&self.arena)
            .insert_with(|id| Node::new(id, node_type, scope, graph, body))
            .ok_or(NodeError::AllocationFailure)
    }

    pub fn get(&self, id: NodeID) -> Option<Arc<Node>> {
        read(&self.arena).get(id).cloned()
    }

    pub fn contains(&self, id: NodeID) -> bool {
        read(&self.arena).contains(id)
    }

    pub fn len(&self) -> usize {
        read(&self.arena).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn node_ids(&self) -> Vec<NodeID> {
        read(&self.arena).iter().map(|n| n.id()).collect()
    }

    /// Drop a node from the graph. Its ID stops resolving.
    pub fn remove(&self, id: NodeID) -> Option<Arc<Node>> {
        lock(&self.pending).shift_remove(&id);
        write(&self.arena).remove(id)
    }

    fn node(&self, id: NodeID) -> Result<Arc<Node>, NodeError> {
        self.get(id).ok_or(NodeError::NoSuchNode(id))
    }

    /// Connect `from.event_out` to `to.event_in`. Both ends may be named by
    /// any synonym. Adding an existing route is a no-op.
    pub fn add_route(&self, from: NodeID, event_out: &str, to: NodeID, event_in: &str) -> Result<(), NodeError> {
        let source = self.node(from)?;
        let target = self.node(to)?;
        let (out_id, out_type) = source.resolve_event_out(event_out)?;
        let (in_id, in_type) = target.resolve_event_in(event_in)?;
        if out_type != in_type {
            return Err(NodeError::FieldTypeMismatch {
                expected: in_type,
                found: out_type,
            });
        }
        if target.lifecycle() == Lifecycle::ShutDown {
            return Err(NodeError::ShutDown(to));
        }
        if source.add_route_target(&out_id, RouteTarget::new(to, in_id.as_str()))? {
            log::debug!("ROUTE {from}.{out_id} TO {to}.{in_id}");
        }
        Ok(())
    }

    /// Remove a route. Both ends must resolve; removing a route that was
    /// never added between them does nothing.
    pub fn delete_route(&self, from: NodeID, event_out: &str, to: NodeID, event_in: &str) -> Result<(), NodeError> {
        let source = self.node(from)?;
        let target = self.node(to)?;
        let (out_id, _) = source.resolve_event_out(event_out)?;
        let (in_id, _) = target.resolve_event_in(event_in)?;
        if source.remove_route_target(&out_id, &RouteTarget::new(to, in_id.as_str())) {
            log::debug!("deleted ROUTE {from}.{out_id} TO {to}.{in_id}");
        }
        Ok(())
    }

    pub(crate) fn enqueue(&self, id: NodeID) {
        lock(&self.pending).insert(id);
    }

    pub fn has_pending(&self) -> bool {
        !lock(&self.pending).is_empty()
    }

    /// Hand `value` to one eventIn. Nodes that were shut down are skipped.
    pub fn deliver(&self, to: NodeID, event_in: &str, value: &FieldValue, timestamp: f64) -> Result<(), NodeError> {
        let node = self.node(to)?;
        if node.lifecycle() == Lifecycle::ShutDown {
            log::debug!("dropping {event_in} for shut-down node {to}");
            return Ok(());
        }
        node.process_event(event_in, value, timestamp)
    }

    /// Fire one eventOut of `from` along its routes, if it has not already
    /// fired at `timestamp`.
    pub fn emit_event(&self, from: NodeID, event_out: &str, timestamp: f64) -> Result<(), NodeError> {
        let source = self.node(from)?;
        let (out_id, _) = source.resolve_event_out(event_out)?;
        let Some((value, targets)) = source.take_emission(&out_id, timestamp) else {
            return Ok(());
        };
        for target in targets {
            if let Err(e) = self.deliver(target.node, &target.event_in, &value, timestamp) {
                log::warn!(
                    "could not deliver {from}.{out_id} to {}.{}: {e}",
                    target.node,
                    target.event_in
                );
            }
        }
        Ok(())
    }

    /// Fire pending eventOuts until nothing is left. Every delivery may
    /// make more nodes pending; each eventOut fires at most once per
    /// timestamp, so the cascade ends even on cyclic routes.
    pub fn flush_pending(&self, timestamp: f64) {
        loop {
            let next = lock(&self.pending).shift_remove_index(0);
            let Some(id) = next else {
                break;
            };
            let Some(node) = self.get(id) else {
                continue;
            };
            for event_out in node.pending_event_outs() {
                if let Err(e) = self.emit_event(id, &event_out, timestamp) {
                    log::warn!("could not emit {id}.{event_out}: {e}");
                }
            }
        }
    }

    pub fn any_modified(&self) -> bool {
        read(&self.arena).iter().any(|n| n.is_modified())
    }

    pub(crate) fn clear_modified(&self) {
        for node in read(&self.arena).iter() {
            node.clear_modified();
        }
    }

    /// Drop every node not reachable from `roots` through node-valued
    /// fields. Uninitialized nodes still held outside the graph count as
    /// roots, since they may be on their way into a scene; an uninitialized
    /// node nobody else holds is garbage. Initialized ones are shut down
    /// first. Returns the IDs removed.
    pub fn collect_garbage(&self, roots: impl IntoIterator<Item = NodeID>, timestamp: f64) -> Vec<NodeID> {
        let mut stack: Vec<NodeID> = roots.into_iter().collect();
        stack.extend(
            read(&self.arena)
                .iter()
                .filter(|n| n.lifecycle() == Lifecycle::Uninitialized && Arc::strong_count(n) > 1)
                .map(|n| n.id()),
        );
        let mut marked = AHashSet::new();
        while let Some(id) = stack.pop() {
            if !marked.insert(id) {
                continue;
            }
            if let Some(node) = self.get(id) {
                stack.extend(node.referenced_nodes());
            }
        }

        let garbage: Vec<NodeID> = read(&self.arena)
            .iter()
            .filter(|n| !marked.contains(&n.id()))
            .map(|n| n.id())
            .collect();
        for id in &garbage {
            if let Some(node) = self.get(*id).filter(|n| n.lifecycle() == Lifecycle::Initialized) {
                node.shutdown_alone(timestamp);
            }
        }

        let mut removed = Vec::with_capacity(garbage.len());
        {
            let mut arena = write(&self.arena);
            for id in garbage {
                // Picked up by someone since the mark.
                let claimed = arena.get(id).is_some_and(|n| {
                    n.lifecycle() == Lifecycle::Uninitialized && Arc::strong_count(n) > 1
                });
                if !claimed && arena.remove(id).is_some() {
                    removed.push(id);
                }
            }
        }
        if !removed.is_empty() {
            let mut pending = lock(&self.pending);
            for id in &removed {
                pending.shift_remove(id);
            }
            log::debug!("collected {} unreachable nodes", removed.len());
        }
        removed
    }
}
