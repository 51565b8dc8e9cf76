use crate::sync::lock;
use crate::{InterfaceSet, Node, NodeBody, NodeError, NodeGraph, Scope};
use ahash::AHashMap;
use indexmap::IndexMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use vrml_field::FieldValue;

/// Field values applied to a node right after it is created.
pub type InitialValues = IndexMap<String, FieldValue>;

/// A family of node types sharing one implementation, e.g. every `Script`
/// or every `Transform`.
pub trait NodeClass: Send + Sync {
    fn id(&self) -> &str;

    /// Every interface a type of this class may declare.
    fn interfaces(&self) -> InterfaceSet;

    /// A type named `type_id` exposing `interfaces`. Requests for the same
    /// name and set return the same type.
    fn create_type(&self, type_id: &str, interfaces: &InterfaceSet) -> Result<Arc<NodeType>, NodeError>;
}

/// Builds fresh bodies for a node type.
pub trait NodeFactory: Send + Sync {
    fn create_body(&self, node_type: &NodeType) -> Result<Box<dyn NodeBody>, NodeError>;
}

pub struct NodeType {
    class_id: String,
    id: String,
    interfaces: InterfaceSet,
    graph: Weak<NodeGraph>,
    factory: Arc<dyn NodeFactory>,
}

impl NodeType {
    pub fn new(
        class_id: impl Into<String>,
        id: impl Into<String>,
        interfaces: InterfaceSet,
        graph: Weak<NodeGraph>,
        factory: Arc<dyn NodeFactory>,
    ) -> Self {
        Self {
            class_id: class_id.into(),
            id: id.into(),
            interfaces,
            graph,
            factory,
        }
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn interfaces(&self) -> &InterfaceSet {
        &self.interfaces
    }

    /// Allocate a node in the graph and apply `initial_values` to its
    /// fields. If a value is rejected the node is taken out of the graph
    /// again and the error returned.
    pub fn create_node(
        self: &Arc<Self>,
        scope: Option<Arc<Scope>>,
        initial_values: &InitialValues,
    ) -> Result<Arc<Node>, NodeError> {
        let graph = self.graph.upgrade().ok_or(NodeError::AllocationFailure)?;
        let body = self.factory.create_body(self)?;
        let node = graph.insert(Arc::clone(self), scope, body)?;
        for (id, value) in initial_values {
            if let Err(e) = node.assign_field(id, value) {
                graph.remove(node.id());
                return Err(e);
            }
        }
        log::trace!("created {} node {}", self.id, node.id());
        Ok(node)
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeType")
            .field("class", &self.class_id)
            .field("id", &self.id)
            .field("interfaces", &self.interfaces.len())
            .finish()
    }
}

/// Types already handed out by a class, keyed by name and interface set.
#[derive(Default)]
pub struct NodeTypeCache {
    types: Mutex<AHashMap<(String, InterfaceSet), Arc<NodeType>>>,
}

impl NodeTypeCache {
    pub fn get_or_insert_with(
        &self,
        type_id: &str,
        interfaces: &InterfaceSet,
        make: impl FnOnce() -> NodeType,
    ) -> Arc<NodeType> {
        let mut types = lock(&self.types);
        let key = (type_id.to_string(), interfaces.clone());
        Arc::clone(types.entry(key).or_insert_with(|| Arc::new(make())))
    }

    pub fn len(&self) -> usize {
        lock(&self.types).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
