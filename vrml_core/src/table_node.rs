//! Nodes whose fields are plain struct members, reached through a
//! per-class `FieldDispatchTable`.

use crate::dispatch::Delivery;
use crate::{
    ChildNode, EventEmitter, FieldDispatchTable, GeometryNode, InterfaceError, InterfaceSet,
    LightNode, NavigationInfoNode, NodeBody, NodeClass, NodeContext, NodeError, NodeFactory,
    NodeGraph, NodeType, NodeTypeCache, TimeDependent, ViewpointNode,
};
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use vrml_field::{FieldType, FieldValue};
use vrml_ids::NodeID;

/// A concrete node implementation.
pub trait NodeImpl: Default + Send + 'static {
    const TYPE_ID: &'static str;

    fn build_table(table: &mut FieldDispatchTable<Self>) -> Result<(), InterfaceError>;

    fn initialize(&mut self, _ctx: &mut NodeContext, _timestamp: f64) -> Result<(), NodeError> {
        Ok(())
    }

    fn shutdown(&mut self, _ctx: &mut NodeContext, _timestamp: f64) {}

    /// An exposedField was set by an event.
    fn field_changed(&mut self, _id: &str, _ctx: &mut NodeContext) {}

    /// Nodes this one keeps outside its fields.
    fn owned_nodes(&self) -> Vec<NodeID> {
        Vec::new()
    }

    fn as_child(&self) -> Option<&dyn ChildNode> {
        None
    }
    fn as_child_mut(&mut self) -> Option<&mut dyn ChildNode> {
        None
    }
    fn as_geometry(&self) -> Option<&dyn GeometryNode> {
        None
    }
    fn as_time_dependent(&mut self) -> Option<&mut dyn TimeDependent> {
        None
    }
    fn as_viewpoint(&self) -> Option<&dyn ViewpointNode> {
        None
    }
    fn as_navigation_info(&self) -> Option<&dyn NavigationInfoNode> {
        None
    }
    fn as_light(&self) -> Option<&dyn LightNode> {
        None
    }
}

pub struct TableNode<N: NodeImpl> {
    inner: N,
    table: Arc<FieldDispatchTable<N>>,
}

impl<N: NodeImpl> TableNode<N> {
    pub fn new(table: Arc<FieldDispatchTable<N>>) -> Self {
        Self {
            inner: N::default(),
            table,
        }
    }

    pub fn inner(&self) -> &N {
        &self.inner
    }
}

impl<N: NodeImpl> NodeBody for TableNode<N> {
    fn field_value(&self, id: &str) -> Result<&FieldValue, NodeError> {
        self.table.field_value(&self.inner, id)
    }

    fn field_value_mut(&mut self, id: &str) -> Result<&mut FieldValue, NodeError> {
        self.table.field_value_mut(&mut self.inner, id)
    }

    fn event_in(&self, id: &str) -> Result<(String, FieldType), NodeError> {
        self.table.event_in(id)
    }

    fn event_out(&self, id: &str) -> Result<(String, FieldType), NodeError> {
        self.table.event_out(id)
    }

    fn event_out_ids(&self) -> Vec<String> {
        self.table.emitter_ids().to_vec()
    }

    fn event_emitter(&self, id: &str) -> Result<&EventEmitter, NodeError> {
        self.table.event_emitter(&self.inner, id)
    }

    fn event_emitter_mut(&mut self, id: &str) -> Result<&mut EventEmitter, NodeError> {
        self.table.event_emitter_mut(&mut self.inner, id)
    }

    fn process_event(
        &mut self,
        id: &str,
        value: &FieldValue,
        timestamp: f64,
        ctx: &mut NodeContext,
    ) -> Result<(), NodeError> {
        if let Delivery::Exposed(field) =
            self.table
                .process_event(&mut self.inner, id, value, timestamp, ctx)?
        {
            self.inner.field_changed(&field, ctx);
        }
        Ok(())
    }

    fn pending_event_outs(&self) -> Vec<String> {
        self.table.pending_event_outs(&self.inner)
    }

    fn referenced_nodes(&self) -> Vec<NodeID> {
        let mut ids = self.table.referenced_nodes(&self.inner);
        ids.extend(self.inner.owned_nodes());
        ids
    }

    fn initialize(&mut self, ctx: &mut NodeContext, timestamp: f64) -> Result<(), NodeError> {
        self.inner.initialize(ctx, timestamp)
    }

    fn shutdown(&mut self, ctx: &mut NodeContext, timestamp: f64) {
        self.inner.shutdown(ctx, timestamp);
    }

    fn as_child(&self) -> Option<&dyn ChildNode> {
        self.inner.as_child()
    }
    fn as_child_mut(&mut self) -> Option<&mut dyn ChildNode> {
        self.inner.as_child_mut()
    }
    fn as_geometry(&self) -> Option<&dyn GeometryNode> {
        self.inner.as_geometry()
    }
    fn as_time_dependent(&mut self) -> Option<&mut dyn TimeDependent> {
        self.inner.as_time_dependent()
    }
    fn as_viewpoint(&self) -> Option<&dyn ViewpointNode> {
        self.inner.as_viewpoint()
    }
    fn as_navigation_info(&self) -> Option<&dyn NavigationInfoNode> {
        self.inner.as_navigation_info()
    }
    fn as_light(&self) -> Option<&dyn LightNode> {
        self.inner.as_light()
    }
}

struct TableFactory<N: NodeImpl> {
    table: Arc<FieldDispatchTable<N>>,
}

impl<N: NodeImpl> NodeFactory for TableFactory<N> {
    fn create_body(&self, _node_type: &NodeType) -> Result<Box<dyn NodeBody>, NodeError> {
        Ok(Box::new(TableNode::new(Arc::clone(&self.table))))
    }
}

/// Class for a `NodeImpl`. Types may expose any subset of its interfaces.
pub struct StandardNodeClass<N: NodeImpl> {
    table: Arc<FieldDispatchTable<N>>,
    graph: Weak<NodeGraph>,
    types: NodeTypeCache,
    _node: PhantomData<fn() -> N>,
}

impl<N: NodeImpl> StandardNodeClass<N> {
    pub fn new(graph: &Arc<NodeGraph>) -> Result<Self, NodeError> {
        let mut table = FieldDispatchTable::new(N::TYPE_ID);
        N::build_table(&mut table)?;
        Ok(Self {
            table: Arc::new(table),
            graph: Arc::downgrade(graph),
            types: NodeTypeCache::default(),
            _node: PhantomData,
        })
    }

    /// The type exposing every interface, named after the class.
    pub fn default_type(&self) -> Result<Arc<NodeType>, NodeError> {
        self.create_type(N::TYPE_ID, self.table.interfaces())
    }
}

impl<N: NodeImpl> NodeClass for StandardNodeClass<N> {
    fn id(&self) -> &str {
        N::TYPE_ID
    }

    fn interfaces(&self) -> InterfaceSet {
        self.table.interfaces().clone()
    }

    fn create_type(&self, type_id: &str, interfaces: &InterfaceSet) -> Result<Arc<NodeType>, NodeError> {
        if let Some(missing) = interfaces
            .iter()
            .find(|i| !self.table.interfaces().contains(i))
        {
            return Err(NodeError::UnsupportedInterface {
                node_type: type_id.to_string(),
                kind: missing.kind,
                id: missing.id.clone(),
            });
        }
        Ok(self.types.get_or_insert_with(type_id, interfaces, || {
            let factory: Arc<dyn NodeFactory> = Arc::new(TableFactory {
                table: Arc::clone(&self.table),
            });
            NodeType::new(
                N::TYPE_ID,
                type_id,
                interfaces.clone(),
                self.graph.clone(),
                factory,
            )
        }))
    }
}
