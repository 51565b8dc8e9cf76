use crate::sync::{lock, read, write};
use crate::{
    Browser, Capabilities, ChildNode, DeferredEvent, EventEmitter, GeometryNode, Interface,
    InterfaceKind, LightNode, NavigationInfoNode, NodeError, NodeGraph, NodeType, RenderContext,
    RouteTarget, Scene, ScriptNode, Scope, TimeDependent, Viewer, ViewpointNode,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use vrml_field::{FieldType, FieldValue};
use vrml_ids::NodeID;

/// The type-specific part of a node: its field storage and behaviour.
/// Names passed in are unresolved; implementations apply the
/// `set_`/`_changed` synonym rules.
pub trait NodeBody: Send {
    fn field_value(&self, id: &str) -> Result<&FieldValue, NodeError>;
    fn field_value_mut(&mut self, id: &str) -> Result<&mut FieldValue, NodeError>;

    /// Canonical name and type of an eventIn.
    fn event_in(&self, id: &str) -> Result<(String, FieldType), NodeError>;
    /// Canonical name and type of an eventOut.
    fn event_out(&self, id: &str) -> Result<(String, FieldType), NodeError>;
    /// Canonical names of every eventOut.
    fn event_out_ids(&self) -> Vec<String>;
    fn event_emitter(&self, id: &str) -> Result<&EventEmitter, NodeError>;
    fn event_emitter_mut(&mut self, id: &str) -> Result<&mut EventEmitter, NodeError>;

    fn process_event(
        &mut self,
        id: &str,
        value: &FieldValue,
        timestamp: f64,
        ctx: &mut NodeContext,
    ) -> Result<(), NodeError>;

    fn pending_event_outs(&self) -> Vec<String> {
        self.event_out_ids()
            .into_iter()
            .filter(|id| self.event_emitter(id).is_ok_and(EventEmitter::is_pending))
            .collect()
    }

    fn referenced_nodes(&self) -> Vec<NodeID>;

    fn initialize(&mut self, _ctx: &mut NodeContext, _timestamp: f64) -> Result<(), NodeError> {
        Ok(())
    }

    fn shutdown(&mut self, _ctx: &mut NodeContext, _timestamp: f64) {}

    /// Called once per update after the event cascade settles.
    fn events_processed(&mut self, _ctx: &mut NodeContext, _timestamp: f64) {}

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
    fn as_script(&self) -> Option<&ScriptNode> {
        None
    }
}

/// A change to the node graph asked for from inside a hook. Route changes
/// lock both ends, so they wait until the asking node is released.
#[derive(Clone, Debug, PartialEq)]
pub enum GraphRequest {
    AddRoute {
        from: NodeID,
        event_out: String,
        to: NodeID,
        event_in: String,
    },
    DeleteRoute {
        from: NodeID,
        event_out: String,
        to: NodeID,
        event_in: String,
    },
    CollectGarbage,
}

/// What a node body may reach while one of its hooks runs. Other nodes are
/// never locked from inside a hook; events for them are deferred until the
/// body is released.
pub struct NodeContext {
    node: NodeID,
    scene: Option<Arc<Scene>>,
    deferred: Vec<DeferredEvent>,
    to_initialize: Vec<NodeID>,
    requests: Vec<GraphRequest>,
}

impl NodeContext {
    pub fn new(node: NodeID, scene: Option<Arc<Scene>>) -> Self {
        Self {
            node,
            scene,
            deferred: Vec::new(),
            to_initialize: Vec::new(),
            requests: Vec::new(),
        }
    }

    pub fn node_id(&self) -> NodeID {
        self.node
    }

    pub fn scene(&self) -> Option<&Arc<Scene>> {
        self.scene.as_ref()
    }

    pub fn browser(&self) -> Option<Browser> {
        self.scene.as_ref().and_then(|s| s.browser())
    }

    /// Send `value` to `node`'s eventIn once this hook returns.
    pub fn defer(&mut self, node: NodeID, event_in: impl Into<String>, value: FieldValue) {
        self.deferred.push(DeferredEvent {
            target: RouteTarget::new(node, event_in),
            value,
        });
    }

    /// Initialize `node` in this node's scene once this hook returns.
    /// Ignored while this node itself is not part of a scene.
    pub fn request_initialize(&mut self, node: NodeID) {
        self.to_initialize.push(node);
    }

    /// Change the graph once this hook returns.
    pub fn request(&mut self, request: GraphRequest) {
        self.requests.push(request);
    }

    pub fn deferred(&self) -> &[DeferredEvent] {
        &self.deferred
    }

    pub fn requests(&self) -> &[GraphRequest] {
        &self.requests
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initialized,
    ShutDown,
}

const UNINITIALIZED: u8 = 0;
const INITIALIZED: u8 = 1;
const SHUT_DOWN: u8 = 2;

/// A node in the graph. Shared as `Arc<Node>`; the body sits behind its own
/// lock so events can be delivered from any thread.
pub struct Node {
    id: NodeID,
    node_type: Arc<NodeType>,
    scope: Option<Arc<Scope>>,
    scene: RwLock<Weak<Scene>>,
    lifecycle: AtomicU8,
    modified: AtomicBool,
    graph: Weak<NodeGraph>,
    body: Mutex<Box<dyn NodeBody>>,
}

impl Node {
    pub(crate) fn new(
        id: NodeID,
        node_type: Arc<NodeType>,
        scope: Option<Arc<Scope>>,
        graph: Weak<NodeGraph>,
        body: Box<dyn NodeBody>,
    ) -> Self {
        Self {
            id,
            node_type,
            scope,
            scene: RwLock::new(Weak::new()),
            lifecycle: AtomicU8::new(UNINITIALIZED),
            modified: AtomicBool::new(false),
            graph,
            body: Mutex::new(body),
        }
    }

    pub fn id(&self) -> NodeID {
        self.id
    }

    pub fn node_type(&self) -> &Arc<NodeType> {
        &self.node_type
    }

    pub fn type_id(&self) -> &str {
        self.node_type.id()
    }

    pub fn scope(&self) -> Option<&Arc<Scope>> {
        self.scope.as_ref()
    }

    /// The scene this node was initialized in.
    pub fn scene(&self) -> Option<Arc<Scene>> {
        read(&self.scene).upgrade()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match self.lifecycle.load(Ordering::Acquire) {
            UNINITIALIZED => Lifecycle::Uninitialized,
            INITIALIZED => Lifecycle::Initialized,
            _ => Lifecycle::ShutDown,
        }
    }

    pub fn is_modified(&self) -> bool {
        self.modified.load(Ordering::Acquire)
    }

    pub fn set_modified(&self) {
        self.modified.store(true, Ordering::Release);
    }

    pub(crate) fn clear_modified(&self) {
        self.modified.store(false, Ordering::Release);
    }

    fn declared(&self, kind: InterfaceKind, id: &str) -> Result<&Interface, NodeError> {
        let interfaces = self.node_type.interfaces();
        let found = match kind {
            InterfaceKind::EventIn => interfaces.find_event_in(id),
            InterfaceKind::EventOut => interfaces.find_event_out(id),
            InterfaceKind::ExposedField => interfaces.find_exposed_field(id),
            InterfaceKind::Field => interfaces.find_field(id),
        };
        found.ok_or_else(|| NodeError::UnsupportedInterface {
            node_type: self.node_type.id().to_string(),
            kind,
            id: id.to_string(),
        })
    }

    pub fn field_value(&self, id: &str) -> Result<FieldValue, NodeError> {
        self.declared(InterfaceKind::Field, id)?;
        lock(&self.body).field_value(id).cloned()
    }

    /// Overwrite a field without raising any event.
    pub fn assign_field(&self, id: &str, value: &FieldValue) -> Result<(), NodeError> {
        self.declared(InterfaceKind::Field, id)?;
        lock(&self.body).field_value_mut(id)?.assign(value)?;
        self.set_modified();
        Ok(())
    }

    pub fn event_in_type(&self, id: &str) -> Result<FieldType, NodeError> {
        Ok(self.declared(InterfaceKind::EventIn, id)?.field_type)
    }

    pub fn event_out_type(&self, id: &str) -> Result<FieldType, NodeError> {
        Ok(self.declared(InterfaceKind::EventOut, id)?.field_type)
    }

    pub fn event_out_value(&self, id: &str) -> Result<FieldValue, NodeError> {
        self.declared(InterfaceKind::EventOut, id)?;
        Ok(lock(&self.body).event_emitter(id)?.value().clone())
    }

    /// Write an eventOut from outside the node. It fires on the next flush.
    pub fn set_event_out(&self, id: &str, value: &FieldValue) -> Result<(), NodeError> {
        self.declared(InterfaceKind::EventOut, id)?;
        lock(&self.body).event_emitter_mut(id)?.set(value.clone())?;
        self.set_modified();
        if let Some(graph) = self.graph.upgrade() {
            graph.enqueue(self.id);
        }
        Ok(())
    }

    pub(crate) fn resolve_event_in(&self, id: &str) -> Result<(String, FieldType), NodeError> {
        self.declared(InterfaceKind::EventIn, id)?;
        lock(&self.body).event_in(id)
    }

    pub(crate) fn resolve_event_out(&self, id: &str) -> Result<(String, FieldType), NodeError> {
        self.declared(InterfaceKind::EventOut, id)?;
        lock(&self.body).event_out(id)
    }

    pub(crate) fn add_route_target(&self, event_out: &str, target: RouteTarget) -> Result<bool, NodeError> {
        Ok(lock(&self.body).event_emitter_mut(event_out)?.add_target(target))
    }

    pub(crate) fn remove_route_target(&self, event_out: &str, target: &RouteTarget) -> bool {
        lock(&self.body)
            .event_emitter_mut(event_out)
            .is_ok_and(|emitter| emitter.remove_target(target))
    }

    /// Outgoing routes as `(eventOut, target)` pairs.
    pub fn routes(&self) -> Vec<(String, RouteTarget)> {
        let body = lock(&self.body);
        let mut routes = Vec::new();
        for id in body.event_out_ids() {
            if let Ok(emitter) = body.event_emitter(&id) {
                routes.extend(emitter.targets().iter().map(|t| (id.clone(), t.clone())));
            }
        }
        routes
    }

    pub(crate) fn take_emission(&self, event_out: &str, timestamp: f64) -> Option<(FieldValue, Vec<RouteTarget>)> {
        lock(&self.body)
            .event_emitter_mut(event_out)
            .ok()?
            .take_emission(timestamp)
    }

    pub(crate) fn pending_event_outs(&self) -> Vec<String> {
        lock(&self.body).pending_event_outs()
    }

    pub fn referenced_nodes(&self) -> Vec<NodeID> {
        lock(&self.body).referenced_nodes()
    }

    pub fn capabilities(&self) -> Capabilities {
        let mut body = lock(&self.body);
        Capabilities::of(&mut **body)
    }

    /// Run `f` with the body locked. `f` must not touch other nodes.
    pub fn with_body<R>(&self, f: impl FnOnce(&mut dyn NodeBody) -> R) -> R {
        let mut body = lock(&self.body);
        f(&mut **body)
    }

    fn context(&self) -> NodeContext {
        NodeContext::new(self.id, self.scene())
    }

    pub(crate) fn process_event(&self, id: &str, value: &FieldValue, timestamp: f64) -> Result<(), NodeError> {
        if self.lifecycle() == Lifecycle::ShutDown {
            return Err(NodeError::ShutDown(self.id));
        }
        let mut ctx = self.context();
        let pending = {
            let mut body = lock(&self.body);
            body.process_event(id, value, timestamp, &mut ctx)?;
            !body.pending_event_outs().is_empty()
        };
        self.set_modified();
        self.finish(ctx, pending, timestamp);
        Ok(())
    }

    /// Bind the node to `scene` and run its initialize hook, then those of
    /// the nodes it references. Initializing twice is a no-op.
    pub fn initialize(&self, scene: &Arc<Scene>, timestamp: f64) -> Result<(), NodeError> {
        match self.lifecycle.compare_exchange(
            UNINITIALIZED,
            INITIALIZED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {}
            Err(INITIALIZED) => return Ok(()),
            Err(_) => return Err(NodeError::ShutDown(self.id)),
        }
        *write(&self.scene) = Arc::downgrade(scene);

        let mut ctx = NodeContext::new(self.id, Some(Arc::clone(scene)));
        let (result, capabilities, refs, pending) = {
            let mut body = lock(&self.body);
            let result = body.initialize(&mut ctx, timestamp);
            let capabilities = Capabilities::of(&mut **body);
            (
                result,
                capabilities,
                body.referenced_nodes(),
                !body.pending_event_outs().is_empty(),
            )
        };

        if result.is_ok() {
            if let Some(browser) = scene.browser() {
                browser.register_node(self.id, capabilities);
            }
        }
        if let Some(graph) = self.graph.upgrade() {
            for id in refs {
                if let Some(child) = graph.get(id) {
                    if let Err(e) = child.initialize(scene, timestamp) {
                        log::warn!("could not initialize node {id}: {e}");
                    }
                }
            }
        }
        self.set_modified();
        self.finish(ctx, pending, timestamp);
        result
    }

    /// Run the shutdown hook, leave the browser's registries and shut down
    /// referenced nodes. A shut-down node never comes back.
    pub fn shutdown(&self, timestamp: f64) {
        self.shutdown_inner(timestamp, true);
    }

    /// Shut down this node only; referenced nodes may still be reachable
    /// from elsewhere.
    pub(crate) fn shutdown_alone(&self, timestamp: f64) {
        self.shutdown_inner(timestamp, false);
    }

    fn shutdown_inner(&self, timestamp: f64, recursive: bool) {
        let previous = self.lifecycle.swap(SHUT_DOWN, Ordering::AcqRel);
        if previous != INITIALIZED {
            return;
        }
        let scene = self.scene();
        let mut ctx = NodeContext::new(self.id, scene.clone());
        let refs = {
            let mut body = lock(&self.body);
            body.shutdown(&mut ctx, timestamp);
            body.referenced_nodes()
        };
        if let Some(browser) = scene.and_then(|s| s.browser()) {
            browser.unregister_node(self.id);
        }
        if !recursive {
            return;
        }
        if let Some(graph) = self.graph.upgrade() {
            for id in refs {
                if let Some(child) = graph.get(id) {
                    child.shutdown(timestamp);
                }
            }
        }
    }

    pub(crate) fn update_time(&self, time: f64) {
        let pending = {
            let mut body = lock(&self.body);
            match body.as_time_dependent() {
                Some(dependent) => dependent.update(time),
                None => return,
            }
            !body.pending_event_outs().is_empty()
        };
        if pending {
            self.set_modified();
            if let Some(graph) = self.graph.upgrade() {
                graph.enqueue(self.id);
            }
        }
    }

    pub(crate) fn events_processed(&self, timestamp: f64) {
        if self.lifecycle() != Lifecycle::Initialized {
            return;
        }
        let mut ctx = self.context();
        let pending = {
            let mut body = lock(&self.body);
            body.events_processed(&mut ctx, timestamp);
            !body.pending_event_outs().is_empty()
        };
        self.finish(ctx, pending, timestamp);
    }

    pub fn relocate(&self) {
        if let Some(child) = lock(&self.body).as_child_mut() {
            child.relocate();
        }
    }

    pub(crate) fn render_child(&self, viewer: &mut dyn Viewer, context: &mut RenderContext<'_>) {
        let body = lock(&self.body);
        if let Some(child) = body.as_child() {
            viewer.begin_object(self.id);
            child.render_child(viewer, context);
            viewer.end_object();
        }
        self.modified.store(false, Ordering::Release);
    }

    pub(crate) fn render_geometry(&self, viewer: &mut dyn Viewer) {
        if let Some(geometry) = lock(&self.body).as_geometry() {
            geometry.render_geometry(viewer);
        }
        self.modified.store(false, Ordering::Release);
    }

    /// Work queued by a hook: enqueue pending eventOuts, change routes,
    /// initialize requested nodes, deliver deferred events and collect
    /// garbage, in that order.
    fn finish(&self, mut ctx: NodeContext, pending: bool, timestamp: f64) {
        let Some(graph) = self.graph.upgrade() else {
            return;
        };
        if pending {
            graph.enqueue(self.id);
        }
        let mut collect = false;
        for request in std::mem::take(&mut ctx.requests) {
            let result = match &request {
                GraphRequest::AddRoute { from, event_out, to, event_in } => {
                    graph.add_route(*from, event_out, *to, event_in)
                }
                GraphRequest::DeleteRoute { from, event_out, to, event_in } => {
                    graph.delete_route(*from, event_out, *to, event_in)
                }
                GraphRequest::CollectGarbage => {
                    collect = true;
                    Ok(())
                }
            };
            if let Err(e) = result {
                let message = format!("node {}: {request:?} failed: {e}", self.id);
                match ctx.browser() {
                    Some(browser) => browser.write_err(&message),
                    None => log::warn!("{message}"),
                }
            }
        }
        if let Some(scene) = ctx.scene.clone() {
            for id in std::mem::take(&mut ctx.to_initialize) {
                if let Some(node) = graph.get(id) {
                    if let Err(e) = node.initialize(&scene, timestamp) {
                        log::warn!("could not initialize node {id}: {e}");
                    }
                }
            }
        }
        for event in std::mem::take(&mut ctx.deferred) {
            let RouteTarget { node, event_in } = event.target;
            if let Err(e) = graph.deliver(node, &event_in, &event.value, timestamp) {
                log::warn!("could not deliver {event_in} to node {node}: {e}");
            }
        }
        if collect {
            if let Some(browser) = ctx.browser() {
                browser.collect_garbage();
            }
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("type", &self.node_type.id())
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}
