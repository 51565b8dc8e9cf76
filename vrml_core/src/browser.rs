use crate::sync::{lock, read, write};
use crate::{
    BrowserConfig, BrowserError, Capabilities, InitialValues, Node, NodeClass, NodeError,
    NodeGraph, NullParser, RenderContext, RouteTarget, Scene, SceneError, SceneParser, Scope,
    ScriptEngineRegistry, ScriptNodeClass, SharedScriptFactory, Viewer, WorkerGroup,
};
use ahash::AHashMap;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::{SystemTime, UNIX_EPOCH};
use vrml_field::FieldValue;
use vrml_ids::NodeID;
use vrml_io::{FileFetcher, ResourceFetcher, ResourceStream};

/// Node IDs playing one role, in the order they registered.
#[derive(Default)]
pub struct NodeRegistry {
    ids: RwLock<Vec<NodeID>>,
}

impl NodeRegistry {
    pub fn add(&self, id: NodeID) -> bool {
        let mut ids = write(&self.ids);
        if ids.contains(&id) {
            return false;
        }
        ids.push(id);
        true
    }

    pub fn remove(&self, id: NodeID) -> bool {
        let mut ids = write(&self.ids);
        let before = ids.len();
        ids.retain(|n| *n != id);
        ids.len() != before
    }

    pub fn snapshot(&self) -> Vec<NodeID> {
        read(&self.ids).clone()
    }

    pub fn contains(&self, id: NodeID) -> bool {
        read(&self.ids).contains(&id)
    }

    pub fn len(&self) -> usize {
        read(&self.ids).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrowserEvent {
    Initialized,
    Shutdown,
}

pub trait BrowserListener: Send + Sync {
    fn browser_changed(&self, browser: &Browser, event: BrowserEvent);
}

/// Nodes of which at most one is bound at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bindable {
    Viewpoint,
    NavigationInfo,
}

struct QueuedEvent {
    timestamp: f64,
    target: RouteTarget,
    value: FieldValue,
}

struct Clock {
    time: Option<f64>,
    frame_rate: f64,
}

impl Clock {
    fn tick(&mut self, time: f64) {
        if let Some(previous) = self.time {
            if time > previous {
                self.frame_rate = 1.0 / (time - previous);
            }
        }
        self.time = Some(time);
    }
}

// Fields drop in declaration order: loader threads are joined before the
// scene goes, and engine modules are unloaded last.
pub(crate) struct BrowserInner {
    loader: WorkerGroup,
    scene: RwLock<Option<Arc<Scene>>>,
    graph: Arc<NodeGraph>,
    node_classes: RwLock<AHashMap<String, Arc<dyn NodeClass>>>,
    config: BrowserConfig,
    parser: Arc<dyn SceneParser>,
    fetcher: Arc<dyn ResourceFetcher>,
    viewer: Mutex<Option<Box<dyn Viewer>>>,
    out: Mutex<Box<dyn Write + Send>>,
    err: Mutex<Box<dyn Write + Send>>,
    default_viewpoint: Option<Arc<Node>>,
    default_navigation_info: Option<Arc<Node>>,
    active_viewpoint: RwLock<Option<NodeID>>,
    active_navigation_info: RwLock<Option<NodeID>>,
    viewpoints: NodeRegistry,
    navigation_infos: NodeRegistry,
    scoped_lights: NodeRegistry,
    scripts: NodeRegistry,
    timers: NodeRegistry,
    listeners: RwLock<Vec<Arc<dyn BrowserListener>>>,
    events: Mutex<VecDeque<QueuedEvent>>,
    clock: Mutex<Clock>,
    modified: AtomicBool,
    script_engines: Arc<ScriptEngineRegistry>,
}

/// A browser session: the active world, the node graph it lives in and
/// the update/render loop driving it. Cheap to clone.
#[derive(Clone)]
pub struct Browser {
    inner: Arc<BrowserInner>,
}

pub struct BrowserBuilder {
    config: BrowserConfig,
    parser: Option<Arc<dyn SceneParser>>,
    fetcher: Option<Arc<dyn ResourceFetcher>>,
    viewer: Option<Box<dyn Viewer>>,
    out: Option<Box<dyn Write + Send>>,
    err: Option<Box<dyn Write + Send>>,
    script_factories: Vec<(Vec<String>, Vec<String>, SharedScriptFactory)>,
}

impl BrowserBuilder {
    pub fn config(mut self, config: BrowserConfig) -> Self {
        self.config = config;
        self
    }

    pub fn parser(mut self, parser: Arc<dyn SceneParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn viewer(mut self, viewer: Box<dyn Viewer>) -> Self {
        self.viewer = Some(viewer);
        self
    }

    pub fn out(mut self, out: Box<dyn Write + Send>) -> Self {
        self.out = Some(out);
        self
    }

    pub fn err(mut self, err: Box<dyn Write + Send>) -> Self {
        self.err = Some(err);
        self
    }

    /// Register a script engine built into the application, next to any
    /// discovered from modules.
    pub fn script_factory(mut self, media_types: &[&str], uri_schemes: &[&str], factory: SharedScriptFactory) -> Self {
        self.script_factories.push((
            media_types.iter().map(|m| m.to_string()).collect(),
            uri_schemes.iter().map(|s| s.to_string()).collect(),
            factory,
        ));
        self
    }

    pub fn build(self) -> Result<Browser, BrowserError> {
        let graph = NodeGraph::new();

        let mut node_classes: AHashMap<String, Arc<dyn NodeClass>> = AHashMap::new();
        for class in crate::nodes::standard_classes(&graph)? {
            node_classes.insert(class.id().to_string(), class);
        }
        let script_class: Arc<dyn NodeClass> = Arc::new(ScriptNodeClass::new(&graph));
        node_classes.insert(script_class.id().to_string(), script_class);

        let default_viewpoint = create_default(&node_classes, "Viewpoint")?;
        let default_navigation_info = create_default(&node_classes, "NavigationInfo")?;

        let mut script_engines = if self.config.scripts.discover {
            ScriptEngineRegistry::discover(&self.config.scripts.effective_search_path())
        } else {
            ScriptEngineRegistry::new()
        };
        for (media_types, uri_schemes, factory) in self.script_factories {
            let media_types: Vec<&str> = media_types.iter().map(String::as_str).collect();
            let uri_schemes: Vec<&str> = uri_schemes.iter().map(String::as_str).collect();
            script_engines.register_factory(&media_types, &uri_schemes, factory)?;
        }

        let frame_rate = self.config.browser.frame_rate;
        let inner = BrowserInner {
            loader: WorkerGroup::new(),
            scene: RwLock::new(None),
            graph,
            node_classes: RwLock::new(node_classes),
            config: self.config,
            parser: self.parser.unwrap_or_else(|| Arc::new(NullParser)),
            fetcher: self.fetcher.unwrap_or_else(|| Arc::new(FileFetcher::new())),
            viewer: Mutex::new(self.viewer),
            out: Mutex::new(self.out.unwrap_or_else(|| Box::new(io::stdout()))),
            err: Mutex::new(self.err.unwrap_or_else(|| Box::new(io::stderr()))),
            default_viewpoint: Some(default_viewpoint),
            default_navigation_info: Some(default_navigation_info),
            active_viewpoint: RwLock::new(None),
            active_navigation_info: RwLock::new(None),
            viewpoints: NodeRegistry::default(),
            navigation_infos: NodeRegistry::default(),
            scoped_lights: NodeRegistry::default(),
            scripts: NodeRegistry::default(),
            timers: NodeRegistry::default(),
            listeners: RwLock::new(Vec::new()),
            events: Mutex::new(VecDeque::new()),
            clock: Mutex::new(Clock {
                time: None,
                frame_rate,
            }),
            modified: AtomicBool::new(false),
            script_engines: Arc::new(script_engines),
        };
        log::debug!(
            "browser \"{}\" ready with {} script engine modules",
            inner.config.browser.name,
            inner.script_engines.module_count()
        );
        Ok(Browser {
            inner: Arc::new(inner),
        })
    }
}

fn create_default(classes: &AHashMap<String, Arc<dyn NodeClass>>, class_id: &str) -> Result<Arc<Node>, NodeError> {
    let class = classes
        .get(class_id)
        .ok_or_else(|| NodeError::NoSuchNodeClass(class_id.to_string()))?;
    class
        .create_type(class_id, &class.interfaces())?
        .create_node(None, &InitialValues::new())
}

impl Browser {
    pub fn builder() -> BrowserBuilder {
        BrowserBuilder {
            config: BrowserConfig::default(),
            parser: None,
            fetcher: None,
            viewer: None,
            out: None,
            err: None,
            script_factories: Vec::new(),
        }
    }

    pub(crate) fn from_inner(inner: Arc<BrowserInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<BrowserInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn name(&self) -> &str {
        &self.inner.config.browser.name
    }

    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.inner.config
    }

    pub fn graph(&self) -> &Arc<NodeGraph> {
        &self.inner.graph
    }

    pub fn fetcher(&self) -> &Arc<dyn ResourceFetcher> {
        &self.inner.fetcher
    }

    pub fn parser(&self) -> &Arc<dyn SceneParser> {
        &self.inner.parser
    }

    pub fn script_engines(&self) -> &Arc<ScriptEngineRegistry> {
        &self.inner.script_engines
    }

    // Node classes

    /// Install a class, replacing any with the same ID.
    pub fn add_node_class(&self, class: Arc<dyn NodeClass>) {
        log::debug!("node class {} added", class.id());
        write(&self.inner.node_classes).insert(class.id().to_string(), class);
    }

    pub fn node_class(&self, id: &str) -> Result<Arc<dyn NodeClass>, NodeError> {
        read(&self.inner.node_classes)
            .get(id)
            .cloned()
            .ok_or_else(|| NodeError::NoSuchNodeClass(id.to_string()))
    }

    pub fn node_class_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = read(&self.inner.node_classes).keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Create an uninitialized node of the class's full type.
    pub fn create_node(
        &self,
        class_id: &str,
        scope: Option<Arc<Scope>>,
        initial_values: &InitialValues,
    ) -> Result<Arc<Node>, NodeError> {
        let class = self.node_class(class_id)?;
        class
            .create_type(class_id, &class.interfaces())?
            .create_node(scope, initial_values)
    }

    // World

    pub fn scene(&self) -> Option<Arc<Scene>> {
        read(&self.inner.scene).clone()
    }

    /// A fresh root scene, not yet the active world.
    pub fn new_scene(&self) -> Arc<Scene> {
        Scene::new(self, None)
    }

    pub fn world_url(&self) -> String {
        self.scene().map(|s| s.url()).unwrap_or_default()
    }

    pub fn root_nodes(&self) -> Vec<Arc<Node>> {
        self.scene().map(|s| s.nodes()).unwrap_or_default()
    }

    /// Fetch and parse the first reachable of `urls` on a worker thread and
    /// make it the world. The current world keeps running until then; a
    /// failed load leaves it in place and reports on the error sink.
    pub fn load_url(&self, urls: Vec<String>, parameters: Vec<String>) -> Result<(), SceneError> {
        if !parameters.is_empty() {
            log::debug!("ignoring load parameters {parameters:?}");
        }
        let browser = self.clone();
        self.inner
            .loader
            .spawn("load-url", move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    let scene = browser.new_scene();
                    let mut stream = scene.get_resource(&urls)?;
                    scene.load(&mut *stream)?;
                    Ok::<_, SceneError>(scene)
                }));
                match outcome {
                    Ok(Ok(scene)) => browser.set_world(scene),
                    Ok(Err(e)) => browser.write_err(&e.to_string()),
                    Err(_) => browser.write_err(&format!("{}: loader panicked", urls.join(" "))),
                }
            })
            .map_err(|e| SceneError::Worker(e.to_string()))
    }

    /// Replace the active world with `scene`. The old world is shut down
    /// before the new one is initialized.
    pub fn set_world(&self, scene: Arc<Scene>) {
        let timestamp = self.current_time();
        let old = write(&self.inner.scene).replace(Arc::clone(&scene));
        if let Some(old) = old {
            self.notify(BrowserEvent::Shutdown);
            old.shutdown(timestamp);
        }
        *write(&self.inner.active_viewpoint) = None;
        *write(&self.inner.active_navigation_info) = None;

        log::info!("world is now {}", scene.url());
        if let Err(e) = scene.initialize(timestamp) {
            self.write_err(&format!("{}: {e}", scene.url()));
        }

        if let Some(first) = self.inner.viewpoints.snapshot().first() {
            self.bind(*first, timestamp);
        }
        if let Some(first) = self.inner.navigation_infos.snapshot().first() {
            self.bind(*first, timestamp);
        }
        self.inner.graph.flush_pending(timestamp);
        self.set_modified();
        self.collect_garbage();
        self.notify(BrowserEvent::Initialized);
    }

    /// Make `nodes` the world, keeping the current world's URL.
    pub fn replace_world(&self, nodes: Vec<Arc<Node>>) -> Result<(), SceneError> {
        let scene = self.new_scene();
        scene.set_url(self.world_url());
        scene.set_nodes(nodes)?;
        self.set_world(scene);
        Ok(())
    }

    /// Parse `stream` as a fragment of the active world. The nodes come back
    /// uninitialized; they join the world once something references them.
    pub fn create_vrml_from_stream(&self, mut stream: Box<dyn ResourceStream>) -> Result<Vec<Arc<Node>>, SceneError> {
        let scene = self.scene().unwrap_or_else(|| self.new_scene());
        scene.parse_nodes(&mut *stream)
    }

    /// Load `urls` in the background and send the nodes to `event` of
    /// `node`. See `Scene::create_vrml_from_url`.
    pub fn create_vrml_from_url(&self, urls: Vec<String>, node: NodeID, event: &str) -> Result<(), SceneError> {
        let scene = self.scene().unwrap_or_else(|| self.new_scene());
        scene.create_vrml_from_url(urls, node, event)
    }

    /// Block until pending world loads, and the active world's own
    /// workers, have finished.
    pub fn wait_for_loads(&self) {
        self.inner.loader.join_all();
        if let Some(scene) = self.scene() {
            scene.wait_for_workers();
        }
    }

    // Update and render

    /// Advance the world to `time`: drive time-dependent nodes, deliver due
    /// queued events, propagate, then let scripts see the batch. Returns
    /// whether anything visible changed.
    pub fn update(&self, time: f64) -> bool {
        lock(&self.inner.clock).tick(time);
        let graph = &self.inner.graph;

        for id in self.inner.timers.snapshot() {
            if let Some(node) = graph.get(id) {
                node.update_time(time);
            }
        }
        graph.flush_pending(time);

        self.deliver_queued(time, time);
        graph.flush_pending(time);

        for id in self.inner.scripts.snapshot() {
            if let Some(node) = graph.get(id) {
                node.events_processed(time);
            }
        }
        graph.flush_pending(time);

        self.is_modified()
    }

    /// Draw the world into the viewer, if one is attached.
    pub fn render(&self) {
        let mut slot = lock(&self.inner.viewer);
        let Some(viewer) = slot.as_mut() else {
            return;
        };
        let viewer: &mut dyn Viewer = &mut **viewer;
        viewer.begin_frame();

        if let Some(node) = self.bound_or_default(Bindable::Viewpoint) {
            let view = node.with_body(|body| {
                body.as_viewpoint()
                    .map(|v| (v.position(), v.orientation(), v.field_of_view()))
            });
            if let Some((position, orientation, field_of_view)) = view {
                viewer.set_viewpoint(position, orientation, field_of_view);
            }
        }
        if let Some(node) = self.bound_or_default(Bindable::NavigationInfo) {
            let navigation = node.with_body(|body| {
                body.as_navigation_info()
                    .map(|n| (n.headlight(), n.speed(), n.avatar_size().to_vec()))
            });
            if let Some((headlight, speed, avatar_size)) = navigation {
                viewer.set_navigation(headlight, speed, &avatar_size);
            }
        }
        for id in self.inner.scoped_lights.snapshot() {
            let light = self
                .inner
                .graph
                .get(id)
                .and_then(|n| n.with_body(|body| body.as_light().and_then(|l| l.light())));
            if let Some(light) = light {
                viewer.insert_light(&light);
            }
        }

        if let Some(scene) = self.scene() {
            let mut context = RenderContext::new(&self.inner.graph);
            scene.render(viewer, &mut context);
        }
        viewer.end_frame();
        self.inner.graph.clear_modified();
        self.inner.modified.store(false, Ordering::Release);
    }

    pub fn set_viewer(&self, viewer: Option<Box<dyn Viewer>>) -> Option<Box<dyn Viewer>> {
        std::mem::replace(&mut *lock(&self.inner.viewer), viewer)
    }

    fn bound_or_default(&self, kind: Bindable) -> Option<Arc<Node>> {
        let default = match kind {
            Bindable::Viewpoint => &self.inner.default_viewpoint,
            Bindable::NavigationInfo => &self.inner.default_navigation_info,
        };
        self.bound(kind)
            .and_then(|id| self.inner.graph.get(id))
            .or_else(|| default.clone())
    }

    // Event queue

    /// Queue `value` for `node`'s eventIn, to be delivered by the first
    /// `update` at or after `timestamp`. A full queue drops its oldest
    /// event.
    pub fn queue_event(&self, timestamp: f64, value: FieldValue, node: NodeID, event_in: &str) {
        let max = self.inner.config.browser.max_queued_events.max(1);
        let mut events = lock(&self.inner.events);
        while events.len() >= max {
            if let Some(dropped) = events.pop_front() {
                log::warn!(
                    "event queue full; dropping {} for node {}",
                    dropped.target.event_in,
                    dropped.target.node
                );
            }
        }
        events.push_back(QueuedEvent {
            timestamp,
            target: RouteTarget::new(node, event_in),
            value,
        });
    }

    pub fn queued_events(&self) -> usize {
        lock(&self.inner.events).len()
    }

    pub fn events_pending(&self) -> bool {
        self.queued_events() > 0 || self.inner.graph.has_pending()
    }

    /// Deliver every queued event now, due or not, and propagate.
    pub fn flush_events(&self) {
        let now = self.current_time();
        self.deliver_queued(f64::INFINITY, now);
        self.inner.graph.flush_pending(now);
    }

    fn deliver_queued(&self, due: f64, timestamp: f64) {
        let ready: Vec<QueuedEvent> = {
            let mut events = lock(&self.inner.events);
            let (ready, waiting): (Vec<_>, Vec<_>) = events.drain(..).partition(|e| e.timestamp <= due);
            events.extend(waiting);
            ready
        };
        for event in ready {
            let RouteTarget { node, event_in } = event.target;
            if let Err(e) = self.inner.graph.deliver(node, &event_in, &event.value, timestamp) {
                self.write_err(&format!("could not deliver {event_in} to node {node}: {e}"));
            }
        }
    }

    // Registries

    pub(crate) fn register_node(&self, id: NodeID, capabilities: Capabilities) {
        if capabilities.viewpoint {
            self.inner.viewpoints.add(id);
        }
        if capabilities.navigation_info {
            self.inner.navigation_infos.add(id);
        }
        if capabilities.scoped_light {
            self.inner.scoped_lights.add(id);
        }
        if capabilities.script {
            self.inner.scripts.add(id);
        }
        if capabilities.time_dependent {
            self.inner.timers.add(id);
        }
    }

    pub(crate) fn unregister_node(&self, id: NodeID) {
        self.inner.viewpoints.remove(id);
        self.inner.navigation_infos.remove(id);
        self.inner.scoped_lights.remove(id);
        self.inner.scripts.remove(id);
        self.inner.timers.remove(id);
        for kind in [Bindable::Viewpoint, Bindable::NavigationInfo] {
            let mut slot = write(self.bound_slot(kind));
            if *slot == Some(id) {
                *slot = None;
            }
        }
    }

    pub fn viewpoints(&self) -> &NodeRegistry {
        &self.inner.viewpoints
    }

    pub fn navigation_infos(&self) -> &NodeRegistry {
        &self.inner.navigation_infos
    }

    pub fn scoped_lights(&self) -> &NodeRegistry {
        &self.inner.scoped_lights
    }

    pub fn scripts(&self) -> &NodeRegistry {
        &self.inner.scripts
    }

    pub fn timers(&self) -> &NodeRegistry {
        &self.inner.timers
    }

    // Bindable nodes

    fn bound_slot(&self, kind: Bindable) -> &RwLock<Option<NodeID>> {
        match kind {
            Bindable::Viewpoint => &self.inner.active_viewpoint,
            Bindable::NavigationInfo => &self.inner.active_navigation_info,
        }
    }

    pub fn bound(&self, kind: Bindable) -> Option<NodeID> {
        *read(self.bound_slot(kind))
    }

    /// Install `id` as the bound node of `kind`, returning the previous one.
    pub(crate) fn swap_bound(&self, kind: Bindable, id: Option<NodeID>) -> Option<NodeID> {
        std::mem::replace(&mut *write(self.bound_slot(kind)), id)
    }

    pub fn active_viewpoint(&self) -> Option<NodeID> {
        self.bound(Bindable::Viewpoint)
    }

    pub fn active_navigation_info(&self) -> Option<NodeID> {
        self.bound(Bindable::NavigationInfo)
    }

    pub fn default_viewpoint(&self) -> Option<&Arc<Node>> {
        self.inner.default_viewpoint.as_ref()
    }

    pub fn default_navigation_info(&self) -> Option<&Arc<Node>> {
        self.inner.default_navigation_info.as_ref()
    }

    /// Bind a viewpoint by sending it `set_bind TRUE`.
    pub fn bind_viewpoint(&self, id: NodeID) -> Result<(), NodeError> {
        let node = self.inner.graph.get(id).ok_or(NodeError::NoSuchNode(id))?;
        if !node.capabilities().viewpoint {
            return Err(NodeError::UnsupportedInterface {
                node_type: node.type_id().to_string(),
                kind: crate::InterfaceKind::EventIn,
                id: "set_bind".to_string(),
            });
        }
        let timestamp = self.current_time();
        self.inner
            .graph
            .deliver(id, "set_bind", &FieldValue::SFBool(true), timestamp)?;
        self.inner.graph.flush_pending(timestamp);
        Ok(())
    }

    fn bind(&self, id: NodeID, timestamp: f64) {
        if let Err(e) = self
            .inner
            .graph
            .deliver(id, "set_bind", &FieldValue::SFBool(true), timestamp)
        {
            log::warn!("could not bind node {id}: {e}");
        }
    }

    // Listeners

    pub fn add_listener(&self, listener: Arc<dyn BrowserListener>) -> bool {
        let mut listeners = write(&self.inner.listeners);
        if listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    pub fn remove_listener(&self, listener: &Arc<dyn BrowserListener>) -> bool {
        let mut listeners = write(&self.inner.listeners);
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    fn notify(&self, event: BrowserEvent) {
        let listeners = read(&self.inner.listeners).clone();
        for listener in listeners {
            listener.browser_changed(self, event);
        }
    }

    // Time

    /// Time of the last update, or the wall clock before the first one.
    pub fn current_time(&self) -> f64 {
        lock(&self.inner.clock).time.unwrap_or_else(Self::now)
    }

    pub fn frame_rate(&self) -> f64 {
        lock(&self.inner.clock).frame_rate
    }

    /// Seconds since the Unix epoch.
    pub fn now() -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default()
    }

    // Text sinks

    pub fn write_out(&self, text: &str) {
        let mut out = lock(&self.inner.out);
        if let Err(e) = writeln!(out, "{text}").and_then(|()| out.flush()) {
            log::error!("could not write to browser output: {e}");
        }
    }

    pub fn write_err(&self, text: &str) {
        log::warn!("{text}");
        let mut err = lock(&self.inner.err);
        if let Err(e) = writeln!(err, "{text}").and_then(|()| err.flush()) {
            log::error!("could not write to browser error output: {e}");
        }
    }

    pub fn description(&self, text: &str) {
        self.write_out(text);
    }

    // Housekeeping

    pub fn is_modified(&self) -> bool {
        self.inner.modified.load(Ordering::Acquire) || self.inner.graph.any_modified()
    }

    pub fn set_modified(&self) {
        self.inner.modified.store(true, Ordering::Release);
    }

    /// Drop nodes nothing live can reach: not the world, the registries,
    /// the bound nodes or the defaults.
    pub fn collect_garbage(&self) -> Vec<NodeID> {
        let mut roots: Vec<NodeID> = self.root_nodes().iter().map(|n| n.id()).collect();
        for registry in [
            &self.inner.viewpoints,
            &self.inner.navigation_infos,
            &self.inner.scoped_lights,
            &self.inner.scripts,
            &self.inner.timers,
        ] {
            roots.extend(registry.snapshot());
        }
        roots.extend(self.active_viewpoint());
        roots.extend(self.active_navigation_info());
        roots.extend(self.inner.default_viewpoint.as_ref().map(|n| n.id()));
        roots.extend(self.inner.default_navigation_info.as_ref().map(|n| n.id()));
        self.inner.graph.collect_garbage(roots, self.current_time())
    }
}
