use super::{Script, ScriptContext, ScriptEngineRegistry, ScriptNodeInfo};
use crate::{
    Browser, EventEmitter, Interface, InterfaceKind, InterfaceSet, NodeBody, NodeClass,
    NodeContext, NodeError, NodeFactory, NodeGraph, NodeType, NodeTypeCache, Scene, ScriptError,
};
use indexmap::IndexMap;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Arc, Weak};
use vrml_field::{FieldType, FieldValue};
use vrml_ids::NodeID;
use vrml_io::MemoryStream;

pub const SCRIPT_CLASS_ID: &str = "Script";

/// Interfaces every Script has, whatever else it declares.
pub fn script_builtin_interfaces() -> InterfaceSet {
    InterfaceSet::from_interfaces([
        Interface::exposed_field(FieldType::MFString, "url"),
        Interface::exposed_field(FieldType::SFNode, "metadata"),
        Interface::field(FieldType::SFBool, "directOutput"),
        Interface::field(FieldType::SFBool, "mustEvaluate"),
    ])
    .expect("built-in Script interface names are distinct")
}

/// A node whose behaviour comes from a script engine. Its fields and
/// events beyond the built-in ones are declared per type.
pub struct ScriptNode {
    interfaces: InterfaceSet,
    url: EventEmitter,
    metadata: EventEmitter,
    direct_output: FieldValue,
    must_evaluate: FieldValue,
    fields: IndexMap<String, FieldValue>,
    event_ins: IndexMap<String, FieldType>,
    event_outs: IndexMap<String, EventEmitter>,
    script: Option<Box<dyn Script>>,
    /// A script being fetched on a scene worker after `url` changed.
    loading: Option<Receiver<Option<Box<dyn Script>>>>,
    events_received: usize,
}

impl ScriptNode {
    pub fn new(interfaces: &InterfaceSet) -> Self {
        let builtins = script_builtin_interfaces();
        let mut node = Self {
            interfaces: interfaces.clone(),
            url: EventEmitter::of_type(FieldType::MFString),
            metadata: EventEmitter::of_type(FieldType::SFNode),
            direct_output: FieldValue::SFBool(false),
            must_evaluate: FieldValue::SFBool(false),
            fields: IndexMap::new(),
            event_ins: IndexMap::new(),
            event_outs: IndexMap::new(),
            script: None,
            loading: None,
            events_received: 0,
        };
        for interface in interfaces.iter().filter(|i| !builtins.contains(i)) {
            let id = interface.id.clone();
            match interface.kind {
                InterfaceKind::Field => {
                    node.fields.insert(id, interface.field_type.default_value());
                }
                InterfaceKind::EventIn => {
                    node.event_ins.insert(id, interface.field_type);
                }
                InterfaceKind::EventOut => {
                    node.event_outs
                        .insert(id, EventEmitter::of_type(interface.field_type));
                }
                InterfaceKind::ExposedField => {}
            }
        }
        node
    }

    pub fn has_script(&self) -> bool {
        self.script.is_some()
    }

    /// True while a script named by a new `url` is still being fetched.
    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    pub fn direct_output(&self) -> bool {
        self.direct_output.as_bool() == Some(true)
    }

    fn unsupported(kind: InterfaceKind, id: &str) -> NodeError {
        NodeError::UnsupportedInterface {
            node_type: SCRIPT_CLASS_ID.to_string(),
            kind,
            id: id.to_string(),
        }
    }

    fn urls(&self) -> Vec<String> {
        self.url
            .value()
            .as_strings()
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }

    fn info(&self, ctx: &NodeContext) -> ScriptNodeInfo {
        ScriptNodeInfo {
            node: ctx.node_id(),
            interfaces: self.interfaces.clone(),
        }
    }

    /// Build the script for the current `url` before returning.
    fn load_script(&mut self, ctx: &NodeContext) {
        self.script = None;
        self.loading = None;
        let Some(browser) = ctx.browser() else {
            return;
        };
        let urls = self.urls();
        if urls.is_empty() {
            return;
        }
        self.script = resolve_script(&self.info(ctx), &urls, &browser, ctx.scene().map(Arc::as_ref));
    }

    /// Build the script for a new `url`. Inline code is compiled at once;
    /// anything that has to be fetched is built on a scene worker and picked
    /// up by a later `events_processed`.
    fn reload_script(&mut self, ctx: &NodeContext) -> bool {
        self.script = None;
        self.loading = None;
        let (Some(browser), Some(scene)) = (ctx.browser(), ctx.scene()) else {
            return false;
        };
        let urls = self.urls();
        if urls.is_empty() {
            return false;
        }
        let info = self.info(ctx);
        if urls.iter().all(|url| is_inline(url, browser.script_engines())) {
            self.script = resolve_script(&info, &urls, &browser, Some(scene.as_ref()));
            return true;
        }

        let (sender, receiver) = mpsc::channel();
        let worker_scene = Arc::clone(scene);
        let spawned = scene.spawn_worker("load-script", move || {
            let script = resolve_script(&info, &urls, &browser, Some(worker_scene.as_ref()));
            if sender.send(script).is_err() {
                log::debug!("script for node {} was replaced while loading", info.node);
            }
        });
        match spawned {
            Ok(()) => self.loading = Some(receiver),
            Err(e) => report(ctx.browser().as_ref(), ctx.node_id(), &ScriptError::Engine(e.to_string())),
        }
        false
    }

    /// Install a script a worker finished building. True if one arrived.
    fn poll_loading(&mut self) -> bool {
        let Some(receiver) = &self.loading else {
            return false;
        };
        match receiver.try_recv() {
            Ok(script) => {
                self.loading = None;
                self.script = script;
                self.script.is_some()
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                self.loading = None;
                false
            }
        }
    }

    /// Run a script hook with access to this node's fields. Failures are
    /// reported, not propagated: a broken script must not stop the cascade.
    fn run(
        &mut self,
        ctx: &mut NodeContext,
        hook: impl FnOnce(&mut dyn Script, &mut ScriptContext<'_>) -> Result<(), ScriptError>,
    ) {
        let Some(script) = self.script.as_mut() else {
            return;
        };
        let direct_output = self.direct_output.as_bool() == Some(true);
        let result = {
            let mut script_ctx = ScriptContext::new(&mut self.fields, &mut self.event_outs, direct_output, ctx);
            hook(script.as_mut(), &mut script_ctx)
        };
        if let Err(e) = result {
            report(ctx.browser().as_ref(), ctx.node_id(), &e);
        }
    }
}

fn is_inline(url: &str, engines: &ScriptEngineRegistry) -> bool {
    url.split_once(':')
        .is_some_and(|(scheme, _)| engines.factory_for_scheme(scheme).is_some())
}

/// Try each URL until an engine accepts one. An inline `scheme:code` URL
/// goes to the engine claiming the scheme; anything else is fetched and
/// handed to the engine claiming its media type.
fn resolve_script(
    info: &ScriptNodeInfo,
    urls: &[String],
    browser: &Browser,
    scene: Option<&Scene>,
) -> Option<Box<dyn Script>> {
    let engines = browser.script_engines();
    for url in urls {
        if let Some((scheme, code)) = url.split_once(':') {
            if let Some(factory) = engines.factory_for_scheme(scheme) {
                let source = Box::new(MemoryStream::new(url.as_str(), "", code.as_bytes().to_vec()));
                match factory.create_script(info, source) {
                    Ok(script) => return Some(script),
                    Err(e) => {
                        browser.write_err(&format!("{url}: {e}"));
                        continue;
                    }
                }
            }
        }

        let Some(scene) = scene else {
            continue;
        };
        let Ok(source) = scene.get_resource(std::slice::from_ref(url)) else {
            continue;
        };
        let media_type = source.media_type().to_string();
        let Some(factory) = engines.factory_for_media_type(&media_type) else {
            browser.write_err(&format!("{url}: no script engine for media type \"{media_type}\""));
            continue;
        };
        match factory.create_script(info, source) {
            Ok(script) => return Some(script),
            Err(e) => browser.write_err(&format!("{url}: {e}")),
        }
    }
    browser.write_err(&ScriptError::NoEngine(urls.to_vec()).to_string());
    None
}

fn report(browser: Option<&Browser>, node: NodeID, err: &ScriptError) {
    let message = format!("script {node}: {err}");
    match browser {
        Some(browser) => browser.write_err(&message),
        None => log::error!("{message}"),
    }
}

impl NodeBody for ScriptNode {
    fn field_value(&self, id: &str) -> Result<&FieldValue, NodeError> {
        match id {
            "url" => Ok(self.url.value()),
            "metadata" => Ok(self.metadata.value()),
            "directOutput" => Ok(&self.direct_output),
            "mustEvaluate" => Ok(&self.must_evaluate),
            _ => self
                .fields
                .get(id)
                .ok_or_else(|| Self::unsupported(InterfaceKind::Field, id)),
        }
    }

    fn field_value_mut(&mut self, id: &str) -> Result<&mut FieldValue, NodeError> {
        match id {
            "url" => Ok(self.url.value_mut()),
            "metadata" => Ok(self.metadata.value_mut()),
            "directOutput" => Ok(&mut self.direct_output),
            "mustEvaluate" => Ok(&mut self.must_evaluate),
            _ => self
                .fields
                .get_mut(id)
                .ok_or_else(|| Self::unsupported(InterfaceKind::Field, id)),
        }
    }

    fn event_in(&self, id: &str) -> Result<(String, FieldType), NodeError> {
        match id {
            "url" | "set_url" => return Ok(("url".to_string(), FieldType::MFString)),
            "metadata" | "set_metadata" => {
                return Ok(("metadata".to_string(), FieldType::SFNode));
            }
            _ => {}
        }
        if let Some(field_type) = self.event_ins.get(id) {
            return Ok((id.to_string(), *field_type));
        }
        let prefixed = format!("set_{id}");
        match self.event_ins.get(&prefixed) {
            Some(field_type) => Ok((prefixed, *field_type)),
            None => Err(Self::unsupported(InterfaceKind::EventIn, id)),
        }
    }

    fn event_out(&self, id: &str) -> Result<(String, FieldType), NodeError> {
        match id {
            "url" | "url_changed" => return Ok(("url".to_string(), FieldType::MFString)),
            "metadata" | "metadata_changed" => {
                return Ok(("metadata".to_string(), FieldType::SFNode));
            }
            _ => {}
        }
        if let Some(emitter) = self.event_outs.get(id) {
            return Ok((id.to_string(), emitter.field_type()));
        }
        let suffixed = format!("{id}_changed");
        match self.event_outs.get(&suffixed) {
            Some(emitter) => Ok((suffixed, emitter.field_type())),
            None => Err(Self::unsupported(InterfaceKind::EventOut, id)),
        }
    }

    fn event_out_ids(&self) -> Vec<String> {
        ["url".to_string(), "metadata".to_string()]
            .into_iter()
            .chain(self.event_outs.keys().cloned())
            .collect()
    }

    fn event_emitter(&self, id: &str) -> Result<&EventEmitter, NodeError> {
        let (canonical, _) = self.event_out(id)?;
        match canonical.as_str() {
            "url" => Ok(&self.url),
            "metadata" => Ok(&self.metadata),
            other => self
                .event_outs
                .get(other)
                .ok_or_else(|| Self::unsupported(InterfaceKind::EventOut, id)),
        }
    }

    fn event_emitter_mut(&mut self, id: &str) -> Result<&mut EventEmitter, NodeError> {
        let (canonical, _) = self.event_out(id)?;
        match canonical.as_str() {
            "url" => Ok(&mut self.url),
            "metadata" => Ok(&mut self.metadata),
            other => self
                .event_outs
                .get_mut(other)
                .ok_or_else(|| Self::unsupported(InterfaceKind::EventOut, id)),
        }
    }

    fn process_event(
        &mut self,
        id: &str,
        value: &FieldValue,
        timestamp: f64,
        ctx: &mut NodeContext,
    ) -> Result<(), NodeError> {
        let (canonical, expected) = self.event_in(id)?;
        if value.field_type() != expected {
            return Err(NodeError::FieldTypeMismatch {
                expected,
                found: value.field_type(),
            });
        }
        match canonical.as_str() {
            "url" => {
                self.url.set(value.clone())?;
                if ctx.scene().is_some() {
                    self.run(ctx, |script, sctx| {
                        script.shutdown(sctx, timestamp);
                        Ok(())
                    });
                    if self.reload_script(ctx) {
                        self.run(ctx, |script, sctx| script.initialize(sctx, timestamp));
                    }
                }
            }
            "metadata" => self.metadata.set(value.clone())?,
            _ => {
                self.events_received += 1;
                self.run(ctx, |script, sctx| {
                    script.process_event(sctx, &canonical, value, timestamp)
                });
            }
        }
        Ok(())
    }

    fn referenced_nodes(&self) -> Vec<NodeID> {
        self.fields
            .values()
            .chain(self.event_outs.values().map(EventEmitter::value))
            .chain(std::iter::once(self.metadata.value()))
            .flat_map(|value| value.node_refs())
            .collect()
    }

    fn initialize(&mut self, ctx: &mut NodeContext, timestamp: f64) -> Result<(), NodeError> {
        self.load_script(ctx);
        self.run(ctx, |script, sctx| script.initialize(sctx, timestamp));
        Ok(())
    }

    fn shutdown(&mut self, ctx: &mut NodeContext, timestamp: f64) {
        self.run(ctx, |script, sctx| {
            script.shutdown(sctx, timestamp);
            Ok(())
        });
        self.script = None;
        self.loading = None;
    }

    fn events_processed(&mut self, ctx: &mut NodeContext, timestamp: f64) {
        if self.poll_loading() {
            self.run(ctx, |script, sctx| script.initialize(sctx, timestamp));
        }
        if self.events_received == 0 {
            return;
        }
        self.events_received = 0;
        self.run(ctx, |script, sctx| script.events_processed(sctx, timestamp));
    }

    fn as_script(&self) -> Option<&ScriptNode> {
        Some(self)
    }
}

struct ScriptBodyFactory;

impl NodeFactory for ScriptBodyFactory {
    fn create_body(&self, node_type: &NodeType) -> Result<Box<dyn NodeBody>, NodeError> {
        Ok(Box::new(ScriptNode::new(node_type.interfaces())))
    }
}

/// Every Script type declares its own fields and events on top of the
/// built-ins. User-declared exposedFields are not allowed.
pub struct ScriptNodeClass {
    graph: Weak<NodeGraph>,
    types: NodeTypeCache,
}

impl ScriptNodeClass {
    pub fn new(graph: &Arc<NodeGraph>) -> Self {
        Self {
            graph: Arc::downgrade(graph),
            types: NodeTypeCache::default(),
        }
    }
}

impl NodeClass for ScriptNodeClass {
    fn id(&self) -> &str {
        SCRIPT_CLASS_ID
    }

    fn interfaces(&self) -> InterfaceSet {
        script_builtin_interfaces()
    }

    fn create_type(&self, type_id: &str, interfaces: &InterfaceSet) -> Result<Arc<NodeType>, NodeError> {
        let builtins = script_builtin_interfaces();
        let mut declared = builtins.clone();
        for interface in interfaces.iter().filter(|i| !builtins.contains(i)) {
            if interface.kind == InterfaceKind::ExposedField {
                return Err(NodeError::UnsupportedInterfaceKind {
                    node_type: type_id.to_string(),
                    kind: interface.kind,
                    id: interface.id.clone(),
                });
            }
            declared.add(interface.clone())?;
        }
        Ok(self.types.get_or_insert_with(type_id, &declared, || {
            NodeType::new(
                SCRIPT_CLASS_ID,
                type_id,
                declared.clone(),
                self.graph.clone(),
                Arc::new(ScriptBodyFactory),
            )
        }))
    }
}
