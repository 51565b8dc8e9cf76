#![allow(dead_code)]

use glam::Mat4;
use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use vrml_core::{
    Browser, BrowserConfig, InitialValues, Light, Node, NodeError, ParsedScene, Scene, SceneError,
    SceneParser, Scope, Script, ScriptContext, ScriptError, ScriptFactory, ScriptNodeInfo, Viewer,
};
use vrml_field::{FieldType, FieldValue, Rotation, Vec3f};
use vrml_ids::NodeID;
use vrml_io::{MemoryFetcher, ResourceStream};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Clonable sink for the browser's out/err streams.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Viewer that writes down what it was asked to draw.
#[derive(Clone, Default)]
pub struct RecordingViewer(Arc<Mutex<Vec<String>>>);

impl RecordingViewer {
    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.0.lock().unwrap().push(call);
    }
}

impl Viewer for RecordingViewer {
    fn begin_frame(&mut self) {
        self.record("begin_frame".into());
    }

    fn end_frame(&mut self) {
        self.record("end_frame".into());
    }

    fn set_viewpoint(&mut self, position: Vec3f, _orientation: Rotation, field_of_view: f32) {
        self.record(format!(
            "viewpoint {} {} {} fov {field_of_view}",
            position.x, position.y, position.z
        ));
    }

    fn insert_light(&mut self, light: &Light) {
        let kind = match light {
            Light::Directional { .. } => "directional",
            Light::Point { .. } => "point",
        };
        self.record(format!("light {kind}"));
    }

    fn push_transform(&mut self, matrix: &Mat4) {
        let t = matrix.w_axis;
        self.record(format!("push {} {} {}", t.x, t.y, t.z));
    }

    fn pop_transform(&mut self) {
        self.record("pop".into());
    }

    fn insert_box(&mut self, size: Vec3f) {
        self.record(format!("box {} {} {}", size.x, size.y, size.z));
    }

    fn insert_sphere(&mut self, radius: f32) {
        self.record(format!("sphere {radius}"));
    }
}

/// A line-oriented stand-in for a VRML parser:
///
/// ```text
/// META title Demo
/// DEF A ScalarInterpolator | key [0 1] | keyValue [0 10]
/// Group | children A
/// ROUTE A.value_changed TO B.set_fraction
/// ```
///
/// Node-valued fields list DEF names. Nodes referenced by another node
/// are not roots.
pub struct LineParser;

pub const TEST_MEDIA_TYPE: &str = "model/vrml";

fn invalid(url: &str, line: usize, message: impl Into<String>) -> SceneError {
    SceneError::InvalidVrml {
        url: url.to_string(),
        line,
        column: 1,
        message: message.into(),
    }
}

fn field_type(browser: &Browser, class_id: &str, field: &str) -> Result<FieldType, NodeError> {
    let interfaces = browser.node_class(class_id)?.interfaces();
    interfaces
        .find_field(field)
        .or_else(|| interfaces.find(field))
        .map(|i| i.field_type)
        .ok_or_else(|| NodeError::UnsupportedInterface {
            node_type: class_id.to_string(),
            kind: vrml_core::InterfaceKind::Field,
            id: field.to_string(),
        })
}

impl SceneParser for LineParser {
    fn parse(
        &self,
        stream: &mut dyn ResourceStream,
        url: &str,
        media_type: &str,
        scene: &Arc<Scene>,
    ) -> Result<ParsedScene, SceneError> {
        if !media_type.starts_with("model/") {
            return Err(SceneError::BadMediaType(media_type.to_string()));
        }
        let browser = scene.browser().ok_or(SceneError::BrowserGone)?;
        let mut text = String::new();
        stream
            .read_to_string(&mut text)
            .map_err(|e| invalid(url, 0, e.to_string()))?;

        let scope = Scope::new(url, None);
        let mut parsed = ParsedScene {
            scope: Some(Arc::clone(&scope)),
            meta: BTreeMap::new(),
            nodes: Vec::new(),
        };
        let mut created: Vec<Arc<Node>> = Vec::new();
        let mut referenced: Vec<NodeID> = Vec::new();

        for (index, line) in text.lines().enumerate() {
            let number = index + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(rest) = line.strip_prefix("META ") {
                let (key, value) = rest.split_once(' ').unwrap_or((rest, ""));
                parsed.meta.insert(key.to_string(), value.to_string());
                continue;
            }
            if let Some(rest) = line.strip_prefix("ROUTE ") {
                let words: Vec<&str> = rest.split_whitespace().collect();
                let [from, "TO", to] = words.as_slice() else {
                    return Err(invalid(url, number, "expected ROUTE a.out TO b.in"));
                };
                let (from_name, event_out) = from
                    .split_once('.')
                    .ok_or_else(|| invalid(url, number, "bad route source"))?;
                let (to_name, event_in) = to
                    .split_once('.')
                    .ok_or_else(|| invalid(url, number, "bad route target"))?;
                let from_id = scope
                    .find_node(from_name)
                    .ok_or_else(|| invalid(url, number, format!("no node {from_name}")))?;
                let to_id = scope
                    .find_node(to_name)
                    .ok_or_else(|| invalid(url, number, format!("no node {to_name}")))?;
                browser
                    .graph()
                    .add_route(from_id, event_out, to_id, event_in)?;
                continue;
            }

            let mut segments = line.split('|').map(str::trim);
            let head: Vec<&str> = segments.next().unwrap_or_default().split_whitespace().collect();
            let (name, class_id) = match head.as_slice() {
                ["DEF", name, class_id] => (Some(*name), *class_id),
                [class_id] => (None, *class_id),
                _ => return Err(invalid(url, number, "expected [DEF name] Type")),
            };

            let mut values = InitialValues::new();
            for segment in segments {
                let (field, text) = segment.split_once(' ').unwrap_or((segment, ""));
                let ty = field_type(&browser, class_id, field)?;
                let value = if ty.is_node() {
                    let ids: Vec<NodeID> = text
                        .trim_matches(|c| c == '[' || c == ']')
                        .split_whitespace()
                        .map(|n| {
                            scope
                                .find_node(n)
                                .ok_or_else(|| invalid(url, number, format!("no node {n}")))
                        })
                        .collect::<Result<_, _>>()?;
                    referenced.extend(&ids);
                    if ty == FieldType::SFNode {
                        FieldValue::SFNode(ids.first().copied())
                    } else {
                        FieldValue::MFNode(ids)
                    }
                } else {
                    FieldValue::parse(ty, text).map_err(|e| invalid(url, number, e.to_string()))?
                };
                values.insert(field.to_string(), value);
            }

            let node = browser.create_node(class_id, Some(Arc::clone(&scope)), &values)?;
            if let Some(name) = name {
                scope.define(name, node.id());
            }
            created.push(node);
        }

        parsed.nodes = created
            .into_iter()
            .filter(|n| !referenced.contains(&n.id()))
            .collect();
        Ok(parsed)
    }
}

pub struct Harness {
    pub browser: Browser,
    pub fetcher: Arc<MemoryFetcher>,
    pub out: SharedBuffer,
    pub err: SharedBuffer,
    pub viewer: RecordingViewer,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(BrowserConfig::default())
    }

    pub fn with_config(mut config: BrowserConfig) -> Self {
        init_logging();
        config.scripts.discover = false;
        let fetcher = Arc::new(MemoryFetcher::new());
        let out = SharedBuffer::default();
        let err = SharedBuffer::default();
        let viewer = RecordingViewer::default();
        let browser = Browser::builder()
            .config(config)
            .parser(Arc::new(LineParser))
            .fetcher(fetcher.clone())
            .viewer(Box::new(viewer.clone()))
            .out(Box::new(out.clone()))
            .err(Box::new(err.clone()))
            .script_factory(&["application/x-test-script"], &["test"], Arc::new(TestScripts))
            .build()
            .unwrap();
        Self {
            browser,
            fetcher,
            out,
            err,
            viewer,
        }
    }

    pub fn add(&self, url: &str, text: &str) {
        self.fetcher
            .insert(url, TEST_MEDIA_TYPE, text.as_bytes().to_vec());
    }

    /// Load `url` as the world and wait for it.
    pub fn load(&self, url: &str) {
        self.browser
            .load_url(vec![url.to_string()], Vec::new())
            .unwrap();
        self.browser.wait_for_loads();
    }

    pub fn node(&self, name: &str) -> Arc<Node> {
        let scene = self.browser.scene().expect("no world loaded");
        let id = scene
            .scope()
            .and_then(|s| s.find_node(name))
            .unwrap_or_else(|| panic!("no node {name}"));
        self.browser.graph().get(id).unwrap()
    }
}

/// Scripts named by the code after `test:`.
///
/// * `double`: every SFFloat event sets `out` to twice its value.
/// * `forward`: sends every SFFloat event straight to the `set_fraction` of
///   the node in field `target`.
/// * `hello`: prints a greeting when initialized.
/// * `link`: `set_value` routes `out` to the `set_fraction` of the node in
///   field `target` and sends the value; any other event removes that route
///   and asks for a garbage collection.
pub struct TestScripts;

impl ScriptFactory for TestScripts {
    fn create_script(
        &self,
        _node: &ScriptNodeInfo,
        mut source: Box<dyn ResourceStream>,
    ) -> Result<Box<dyn Script>, ScriptError> {
        let mut code = String::new();
        source
            .read_to_string(&mut code)
            .map_err(|e| ScriptError::Engine(e.to_string()))?;
        match code.trim() {
            "double" => Ok(Box::new(Double)),
            "forward" => Ok(Box::new(Forward)),
            "hello" => Ok(Box::new(Hello)),
            "link" => Ok(Box::new(Link)),
            other => Err(ScriptError::Engine(format!("unknown test script \"{other}\""))),
        }
    }
}

struct Double;

impl Script for Double {
    fn process_event(
        &mut self,
        ctx: &mut ScriptContext<'_>,
        _event_in: &str,
        value: &FieldValue,
        _timestamp: f64,
    ) -> Result<(), ScriptError> {
        if let Some(v) = value.as_f32() {
            ctx.set_event_out("out", v * 2.0)?;
        }
        Ok(())
    }
}

struct Forward;

impl Script for Forward {
    fn process_event(
        &mut self,
        ctx: &mut ScriptContext<'_>,
        _event_in: &str,
        value: &FieldValue,
        _timestamp: f64,
    ) -> Result<(), ScriptError> {
        let target = ctx.field("target").and_then(FieldValue::as_node).flatten();
        if let (Some(target), Some(v)) = (target, value.as_f32()) {
            ctx.send_direct(target, "set_fraction", v)?;
        }
        Ok(())
    }
}

struct Hello;

impl Script for Hello {
    fn initialize(&mut self, ctx: &mut ScriptContext<'_>, _timestamp: f64) -> Result<(), ScriptError> {
        ctx.print("hello from a script");
        Ok(())
    }

    fn process_event(
        &mut self,
        _ctx: &mut ScriptContext<'_>,
        _event_in: &str,
        _value: &FieldValue,
        _timestamp: f64,
    ) -> Result<(), ScriptError> {
        Ok(())
    }
}

struct Link;

impl Script for Link {
    fn process_event(
        &mut self,
        ctx: &mut ScriptContext<'_>,
        event_in: &str,
        value: &FieldValue,
        _timestamp: f64,
    ) -> Result<(), ScriptError> {
        let Some(target) = ctx.field("target").and_then(FieldValue::as_node).flatten() else {
            return Ok(());
        };
        let me = ctx.node_id();
        if event_in == "set_value" {
            ctx.add_route(me, "out", target, "set_fraction");
            if let Some(v) = value.as_f32() {
                ctx.set_event_out("out", v)?;
            }
        } else {
            ctx.delete_route(me, "out", target, "set_fraction");
            ctx.collect_garbage();
        }
        Ok(())
    }
}
