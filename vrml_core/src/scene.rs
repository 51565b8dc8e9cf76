use crate::browser::BrowserInner;
use crate::sync::{lock, read, write};
use crate::{Browser, Lifecycle, Node, NodeError, RenderContext, SceneError, Scope, Viewer, WorkerGroup};
use std::collections::BTreeMap;
use std::io::{self, Read};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, RwLock, Weak};
use vrml_field::{FieldType, FieldValue};
use vrml_ids::NodeID;
use vrml_io::{uri, ResourceError, ResourceStream, StreamListener, Url};

type LoadedHook = Box<dyn Fn(&Scene) + Send + Sync>;

/// One loaded world or world fragment: its root nodes, metadata and the
/// URL relative references inside it resolve against.
pub struct Scene {
    browser: Weak<BrowserInner>,
    parent: Option<Arc<Scene>>,
    url: RwLock<String>,
    nodes: RwLock<Vec<Arc<Node>>>,
    meta: RwLock<BTreeMap<String, String>>,
    scope: RwLock<Option<Arc<Scope>>>,
    loaded_hooks: Mutex<Vec<LoadedHook>>,
    workers: WorkerGroup,
}

impl Scene {
    pub fn new(browser: &Browser, parent: Option<Arc<Scene>>) -> Arc<Self> {
        Arc::new(Self {
            browser: browser.downgrade(),
            parent,
            url: RwLock::new(String::new()),
            nodes: RwLock::new(Vec::new()),
            meta: RwLock::new(BTreeMap::new()),
            scope: RwLock::new(None),
            loaded_hooks: Mutex::new(Vec::new()),
            workers: WorkerGroup::new(),
        })
    }

    /// A scene nested in this one, e.g. for an inlined world.
    pub fn new_child(self: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            browser: self.browser.clone(),
            parent: Some(Arc::clone(self)),
            url: RwLock::new(String::new()),
            nodes: RwLock::new(Vec::new()),
            meta: RwLock::new(BTreeMap::new()),
            scope: RwLock::new(None),
            loaded_hooks: Mutex::new(Vec::new()),
            workers: WorkerGroup::new(),
        })
    }

    pub fn browser(&self) -> Option<Browser> {
        self.browser.upgrade().map(Browser::from_inner)
    }

    pub fn parent(&self) -> Option<&Arc<Scene>> {
        self.parent.as_ref()
    }

    /// The scene's URL. A relative URL is resolved against the parent's.
    pub fn url(&self) -> String {
        let url = read(&self.url).clone();
        match &self.parent {
            Some(parent) if !url.is_empty() && uri::is_relative(&url) => {
                let base = parent.url();
                uri::resolve(&base, &url)
                    .map(|u| u.to_string())
                    .unwrap_or(url)
            }
            _ => url,
        }
    }

    pub fn set_url(&self, url: impl Into<String>) {
        *write(&self.url) = url.into();
    }

    pub fn nodes(&self) -> Vec<Arc<Node>> {
        read(&self.nodes).clone()
    }

    /// Replace the root nodes. The old ones are shut down; the new ones
    /// must not have been initialized yet.
    pub fn set_nodes(&self, nodes: Vec<Arc<Node>>) -> Result<(), SceneError> {
        if let Some(node) = nodes
            .iter()
            .find(|n| n.lifecycle() != Lifecycle::Uninitialized)
        {
            return Err(SceneError::NodeAlreadyInitialized(node.id()));
        }
        let old = std::mem::replace(&mut *write(&self.nodes), nodes);
        let timestamp = self.timestamp();
        for node in old {
            node.shutdown(timestamp);
        }
        Ok(())
    }

    pub fn scope(&self) -> Option<Arc<Scope>> {
        read(&self.scope).clone()
    }

    pub fn meta(&self, key: &str) -> Result<String, SceneError> {
        read(&self.meta)
            .get(key)
            .cloned()
            .ok_or_else(|| SceneError::NoSuchMetadata(key.to_string()))
    }

    pub fn set_meta(&self, key: impl Into<String>, value: impl Into<String>) {
        write(&self.meta).insert(key.into(), value.into());
    }

    pub fn meta_keys(&self) -> Vec<String> {
        read(&self.meta).keys().cloned().collect()
    }

    /// Run `hook` after every successful `load`.
    pub fn on_loaded(&self, hook: impl Fn(&Scene) + Send + Sync + 'static) {
        lock(&self.loaded_hooks).push(Box::new(hook));
    }

    fn timestamp(&self) -> f64 {
        self.browser()
            .map(|b| b.current_time())
            .unwrap_or_else(Browser::now)
    }

    /// Replace the contents of the scene with what `stream` parses to. The
    /// nodes are not initialized.
    pub fn load(self: &Arc<Self>, stream: &mut dyn ResourceStream) -> Result<(), SceneError> {
        let browser = self.browser().ok_or(SceneError::BrowserGone)?;
        write(&self.nodes).clear();
        write(&self.meta).clear();
        *write(&self.scope) = None;

        let url = stream.url().to_string();
        let media_type = stream.media_type().to_string();
        self.set_url(url.as_str());
        log::info!("loading {url} ({media_type})");

        let parsed = browser.parser().parse(stream, &url, &media_type, self)?;
        *write(&self.nodes) = parsed.nodes;
        write(&self.meta).extend(parsed.meta);
        *write(&self.scope) = parsed.scope;

        for hook in lock(&self.loaded_hooks).iter() {
            hook(self);
        }
        Ok(())
    }

    /// Initialize every root node (and, through them, everything they
    /// reference), then let them relocate. Keeps going past failures and
    /// reports the first.
    pub fn initialize(self: &Arc<Self>, timestamp: f64) -> Result<(), NodeError> {
        let nodes = self.nodes();
        let mut first_error = None;
        for node in &nodes {
            if let Err(e) = node.initialize(self, timestamp) {
                log::warn!("could not initialize {} node {}: {e}", node.type_id(), node.id());
                first_error.get_or_insert(e);
            }
        }
        for node in &nodes {
            node.relocate();
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn shutdown(&self, timestamp: f64) {
        for node in self.nodes() {
            node.shutdown(timestamp);
        }
    }

    pub fn render(&self, viewer: &mut dyn Viewer, context: &mut RenderContext<'_>) {
        for node in self.nodes() {
            context.render_node(node.id(), viewer);
        }
    }

    fn resolve_reference(&self, base: &str, reference: &str) -> Result<Url, ResourceError> {
        let url = if !uri::is_relative(reference) {
            uri::parse(reference)?
        } else if base.is_empty() {
            uri::file_url_in_working_dir(reference)?
        } else {
            uri::resolve(base, reference)?
        };
        Ok(uri::without_fragment(&url))
    }

    /// Open the first of `urls` that can be fetched. Each failure is
    /// reported on the browser's error sink as `<url>: <reason>`.
    pub fn get_resource(&self, urls: &[String]) -> Result<Box<dyn ResourceStream>, SceneError> {
        let browser = self.browser().ok_or(SceneError::BrowserGone)?;
        let base = self.url();
        for reference in urls {
            let url = match self.resolve_reference(&base, reference) {
                Ok(url) => url,
                Err(e) => {
                    browser.write_err(&format!("{reference}: {}", e.reason()));
                    continue;
                }
            };
            match browser.fetcher().get_resource(&url) {
                Ok(stream) => return Ok(stream),
                Err(e) => browser.write_err(&format!("{url}: {}", e.reason())),
            }
        }
        Err(ResourceError::NoAlternativeUrl(urls.to_vec()).into())
    }

    /// Feed `stream` to `listener` on a worker thread.
    pub fn read_stream(
        self: &Arc<Self>,
        mut stream: Box<dyn ResourceStream>,
        mut listener: Box<dyn StreamListener>,
    ) -> Result<(), SceneError> {
        let browser = self.browser();
        let chunk_size = browser
            .as_ref()
            .map_or(crate::config::DEFAULT_READ_CHUNK_SIZE, |b| {
                b.config().browser.read_chunk_size
            })
            .max(1);
        self.workers
            .spawn("read-stream", move || {
                let url = stream.url().to_string();
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    pump(&mut *stream, &mut *listener, chunk_size)
                }));
                let failure = match outcome {
                    Ok(Ok(())) => return,
                    Ok(Err(e)) => e.to_string(),
                    Err(_) => "stream reader panicked".to_string(),
                };
                report(browser.as_ref(), &ResourceError::unreachable(url, failure));
            })
            .map_err(|e| SceneError::Worker(e.to_string()))
    }

    /// Parse `stream` as a fragment of this scene. The nodes come back
    /// uninitialized.
    pub(crate) fn parse_nodes(self: &Arc<Self>, stream: &mut dyn ResourceStream) -> Result<Vec<Arc<Node>>, SceneError> {
        let browser = self.browser().ok_or(SceneError::BrowserGone)?;
        let fragment = self.new_child();
        fragment.set_url(stream.url());
        let url = fragment.url();
        let media_type = stream.media_type().to_string();
        Ok(browser
            .parser()
            .parse(stream, &url, &media_type, &fragment)?
            .nodes)
    }

    /// Run `job` on one of this scene's workers. A panicking job is logged
    /// and goes no further.
    pub(crate) fn spawn_worker(&self, name: &str, job: impl FnOnce() + Send + 'static) -> Result<(), SceneError> {
        let label = name.to_string();
        self.workers
            .spawn(name, move || {
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    log::error!("{label} worker panicked");
                }
            })
            .map_err(|e| SceneError::Worker(e.to_string()))
    }

    /// Fetch and parse the first reachable of `urls` on a worker thread,
    /// then send the resulting nodes to `event` of `node`, which must be an
    /// MFNode eventIn.
    pub fn create_vrml_from_url(
        self: &Arc<Self>,
        urls: Vec<String>,
        node: NodeID,
        event: &str,
    ) -> Result<(), SceneError> {
        let browser = self.browser().ok_or(SceneError::BrowserGone)?;
        let target = browser.graph().get(node).ok_or(NodeError::NoSuchNode(node))?;
        let event_type = target.event_in_type(event)?;
        if event_type != FieldType::MFNode {
            return Err(NodeError::FieldTypeMismatch {
                expected: FieldType::MFNode,
                found: event_type,
            }
            .into());
        }

        let scene = Arc::clone(self);
        let event = event.to_string();
        self.workers
            .spawn("create-vrml-from-url", move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    let mut stream = scene.get_resource(&urls)?;
                    scene.parse_nodes(&mut *stream)
                }));
                let nodes = match outcome {
                    Ok(Ok(nodes)) => nodes,
                    Ok(Err(e)) => {
                        browser.write_err(&e.to_string());
                        return;
                    }
                    Err(_) => {
                        report(
                            Some(&browser),
                            &ResourceError::unreachable(urls.join(" "), "loader panicked"),
                        );
                        return;
                    }
                };

                let timestamp = browser.current_time();
                let ids: Vec<NodeID> = nodes.iter().map(|n| n.id()).collect();
                if let Err(e) =
                    browser
                        .graph()
                        .deliver(node, &event, &FieldValue::MFNode(ids), timestamp)
                {
                    browser.write_err(&format!("could not deliver {event} to node {node}: {e}"));
                }
                for created in &nodes {
                    if let Err(e) = created.initialize(&scene, timestamp) {
                        log::warn!("could not initialize node {}: {e}", created.id());
                    }
                }
                browser.graph().flush_pending(timestamp);
                browser.set_modified();
            })
            .map_err(|e| SceneError::Worker(e.to_string()))
    }

    /// Load a new world into the browser. A leading `#name` instead binds
    /// the viewpoint defined as `name`.
    pub fn load_url(&self, urls: &[String], parameters: &[String]) -> Result<(), SceneError> {
        let browser = self.browser().ok_or(SceneError::BrowserGone)?;
        if let Some(name) = urls.first().and_then(|u| u.strip_prefix('#')) {
            match self.scope().and_then(|s| s.find_node(name)) {
                Some(id) => browser.bind_viewpoint(id)?,
                None => browser.write_err(&format!("#{name}: no such viewpoint")),
            }
            return Ok(());
        }
        let base = self.url();
        let absolute = urls
            .iter()
            .map(|reference| {
                if base.is_empty() || !uri::is_relative(reference) {
                    return reference.clone();
                }
                uri::resolve(&base, reference)
                    .map(|u| u.to_string())
                    .unwrap_or_else(|_| reference.clone())
            })
            .collect();
        browser.load_url(absolute, parameters.to_vec())
    }

    /// Block until every worker started by this scene has finished.
    pub fn wait_for_workers(&self) {
        self.workers.join_all();
    }
}

fn pump(stream: &mut dyn ResourceStream, listener: &mut dyn StreamListener, chunk_size: usize) -> io::Result<()> {
    listener.stream_available(stream.url(), stream.media_type());
    let mut buffer = vec![0u8; chunk_size];
    loop {
        let n = match stream.read(&mut buffer) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        listener.data_available(&buffer[..n]);
    }
}

fn report(browser: Option<&Browser>, err: &ResourceError) {
    match browser {
        Some(browser) => browser.write_err(&err.to_string()),
        None => log::error!("{err}"),
    }
}
