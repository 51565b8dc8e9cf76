use super::exposed;
use crate::sync::lock;
use crate::{
    ChildNode, EventEmitter, FieldDispatchTable, InterfaceError, NodeContext, NodeError, NodeImpl,
    RenderContext, Scene, SceneError, Viewer,
};
use std::sync::{Arc, Mutex};
use vrml_field::{FieldType, FieldValue, Vec3f};
use vrml_ids::NodeID;

/// The world an Inline currently shows. `request` counts loads so a slow
/// worker cannot install a world for a url that has since changed.
#[derive(Default)]
struct Inlined {
    request: u64,
    scene: Option<Arc<Scene>>,
}

/// A world read from `url` and shown as this node's children. Loading runs
/// on the scene's workers; until it finishes the node draws nothing.
pub struct Inline {
    url: EventEmitter,
    bbox_center: FieldValue,
    bbox_size: FieldValue,
    inlined: Arc<Mutex<Inlined>>,
}

impl Default for Inline {
    fn default() -> Self {
        Self {
            url: exposed(Vec::<String>::new()),
            bbox_center: FieldValue::SFVec3f(Vec3f::ZERO),
            bbox_size: FieldValue::SFVec3f(Vec3f::new(-1.0, -1.0, -1.0)),
            inlined: Arc::default(),
        }
    }
}

impl Inline {
    /// The scene loaded from `url`, once there is one.
    pub fn inlined_scene(&self) -> Option<Arc<Scene>> {
        lock(&self.inlined).scene.clone()
    }

    fn children(&self) -> Vec<NodeID> {
        lock(&self.inlined)
            .scene
            .as_ref()
            .map(|scene| scene.nodes().iter().map(|n| n.id()).collect())
            .unwrap_or_default()
    }

    fn load(&self, ctx: &NodeContext) {
        let Some(scene) = ctx.scene() else {
            return;
        };
        let urls: Vec<String> = self
            .url
            .value()
            .as_strings()
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        let request = {
            let mut inlined = lock(&self.inlined);
            inlined.request += 1;
            inlined.request
        };
        let inlined = Arc::clone(&self.inlined);
        let parent = Arc::clone(scene);
        let node = ctx.node_id();
        let spawned = scene.spawn_worker("inline", move || {
            let loaded = if urls.is_empty() {
                None
            } else {
                match load_world(&parent, &urls) {
                    Ok(world) => Some(world),
                    Err(e) => {
                        match parent.browser() {
                            Some(browser) => browser.write_err(&format!("Inline {node}: {e}")),
                            None => log::warn!("Inline {node}: {e}"),
                        }
                        None
                    }
                }
            };
            let replaced = {
                let mut current = lock(&inlined);
                if current.request != request {
                    // A newer url won; this world is not wanted.
                    loaded
                } else {
                    std::mem::replace(&mut current.scene, loaded)
                }
            };
            let browser = parent.browser();
            if let Some(old) = replaced {
                let timestamp = browser.as_ref().map_or_else(crate::Browser::now, |b| b.current_time());
                old.shutdown(timestamp);
            }
            if let Some(browser) = browser {
                browser.set_modified();
            }
        });
        if let Err(e) = spawned {
            log::error!("Inline {node}: {e}");
        }
    }
}

/// Fetch the first reachable of `urls` into a child of `parent` and bring
/// its nodes up.
fn load_world(parent: &Arc<Scene>, urls: &[String]) -> Result<Arc<Scene>, SceneError> {
    let mut stream = parent.get_resource(urls)?;
    let world = parent.new_child();
    world.load(&mut *stream)?;
    let timestamp = parent
        .browser()
        .map_or_else(crate::Browser::now, |b| b.current_time());
    world.initialize(timestamp)?;
    Ok(world)
}

impl NodeImpl for Inline {
    const TYPE_ID: &'static str = "Inline";

    fn build_table(table: &mut FieldDispatchTable<Self>) -> Result<(), InterfaceError> {
        table.add_exposed_field(FieldType::MFString, "url", |n| &n.url, |n| &mut n.url)?;
        table.add_field(FieldType::SFVec3f, "bboxCenter", |n| &n.bbox_center, |n| &mut n.bbox_center)?;
        table.add_field(FieldType::SFVec3f, "bboxSize", |n| &n.bbox_size, |n| &mut n.bbox_size)?;
        Ok(())
    }

    fn initialize(&mut self, ctx: &mut NodeContext, _timestamp: f64) -> Result<(), NodeError> {
        self.load(ctx);
        Ok(())
    }

    fn shutdown(&mut self, _ctx: &mut NodeContext, timestamp: f64) {
        // Loads still running are discarded. The inlined scene points back
        // at its parent, so it is let go here; its nodes belong to this node
        // alone and nothing else locks them from inside a hook.
        let world = {
            let mut inlined = lock(&self.inlined);
            inlined.request += 1;
            inlined.scene.take()
        };
        if let Some(world) = world {
            world.shutdown(timestamp);
        }
    }

    fn field_changed(&mut self, id: &str, ctx: &mut NodeContext) {
        if id == "url" {
            self.load(ctx);
        }
    }

    fn owned_nodes(&self) -> Vec<NodeID> {
        self.children()
    }

    fn as_child(&self) -> Option<&dyn ChildNode> {
        Some(self)
    }
    fn as_child_mut(&mut self) -> Option<&mut dyn ChildNode> {
        Some(self)
    }
}

impl ChildNode for Inline {
    fn render_child(&self, viewer: &mut dyn Viewer, context: &mut RenderContext<'_>) {
        for id in self.children() {
            context.render_node(id, viewer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_inline_has_no_children() {
        let inline = Inline::default();
        assert!(inline.inlined_scene().is_none());
        assert!(inline.owned_nodes().is_empty());
        assert_eq!(inline.url.value(), &FieldValue::MFString(Vec::new()));
    }
}
