use super::exposed;
use crate::{
    ChildNode, EventEmitter, FieldDispatchTable, GeometryNode, InterfaceError, NodeContext,
    NodeImpl, RenderContext, Viewer,
};
use vrml_field::{FieldType, FieldValue, Vec3f};
use vrml_ids::NodeID;

pub struct Shape {
    appearance: EventEmitter,
    geometry: EventEmitter,
}

impl Default for Shape {
    fn default() -> Self {
        Self {
            appearance: exposed(FieldValue::SFNode(None)),
            geometry: exposed(FieldValue::SFNode(None)),
        }
    }
}

impl Shape {
    fn geometry_id(&self) -> Option<NodeID> {
        self.geometry.value().as_node().flatten()
    }
}

impl NodeImpl for Shape {
    const TYPE_ID: &'static str = "Shape";

    fn build_table(table: &mut FieldDispatchTable<Self>) -> Result<(), InterfaceError> {
        table.add_exposed_field(FieldType::SFNode, "appearance", |n| &n.appearance, |n| &mut n.appearance)?;
        table.add_exposed_field(FieldType::SFNode, "geometry", |n| &n.geometry, |n| &mut n.geometry)?;
        Ok(())
    }

    fn field_changed(&mut self, id: &str, ctx: &mut NodeContext) {
        let changed = match id {
            "geometry" => self.geometry.value(),
            "appearance" => self.appearance.value(),
            _ => return,
        };
        if let Some(Some(node)) = changed.as_node() {
            ctx.request_initialize(node);
        }
    }

    fn as_child(&self) -> Option<&dyn ChildNode> {
        Some(self)
    }
    fn as_child_mut(&mut self) -> Option<&mut dyn ChildNode> {
        Some(self)
    }
}

impl ChildNode for Shape {
    fn render_child(&self, viewer: &mut dyn Viewer, context: &mut RenderContext<'_>) {
        if let Some(geometry) = self.geometry_id() {
            context.render_geometry(geometry, viewer);
        }
    }
}

/// The `Box` node.
pub struct BoxNode {
    size: FieldValue,
}

impl Default for BoxNode {
    fn default() -> Self {
        Self {
            size: FieldValue::SFVec3f(Vec3f::new(2.0, 2.0, 2.0)),
        }
    }
}

impl NodeImpl for BoxNode {
    const TYPE_ID: &'static str = "Box";

    fn build_table(table: &mut FieldDispatchTable<Self>) -> Result<(), InterfaceError> {
        table.add_field(FieldType::SFVec3f, "size", |n| &n.size, |n| &mut n.size)
    }

    fn as_geometry(&self) -> Option<&dyn GeometryNode> {
        Some(self)
    }
}

impl GeometryNode for BoxNode {
    fn render_geometry(&self, viewer: &mut dyn Viewer) {
        viewer.insert_box(self.size.as_vec3f().unwrap_or_default());
    }
}

pub struct Sphere {
    radius: FieldValue,
}

impl Default for Sphere {
    fn default() -> Self {
        Self {
            radius: FieldValue::SFFloat(1.0),
        }
    }
}

impl NodeImpl for Sphere {
    const TYPE_ID: &'static str = "Sphere";

    fn build_table(table: &mut FieldDispatchTable<Self>) -> Result<(), InterfaceError> {
        table.add_field(FieldType::SFFloat, "radius", |n| &n.radius, |n| &mut n.radius)
    }

    fn as_geometry(&self) -> Option<&dyn GeometryNode> {
        Some(self)
    }
}

impl GeometryNode for Sphere {
    fn render_geometry(&self, viewer: &mut dyn Viewer) {
        viewer.insert_sphere(self.radius.as_f32().unwrap_or(1.0));
    }
}
