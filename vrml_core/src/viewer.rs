use crate::NodeGraph;
use glam::Mat4;
use vrml_field::{Color, Rotation, Vec3f};
use vrml_ids::NodeID;

#[derive(Clone, Debug, PartialEq)]
pub enum Light {
    Directional {
        ambient_intensity: f32,
        color: Color,
        direction: Vec3f,
        intensity: f32,
    },
    Point {
        ambient_intensity: f32,
        attenuation: Vec3f,
        color: Color,
        intensity: f32,
        location: Vec3f,
        radius: f32,
    },
}

/// Drawing surface the browser renders into. Only the bracketing calls and
/// the primitives the standard nodes use are required.
pub trait Viewer: Send {
    fn begin_frame(&mut self) {}
    fn end_frame(&mut self) {}

    fn set_viewpoint(&mut self, position: Vec3f, orientation: Rotation, field_of_view: f32);
    fn set_navigation(&mut self, _headlight: bool, _speed: f32, _avatar_size: &[f32]) {}
    fn insert_light(&mut self, light: &Light);

    fn begin_object(&mut self, _node: NodeID) {}
    fn end_object(&mut self) {}

    fn push_transform(&mut self, matrix: &Mat4);
    fn pop_transform(&mut self);

    fn insert_box(&mut self, size: Vec3f);
    fn insert_sphere(&mut self, radius: f32);
}

/// State of one render traversal.
pub struct RenderContext<'a> {
    graph: &'a NodeGraph,
    ancestors: Vec<NodeID>,
}

impl<'a> RenderContext<'a> {
    pub(crate) fn new(graph: &'a NodeGraph) -> Self {
        Self {
            graph,
            ancestors: Vec::new(),
        }
    }

    /// Render a child node. A node that is its own ancestor is skipped, so
    /// a cyclic graph renders once per path instead of recursing forever.
    pub fn render_node(&mut self, id: NodeID, viewer: &mut dyn Viewer) {
        if self.ancestors.contains(&id) {
            log::warn!("node {id} is its own ancestor; not rendering it again");
            return;
        }
        let Some(node) = self.graph.get(id) else {
            return;
        };
        self.ancestors.push(id);
        node.render_child(viewer, self);
        self.ancestors.pop();
    }

    pub fn render_geometry(&mut self, id: NodeID, viewer: &mut dyn Viewer) {
        if self.ancestors.contains(&id) {
            return;
        }
        if let Some(node) = self.graph.get(id) {
            node.render_geometry(viewer);
        }
    }

    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }
}

/// Rotation as a quaternion, normalising the axis. A zero axis is identity.
pub fn rotation_quat(rotation: Rotation) -> glam::Quat {
    let axis = glam::Vec3::new(rotation.x, rotation.y, rotation.z).normalize_or_zero();
    if axis == glam::Vec3::ZERO {
        return glam::Quat::IDENTITY;
    }
    glam::Quat::from_axis_angle(axis, rotation.angle)
}

pub fn to_glam(v: Vec3f) -> glam::Vec3 {
    glam::Vec3::new(v.x, v.y, v.z)
}
