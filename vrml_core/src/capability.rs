//! Roles a node body can take on. The browser keeps a registry per role
//! and finds bodies through the `as_*` queries on `NodeBody`.

use crate::{Light, NodeBody, RenderContext, Viewer};
use vrml_field::{Rotation, Vec3f};

/// Something that can sit in a grouping node's children.
pub trait ChildNode {
    fn render_child(&self, viewer: &mut dyn Viewer, context: &mut RenderContext<'_>);

    /// Recompute anything derived from the node's position in the graph.
    fn relocate(&mut self) {}
}

pub trait GeometryNode {
    fn render_geometry(&self, viewer: &mut dyn Viewer);
}

/// Driven by the browser clock on every update.
pub trait TimeDependent {
    fn update(&mut self, time: f64);
}

pub trait ViewpointNode {
    fn position(&self) -> Vec3f;
    fn orientation(&self) -> Rotation;
    fn field_of_view(&self) -> f32;
    fn description(&self) -> &str;
}

pub trait NavigationInfoNode {
    fn avatar_size(&self) -> &[f32];
    fn headlight(&self) -> bool;
    fn speed(&self) -> f32;
    fn navigation_types(&self) -> &[String];
    fn visibility_limit(&self) -> f32;
}

pub trait LightNode {
    fn light(&self) -> Option<Light>;
    /// Scoped lights are applied to the whole world rather than where they
    /// sit in the graph.
    fn is_scoped(&self) -> bool;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub child: bool,
    pub geometry: bool,
    pub time_dependent: bool,
    pub viewpoint: bool,
    pub navigation_info: bool,
    pub scoped_light: bool,
    pub script: bool,
}

impl Capabilities {
    pub fn of(body: &mut dyn NodeBody) -> Self {
        Self {
            child: body.as_child().is_some(),
            geometry: body.as_geometry().is_some(),
            viewpoint: body.as_viewpoint().is_some(),
            navigation_info: body.as_navigation_info().is_some(),
            scoped_light: body.as_light().is_some_and(|l| l.is_scoped()),
            script: body.as_script().is_some(),
            time_dependent: body.as_time_dependent().is_some(),
        }
    }
}
