//! The built-in node library: enough of VRML97 to build, animate, light
//! and view a world.

mod bindable;
mod geometry;
mod grouping;
mod inline;
mod interpolator;
mod light;
mod time_sensor;
mod viewpoint;
mod world_info;

pub use geometry::{BoxNode, Shape, Sphere};
pub use grouping::{Group, Transform};
pub use inline::Inline;
pub use interpolator::{PositionInterpolator, ScalarInterpolator};
pub use light::{DirectionalLight, PointLight};
pub use time_sensor::TimeSensor;
pub use viewpoint::{NavigationInfo, Viewpoint};
pub use world_info::WorldInfo;

use crate::{EventEmitter, NodeClass, NodeError, NodeGraph, StandardNodeClass};
use std::sync::Arc;
use vrml_field::FieldValue;

/// One class per built-in node, all sharing `graph`.
pub fn standard_classes(graph: &Arc<NodeGraph>) -> Result<Vec<Arc<dyn NodeClass>>, NodeError> {
    Ok(vec![
        Arc::new(StandardNodeClass::<Group>::new(graph)?),
        Arc::new(StandardNodeClass::<Transform>::new(graph)?),
        Arc::new(StandardNodeClass::<Inline>::new(graph)?),
        Arc::new(StandardNodeClass::<Shape>::new(graph)?),
        Arc::new(StandardNodeClass::<BoxNode>::new(graph)?),
        Arc::new(StandardNodeClass::<Sphere>::new(graph)?),
        Arc::new(StandardNodeClass::<TimeSensor>::new(graph)?),
        Arc::new(StandardNodeClass::<ScalarInterpolator>::new(graph)?),
        Arc::new(StandardNodeClass::<PositionInterpolator>::new(graph)?),
        Arc::new(StandardNodeClass::<Viewpoint>::new(graph)?),
        Arc::new(StandardNodeClass::<NavigationInfo>::new(graph)?),
        Arc::new(StandardNodeClass::<DirectionalLight>::new(graph)?),
        Arc::new(StandardNodeClass::<PointLight>::new(graph)?),
        Arc::new(StandardNodeClass::<WorldInfo>::new(graph)?),
    ])
}

fn exposed(value: impl Into<FieldValue>) -> EventEmitter {
    EventEmitter::new(value.into())
}

/// Write an eventOut the node owns. The type is fixed by the node, so a
/// mismatch is a bug in the node, not in the caller.
fn emit(emitter: &mut EventEmitter, value: impl Into<FieldValue>) {
    if let Err(e) = emitter.set(value) {
        log::error!("built-in node wrote the wrong type to an eventOut: {e}");
    }
}

fn as_bool(emitter: &EventEmitter) -> bool {
    emitter.value().as_bool().unwrap_or_default()
}

fn as_f32(emitter: &EventEmitter) -> f32 {
    emitter.value().as_f32().unwrap_or_default()
}

fn as_time(emitter: &EventEmitter) -> f64 {
    emitter.value().as_time().unwrap_or_default()
}
