use super::{as_bool, as_f32, exposed};
use crate::{
    ChildNode, EventEmitter, FieldDispatchTable, InterfaceError, Light, LightNode, NodeImpl,
    RenderContext, Viewer,
};
use vrml_field::{Color, FieldType, Vec3f};

fn vec3(emitter: &EventEmitter) -> Vec3f {
    emitter.value().as_vec3f().unwrap_or_default()
}

fn color(emitter: &EventEmitter) -> Color {
    emitter.value().as_color().unwrap_or_default()
}

/// Lights its siblings and their descendants from one direction.
pub struct DirectionalLight {
    ambient_intensity: EventEmitter,
    color: EventEmitter,
    direction: EventEmitter,
    intensity: EventEmitter,
    on: EventEmitter,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            ambient_intensity: exposed(0.0f32),
            color: exposed(Color::WHITE),
            direction: exposed(Vec3f::new(0.0, 0.0, -1.0)),
            intensity: exposed(1.0f32),
            on: exposed(true),
        }
    }
}

impl NodeImpl for DirectionalLight {
    const TYPE_ID: &'static str = "DirectionalLight";

    fn build_table(table: &mut FieldDispatchTable<Self>) -> Result<(), InterfaceError> {
        table.add_exposed_field(
            FieldType::SFFloat,
            "ambientIntensity",
            |n| &n.ambient_intensity,
            |n| &mut n.ambient_intensity,
        )?;
        table.add_exposed_field(FieldType::SFColor, "color", |n| &n.color, |n| &mut n.color)?;
        table.add_exposed_field(FieldType::SFVec3f, "direction", |n| &n.direction, |n| &mut n.direction)?;
        table.add_exposed_field(FieldType::SFFloat, "intensity", |n| &n.intensity, |n| &mut n.intensity)?;
        table.add_exposed_field(FieldType::SFBool, "on", |n| &n.on, |n| &mut n.on)?;
        Ok(())
    }

    fn as_child(&self) -> Option<&dyn ChildNode> {
        Some(self)
    }
    fn as_child_mut(&mut self) -> Option<&mut dyn ChildNode> {
        Some(self)
    }
    fn as_light(&self) -> Option<&dyn LightNode> {
        Some(self)
    }
}

impl LightNode for DirectionalLight {
    fn light(&self) -> Option<Light> {
        if !as_bool(&self.on) {
            return None;
        }
        Some(Light::Directional {
            ambient_intensity: as_f32(&self.ambient_intensity),
            color: color(&self.color),
            direction: vec3(&self.direction),
            intensity: as_f32(&self.intensity),
        })
    }

    fn is_scoped(&self) -> bool {
        false
    }
}

impl ChildNode for DirectionalLight {
    fn render_child(&self, viewer: &mut dyn Viewer, _context: &mut RenderContext<'_>) {
        if let Some(light) = self.light() {
            viewer.insert_light(&light);
        }
    }
}

/// Lights everything within `radius` of `location`, wherever it sits in
/// the graph. The browser applies it before drawing the world.
pub struct PointLight {
    ambient_intensity: EventEmitter,
    attenuation: EventEmitter,
    color: EventEmitter,
    intensity: EventEmitter,
    location: EventEmitter,
    on: EventEmitter,
    radius: EventEmitter,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            ambient_intensity: exposed(0.0f32),
            attenuation: exposed(Vec3f::new(1.0, 0.0, 0.0)),
            color: exposed(Color::WHITE),
            intensity: exposed(1.0f32),
            location: exposed(Vec3f::ZERO),
            on: exposed(true),
            radius: exposed(100.0f32),
        }
    }
}

impl NodeImpl for PointLight {
    const TYPE_ID: &'static str = "PointLight";

    fn build_table(table: &mut FieldDispatchTable<Self>) -> Result<(), InterfaceError> {
        table.add_exposed_field(
            FieldType::SFFloat,
            "ambientIntensity",
            |n| &n.ambient_intensity,
            |n| &mut n.ambient_intensity,
        )?;
        table.add_exposed_field(FieldType::SFVec3f, "attenuation", |n| &n.attenuation, |n| &mut n.attenuation)?;
        table.add_exposed_field(FieldType::SFColor, "color", |n| &n.color, |n| &mut n.color)?;
        table.add_exposed_field(FieldType::SFFloat, "intensity", |n| &n.intensity, |n| &mut n.intensity)?;
        table.add_exposed_field(FieldType::SFVec3f, "location", |n| &n.location, |n| &mut n.location)?;
        table.add_exposed_field(FieldType::SFBool, "on", |n| &n.on, |n| &mut n.on)?;
        table.add_exposed_field(FieldType::SFFloat, "radius", |n| &n.radius, |n| &mut n.radius)?;
        Ok(())
    }

    fn as_child(&self) -> Option<&dyn ChildNode> {
        Some(self)
    }
    fn as_child_mut(&mut self) -> Option<&mut dyn ChildNode> {
        Some(self)
    }
    fn as_light(&self) -> Option<&dyn LightNode> {
        Some(self)
    }
}

impl LightNode for PointLight {
    fn light(&self) -> Option<Light> {
        if !as_bool(&self.on) {
            return None;
        }
        Some(Light::Point {
            ambient_intensity: as_f32(&self.ambient_intensity),
            attenuation: vec3(&self.attenuation),
            color: color(&self.color),
            intensity: as_f32(&self.intensity),
            location: vec3(&self.location),
            radius: as_f32(&self.radius),
        })
    }

    fn is_scoped(&self) -> bool {
        true
    }
}

impl ChildNode for PointLight {
    fn render_child(&self, _viewer: &mut dyn Viewer, _context: &mut RenderContext<'_>) {}
}
