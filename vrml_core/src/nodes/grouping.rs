use super::{emit, exposed};
use crate::{
    ChildNode, EventEmitter, FieldDispatchTable, InterfaceError, NodeContext, NodeError, NodeImpl,
    RenderContext, Viewer, rotation_quat, to_glam,
};
use glam::Mat4;
use vrml_field::{FieldType, FieldValue, Rotation, Vec3f};
use vrml_ids::NodeID;

fn child_ids(children: &EventEmitter) -> &[NodeID] {
    children.value().as_nodes().unwrap_or_default()
}

fn add_children(children: &mut EventEmitter, value: &FieldValue, ctx: &mut NodeContext) {
    let mut ids = child_ids(children).to_vec();
    for id in value.as_nodes().unwrap_or_default() {
        if !ids.contains(id) {
            ids.push(*id);
            ctx.request_initialize(*id);
        }
    }
    emit(children, ids);
}

fn remove_children(children: &mut EventEmitter, value: &FieldValue) {
    let removed = value.as_nodes().unwrap_or_default();
    let ids: Vec<NodeID> = child_ids(children)
        .iter()
        .copied()
        .filter(|id| !removed.contains(id))
        .collect();
    emit(children, ids);
}

fn initialize_children(children: &EventEmitter, ctx: &mut NodeContext) {
    for id in child_ids(children) {
        ctx.request_initialize(*id);
    }
}

pub struct Group {
    children: EventEmitter,
    bbox_center: FieldValue,
    bbox_size: FieldValue,
}

impl Default for Group {
    fn default() -> Self {
        Self {
            children: exposed(Vec::<NodeID>::new()),
            bbox_center: FieldValue::SFVec3f(Vec3f::ZERO),
            bbox_size: FieldValue::SFVec3f(Vec3f::new(-1.0, -1.0, -1.0)),
        }
    }
}

impl Group {
    fn on_add_children(&mut self, value: &FieldValue, _timestamp: f64, ctx: &mut NodeContext) -> Result<(), NodeError> {
        add_children(&mut self.children, value, ctx);
        Ok(())
    }

    fn on_remove_children(&mut self, value: &FieldValue, _timestamp: f64, _ctx: &mut NodeContext) -> Result<(), NodeError> {
        remove_children(&mut self.children, value);
        Ok(())
    }
}

impl NodeImpl for Group {
    const TYPE_ID: &'static str = "Group";

    fn build_table(table: &mut FieldDispatchTable<Self>) -> Result<(), InterfaceError> {
        table.add_exposed_field(FieldType::MFNode, "children", |n| &n.children, |n| &mut n.children)?;
        table.add_event_in(FieldType::MFNode, "addChildren", Self::on_add_children)?;
        table.add_event_in(FieldType::MFNode, "removeChildren", Self::on_remove_children)?;
        table.add_field(FieldType::SFVec3f, "bboxCenter", |n| &n.bbox_center, |n| &mut n.bbox_center)?;
        table.add_field(FieldType::SFVec3f, "bboxSize", |n| &n.bbox_size, |n| &mut n.bbox_size)?;
        Ok(())
    }

    fn field_changed(&mut self, id: &str, ctx: &mut NodeContext) {
        if id == "children" {
            initialize_children(&self.children, ctx);
        }
    }

    fn as_child(&self) -> Option<&dyn ChildNode> {
        Some(self)
    }
    fn as_child_mut(&mut self) -> Option<&mut dyn ChildNode> {
        Some(self)
    }
}

impl ChildNode for Group {
    fn render_child(&self, viewer: &mut dyn Viewer, context: &mut RenderContext<'_>) {
        for id in child_ids(&self.children) {
            context.render_node(*id, viewer);
        }
    }
}

/// A group with its own coordinate system.
pub struct Transform {
    children: EventEmitter,
    center: EventEmitter,
    rotation: EventEmitter,
    scale: EventEmitter,
    scale_orientation: EventEmitter,
    translation: EventEmitter,
    bbox_center: FieldValue,
    bbox_size: FieldValue,
    matrix: Mat4,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            children: exposed(Vec::<NodeID>::new()),
            center: exposed(Vec3f::ZERO),
            rotation: exposed(Rotation::IDENTITY),
            scale: exposed(Vec3f::ONE),
            scale_orientation: exposed(Rotation::IDENTITY),
            translation: exposed(Vec3f::ZERO),
            bbox_center: FieldValue::SFVec3f(Vec3f::ZERO),
            bbox_size: FieldValue::SFVec3f(Vec3f::new(-1.0, -1.0, -1.0)),
            matrix: Mat4::IDENTITY,
        }
    }
}

impl Transform {
    fn on_add_children(&mut self, value: &FieldValue, _timestamp: f64, ctx: &mut NodeContext) -> Result<(), NodeError> {
        add_children(&mut self.children, value, ctx);
        Ok(())
    }

    fn on_remove_children(&mut self, value: &FieldValue, _timestamp: f64, _ctx: &mut NodeContext) -> Result<(), NodeError> {
        remove_children(&mut self.children, value);
        Ok(())
    }

    /// `T * C * R * SR * S * -SR * -C`
    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    fn update_matrix(&mut self) {
        let vec3 = |e: &EventEmitter| to_glam(e.value().as_vec3f().unwrap_or_default());
        let quat = |e: &EventEmitter| rotation_quat(e.value().as_rotation().unwrap_or(Rotation::IDENTITY));
        let center = vec3(&self.center);
        let scale_orientation = quat(&self.scale_orientation);
        self.matrix = Mat4::from_translation(vec3(&self.translation))
            * Mat4::from_translation(center)
            * Mat4::from_quat(quat(&self.rotation))
            * Mat4::from_quat(scale_orientation)
            * Mat4::from_scale(vec3(&self.scale))
            * Mat4::from_quat(scale_orientation.inverse())
            * Mat4::from_translation(-center);
    }
}

impl NodeImpl for Transform {
    const TYPE_ID: &'static str = "Transform";

    fn build_table(table: &mut FieldDispatchTable<Self>) -> Result<(), InterfaceError> {
        table.add_exposed_field(FieldType::MFNode, "children", |n| &n.children, |n| &mut n.children)?;
        table.add_event_in(FieldType::MFNode, "addChildren", Self::on_add_children)?;
        table.add_event_in(FieldType::MFNode, "removeChildren", Self::on_remove_children)?;
        table.add_exposed_field(FieldType::SFVec3f, "center", |n| &n.center, |n| &mut n.center)?;
        table.add_exposed_field(FieldType::SFRotation, "rotation", |n| &n.rotation, |n| &mut n.rotation)?;
        table.add_exposed_field(FieldType::SFVec3f, "scale", |n| &n.scale, |n| &mut n.scale)?;
        table.add_exposed_field(
            FieldType::SFRotation,
            "scaleOrientation",
            |n| &n.scale_orientation,
            |n| &mut n.scale_orientation,
        )?;
        table.add_exposed_field(FieldType::SFVec3f, "translation", |n| &n.translation, |n| &mut n.translation)?;
        table.add_field(FieldType::SFVec3f, "bboxCenter", |n| &n.bbox_center, |n| &mut n.bbox_center)?;
        table.add_field(FieldType::SFVec3f, "bboxSize", |n| &n.bbox_size, |n| &mut n.bbox_size)?;
        Ok(())
    }

    fn initialize(&mut self, _ctx: &mut NodeContext, _timestamp: f64) -> Result<(), NodeError> {
        self.update_matrix();
        Ok(())
    }

    fn field_changed(&mut self, id: &str, ctx: &mut NodeContext) {
        match id {
            "children" => initialize_children(&self.children, ctx),
            _ => self.update_matrix(),
        }
    }

    fn as_child(&self) -> Option<&dyn ChildNode> {
        Some(self)
    }
    fn as_child_mut(&mut self) -> Option<&mut dyn ChildNode> {
        Some(self)
    }
}

impl ChildNode for Transform {
    fn render_child(&self, viewer: &mut dyn Viewer, context: &mut RenderContext<'_>) {
        viewer.push_transform(&self.matrix);
        for id in child_ids(&self.children) {
            context.render_node(*id, viewer);
        }
        viewer.pop_transform();
    }

    fn relocate(&mut self) {
        self.update_matrix();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_matrix_composes_translation_rotation_and_scale() {
        let mut transform = Transform::default();
        emit(&mut transform.translation, Vec3f::new(1.0, 2.0, 3.0));
        emit(&mut transform.scale, Vec3f::new(2.0, 2.0, 2.0));
        emit(
            &mut transform.rotation,
            Rotation::new(0.0, 0.0, 1.0, std::f32::consts::FRAC_PI_2),
        );
        transform.update_matrix();

        let p = transform.matrix().transform_point3(glam::Vec3::new(1.0, 0.0, 0.0));
        assert!((p - glam::Vec3::new(1.0, 4.0, 3.0)).length() < 1e-5);
    }

    #[test]
    fn center_is_the_pivot() {
        let mut transform = Transform::default();
        emit(&mut transform.center, Vec3f::new(1.0, 0.0, 0.0));
        emit(
            &mut transform.rotation,
            Rotation::new(0.0, 0.0, 1.0, std::f32::consts::PI),
        );
        transform.update_matrix();

        let pivot = transform.matrix().transform_point3(glam::Vec3::new(1.0, 0.0, 0.0));
        assert!((pivot - glam::Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn remove_children_keeps_the_rest_in_order() {
        let a = NodeID::from_parts(1, 0);
        let b = NodeID::from_parts(2, 0);
        let c = NodeID::from_parts(3, 0);
        let mut children = exposed(vec![a, b, c]);
        remove_children(&mut children, &FieldValue::MFNode(vec![b]));
        assert_eq!(child_ids(&children), &[a, c]);
        assert!(children.is_pending());
    }
}
