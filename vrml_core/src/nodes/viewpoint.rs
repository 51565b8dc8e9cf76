use super::{as_bool, as_f32, bindable, exposed};
use crate::{
    Bindable, EventEmitter, FieldDispatchTable, InterfaceError, NavigationInfoNode, NodeContext,
    NodeError, NodeImpl, ViewpointNode,
};
use vrml_field::{FieldType, FieldValue, Rotation, Vec3f};

pub struct Viewpoint {
    field_of_view: EventEmitter,
    jump: EventEmitter,
    orientation: EventEmitter,
    position: EventEmitter,
    description: FieldValue,
    bind_time: EventEmitter,
    is_bound: EventEmitter,
}

impl Default for Viewpoint {
    fn default() -> Self {
        Self {
            field_of_view: exposed(0.785398f32),
            jump: exposed(true),
            orientation: exposed(Rotation::IDENTITY),
            position: exposed(Vec3f::new(0.0, 0.0, 10.0)),
            description: FieldValue::SFString(String::new()),
            bind_time: exposed(0.0f64),
            is_bound: exposed(false),
        }
    }
}

impl Viewpoint {
    fn on_set_bind(&mut self, value: &FieldValue, timestamp: f64, ctx: &mut NodeContext) -> Result<(), NodeError> {
        bindable::set_bind(
            Bindable::Viewpoint,
            value,
            timestamp,
            ctx,
            &mut self.is_bound,
            Some(&mut self.bind_time),
        );
        Ok(())
    }

    pub fn is_bound(&self) -> bool {
        as_bool(&self.is_bound)
    }
}

impl NodeImpl for Viewpoint {
    const TYPE_ID: &'static str = "Viewpoint";

    fn build_table(table: &mut FieldDispatchTable<Self>) -> Result<(), InterfaceError> {
        table.add_exposed_field(FieldType::SFFloat, "fieldOfView", |n| &n.field_of_view, |n| &mut n.field_of_view)?;
        table.add_exposed_field(FieldType::SFBool, "jump", |n| &n.jump, |n| &mut n.jump)?;
        table.add_exposed_field(FieldType::SFRotation, "orientation", |n| &n.orientation, |n| &mut n.orientation)?;
        table.add_exposed_field(FieldType::SFVec3f, "position", |n| &n.position, |n| &mut n.position)?;
        table.add_field(FieldType::SFString, "description", |n| &n.description, |n| &mut n.description)?;
        table.add_event_in(FieldType::SFBool, "set_bind", Self::on_set_bind)?;
        table.add_event_out(FieldType::SFTime, "bindTime", |n| &n.bind_time, |n| &mut n.bind_time)?;
        table.add_event_out(FieldType::SFBool, "isBound", |n| &n.is_bound, |n| &mut n.is_bound)?;
        Ok(())
    }

    fn as_viewpoint(&self) -> Option<&dyn ViewpointNode> {
        Some(self)
    }
}

impl ViewpointNode for Viewpoint {
    fn position(&self) -> Vec3f {
        self.position.value().as_vec3f().unwrap_or_default()
    }

    fn orientation(&self) -> Rotation {
        self.orientation.value().as_rotation().unwrap_or(Rotation::IDENTITY)
    }

    fn field_of_view(&self) -> f32 {
        as_f32(&self.field_of_view)
    }

    fn description(&self) -> &str {
        self.description.as_str().unwrap_or_default()
    }
}

pub struct NavigationInfo {
    avatar_size: EventEmitter,
    headlight: EventEmitter,
    speed: EventEmitter,
    navigation_type: EventEmitter,
    visibility_limit: EventEmitter,
    is_bound: EventEmitter,
}

impl Default for NavigationInfo {
    fn default() -> Self {
        Self {
            avatar_size: exposed(vec![0.25f32, 1.6, 0.75]),
            headlight: exposed(true),
            speed: exposed(1.0f32),
            navigation_type: exposed(vec!["WALK".to_string(), "ANY".to_string()]),
            visibility_limit: exposed(0.0f32),
            is_bound: exposed(false),
        }
    }
}

impl NavigationInfo {
    fn on_set_bind(&mut self, value: &FieldValue, timestamp: f64, ctx: &mut NodeContext) -> Result<(), NodeError> {
        bindable::set_bind(
            Bindable::NavigationInfo,
            value,
            timestamp,
            ctx,
            &mut self.is_bound,
            None,
        );
        Ok(())
    }
}

impl NodeImpl for NavigationInfo {
    const TYPE_ID: &'static str = "NavigationInfo";

    fn build_table(table: &mut FieldDispatchTable<Self>) -> Result<(), InterfaceError> {
        table.add_exposed_field(FieldType::MFFloat, "avatarSize", |n| &n.avatar_size, |n| &mut n.avatar_size)?;
        table.add_exposed_field(FieldType::SFBool, "headlight", |n| &n.headlight, |n| &mut n.headlight)?;
        table.add_exposed_field(FieldType::SFFloat, "speed", |n| &n.speed, |n| &mut n.speed)?;
        table.add_exposed_field(FieldType::MFString, "type", |n| &n.navigation_type, |n| &mut n.navigation_type)?;
        table.add_exposed_field(
            FieldType::SFFloat,
            "visibilityLimit",
            |n| &n.visibility_limit,
            |n| &mut n.visibility_limit,
        )?;
        table.add_event_in(FieldType::SFBool, "set_bind", Self::on_set_bind)?;
        table.add_event_out(FieldType::SFBool, "isBound", |n| &n.is_bound, |n| &mut n.is_bound)?;
        Ok(())
    }

    fn as_navigation_info(&self) -> Option<&dyn NavigationInfoNode> {
        Some(self)
    }
}

impl NavigationInfoNode for NavigationInfo {
    fn avatar_size(&self) -> &[f32] {
        self.avatar_size.value().as_f32_slice().unwrap_or_default()
    }

    fn headlight(&self) -> bool {
        as_bool(&self.headlight)
    }

    fn speed(&self) -> f32 {
        as_f32(&self.speed)
    }

    fn navigation_types(&self) -> &[String] {
        self.navigation_type.value().as_strings().unwrap_or_default()
    }

    fn visibility_limit(&self) -> f32 {
        as_f32(&self.visibility_limit)
    }
}
