use super::{emit, exposed};
use crate::{EventEmitter, FieldDispatchTable, InterfaceError, NodeContext, NodeError, NodeImpl};
use vrml_field::{FieldType, FieldValue, Vec3f};

/// Where `fraction` falls among `keys`: the index of the segment's first
/// key and how far along the segment it is. Clamps outside the keys.
fn segment(keys: &[f32], fraction: f32) -> Option<(usize, f32)> {
    let last = keys.len().checked_sub(1)?;
    if fraction <= keys[0] {
        return Some((0, 0.0));
    }
    if fraction >= keys[last] {
        return Some((last, 0.0));
    }
    let i = keys.windows(2).position(|w| fraction >= w[0] && fraction < w[1])?;
    let span = keys[i + 1] - keys[i];
    let t = if span > 0.0 { (fraction - keys[i]) / span } else { 0.0 };
    Some((i, t))
}

pub struct ScalarInterpolator {
    key: EventEmitter,
    key_value: EventEmitter,
    value_changed: EventEmitter,
}

impl Default for ScalarInterpolator {
    fn default() -> Self {
        Self {
            key: exposed(Vec::<f32>::new()),
            key_value: exposed(Vec::<f32>::new()),
            value_changed: exposed(0.0f32),
        }
    }
}

impl ScalarInterpolator {
    fn set_fraction(&mut self, value: &FieldValue, _timestamp: f64, _ctx: &mut NodeContext) -> Result<(), NodeError> {
        let fraction = value.as_f32().unwrap_or_default();
        let keys = self.key.value().as_f32_slice().unwrap_or_default();
        let values = self.key_value.value().as_f32_slice().unwrap_or_default();
        let Some((i, t)) = segment(keys, fraction) else {
            return Ok(());
        };
        let interpolated = match (values.get(i), values.get(i + 1)) {
            (Some(a), Some(b)) if t > 0.0 => a + (b - a) * t,
            (Some(a), _) => *a,
            _ => return Ok(()),
        };
        emit(&mut self.value_changed, interpolated);
        Ok(())
    }
}

impl NodeImpl for ScalarInterpolator {
    const TYPE_ID: &'static str = "ScalarInterpolator";

    fn build_table(table: &mut FieldDispatchTable<Self>) -> Result<(), InterfaceError> {
        table.add_event_in(FieldType::SFFloat, "set_fraction", Self::set_fraction)?;
        table.add_exposed_field(FieldType::MFFloat, "key", |n| &n.key, |n| &mut n.key)?;
        table.add_exposed_field(FieldType::MFFloat, "keyValue", |n| &n.key_value, |n| &mut n.key_value)?;
        table.add_event_out(FieldType::SFFloat, "value_changed", |n| &n.value_changed, |n| &mut n.value_changed)?;
        Ok(())
    }
}

pub struct PositionInterpolator {
    key: EventEmitter,
    key_value: EventEmitter,
    value_changed: EventEmitter,
}

impl Default for PositionInterpolator {
    fn default() -> Self {
        Self {
            key: exposed(Vec::<f32>::new()),
            key_value: exposed(Vec::<Vec3f>::new()),
            value_changed: exposed(Vec3f::ZERO),
        }
    }
}

impl PositionInterpolator {
    fn set_fraction(&mut self, value: &FieldValue, _timestamp: f64, _ctx: &mut NodeContext) -> Result<(), NodeError> {
        let fraction = value.as_f32().unwrap_or_default();
        let keys = self.key.value().as_f32_slice().unwrap_or_default();
        let values = self.key_value.value().as_vec3f_slice().unwrap_or_default();
        let Some((i, t)) = segment(keys, fraction) else {
            return Ok(());
        };
        let interpolated = match (values.get(i), values.get(i + 1)) {
            (Some(a), Some(b)) if t > 0.0 => a.lerp(*b, t),
            (Some(a), _) => *a,
            _ => return Ok(()),
        };
        emit(&mut self.value_changed, interpolated);
        Ok(())
    }
}

impl NodeImpl for PositionInterpolator {
    const TYPE_ID: &'static str = "PositionInterpolator";

    fn build_table(table: &mut FieldDispatchTable<Self>) -> Result<(), InterfaceError> {
        table.add_event_in(FieldType::SFFloat, "set_fraction", Self::set_fraction)?;
        table.add_exposed_field(FieldType::MFFloat, "key", |n| &n.key, |n| &mut n.key)?;
        table.add_exposed_field(FieldType::MFVec3f, "keyValue", |n| &n.key_value, |n| &mut n.key_value)?;
        table.add_event_out(FieldType::SFVec3f, "value_changed", |n| &n.value_changed, |n| &mut n.value_changed)?;
        Ok(())
    }
}
