// JSON interchange, used by script engines that speak JSON to their runtime.

use crate::{Color, FieldError, FieldType, FieldValue, Image, Rotation, Vec2f, Vec3f};
use serde_json::{Number as JsonNumber, Value as JsonValue, json};
use vrml_ids::NodeID;

impl FieldValue {
    pub fn to_json_value(&self) -> JsonValue {
        match self {
            FieldValue::SFBool(v) => JsonValue::Bool(*v),
            FieldValue::SFColor(v) => color_to_json(v),
            FieldValue::SFFloat(v) => float_to_json(*v as f64),
            FieldValue::SFImage(v) => image_to_json(v),
            FieldValue::SFInt32(v) => JsonValue::Number(JsonNumber::from(*v)),
            FieldValue::SFNode(v) => node_to_json(*v),
            FieldValue::SFRotation(v) => rotation_to_json(v),
            FieldValue::SFString(v) => JsonValue::String(v.clone()),
            FieldValue::SFTime(v) => float_to_json(*v),
            FieldValue::SFVec2f(v) => vec2f_to_json(v),
            FieldValue::SFVec3f(v) => vec3f_to_json(v),
            FieldValue::MFBool(v) => JsonValue::Array(v.iter().map(|b| JsonValue::Bool(*b)).collect()),
            FieldValue::MFColor(v) => JsonValue::Array(v.iter().map(color_to_json).collect()),
            FieldValue::MFFloat(v) => {
                JsonValue::Array(v.iter().map(|x| float_to_json(*x as f64)).collect())
            }
            FieldValue::MFImage(v) => JsonValue::Array(v.iter().map(image_to_json).collect()),
            FieldValue::MFInt32(v) => JsonValue::Array(
                v.iter()
                    .map(|x| JsonValue::Number(JsonNumber::from(*x)))
                    .collect(),
            ),
            FieldValue::MFNode(v) => {
                JsonValue::Array(v.iter().map(|id| node_to_json(Some(*id))).collect())
            }
            FieldValue::MFRotation(v) => {
                JsonValue::Array(v.iter().map(rotation_to_json).collect())
            }
            FieldValue::MFString(v) => {
                JsonValue::Array(v.iter().cloned().map(JsonValue::String).collect())
            }
            FieldValue::MFTime(v) => JsonValue::Array(v.iter().map(|t| float_to_json(*t)).collect()),
            FieldValue::MFVec2f(v) => JsonValue::Array(v.iter().map(vec2f_to_json).collect()),
            FieldValue::MFVec3f(v) => JsonValue::Array(v.iter().map(vec3f_to_json).collect()),
        }
    }

    /// Decode a JSON value produced by `to_json_value` (or hand-written to the
    /// same shape) as a value of `field_type`.
    pub fn from_json_value(field_type: FieldType, value: &JsonValue) -> Result<FieldValue, FieldError> {
        let err = |message: &str| FieldError::Parse {
            field_type,
            message: message.to_string(),
        };

        if field_type.is_multi() {
            let items = value.as_array().ok_or_else(|| err("expected an array"))?;
            let element = field_type.element_type();
            let mut out = field_type.default_value();
            for item in items {
                let single = FieldValue::from_json_value(element, item)?;
                push_element(&mut out, single);
            }
            return Ok(out);
        }

        let f = |key: &str| -> Result<f32, FieldError> {
            value
                .get(key)
                .and_then(JsonValue::as_f64)
                .map(|v| v as f32)
                .ok_or_else(|| err(&format!("missing number \"{key}\"")))
        };

        Ok(match field_type {
            FieldType::SFBool => FieldValue::SFBool(value.as_bool().ok_or_else(|| err("expected a boolean"))?),
            FieldType::SFColor => FieldValue::SFColor(Color::new(f("r")?, f("g")?, f("b")?)),
            FieldType::SFFloat => FieldValue::SFFloat(
                value.as_f64().ok_or_else(|| err("expected a number"))? as f32,
            ),
            FieldType::SFImage => {
                let image: Image = serde_json::from_value(value.clone())
                    .map_err(|e| err(&e.to_string()))?;
                FieldValue::SFImage(image)
            }
            FieldType::SFInt32 => FieldValue::SFInt32(
                value
                    .as_i64()
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or_else(|| err("expected a 32-bit integer"))?,
            ),
            FieldType::SFNode => match value {
                JsonValue::Null => FieldValue::SFNode(None),
                JsonValue::String(s) => FieldValue::SFNode(Some(
                    s.parse::<NodeID>().map_err(|e| err(&e.to_string()))?,
                )),
                _ => return Err(err("expected null or a node handle string")),
            },
            FieldType::SFRotation => {
                FieldValue::SFRotation(Rotation::new(f("x")?, f("y")?, f("z")?, f("angle")?))
            }
            FieldType::SFString => FieldValue::SFString(
                value
                    .as_str()
                    .ok_or_else(|| err("expected a string"))?
                    .to_string(),
            ),
            FieldType::SFTime => {
                FieldValue::SFTime(value.as_f64().ok_or_else(|| err("expected a number"))?)
            }
            FieldType::SFVec2f => FieldValue::SFVec2f(Vec2f::new(f("x")?, f("y")?)),
            FieldType::SFVec3f => FieldValue::SFVec3f(Vec3f::new(f("x")?, f("y")?, f("z")?)),
            multi => return Err(err(&format!("{multi} is not single-valued"))),
        })
    }
}

fn push_element(list: &mut FieldValue, single: FieldValue) {
    match (list, single) {
        (FieldValue::MFBool(v), FieldValue::SFBool(x)) => v.push(x),
        (FieldValue::MFColor(v), FieldValue::SFColor(x)) => v.push(x),
        (FieldValue::MFFloat(v), FieldValue::SFFloat(x)) => v.push(x),
        (FieldValue::MFImage(v), FieldValue::SFImage(x)) => v.push(x),
        (FieldValue::MFInt32(v), FieldValue::SFInt32(x)) => v.push(x),
        (FieldValue::MFNode(v), FieldValue::SFNode(x)) => v.extend(x),
        (FieldValue::MFRotation(v), FieldValue::SFRotation(x)) => v.push(x),
        (FieldValue::MFString(v), FieldValue::SFString(x)) => v.push(x),
        (FieldValue::MFTime(v), FieldValue::SFTime(x)) => v.push(x),
        (FieldValue::MFVec2f(v), FieldValue::SFVec2f(x)) => v.push(x),
        (FieldValue::MFVec3f(v), FieldValue::SFVec3f(x)) => v.push(x),
        _ => {}
    }
}

fn float_to_json(value: f64) -> JsonValue {
    match JsonNumber::from_f64(value) {
        Some(v) => JsonValue::Number(v),
        None => JsonValue::Null,
    }
}

fn node_to_json(id: Option<NodeID>) -> JsonValue {
    match id {
        Some(id) => JsonValue::String(id.to_string()),
        None => JsonValue::Null,
    }
}

fn color_to_json(v: &Color) -> JsonValue {
    json!({ "r": float_to_json(v.r as f64), "g": float_to_json(v.g as f64), "b": float_to_json(v.b as f64) })
}

fn vec2f_to_json(v: &Vec2f) -> JsonValue {
    json!({ "x": float_to_json(v.x as f64), "y": float_to_json(v.y as f64) })
}

fn vec3f_to_json(v: &Vec3f) -> JsonValue {
    json!({
        "x": float_to_json(v.x as f64),
        "y": float_to_json(v.y as f64),
        "z": float_to_json(v.z as f64),
    })
}

fn rotation_to_json(v: &Rotation) -> JsonValue {
    json!({
        "x": float_to_json(v.x as f64),
        "y": float_to_json(v.y as f64),
        "z": float_to_json(v.z as f64),
        "angle": float_to_json(v.angle as f64),
    })
}

fn image_to_json(v: &Image) -> JsonValue {
    serde_json::to_value(v).unwrap_or(JsonValue::Null)
}
