use crate::{Color, FieldError, FieldType, Image, Rotation, Vec2f, Vec3f};
use std::fmt;
use vrml_ids::NodeID;

/// A typed field or event value. Node references are arena handles, never owners.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    SFBool(bool),
    SFColor(Color),
    SFFloat(f32),
    SFImage(Image),
    SFInt32(i32),
    SFNode(Option<NodeID>),
    SFRotation(Rotation),
    SFString(String),
    SFTime(f64),
    SFVec2f(Vec2f),
    SFVec3f(Vec3f),

    MFBool(Vec<bool>),
    MFColor(Vec<Color>),
    MFFloat(Vec<f32>),
    MFImage(Vec<Image>),
    MFInt32(Vec<i32>),
    MFNode(Vec<NodeID>),
    MFRotation(Vec<Rotation>),
    MFString(Vec<String>),
    MFTime(Vec<f64>),
    MFVec2f(Vec<Vec2f>),
    MFVec3f(Vec<Vec3f>),
}

impl FieldValue {
    pub const fn field_type(&self) -> FieldType {
        match self {
            FieldValue::SFBool(_) => FieldType::SFBool,
            FieldValue::SFColor(_) => FieldType::SFColor,
            FieldValue::SFFloat(_) => FieldType::SFFloat,
            FieldValue::SFImage(_) => FieldType::SFImage,
            FieldValue::SFInt32(_) => FieldType::SFInt32,
            FieldValue::SFNode(_) => FieldType::SFNode,
            FieldValue::SFRotation(_) => FieldType::SFRotation,
            FieldValue::SFString(_) => FieldType::SFString,
            FieldValue::SFTime(_) => FieldType::SFTime,
            FieldValue::SFVec2f(_) => FieldType::SFVec2f,
            FieldValue::SFVec3f(_) => FieldType::SFVec3f,
            FieldValue::MFBool(_) => FieldType::MFBool,
            FieldValue::MFColor(_) => FieldType::MFColor,
            FieldValue::MFFloat(_) => FieldType::MFFloat,
            FieldValue::MFImage(_) => FieldType::MFImage,
            FieldValue::MFInt32(_) => FieldType::MFInt32,
            FieldValue::MFNode(_) => FieldType::MFNode,
            FieldValue::MFRotation(_) => FieldType::MFRotation,
            FieldValue::MFString(_) => FieldType::MFString,
            FieldValue::MFTime(_) => FieldType::MFTime,
            FieldValue::MFVec2f(_) => FieldType::MFVec2f,
            FieldValue::MFVec3f(_) => FieldType::MFVec3f,
        }
    }

    /// Replace this value with a copy of `other`. Fails without touching `self`
    /// when the variants differ.
    pub fn assign(&mut self, other: &FieldValue) -> Result<(), FieldError> {
        if self.field_type() != other.field_type() {
            return Err(FieldError::TypeMismatch {
                expected: self.field_type(),
                found: other.field_type(),
            });
        }
        self.clone_from(other);
        Ok(())
    }

    /// Every node handle held by this value, in order.
    pub fn node_refs(&self) -> impl Iterator<Item = NodeID> + '_ {
        let (single, list): (Option<NodeID>, &[NodeID]) = match self {
            FieldValue::SFNode(id) => (*id, &[]),
            FieldValue::MFNode(ids) => (None, ids.as_slice()),
            _ => (None, &[]),
        };
        single.into_iter().chain(list.iter().copied())
    }

    /// Number of elements: 1 for single-valued types.
    pub fn len(&self) -> usize {
        match self {
            FieldValue::MFBool(v) => v.len(),
            FieldValue::MFColor(v) => v.len(),
            FieldValue::MFFloat(v) => v.len(),
            FieldValue::MFImage(v) => v.len(),
            FieldValue::MFInt32(v) => v.len(),
            FieldValue::MFNode(v) => v.len(),
            FieldValue::MFRotation(v) => v.len(),
            FieldValue::MFString(v) => v.len(),
            FieldValue::MFTime(v) => v.len(),
            FieldValue::MFVec2f(v) => v.len(),
            FieldValue::MFVec3f(v) => v.len(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// -------------------- Accessors --------------------

impl FieldValue {
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            FieldValue::SFBool(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_color(&self) -> Option<Color> {
        match *self {
            FieldValue::SFColor(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            FieldValue::SFFloat(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_image(&self) -> Option<&Image> {
        match self {
            FieldValue::SFImage(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            FieldValue::SFInt32(v) => Some(v),
            _ => None,
        }
    }

    /// `Some(None)` is a NULL SFNode; `None` means this is not an SFNode.
    #[inline]
    pub fn as_node(&self) -> Option<Option<NodeID>> {
        match *self {
            FieldValue::SFNode(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_rotation(&self) -> Option<Rotation> {
        match *self {
            FieldValue::SFRotation(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::SFString(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_time(&self) -> Option<f64> {
        match *self {
            FieldValue::SFTime(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_vec2f(&self) -> Option<Vec2f> {
        match *self {
            FieldValue::SFVec2f(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_vec3f(&self) -> Option<Vec3f> {
        match *self {
            FieldValue::SFVec3f(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_f32_slice(&self) -> Option<&[f32]> {
        match self {
            FieldValue::MFFloat(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_nodes(&self) -> Option<&[NodeID]> {
        match self {
            FieldValue::MFNode(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_nodes_mut(&mut self) -> Option<&mut Vec<NodeID>> {
        match self {
            FieldValue::MFNode(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            FieldValue::MFString(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_vec3f_slice(&self) -> Option<&[Vec3f]> {
        match self {
            FieldValue::MFVec3f(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_time_slice(&self) -> Option<&[f64]> {
        match self {
            FieldValue::MFTime(v) => Some(v),
            _ => None,
        }
    }
}

// -------------------- From impls --------------------

impl From<bool> for FieldValue {
    #[inline]
    fn from(v: bool) -> Self {
        FieldValue::SFBool(v)
    }
}
impl From<Color> for FieldValue {
    #[inline]
    fn from(v: Color) -> Self {
        FieldValue::SFColor(v)
    }
}
impl From<f32> for FieldValue {
    #[inline]
    fn from(v: f32) -> Self {
        FieldValue::SFFloat(v)
    }
}
impl From<Image> for FieldValue {
    #[inline]
    fn from(v: Image) -> Self {
        FieldValue::SFImage(v)
    }
}
impl From<i32> for FieldValue {
    #[inline]
    fn from(v: i32) -> Self {
        FieldValue::SFInt32(v)
    }
}
impl From<NodeID> for FieldValue {
    #[inline]
    fn from(v: NodeID) -> Self {
        FieldValue::SFNode((!v.is_nil()).then_some(v))
    }
}
impl From<Rotation> for FieldValue {
    #[inline]
    fn from(v: Rotation) -> Self {
        FieldValue::SFRotation(v)
    }
}
impl From<String> for FieldValue {
    #[inline]
    fn from(v: String) -> Self {
        FieldValue::SFString(v)
    }
}
impl From<&str> for FieldValue {
    #[inline]
    fn from(v: &str) -> Self {
        FieldValue::SFString(v.to_string())
    }
}
impl From<f64> for FieldValue {
    #[inline]
    fn from(v: f64) -> Self {
        FieldValue::SFTime(v)
    }
}
impl From<Vec2f> for FieldValue {
    #[inline]
    fn from(v: Vec2f) -> Self {
        FieldValue::SFVec2f(v)
    }
}
impl From<Vec3f> for FieldValue {
    #[inline]
    fn from(v: Vec3f) -> Self {
        FieldValue::SFVec3f(v)
    }
}

impl From<Vec<bool>> for FieldValue {
    #[inline]
    fn from(v: Vec<bool>) -> Self {
        FieldValue::MFBool(v)
    }
}
impl From<Vec<Color>> for FieldValue {
    #[inline]
    fn from(v: Vec<Color>) -> Self {
        FieldValue::MFColor(v)
    }
}
impl From<Vec<f32>> for FieldValue {
    #[inline]
    fn from(v: Vec<f32>) -> Self {
        FieldValue::MFFloat(v)
    }
}
impl From<Vec<i32>> for FieldValue {
    #[inline]
    fn from(v: Vec<i32>) -> Self {
        FieldValue::MFInt32(v)
    }
}
impl From<Vec<NodeID>> for FieldValue {
    #[inline]
    fn from(v: Vec<NodeID>) -> Self {
        FieldValue::MFNode(v)
    }
}
impl From<Vec<Rotation>> for FieldValue {
    #[inline]
    fn from(v: Vec<Rotation>) -> Self {
        FieldValue::MFRotation(v)
    }
}
impl From<Vec<String>> for FieldValue {
    #[inline]
    fn from(v: Vec<String>) -> Self {
        FieldValue::MFString(v)
    }
}
impl From<Vec<f64>> for FieldValue {
    #[inline]
    fn from(v: Vec<f64>) -> Self {
        FieldValue::MFTime(v)
    }
}
impl From<Vec<Vec2f>> for FieldValue {
    #[inline]
    fn from(v: Vec<Vec2f>) -> Self {
        FieldValue::MFVec2f(v)
    }
}
impl From<Vec<Vec3f>> for FieldValue {
    #[inline]
    fn from(v: Vec<Vec3f>) -> Self {
        FieldValue::MFVec3f(v)
    }
}

// -------------------- Display (VRML97 text encoding) --------------------

fn write_list<T>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
    mut each: impl FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        each(f, item)?;
    }
    write!(f, "]")
}

fn write_bool(f: &mut fmt::Formatter<'_>, v: bool) -> fmt::Result {
    f.write_str(if v { "TRUE" } else { "FALSE" })
}

fn write_node(f: &mut fmt::Formatter<'_>, v: Option<NodeID>) -> fmt::Result {
    match v {
        Some(id) => write!(f, "#{id}"),
        None => f.write_str("NULL"),
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::SFBool(v) => write_bool(f, *v),
            FieldValue::SFColor(v) => write!(f, "{v}"),
            FieldValue::SFFloat(v) => write!(f, "{v}"),
            FieldValue::SFImage(v) => write!(f, "{v}"),
            FieldValue::SFInt32(v) => write!(f, "{v}"),
            FieldValue::SFNode(v) => write_node(f, *v),
            FieldValue::SFRotation(v) => write!(f, "{v}"),
            FieldValue::SFString(v) => write!(f, "{v:?}"),
            FieldValue::SFTime(v) => write!(f, "{v}"),
            FieldValue::SFVec2f(v) => write!(f, "{v}"),
            FieldValue::SFVec3f(v) => write!(f, "{v}"),
            FieldValue::MFBool(v) => write_list(f, v, |f, b| write_bool(f, *b)),
            FieldValue::MFColor(v) => write_list(f, v, |f, c| write!(f, "{c}")),
            FieldValue::MFFloat(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            FieldValue::MFImage(v) => write_list(f, v, |f, i| write!(f, "{i}")),
            FieldValue::MFInt32(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            FieldValue::MFNode(v) => write_list(f, v, |f, id| write_node(f, Some(*id))),
            FieldValue::MFRotation(v) => write_list(f, v, |f, r| write!(f, "{r}")),
            FieldValue::MFString(v) => write_list(f, v, |f, s| write!(f, "{s:?}")),
            FieldValue::MFTime(v) => write_list(f, v, |f, t| write!(f, "{t}")),
            FieldValue::MFVec2f(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            FieldValue::MFVec3f(v) => write_list(f, v, |f, x| write!(f, "{x}")),
        }
    }
}
