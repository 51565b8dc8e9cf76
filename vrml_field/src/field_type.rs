use crate::{Color, FieldError, FieldValue, Image, Rotation, Vec2f, Vec3f};
use std::fmt;
use std::str::FromStr;

/// Stable type tag for every `FieldValue` variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldType {
    SFBool,
    SFColor,
    SFFloat,
    SFImage,
    SFInt32,
    SFNode,
    SFRotation,
    SFString,
    SFTime,
    SFVec2f,
    SFVec3f,

    MFBool,
    MFColor,
    MFFloat,
    MFImage,
    MFInt32,
    MFNode,
    MFRotation,
    MFString,
    MFTime,
    MFVec2f,
    MFVec3f,
}

impl FieldType {
    pub const ALL: [FieldType; 22] = [
        FieldType::SFBool,
        FieldType::SFColor,
        FieldType::SFFloat,
        FieldType::SFImage,
        FieldType::SFInt32,
        FieldType::SFNode,
        FieldType::SFRotation,
        FieldType::SFString,
        FieldType::SFTime,
        FieldType::SFVec2f,
        FieldType::SFVec3f,
        FieldType::MFBool,
        FieldType::MFColor,
        FieldType::MFFloat,
        FieldType::MFImage,
        FieldType::MFInt32,
        FieldType::MFNode,
        FieldType::MFRotation,
        FieldType::MFString,
        FieldType::MFTime,
        FieldType::MFVec2f,
        FieldType::MFVec3f,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            FieldType::SFBool => "SFBool",
            FieldType::SFColor => "SFColor",
            FieldType::SFFloat => "SFFloat",
            FieldType::SFImage => "SFImage",
            FieldType::SFInt32 => "SFInt32",
            FieldType::SFNode => "SFNode",
            FieldType::SFRotation => "SFRotation",
            FieldType::SFString => "SFString",
            FieldType::SFTime => "SFTime",
            FieldType::SFVec2f => "SFVec2f",
            FieldType::SFVec3f => "SFVec3f",
            FieldType::MFBool => "MFBool",
            FieldType::MFColor => "MFColor",
            FieldType::MFFloat => "MFFloat",
            FieldType::MFImage => "MFImage",
            FieldType::MFInt32 => "MFInt32",
            FieldType::MFNode => "MFNode",
            FieldType::MFRotation => "MFRotation",
            FieldType::MFString => "MFString",
            FieldType::MFTime => "MFTime",
            FieldType::MFVec2f => "MFVec2f",
            FieldType::MFVec3f => "MFVec3f",
        }
    }

    #[inline]
    pub const fn is_multi(self) -> bool {
        matches!(
            self,
            FieldType::MFBool
                | FieldType::MFColor
                | FieldType::MFFloat
                | FieldType::MFImage
                | FieldType::MFInt32
                | FieldType::MFNode
                | FieldType::MFRotation
                | FieldType::MFString
                | FieldType::MFTime
                | FieldType::MFVec2f
                | FieldType::MFVec3f
        )
    }

    #[inline]
    pub const fn is_node(self) -> bool {
        matches!(self, FieldType::SFNode | FieldType::MFNode)
    }

    /// Single-valued type held by each element of a multi-valued type.
    pub const fn element_type(self) -> FieldType {
        match self {
            FieldType::MFBool => FieldType::SFBool,
            FieldType::MFColor => FieldType::SFColor,
            FieldType::MFFloat => FieldType::SFFloat,
            FieldType::MFImage => FieldType::SFImage,
            FieldType::MFInt32 => FieldType::SFInt32,
            FieldType::MFNode => FieldType::SFNode,
            FieldType::MFRotation => FieldType::SFRotation,
            FieldType::MFString => FieldType::SFString,
            FieldType::MFTime => FieldType::SFTime,
            FieldType::MFVec2f => FieldType::SFVec2f,
            FieldType::MFVec3f => FieldType::SFVec3f,
            single => single,
        }
    }

    /// VRML97 default for a field of this type.
    pub fn default_value(self) -> FieldValue {
        match self {
            FieldType::SFBool => FieldValue::SFBool(false),
            FieldType::SFColor => FieldValue::SFColor(Color::BLACK),
            FieldType::SFFloat => FieldValue::SFFloat(0.0),
            FieldType::SFImage => FieldValue::SFImage(Image::default()),
            FieldType::SFInt32 => FieldValue::SFInt32(0),
            FieldType::SFNode => FieldValue::SFNode(None),
            FieldType::SFRotation => FieldValue::SFRotation(Rotation::IDENTITY),
            FieldType::SFString => FieldValue::SFString(String::new()),
            FieldType::SFTime => FieldValue::SFTime(0.0),
            FieldType::SFVec2f => FieldValue::SFVec2f(Vec2f::default()),
            FieldType::SFVec3f => FieldValue::SFVec3f(Vec3f::ZERO),
            FieldType::MFBool => FieldValue::MFBool(Vec::new()),
            FieldType::MFColor => FieldValue::MFColor(Vec::new()),
            FieldType::MFFloat => FieldValue::MFFloat(Vec::new()),
            FieldType::MFImage => FieldValue::MFImage(Vec::new()),
            FieldType::MFInt32 => FieldValue::MFInt32(Vec::new()),
            FieldType::MFNode => FieldValue::MFNode(Vec::new()),
            FieldType::MFRotation => FieldValue::MFRotation(Vec::new()),
            FieldType::MFString => FieldValue::MFString(Vec::new()),
            FieldType::MFTime => FieldValue::MFTime(Vec::new()),
            FieldType::MFVec2f => FieldValue::MFVec2f(Vec::new()),
            FieldType::MFVec3f => FieldValue::MFVec3f(Vec::new()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FieldType {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldType::ALL
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| FieldError::UnknownType(s.to_string()))
    }
}
