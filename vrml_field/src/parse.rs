//! VRML97 text encoding of field values (the part a field's value takes in a
//! scene file, without the field name).

use crate::{Color, FieldError, FieldType, FieldValue, Image, Rotation, Vec2f, Vec3f};
use vrml_ids::NodeID;

struct Tokens {
    items: Vec<String>,
    pos: usize,
    field_type: FieldType,
}

impl Tokens {
    fn new(text: &str, field_type: FieldType) -> Result<Self, FieldError> {
        let mut items = Vec::new();
        let mut chars = text.chars().peekable();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == ',' || c == '[' || c == ']' {
                chars.next();
            } else if c == '#' {
                // `#` starts a comment unless it prefixes a node handle
                chars.next();
                if chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                    continue;
                }
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            } else if c == '"' {
                chars.next();
                let mut s = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                s.push(escaped);
                            }
                        }
                        '"' => {
                            closed = true;
                            break;
                        }
                        other => s.push(other),
                    }
                }
                if !closed {
                    return Err(FieldError::Parse {
                        field_type,
                        message: "unterminated string".to_string(),
                    });
                }
                items.push(format!("\"{s}"));
            } else {
                let mut s = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == ',' || c == '[' || c == ']' || c == '"' {
                        break;
                    }
                    s.push(c);
                    chars.next();
                }
                items.push(s);
            }
        }
        Ok(Self {
            items,
            pos: 0,
            field_type,
        })
    }

    fn is_done(&self) -> bool {
        self.pos >= self.items.len()
    }

    fn error(&self, message: impl Into<String>) -> FieldError {
        FieldError::Parse {
            field_type: self.field_type,
            message: message.into(),
        }
    }

    fn next(&mut self) -> Result<&str, FieldError> {
        let token = self
            .items
            .get(self.pos)
            .ok_or_else(|| FieldError::Parse {
                field_type: self.field_type,
                message: "unexpected end of value".to_string(),
            })?;
        self.pos += 1;
        Ok(token.as_str())
    }

    fn float(&mut self) -> Result<f32, FieldError> {
        let token = self.next()?.to_string();
        token
            .parse::<f32>()
            .map_err(|e| self.error(format!("\"{token}\": {e}")))
    }

    fn double(&mut self) -> Result<f64, FieldError> {
        let token = self.next()?.to_string();
        token
            .parse::<f64>()
            .map_err(|e| self.error(format!("\"{token}\": {e}")))
    }

    fn int(&mut self) -> Result<i32, FieldError> {
        let token = self.next()?.to_string();
        let parsed = match token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
        {
            Some(hex) => u32::from_str_radix(hex, 16).map(|v| v as i32),
            None => token.parse::<i32>(),
        };
        parsed.map_err(|e| self.error(format!("\"{token}\": {e}")))
    }

    fn boolean(&mut self) -> Result<bool, FieldError> {
        match self.next()? {
            "TRUE" => Ok(true),
            "FALSE" => Ok(false),
            other => {
                let message = format!("expected TRUE or FALSE, found \"{other}\"");
                Err(self.error(message))
            }
        }
    }

    fn string(&mut self) -> Result<String, FieldError> {
        let token = self.next()?;
        match token.strip_prefix('"') {
            Some(s) => Ok(s.to_string()),
            None => {
                let message = format!("expected a quoted string, found \"{token}\"");
                Err(self.error(message))
            }
        }
    }

    fn node(&mut self) -> Result<Option<NodeID>, FieldError> {
        let token = self.next()?.to_string();
        if token == "NULL" {
            return Ok(None);
        }
        token
            .parse::<NodeID>()
            .map(Some)
            .map_err(|e| self.error(e.to_string()))
    }

    fn color(&mut self) -> Result<Color, FieldError> {
        Ok(Color::new(self.float()?, self.float()?, self.float()?))
    }

    fn vec2f(&mut self) -> Result<Vec2f, FieldError> {
        Ok(Vec2f::new(self.float()?, self.float()?))
    }

    fn vec3f(&mut self) -> Result<Vec3f, FieldError> {
        Ok(Vec3f::new(self.float()?, self.float()?, self.float()?))
    }

    fn rotation(&mut self) -> Result<Rotation, FieldError> {
        Ok(Rotation::new(
            self.float()?,
            self.float()?,
            self.float()?,
            self.float()?,
        ))
    }

    fn image(&mut self) -> Result<Image, FieldError> {
        let width = self.int()?;
        let height = self.int()?;
        let components = self.int()?;
        if width < 0 || height < 0 || !(0..=4).contains(&components) {
            return Err(self.error("invalid image dimensions"));
        }
        let mut pixels = Vec::with_capacity((width * height * components) as usize);
        for _ in 0..(width * height) {
            let packed = self.int()? as u32;
            for shift in (0..components).rev() {
                pixels.push((packed >> (shift * 8)) as u8);
            }
        }
        Image::new(width as u32, height as u32, components as u8, pixels)
            .ok_or_else(|| self.error("pixel count does not match dimensions"))
    }

    fn list<T>(
        &mut self,
        mut element: impl FnMut(&mut Self) -> Result<T, FieldError>,
    ) -> Result<Vec<T>, FieldError> {
        let mut values = Vec::new();
        while !self.is_done() {
            values.push(element(self)?);
        }
        Ok(values)
    }
}

impl FieldValue {
    /// Parse the VRML97 text form of a value of `field_type`. List brackets and
    /// commas are optional.
    pub fn parse(field_type: FieldType, text: &str) -> Result<FieldValue, FieldError> {
        let mut t = Tokens::new(text, field_type)?;
        let value = match field_type {
            FieldType::SFBool => FieldValue::SFBool(t.boolean()?),
            FieldType::SFColor => FieldValue::SFColor(t.color()?),
            FieldType::SFFloat => FieldValue::SFFloat(t.float()?),
            FieldType::SFImage => FieldValue::SFImage(t.image()?),
            FieldType::SFInt32 => FieldValue::SFInt32(t.int()?),
            FieldType::SFNode => FieldValue::SFNode(t.node()?),
            FieldType::SFRotation => FieldValue::SFRotation(t.rotation()?),
            FieldType::SFString => FieldValue::SFString(t.string()?),
            FieldType::SFTime => FieldValue::SFTime(t.double()?),
            FieldType::SFVec2f => FieldValue::SFVec2f(t.vec2f()?),
            FieldType::SFVec3f => FieldValue::SFVec3f(t.vec3f()?),
            FieldType::MFBool => FieldValue::MFBool(t.list(Tokens::boolean)?),
            FieldType::MFColor => FieldValue::MFColor(t.list(Tokens::color)?),
            FieldType::MFFloat => FieldValue::MFFloat(t.list(Tokens::float)?),
            FieldType::MFImage => FieldValue::MFImage(t.list(Tokens::image)?),
            FieldType::MFInt32 => FieldValue::MFInt32(t.list(Tokens::int)?),
            FieldType::MFNode => {
                FieldValue::MFNode(t.list(Tokens::node)?.into_iter().flatten().collect())
            }
            FieldType::MFRotation => FieldValue::MFRotation(t.list(Tokens::rotation)?),
            FieldType::MFString => FieldValue::MFString(t.list(Tokens::string)?),
            FieldType::MFTime => FieldValue::MFTime(t.list(Tokens::double)?),
            FieldType::MFVec2f => FieldValue::MFVec2f(t.list(Tokens::vec2f)?),
            FieldType::MFVec3f => FieldValue::MFVec3f(t.list(Tokens::vec3f)?),
        };
        if !t.is_done() {
            return Err(t.error("trailing tokens after value"));
        }
        Ok(value)
    }
}
