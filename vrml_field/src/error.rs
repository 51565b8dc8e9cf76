use crate::FieldType;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("field type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: FieldType, found: FieldType },

    #[error("unknown field type \"{0}\"")]
    UnknownType(String),

    #[error("cannot parse {field_type} value: {message}")]
    Parse {
        field_type: FieldType,
        message: String,
    },
}
