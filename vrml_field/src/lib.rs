#![forbid(unsafe_code)]

pub mod error;
pub mod field_type;
pub mod field_value;
pub mod json;
pub mod parse;
pub mod values;

pub use error::*;
pub use field_type::*;
pub use field_value::*;
pub use values::*;
