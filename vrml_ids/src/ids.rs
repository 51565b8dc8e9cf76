//! Handles to nodes living in the browser's arena.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A node handle: the arena slot plus the generation the slot had when the
/// node was stored. Slot 0 is never handed out, so `nil` means "no node".
/// Once a node is collected its slot's generation moves on and old handles
/// stop resolving.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeID {
    index: u32,
    generation: u32,
}

impl NodeID {
    pub const fn nil() -> Self {
        Self {
            index: 0,
            generation: 0,
        }
    }

    pub const fn from_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }

    pub const fn is_nil(self) -> bool {
        self.index == 0
    }
}

impl fmt::Debug for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeID({self})")
    }
}

/// `index:generation`, the form node handles take in field text and JSON.
impl fmt::Display for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeIdError {
    #[error("node handle \"{0}\" is not of the form index:generation")]
    Malformed(String),
    #[error("node handle \"{text}\" has a bad {part}")]
    BadNumber { text: String, part: &'static str },
}

impl FromStr for NodeID {
    type Err = NodeIdError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (index, generation) = text
            .split_once(':')
            .ok_or_else(|| NodeIdError::Malformed(text.to_string()))?;
        let number = |digits: &str, part| {
            digits.trim().parse::<u32>().map_err(|_| NodeIdError::BadNumber {
                text: text.to_string(),
                part,
            })
        };
        Ok(Self::from_parts(number(index, "index")?, number(generation, "generation")?))
    }
}
