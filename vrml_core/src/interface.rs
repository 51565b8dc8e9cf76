use crate::InterfaceError;
use std::fmt;
use std::str::FromStr;
use vrml_field::FieldType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InterfaceKind {
    EventIn,
    EventOut,
    ExposedField,
    Field,
}

impl InterfaceKind {
    pub const fn name(self) -> &'static str {
        match self {
            InterfaceKind::EventIn => "eventIn",
            InterfaceKind::EventOut => "eventOut",
            InterfaceKind::ExposedField => "exposedField",
            InterfaceKind::Field => "field",
        }
    }
}

impl fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InterfaceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eventIn" | "inputOnly" => Ok(InterfaceKind::EventIn),
            "eventOut" | "outputOnly" => Ok(InterfaceKind::EventOut),
            "exposedField" | "inputOutput" => Ok(InterfaceKind::ExposedField),
            "field" | "initializeOnly" => Ok(InterfaceKind::Field),
            other => Err(format!("unknown interface kind \"{other}\"")),
        }
    }
}

/// Strip one `set_` prefix or `_changed` suffix. Interfaces whose names fold
/// to the same key sort next to each other in an `InterfaceSet`.
pub fn fold_id(id: &str) -> &str {
    id.strip_prefix("set_")
        .or_else(|| id.strip_suffix("_changed"))
        .unwrap_or(id)
}

/// One declared field or event of a node type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Interface {
    pub kind: InterfaceKind,
    pub field_type: FieldType,
    pub id: String,
}

impl Interface {
    pub fn new(kind: InterfaceKind, field_type: FieldType, id: impl Into<String>) -> Self {
        Self {
            kind,
            field_type,
            id: id.into(),
        }
    }

    pub fn field(field_type: FieldType, id: impl Into<String>) -> Self {
        Self::new(InterfaceKind::Field, field_type, id)
    }

    pub fn event_in(field_type: FieldType, id: impl Into<String>) -> Self {
        Self::new(InterfaceKind::EventIn, field_type, id)
    }

    pub fn event_out(field_type: FieldType, id: impl Into<String>) -> Self {
        Self::new(InterfaceKind::EventOut, field_type, id)
    }

    pub fn exposed_field(field_type: FieldType, id: impl Into<String>) -> Self {
        Self::new(InterfaceKind::ExposedField, field_type, id)
    }

    pub fn folded_id(&self) -> &str {
        fold_id(&self.id)
    }

    /// Whether a lookup of `id` as an interface of `kind` resolves to this one.
    ///
    /// An exposedField `X` answers to `X` and `set_X` as an eventIn, and to
    /// `X` and `X_changed` as an eventOut. An eventIn declared as `set_X`
    /// also answers to `X`, and an eventOut declared as `X_changed` to `X`.
    pub fn matches(&self, id: &str, kind: InterfaceKind) -> bool {
        match kind {
            InterfaceKind::EventIn => match self.kind {
                InterfaceKind::EventIn => {
                    self.id == id || self.id.strip_prefix("set_") == Some(id)
                }
                InterfaceKind::ExposedField => {
                    self.id == id || id.strip_prefix("set_") == Some(self.id.as_str())
                }
                _ => false,
            },
            InterfaceKind::EventOut => match self.kind {
                InterfaceKind::EventOut => {
                    self.id == id || self.id.strip_suffix("_changed") == Some(id)
                }
                InterfaceKind::ExposedField => {
                    self.id == id || id.strip_suffix("_changed") == Some(self.id.as_str())
                }
                _ => false,
            },
            InterfaceKind::ExposedField => self.kind == InterfaceKind::ExposedField && self.id == id,
            InterfaceKind::Field => {
                matches!(self.kind, InterfaceKind::Field | InterfaceKind::ExposedField)
                    && self.id == id
            }
        }
    }

    /// Every name this interface can be addressed by.
    pub fn names(&self) -> Vec<String> {
        match self.kind {
            InterfaceKind::ExposedField => vec![
                self.id.clone(),
                format!("set_{}", self.id),
                format!("{}_changed", self.id),
            ],
            _ => vec![self.id.clone()],
        }
    }

    pub fn conflicts_with(&self, other: &Interface) -> bool {
        let names = self.names();
        other.names().iter().any(|n| names.contains(n))
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind, self.field_type, self.id)
    }
}

/// Interfaces of a node type, kept sorted by folded name so that lookups by
/// any synonym land in the same neighbourhood. Usable as a map key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct InterfaceSet {
    interfaces: Vec<Interface>,
}

impl InterfaceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_interfaces(
        interfaces: impl IntoIterator<Item = Interface>,
    ) -> Result<Self, InterfaceError> {
        let mut set = Self::new();
        for interface in interfaces {
            set.add(interface)?;
        }
        Ok(set)
    }

    /// Fails if any name the new interface answers to is already taken.
    pub fn add(&mut self, interface: Interface) -> Result<(), InterfaceError> {
        if self.interfaces.iter().any(|i| i.conflicts_with(&interface)) {
            return Err(InterfaceError::Duplicate(interface.id));
        }
        let key = (interface.folded_id(), interface.id.as_str());
        let at = self
            .interfaces
            .partition_point(|entry| (entry.folded_id(), entry.id.as_str()) < key);
        self.interfaces.insert(at, interface);
        Ok(())
    }

    fn candidates(&self, id: &str) -> &[Interface] {
        let key = fold_id(id);
        let start = self.interfaces.partition_point(|entry| entry.folded_id() < key);
        let len = self.interfaces[start..]
            .iter()
            .take_while(|entry| entry.folded_id() == key)
            .count();
        &self.interfaces[start..start + len]
    }

    fn find_kind(&self, id: &str, kind: InterfaceKind) -> Option<&Interface> {
        self.candidates(id).iter().find(|i| i.matches(id, kind))
    }

    pub fn find_event_in(&self, id: &str) -> Option<&Interface> {
        self.find_kind(id, InterfaceKind::EventIn)
    }

    pub fn find_event_out(&self, id: &str) -> Option<&Interface> {
        self.find_kind(id, InterfaceKind::EventOut)
    }

    pub fn find_field(&self, id: &str) -> Option<&Interface> {
        self.find_kind(id, InterfaceKind::Field)
    }

    pub fn find_exposed_field(&self, id: &str) -> Option<&Interface> {
        self.find_kind(id, InterfaceKind::ExposedField)
    }

    /// First interface of any kind answering to `id`.
    pub fn find(&self, id: &str) -> Option<&Interface> {
        self.candidates(id).iter().find(|i| {
            i.id == id
                || i.matches(id, InterfaceKind::EventIn)
                || i.matches(id, InterfaceKind::EventOut)
        })
    }

    pub fn contains(&self, interface: &Interface) -> bool {
        self.candidates(&interface.id).iter().any(|i| i == interface)
    }

    pub fn is_subset_of(&self, other: &InterfaceSet) -> bool {
        self.iter().all(|i| other.contains(i))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Interface> {
        self.interfaces.iter()
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}

impl<'a> IntoIterator for &'a InterfaceSet {
    type Item = &'a Interface;
    type IntoIter = std::slice::Iter<'a, Interface>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
