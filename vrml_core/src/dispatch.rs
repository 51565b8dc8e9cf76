//! Per-class tables mapping interface names to accessors on the concrete
//! node struct. Built once per class and shared by every node of it.

use crate::{EventEmitter, Interface, InterfaceError, InterfaceKind, InterfaceSet, NodeContext, NodeError};
use ahash::AHashMap;
use vrml_field::{FieldType, FieldValue};
use vrml_ids::NodeID;

/// Handler run when an eventIn that is not an exposedField receives a value.
pub type EventInHandler<N> =
    fn(&mut N, &FieldValue, f64, &mut NodeContext) -> Result<(), NodeError>;

pub struct Accessor<N, T> {
    get: fn(&N) -> &T,
    get_mut: fn(&mut N) -> &mut T,
}

impl<N, T> Clone for Accessor<N, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<N, T> Copy for Accessor<N, T> {}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Synonym {
    Base,
    EventIn,
    EventOut,
}

enum Entry<N> {
    Field {
        field_type: FieldType,
        accessor: Accessor<N, FieldValue>,
    },
    EventIn {
        field_type: FieldType,
        handler: EventInHandler<N>,
    },
    EventOut {
        field_type: FieldType,
        accessor: Accessor<N, EventEmitter>,
    },
    Exposed {
        field_type: FieldType,
        base: String,
        synonym: Synonym,
        accessor: Accessor<N, EventEmitter>,
    },
}

/// Result of delivering to an eventIn through the table.
pub enum Delivery {
    /// A handler ran.
    Handled,
    /// An exposedField took the value; it names the field.
    Exposed(String),
}

pub struct FieldDispatchTable<N> {
    type_id: &'static str,
    interfaces: InterfaceSet,
    entries: AHashMap<String, Entry<N>>,
    /// Canonical names of everything that can emit.
    emitters: Vec<String>,
    /// Fields and exposedFields holding node references.
    node_fields: Vec<String>,
}

impl<N> FieldDispatchTable<N> {
    pub fn new(type_id: &'static str) -> Self {
        Self {
            type_id,
            interfaces: InterfaceSet::new(),
            entries: AHashMap::new(),
            emitters: Vec::new(),
            node_fields: Vec::new(),
        }
    }

    pub fn type_id(&self) -> &'static str {
        self.type_id
    }

    pub fn interfaces(&self) -> &InterfaceSet {
        &self.interfaces
    }

    pub fn emitter_ids(&self) -> &[String] {
        &self.emitters
    }

    pub fn node_field_ids(&self) -> &[String] {
        &self.node_fields
    }

    pub fn add_field(
        &mut self,
        field_type: FieldType,
        id: &str,
        get: fn(&N) -> &FieldValue,
        get_mut: fn(&mut N) -> &mut FieldValue,
    ) -> Result<(), InterfaceError> {
        self.interfaces.add(Interface::field(field_type, id))?;
        if field_type.is_node() {
            self.node_fields.push(id.to_string());
        }
        self.entries.insert(
            id.to_string(),
            Entry::Field {
                field_type,
                accessor: Accessor { get, get_mut },
            },
        );
        Ok(())
    }

    pub fn add_event_in(
        &mut self,
        field_type: FieldType,
        id: &str,
        handler: EventInHandler<N>,
    ) -> Result<(), InterfaceError> {
        self.interfaces.add(Interface::event_in(field_type, id))?;
        self.entries
            .insert(id.to_string(), Entry::EventIn { field_type, handler });
        Ok(())
    }

    pub fn add_event_out(
        &mut self,
        field_type: FieldType,
        id: &str,
        get: fn(&N) -> &EventEmitter,
        get_mut: fn(&mut N) -> &mut EventEmitter,
    ) -> Result<(), InterfaceError> {
        self.interfaces.add(Interface::event_out(field_type, id))?;
        self.emitters.push(id.to_string());
        self.entries.insert(
            id.to_string(),
            Entry::EventOut {
                field_type,
                accessor: Accessor { get, get_mut },
            },
        );
        Ok(())
    }

    /// Registers `id`, `set_<id>` and `<id>_changed`, all backed by the
    /// same emitter.
    pub fn add_exposed_field(
        &mut self,
        field_type: FieldType,
        id: &str,
        get: fn(&N) -> &EventEmitter,
        get_mut: fn(&mut N) -> &mut EventEmitter,
    ) -> Result<(), InterfaceError> {
        self.interfaces.add(Interface::exposed_field(field_type, id))?;
        self.emitters.push(id.to_string());
        if field_type.is_node() {
            self.node_fields.push(id.to_string());
        }
        let accessor = Accessor { get, get_mut };
        for (name, synonym) in [
            (id.to_string(), Synonym::Base),
            (format!("set_{id}"), Synonym::EventIn),
            (format!("{id}_changed"), Synonym::EventOut),
        ] {
            self.entries.insert(
                name,
                Entry::Exposed {
                    field_type,
                    base: id.to_string(),
                    synonym,
                    accessor,
                },
            );
        }
        Ok(())
    }

    fn unsupported(&self, kind: InterfaceKind, id: &str) -> NodeError {
        NodeError::UnsupportedInterface {
            node_type: self.type_id.to_string(),
            kind,
            id: id.to_string(),
        }
    }

    /// Look `id` up, then its `set_`/`_changed` synonym, keeping the first
    /// entry `accept` takes. Returns the name it was found under.
    fn lookup(
        &self,
        id: &str,
        kind: InterfaceKind,
        accept: impl Fn(&Entry<N>) -> bool,
    ) -> Option<(&str, &Entry<N>)> {
        let found = self
            .entries
            .get_key_value(id)
            .filter(|(_, e)| accept(e));
        if found.is_some() {
            return found.map(|(k, e)| (k.as_str(), e));
        }
        let synonym = match kind {
            InterfaceKind::EventIn => format!("set_{id}"),
            InterfaceKind::EventOut => format!("{id}_changed"),
            _ => return None,
        };
        self.entries
            .get_key_value(&synonym)
            .filter(|(_, e)| accept(e))
            .map(|(k, e)| (k.as_str(), e))
    }

    fn field_entry(&self, id: &str) -> Result<(&str, &Entry<N>), NodeError> {
        self.lookup(id, InterfaceKind::Field, |e| match e {
            Entry::Field { .. } => true,
            Entry::Exposed { synonym, .. } => *synonym == Synonym::Base,
            _ => false,
        })
        .ok_or_else(|| self.unsupported(InterfaceKind::Field, id))
    }

    fn event_in_entry(&self, id: &str) -> Result<(&str, &Entry<N>), NodeError> {
        self.lookup(id, InterfaceKind::EventIn, |e| match e {
            Entry::EventIn { .. } => true,
            Entry::Exposed { synonym, .. } => *synonym != Synonym::EventOut,
            _ => false,
        })
        .ok_or_else(|| self.unsupported(InterfaceKind::EventIn, id))
    }

    fn event_out_entry(&self, id: &str) -> Result<(&str, &Entry<N>), NodeError> {
        self.lookup(id, InterfaceKind::EventOut, |e| match e {
            Entry::EventOut { .. } => true,
            Entry::Exposed { synonym, .. } => *synonym != Synonym::EventIn,
            _ => false,
        })
        .ok_or_else(|| self.unsupported(InterfaceKind::EventOut, id))
    }

    pub fn field_value<'n>(&self, node: &'n N, id: &str) -> Result<&'n FieldValue, NodeError> {
        match self.field_entry(id)?.1 {
            Entry::Field { accessor, .. } => Ok((accessor.get)(node)),
            Entry::Exposed { accessor, .. } => Ok((accessor.get)(node).value()),
            _ => Err(self.unsupported(InterfaceKind::Field, id)),
        }
    }

    pub fn field_value_mut<'n>(&self, node: &'n mut N, id: &str) -> Result<&'n mut FieldValue, NodeError> {
        match self.field_entry(id)?.1 {
            Entry::Field { accessor, .. } => Ok((accessor.get_mut)(node)),
            Entry::Exposed { accessor, .. } => Ok((accessor.get_mut)(node).value_mut()),
            _ => Err(self.unsupported(InterfaceKind::Field, id)),
        }
    }

    /// Canonical name and type of the eventIn `id` answers to.
    pub fn event_in(&self, id: &str) -> Result<(String, FieldType), NodeError> {
        match self.event_in_entry(id)? {
            (name, Entry::EventIn { field_type, .. }) => Ok((name.to_string(), *field_type)),
            (_, Entry::Exposed { field_type, base, .. }) => Ok((base.clone(), *field_type)),
            _ => Err(self.unsupported(InterfaceKind::EventIn, id)),
        }
    }

    /// Canonical name and type of the eventOut `id` answers to.
    pub fn event_out(&self, id: &str) -> Result<(String, FieldType), NodeError> {
        match self.event_out_entry(id)? {
            (name, Entry::EventOut { field_type, .. }) => Ok((name.to_string(), *field_type)),
            (_, Entry::Exposed { field_type, base, .. }) => Ok((base.clone(), *field_type)),
            _ => Err(self.unsupported(InterfaceKind::EventOut, id)),
        }
    }

    pub fn event_emitter<'n>(&self, node: &'n N, id: &str) -> Result<&'n EventEmitter, NodeError> {
        match self.event_out_entry(id)?.1 {
            Entry::EventOut { accessor, .. } | Entry::Exposed { accessor, .. } => {
                Ok((accessor.get)(node))
            }
            _ => Err(self.unsupported(InterfaceKind::EventOut, id)),
        }
    }

    pub fn event_emitter_mut<'n>(&self, node: &'n mut N, id: &str) -> Result<&'n mut EventEmitter, NodeError> {
        match self.event_out_entry(id)?.1 {
            Entry::EventOut { accessor, .. } | Entry::Exposed { accessor, .. } => {
                Ok((accessor.get_mut)(node))
            }
            _ => Err(self.unsupported(InterfaceKind::EventOut, id)),
        }
    }

    /// Deliver `value` to the eventIn `id`. An exposedField stores the value
    /// and marks its eventOut pending; other eventIns run their handler.
    pub fn process_event(
        &self,
        node: &mut N,
        id: &str,
        value: &FieldValue,
        timestamp: f64,
        ctx: &mut NodeContext,
    ) -> Result<Delivery, NodeError> {
        let (_, entry) = self.event_in_entry(id)?;
        let expected = match entry {
            Entry::EventIn { field_type, .. } | Entry::Exposed { field_type, .. } => *field_type,
            _ => return Err(self.unsupported(InterfaceKind::EventIn, id)),
        };
        if value.field_type() != expected {
            return Err(NodeError::FieldTypeMismatch {
                expected,
                found: value.field_type(),
            });
        }
        match entry {
            Entry::EventIn { handler, .. } => {
                handler(node, value, timestamp, ctx)?;
                Ok(Delivery::Handled)
            }
            Entry::Exposed { accessor, base, .. } => {
                (accessor.get_mut)(node).set(value.clone())?;
                Ok(Delivery::Exposed(base.clone()))
            }
            _ => Err(self.unsupported(InterfaceKind::EventIn, id)),
        }
    }

    /// Node references held in fields and exposedFields.
    pub fn referenced_nodes(&self, node: &N) -> Vec<NodeID> {
        let mut refs = Vec::new();
        for id in &self.node_fields {
            if let Ok(value) = self.field_value(node, id) {
                refs.extend(value.node_refs());
            }
        }
        refs
    }

    pub fn pending_event_outs(&self, node: &N) -> Vec<String> {
        self.emitters
            .iter()
            .filter(|id| {
                self.event_emitter(node, id)
                    .is_ok_and(|emitter| emitter.is_pending())
            })
            .cloned()
            .collect()
    }
}
