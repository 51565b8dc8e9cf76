use vrml_field::{FieldError, FieldType, FieldValue};
use vrml_ids::NodeID;

/// The receiving end of a route.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RouteTarget {
    pub node: NodeID,
    pub event_in: String,
}

impl RouteTarget {
    pub fn new(node: NodeID, event_in: impl Into<String>) -> Self {
        Self {
            node,
            event_in: event_in.into(),
        }
    }
}

/// An event a node asked to have delivered once its own handler returns.
#[derive(Clone, Debug, PartialEq)]
pub struct DeferredEvent {
    pub target: RouteTarget,
    pub value: FieldValue,
}

/// Storage behind an eventOut: the last value written, the routes leaving
/// it and when it last fired.
#[derive(Clone, Debug)]
pub struct EventEmitter {
    value: FieldValue,
    targets: Vec<RouteTarget>,
    last_time: Option<f64>,
    pending: bool,
}

impl EventEmitter {
    pub fn new(value: FieldValue) -> Self {
        Self {
            value,
            targets: Vec::new(),
            last_time: None,
            pending: false,
        }
    }

    pub fn of_type(field_type: FieldType) -> Self {
        Self::new(field_type.default_value())
    }

    pub fn field_type(&self) -> FieldType {
        self.value.field_type()
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    /// Write without raising an event, e.g. for initial values.
    pub fn value_mut(&mut self) -> &mut FieldValue {
        &mut self.value
    }

    /// Write and mark the eventOut as having something to send.
    pub fn set(&mut self, value: impl Into<FieldValue>) -> Result<(), FieldError> {
        self.value.assign(&value.into())?;
        self.pending = true;
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn last_time(&self) -> Option<f64> {
        self.last_time
    }

    pub fn targets(&self) -> &[RouteTarget] {
        &self.targets
    }

    pub(crate) fn add_target(&mut self, target: RouteTarget) -> bool {
        if self.targets.contains(&target) {
            return false;
        }
        self.targets.push(target);
        true
    }

    pub(crate) fn remove_target(&mut self, target: &RouteTarget) -> bool {
        let before = self.targets.len();
        self.targets.retain(|t| t != target);
        self.targets.len() != before
    }

    /// Clear the pending flag and hand out what should be sent. An eventOut
    /// fires at most once per timestamp; that is what breaks routing loops.
    pub(crate) fn take_emission(&mut self, timestamp: f64) -> Option<(FieldValue, Vec<RouteTarget>)> {
        self.pending = false;
        if self.last_time == Some(timestamp) {
            return None;
        }
        self.last_time = Some(timestamp);
        Some((self.value.clone(), self.targets.clone()))
    }
}
