use crate::{EventEmitter, GraphRequest, NodeContext, ScriptError};
use indexmap::IndexMap;
use vrml_field::FieldValue;
use vrml_ids::NodeID;

/// A script's view of its node while one of its hooks runs. The script's
/// own node is locked meanwhile, so anything touching the rest of the
/// graph is queued and applied once the hook returns.
pub struct ScriptContext<'a> {
    fields: &'a mut IndexMap<String, FieldValue>,
    event_outs: &'a mut IndexMap<String, EventEmitter>,
    direct_output: bool,
    node: &'a mut NodeContext,
}

impl<'a> ScriptContext<'a> {
    pub fn new(
        fields: &'a mut IndexMap<String, FieldValue>,
        event_outs: &'a mut IndexMap<String, EventEmitter>,
        direct_output: bool,
        node: &'a mut NodeContext,
    ) -> Self {
        Self {
            fields,
            event_outs,
            direct_output,
            node,
        }
    }

    pub fn node_id(&self) -> NodeID {
        self.node.node_id()
    }

    /// URL of the world the browser is showing, empty before one loads.
    pub fn world_url(&self) -> String {
        self.node.browser().map(|b| b.world_url()).unwrap_or_default()
    }

    pub fn current_time(&self) -> Option<f64> {
        self.node.browser().map(|b| b.current_time())
    }

    pub fn field(&self, id: &str) -> Option<&FieldValue> {
        self.fields.get(id)
    }

    pub fn set_field(&mut self, id: &str, value: impl Into<FieldValue>) -> Result<(), ScriptError> {
        let field = self
            .fields
            .get_mut(id)
            .ok_or_else(|| ScriptError::NoSuchInterface(id.to_string()))?;
        field.assign(&value.into())?;
        Ok(())
    }

    fn emitter_key(&self, id: &str) -> Option<String> {
        if self.event_outs.contains_key(id) {
            return Some(id.to_string());
        }
        let changed = format!("{id}_changed");
        self.event_outs.contains_key(&changed).then_some(changed)
    }

    pub fn event_out(&self, id: &str) -> Option<&FieldValue> {
        let key = self.emitter_key(id)?;
        self.event_outs.get(&key).map(EventEmitter::value)
    }

    pub fn event_out_ids(&self) -> Vec<&str> {
        self.event_outs.keys().map(String::as_str).collect()
    }

    /// Write an eventOut. It is sent along its routes once the hook returns.
    pub fn set_event_out(&mut self, id: &str, value: impl Into<FieldValue>) -> Result<(), ScriptError> {
        let key = self
            .emitter_key(id)
            .ok_or_else(|| ScriptError::NoSuchInterface(id.to_string()))?;
        if let Some(emitter) = self.event_outs.get_mut(&key) {
            emitter.set(value)?;
        }
        Ok(())
    }

    /// Send straight to another node's eventIn, bypassing routes. Only
    /// allowed when the script's `directOutput` is TRUE.
    pub fn send_direct(&mut self, node: NodeID, event_in: &str, value: impl Into<FieldValue>) -> Result<(), ScriptError> {
        if !self.direct_output {
            return Err(ScriptError::DirectOutputDisabled);
        }
        self.node.defer(node, event_in, value.into());
        Ok(())
    }

    /// Route `from.event_out` to `to.event_in` once the hook returns. A
    /// route that cannot be made is reported on the browser's error stream.
    pub fn add_route(&mut self, from: NodeID, event_out: &str, to: NodeID, event_in: &str) {
        self.node.request(GraphRequest::AddRoute {
            from,
            event_out: event_out.to_string(),
            to,
            event_in: event_in.to_string(),
        });
    }

    pub fn delete_route(&mut self, from: NodeID, event_out: &str, to: NodeID, event_in: &str) {
        self.node.request(GraphRequest::DeleteRoute {
            from,
            event_out: event_out.to_string(),
            to,
            event_in: event_in.to_string(),
        });
    }

    /// Sweep unreachable nodes after the hook and its events are done.
    pub fn collect_garbage(&mut self) {
        self.node.request(GraphRequest::CollectGarbage);
    }

    /// Write a line to the browser's output.
    pub fn print(&self, text: &str) {
        match self.node.browser() {
            Some(browser) => browser.write_out(text),
            None => log::info!("{text}"),
        }
    }
}
